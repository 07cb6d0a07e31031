//! Audio capture devices.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;

use super::AudioClip;
use crate::workflow::WorkflowError;

/// Source of recordings (microphone, file, test double)
pub trait AudioDevice: Send {
    /// Acquire the device and start buffering audio
    fn open(&mut self) -> Result<Box<dyn Recording>, WorkflowError>;
}

/// An in-progress recording holding the device
pub trait Recording: Send {
    /// Finalise buffered audio into a single clip
    fn finish(&mut self) -> Result<AudioClip, WorkflowError>;

    /// Release the underlying device. Must be safe to call twice.
    fn release(&mut self);
}

/// Owns a recording and releases the device when dropped
pub struct ActiveRecording {
    inner: Box<dyn Recording>,
}

impl ActiveRecording {
    pub fn new(inner: Box<dyn Recording>) -> Self {
        Self { inner }
    }

    pub fn finish(mut self) -> Result<AudioClip, WorkflowError> {
        self.inner.finish()
        // dropped here, releasing the device
    }
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// Guess a MIME type from a file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("webm") => "audio/webm",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("opus") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// Treats an audio file on disk as the captured buffer.
///
/// Opening fails with a device error when the file cannot be read, the
/// same way a denied microphone would.
pub struct FileDevice {
    path: PathBuf,
}

impl FileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioDevice for FileDevice {
    fn open(&mut self) -> Result<Box<dyn Recording>, WorkflowError> {
        let metadata = std::fs::metadata(&self.path).map_err(|e| {
            WorkflowError::Device(format!("{}: {}", self.path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(WorkflowError::Device(format!(
                "{} is not a file",
                self.path.display()
            )));
        }

        debug!(path = %self.path.display(), "Opened file capture");
        Ok(Box::new(FileRecording {
            path: self.path.clone(),
            started_at: Local::now(),
            released: false,
        }))
    }
}

struct FileRecording {
    path: PathBuf,
    started_at: DateTime<Local>,
    released: bool,
}

impl Recording for FileRecording {
    fn finish(&mut self) -> Result<AudioClip, WorkflowError> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| WorkflowError::Device(format!("{}: {}", self.path.display(), e)))?;

        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("webm");

        Ok(AudioClip {
            bytes,
            mime_type: mime_for_path(&self.path).to_string(),
            file_name: format!("recording.{}", ext),
            started_at: self.started_at,
            ended_at: Local::now(),
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            debug!(path = %self.path.display(), "Released file capture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a.webm")), "audio/webm");
        assert_eq!(mime_for_path(Path::new("memo.M4A")), "audio/mp4");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_file_device_reads_clip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("memo.ogg");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[7u8; 256])
            .unwrap();

        let mut device = FileDevice::new(&path);
        let recording = ActiveRecording::new(device.open().unwrap());
        let clip = recording.finish().unwrap();

        assert_eq!(clip.bytes.len(), 256);
        assert_eq!(clip.mime_type, "audio/ogg");
        assert_eq!(clip.file_name, "recording.ogg");
        assert!(clip.duration_ms() >= 0);
    }

    #[test]
    fn test_missing_file_is_device_error() {
        let mut device = FileDevice::new("/definitely/not/here.webm");
        assert!(matches!(device.open(), Err(WorkflowError::Device(_))));
    }
}
