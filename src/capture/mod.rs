//! Voice capture.
//!
//! The capture controller owns the recording lifecycle:
//!
//! ```text
//! Idle → Recording → Processing → Idle   (draft produced or parse failed)
//! Idle → Recording → Idle                (aborted / no audio)
//! ```
//!
//! The device is released on every exit path from `Recording`.

pub mod controller;
pub mod device;

use chrono::{DateTime, Local};

pub use controller::{CaptureController, CaptureState};
pub use device::{ActiveRecording, AudioDevice, FileDevice, Recording};

/// A finished recording, ready to submit to the parser
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Encoded audio bytes
    pub bytes: Vec<u8>,

    /// MIME type of `bytes`
    pub mime_type: String,

    /// File name sent with the upload
    pub file_name: String,

    pub started_at: DateTime<Local>,

    pub ended_at: DateTime<Local>,
}

impl AudioClip {
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}
