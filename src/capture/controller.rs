//! Capture controller: recording lifecycle and hand-off to the parser.

use tracing::{info, instrument, warn};

use super::device::{ActiveRecording, AudioDevice};
use crate::adapters::ParsingClient;
use crate::domain::EntryDraft;
use crate::workflow::WorkflowError;

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Recording,
    Processing,
}

impl CaptureState {
    pub fn name(self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Recording => "recording",
            CaptureState::Processing => "processing",
        }
    }
}

/// Resets the controller to `Idle` however processing ends, including
/// when the processing future is dropped mid-request.
struct ProcessingGuard<'a> {
    state: &'a mut CaptureState,
}

impl<'a> ProcessingGuard<'a> {
    fn enter(state: &'a mut CaptureState) -> Self {
        *state = CaptureState::Processing;
        Self { state }
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        *self.state = CaptureState::Idle;
    }
}

/// Owns one capture device and at most one active recording
pub struct CaptureController {
    device: Box<dyn AudioDevice>,
    state: CaptureState,
    active: Option<ActiveRecording>,
    /// Clips shorter than this are not worth sending to the parser
    min_clip_bytes: usize,
}

impl CaptureController {
    pub fn new(device: Box<dyn AudioDevice>, min_clip_bytes: usize) -> Self {
        Self {
            device,
            state: CaptureState::Idle,
            active: None,
            min_clip_bytes,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Acquire the device and start recording
    pub fn start_capture(&mut self) -> Result<(), WorkflowError> {
        if self.state != CaptureState::Idle {
            return Err(WorkflowError::Busy);
        }

        let recording = self.device.open()?;
        self.active = Some(ActiveRecording::new(recording));
        self.state = CaptureState::Recording;
        info!("Recording started");
        Ok(())
    }

    /// Drop the recording without submitting anything
    pub fn abort_capture(&mut self) {
        if self.active.take().is_some() {
            info!("Recording aborted");
        }
        self.state = CaptureState::Idle;
    }

    /// Finalise the recording and submit it to the parser.
    ///
    /// Always ends in `Idle`. Any parser-side failure is reported as
    /// [`WorkflowError::Parse`].
    #[instrument(skip(self, parser))]
    pub async fn stop_capture<P>(&mut self, parser: &P) -> Result<EntryDraft, WorkflowError>
    where
        P: ParsingClient + ?Sized,
    {
        if self.state != CaptureState::Recording {
            return Err(WorkflowError::InvalidTransition {
                action: "stop capture",
                state: self.state.name().to_string(),
            });
        }

        let Some(recording) = self.active.take() else {
            self.state = CaptureState::Idle;
            return Err(WorkflowError::Parse("no audio captured".to_string()));
        };

        let _guard = ProcessingGuard::enter(&mut self.state);

        // Releases the device whether or not finalising succeeds
        let clip = recording.finish()?;

        if clip.bytes.len() < self.min_clip_bytes {
            warn!(bytes = clip.bytes.len(), "Recording too short, not submitting");
            return Err(WorkflowError::Parse("recording too short".to_string()));
        }

        info!(bytes = clip.bytes.len(), duration_ms = clip.duration_ms(), "Submitting recording");
        match parser.submit_audio(&clip).await {
            Ok(draft) => Ok(draft),
            Err(err @ WorkflowError::Parse(_)) => Err(err),
            Err(other) => Err(WorkflowError::Parse(other.to_string())),
        }
    }
}
