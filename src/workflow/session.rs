//! Voice session: one capture controller plus one reconciliation context.
//!
//! Capturing is refused while a draft is still being reconciled, so at
//! most one recording/confirmation cycle is ever in flight. Every
//! transition and every failure is written to the journal when one is
//! attached.

use std::sync::Arc;

use tracing::warn;

use super::clock::Clock;
use super::machine::Reconciler;
use super::transition::Transition;
use super::WorkflowError;
use crate::adapters::Backend;
use crate::capture::{AudioDevice, CaptureController, CaptureState};
use crate::domain::{WorkflowEvent, WorkflowEventType, WorkflowState};
use crate::journal::Journal;

pub struct VoiceSession {
    capture: CaptureController,
    reconciler: Reconciler,
    backend: Arc<dyn Backend>,
    journal: Option<Journal>,
}

impl VoiceSession {
    pub fn new(capture: CaptureController, reconciler: Reconciler, backend: Arc<dyn Backend>) -> Self {
        Self {
            capture,
            reconciler,
            backend,
            journal: None,
        }
    }

    /// Build a session and load reference data from the backend
    pub async fn open(
        device: Box<dyn AudioDevice>,
        backend: Arc<dyn Backend>,
        clock: Arc<dyn Clock>,
        min_clip_bytes: usize,
    ) -> Result<Self, WorkflowError> {
        let reconciler = Reconciler::load(Arc::clone(&backend), clock).await?;
        let capture = CaptureController::new(device, min_clip_bytes);
        Ok(Self::new(capture, reconciler, backend))
    }

    /// Record transitions to `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn state(&self) -> &WorkflowState {
        self.reconciler.state()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    /// Start recording; refused while a draft is still open
    pub fn start_capture(&mut self) -> Result<(), WorkflowError> {
        if self.reconciler.state().is_active() {
            return Err(WorkflowError::Busy);
        }
        self.capture.start_capture()
    }

    pub fn abort_capture(&mut self) {
        self.capture.abort_capture();
    }

    /// Stop recording, parse the clip and reconcile the resulting draft
    pub async fn stop_capture(&mut self) -> Result<Transition, WorkflowError> {
        let backend = Arc::clone(&self.backend);
        let before = self.reconciler.state().clone();
        let result = match self.capture.stop_capture(backend.as_ref()).await {
            Ok(draft) => self.reconciler.evaluate(draft),
            Err(err) => Err(err),
        };
        self.record(before, &result);
        result
    }

    pub async fn quick_create(&mut self, name: &str) -> Result<Transition, WorkflowError> {
        let before = self.reconciler.state().clone();
        let result = self.reconciler.quick_create(name).await;
        self.record(before, &result);
        result
    }

    pub async fn refresh_references(&mut self) -> Result<Transition, WorkflowError> {
        let before = self.reconciler.state().clone();
        let result = self.reconciler.refresh_references().await;
        self.record(before, &result);
        result
    }

    pub async fn accept(&mut self) -> Result<Transition, WorkflowError> {
        let before = self.reconciler.state().clone();
        let result = self.reconciler.accept().await;
        self.record(before, &result);
        result
    }

    pub fn edit(&mut self) -> Result<Transition, WorkflowError> {
        let before = self.reconciler.state().clone();
        let result = self.reconciler.edit();
        self.record(before, &result);
        result
    }

    pub async fn save(&mut self) -> Result<Transition, WorkflowError> {
        let before = self.reconciler.state().clone();
        let result = self.reconciler.save().await;
        self.record(before, &result);
        result
    }

    pub fn reject(&mut self) -> Transition {
        let transition = self.reconciler.reject();
        self.record_transition(&transition);
        transition
    }

    pub fn abandon(&mut self) -> Transition {
        let transition = self.reconciler.abandon();
        self.record_transition(&transition);
        transition
    }

    pub fn cancel(&mut self) -> Transition {
        let transition = self.reconciler.cancel();
        self.record_transition(&transition);
        transition
    }

    fn record(&self, before: WorkflowState, result: &Result<Transition, WorkflowError>) {
        match result {
            Ok(transition) => self.record_transition(transition),
            Err(err) => {
                let event = WorkflowEvent::new(
                    self.reconciler.id(),
                    WorkflowEventType::Failed,
                    before,
                    self.reconciler.state().clone(),
                    format!("{}: {}", err.kind(), err),
                );
                self.append(&event);
            }
        }
    }

    fn record_transition(&self, transition: &Transition) {
        if let Some(event) = transition.to_event(self.reconciler.id()) {
            self.append(&event);
        }
    }

    fn append(&self, event: &WorkflowEvent) {
        if let Some(journal) = &self.journal {
            // Journal trouble never blocks the workflow
            if let Err(e) = journal.append(event) {
                warn!(error = %e, "Failed to write journal event");
            }
        }
    }
}
