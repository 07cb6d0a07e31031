//! Entry reconciliation state machine.
//!
//! ```text
//! evaluate ─┬─> NeedsReference ──quick_create──> AwaitingConfirmation
//!           │        └─abandon─> Abandoned
//!           └─> AwaitingConfirmation ─┬─accept─> Committing ─> Idle
//!                                     ├─reject─> Abandoned
//!                                     └─edit──> Editing ─┬─save──> Committing ─> Idle
//!                                                        └─cancel─> Abandoned
//! ```
//!
//! Reference names are always checked against the current local
//! reference cache; the parser's match hints are never trusted.

use std::future::Future;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::edit::{draft_to_entry, EditBuffer};
use super::transition::{Action, Change, DiscardReason, Transition};
use super::WorkflowError;
use crate::adapters::Backend;
use crate::domain::{
    EntryDraft, NewEntry, ReferenceCache, ReferenceKind, ReferenceSet, WorkflowState,
};

/// Commit key for a persisted entry: "{workflow_id}:{kind}:{payload_hash}"
pub fn commit_key(workflow_id: Uuid, entry: &NewEntry) -> String {
    let payload = serde_json::to_string(entry).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    format!(
        "{}:{}:{}",
        workflow_id,
        entry.kind().label(),
        hex::encode(&digest[..8])
    )
}

/// One reconciliation workflow context: the draft, the edit buffer and
/// the reference data they are checked against.
pub struct Reconciler {
    /// Current workflow instance
    id: Uuid,
    state: WorkflowState,
    draft: Option<EntryDraft>,
    edit: Option<EditBuffer>,
    references: ReferenceCache,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    /// Cancelled when the instance is discarded or aborted from outside
    cancel: CancellationToken,
}

impl Reconciler {
    /// Create a reconciler over an already loaded reference cache
    pub fn new(backend: Arc<dyn Backend>, clock: Arc<dyn Clock>, references: ReferenceCache) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WorkflowState::Idle,
            draft: None,
            edit: None,
            references,
            backend,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a reconciler and load both reference sets from the backend
    pub async fn load(backend: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Result<Self, WorkflowError> {
        let mut reconciler = Self::new(backend, clock, ReferenceCache::default());
        reconciler.reload(ReferenceKind::Category).await?;
        reconciler.reload(ReferenceKind::Party).await?;
        Ok(reconciler)
    }

    /// Id of the current workflow instance
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn draft(&self) -> Option<&EntryDraft> {
        self.draft.as_ref()
    }

    pub fn edit_buffer(&self) -> Option<&EditBuffer> {
        self.edit.as_ref()
    }

    /// Form access while `Editing`
    pub fn edit_buffer_mut(&mut self) -> Option<&mut EditBuffer> {
        self.edit.as_mut()
    }

    pub fn references(&self) -> &ReferenceCache {
        &self.references
    }

    /// Direct cache access, for reference changes made outside the workflow
    pub fn references_mut(&mut self) -> &mut ReferenceCache {
        &mut self.references
    }

    /// Token that aborts the current instance when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start a new workflow instance for `draft`
    pub fn evaluate(&mut self, draft: EntryDraft) -> Result<Transition, WorkflowError> {
        if self.state.is_active() {
            return Err(WorkflowError::Busy);
        }

        self.id = Uuid::new_v4();
        self.cancel = CancellationToken::new();
        self.edit = None;

        let to = self.reconcile(&draft);
        self.draft = Some(draft);
        let change = match &to {
            WorkflowState::NeedsReference { kind, name } => Change::ReferenceRequired {
                kind: *kind,
                name: name.clone(),
            },
            _ => Change::DraftReady,
        };
        Ok(self.transition(to, change))
    }

    /// Create the missing category/party and re-check the draft
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub async fn quick_create(&mut self, name: &str) -> Result<Transition, WorkflowError> {
        self.check_cancelled()?;
        let kind = match &self.state {
            WorkflowState::NeedsReference { kind, .. } => *kind,
            _ => return Ok(self.ignored(Action::QuickCreate)),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::validation("name", "must not be empty"));
        }

        let backend = Arc::clone(&self.backend);
        let entity = self
            .guarded(backend.create_reference_entity(kind, name))
            .await?;
        info!(%kind, id = %entity.id, name = %entity.name, "Reference created");

        // Reload instead of inserting: the server may have normalised or deduplicated
        self.reload(kind).await?;

        if let Some(draft) = self.draft.as_mut() {
            draft.set_reference_name(entity.name.clone());
        }
        let to = match &self.draft {
            Some(draft) => self.reconcile(draft),
            None => WorkflowState::Idle,
        };
        Ok(self.transition(to, Change::ReferenceCreated { kind, entity }))
    }

    /// Reload both reference sets; a pending `NeedsReference` is re-checked
    pub async fn refresh_references(&mut self) -> Result<Transition, WorkflowError> {
        self.check_cancelled()?;
        if self.state == WorkflowState::Committing {
            return Ok(self.ignored(Action::RefreshReferences));
        }

        self.reload(ReferenceKind::Category).await?;
        self.reload(ReferenceKind::Party).await?;

        let to = match (&self.state, &self.draft) {
            (WorkflowState::NeedsReference { .. }, Some(draft)) => self.reconcile(draft),
            (state, _) => state.clone(),
        };
        let change = if to == WorkflowState::AwaitingConfirmation && to != self.state {
            Change::DraftReady
        } else {
            Change::ReferencesReloaded
        };
        Ok(self.transition(to, change))
    }

    /// Discard a draft whose reference the user chose not to create
    pub fn abandon(&mut self) -> Transition {
        match self.state {
            WorkflowState::NeedsReference { .. } => self.discard(DiscardReason::Abandoned),
            _ => self.ignored(Action::Abandon),
        }
    }

    /// Persist the draft as parsed
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub async fn accept(&mut self) -> Result<Transition, WorkflowError> {
        self.check_cancelled()?;
        let draft = match (&self.state, &self.draft) {
            (WorkflowState::AwaitingConfirmation, Some(draft)) => draft.clone(),
            _ => return Ok(self.ignored(Action::Accept)),
        };

        let kind = draft.kind().reference_kind();
        let name = draft.reference_name().trim().to_string();
        let reference = match self.references.get(kind).find_by_name(&name) {
            Some(reference) => reference.clone(),
            None => {
                warn!(%kind, %name, "Reference vanished before accept");
                self.transition(
                    WorkflowState::NeedsReference {
                        kind,
                        name: name.clone(),
                    },
                    Change::ReferenceRequired {
                        kind,
                        name: name.clone(),
                    },
                );
                return Err(WorkflowError::ReferenceMissing { kind, name });
            }
        };

        let entry = draft_to_entry(&draft, &reference, self.clock.today())?;
        self.commit(entry).await
    }

    /// Discard the draft without persisting
    pub fn reject(&mut self) -> Transition {
        match self.state {
            WorkflowState::AwaitingConfirmation => self.discard(DiscardReason::Rejected),
            _ => self.ignored(Action::Reject),
        }
    }

    /// Copy the draft into an edit buffer
    pub fn edit(&mut self) -> Result<Transition, WorkflowError> {
        self.check_cancelled()?;
        let buffer = match (&self.state, &self.draft) {
            (WorkflowState::AwaitingConfirmation, Some(draft)) => {
                EditBuffer::from_draft(draft, self.clock.today())?
            }
            _ => return Ok(self.ignored(Action::Edit)),
        };

        self.edit = Some(buffer);
        Ok(self.transition(WorkflowState::Editing, Change::EditStarted))
    }

    /// Persist the edited values
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub async fn save(&mut self) -> Result<Transition, WorkflowError> {
        self.check_cancelled()?;
        let entry = match (&self.state, &self.edit) {
            (WorkflowState::Editing, Some(buffer)) => {
                buffer.to_entry(self.references.get(buffer.reference_kind()))?
            }
            _ => return Ok(self.ignored(Action::Save)),
        };

        self.commit(entry).await
    }

    /// Discard the edit buffer and the draft
    pub fn cancel(&mut self) -> Transition {
        match self.state {
            WorkflowState::Editing => self.discard(DiscardReason::EditCancelled),
            _ => self.ignored(Action::Cancel),
        }
    }

    /// Check a draft against the current reference cache
    fn reconcile(&self, draft: &EntryDraft) -> WorkflowState {
        let kind = draft.kind().reference_kind();
        let name = draft.reference_name().trim();

        if !name.is_empty() && self.references.get(kind).find_by_name(name).is_none() {
            WorkflowState::NeedsReference {
                kind,
                name: name.to_string(),
            }
        } else {
            WorkflowState::AwaitingConfirmation
        }
    }

    async fn reload(&mut self, kind: ReferenceKind) -> Result<(), WorkflowError> {
        let backend = Arc::clone(&self.backend);
        let entities = self.guarded(backend.list_reference_entities(kind)).await?;
        self.references.replace(kind, ReferenceSet::new(entities));
        Ok(())
    }

    /// Persist from `AwaitingConfirmation` or `Editing`, returning there on failure
    async fn commit(&mut self, entry: NewEntry) -> Result<Transition, WorkflowError> {
        let key = commit_key(self.id, &entry);
        let origin = std::mem::replace(&mut self.state, WorkflowState::Committing);

        let backend = Arc::clone(&self.backend);
        match self.guarded(backend.persist_entry(&entry, &key)).await {
            Ok(persisted) => {
                info!(id = %persisted.id, summary = %persisted.entry.summary(), "Entry committed");
                self.draft = None;
                self.edit = None;
                let mut transition = self.transition(
                    WorkflowState::Idle,
                    Change::Committed {
                        entry: persisted,
                        commit_key: key,
                    },
                );
                transition.from = origin;
                Ok(transition)
            }
            // Already discarded by the guard
            Err(WorkflowError::Cancelled) => Err(WorkflowError::Cancelled),
            Err(WorkflowError::ReferenceMissing { kind, name })
                if origin == WorkflowState::AwaitingConfirmation =>
            {
                let draft_name = self
                    .draft
                    .as_ref()
                    .map(|d| d.reference_name().trim().to_string())
                    .unwrap_or(name);
                self.state = WorkflowState::NeedsReference {
                    kind,
                    name: draft_name.clone(),
                };
                Err(WorkflowError::ReferenceMissing {
                    kind,
                    name: draft_name,
                })
            }
            Err(err) => {
                warn!(error = %err, "Commit failed");
                self.state = origin;
                Err(err)
            }
        }
    }

    /// Race a boundary call against the cancellation token.
    ///
    /// A result that completes after cancellation is discarded.
    async fn guarded<T, F>(&mut self, call: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, WorkflowError>>,
    {
        let token = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(WorkflowError::Cancelled),
            result = call => result,
        };

        if token.is_cancelled() {
            if result.is_ok() {
                warn!(workflow_id = %self.id, "Discarding response that arrived after cancellation");
            }
            if self.state.is_active() {
                self.discard(DiscardReason::Cancelled);
            }
            return Err(WorkflowError::Cancelled);
        }
        result
    }

    fn check_cancelled(&mut self) -> Result<(), WorkflowError> {
        if self.state.is_active() && self.cancel.is_cancelled() {
            self.discard(DiscardReason::Cancelled);
            return Err(WorkflowError::Cancelled);
        }
        Ok(())
    }

    fn discard(&mut self, reason: DiscardReason) -> Transition {
        self.draft = None;
        self.edit = None;
        self.cancel.cancel();
        self.transition(WorkflowState::Abandoned, Change::Discarded(reason))
    }

    fn ignored(&self, action: Action) -> Transition {
        warn!(action = action.name(), state = %self.state, "Action not valid in current state, ignoring");
        Transition {
            from: self.state.clone(),
            to: self.state.clone(),
            change: Change::Ignored(action),
        }
    }

    fn transition(&mut self, to: WorkflowState, change: Change) -> Transition {
        let from = std::mem::replace(&mut self.state, to.clone());
        info!(workflow_id = %self.id, %from, %to, "Workflow transition");
        Transition { from, to, change }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::domain::{LedgerTransactionType, ReferenceEntity};
    use crate::workflow::clock::FixedClock;
    use chrono::NaiveDate;

    fn reconciler_with(categories: &[&str], parties: &[&str]) -> (Reconciler, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        for name in categories {
            backend.add_reference(ReferenceKind::Category, name);
        }
        for name in parties {
            backend.add_reference(ReferenceKind::Party, name);
        }
        let cache = ReferenceCache::new(
            backend.references(ReferenceKind::Category).into_iter().collect(),
            backend.references(ReferenceKind::Party).into_iter().collect(),
        );
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()));
        (Reconciler::new(backend.clone(), clock, cache), backend)
    }

    #[test]
    fn test_commit_key_format() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let entry = NewEntry::Expense(crate::domain::NewExpense {
            category_id: "c1".to_string(),
            amount: 1.0,
            description: String::new(),
            raw_voice_text: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        });

        let key = commit_key(id, &entry);
        let parts: Vec<&str> = key.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(parts[1], "expense");
        assert_eq!(parts[2].len(), 16);
        assert_eq!(key, commit_key(id, &entry));
    }

    #[test]
    fn test_evaluate_ignores_match_hint() {
        let (mut machine, _) = reconciler_with(&["Fuel"], &[]);

        let t = machine
            .evaluate(EntryDraft::expense(10.0, "FUEL").with_match_hint(false))
            .unwrap();
        assert_eq!(t.to, WorkflowState::AwaitingConfirmation);
        machine.reject();

        let t = machine
            .evaluate(EntryDraft::expense(10.0, "Tea").with_match_hint(true))
            .unwrap();
        assert_eq!(
            t.to,
            WorkflowState::NeedsReference {
                kind: ReferenceKind::Category,
                name: "Tea".to_string()
            }
        );
    }

    #[test]
    fn test_empty_reference_name_goes_to_confirmation() {
        let (mut machine, _) = reconciler_with(&[], &[]);
        let t = machine
            .evaluate(EntryDraft::ledger(5.0, "", LedgerTransactionType::PaymentMade))
            .unwrap();
        assert_eq!(t.to, WorkflowState::AwaitingConfirmation);
    }

    #[test]
    fn test_evaluate_while_active_is_busy() {
        let (mut machine, _) = reconciler_with(&["Fuel"], &[]);
        machine.evaluate(EntryDraft::expense(1.0, "Fuel")).unwrap();
        assert_eq!(
            machine.evaluate(EntryDraft::expense(2.0, "Fuel")),
            Err(WorkflowError::Busy)
        );
    }

    #[test]
    fn test_terminal_actions_from_wrong_state_are_noops() {
        let (mut machine, _) = reconciler_with(&["Fuel"], &[]);
        assert!(machine.reject().is_ignored());
        assert!(machine.cancel().is_ignored());
        assert!(machine.abandon().is_ignored());
        assert_eq!(machine.state(), &WorkflowState::Idle);
    }

    #[test]
    fn test_discard_paths() {
        let (mut machine, _) = reconciler_with(&["Fuel"], &[]);

        machine.evaluate(EntryDraft::expense(1.0, "Tea")).unwrap();
        let t = machine.abandon();
        assert_eq!(t.change, Change::Discarded(DiscardReason::Abandoned));
        assert!(machine.draft().is_none());

        machine.evaluate(EntryDraft::expense(1.0, "Fuel")).unwrap();
        machine.edit().unwrap();
        let t = machine.cancel();
        assert_eq!(t.change, Change::Discarded(DiscardReason::EditCancelled));
        assert!(machine.edit_buffer().is_none());
        assert_eq!(machine.state(), &WorkflowState::Abandoned);
    }

    #[tokio::test]
    async fn test_cancelled_token_abandons_on_next_action() {
        let (mut machine, backend) = reconciler_with(&["Fuel"], &[]);
        machine.evaluate(EntryDraft::expense(1.0, "Fuel")).unwrap();

        machine.cancellation_token().cancel();
        assert_eq!(machine.accept().await, Err(WorkflowError::Cancelled));
        assert_eq!(machine.state(), &WorkflowState::Abandoned);
        assert!(backend.persisted().is_empty());
    }

    #[tokio::test]
    async fn test_backend_reference_missing_routes_back() {
        let (mut machine, backend) = reconciler_with(&["Fuel"], &[]);
        machine.evaluate(EntryDraft::expense(1.0, "Fuel")).unwrap();

        // Removed server-side only; the local cache still has it
        let fuel: ReferenceEntity = backend.references(ReferenceKind::Category)[0].clone();
        backend.remove_reference(ReferenceKind::Category, &fuel.id);

        let err = machine.accept().await.unwrap_err();
        assert!(matches!(err, WorkflowError::ReferenceMissing { .. }));
        assert_eq!(
            machine.state(),
            &WorkflowState::NeedsReference {
                kind: ReferenceKind::Category,
                name: "Fuel".to_string()
            }
        );

        let t = machine.quick_create("Fuel").await.unwrap();
        assert_eq!(t.to, WorkflowState::AwaitingConfirmation);
        machine.accept().await.unwrap();
        assert_eq!(backend.persisted().len(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_keeps_state() {
        let (mut machine, backend) = reconciler_with(&["Fuel"], &[]);
        machine.evaluate(EntryDraft::expense(1.0, "Fuel")).unwrap();

        backend.fail_next_persist(WorkflowError::Network("connection reset".to_string()));
        let err = machine.accept().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Network(_)));
        assert_eq!(machine.state(), &WorkflowState::AwaitingConfirmation);

        machine.accept().await.unwrap();
        assert_eq!(machine.state(), &WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_refresh_resolves_pending_reference() {
        let (mut machine, backend) = reconciler_with(&[], &[]);
        machine
            .evaluate(EntryDraft::ledger(1.0, "Ramesh", LedgerTransactionType::GoodsSold))
            .unwrap();

        // Created elsewhere (another device, the parties page)
        backend.add_reference(ReferenceKind::Party, "Ramesh");

        let t = machine.refresh_references().await.unwrap();
        assert_eq!(t.change, Change::DraftReady);
        assert_eq!(machine.state(), &WorkflowState::AwaitingConfirmation);
    }
}
