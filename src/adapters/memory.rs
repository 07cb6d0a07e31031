//! In-memory backend.
//!
//! Deterministic stand-in for the REST backend: keeps reference data and
//! persisted entries in process, serves queued parser results, and can be
//! told to fail or stall. Used by the test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{EntryStore, ParsingClient, ReferenceService};
use crate::capture::AudioClip;
use crate::domain::{EntryDraft, NewEntry, PersistedEntry, ReferenceEntity, ReferenceKind};
use crate::workflow::WorkflowError;

#[derive(Default)]
struct State {
    categories: Vec<ReferenceEntity>,
    parties: Vec<ReferenceEntity>,
    entries: Vec<PersistedEntry>,
    /// commit key -> index into `entries`
    commits: HashMap<String, usize>,
    parse_results: VecDeque<Result<EntryDraft, WorkflowError>>,
    persist_failures: VecDeque<WorkflowError>,
    submitted_clips: usize,
    next_id: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn set(&self, kind: ReferenceKind) -> &Vec<ReferenceEntity> {
        match kind {
            ReferenceKind::Category => &self.categories,
            ReferenceKind::Party => &self.parties,
        }
    }

    fn set_mut(&mut self, kind: ReferenceKind) -> &mut Vec<ReferenceEntity> {
        match kind {
            ReferenceKind::Category => &mut self.categories,
            ReferenceKind::Party => &mut self.parties,
        }
    }
}

/// Process-local backend
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a reference entity, returning it
    pub fn add_reference(&self, kind: ReferenceKind, name: &str) -> ReferenceEntity {
        let mut state = self.lock();
        let id = state.next_id(kind.label());
        let entity = ReferenceEntity::new(id, name.trim());
        state.set_mut(kind).push(entity.clone());
        entity
    }

    /// Delete a reference entity (simulates a concurrent removal)
    pub fn remove_reference(&self, kind: ReferenceKind, id: &str) {
        self.lock().set_mut(kind).retain(|e| e.id != id);
    }

    /// Queue the result of the next `submit_audio`
    pub fn queue_parse(&self, result: Result<EntryDraft, WorkflowError>) {
        self.lock().parse_results.push_back(result);
    }

    /// Make the next `persist_entry` fail
    pub fn fail_next_persist(&self, err: WorkflowError) {
        self.lock().persist_failures.push_back(err);
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Entries persisted so far, in order
    pub fn persisted(&self) -> Vec<PersistedEntry> {
        self.lock().entries.clone()
    }

    /// Number of clips submitted to the parser
    pub fn submitted_clips(&self) -> usize {
        self.lock().submitted_clips
    }

    pub fn references(&self, kind: ReferenceKind) -> Vec<ReferenceEntity> {
        self.lock().set(kind).clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.latency.lock().ok().and_then(|guard| *guard);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ParsingClient for InMemoryBackend {
    async fn submit_audio(&self, _clip: &AudioClip) -> Result<EntryDraft, WorkflowError> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.submitted_clips += 1;
        state
            .parse_results
            .pop_front()
            .unwrap_or_else(|| Err(WorkflowError::Parse("no parser result queued".to_string())))
    }
}

#[async_trait]
impl ReferenceService for InMemoryBackend {
    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> Result<Vec<ReferenceEntity>, WorkflowError> {
        self.simulate_latency().await;
        let mut entities = self.lock().set(kind).clone();
        entities.sort_by_key(|e| e.name.to_lowercase());
        Ok(entities)
    }

    async fn create_reference_entity(
        &self,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<ReferenceEntity, WorkflowError> {
        self.simulate_latency().await;
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::validation("name", "must not be empty"));
        }

        let mut state = self.lock();
        // Dedup: an existing entity with the same name is returned as-is
        if let Some(existing) = state.set(kind).iter().find(|e| e.matches_name(name)) {
            return Ok(existing.clone());
        }

        let id = state.next_id(kind.label());
        let entity = ReferenceEntity::new(id, name);
        state.set_mut(kind).push(entity.clone());
        Ok(entity)
    }
}

#[async_trait]
impl EntryStore for InMemoryBackend {
    async fn persist_entry(
        &self,
        entry: &NewEntry,
        commit_key: &str,
    ) -> Result<PersistedEntry, WorkflowError> {
        self.simulate_latency().await;
        let mut state = self.lock();

        if let Some(err) = state.persist_failures.pop_front() {
            return Err(err);
        }

        if let Some(&index) = state.commits.get(commit_key) {
            return Ok(state.entries[index].clone());
        }

        let kind = entry.kind().reference_kind();
        if state.set(kind).iter().all(|e| e.id != entry.reference_id()) {
            return Err(WorkflowError::ReferenceMissing {
                kind,
                name: entry.reference_id().to_string(),
            });
        }

        let persisted = PersistedEntry {
            id: state.next_id("entry"),
            entry: entry.clone(),
        };
        state.entries.push(persisted.clone());
        let index = state.entries.len() - 1;
        state.commits.insert(commit_key.to_string(), index);
        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewExpense;
    use chrono::NaiveDate;

    fn expense(category_id: &str) -> NewEntry {
        NewEntry::Expense(NewExpense {
            category_id: category_id.to_string(),
            amount: 10.0,
            description: String::new(),
            raw_voice_text: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        })
    }

    #[tokio::test]
    async fn test_create_trims_and_dedups() {
        let backend = InMemoryBackend::new();
        let first = backend
            .create_reference_entity(ReferenceKind::Category, "  Fuel ")
            .await
            .unwrap();
        assert_eq!(first.name, "Fuel");

        let again = backend
            .create_reference_entity(ReferenceKind::Category, "fuel")
            .await
            .unwrap();
        assert_eq!(again, first);
        assert_eq!(backend.references(ReferenceKind::Category).len(), 1);
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let backend = InMemoryBackend::new();
        backend.add_reference(ReferenceKind::Party, "suresh");
        backend.add_reference(ReferenceKind::Party, "Anil");

        let names: Vec<String> = backend
            .list_reference_entities(ReferenceKind::Party)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Anil", "suresh"]);
    }

    #[tokio::test]
    async fn test_persist_is_idempotent_per_commit_key() {
        let backend = InMemoryBackend::new();
        let category = backend.add_reference(ReferenceKind::Category, "Tea");

        let a = backend.persist_entry(&expense(&category.id), "k1").await.unwrap();
        let b = backend.persist_entry(&expense(&category.id), "k1").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.persisted().len(), 1);
    }

    #[tokio::test]
    async fn test_persist_unknown_reference() {
        let backend = InMemoryBackend::new();
        let err = backend.persist_entry(&expense("nope"), "k").await.unwrap_err();
        assert!(matches!(err, WorkflowError::ReferenceMissing { .. }));
    }
}
