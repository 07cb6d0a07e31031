//! Reference entities (categories and parties) that entries point at.

use serde::{Deserialize, Serialize};

/// Type of reference entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Expense category
    Category,
    /// Client / party in the ledger
    Party,
}

impl ReferenceKind {
    pub fn label(self) -> &'static str {
        match self {
            ReferenceKind::Category => "category",
            ReferenceKind::Party => "party",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A category or party record as the backend reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    /// Opaque identifier assigned by the backend
    pub id: String,

    /// Display name (unique per kind, case-insensitively)
    pub name: String,
}

impl ReferenceEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Case-insensitive exact name comparison
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Ordered list of reference entities of one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    entities: Vec<ReferenceEntity>,
}

impl ReferenceSet {
    pub fn new(entities: Vec<ReferenceEntity>) -> Self {
        Self { entities }
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored
    pub fn find_by_name(&self, name: &str) -> Option<&ReferenceEntity> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.entities.iter().find(|e| e.matches_name(name))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ReferenceEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Resolve by name first, then treat the value as a raw id
    pub fn resolve(&self, name_or_id: &str) -> Option<&ReferenceEntity> {
        self.find_by_name(name_or_id)
            .or_else(|| self.find_by_id(name_or_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<ReferenceEntity> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = ReferenceEntity>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Locally cached reference data for both kinds.
///
/// Always replaced wholesale from the backend, never patched in place.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    categories: ReferenceSet,
    parties: ReferenceSet,
}

impl ReferenceCache {
    pub fn new(categories: ReferenceSet, parties: ReferenceSet) -> Self {
        Self {
            categories,
            parties,
        }
    }

    pub fn get(&self, kind: ReferenceKind) -> &ReferenceSet {
        match kind {
            ReferenceKind::Category => &self.categories,
            ReferenceKind::Party => &self.parties,
        }
    }

    pub fn replace(&mut self, kind: ReferenceKind, set: ReferenceSet) {
        match kind {
            ReferenceKind::Category => self.categories = set,
            ReferenceKind::Party => self.parties = set,
        }
    }
}
