//! Entry payloads sent to the backend and the records it returns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::draft::{EntryKind, LedgerTransactionType};

/// Expense payload (`POST /api/expenses`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub category_id: String,
    pub amount: f64,
    pub description: String,
    pub raw_voice_text: String,
    pub date: NaiveDate,
}

/// Ledger transaction payload (`POST /api/ledger`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLedgerTransaction {
    pub party_id: String,
    pub entry_type: LedgerTransactionType,
    pub item_name: String,
    pub quantity: Option<f64>,
    pub unit: String,
    pub rate: Option<f64>,
    pub amount: f64,
    pub description: String,
    pub raw_voice_text: String,
    pub date: NaiveDate,
}

/// A fully resolved entry, ready to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NewEntry {
    Expense(NewExpense),
    LedgerTransaction(NewLedgerTransaction),
}

impl NewEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            NewEntry::Expense(_) => EntryKind::Expense,
            NewEntry::LedgerTransaction(_) => EntryKind::LedgerTransaction,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            NewEntry::Expense(e) => e.amount,
            NewEntry::LedgerTransaction(l) => l.amount,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            NewEntry::Expense(e) => e.date,
            NewEntry::LedgerTransaction(l) => l.date,
        }
    }

    /// Id of the category or party the entry points at
    pub fn reference_id(&self) -> &str {
        match self {
            NewEntry::Expense(e) => &e.category_id,
            NewEntry::LedgerTransaction(l) => &l.party_id,
        }
    }

    pub fn raw_voice_text(&self) -> &str {
        match self {
            NewEntry::Expense(e) => &e.raw_voice_text,
            NewEntry::LedgerTransaction(l) => &l.raw_voice_text,
        }
    }

    /// One-line human summary (no transcript)
    pub fn summary(&self) -> String {
        match self {
            NewEntry::Expense(e) => format!("expense {} on {}", e.amount, e.date),
            NewEntry::LedgerTransaction(l) => format!(
                "ledger {} {} on {}",
                l.entry_type.as_str(),
                l.amount,
                l.date
            ),
        }
    }
}

/// Committed record returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    /// Backend-assigned identifier
    pub id: String,

    pub entry: NewEntry,
}
