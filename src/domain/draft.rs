//! Entry drafts produced by the voice parser.
//!
//! A draft is a relative description of an entry: its date is an offset
//! from "today" that is only resolved when the entry is committed or
//! opened for editing.

use serde::{Deserialize, Serialize};

use super::reference::ReferenceKind;

/// Which kind of record a draft will become
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Expense,
    LedgerTransaction,
}

impl EntryKind {
    /// The reference kind entries of this kind must point at
    pub fn reference_kind(self) -> ReferenceKind {
        match self {
            EntryKind::Expense => ReferenceKind::Category,
            EntryKind::LedgerTransaction => ReferenceKind::Party,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::LedgerTransaction => "ledger",
        }
    }
}

/// Direction of goods or money in a client ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerTransactionType {
    #[default]
    GoodsSold,
    PaymentReceived,
    PaymentMade,
    GoodsReturned,
    GoodsTaken,
}

impl LedgerTransactionType {
    pub const ALL: [LedgerTransactionType; 5] = [
        LedgerTransactionType::GoodsSold,
        LedgerTransactionType::PaymentReceived,
        LedgerTransactionType::PaymentMade,
        LedgerTransactionType::GoodsReturned,
        LedgerTransactionType::GoodsTaken,
    ];

    /// Wire name used by the backend
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerTransactionType::GoodsSold => "goods_sold",
            LedgerTransactionType::PaymentReceived => "payment_received",
            LedgerTransactionType::PaymentMade => "payment_made",
            LedgerTransactionType::GoodsReturned => "goods_returned",
            LedgerTransactionType::GoodsTaken => "goods_taken",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            LedgerTransactionType::GoodsSold => "Goods sold",
            LedgerTransactionType::PaymentReceived => "Payment received",
            LedgerTransactionType::PaymentMade => "Payment made",
            LedgerTransactionType::GoodsReturned => "Goods returned",
            LedgerTransactionType::GoodsTaken => "Goods taken",
        }
    }

    /// Parse a wire name
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Ledger-specific part of a draft
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerDraft {
    /// Party name as heard
    pub party_name: String,

    /// Parser's hint that the party already exists (advisory only)
    pub party_match_found: bool,

    pub transaction_type: LedgerTransactionType,

    pub item_name: Option<String>,

    pub quantity: Option<f64>,

    /// Unit of quantity (kg, piece, litre...)
    pub unit: Option<String>,

    pub rate: Option<f64>,
}

/// Kind-specific part of a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DraftDetails {
    Expense {
        /// Category name as heard
        category_name: String,
        /// Parser's hint that the category already exists (advisory only)
        category_match_found: bool,
    },
    LedgerTransaction(LedgerDraft),
}

/// Unconfirmed, parser-produced guess of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Required for commit, may be missing from the parse
    pub amount: Option<f64>,

    /// Days relative to the commit date (0 = today, -1 = yesterday)
    pub date_offset_days: i64,

    pub description: Option<String>,

    /// Transcript the draft was parsed from, kept for audit
    pub raw_spoken_text: Option<String>,

    /// Parser confidence in 0.0..=1.0, if reported
    pub confidence: Option<f64>,

    pub details: DraftDetails,
}

impl EntryDraft {
    /// Create an expense draft dated today
    pub fn expense(amount: f64, category_name: impl Into<String>) -> Self {
        Self {
            amount: Some(amount),
            date_offset_days: 0,
            description: None,
            raw_spoken_text: None,
            confidence: None,
            details: DraftDetails::Expense {
                category_name: category_name.into(),
                category_match_found: false,
            },
        }
    }

    /// Create a ledger draft dated today
    pub fn ledger(
        amount: f64,
        party_name: impl Into<String>,
        transaction_type: LedgerTransactionType,
    ) -> Self {
        Self {
            amount: Some(amount),
            date_offset_days: 0,
            description: None,
            raw_spoken_text: None,
            confidence: None,
            details: DraftDetails::LedgerTransaction(LedgerDraft {
                party_name: party_name.into(),
                transaction_type,
                ..LedgerDraft::default()
            }),
        }
    }

    pub fn with_date_offset(mut self, days: i64) -> Self {
        self.date_offset_days = days;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_spoken_text = Some(text.into());
        self
    }

    /// Set the parser's advisory match flag
    pub fn with_match_hint(mut self, found: bool) -> Self {
        match &mut self.details {
            DraftDetails::Expense {
                category_match_found,
                ..
            } => *category_match_found = found,
            DraftDetails::LedgerTransaction(ledger) => ledger.party_match_found = found,
        }
        self
    }

    pub fn kind(&self) -> EntryKind {
        match self.details {
            DraftDetails::Expense { .. } => EntryKind::Expense,
            DraftDetails::LedgerTransaction(_) => EntryKind::LedgerTransaction,
        }
    }

    /// The referenced entity name (category or party) as heard
    pub fn reference_name(&self) -> &str {
        match &self.details {
            DraftDetails::Expense { category_name, .. } => category_name,
            DraftDetails::LedgerTransaction(ledger) => &ledger.party_name,
        }
    }

    /// Replace the referenced entity name, e.g. after a quick-create
    /// normalised it server-side
    pub fn set_reference_name(&mut self, name: impl Into<String>) {
        match &mut self.details {
            DraftDetails::Expense { category_name, .. } => *category_name = name.into(),
            DraftDetails::LedgerTransaction(ledger) => ledger.party_name = name.into(),
        }
    }

    /// Description that gets persisted.
    ///
    /// Expenses fall back to the transcript when no description was parsed.
    pub fn effective_description(&self) -> String {
        let description = self
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty());

        match (self.kind(), description) {
            (_, Some(d)) => d.to_string(),
            (EntryKind::Expense, None) => self.raw_spoken_text.clone().unwrap_or_default(),
            (EntryKind::LedgerTransaction, None) => String::new(),
        }
    }
}
