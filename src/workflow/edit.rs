//! Draft-to-entry field mapping and the edit buffer.
//!
//! `accept` maps a draft straight to a [`NewEntry`]; `edit` copies the
//! same values into an [`EditBuffer`] as text so that saving an untouched
//! buffer persists exactly what `accept` would have.

use chrono::{Duration, NaiveDate};

use super::WorkflowError;
use crate::domain::{
    DraftDetails, EntryDraft, EntryKind, LedgerTransactionType, NewEntry, NewExpense,
    NewLedgerTransaction, ReferenceEntity, ReferenceKind, ReferenceSet,
};

/// Resolve a relative day offset against `today`
pub fn resolve_date(today: NaiveDate, offset_days: i64) -> Result<NaiveDate, WorkflowError> {
    Duration::try_days(offset_days)
        .and_then(|delta| today.checked_add_signed(delta))
        .ok_or_else(|| WorkflowError::validation("date", format!("offset {} days is out of range", offset_days)))
}

fn check_amount(field: &str, value: f64) -> Result<f64, WorkflowError> {
    if !value.is_finite() || value < 0.0 {
        return Err(WorkflowError::validation(field, "must be a non-negative number"));
    }
    Ok(value)
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Parse a numeric form field; empty text is `None`
fn parse_number(field: &str, text: &str) -> Result<Option<f64>, WorkflowError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let value: f64 = text
        .parse()
        .map_err(|_| WorkflowError::validation(field, format!("'{}' is not a number", text)))?;
    check_amount(field, value).map(Some)
}

/// Build the entry `accept` persists
pub fn draft_to_entry(
    draft: &EntryDraft,
    reference: &ReferenceEntity,
    today: NaiveDate,
) -> Result<NewEntry, WorkflowError> {
    let amount = draft
        .amount
        .ok_or_else(|| WorkflowError::validation("amount", "is required"))
        .and_then(|a| check_amount("amount", a))?;
    let date = resolve_date(today, draft.date_offset_days)?;
    let description = draft.effective_description();
    let raw_voice_text = draft.raw_spoken_text.clone().unwrap_or_default();

    Ok(match &draft.details {
        DraftDetails::Expense { .. } => NewEntry::Expense(NewExpense {
            category_id: reference.id.clone(),
            amount,
            description,
            raw_voice_text,
            date,
        }),
        DraftDetails::LedgerTransaction(ledger) => {
            NewEntry::LedgerTransaction(NewLedgerTransaction {
                party_id: reference.id.clone(),
                entry_type: ledger.transaction_type,
                item_name: ledger.item_name.clone().unwrap_or_default(),
                quantity: ledger.quantity,
                unit: ledger.unit.clone().unwrap_or_default(),
                rate: ledger.rate,
                amount,
                description,
                raw_voice_text,
                date,
            })
        }
    })
}

/// Mutable copy of a draft's fields for form editing.
///
/// Numbers are held as text; the date is resolved once when the buffer is
/// created and frozen from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct EditBuffer {
    kind: EntryKind,
    /// Category/party name, or an id picked directly
    pub reference: String,
    pub transaction_type: LedgerTransactionType,
    pub item_name: String,
    pub quantity: String,
    pub unit: String,
    pub rate: String,
    pub amount: String,
    pub description: String,
    pub date: NaiveDate,
    raw_voice_text: String,
}

impl EditBuffer {
    /// Copy a draft, resolving its date against `today`
    pub fn from_draft(draft: &EntryDraft, today: NaiveDate) -> Result<Self, WorkflowError> {
        let date = resolve_date(today, draft.date_offset_days)?;

        let mut buffer = Self {
            kind: draft.kind(),
            reference: draft.reference_name().to_string(),
            transaction_type: LedgerTransactionType::default(),
            item_name: String::new(),
            quantity: String::new(),
            unit: String::new(),
            rate: String::new(),
            amount: format_number(draft.amount),
            description: draft.effective_description(),
            date,
            raw_voice_text: draft.raw_spoken_text.clone().unwrap_or_default(),
        };

        if let DraftDetails::LedgerTransaction(ledger) = &draft.details {
            buffer.transaction_type = ledger.transaction_type;
            buffer.item_name = ledger.item_name.clone().unwrap_or_default();
            buffer.quantity = format_number(ledger.quantity);
            buffer.unit = ledger.unit.clone().unwrap_or_default();
            buffer.rate = format_number(ledger.rate);
        }

        Ok(buffer)
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Transcript the draft came from; not editable
    pub fn raw_voice_text(&self) -> &str {
        &self.raw_voice_text
    }

    /// Resolve the reference by name, then by raw id
    pub fn resolve_reference<'a>(
        &self,
        references: &'a ReferenceSet,
    ) -> Result<&'a ReferenceEntity, WorkflowError> {
        references
            .resolve(self.reference.trim())
            .ok_or_else(|| WorkflowError::ReferenceMissing {
                kind: self.reference_kind(),
                name: self.reference.trim().to_string(),
            })
    }

    pub fn reference_kind(&self) -> ReferenceKind {
        self.kind.reference_kind()
    }

    /// Validate the buffer into an entry; numeric fields fail fast
    pub fn to_entry(&self, references: &ReferenceSet) -> Result<NewEntry, WorkflowError> {
        let reference = self.resolve_reference(references)?;
        let amount = parse_number("amount", &self.amount)?
            .ok_or_else(|| WorkflowError::validation("amount", "is required"))?;

        Ok(match self.kind {
            EntryKind::Expense => NewEntry::Expense(NewExpense {
                category_id: reference.id.clone(),
                amount,
                description: self.description.clone(),
                raw_voice_text: self.raw_voice_text.clone(),
                date: self.date,
            }),
            EntryKind::LedgerTransaction => NewEntry::LedgerTransaction(NewLedgerTransaction {
                party_id: reference.id.clone(),
                entry_type: self.transaction_type,
                item_name: self.item_name.clone(),
                quantity: parse_number("quantity", &self.quantity)?,
                unit: self.unit.clone(),
                rate: parse_number("rate", &self.rate)?,
                amount,
                description: self.description.clone(),
                raw_voice_text: self.raw_voice_text.clone(),
                date: self.date,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parties() -> ReferenceSet {
        vec![ReferenceEntity::new("p1", "Ramesh")].into_iter().collect()
    }

    fn ledger_draft() -> EntryDraft {
        let mut draft = EntryDraft::ledger(250.0, "ramesh", LedgerTransactionType::GoodsSold)
            .with_raw_text("ramesh ko 5 kg atta 50 ke rate se")
            .with_date_offset(-2);
        if let DraftDetails::LedgerTransaction(ledger) = &mut draft.details {
            ledger.item_name = Some("atta".to_string());
            ledger.quantity = Some(5.0);
            ledger.unit = Some("kg".to_string());
            ledger.rate = Some(50.0);
        }
        draft
    }

    #[test]
    fn test_resolve_date_crosses_month() {
        assert_eq!(resolve_date(day(2024, 3, 1), -1).unwrap(), day(2024, 2, 29));
        assert_eq!(resolve_date(day(2024, 3, 1), 0).unwrap(), day(2024, 3, 1));
        assert!(resolve_date(day(2024, 3, 1), i64::MAX).is_err());
    }

    #[test]
    fn test_buffer_prefill_matches_accept() {
        let draft = ledger_draft();
        let today = day(2024, 6, 10);
        let set = parties();

        let accepted = draft_to_entry(&draft, set.find_by_name("Ramesh").unwrap(), today).unwrap();
        let buffer = EditBuffer::from_draft(&draft, today).unwrap();

        assert_eq!(buffer.quantity, "5");
        assert_eq!(buffer.rate, "50");
        assert_eq!(buffer.date, day(2024, 6, 8));
        assert_eq!(buffer.to_entry(&set).unwrap(), accepted);
    }

    #[test]
    fn test_non_numeric_field_fails_fast() {
        let mut buffer = EditBuffer::from_draft(&ledger_draft(), day(2024, 6, 10)).unwrap();
        buffer.rate = "fifty".to_string();

        match buffer.to_entry(&parties()) {
            Err(WorkflowError::Validation { field, .. }) => assert_eq!(field, "rate"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_optional_numbers_are_absent() {
        let mut buffer = EditBuffer::from_draft(&ledger_draft(), day(2024, 6, 10)).unwrap();
        buffer.quantity = "  ".to_string();
        buffer.rate.clear();

        match buffer.to_entry(&parties()).unwrap() {
            NewEntry::LedgerTransaction(l) => {
                assert_eq!(l.quantity, None);
                assert_eq!(l.rate, None);
            }
            _ => panic!("expected ledger entry"),
        }
    }

    #[test]
    fn test_amount_required() {
        let mut buffer = EditBuffer::from_draft(&ledger_draft(), day(2024, 6, 10)).unwrap();
        buffer.amount.clear();
        assert!(matches!(
            buffer.to_entry(&parties()),
            Err(WorkflowError::Validation { .. })
        ));

        let mut draft = ledger_draft();
        draft.amount = None;
        let err = draft_to_entry(&draft, &ReferenceEntity::new("p1", "Ramesh"), day(2024, 6, 10))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { .. }));
    }

    #[test]
    fn test_reference_resolves_by_id_fallback() {
        let mut buffer = EditBuffer::from_draft(&ledger_draft(), day(2024, 6, 10)).unwrap();
        buffer.reference = "p1".to_string();
        assert_eq!(buffer.to_entry(&parties()).unwrap().reference_id(), "p1");

        buffer.reference = "Mahesh".to_string();
        assert!(matches!(
            buffer.to_entry(&parties()),
            Err(WorkflowError::ReferenceMissing { .. })
        ));
    }
}
