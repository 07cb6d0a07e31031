//! JSON shapes exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::domain::{
    DraftDetails, EntryDraft, LedgerDraft, LedgerTransactionType, ReferenceEntity,
};
use crate::workflow::WorkflowError;

/// Parser output from `POST /api/voice/process`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedVoice {
    /// "expense", "ledger", or something unusable
    #[serde(rename = "type", default)]
    pub entry_type_tag: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub category_match_found: Option<bool>,
    #[serde(default)]
    pub party_name: Option<String>,
    #[serde(default)]
    pub party_match_found: Option<bool>,
    #[serde(default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date_offset_days: Option<i64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub transcribed_text: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TryFrom<ParsedVoice> for EntryDraft {
    type Error = WorkflowError;

    fn try_from(parsed: ParsedVoice) -> Result<Self, Self::Error> {
        let tag = parsed.entry_type_tag.as_deref().unwrap_or("unknown").trim();

        let details = match tag {
            "expense" => DraftDetails::Expense {
                category_name: non_empty(parsed.category).unwrap_or_default(),
                category_match_found: parsed.category_match_found.unwrap_or(false),
            },
            "ledger" => {
                let transaction_type = match non_empty(parsed.entry_type) {
                    None => LedgerTransactionType::default(),
                    Some(wire) => LedgerTransactionType::from_wire(&wire).ok_or_else(|| {
                        WorkflowError::Parse(format!("unknown transaction type '{}'", wire))
                    })?,
                };
                DraftDetails::LedgerTransaction(LedgerDraft {
                    party_name: non_empty(parsed.party_name).unwrap_or_default(),
                    party_match_found: parsed.party_match_found.unwrap_or(false),
                    transaction_type,
                    item_name: non_empty(parsed.item_name),
                    quantity: parsed.quantity,
                    unit: non_empty(parsed.unit),
                    rate: parsed.rate,
                })
            }
            other => {
                return Err(WorkflowError::Parse(format!(
                    "recording was understood as '{}', not an expense or ledger entry",
                    other
                )))
            }
        };

        // Spoken "2 kg at 60" without a total
        let amount = match (parsed.amount, &details) {
            (Some(amount), _) => Some(amount),
            (None, DraftDetails::LedgerTransaction(ledger)) => match (ledger.quantity, ledger.rate) {
                (Some(q), Some(r)) => Some(q * r),
                _ => None,
            },
            (None, DraftDetails::Expense { .. }) => None,
        };

        if let Some(amount) = amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(WorkflowError::Parse(format!("unusable amount {}", amount)));
            }
        }

        Ok(EntryDraft {
            amount,
            date_offset_days: parsed.date_offset_days.unwrap_or(0),
            description: non_empty(parsed.description),
            raw_spoken_text: non_empty(parsed.raw_text).or(non_empty(parsed.transcribed_text)),
            confidence: parsed.confidence,
            details,
        })
    }
}

/// Category / party row; the backend sends more columns than we use
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceRow {
    pub id: String,
    pub name: String,
}

impl From<ReferenceRow> for ReferenceEntity {
    fn from(row: ReferenceRow) -> Self {
        ReferenceEntity::new(row.id, row.name)
    }
}

/// Body for `POST /api/categories`
#[derive(Debug, Serialize)]
pub struct CreateCategory<'a> {
    pub name: &'a str,
}

/// Body for `POST /api/parties`
#[derive(Debug, Serialize)]
pub struct CreateParty<'a> {
    pub name: &'a str,
    pub phone: &'a str,
    pub notes: &'a str,
}

/// Any created row; only the id matters
#[derive(Debug, Deserialize)]
pub struct CreatedRow {
    pub id: String,
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Best-effort message from an error response body
    pub fn message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(s),
            }) => s,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => body.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryKind;

    fn parse(json: &str) -> Result<EntryDraft, WorkflowError> {
        let parsed: ParsedVoice = serde_json::from_str(json).unwrap();
        EntryDraft::try_from(parsed)
    }

    #[test]
    fn test_expense_parse() {
        let draft = parse(
            r#"{"type":"expense","category":"Fuel","category_match_found":true,
                "amount":500,"description":"","date_offset_days":-1,
                "raw_text":"kal 500 ka petrol","confidence":0.9}"#,
        )
        .unwrap();

        assert_eq!(draft.kind(), EntryKind::Expense);
        assert_eq!(draft.reference_name(), "Fuel");
        assert_eq!(draft.amount, Some(500.0));
        assert_eq!(draft.date_offset_days, -1);
        assert_eq!(draft.description, None);
        assert_eq!(draft.raw_spoken_text.as_deref(), Some("kal 500 ka petrol"));
    }

    #[test]
    fn test_ledger_amount_from_quantity_and_rate() {
        let draft = parse(
            r#"{"type":"ledger","party_name":"Ramesh","entry_type":"goods_sold",
                "item_name":"atta","quantity":5,"unit":"kg","rate":40}"#,
        )
        .unwrap();

        assert_eq!(draft.amount, Some(200.0));
        match draft.details {
            DraftDetails::LedgerTransaction(ledger) => {
                assert_eq!(ledger.transaction_type, LedgerTransactionType::GoodsSold);
                assert_eq!(ledger.unit.as_deref(), Some("kg"));
            }
            _ => panic!("expected ledger draft"),
        }
    }

    #[test]
    fn test_missing_entry_type_defaults_to_goods_sold() {
        let draft = parse(r#"{"type":"ledger","party_name":"Ramesh","amount":10}"#).unwrap();
        match draft.details {
            DraftDetails::LedgerTransaction(ledger) => {
                assert_eq!(ledger.transaction_type, LedgerTransactionType::GoodsSold)
            }
            _ => panic!("expected ledger draft"),
        }
    }

    #[test]
    fn test_unusable_types_are_parse_errors() {
        for tag in ["delete_last", "correction", "unknown"] {
            let json = format!(r#"{{"type":"{}","amount":1}}"#, tag);
            assert!(matches!(parse(&json), Err(WorkflowError::Parse(_))), "{}", tag);
        }
        assert!(matches!(parse("{}"), Err(WorkflowError::Parse(_))));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let result = parse(r#"{"type":"expense","category":"Tea","amount":-5}"#);
        assert!(matches!(result, Err(WorkflowError::Parse(_))));
    }

    #[test]
    fn test_transcribed_text_fallback() {
        let draft = parse(r#"{"type":"expense","category":"Tea","amount":5,"transcribed_text":"chai"}"#)
            .unwrap();
        assert_eq!(draft.raw_spoken_text.as_deref(), Some("chai"));
    }

    #[test]
    fn test_error_body_message() {
        assert_eq!(ErrorBody::message(r#"{"detail":"Audio too short"}"#), "Audio too short");
        assert_eq!(ErrorBody::message("Internal Server Error"), "Internal Server Error");
    }
}
