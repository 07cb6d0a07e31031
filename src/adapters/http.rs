//! REST client for the bookkeeping backend.
//!
//! Talks JSON over HTTP with bearer authentication. Every failure is
//! converted into a [`WorkflowError`] here so no transport error reaches
//! the workflow.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, instrument};

use super::wire::{CreateCategory, CreateParty, CreatedRow, ErrorBody, ParsedVoice, ReferenceRow};
use super::{EntryStore, ParsingClient, ReferenceService};
use crate::capture::AudioClip;
use crate::config::ApiSettings;
use crate::domain::{EntryDraft, NewEntry, PersistedEntry, ReferenceEntity, ReferenceKind};
use crate::workflow::WorkflowError;

/// Header carrying the commit key on persist requests
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// HTTP backend client
pub struct BackendClient {
    /// Base URL, without trailing slash
    base_url: String,
    /// Bearer token (if authenticated)
    token: Option<String>,
    /// HTTP client
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    /// Create from config
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        Self::new(
            settings.base_url.clone(),
            settings.token.clone(),
            Duration::from_secs(settings.timeout_seconds),
        )
    }

    /// Build API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.api_url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn reference_path(kind: ReferenceKind) -> &'static str {
        match kind {
            ReferenceKind::Category => "/api/categories",
            ReferenceKind::Party => "/api/parties",
        }
    }

    /// Create a party with contact details (CLI "parties add")
    pub async fn create_party(
        &self,
        name: &str,
        phone: &str,
        notes: &str,
    ) -> Result<ReferenceEntity, WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::validation("name", "must not be empty"));
        }
        let response = self
            .request(Method::POST, Self::reference_path(ReferenceKind::Party))
            .json(&CreateParty { name, phone, notes })
            .send()
            .await?;
        let row: ReferenceRow = decode(check_status(response, None).await?).await?;
        Ok(row.into())
    }
}

/// Map a non-success status into the error taxonomy
async fn check_status(
    response: Response,
    missing: Option<(ReferenceKind, &str)>,
) -> Result<Response, WorkflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = ErrorBody::message(&body);
    debug!(%status, %message, "Backend returned error");

    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            WorkflowError::validation("request", message)
        }
        StatusCode::NOT_FOUND => match missing {
            Some((kind, name)) => WorkflowError::ReferenceMissing {
                kind,
                name: name.to_string(),
            },
            None => WorkflowError::Network(format!("not found: {}", message)),
        },
        StatusCode::UNAUTHORIZED => WorkflowError::Network("unauthorized, check KHATA_TOKEN".to_string()),
        _ => WorkflowError::Network(format!("{}: {}", status, message)),
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, WorkflowError> {
    response
        .json::<T>()
        .await
        .map_err(|e| WorkflowError::Network(format!("unexpected response body: {}", e)))
}

#[async_trait]
impl ParsingClient for BackendClient {
    #[instrument(skip(self, clip), fields(bytes = clip.bytes.len()))]
    async fn submit_audio(&self, clip: &AudioClip) -> Result<EntryDraft, WorkflowError> {
        let part = Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| WorkflowError::Parse(format!("bad audio type: {}", e)))?;
        let form = Form::new().part("audio", part);

        // Every failure on this path is reported as a parse failure
        let response = self
            .request(Method::POST, "/api/voice/process")
            .multipart(form)
            .send()
            .await
            .map_err(|e| WorkflowError::Parse(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkflowError::Parse(format!(
                "{}: {}",
                status,
                ErrorBody::message(&body)
            )));
        }

        let parsed: ParsedVoice = response
            .json()
            .await
            .map_err(|e| WorkflowError::Parse(format!("unreadable parser output: {}", e)))?;
        debug!(?parsed, "Parser output");

        EntryDraft::try_from(parsed)
    }
}

#[async_trait]
impl ReferenceService for BackendClient {
    #[instrument(skip(self))]
    async fn list_reference_entities(
        &self,
        kind: ReferenceKind,
    ) -> Result<Vec<ReferenceEntity>, WorkflowError> {
        let response = self
            .request(Method::GET, Self::reference_path(kind))
            .send()
            .await?;
        let rows: Vec<ReferenceRow> = decode(check_status(response, None).await?).await?;
        Ok(rows.into_iter().map(ReferenceEntity::from).collect())
    }

    #[instrument(skip(self))]
    async fn create_reference_entity(
        &self,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<ReferenceEntity, WorkflowError> {
        match kind {
            ReferenceKind::Party => self.create_party(name, "", "").await,
            ReferenceKind::Category => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(WorkflowError::validation("name", "must not be empty"));
                }
                let response = self
                    .request(Method::POST, Self::reference_path(kind))
                    .json(&CreateCategory { name })
                    .send()
                    .await?;
                let row: ReferenceRow = decode(check_status(response, None).await?).await?;
                Ok(row.into())
            }
        }
    }
}

#[async_trait]
impl EntryStore for BackendClient {
    #[instrument(skip(self, entry), fields(kind = entry.kind().label()))]
    async fn persist_entry(
        &self,
        entry: &NewEntry,
        commit_key: &str,
    ) -> Result<PersistedEntry, WorkflowError> {
        let builder = match entry {
            NewEntry::Expense(expense) => self.request(Method::POST, "/api/expenses").json(expense),
            NewEntry::LedgerTransaction(ledger) => {
                self.request(Method::POST, "/api/ledger").json(ledger)
            }
        };

        let response = builder
            .header(IDEMPOTENCY_HEADER, commit_key)
            .send()
            .await?;

        let missing = (entry.kind().reference_kind(), entry.reference_id());
        let row: CreatedRow = decode(check_status(response, Some(missing)).await?).await?;

        Ok(PersistedEntry {
            id: row.id,
            entry: entry.clone(),
        })
    }
}
