//! Webhook payload parsing.
//!
//! The source system wraps every delivery in an envelope naming the event
//! type; the payload shape depends on the type. Raw deserialization structs
//! mirror the wire format and are normalized into the typed payloads the
//! router consumes (empty-string fields become `None`).

use serde::Deserialize;
use thiserror::Error;

use crate::types::{DocketId, DocumentId, PacerDocId};

/// Event-type code for docket-alert (new filing) deliveries.
const EVENT_TYPE_DOCKET_ALERT: i64 = 1;
/// Event-type code for fetch-completion deliveries.
const EVENT_TYPE_RECAP_FETCH: i64 = 3;

/// `status` value on a fetch-completion payload meaning the fetch succeeded.
pub const FETCH_SUCCESS: i64 = 2;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed webhook body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported webhook event type {0}")]
    UnsupportedEventType(i64),
}

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    DocketAlert(DocketAlertPayload),
    RecapFetch(FetchPayload),
}

/// Payload of a docket-alert delivery: the new docket entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocketAlertPayload {
    pub results: Vec<FilingResult>,
}

/// One docket entry from a docket-alert payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingResult {
    pub docket: Option<DocketId>,
    /// Entry description (the long description on the event row).
    pub description: String,
    pub entry_number: Option<u64>,
    /// Source-system ordering key; zero-padded so lexicographic order is
    /// chronological order.
    pub recap_sequence_number: String,
    pub recap_documents: Vec<FilingDocument>,
}

/// One filed document within a docket entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingDocument {
    pub id: DocumentId,
    pub pacer_doc_id: Option<PacerDocId>,
    pub description: String,
    pub attachment_number: Option<u32>,
    /// Path to the archived copy, when the source system already has one.
    pub filepath_local: Option<String>,
}

/// Payload of a fetch-completion delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPayload {
    pub document: Option<DocumentId>,
    pub docket: Option<DocketId>,
    /// [`FETCH_SUCCESS`] on success; anything else is a failed fetch.
    pub status: i64,
    pub page_count: Option<u32>,
}

impl FetchPayload {
    pub fn is_success(&self) -> bool {
        self.status == FETCH_SUCCESS
    }
}

// ─── Wire format ───

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    webhook: RawWebhook,
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawWebhook {
    event_type: i64,
}

#[derive(Debug, Deserialize)]
struct RawDocketAlert {
    #[serde(default)]
    results: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    docket: Option<u64>,
    #[serde(default)]
    description: String,
    entry_number: Option<u64>,
    #[serde(default)]
    recap_sequence_number: String,
    #[serde(default)]
    recap_documents: Vec<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    id: u64,
    pacer_doc_id: Option<String>,
    #[serde(default)]
    description: String,
    attachment_number: Option<u32>,
    filepath_local: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFetch {
    recap_document: Option<u64>,
    docket: Option<u64>,
    status: i64,
    page_count: Option<u32>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.is_empty())
}

/// Parses a webhook body into a typed event.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookEvent, ParseError> {
    let envelope: RawEnvelope = serde_json::from_slice(body)?;
    match envelope.webhook.event_type {
        EVENT_TYPE_DOCKET_ALERT => {
            let raw: RawDocketAlert = serde_json::from_value(envelope.payload)?;
            let results = raw
                .results
                .into_iter()
                .map(|entry| FilingResult {
                    docket: entry.docket.map(DocketId),
                    description: entry.description,
                    entry_number: entry.entry_number,
                    recap_sequence_number: entry.recap_sequence_number,
                    recap_documents: entry
                        .recap_documents
                        .into_iter()
                        .map(|doc| FilingDocument {
                            id: DocumentId(doc.id),
                            pacer_doc_id: non_empty(doc.pacer_doc_id).map(PacerDocId),
                            description: doc.description,
                            attachment_number: doc.attachment_number,
                            filepath_local: non_empty(doc.filepath_local),
                        })
                        .collect(),
                })
                .collect();
            Ok(WebhookEvent::DocketAlert(DocketAlertPayload { results }))
        }
        EVENT_TYPE_RECAP_FETCH => {
            let raw: RawFetch = serde_json::from_value(envelope.payload)?;
            Ok(WebhookEvent::RecapFetch(FetchPayload {
                document: raw.recap_document.map(DocumentId),
                docket: raw.docket.map(DocketId),
                status: raw.status,
                page_count: raw.page_count,
            }))
        }
        other => Err(ParseError::UnsupportedEventType(other)),
    }
}
