//! Domain records: filing events, subscriptions, channels, posts, sponsorships.
//!
//! The filing-event status machine:
//!
//! ```text
//! New ──► Successful ──► PurchaseFailed
//!  │                        ▲
//!  ├────────────────────────┘
//!  └────► Failed
//! ```
//!
//! `Failed` and `PurchaseFailed` are terminal. `Successful` additionally
//! terminates processing for events that never enter the purchase path.
//! A fetch can fail while the resolve job is still waiting out its grace
//! delay, so `PurchaseFailed` is reachable straight from `New`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::{
    ChannelId, DocketId, DocumentId, FilingEventId, PacerDocId, SponsorshipId, SubscriptionId,
};

/// Base URL of the source system, used to derive docket and document links.
pub const COURTLISTENER_URL: &str = "https://www.courtlistener.com";

/// Processing state of a filing webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    /// Just created from a webhook; not yet resolved.
    New,
    /// Linked to a subscription; posting may proceed.
    Successful,
    /// The docket is not one the bot follows. Terminal.
    Failed,
    /// A document purchase was attempted and the fetch came back failed. Terminal.
    PurchaseFailed,
}

impl FilingStatus {
    /// Returns true if no further status change is allowed from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FilingStatus::Failed | FilingStatus::PurchaseFailed)
    }

    /// Returns true if `next` is a legal transition from this state.
    pub fn can_transition_to(&self, next: FilingStatus) -> bool {
        matches!(
            (self, next),
            (FilingStatus::New, FilingStatus::Successful)
                | (FilingStatus::New, FilingStatus::Failed)
                | (FilingStatus::New, FilingStatus::PurchaseFailed)
                | (FilingStatus::Successful, FilingStatus::PurchaseFailed)
        )
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilingStatus::New => "new",
            FilingStatus::Successful => "successful",
            FilingStatus::Failed => "failed",
            FilingStatus::PurchaseFailed => "purchase_failed",
        };
        write!(f, "{}", s)
    }
}

/// Error returned when a status change would violate the state machine.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal filing status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: FilingStatus,
    pub to: FilingStatus,
}

/// One row per notified document-filing event.
///
/// Created on first notification of a given filing document; owned
/// exclusively by the pipeline and never deleted by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingWebhookEvent {
    pub id: FilingEventId,
    /// Docket the filing belongs to. Absent on malformed notifications,
    /// which the resolver leaves untouched.
    pub docket: Option<DocketId>,
    pub document: DocumentId,
    /// Set when the document can be purchased from the upstream court system.
    pub pacer_doc_id: Option<PacerDocId>,
    pub document_number: Option<u64>,
    pub attachment_number: Option<u32>,
    pub short_description: String,
    pub long_description: String,
    pub status: FilingStatus,
    /// Linked once by the resolver when the docket is one the bot follows.
    pub subscription: Option<SubscriptionId>,
    pub created_at: DateTime<Utc>,
}

impl FilingWebhookEvent {
    /// Applies a status change, enforcing the state machine.
    pub fn transition(&mut self, next: FilingStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Description used for filtering and rendering: the entry description,
    /// falling back to the document description when the entry has none.
    pub fn description(&self) -> &str {
        if self.long_description.is_empty() {
            &self.short_description
        } else {
            &self.long_description
        }
    }

    /// Link to the filing's document page in the source system.
    pub fn document_url(&self) -> String {
        match (self.docket, self.document_number) {
            (Some(docket), Some(num)) => {
                format!("{}/docket/{}/{}/", COURTLISTENER_URL, docket, num)
            }
            (Some(docket), None) => format!("{}/docket/{}/", COURTLISTENER_URL, docket),
            (None, _) => COURTLISTENER_URL.to_string(),
        }
    }
}

/// Fields for creating a [`FilingWebhookEvent`]; the store assigns id and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewFilingEvent {
    pub docket: Option<DocketId>,
    pub document: DocumentId,
    pub pacer_doc_id: Option<PacerDocId>,
    pub document_number: Option<u64>,
    pub attachment_number: Option<u32>,
    pub short_description: String,
    pub long_description: String,
}

/// A tracked docket (case) the bot follows. Read-mostly from the pipeline's
/// perspective; looked up by docket id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub docket: DocketId,
    pub name: String,
    pub case_summary: String,
}

impl Subscription {
    /// Display name with the short case summary appended, when present.
    pub fn name_with_summary(&self) -> String {
        if self.case_summary.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.case_summary)
        }
    }

    /// Link to the docket page in the source system.
    pub fn docket_url(&self) -> String {
        format!("{}/docket/{}/", COURTLISTENER_URL, self.docket)
    }
}

/// The social service a channel posts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Mastodon,
    Twitter,
    Bluesky,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Service::Mastodon => "mastodon",
            Service::Twitter => "twitter",
            Service::Bluesky => "bluesky",
        };
        write!(f, "{}", s)
    }
}

/// A configured posting destination. Read-only from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub service: Service,
    /// Account handle, for logs only.
    pub account: String,
    pub enabled: bool,
}

/// A record of a successfully published status. Created exactly once per
/// (event, channel) pair on success; never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    /// Absent for brand-new-case posts, which have no filing event.
    pub filing_event: Option<FilingEventId>,
    pub channel: ChannelId,
    /// Identifier returned by the channel's posting API.
    pub external_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a [`Post`].
#[derive(Debug, Clone)]
pub struct NewPost {
    pub filing_event: Option<FilingEventId>,
    pub channel: ChannelId,
    pub external_id: String,
    pub text: String,
}

/// An active funding source authorizing paid document purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsorship {
    pub id: SponsorshipId,
    pub user: String,
    pub active: bool,
}

/// Purchase cap: 30 pages at 10 cents a page.
pub const PURCHASE_CAP_CENTS: u32 = 300;
/// Per-page purchase price in cents.
pub const PURCHASE_PAGE_CENTS: u32 = 10;

/// Computes the charge for a purchased document, capped.
pub fn purchase_amount_cents(page_count: u32) -> u32 {
    PURCHASE_CAP_CENTS.min(page_count.saturating_mul(PURCHASE_PAGE_CENTS))
}

/// A single purchase charge. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user: String,
    pub sponsorship: SponsorshipId,
    pub amount_cents: u32,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a [`Transaction`].
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user: String,
    pub sponsorship: SponsorshipId,
    pub amount_cents: u32,
}
