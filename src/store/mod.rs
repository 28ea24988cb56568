//! Persistence seam for domain records.
//!
//! The pipeline only sees [`RecordStore`]; [`memory::MemoryStore`] is the
//! in-process implementation used by the binary and by tests. Status changes
//! go through [`RecordStore::update_filing_event`], which enforces the filing
//! status machine.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    Channel, ChannelId, DocketId, DocumentId, FilingEventId, FilingWebhookEvent, NewFilingEvent,
    NewPost, NewTransaction, Post, Sponsorship, Subscription, SubscriptionId, Transaction,
    TransitionError,
};

pub mod memory;

pub use memory::MemoryStore;

/// Errors from the record store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Storage for filing events, subscriptions, channels, posts, transactions
/// and sponsorships.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_filing_event(
        &self,
        event: NewFilingEvent,
    ) -> Result<FilingWebhookEvent, StoreError>;

    async fn filing_event(&self, id: FilingEventId) -> Result<FilingWebhookEvent, StoreError>;

    /// Looks up the event row created for a given filing document, if one
    /// exists.
    async fn filing_event_by_document(
        &self,
        document: DocumentId,
    ) -> Result<Option<FilingWebhookEvent>, StoreError>;

    /// Writes back a modified event row. Fails if the status change is not a
    /// legal transition from the stored row's status.
    async fn update_filing_event(&self, event: &FilingWebhookEvent) -> Result<(), StoreError>;

    async fn subscription(&self, id: SubscriptionId) -> Result<Subscription, StoreError>;

    async fn subscription_by_docket(
        &self,
        docket: DocketId,
    ) -> Result<Option<Subscription>, StoreError>;

    async fn channel(&self, id: ChannelId) -> Result<Channel, StoreError>;

    async fn enabled_channels(&self) -> Result<Vec<Channel>, StoreError>;

    /// The sponsorship that pays for document purchases, if one is active.
    async fn active_sponsorship(&self) -> Result<Option<Sponsorship>, StoreError>;

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, StoreError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn posts_for_event(&self, event: FilingEventId) -> Result<Vec<Post>, StoreError>;
}
