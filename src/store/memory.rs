//! In-process record store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{RecordStore, StoreError};
use crate::types::{
    Channel, ChannelId, DocketId, DocumentId, FilingEventId, FilingStatus, FilingWebhookEvent,
    NewFilingEvent, NewPost, NewTransaction, Post, Sponsorship, Subscription, SubscriptionId,
    Transaction, TransitionError,
};

#[derive(Debug, Default)]
struct Inner {
    next_event_id: u64,
    next_post_id: u64,
    next_transaction_id: u64,
    filing_events: Vec<FilingWebhookEvent>,
    subscriptions: Vec<Subscription>,
    channels: Vec<Channel>,
    sponsorships: Vec<Sponsorship>,
    posts: Vec<Post>,
    transactions: Vec<Transaction>,
}

/// [`RecordStore`] backed by a mutex-guarded in-memory table set.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store lock poisoned")
    }

    /// Seeds a subscription row.
    pub fn add_subscription(&self, subscription: Subscription) {
        self.lock().subscriptions.push(subscription);
    }

    /// Seeds a channel row.
    pub fn add_channel(&self, channel: Channel) {
        self.lock().channels.push(channel);
    }

    /// Seeds a sponsorship row.
    pub fn add_sponsorship(&self, sponsorship: Sponsorship) {
        self.lock().sponsorships.push(sponsorship);
    }

    /// All recorded transactions, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    /// All recorded posts, oldest first.
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_filing_event(
        &self,
        event: NewFilingEvent,
    ) -> Result<FilingWebhookEvent, StoreError> {
        let mut inner = self.lock();
        inner.next_event_id += 1;
        let row = FilingWebhookEvent {
            id: FilingEventId(inner.next_event_id),
            docket: event.docket,
            document: event.document,
            pacer_doc_id: event.pacer_doc_id,
            document_number: event.document_number,
            attachment_number: event.attachment_number,
            short_description: event.short_description,
            long_description: event.long_description,
            status: FilingStatus::New,
            subscription: None,
            created_at: Utc::now(),
        };
        inner.filing_events.push(row.clone());
        Ok(row)
    }

    async fn filing_event(&self, id: FilingEventId) -> Result<FilingWebhookEvent, StoreError> {
        self.lock()
            .filing_events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("filing event", id))
    }

    async fn filing_event_by_document(
        &self,
        document: DocumentId,
    ) -> Result<Option<FilingWebhookEvent>, StoreError> {
        Ok(self
            .lock()
            .filing_events
            .iter()
            .find(|e| e.document == document)
            .cloned())
    }

    async fn update_filing_event(&self, event: &FilingWebhookEvent) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let row = inner
            .filing_events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| StoreError::not_found("filing event", event.id))?;
        if event.status != row.status && !row.status.can_transition_to(event.status) {
            return Err(StoreError::InvalidTransition(TransitionError {
                from: row.status,
                to: event.status,
            }));
        }
        *row = event.clone();
        Ok(())
    }

    async fn subscription(&self, id: SubscriptionId) -> Result<Subscription, StoreError> {
        self.lock()
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("subscription", id))
    }

    async fn subscription_by_docket(
        &self,
        docket: DocketId,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .find(|s| s.docket == docket)
            .cloned())
    }

    async fn channel(&self, id: ChannelId) -> Result<Channel, StoreError> {
        self.lock()
            .channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("channel", id))
    }

    async fn enabled_channels(&self) -> Result<Vec<Channel>, StoreError> {
        Ok(self
            .lock()
            .channels
            .iter()
            .filter(|c| c.enabled)
            .cloned()
            .collect())
    }

    async fn active_sponsorship(&self) -> Result<Option<Sponsorship>, StoreError> {
        Ok(self
            .lock()
            .sponsorships
            .iter()
            .find(|s| s.active)
            .cloned())
    }

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let mut inner = self.lock();
        inner.next_transaction_id += 1;
        let row = Transaction {
            id: inner.next_transaction_id,
            user: transaction.user,
            sponsorship: transaction.sponsorship,
            amount_cents: transaction.amount_cents,
            created_at: Utc::now(),
        };
        inner.transactions.push(row.clone());
        Ok(row)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut inner = self.lock();
        inner.next_post_id += 1;
        let row = Post {
            id: inner.next_post_id,
            filing_event: post.filing_event,
            channel: post.channel,
            external_id: post.external_id,
            text: post.text,
            created_at: Utc::now(),
        };
        inner.posts.push(row.clone());
        Ok(row)
    }

    async fn posts_for_event(&self, event: FilingEventId) -> Result<Vec<Post>, StoreError> {
        Ok(self
            .lock()
            .posts
            .iter()
            .filter(|p| p.filing_event == Some(event))
            .cloned()
            .collect())
    }
}
