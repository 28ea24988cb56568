//! Core domain types for the filing pipeline.

pub mod ids;
pub mod records;

pub use ids::{
    ChannelId, DocketId, DocumentId, FilingEventId, IdempotencyKey, PacerDocId, SponsorshipId,
    SubscriptionId,
};
pub use records::{
    purchase_amount_cents, Channel, FilingStatus, FilingWebhookEvent, NewFilingEvent, NewPost,
    NewTransaction, Post, Service, Sponsorship, Subscription, Transaction, TransitionError,
    PURCHASE_CAP_CENTS, PURCHASE_PAGE_CENTS,
};
