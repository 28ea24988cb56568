//! Docket Bot - a bot that turns court-docket filing webhooks into social media posts.
//!
//! This library provides the webhook-driven processing pipeline: idempotent
//! ingestion, the filing-event state machine, document-resolution branching
//! (free vs. purchasable vs. already-purchased), and the dependency-ordered,
//! retrying job queue that fans posts out to every enabled channel.

pub mod config;
pub mod external;
pub mod guard;
pub mod pipeline;
pub mod posts;
pub mod queue;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
