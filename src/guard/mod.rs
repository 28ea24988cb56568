//! Idempotency guard for webhook deliveries.
//!
//! The source system delivers webhooks at least once and stamps every
//! delivery with an `Idempotency-Key` header. This guard deduplicates
//! redeliveries within a retention window using a reserve-then-confirm
//! protocol:
//!
//! 1. [`IdempotencyGuard::check_and_reserve`] — a fresh key is recorded as a
//!    *reservation* before any work happens. A redelivery that races in
//!    while the first handler is still enqueueing jobs sees the reservation
//!    and short-circuits, so the same notification can never be enqueued
//!    twice.
//! 2. [`IdempotencyGuard::mark_processed`] — on success the reservation is
//!    confirmed and retained for two days.
//! 3. [`IdempotencyGuard::release`] — on handler failure the reservation is
//!    dropped so the source system's redelivery gets a clean retry.
//!
//! Unconfirmed reservations expire after a short TTL so a crashed handler
//! cannot wedge a key forever. Expired entries are pruned to keep the store
//! bounded.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::types::IdempotencyKey;

/// How long a confirmed key is retained (two days).
pub const PROCESSED_TTL_HOURS: i64 = 48;

/// How long an unconfirmed reservation blocks redeliveries.
pub const RESERVATION_TTL_MINUTES: i64 = 10;

/// Outcome of [`IdempotencyGuard::check_and_reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// First sighting of this key; the caller owns it and must confirm or
    /// release it.
    Fresh,
    /// The key is reserved or confirmed; the caller must short-circuit.
    AlreadyProcessed,
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Reserved { at: DateTime<Utc> },
    Processed { at: DateTime<Utc> },
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Entry::Reserved { at } => now - *at > Duration::minutes(RESERVATION_TTL_MINUTES),
            Entry::Processed { at } => now - *at > Duration::hours(PROCESSED_TTL_HOURS),
        }
    }
}

/// Short-lived key/value dedupe gate in front of webhook handling.
#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    seen: Mutex<HashMap<String, Entry>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the key and, if unseen, reserves it atomically.
    pub fn check_and_reserve(&self, key: &IdempotencyKey) -> Reservation {
        let now = Utc::now();
        let mut seen = self.seen.lock().expect("guard lock poisoned");
        match seen.get(key.as_str()) {
            Some(entry) if !entry.is_expired(now) => Reservation::AlreadyProcessed,
            _ => {
                seen.insert(key.as_str().to_string(), Entry::Reserved { at: now });
                Reservation::Fresh
            }
        }
    }

    /// Confirms a reservation after the delivery was fully handled.
    pub fn mark_processed(&self, key: &IdempotencyKey) {
        let mut seen = self.seen.lock().expect("guard lock poisoned");
        seen.insert(
            key.as_str().to_string(),
            Entry::Processed { at: Utc::now() },
        );
    }

    /// Drops a reservation so a redelivery can retry the failed handling.
    pub fn release(&self, key: &IdempotencyKey) {
        let mut seen = self.seen.lock().expect("guard lock poisoned");
        // Only reservations are released; a confirmed key stays confirmed.
        if let Some(Entry::Reserved { .. }) = seen.get(key.as_str()) {
            seen.remove(key.as_str());
        }
    }

    /// Prunes expired entries. Returns the number removed.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut seen = self.seen.lock().expect("guard lock poisoned");
        let before = seen.len();
        seen.retain(|_, entry| !entry.is_expired(now));
        before - seen.len()
    }

    #[cfg(test)]
    fn force_entry(&self, key: &IdempotencyKey, entry: Entry) {
        self.seen
            .lock()
            .unwrap()
            .insert(key.as_str().to_string(), entry);
    }
}
