//! Routing of parsed webhooks into stored rows and queued jobs.
//!
//! The router owns the ingestion invariants: every delivery passes the
//! idempotency guard before any row or job is created, docket entries are
//! processed in source-system order, and each filing document gets exactly
//! one event row plus a resolve job and a dependent posting-check job.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::guard::{IdempotencyGuard, Reservation};
use crate::queue::{EnqueueOptions, FetchTarget, Job, JobQueue, PostJob, RetrySpec};
use crate::store::{RecordStore, StoreError};
use crate::types::{
    FilingStatus, FilingWebhookEvent, IdempotencyKey, NewFilingEvent, SubscriptionId,
};

use super::parser::{DocketAlertPayload, FetchPayload};

/// Scheduling knobs for ingestion.
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Grace period before resolving a filing whose document is not yet
    /// archived, giving the source system time to fetch free copies.
    pub webhook_delay: Duration,
    /// Retry policy applied to every queued job.
    pub retry: RetrySpec,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            webhook_delay: Duration::minutes(2),
            retry: RetrySpec {
                max_retries: 3,
                interval: Duration::minutes(1),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of routing one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The delivery was ingested.
    Processed,
    /// A delivery with this idempotency key was already handled.
    AlreadyProcessed,
}

pub struct WebhookRouter {
    store: Arc<dyn RecordStore>,
    queue: Arc<JobQueue>,
    guard: Arc<IdempotencyGuard>,
    options: RouterOptions,
}

impl WebhookRouter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<JobQueue>,
        guard: Arc<IdempotencyGuard>,
        options: RouterOptions,
    ) -> Self {
        WebhookRouter {
            store,
            queue,
            guard,
            options,
        }
    }

    /// Ingests a docket-alert delivery: one event row and one resolve/check
    /// job pair per filing document, in source-system order.
    pub async fn handle_docket_alert(
        &self,
        key: &IdempotencyKey,
        payload: &DocketAlertPayload,
    ) -> Result<RouteOutcome, RouteError> {
        if self.guard.check_and_reserve(key) == Reservation::AlreadyProcessed {
            info!(%key, "duplicate docket-alert delivery ignored");
            return Ok(RouteOutcome::AlreadyProcessed);
        }

        match self.ingest_docket_alert(payload).await {
            Ok(()) => {
                self.guard.mark_processed(key);
                Ok(RouteOutcome::Processed)
            }
            Err(err) => {
                // Let the source system's redelivery retry the whole thing.
                self.guard.release(key);
                Err(err)
            }
        }
    }

    async fn ingest_docket_alert(&self, payload: &DocketAlertPayload) -> Result<(), RouteError> {
        // Source-system ordering keys are zero-padded, so lexicographic
        // order is chronological order.
        let mut entries: Vec<_> = payload.results.iter().collect();
        entries.sort_by(|a, b| a.recap_sequence_number.cmp(&b.recap_sequence_number));

        for entry in entries {
            for document in &entry.recap_documents {
                let event = self
                    .store
                    .create_filing_event(NewFilingEvent {
                        docket: entry.docket,
                        document: document.id,
                        pacer_doc_id: document.pacer_doc_id.clone(),
                        document_number: entry.entry_number,
                        attachment_number: document.attachment_number,
                        short_description: document.description.clone(),
                        long_description: entry.description.clone(),
                    })
                    .await?;
                info!(event = %event.id, document = %document.id, "filing event created");

                // Documents already archived can resolve immediately; the
                // rest wait out the grace period.
                let delay = if document.filepath_local.is_some() {
                    Duration::zero()
                } else {
                    self.options.webhook_delay
                };
                let resolve = self.queue.enqueue(
                    Job::ProcessFiling { event: event.id },
                    EnqueueOptions {
                        delay,
                        depends_on: None,
                        retry: self.options.retry,
                    },
                );
                // The dependency alone holds the check back; it needs no
                // delay of its own.
                self.queue.enqueue(
                    Job::CheckBeforePosting { event: event.id },
                    EnqueueOptions {
                        depends_on: Some(resolve),
                        retry: self.options.retry,
                        ..Default::default()
                    },
                );
            }
        }
        Ok(())
    }

    /// Ingests a fetch-completion delivery.
    pub async fn handle_recap_fetch(
        &self,
        key: &IdempotencyKey,
        payload: &FetchPayload,
    ) -> Result<RouteOutcome, RouteError> {
        if self.guard.check_and_reserve(key) == Reservation::AlreadyProcessed {
            info!(%key, "duplicate fetch delivery ignored");
            return Ok(RouteOutcome::AlreadyProcessed);
        }

        match self.ingest_recap_fetch(payload).await {
            Ok(()) => {
                self.guard.mark_processed(key);
                Ok(RouteOutcome::Processed)
            }
            Err(err) => {
                self.guard.release(key);
                Err(err)
            }
        }
    }

    async fn ingest_recap_fetch(&self, payload: &FetchPayload) -> Result<(), RouteError> {
        // A fetch matches either a filing event (document purchase) or a
        // followed docket (new-case document fetch), in that order.
        if let Some(document) = payload.document {
            if let Some(event) = self.store.filing_event_by_document(document).await? {
                return self.fetch_for_filing(payload, event).await;
            }
        }
        if let Some(docket) = payload.docket {
            if let Some(subscription) = self.store.subscription_by_docket(docket).await? {
                if payload.is_success() {
                    if let Some(document) = payload.document {
                        self.queue.enqueue(
                            Job::ProcessFetch {
                                target: FetchTarget::Subscription {
                                    subscription: subscription.id,
                                    document,
                                },
                            },
                            EnqueueOptions {
                                retry: self.options.retry,
                                ..Default::default()
                            },
                        );
                        return Ok(());
                    }
                }
                // Failed or document-less fetch for a new case: announce the
                // case without a document.
                self.enqueue_new_case_posts(subscription.id).await?;
                return Ok(());
            }
        }

        // Fetches the bot has no record of are acknowledged and dropped so
        // the source system stops redelivering them.
        warn!(
            document = ?payload.document,
            docket = ?payload.docket,
            "fetch delivery matches no known filing or docket"
        );
        Ok(())
    }

    async fn fetch_for_filing(
        &self,
        payload: &FetchPayload,
        mut event: FilingWebhookEvent,
    ) -> Result<(), RouteError> {
        if payload.is_success() {
            self.queue.enqueue(
                Job::ProcessFetch {
                    target: FetchTarget::Filing { event: event.id },
                },
                EnqueueOptions {
                    retry: self.options.retry,
                    ..Default::default()
                },
            );
            return Ok(());
        }

        warn!(event = %event.id, status = payload.status, "document purchase failed");
        // A redelivered failure under a fresh key finds the event already
        // marked; only the first failure needs the write.
        if event.status != FilingStatus::PurchaseFailed {
            event
                .transition(FilingStatus::PurchaseFailed)
                .map_err(StoreError::from)?;
            self.store.update_filing_event(&event).await?;
        }

        // Post anyway, without the document.
        if let Some(subscription) = event.subscription {
            for channel in self.store.enabled_channels().await? {
                self.queue.enqueue(
                    Job::PostToChannel(PostJob {
                        channel: channel.id,
                        subscription,
                        event: Some(event.id),
                        document: None,
                    }),
                    EnqueueOptions {
                        retry: self.options.retry,
                        ..Default::default()
                    },
                );
            }
        }
        Ok(())
    }

    async fn enqueue_new_case_posts(
        &self,
        subscription: SubscriptionId,
    ) -> Result<(), RouteError> {
        for channel in self.store.enabled_channels().await? {
            self.queue.enqueue(
                Job::PostToChannel(PostJob {
                    channel: channel.id,
                    subscription,
                    event: None,
                    document: None,
                }),
                EnqueueOptions {
                    retry: self.options.retry,
                    ..Default::default()
                },
            );
        }
        Ok(())
    }
}
