//! In-process job queue with delays, dependencies and retries.
//!
//! Jobs are claimed in FIFO order among those that are *due*: their
//! scheduled time has passed and the job they depend on (if any) has
//! finished or failed. A failed execution is retried per its
//! [`RetrySpec`]; once retries are exhausted the job lands in the failed
//! ledger for operator inspection and its dependents are unblocked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::external::DocumentBlob;
use crate::pipeline::Pipeline;
use crate::types::{ChannelId, DocumentId, FilingEventId, SubscriptionId};

/// What a fetch-completion refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    /// A purchase requested for an existing filing event.
    Filing { event: FilingEventId },
    /// A fetch requested for a docket the bot just started following.
    Subscription {
        subscription: SubscriptionId,
        document: DocumentId,
    },
}

/// One status post on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostJob {
    pub channel: ChannelId,
    pub subscription: SubscriptionId,
    /// Absent for brand-new-case posts.
    pub event: Option<FilingEventId>,
    /// Document content to render thumbnails from, when one is available.
    pub document: Option<DocumentBlob>,
}

/// Work items the pipeline executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Resolve a freshly ingested filing event.
    ProcessFiling { event: FilingEventId },
    /// Decide whether a resolved event may be posted, and fan out if so.
    CheckBeforePosting { event: FilingEventId },
    /// Handle a successful fetch-completion: download and fan out.
    ProcessFetch { target: FetchTarget },
    /// Publish one status on one channel.
    PostToChannel(PostJob),
}

/// Opaque handle identifying an enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(u64);

/// Retry policy for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySpec {
    /// Number of retries after the first failed attempt.
    pub max_retries: u32,
    /// Delay between a failure and the retry.
    pub interval: Duration,
}

impl RetrySpec {
    pub fn none() -> Self {
        RetrySpec {
            max_retries: 0,
            interval: Duration::zero(),
        }
    }
}

/// Scheduling options for [`JobQueue::enqueue`].
#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    pub delay: Duration,
    pub depends_on: Option<JobHandle>,
    pub retry: RetrySpec,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        EnqueueOptions {
            delay: Duration::zero(),
            depends_on: None,
            retry: RetrySpec::none(),
        }
    }
}

/// Lifecycle of an enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Scheduled,
    Running,
    Finished,
    Failed,
}

/// A job taken off the queue. Must be handed back via [`JobQueue::complete`].
#[derive(Debug)]
pub struct ClaimedJob {
    pub handle: JobHandle,
    pub job: Job,
    attempts: u32,
    run_entry: ScheduledEntry,
}

/// A permanently failed job, kept for inspection.
#[derive(Debug, Clone)]
pub struct FailedJob {
    pub handle: JobHandle,
    pub job: Job,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone)]
struct ScheduledEntry {
    run_at: DateTime<Utc>,
    depends_on: Option<JobHandle>,
    retry: RetrySpec,
}

#[derive(Debug)]
struct PendingJob {
    handle: JobHandle,
    job: Job,
    attempts: u32,
    entry: ScheduledEntry,
}

#[derive(Debug, Default)]
struct Inner {
    next_handle: u64,
    pending: Vec<PendingJob>,
    statuses: HashMap<JobHandle, JobStatus>,
    failed: Vec<FailedJob>,
}

impl Inner {
    /// A dependency blocks its dependents only while it is still scheduled
    /// or running.
    fn dependency_settled(&self, handle: JobHandle) -> bool {
        !matches!(
            self.statuses.get(&handle),
            Some(JobStatus::Scheduled) | Some(JobStatus::Running)
        )
    }
}

/// The queue. Shared between the webhook handlers (producers) and the
/// worker loop (consumer).
#[derive(Debug, Default)]
pub struct JobQueue {
    inner: Mutex<Inner>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("queue lock poisoned")
    }

    pub fn enqueue(&self, job: Job, options: EnqueueOptions) -> JobHandle {
        let mut inner = self.lock();
        inner.next_handle += 1;
        let handle = JobHandle(inner.next_handle);
        debug!(?handle, ?job, delay_ms = options.delay.num_milliseconds(), "enqueued");
        inner.statuses.insert(handle, JobStatus::Scheduled);
        inner.pending.push(PendingJob {
            handle,
            job,
            attempts: 0,
            entry: ScheduledEntry {
                run_at: Utc::now() + options.delay,
                depends_on: options.depends_on,
                retry: options.retry,
            },
        });
        handle
    }

    pub fn status(&self, handle: JobHandle) -> Option<JobStatus> {
        self.lock().statuses.get(&handle).copied()
    }

    /// Takes the oldest due job off the queue, if any.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Option<ClaimedJob> {
        let mut inner = self.lock();
        let position = inner.pending.iter().position(|p| {
            p.entry.run_at <= now
                && p.entry
                    .depends_on
                    .map_or(true, |dep| inner.dependency_settled(dep))
        })?;
        let pending = inner.pending.remove(position);
        inner.statuses.insert(pending.handle, JobStatus::Running);
        Some(ClaimedJob {
            handle: pending.handle,
            job: pending.job,
            attempts: pending.attempts,
            run_entry: pending.entry,
        })
    }

    /// Reports the outcome of a claimed job. Failures are rescheduled until
    /// the retry budget runs out, then recorded in the failed ledger.
    pub fn complete(&self, claimed: ClaimedJob, result: Result<(), String>) {
        let mut inner = self.lock();
        match result {
            Ok(()) => {
                inner.statuses.insert(claimed.handle, JobStatus::Finished);
            }
            Err(error) => {
                let attempts = claimed.attempts + 1;
                if attempts <= claimed.run_entry.retry.max_retries {
                    debug!(handle = ?claimed.handle, attempts, %error, "retrying job");
                    inner.statuses.insert(claimed.handle, JobStatus::Scheduled);
                    inner.pending.push(PendingJob {
                        handle: claimed.handle,
                        job: claimed.job,
                        attempts,
                        entry: ScheduledEntry {
                            run_at: Utc::now() + claimed.run_entry.retry.interval,
                            // Dependencies are settled by the time a job runs.
                            depends_on: None,
                            retry: claimed.run_entry.retry,
                        },
                    });
                } else {
                    warn!(handle = ?claimed.handle, attempts, %error, "job failed permanently");
                    inner.statuses.insert(claimed.handle, JobStatus::Failed);
                    inner.failed.push(FailedJob {
                        handle: claimed.handle,
                        job: claimed.job,
                        attempts,
                        error,
                    });
                }
            }
        }
    }

    /// True when nothing is scheduled or running.
    pub fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.pending.is_empty()
            && !inner
                .statuses
                .values()
                .any(|s| matches!(s, JobStatus::Running))
    }

    /// Number of jobs waiting to run.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// The failed-job ledger, oldest first.
    pub fn failed_jobs(&self) -> Vec<FailedJob> {
        self.lock().failed.clone()
    }
}

/// Worker loop: claims due jobs and executes them through the pipeline.
pub async fn run_worker(queue: Arc<JobQueue>, pipeline: Arc<Pipeline>) {
    loop {
        match queue.claim_due(Utc::now()) {
            Some(claimed) => {
                let result = pipeline.execute(&claimed.job).await;
                queue.complete(claimed, result.map_err(|e| e.to_string()));
            }
            None => {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

/// Test helper: runs jobs to quiescence, ignoring scheduled delays.
///
/// Delays and retry intervals are honored in ordering but not in wall-clock
/// time; the far-future claim instant makes everything due immediately.
#[cfg(test)]
pub(crate) async fn drain(queue: &JobQueue, pipeline: &Pipeline) {
    let far_future = Utc::now() + Duration::days(365);
    let mut budget = 10_000u32;
    while let Some(claimed) = queue.claim_due(far_future) {
        let result = pipeline.execute(&claimed.job).await;
        queue.complete(claimed, result.map_err(|e| e.to_string()));
        budget -= 1;
        assert!(budget > 0, "queue failed to quiesce");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(event: u64) -> Job {
        Job::ProcessFiling {
            event: FilingEventId(event),
        }
    }

    fn soon() -> DateTime<Utc> {
        Utc::now() + Duration::seconds(1)
    }

    #[test]
    fn jobs_come_out_fifo() {
        let queue = JobQueue::new();
        queue.enqueue(job(1), EnqueueOptions::default());
        queue.enqueue(job(2), EnqueueOptions::default());

        let first = queue.claim_due(soon()).unwrap();
        assert_eq!(first.job, job(1));
        let second = queue.claim_due(soon()).unwrap();
        assert_eq!(second.job, job(2));
        assert!(queue.claim_due(soon()).is_none());
    }

    #[test]
    fn delayed_job_is_not_due_early() {
        let queue = JobQueue::new();
        queue.enqueue(
            job(1),
            EnqueueOptions {
                delay: Duration::minutes(5),
                ..Default::default()
            },
        );

        assert!(queue.claim_due(Utc::now()).is_none());
        assert!(queue.claim_due(Utc::now() + Duration::minutes(6)).is_some());
    }

    #[test]
    fn delayed_job_does_not_block_later_immediate_job() {
        let queue = JobQueue::new();
        queue.enqueue(
            job(1),
            EnqueueOptions {
                delay: Duration::minutes(5),
                ..Default::default()
            },
        );
        queue.enqueue(job(2), EnqueueOptions::default());

        let claimed = queue.claim_due(soon()).unwrap();
        assert_eq!(claimed.job, job(2));
    }

    #[test]
    fn dependent_waits_for_its_dependency() {
        let queue = JobQueue::new();
        let dep = queue.enqueue(job(1), EnqueueOptions::default());
        queue.enqueue(
            job(2),
            EnqueueOptions {
                depends_on: Some(dep),
                ..Default::default()
            },
        );

        let first = queue.claim_due(soon()).unwrap();
        assert_eq!(first.job, job(1));
        // Dependency is running, not settled.
        assert!(queue.claim_due(soon()).is_none());

        queue.complete(first, Ok(()));
        let second = queue.claim_due(soon()).unwrap();
        assert_eq!(second.job, job(2));
    }

    #[test]
    fn dependent_runs_after_dependency_fails_permanently() {
        let queue = JobQueue::new();
        let dep = queue.enqueue(job(1), EnqueueOptions::default());
        queue.enqueue(
            job(2),
            EnqueueOptions {
                depends_on: Some(dep),
                ..Default::default()
            },
        );

        let first = queue.claim_due(soon()).unwrap();
        queue.complete(first, Err("boom".to_string()));
        assert_eq!(queue.status(dep), Some(JobStatus::Failed));

        let second = queue.claim_due(soon()).unwrap();
        assert_eq!(second.job, job(2));
    }

    #[test]
    fn failed_job_is_retried_then_recorded() {
        let queue = JobQueue::new();
        let handle = queue.enqueue(
            job(1),
            EnqueueOptions {
                retry: RetrySpec {
                    max_retries: 2,
                    interval: Duration::zero(),
                },
                ..Default::default()
            },
        );

        for _ in 0..3 {
            let claimed = queue.claim_due(soon()).unwrap();
            queue.complete(claimed, Err("boom".to_string()));
        }

        assert!(queue.claim_due(soon()).is_none());
        assert_eq!(queue.status(handle), Some(JobStatus::Failed));
        let failed = queue.failed_jobs();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 3);
        assert_eq!(failed[0].error, "boom");
    }

    #[test]
    fn retry_interval_delays_the_next_attempt() {
        let queue = JobQueue::new();
        queue.enqueue(
            job(1),
            EnqueueOptions {
                retry: RetrySpec {
                    max_retries: 1,
                    interval: Duration::minutes(2),
                },
                ..Default::default()
            },
        );

        let claimed = queue.claim_due(soon()).unwrap();
        queue.complete(claimed, Err("boom".to_string()));

        assert!(queue.claim_due(soon()).is_none());
        assert!(queue
            .claim_due(Utc::now() + Duration::minutes(3))
            .is_some());
    }

    #[test]
    fn success_on_retry_finishes_the_job() {
        let queue = JobQueue::new();
        let handle = queue.enqueue(
            job(1),
            EnqueueOptions {
                retry: RetrySpec {
                    max_retries: 3,
                    interval: Duration::zero(),
                },
                ..Default::default()
            },
        );

        let claimed = queue.claim_due(soon()).unwrap();
        queue.complete(claimed, Err("boom".to_string()));
        let claimed = queue.claim_due(soon()).unwrap();
        queue.complete(claimed, Ok(()));

        assert_eq!(queue.status(handle), Some(JobStatus::Finished));
        assert!(queue.failed_jobs().is_empty());
        assert!(queue.is_idle());
    }

    #[test]
    fn is_idle_tracks_pending_and_running() {
        let queue = JobQueue::new();
        assert!(queue.is_idle());

        queue.enqueue(job(1), EnqueueOptions::default());
        assert!(!queue.is_idle());
        assert_eq!(queue.pending_count(), 1);

        let claimed = queue.claim_due(soon()).unwrap();
        assert!(!queue.is_idle());
        queue.complete(claimed, Ok(()));
        assert!(queue.is_idle());
    }
}
