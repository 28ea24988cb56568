//! Job execution: filing resolution, fetch handling and post fan-out.
//!
//! The [`Pipeline`] holds the store and the external capability handles and
//! executes [`Job`]s claimed from the queue. Each job is safe to re-run;
//! retries and webhook redeliveries lean on that.

use std::sync::Arc;

use thiserror::Error;

use crate::external::{
    DocumentStore, DocumentStoreError, PostApiError, StatusPoster, ThumbnailError,
    ThumbnailRenderer,
};
use crate::queue::{Job, JobQueue, RetrySpec};
use crate::store::{RecordStore, StoreError};

mod fanout;
mod resolver;

pub use fanout::thumbnail_pages;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Documents(#[from] DocumentStoreError),

    #[error(transparent)]
    Thumbnails(#[from] ThumbnailError),

    #[error(transparent)]
    Posting(#[from] PostApiError),
}

pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    documents: Arc<dyn DocumentStore>,
    thumbnails: Arc<dyn ThumbnailRenderer>,
    poster: Arc<dyn StatusPoster>,
    queue: Arc<JobQueue>,
    retry: RetrySpec,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        documents: Arc<dyn DocumentStore>,
        thumbnails: Arc<dyn ThumbnailRenderer>,
        poster: Arc<dyn StatusPoster>,
        queue: Arc<JobQueue>,
        retry: RetrySpec,
    ) -> Self {
        Pipeline {
            store,
            documents,
            thumbnails,
            poster,
            queue,
            retry,
        }
    }

    /// Executes one claimed job.
    pub async fn execute(&self, job: &Job) -> Result<(), PipelineError> {
        match job {
            Job::ProcessFiling { event } => resolver::process_filing(self, *event).await,
            Job::CheckBeforePosting { event } => {
                resolver::check_before_posting(self, *event).await
            }
            Job::ProcessFetch { target } => resolver::process_fetch(self, target).await,
            Job::PostToChannel(post) => fanout::post_to_channel(self, post).await,
        }
    }
}
