//! Shared fakes and fixtures for pipeline and server tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::external::{
    DocumentBlob, DocumentMetadata, DocumentStore, DocumentStoreError, PostApiError, StatusPoster,
    Thumbnail, ThumbnailError, ThumbnailRenderer,
};
use crate::pipeline::Pipeline;
use crate::posts::TextImage;
use crate::queue::{JobQueue, RetrySpec};
use crate::store::{MemoryStore, RecordStore};
use crate::types::{
    Channel, ChannelId, DocketId, DocumentId, FilingWebhookEvent, NewFilingEvent, PacerDocId,
    Service, Sponsorship, SponsorshipId, Subscription, SubscriptionId,
};

/// Fake document store: canned metadata and blobs, recorded purchases.
#[derive(Default)]
pub struct MockDocs {
    metadata: Mutex<HashMap<DocumentId, DocumentMetadata>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    purchases: Mutex<Vec<DocumentId>>,
}

impl MockDocs {
    pub fn set_metadata(&self, id: DocumentId, filepath_local: Option<&str>, pages: Option<u32>) {
        self.metadata.lock().unwrap().insert(
            id,
            DocumentMetadata {
                filepath_local: filepath_local.map(String::from),
                page_count: pages,
            },
        );
    }

    pub fn set_blob(&self, path: &str, bytes: Vec<u8>) {
        self.blobs.lock().unwrap().insert(path.to_string(), bytes);
    }

    pub fn purchases(&self) -> Vec<DocumentId> {
        self.purchases.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for MockDocs {
    async fn lookup_document(
        &self,
        id: DocumentId,
    ) -> Result<DocumentMetadata, DocumentStoreError> {
        Ok(self
            .metadata
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn download_document(&self, path: &str) -> Result<DocumentBlob, DocumentStoreError> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| DocumentBlob::new(bytes.clone()))
            .ok_or(DocumentStoreError::Status {
                code: 404,
                body: format!("no blob at {path}"),
            })
    }

    async fn purchase_document(&self, id: DocumentId) -> Result<(), DocumentStoreError> {
        self.purchases.lock().unwrap().push(id);
        Ok(())
    }
}

/// Fake renderer: one single-byte thumbnail per requested page, with the
/// requested page lists recorded.
#[derive(Default)]
pub struct RecordingThumbnails {
    requests: Mutex<Vec<Vec<u32>>>,
}

impl RecordingThumbnails {
    pub fn requested_pages(&self) -> Vec<Vec<u32>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ThumbnailRenderer for RecordingThumbnails {
    async fn render_thumbnails(
        &self,
        _document: &DocumentBlob,
        pages: &[u32],
    ) -> Result<Vec<Thumbnail>, ThumbnailError> {
        self.requests.lock().unwrap().push(pages.to_vec());
        Ok(pages.iter().map(|&p| Thumbnail(vec![p as u8])).collect())
    }
}

/// One recorded call to [`StatusPoster::add_status`].
#[derive(Debug, Clone)]
pub struct PostedStatus {
    pub channel: ChannelId,
    pub message: String,
    pub had_image: bool,
    pub attachment_count: usize,
}

/// Fake poster: records statuses, returns incrementing external ids, and can
/// be told to fail the next N calls.
#[derive(Default)]
pub struct RecordingPoster {
    posted: Mutex<Vec<PostedStatus>>,
    next_id: AtomicU64,
    failures_left: AtomicU64,
}

impl RecordingPoster {
    pub fn posted(&self) -> Vec<PostedStatus> {
        self.posted.lock().unwrap().clone()
    }

    pub fn fail_next(&self, n: u64) {
        self.failures_left.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusPoster for RecordingPoster {
    async fn add_status(
        &self,
        channel: &Channel,
        message: &str,
        image: Option<&TextImage>,
        attachments: &[Thumbnail],
    ) -> Result<String, PostApiError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(PostApiError::Status {
                code: 503,
                body: "injected failure".to_string(),
            });
        }
        self.posted.lock().unwrap().push(PostedStatus {
            channel: channel.id,
            message: message.to_string(),
            had_image: image.is_some(),
            attachment_count: attachments.len(),
        });
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }
}

/// A wired-up pipeline over fakes, plus seeding helpers.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub docs: Arc<MockDocs>,
    pub thumbnails: Arc<RecordingThumbnails>,
    pub poster: Arc<RecordingPoster>,
    pub queue: Arc<JobQueue>,
    pub pipeline: Arc<Pipeline>,
    next_channel: AtomicU64,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let docs = Arc::new(MockDocs::default());
        let thumbnails = Arc::new(RecordingThumbnails::default());
        let poster = Arc::new(RecordingPoster::default());
        let queue = Arc::new(JobQueue::new());
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            docs.clone(),
            thumbnails.clone(),
            poster.clone(),
            queue.clone(),
            RetrySpec::none(),
        ));
        Fixture {
            store,
            docs,
            thumbnails,
            poster,
            queue,
            pipeline,
            next_channel: AtomicU64::new(0),
        }
    }

    /// Follows the given docket; the subscription id mirrors the docket id.
    pub fn seed_subscription(&self, docket: u64) -> SubscriptionId {
        let id = SubscriptionId(docket);
        self.store.add_subscription(Subscription {
            id,
            docket: DocketId(docket),
            name: "United States v. Example".to_string(),
            case_summary: "fraud case".to_string(),
        });
        id
    }

    pub fn seed_channels(&self, n: usize) -> Vec<ChannelId> {
        (0..n)
            .map(|_| {
                let id = ChannelId(self.next_channel.fetch_add(1, Ordering::SeqCst) + 1);
                self.store.add_channel(Channel {
                    id,
                    service: Service::Mastodon,
                    account: format!("@bot{}", id),
                    enabled: true,
                });
                id
            })
            .collect()
    }

    pub fn seed_disabled_channel(&self) -> ChannelId {
        let id = ChannelId(self.next_channel.fetch_add(1, Ordering::SeqCst) + 1);
        self.store.add_channel(Channel {
            id,
            service: Service::Mastodon,
            account: format!("@off{}", id),
            enabled: false,
        });
        id
    }

    pub fn seed_sponsorship(&self) {
        self.store.add_sponsorship(Sponsorship {
            id: SponsorshipId(1),
            user: "sponsor".to_string(),
            active: true,
        });
    }

    /// Creates a filing-event row directly, bypassing webhook ingestion.
    pub async fn seed_event(
        &self,
        docket: DocketId,
        document: u64,
        pacer_doc_id: Option<&str>,
    ) -> FilingWebhookEvent {
        self.store
            .create_filing_event(NewFilingEvent {
                docket: Some(docket),
                document: DocumentId(document),
                pacer_doc_id: pacer_doc_id.map(PacerDocId::new),
                document_number: Some(document),
                attachment_number: None,
                short_description: "Main Document".to_string(),
                long_description: "MOTION to Dismiss".to_string(),
            })
            .await
            .expect("seed event")
    }

    /// Runs queued jobs to quiescence.
    pub async fn drain(&self) {
        crate::queue::drain(&self.queue, &self.pipeline).await;
    }
}
