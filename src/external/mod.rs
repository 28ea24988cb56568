//! Capability traits for the pipeline's external collaborators.
//!
//! The pipeline never talks to the outside world directly; it goes through
//! these traits so tests can substitute mocks and deployments can swap
//! implementations. Concrete clients live in the submodules:
//!
//! - [`courtlistener`]: document lookup/download/purchase against the
//!   filing-tracking service
//! - [`thumbnails`]: the thumbnail-rendering microservice
//! - [`connectors`]: posting connectors keyed by channel service

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::posts::TextImage;
use crate::types::{Channel, DocumentId, Service};

pub mod connectors;
pub mod courtlistener;
pub mod thumbnails;

pub use connectors::{ConnectorRegistry, MastodonConnector};
pub use courtlistener::CourtListenerClient;
pub use thumbnails::ThumbnailClient;

/// Document content passed between jobs.
///
/// Cheap to clone; jobs carry it through the queue from resolution to
/// posting.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentBlob(Arc<Vec<u8>>);

impl DocumentBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        DocumentBlob(Arc::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DocumentBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentBlob({} bytes)", self.0.len())
    }
}

/// A rendered thumbnail image (PNG bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail(pub Vec<u8>);

/// What the document store knows about a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Path to the archived copy, when one exists. Empty means the document
    /// has not been retrieved from the court system yet.
    pub filepath_local: Option<String>,
    pub page_count: Option<u32>,
}

/// Errors from the document store client.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("document store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document store returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// A download was requested for a document the store has no file for.
    #[error("document {0} has no local file to download")]
    NoLocalFile(DocumentId),
}

/// The external, paid document store: lookup, download, purchase.
///
/// `purchase_document` is fire-and-forget; the result arrives later as a
/// fetch-completion webhook.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn lookup_document(&self, id: DocumentId)
        -> Result<DocumentMetadata, DocumentStoreError>;

    async fn download_document(&self, path: &str) -> Result<DocumentBlob, DocumentStoreError>;

    async fn purchase_document(&self, id: DocumentId) -> Result<(), DocumentStoreError>;
}

/// Errors from the thumbnail-rendering microservice.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("thumbnail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("thumbnail service returned HTTP {code}")]
    Status { code: u16 },
}

/// The external thumbnail-rendering microservice.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    /// Renders thumbnails for the given (1-based) pages of a PDF.
    async fn render_thumbnails(
        &self,
        document: &DocumentBlob,
        pages: &[u32],
    ) -> Result<Vec<Thumbnail>, ThumbnailError>;
}

/// Errors from a channel's posting API.
#[derive(Debug, Error)]
pub enum PostApiError {
    #[error("posting request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("posting API returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// No connector is configured for the channel's service.
    #[error("no connector configured for service {0}")]
    Unconfigured(Service),
}

/// The posting capability of a channel: publish a status, get its id back.
#[async_trait]
pub trait StatusPoster: Send + Sync {
    /// Publishes a status and returns the external post identifier.
    async fn add_status(
        &self,
        channel: &Channel,
        message: &str,
        image: Option<&TextImage>,
        attachments: &[Thumbnail],
    ) -> Result<String, PostApiError>;
}
