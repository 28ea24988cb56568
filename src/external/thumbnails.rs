//! Client for the thumbnail-rendering microservice.

use async_trait::async_trait;
use tracing::debug;

use super::{DocumentBlob, Thumbnail, ThumbnailError, ThumbnailRenderer};

/// Renders one page per request against the microservice's PDF endpoint.
pub struct ThumbnailClient {
    http: reqwest::Client,
    base_url: String,
}

impl ThumbnailClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ThumbnailClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ThumbnailRenderer for ThumbnailClient {
    async fn render_thumbnails(
        &self,
        document: &DocumentBlob,
        pages: &[u32],
    ) -> Result<Vec<Thumbnail>, ThumbnailError> {
        let mut thumbnails = Vec::with_capacity(pages.len());
        for &page in pages {
            let url = format!("{}/convert/pdf/thumbnail/?page={}", self.base_url, page);
            debug!(page, "rendering thumbnail");
            let response = self
                .http
                .post(&url)
                .header("Content-Type", "application/pdf")
                .body(document.as_bytes().to_vec())
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                // Pages past the end of the document come back as errors;
                // stop there and post whatever rendered.
                if !thumbnails.is_empty() {
                    debug!(page, code = status.as_u16(), "stopping at short document");
                    break;
                }
                return Err(ThumbnailError::Status {
                    code: status.as_u16(),
                });
            }
            let bytes = response.bytes().await?;
            thumbnails.push(Thumbnail(bytes.to_vec()));
        }
        Ok(thumbnails)
    }
}
