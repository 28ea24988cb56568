//! HTTP client for the filing-tracking service's document APIs.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{DocumentBlob, DocumentMetadata, DocumentStore, DocumentStoreError};
use crate::types::DocumentId;

/// REST client for document lookup, archive download and purchase requests.
pub struct CourtListenerClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    filepath_local: Option<String>,
    page_count: Option<u32>,
}

impl CourtListenerClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        CourtListenerClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, DocumentStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DocumentStoreError::Status {
            code: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DocumentStore for CourtListenerClient {
    async fn lookup_document(
        &self,
        id: DocumentId,
    ) -> Result<DocumentMetadata, DocumentStoreError> {
        let url = format!("{}/api/rest/v4/recap-documents/{}/", self.base_url, id);
        debug!(document = %id, "looking up document");
        let response = self
            .http
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        let raw: RawDocument = Self::check(response).await?.json().await?;

        // An empty path means the archive has no copy yet.
        let filepath_local = raw.filepath_local.filter(|p| !p.is_empty());
        Ok(DocumentMetadata {
            filepath_local,
            page_count: raw.page_count,
        })
    }

    async fn download_document(&self, path: &str) -> Result<DocumentBlob, DocumentStoreError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%url, "downloading archived document");
        let response = self.http.get(&url).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(DocumentBlob::new(bytes.to_vec()))
    }

    async fn purchase_document(&self, id: DocumentId) -> Result<(), DocumentStoreError> {
        let url = format!("{}/api/rest/v4/recap-fetch/", self.base_url);
        debug!(document = %id, "requesting document purchase");
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth_header())
            .form(&[
                ("request_type", "1".to_string()),
                ("recap_document", id.to_string()),
            ])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
