//! Posting connectors, keyed by the channel's service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{PostApiError, StatusPoster, Thumbnail};
use crate::posts::TextImage;
use crate::types::{Channel, Service};

/// Routes [`StatusPoster::add_status`] to the connector registered for the
/// channel's service.
#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<Service, Arc<dyn StatusPoster>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Service, connector: Arc<dyn StatusPoster>) {
        self.connectors.insert(service, connector);
    }

    pub fn with(mut self, service: Service, connector: Arc<dyn StatusPoster>) -> Self {
        self.register(service, connector);
        self
    }
}

#[async_trait]
impl StatusPoster for ConnectorRegistry {
    async fn add_status(
        &self,
        channel: &Channel,
        message: &str,
        image: Option<&TextImage>,
        attachments: &[Thumbnail],
    ) -> Result<String, PostApiError> {
        let connector = self
            .connectors
            .get(&channel.service)
            .ok_or(PostApiError::Unconfigured(channel.service))?;
        connector.add_status(channel, message, image, attachments).await
    }
}

/// Mastodon connector: media upload via `/api/v2/media`, then a status post.
pub struct MastodonConnector {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    id: String,
}

impl MastodonConnector {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        MastodonConnector {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PostApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PostApiError::Status {
            code: status.as_u16(),
            body,
        })
    }

    async fn upload_media(&self, bytes: Vec<u8>) -> Result<String, PostApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("page.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(format!("{}/api/v2/media", self.base_url))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await?;
        let media: MediaResponse = Self::check(response).await?.json().await?;
        Ok(media.id)
    }
}

#[async_trait]
impl StatusPoster for MastodonConnector {
    async fn add_status(
        &self,
        channel: &Channel,
        message: &str,
        image: Option<&TextImage>,
        attachments: &[Thumbnail],
    ) -> Result<String, PostApiError> {
        // Overflow text images need server-side rasterization, which this
        // connector does not do; the "see attached" message still carries
        // the links. TODO: rasterize TextImage once an image backend lands.
        if let Some(image) = image {
            debug!(title = %image.title, "skipping text-image rasterization");
        }

        let mut media_ids = Vec::with_capacity(attachments.len());
        for thumbnail in attachments {
            media_ids.push(self.upload_media(thumbnail.0.clone()).await?);
        }

        let mut params: Vec<(&str, String)> = vec![("status", message.to_string())];
        for id in &media_ids {
            params.push(("media_ids[]", id.clone()));
        }

        debug!(account = %channel.account, media = media_ids.len(), "posting status");
        let response = self
            .http
            .post(format!("{}/api/v1/statuses", self.base_url))
            .header("Authorization", self.bearer())
            .form(&params)
            .send()
            .await?;
        let posted: StatusResponse = Self::check(response).await?.json().await?;
        Ok(posted.id)
    }
}
