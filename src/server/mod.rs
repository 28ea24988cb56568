//! HTTP surface: webhook intake endpoints and a health probe.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tracing::error;

use crate::queue::JobQueue;
use crate::webhooks::{ParseError, RouteError, WebhookRouter};

pub mod health;
pub mod webhooks;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    router: WebhookRouter,
    queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(router: WebhookRouter, queue: Arc<JobQueue>) -> Self {
        AppState {
            inner: Arc::new(Inner { router, queue }),
        }
    }
}

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhooks/docket-alert", post(webhooks::docket_alert))
        .route("/webhooks/recap-fetch", post(webhooks::recap_fetch))
        .with_state(state)
}

/// Errors surfaced to webhook callers.
///
/// Deliveries the bot can never handle (bad body, unsupported or misrouted
/// event types, missing key) are the caller's fault and get a 4xx so the
/// source system stops redelivering; transient handling failures get a 5xx
/// so it retries.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing Idempotency-Key header")]
    MissingIdempotencyKey,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("event type not handled by this endpoint")]
    UnexpectedEvent,

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingIdempotencyKey
            | WebhookError::Parse(_)
            | WebhookError::UnexpectedEvent => StatusCode::BAD_REQUEST,
            WebhookError::Route(err) => {
                error!(error = %err, "webhook handling failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
