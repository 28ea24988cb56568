//! Webhook intake handlers.
//!
//! Each endpoint accepts one delivery kind. The handlers validate the
//! `Idempotency-Key` header, parse the body, and hand off to the router;
//! ingestion acknowledges receipt, it does not wait for the queued work.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::types::IdempotencyKey;
use crate::webhooks::{parse_webhook, RouteOutcome, WebhookEvent};

use super::{AppState, WebhookError};

fn idempotency_key(headers: &HeaderMap) -> Result<IdempotencyKey, WebhookError> {
    headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(IdempotencyKey::new)
        .ok_or(WebhookError::MissingIdempotencyKey)
}

/// `POST /webhooks/docket-alert` — new-filing deliveries.
///
/// Echoes the payload with 201 on first ingestion; replays get an empty 200.
pub async fn docket_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let key = idempotency_key(&headers)?;
    let WebhookEvent::DocketAlert(payload) = parse_webhook(&body)? else {
        return Err(WebhookError::UnexpectedEvent);
    };
    match state.inner.router.handle_docket_alert(&key, &payload).await? {
        RouteOutcome::Processed => Ok((StatusCode::CREATED, body).into_response()),
        RouteOutcome::AlreadyProcessed => Ok(StatusCode::OK.into_response()),
    }
}

/// `POST /webhooks/recap-fetch` — fetch-completion deliveries.
pub async fn recap_fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let key = idempotency_key(&headers)?;
    let WebhookEvent::RecapFetch(payload) = parse_webhook(&body)? else {
        return Err(WebhookError::UnexpectedEvent);
    };
    state.inner.router.handle_recap_fetch(&key, &payload).await?;
    Ok(StatusCode::OK.into_response())
}
