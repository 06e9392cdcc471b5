use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use edgecert_renewal::{RenewalRunner, TriggerKind};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct TriggerState {
    runner: Arc<RenewalRunner>,
    token_digest: Vec<u8>,
}

impl TriggerState {
    pub fn new(runner: Arc<RenewalRunner>, trigger_token: &str) -> Self {
        Self {
            runner,
            token_digest: Sha256::digest(trigger_token.as_bytes()).to_vec(),
        }
    }

    /// Both sides are hashed first so the comparison is over fixed-length
    /// digests rather than the secret itself.
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let Some(token) = bearer_token(headers) else {
            return false;
        };
        Sha256::digest(token.as_bytes()).as_slice() == self.token_digest.as_slice()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").filter(|t| !t.is_empty())
}

/// `POST /` and `POST /renew` start a run; any other method on them is a 405
/// before the token is looked at.
pub fn configure_routes(state: TriggerState) -> Router {
    Router::new()
        .route("/", post(trigger_renewal))
        .route("/renew", post(trigger_renewal))
        .route("/health", get(health))
        .with_state(state)
}

async fn trigger_renewal(State(state): State<TriggerState>, headers: HeaderMap) -> Response {
    if !state.is_authorized(&headers) {
        warn!("Rejected renewal trigger with missing or invalid bearer token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Unauthorized" })),
        )
            .into_response();
    }

    info!(domain = %state.runner.domain(), "Renewal triggered over HTTP");
    let outcome = state.runner.trigger(TriggerKind::Http).await;
    (StatusCode::OK, Json(outcome)).into_response()
}

async fn health() -> &'static str {
    "ok"
}
