// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the edge rate limiter service.
//!
//! The service is consulted by a reverse proxy or application handler before
//! it serves a protected endpoint. It also exposes the administrative
//! operations used by operators and support tooling.

use crate::limiter::RateLimiter;
use crate::metrics::LimiterMetrics;
use crate::validator::{IdentifierValidator, ValidationResult};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub validator: IdentifierValidator,
    pub metrics: Arc<LimiterMetrics>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Rate limit check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub identifier: String,
}

/// Rate limit check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

/// Quota report for one identifier.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub identifier: String,
    pub count: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub retry_after_secs: u64,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check", post(check))
        .route("/limits/:identifier", get(stats).delete(reset))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "edge-rate-limiter",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Admit or reject one request for an identifier.
///
/// Always answers 200 for a well-formed identifier so the calling proxy can
/// read the body; the verdict is in `allowed`.
pub async fn check(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckRequest>,
) -> Response {
    if let ValidationResult::Invalid(err) = state.validator.validate(&req.identifier) {
        info!(error = %err, "Rejected identifier");
        return (
            StatusCode::BAD_REQUEST,
            Json(CheckResponse {
                allowed: false,
                reason: Some(err.to_string()),
                retry_after_secs: None,
                remaining: None,
            }),
        )
            .into_response();
    }

    let decision = state.limiter.check(&req.identifier).await;
    let max_requests = state.limiter.config().max_requests;

    if decision.allowed() {
        let remaining = decision.count.map(|c| max_requests.saturating_sub(c));
        debug!(identifier = %req.identifier, ?remaining, "Request allowed");
        return Json(CheckResponse {
            allowed: true,
            reason: None,
            retry_after_secs: None,
            remaining,
        })
        .into_response();
    }

    let now = state.limiter.now_ms();
    let retry_after_secs = decision.reset_time.map(|r| retry_after_secs(r, now));
    info!(
        identifier = %req.identifier,
        outcome = decision.outcome.as_str(),
        ?retry_after_secs,
        "Request rate limited"
    );

    let mut response = Json(CheckResponse {
        allowed: false,
        reason: Some("Rate limit exceeded".to_string()),
        retry_after_secs,
        remaining: Some(0),
    })
    .into_response();
    if let Some(secs) = retry_after_secs {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// Report current quota usage.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Response {
    if let ValidationResult::Invalid(err) = state.validator.validate(&identifier) {
        return error_response(StatusCode::BAD_REQUEST, "INVALID_IDENTIFIER", err.to_string());
    }

    match state.limiter.get_rate_limit_stats(&identifier).await {
        Ok(Some(stats)) => {
            let now = state.limiter.now_ms();
            Json(StatsResponse {
                identifier,
                count: stats.count,
                remaining: stats.remaining,
                reset_at: stats.reset_at,
                retry_after_secs: stats.retry_after_ms(now).div_ceil(1000),
            })
            .into_response()
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No rate limit record for {}", identifier),
        ),
        Err(e) => {
            warn!(identifier = %identifier, error = %e, "Stats lookup failed");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "Window store unavailable".to_string(),
            )
        }
    }
}

/// Force-reset an identifier's window.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Response {
    if let ValidationResult::Invalid(err) = state.validator.validate(&identifier) {
        return error_response(StatusCode::BAD_REQUEST, "INVALID_IDENTIFIER", err.to_string());
    }

    match state.limiter.reset_rate_limit(&identifier).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(identifier = %identifier, error = %e, "Reset failed");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "Window store unavailable".to_string(),
            )
        }
    }
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_response(status: StatusCode, code: &'static str, error: String) -> Response {
    (status, Json(ErrorResponse { error, code })).into_response()
}

/// Whole seconds until `reset_at`, rounded up; `0` once it has passed.
fn retry_after_secs(reset_at: i64, now: i64) -> u64 {
    let ms = (reset_at - now).max(0) as u64;
    ms.div_ceil(1000)
}
