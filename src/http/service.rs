//! Admission endpoints.
//!
//! The handlers here are the integration shim around the core limiter: they
//! derive a client identity, read the wall clock, and translate the
//! limiter's boolean decision into HTTP semantics (200 / 429 + Retry-After).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::ratelimit::{WindowLimiter, WindowStatus};

/// Header carrying an explicit client identity, used ahead of the peer
/// address when present.
const CLIENT_ID_HEADER: &str = "x-client-id";

/// Shared application state.
///
/// The limiter is constructed once at startup and injected here; nothing in
/// the crate reaches for process-wide state.
pub struct AppState {
    pub limiter: WindowLimiter,
    pub clock: Box<dyn Clock>,
}

/// Successful ping response body.
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Per-identity window standing, as reported by the status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub identity: String,
    #[serde(flatten)]
    pub window: WindowStatus,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/ping", get(ping))
        .route("/api/v1/status", get(window_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "turnstile",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Rate-limited ping endpoint.
pub async fn ping(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let Some(identity) = client_identity(&headers, connect_info.map(|ConnectInfo(addr)| addr))
    else {
        warn!("Request without a determinable client identity");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "client identity could not be determined".to_string(),
                code: "NO_IDENTITY",
                retry_after_secs: None,
            }),
        )
            .into_response();
    };

    let now = state.clock.now();

    match state.limiter.is_allowed(&identity, now) {
        Ok(true) => {
            debug!(identity = %identity, "Request admitted");
            (StatusCode::OK, Json(PingResponse { message: "pong" })).into_response()
        }
        Ok(false) => {
            let retry_after_secs = state
                .limiter
                .status(&identity, now)
                .map(|s| (s.window_end - now).ceil().max(1.0) as u64)
                .unwrap_or(1);
            info!(
                identity = %identity,
                retry_after_secs = retry_after_secs,
                "Request rate limited"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after_secs.to_string())],
                Json(ErrorResponse {
                    error: "Rate limit exceeded. Try again later.".to_string(),
                    code: "RATE_LIMITED",
                    retry_after_secs: Some(retry_after_secs),
                }),
            )
                .into_response()
        }
        Err(e) => {
            // Validation failures here mean the integration layer fed the
            // limiter garbage, not that the client did anything wrong
            warn!(identity = %identity, error = %e, "Rate limit check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                    code: "INTERNAL",
                    retry_after_secs: None,
                }),
            )
                .into_response()
        }
    }
}

/// Read-only window standing for the calling identity.
///
/// Never consumes quota or creates limiter state.
pub async fn window_status(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let Some(identity) = client_identity(&headers, connect_info.map(|ConnectInfo(addr)| addr))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "client identity could not be determined".to_string(),
                code: "NO_IDENTITY",
                retry_after_secs: None,
            }),
        )
            .into_response();
    };

    let now = state.clock.now();

    match state.limiter.status(&identity, now) {
        Ok(window) => {
            debug!(
                identity = %identity,
                requests_made = window.requests_made,
                "Status inspected"
            );
            (StatusCode::OK, Json(StatusResponse { identity, window })).into_response()
        }
        Err(e) => {
            warn!(identity = %identity, error = %e, "Status lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                    code: "INTERNAL",
                    retry_after_secs: None,
                }),
            )
                .into_response()
        }
    }
}

/// Derive the client identity from the `X-Client-ID` header, falling back to
/// the peer address.
fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
