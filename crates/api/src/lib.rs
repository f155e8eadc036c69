//! Ecom24 API library.
//!
//! The storefront REST API as a library so the router can be driven
//! directly by integration tests and reused by the CLI.
//!
//! # Architecture
//!
//! - Axum handlers under `/api/v1`, JSON in and out
//! - [`db::Store`] for persistence (`PostgreSQL` or in-memory)
//! - [`cache::CacheStore`] read-through response cache with explicit
//!   invalidation on writes
//! - Payment intents and product photos via external providers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    routing::get,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{RequestId, request_id_middleware};
use crate::state::AppState;

/// Build the full application router.
///
/// Sentry layers are not included; the binary adds them outermost.
pub fn app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/v1", routes::api_routes())
        .layer(trace)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn banner() -> &'static str {
    "API Working with /api/v1"
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
