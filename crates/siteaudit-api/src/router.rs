//! Route definitions for the SiteAudit HTTP API.
//!
//! All routes are mounted under `/api` and receive `AppState` through
//! Axum's `State` extractor.

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use siteaudit_core::config::ServerConfig;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router with tracing and CORS layers.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .merge(audit_routes())
        .merge(queue_routes())
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Audit submission and read endpoints
fn audit_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/audits",
            get(handlers::audit::list_audits).post(handlers::audit::create_audit),
        )
        .route(
            "/audits/{id}",
            get(handlers::audit::get_audit).delete(handlers::audit::delete_audit),
        )
        .route("/audits/{id}/pages", get(handlers::audit::list_pages))
        .route("/audits/{id}/export.csv", get(handlers::audit::export_csv))
}

fn queue_routes() -> Router<AppState> {
    Router::new().route("/queue/stats", get(handlers::queue::queue_stats))
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// CORS layer from the configured origins; `"*"` allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
