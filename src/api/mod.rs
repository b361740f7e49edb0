//! REST interface for the stuck-orders dashboard
//!
//! A single in-memory session: upload an export, then query views of it.

pub mod handlers;
pub mod service;

pub use service::{DashboardService, ServiceError};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(service: Arc<DashboardService>, max_upload_bytes: usize) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/v1/health", get(handlers::health))
        // Session
        .route(
            "/api/v1/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/v1/filters", get(handlers::get_filters))
        // Views
        .route("/api/v1/report", get(handlers::get_report))
        .route("/api/v1/overview", get(handlers::get_overview))
        .route("/api/v1/verticals", get(handlers::get_verticals))
        .route("/api/v1/time", get(handlers::get_time))
        .route("/api/v1/impact", get(handlers::get_impact))
        .route("/api/v1/users", get(handlers::get_users))
        .route("/api/v1/churn", get(handlers::get_churn))
        .route("/api/v1/insights", get(handlers::get_insights))
        .route("/api/v1/orders", get(handlers::get_orders))
        // Exports
        .route("/api/v1/export/orders", get(handlers::export_orders))
        .route("/api/v1/export/monthly", get(handlers::export_monthly))
        .route("/api/v1/export/users", get(handlers::export_users))
        // State and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
