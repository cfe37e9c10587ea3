pub mod config;
pub mod models;
pub mod routes;
pub mod services;
pub mod socket;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::services::NotificationStore;
use crate::socket::RealtimeHub;

pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub hub: Arc<RealtimeHub>,
    pub config: AppConfig,
    pub started_at: Instant,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Builds the service router. Tests construct it around an in-memory store;
/// `main` wires in MongoDB.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health_check))
        .route("/metrics", get(routes::metrics))
        .route("/api/status", get(routes::status))
        .route("/api/version", get(routes::version))
        .route("/api/time", get(routes::server_time))
        .route("/api/notifications", post(routes::create_notification))
        .route("/api/notifications/role", post(routes::send_role_notification))
        .route("/api/notifications/user/:user_id", get(routes::list_notifications))
        .route("/api/notifications/user/:user_id/read-all", patch(routes::mark_all_read))
        .route("/api/notifications/user/:user_id/unread-count", get(routes::unread_count))
        .route("/api/notifications/:id/read", patch(routes::mark_read))
        .route("/api/notifications/:id", delete(routes::delete_notification))
        .route("/ws", get(socket::ws_handler))
        .layer(axum::middleware::from_fn(healio_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
