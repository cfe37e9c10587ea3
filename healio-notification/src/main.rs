use std::sync::Arc;
use std::time::Instant;

use healio_notification::config::AppConfig;
use healio_notification::services::MongoNotificationStore;
use healio_notification::socket::RealtimeHub;
use healio_notification::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    healio_shared::middleware::init_tracing("healio-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    let client = mongodb::Client::with_uri_str(&config.mongodb_uri).await?;
    let db = client.database(&config.mongodb_database);
    tracing::info!(database = %config.mongodb_database, "connected to MongoDB");

    let metrics_handle = healio_shared::middleware::init_metrics();

    let state = Arc::new(AppState {
        store: Arc::new(MongoNotificationStore::new(&db)),
        hub: Arc::new(RealtimeHub::new()),
        config,
        started_at: Instant::now(),
        metrics_handle,
    });

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "healio-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
