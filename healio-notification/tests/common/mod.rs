//! Shared test helpers: boot the service on an ephemeral port around the
//! in-memory store, mirroring the router construction in `main.rs`.

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::StatusCode;
use serde_json::Value;

use healio_notification::config::AppConfig;
use healio_notification::services::MemoryNotificationStore;
use healio_notification::socket::RealtimeHub;
use healio_notification::{app, AppState};

pub struct TestApp {
    pub base_url: String,
    pub ws_url: String,
    pub state: Arc<AppState>,
    client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let state = Arc::new(AppState {
            store: Arc::new(MemoryNotificationStore::new()),
            hub: Arc::new(RealtimeHub::new()),
            config: AppConfig::default(),
            started_at: Instant::now(),
            // A globally installed recorder would collide across test
            // binaries, so each app gets a detached one.
            metrics_handle: PrometheusBuilder::new().build_recorder().handle(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");

        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/ws"),
            state,
            client: reqwest::Client::new(),
        }
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request");
        Self::split(resp).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("request");
        Self::split(resp).await
    }

    pub async fn patch(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .patch(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request");
        Self::split(resp).await
    }

    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .delete(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("request");
        Self::split(resp).await
    }

    async fn split(resp: reqwest::Response) -> (StatusCode, Value) {
        let status = resp.status();
        let text = resp.text().await.expect("body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        (status, body)
    }
}

/// Minimal valid creation payload for `recipient`.
pub fn notification_body(recipient: &str, title: &str) -> Value {
    serde_json::json!({
        "recipientId": recipient,
        "recipientRole": "doctor",
        "type": "appointment_request",
        "title": title,
        "message": format!("{title} message"),
    })
}
