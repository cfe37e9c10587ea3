//! Ties the pieces together for one signed-in user: REST api, notification
//! feed, presence mirror, and the realtime connector feeding the latter two.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use healio_shared::types::{Notification, PresenceStatus, Role};

use crate::api::NotificationApi;
use crate::connector::{ConnectionState, ConnectorConfig, RealtimeConnector, RealtimeEvents};
use crate::error::ClientResult;
use crate::notifications::NotificationFeed;
use crate::presence::PresenceTracker;

/// Routes inbound server events into local state.
struct SessionEvents {
    feed: Arc<NotificationFeed>,
    presence: Arc<PresenceTracker>,
    socket_id: Arc<Mutex<Option<Uuid>>>,
}

#[async_trait]
impl RealtimeEvents for SessionEvents {
    async fn on_connected(&self, user_id: &str, socket_id: Uuid) {
        tracing::info!(user_id, %socket_id, "joined personal room");
        *lock(&self.socket_id) = Some(socket_id);
    }

    async fn on_notification(&self, notification: Notification) {
        self.feed.apply_push(notification).await;
    }

    async fn on_user_status(&self, user_id: &str, status: PresenceStatus) {
        match status {
            PresenceStatus::Online => self.presence.mark_online(user_id),
            PresenceStatus::Offline => self.presence.mark_offline(user_id),
        }
    }
}

/// One logged-in session against the notification service.
///
/// Construct once per sign-in surface, call [`ClientSession::login`] when a
/// user signs in and [`ClientSession::logout`] when they leave.
pub struct ClientSession {
    api: Arc<NotificationApi>,
    feed: Arc<NotificationFeed>,
    presence: Arc<PresenceTracker>,
    connector: RealtimeConnector,
    socket_id: Arc<Mutex<Option<Uuid>>>,
}

impl ClientSession {
    /// Build a session against `base_url`, deriving the socket endpoint
    /// from it (`http://host/...` → `ws://host/.../ws`).
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let base_url = base_url.into();
        let config = ConnectorConfig::new(socket_url(&base_url));
        Self::with_connector_config(base_url, config)
    }

    /// Build a session with explicit connection tuning.
    pub fn with_connector_config(
        base_url: impl Into<String>,
        config: ConnectorConfig,
    ) -> ClientResult<Self> {
        let api = Arc::new(NotificationApi::new(base_url)?);
        let feed = Arc::new(NotificationFeed::new(Arc::clone(&api)));
        let presence = Arc::new(PresenceTracker::new());
        let socket_id = Arc::new(Mutex::new(None));
        let handler = Arc::new(SessionEvents {
            feed: Arc::clone(&feed),
            presence: Arc::clone(&presence),
            socket_id: Arc::clone(&socket_id),
        });
        let connector = RealtimeConnector::new(config, handler);

        Ok(Self {
            api,
            feed,
            presence,
            connector,
            socket_id,
        })
    }

    /// Open the realtime connection and pull the initial feed state.
    pub async fn login(&self, user_id: &str, role: Role) {
        self.connector.connect(user_id, role).await;
        self.feed.load(user_id).await;
        self.feed.refresh_unread_count(user_id).await;
    }

    /// Announce the user offline, close the connection, drop local state.
    pub async fn logout(&self) {
        self.connector.disconnect().await;
        self.feed.clear().await;
        self.presence.clear();
        *lock(&self.socket_id) = None;
    }

    pub fn is_connected(&self) -> bool {
        self.connector.state() == ConnectionState::Connected
    }

    /// The socket id the server assigned on the last `connected` ack, or
    /// `None` before the handshake completes / after logout.
    pub fn socket_id(&self) -> Option<Uuid> {
        *lock(&self.socket_id)
    }

    pub fn api(&self) -> &NotificationApi {
        &self.api
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn connector(&self) -> &RealtimeConnector {
        &self.connector
    }
}

fn lock(slot: &Mutex<Option<Uuid>>) -> std::sync::MutexGuard<'_, Option<Uuid>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Derive the websocket endpoint from the REST base url.
fn socket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/ws")
}
