//! Owns the single realtime connection of a logged-in session.
//!
//! The connector dials the notification service's `/ws` endpoint, performs
//! the join handshake (personal room, role room, presence-online), and keeps
//! redialing on failure up to a fixed budget. Once the budget is exhausted it
//! parks in [`ConnectionState::Offline`] and stays there until the next
//! explicit [`RealtimeConnector::connect`] call; the app falls back to REST
//! polling in the meantime.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use healio_shared::types::{ClientEvent, Notification, PresenceStatus, Role, ServerEvent};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Tunable parameters for the connection lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// The `ws://` or `wss://` endpoint of the notification service.
    pub url: String,
    /// How many consecutive failed dials are allowed before giving up.
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each redial.
    pub reconnect_delay: Duration,
    /// Upper bound on a single dial.
    pub connect_timeout: Duration,
}

impl ConnectorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Lifecycle of the session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; nothing is running.
    Idle,
    /// A dial is in flight.
    Connecting,
    /// The transport is up and the handshake has been sent.
    Connected,
    /// The transport was lost or a dial failed; waiting to redial.
    Reconnecting,
    /// Retry budget exhausted. Stays here until the next explicit connect.
    Offline,
    /// Explicit teardown in progress.
    Disconnecting,
}

/// Callbacks for inbound server events.
///
/// Implementations translate events into local state mutations; they run on
/// the session task, one frame at a time, so they never race each other.
#[async_trait]
pub trait RealtimeEvents: Send + Sync {
    async fn on_connected(&self, user_id: &str, socket_id: Uuid);
    async fn on_notification(&self, notification: Notification);
    async fn on_user_status(&self, user_id: &str, status: PresenceStatus);
}

/// State shared between the connector handle and its session task.
///
/// Every write from a session task carries the generation it was started
/// with; a write whose generation is stale is dropped, so a task that was
/// cancelled mid-dial can never resurrect a connection for a session that
/// has since logged out.
struct ConnectorShared {
    inner: Mutex<SharedState>,
}

struct SharedState {
    state: ConnectionState,
    generation: u64,
}

impl ConnectorShared {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SharedState {
                state: ConnectionState::Idle,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Claim the connection slot. Returns the new generation, or `None`
    /// when a session is already in flight (the idempotent-connect guard).
    fn begin_session(&self) -> Option<u64> {
        let mut inner = self.lock();
        match inner.state {
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => None,
            ConnectionState::Idle | ConnectionState::Offline | ConnectionState::Disconnecting => {
                inner.generation += 1;
                inner.state = ConnectionState::Connecting;
                Some(inner.generation)
            }
        }
    }

    /// Invalidate the running session and mark teardown. Returns the new
    /// generation so the caller can settle to `Idle` once the task is gone.
    fn end_session(&self) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = ConnectionState::Disconnecting;
        inner.generation
    }

    /// Apply a state transition only if `generation` is still current.
    fn set_state_if_current(&self, generation: u64, next: ConnectionState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.state = next;
        true
    }
}

/// Bookkeeping for the running session task.
struct Session {
    user_id: String,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<ClientEvent>,
    task: JoinHandle<()>,
}

/// Handle owned by the app for the lifetime of the process.
///
/// `connect` is called on login, `disconnect` on logout; both are idempotent.
pub struct RealtimeConnector {
    config: ConnectorConfig,
    handler: Arc<dyn RealtimeEvents>,
    shared: Arc<ConnectorShared>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl RealtimeConnector {
    pub fn new(config: ConnectorConfig, handler: Arc<dyn RealtimeEvents>) -> Self {
        Self {
            config,
            handler,
            shared: Arc::new(ConnectorShared::new()),
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Start a session for `user_id`. No-op while a session is in flight.
    pub async fn connect(&self, user_id: &str, role: Role) {
        let mut slot = self.session.lock().await;
        let Some(generation) = self.shared.begin_session() else {
            tracing::debug!(user_id, "realtime session already active, ignoring connect");
            return;
        };

        if let Some(stale) = slot.take() {
            // A session that parked in Offline still owns a finished task.
            stale.cancel.cancel();
            stale.task.abort();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let ctx = SessionContext {
            config: self.config.clone(),
            handler: Arc::clone(&self.handler),
            shared: Arc::clone(&self.shared),
            generation,
            user_id: user_id.to_string(),
            role,
        };
        let task = tokio::spawn(run_session(ctx, cancel.clone(), outbound_rx));

        *slot = Some(Session {
            user_id: user_id.to_string(),
            cancel,
            outbound: outbound_tx,
            task,
        });
    }

    /// Tear the session down: announce the user offline, close the
    /// transport, wait for the task to exit. No-op without a session.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            return;
        };

        let generation = self.shared.end_session();
        // Best effort; the queue is flushed before the close frame goes out.
        let _ = session
            .outbound
            .send(ClientEvent::UserOffline(session.user_id.clone()));
        session.cancel.cancel();
        let _ = session.task.await;

        self.shared
            .set_state_if_current(generation, ConnectionState::Idle);
        tracing::info!(user_id = %session.user_id, "realtime session closed");
    }

    /// Queue a frame for the server. Dropped when no session is active or
    /// the transport is down; the socket layer makes no delivery promises.
    pub async fn send(&self, event: ClientEvent) {
        let slot = self.session.lock().await;
        match slot.as_ref() {
            Some(session) => {
                let _ = session.outbound.send(event);
            }
            None => tracing::debug!("no realtime session, dropping outbound frame"),
        }
    }
}

/// Everything a session task needs, owned.
struct SessionContext {
    config: ConnectorConfig,
    handler: Arc<dyn RealtimeEvents>,
    shared: Arc<ConnectorShared>,
    generation: u64,
    user_id: String,
    role: Role,
}

/// Dial, drive, redial until cancelled or the retry budget runs out.
async fn run_session(
    ctx: SessionContext,
    cancel: CancellationToken,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
) {
    let mut failures = 0u32;

    loop {
        let dial = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(
                ctx.config.connect_timeout,
                connect_async(ctx.config.url.as_str()),
            ) => result,
        };

        match dial {
            Ok(Ok((socket, _response))) => {
                failures = 0;
                if !ctx
                    .shared
                    .set_state_if_current(ctx.generation, ConnectionState::Connected)
                {
                    break;
                }
                tracing::info!(user_id = %ctx.user_id, url = %ctx.config.url, "realtime connection established");

                match drive_connection(socket, &ctx, &cancel, &mut outbound).await {
                    Drive::Cancelled => break,
                    Drive::TransportLost(error) => {
                        // Loss after a successful connect does not count
                        // against the retry budget.
                        tracing::warn!(user_id = %ctx.user_id, error = %error, "realtime connection lost");
                    }
                }
            }
            Ok(Err(error)) => {
                failures += 1;
                tracing::warn!(
                    user_id = %ctx.user_id,
                    error = %error,
                    attempt = failures,
                    "realtime connect failed",
                );
            }
            Err(_) => {
                failures += 1;
                tracing::warn!(
                    user_id = %ctx.user_id,
                    attempt = failures,
                    timeout_ms = ctx.config.connect_timeout.as_millis() as u64,
                    "realtime connect timed out",
                );
            }
        }

        if failures >= ctx.config.max_reconnect_attempts {
            if ctx
                .shared
                .set_state_if_current(ctx.generation, ConnectionState::Offline)
            {
                tracing::warn!(
                    user_id = %ctx.user_id,
                    attempts = failures,
                    "reconnect budget exhausted, falling back to polling",
                );
            }
            break;
        }

        if !ctx
            .shared
            .set_state_if_current(ctx.generation, ConnectionState::Reconnecting)
        {
            break;
        }
        tracing::info!(
            user_id = %ctx.user_id,
            delay_ms = ctx.config.reconnect_delay.as_millis() as u64,
            "retrying realtime connection",
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(ctx.config.reconnect_delay) => {}
        }
    }
}

enum Drive {
    Cancelled,
    TransportLost(tungstenite::Error),
}

/// Pump one live connection until cancellation or transport loss.
async fn drive_connection(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ctx: &SessionContext,
    cancel: &CancellationToken,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
) -> Drive {
    let (mut sink, mut stream) = socket.split();

    // (Re)establish identity on every connect, including redials.
    for event in [
        ClientEvent::Join(ctx.user_id.clone()),
        ClientEvent::JoinRole(ctx.role),
        ClientEvent::UserOnline(ctx.user_id.clone()),
    ] {
        if let Err(error) = send_event(&mut sink, &event).await {
            return Drive::TransportLost(error);
        }
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Flush queued frames (the offline announcement on logout
                // rides here) before closing the transport.
                while let Ok(event) = outbound.try_recv() {
                    if send_event(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                let _ = sink.send(Message::Close(None)).await;
                return Drive::Cancelled;
            }
            queued = outbound.recv() => match queued {
                Some(event) => {
                    if let Err(error) = send_event(&mut sink, &event).await {
                        return Drive::TransportLost(error);
                    }
                }
                None => return Drive::Cancelled,
            },
            frame = next_text_frame(&mut stream) => match frame {
                Ok(Some(text)) => dispatch_frame(ctx.handler.as_ref(), &text).await,
                Ok(None) => return Drive::TransportLost(tungstenite::Error::ConnectionClosed),
                Err(error) => return Drive::TransportLost(error),
            },
        }
    }
}

/// `Ok(None)` means the server closed the connection.
async fn next_text_frame(stream: &mut WsStream) -> Result<Option<String>, tungstenite::Error> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(Some(text)),
            Some(Ok(Message::Close(_))) | None => return Ok(None),
            Some(Ok(_)) => continue,
            Some(Err(error)) => return Err(error),
        }
    }
}

async fn dispatch_frame(handler: &dyn RealtimeEvents, text: &str) {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(ServerEvent::Connected { user_id, socket_id }) => {
            handler.on_connected(&user_id, socket_id).await;
        }
        Ok(ServerEvent::Notification(notification)) => {
            handler.on_notification(notification).await;
        }
        Ok(ServerEvent::UserStatus { user_id, status }) => {
            handler.on_user_status(&user_id, status).await;
        }
        Err(error) => tracing::debug!(error = %error, "ignoring malformed server frame"),
    }
}

async fn send_event(sink: &mut WsSink, event: &ClientEvent) -> Result<(), tungstenite::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(error) => {
            tracing::error!(error = %error, "failed to encode client frame");
            return Ok(());
        }
    };
    sink.send(Message::Text(text)).await
}
