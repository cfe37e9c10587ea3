use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use healio_shared::types::{ClientEvent, PresenceStatus, ServerEvent};

use crate::socket::hub::{role_room, user_room, RealtimeHub};
use crate::AppState;

/// GET /ws
///
/// Upgrades the connection and hands it to the realtime hub. Clients speak
/// JSON frames of the form `{"event": <name>, "data": <payload>}`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

/// Manage a single connection after upgrade: register with the hub, forward
/// outbound events from the hub channel, dispatch inbound frames, and
/// unregister on close (which drops every room membership).
async fn handle_socket(socket: WebSocket, hub: Arc<RealtimeHub>) {
    let (socket_id, mut rx) = hub.register();
    tracing::info!(socket_id = %socket_id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    // Sender task: serialize hub events onto the wire.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(error) => {
                    tracing::error!(socket_id = %socket_id, error = %error, "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                tracing::debug!(socket_id = %socket_id, "websocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: decode and dispatch inbound frames.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => dispatch(&hub, socket_id, event),
                Err(error) => {
                    tracing::debug!(socket_id = %socket_id, error = %error, "ignoring malformed frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                tracing::debug!(socket_id = %socket_id, error = %error, "websocket receive error");
                break;
            }
        }
    }

    hub.unregister(socket_id);
    send_task.abort();
    tracing::info!(socket_id = %socket_id, "websocket disconnected");
}

fn dispatch(hub: &RealtimeHub, socket_id: Uuid, event: ClientEvent) {
    match event {
        ClientEvent::Join(user_id) => {
            hub.join(socket_id, user_room(&user_id));
            tracing::info!(socket_id = %socket_id, user_id = %user_id, "joined user room");
            // Ack goes to the joining socket only.
            hub.send_to(socket_id, ServerEvent::Connected { user_id, socket_id });
        }
        ClientEvent::JoinRole(role) => {
            hub.join(socket_id, role_room(role));
            tracing::info!(socket_id = %socket_id, role = %role, "joined role room");
        }
        ClientEvent::UserOnline(user_id) => {
            tracing::info!(user_id = %user_id, "user online");
            hub.broadcast_user_status(&user_id, PresenceStatus::Online);
        }
        ClientEvent::UserOffline(user_id) => {
            tracing::info!(user_id = %user_id, "user offline");
            hub.broadcast_user_status(&user_id, PresenceStatus::Offline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healio_shared::types::Role;

    #[tokio::test]
    async fn join_acks_only_the_joining_socket() {
        let hub = RealtimeHub::new();
        let (a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        dispatch(&hub, a, ClientEvent::Join("doc-1".into()));

        match rx_a.try_recv() {
            Ok(ServerEvent::Connected { user_id, socket_id }) => {
                assert_eq!(user_id, "doc-1");
                assert_eq!(socket_id, a);
            }
            other => panic!("expected connected ack, got {other:?}"),
        }
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_role_sends_no_ack() {
        let hub = RealtimeHub::new();
        let (a, mut rx_a) = hub.register();

        dispatch(&hub, a, ClientEvent::JoinRole(Role::Lab));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn presence_events_reach_everyone_including_the_sender() {
        let hub = RealtimeHub::new();
        let (a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        dispatch(&hub, a, ClientEvent::UserOffline("pat-3".into()));

        for rx in [&mut rx_a, &mut rx_b] {
            match rx.try_recv() {
                Ok(ServerEvent::UserStatus { user_id, status }) => {
                    assert_eq!(user_id, "pat-3");
                    assert_eq!(status, PresenceStatus::Offline);
                }
                other => panic!("expected user_status, got {other:?}"),
            }
        }
    }
}
