//! Session WebSocket with backpressure support.
//!
//! A connection authenticates with `?token=`, is registered for its owner
//! (so sessions created for that owner reach it with `session-start`), and
//! can join other sessions and relay edit commands to their members.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use vforge_models::{ClientEvent, SessionEvent};
use vforge_queue::{Broadcaster, QueueError, Subscriber};

use crate::error::ApiError;
use crate::metrics;
use crate::middleware::RequestId;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Configuration for WebSocket backpressure.
const WS_SEND_BUFFER_SIZE: usize = 32;
const WS_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const WS_CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

const ENDPOINT: &str = "session";

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub token: Option<String>,
}

/// `GET /ws/session?token=...`
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let token = query.token.as_deref().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return ApiError::unauthorized("Missing token")
            .correlate(request_id.as_str())
            .into_response();
    }

    let user = match state.verifier.verify(token).await {
        Ok(user) => user,
        Err(e) => return e.correlate(request_id.as_str()).into_response(),
    };

    let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection(ENDPOINT);

    ws.on_upgrade(move |socket| async move {
        handle_session_socket(socket, state.broadcaster, user.uid).await;
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

/// Send a session event with backpressure handling.
async fn send_event(tx: &mpsc::Sender<Message>, event: &SessionEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize session event: {}", e);
            return true;
        }
    };

    let sent = match tx.try_send(Message::Text(json)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(msg)) => {
            debug!("WebSocket send buffer full, applying backpressure");
            tx.send(msg).await.is_ok()
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    };
    if sent {
        metrics::record_ws_message_sent(ENDPOINT, event.type_name());
    }
    sent
}

async fn handle_session_socket(socket: WebSocket, broadcaster: Broadcaster, uid: String) {
    let (ws_sender, mut receiver) = socket.split();

    // Bounded channel so a slow client backs up here, not in the session
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);
    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
        ws_sender
    });

    let (subscriber, mut events) = broadcaster.subscriber_channel();
    let connection_id = subscriber.id;
    broadcaster.register_connection(&uid, subscriber.clone());
    info!(uid = %uid, connection = %connection_id, "Session socket connected");

    let mut heartbeat = interval(WS_HEARTBEAT_INTERVAL);
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !send_event(&tx, &event).await {
                    warn!("WebSocket send failed, client disconnected");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > WS_CLIENT_TIMEOUT {
                    info!(uid = %uid, "Client timed out");
                    break;
                }
                if last_activity.elapsed() > WS_HEARTBEAT_INTERVAL / 2
                    && tx.send(Message::Ping(vec![])).await.is_err()
                {
                    warn!("Heartbeat failed, client disconnected");
                    break;
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        metrics::record_ws_message_received(ENDPOINT);
                        if let Some(reply) = handle_client_message(&broadcaster, &subscriber, &text).await {
                            if !send_event(&tx, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(uid = %uid, "Client closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(uid = %uid, "WebSocket receive error: {}", e);
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {}
                }
            }
        }
    }

    broadcaster.unregister_connection(&uid, connection_id);
    // Closing the subscriber channel lets joined sessions drop this member
    drop(events);
    drop(tx);
    let _ = send_task.await;
    info!(uid = %uid, connection = %connection_id, "Session socket ended");
}

/// Apply one inbound event. Returns an `error` event to send back when the
/// event is rejected.
pub async fn handle_client_message(
    broadcaster: &Broadcaster,
    subscriber: &Subscriber,
    text: &str,
) -> Option<SessionEvent> {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Malformed client event: {}", e);
            metrics::record_ws_rejected_event("malformed");
            return Some(SessionEvent::error("malformed event"));
        }
    };

    let result = match &event {
        ClientEvent::JoinSession { session_id } => broadcaster.join(session_id, subscriber.clone()).await,
        ClientEvent::EditCommand {
            session_id,
            command,
        } => {
            broadcaster
                .relay(session_id, subscriber.id, command.clone())
                .await
        }
    };

    match result {
        Ok(()) => None,
        Err(QueueError::NotSessionMember(session_id)) => {
            metrics::record_ws_rejected_event("not_member");
            Some(SessionEvent::error(format!("not a member of session {}", session_id)))
        }
        Err(QueueError::SessionNotFound(session_id)) => {
            metrics::record_ws_rejected_event("unknown_session");
            Some(SessionEvent::error(format!("unknown session {}", session_id)))
        }
        Err(e) => {
            warn!("Client event failed: {}", e);
            metrics::record_ws_rejected_event("internal");
            Some(SessionEvent::error("event could not be applied"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use vforge_queue::BroadcasterConfig;

    async fn recv(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_malformed_event_answered_with_error() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let (sub, _rx) = broadcaster.subscriber_channel();

        let reply = handle_client_message(&broadcaster, &sub, "{not json").await;
        assert_eq!(reply, Some(SessionEvent::error("malformed event")));
    }

    #[tokio::test]
    async fn test_join_unknown_session_rejected() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let (sub, _rx) = broadcaster.subscriber_channel();

        let reply = handle_client_message(
            &broadcaster,
            &sub,
            r#"{"type":"join-session","sessionId":"nope"}"#,
        )
        .await;
        assert!(matches!(reply, Some(SessionEvent::Error { message }) if message.contains("unknown session")));
    }

    #[tokio::test]
    async fn test_edit_command_relayed_to_other_members_only() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("owner-1");
        let join = format!(r#"{{"type":"join-session","sessionId":"{}"}}"#, session.id());

        let (alice, mut alice_rx) = broadcaster.subscriber_channel();
        let (bob, mut bob_rx) = broadcaster.subscriber_channel();
        assert_eq!(handle_client_message(&broadcaster, &alice, &join).await, None);
        assert_eq!(handle_client_message(&broadcaster, &bob, &join).await, None);

        let edit = format!(
            r#"{{"type":"edit-command","sessionId":"{}","command":{{"op":"trim","at":2}}}}"#,
            session.id()
        );
        assert_eq!(handle_client_message(&broadcaster, &alice, &edit).await, None);

        match recv(&mut bob_rx).await {
            SessionEvent::Command {
                session_id,
                command,
            } => {
                assert_eq!(&session_id, session.id());
                assert_eq!(command["op"], "trim");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_edit_command_from_non_member_rejected() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("owner-1");
        let (outsider, _rx) = broadcaster.subscriber_channel();

        let edit = serde_json::json!({
            "type": "edit-command",
            "sessionId": session.id(),
            "command": {"op": "cut"}
        })
        .to_string();

        let reply = handle_client_message(&broadcaster, &outsider, &edit).await;
        assert!(matches!(reply, Some(SessionEvent::Error { message }) if message.contains("not a member")));
    }
}
