//! Session-scoped progress broadcaster.
//!
//! Each session is served by one actor task draining a bounded command
//! queue. Publishing only enqueues (`try_send`), so the caller never waits
//! on subscriber I/O. The actor delivers events to every subscriber in the
//! order they were published, and prunes subscribers whose connection has
//! gone away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use vforge_models::{ConnectionId, SessionEvent, SessionId};

use crate::error::{QueueError, QueueResult};

/// Broadcaster tuning.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Pending commands per session before publishes are dropped
    pub session_queue_capacity: usize,
    /// Outbound buffer per subscriber connection
    pub subscriber_buffer: usize,
    /// How often idle sessions re-check their retention
    pub sweep_interval: Duration,
    /// Sessions older than this are closed once no pipeline holds them
    pub max_session_age: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            session_queue_capacity: 256,
            subscriber_buffer: 32,
            sweep_interval: Duration::from_secs(30),
            max_session_age: Duration::from_secs(6 * 60 * 60),
        }
    }
}

impl BroadcasterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_u64 = |name: &str| std::env::var(name).ok().and_then(|s| s.parse::<u64>().ok());

        Self {
            session_queue_capacity: env_u64("SESSION_QUEUE_CAPACITY")
                .map(|v| v as usize)
                .unwrap_or(defaults.session_queue_capacity),
            subscriber_buffer: env_u64("SUBSCRIBER_BUFFER")
                .map(|v| v as usize)
                .unwrap_or(defaults.subscriber_buffer),
            sweep_interval: env_u64("SESSION_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            max_session_age: env_u64("SESSION_MAX_AGE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_session_age),
        }
    }
}

/// A live connection's inbound event sink.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: ConnectionId,
    tx: mpsc::Sender<SessionEvent>,
}

impl Subscriber {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { id, tx }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

enum Command {
    Subscribe {
        sub: Subscriber,
        ack: oneshot::Sender<()>,
    },
    Publish {
        event: SessionEvent,
        exclude: Option<ConnectionId>,
    },
    Relay {
        from: ConnectionId,
        event: SessionEvent,
        ack: oneshot::Sender<bool>,
    },
    /// Re-evaluate retention (a lease was released)
    Wake,
}

struct SessionEntry {
    tx: mpsc::Sender<Command>,
    owner: String,
}

type Registry = Arc<RwLock<HashMap<SessionId, SessionEntry>>>;

/// Lease on a live session held by whoever drives it (the pipeline).
///
/// The session stays alive while any lease exists, even with no
/// subscribers.
pub struct SessionHandle {
    id: SessionId,
    owner: String,
    tx: mpsc::Sender<Command>,
    leases: Arc<AtomicUsize>,
}

impl SessionHandle {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Enqueue an event for all subscribers. Never blocks.
    pub fn publish(&self, event: SessionEvent) -> bool {
        enqueue(&self.tx, &self.id, Command::Publish { event, exclude: None })
    }
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        self.leases.fetch_add(1, Ordering::SeqCst);
        Self {
            id: self.id.clone(),
            owner: self.owner.clone(),
            tx: self.tx.clone(),
            leases: Arc::clone(&self.leases),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.leases.fetch_sub(1, Ordering::SeqCst);
        let _ = self.tx.try_send(Command::Wake);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Registry of live sessions and owner connections.
#[derive(Clone)]
pub struct Broadcaster {
    config: BroadcasterConfig,
    sessions: Registry,
    /// Live connections per owner, auto-subscribed to sessions created for them
    connections: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl Broadcaster {
    pub fn new(config: BroadcasterConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    /// Channel for a new subscriber connection, sized per config.
    pub fn subscriber_channel(&self) -> (Subscriber, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        (Subscriber::new(ConnectionId::next(), tx), rx)
    }

    /// Track a live connection belonging to `owner`.
    pub fn register_connection(&self, owner: &str, sub: Subscriber) {
        let mut conns = write(&self.connections);
        let list = conns.entry(owner.to_string()).or_default();
        list.retain(|s| !s.is_closed());
        list.push(sub);
    }

    pub fn unregister_connection(&self, owner: &str, id: ConnectionId) {
        let mut conns = write(&self.connections);
        if let Some(list) = conns.get_mut(owner) {
            list.retain(|s| s.id != id && !s.is_closed());
            if list.is_empty() {
                conns.remove(owner);
            }
        }
    }

    /// Create a session for `owner`.
    ///
    /// The owner's live connections are subscribed and receive
    /// `session-start` before any other event of the session.
    pub fn create_session(&self, owner: &str) -> SessionHandle {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(self.config.session_queue_capacity);
        let leases = Arc::new(AtomicUsize::new(1));

        let initial: Vec<Subscriber> = read(&self.connections)
            .get(owner)
            .map(|list| list.iter().filter(|s| !s.is_closed()).cloned().collect())
            .unwrap_or_default();

        write(&self.sessions).insert(
            id.clone(),
            SessionEntry {
                tx: tx.clone(),
                owner: owner.to_string(),
            },
        );

        let actor = SessionActor {
            id: id.clone(),
            subscribers: initial,
            leases: Arc::clone(&leases),
            created_at: Instant::now(),
            config: self.config.clone(),
            registry: Arc::clone(&self.sessions),
        };
        tokio::spawn(actor.run(rx));

        metrics::counter!("broadcaster_sessions_total").increment(1);
        info!(session_id = %id, owner = %owner, "Session created");

        let handle = SessionHandle {
            id: id.clone(),
            owner: owner.to_string(),
            tx,
            leases,
        };
        handle.publish(SessionEvent::SessionStart {
            session_id: id,
            user_id: owner.to_string(),
        });
        handle
    }

    /// Attach a connection to an existing session.
    pub async fn join(&self, session_id: &SessionId, sub: Subscriber) -> QueueResult<()> {
        let tx = self.session_sender(session_id)?;
        let (ack_tx, ack_rx) = oneshot::channel();

        tx.send(Command::Subscribe { sub, ack: ack_tx })
            .await
            .map_err(|_| QueueError::session_not_found(session_id.as_str()))?;
        ack_rx
            .await
            .map_err(|_| QueueError::session_not_found(session_id.as_str()))
    }

    /// Relay an edit command from one member to every other member.
    pub async fn relay(
        &self,
        session_id: &SessionId,
        from: ConnectionId,
        command: serde_json::Value,
    ) -> QueueResult<()> {
        let tx = self.session_sender(session_id)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        let event = SessionEvent::Command {
            session_id: session_id.clone(),
            command,
        };

        tx.send(Command::Relay {
            from,
            event,
            ack: ack_tx,
        })
        .await
        .map_err(|_| QueueError::session_not_found(session_id.as_str()))?;

        match ack_rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(QueueError::NotSessionMember(session_id.to_string())),
            Err(_) => Err(QueueError::session_not_found(session_id.as_str())),
        }
    }

    /// Enqueue an event for a session by id. Never blocks.
    pub fn publish(&self, session_id: &SessionId, event: SessionEvent) -> bool {
        match self.session_sender(session_id) {
            Ok(tx) => enqueue(&tx, session_id, Command::Publish { event, exclude: None }),
            Err(_) => false,
        }
    }

    pub fn session_owner(&self, session_id: &SessionId) -> Option<String> {
        read(&self.sessions).get(session_id).map(|e| e.owner.clone())
    }

    pub fn session_count(&self) -> usize {
        read(&self.sessions).len()
    }

    fn session_sender(&self, session_id: &SessionId) -> QueueResult<mpsc::Sender<Command>> {
        read(&self.sessions)
            .get(session_id)
            .map(|e| e.tx.clone())
            .ok_or_else(|| QueueError::session_not_found(session_id.as_str()))
    }
}

fn enqueue(tx: &mpsc::Sender<Command>, session_id: &SessionId, cmd: Command) -> bool {
    match tx.try_send(cmd) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            metrics::counter!("broadcaster_events_dropped_total", "reason" => "session_full")
                .increment(1);
            warn!(session_id = %session_id, "Session queue full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(session_id = %session_id, "Session closed, dropping event");
            false
        }
    }
}

// Registry critical sections never await or panic; recover the data from a
// poisoned lock.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

struct SessionActor {
    id: SessionId,
    subscribers: Vec<Subscriber>,
    leases: Arc<AtomicUsize>,
    created_at: Instant,
    config: BroadcasterConfig,
    registry: Registry,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let mut tick = tokio::time::interval(self.config.sweep_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tick.tick().await;

        metrics::gauge!("broadcaster_sessions_active").increment(1.0);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                _ = tick.tick() => {}
            }

            self.subscribers.retain(|s| !s.is_closed());

            if self.should_close() && rx.is_empty() {
                write(&self.registry).remove(&self.id);
                break;
            }
        }

        metrics::gauge!("broadcaster_sessions_active").decrement(1.0);
        info!(
            session_id = %self.id,
            age_secs = self.created_at.elapsed().as_secs(),
            "Session closed"
        );
    }

    fn should_close(&self) -> bool {
        if self.leases.load(Ordering::SeqCst) > 0 {
            return false;
        }
        self.subscribers.is_empty() || self.created_at.elapsed() > self.config.max_session_age
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Subscribe { sub, ack } => {
                if !self.subscribers.iter().any(|s| s.id == sub.id) {
                    debug!(session_id = %self.id, connection = %sub.id, "Subscriber joined");
                    self.subscribers.push(sub);
                }
                let _ = ack.send(());
            }
            Command::Publish { event, exclude } => self.deliver(&event, exclude),
            Command::Relay { from, event, ack } => {
                let member = self.subscribers.iter().any(|s| s.id == from);
                if member {
                    self.deliver(&event, Some(from));
                }
                let _ = ack.send(member);
            }
            Command::Wake => {}
        }
    }

    fn deliver(&self, event: &SessionEvent, exclude: Option<ConnectionId>) {
        for sub in &self.subscribers {
            if Some(sub.id) == exclude {
                continue;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    metrics::counter!("broadcaster_events_dropped_total", "reason" => "subscriber_full")
                        .increment(1);
                    warn!(
                        session_id = %self.id,
                        connection = %sub.id,
                        event = event.type_name(),
                        "Subscriber buffer full, dropping event"
                    );
                }
                // pruned after this command
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vforge_models::ProgressEvent;

    fn progress(session: &SessionId, feature: &str) -> SessionEvent {
        SessionEvent::Progress(ProgressEvent::new(session.clone(), feature, None))
    }

    async fn next(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_owner_connection_receives_session_start_then_progress_in_order() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let (sub, mut rx) = broadcaster.subscriber_channel();
        broadcaster.register_connection("u1", sub);

        let session = broadcaster.create_session("u1");
        for feature in ["autoCrop", "privacyBlur", "generateCaptions"] {
            assert!(session.publish(progress(session.id(), feature)));
        }

        match next(&mut rx).await {
            SessionEvent::SessionStart { session_id, user_id } => {
                assert_eq!(&session_id, session.id());
                assert_eq!(user_id, "u1");
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            if let SessionEvent::Progress(p) = next(&mut rx).await {
                seen.push(p.feature);
            }
        }
        assert_eq!(seen, vec!["autoCrop", "privacyBlur", "generateCaptions"]);
    }

    #[tokio::test]
    async fn test_other_owner_not_subscribed() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let (sub, mut rx) = broadcaster.subscriber_channel();
        broadcaster.register_connection("someone-else", sub);

        let session = broadcaster.create_session("u1");
        session.publish(progress(session.id(), "autoCrop"));

        let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn test_join_then_edit_command_relayed_to_others_only() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("u1");

        let (a, mut rx_a) = broadcaster.subscriber_channel();
        let (b, mut rx_b) = broadcaster.subscriber_channel();
        let b_id = b.id;
        broadcaster.join(session.id(), a).await.unwrap();
        broadcaster.join(session.id(), b).await.unwrap();

        let cmd = serde_json::json!({ "op": "trim", "start": 1.5 });
        broadcaster.relay(session.id(), b_id, cmd.clone()).await.unwrap();

        match next(&mut rx_a).await {
            SessionEvent::Command { session_id, command } => {
                assert_eq!(&session_id, session.id());
                assert_eq!(command, cmd);
            }
            other => panic!("unexpected {:?}", other),
        }

        let echoed = tokio::time::timeout(Duration::from_millis(100), rx_b.recv()).await;
        assert!(echoed.is_err(), "sender must not receive its own command");
    }

    #[tokio::test]
    async fn test_relay_from_non_member_rejected() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("u1");

        let err = broadcaster
            .relay(session.id(), ConnectionId::next(), serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::NotSessionMember(_)));
    }

    #[tokio::test]
    async fn test_join_unknown_session() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let (sub, _rx) = broadcaster.subscriber_channel();

        let err = broadcaster
            .join(&SessionId::from_string("missing"), sub)
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_disconnected_subscriber_does_not_affect_others() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("u1");

        let (gone, gone_rx) = broadcaster.subscriber_channel();
        let (stays, mut rx) = broadcaster.subscriber_channel();
        broadcaster.join(session.id(), gone).await.unwrap();
        broadcaster.join(session.id(), stays).await.unwrap();
        drop(gone_rx);

        assert!(session.publish(progress(session.id(), "autoCrop")));
        assert!(matches!(next(&mut rx).await, SessionEvent::Progress(_)));
    }

    #[tokio::test]
    async fn test_slow_subscriber_never_blocks_publisher() {
        let config = BroadcasterConfig {
            subscriber_buffer: 1,
            ..Default::default()
        };
        let broadcaster = Broadcaster::new(config);
        let session = broadcaster.create_session("u1");
        let (slow, _rx) = broadcaster.subscriber_channel();
        broadcaster.join(session.id(), slow).await.unwrap();

        // nobody reads _rx; publishing must still return immediately
        for _ in 0..100 {
            session.publish(progress(session.id(), "autoCrop"));
        }
    }

    #[tokio::test]
    async fn test_session_removed_when_released_without_subscribers() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("u1");
        let id = session.id().clone();
        assert_eq!(broadcaster.session_count(), 1);

        drop(session);

        tokio::time::timeout(Duration::from_secs(1), async {
            while broadcaster.session_owner(&id).is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("session was not released");
        assert!(!broadcaster.publish(&id, progress(&id, "autoCrop")));
    }

    #[tokio::test]
    async fn test_session_outlives_lease_while_subscribed() {
        let broadcaster = Broadcaster::new(BroadcasterConfig::default());
        let session = broadcaster.create_session("u1");
        let id = session.id().clone();
        let (sub, mut rx) = broadcaster.subscriber_channel();
        broadcaster.join(&id, sub).await.unwrap();

        drop(session);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(broadcaster.publish(&id, progress(&id, "autoCrop")));
        assert!(matches!(next(&mut rx).await, SessionEvent::Progress(_)));
    }
}
