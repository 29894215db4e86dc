//! The relay's single state-owning service.
//!
//! `ChatRelay` owns the client registry, ban list, session tracker,
//! registered-nickname set and lifecycle event log behind one lock, and
//! exposes only the operations the routers and the operator interface
//! need. Critical sections never await and never write to a socket:
//! delivery goes through each connection's bounded outbound queue.

use crate::config::Config;
use crate::error::StorageError;
use crate::events::{EventKind, EventLog, EventRecord};
use crate::outbound::{EnqueueError, OutboundSender};
use crate::session::{now_millis, PairSession, SessionEvent, SessionStatus, SessionSummary, TranscriptEntry};
use crate::storage::RegisteredStore;
use pairlink_types::{Routed, RoutedKind, ServerPacket, SessionKey};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total transport connections accepted.
    pub connections_total: AtomicU64,
    /// Total packets forwarded into a peer's outbound queue.
    pub packets_forwarded: AtomicU64,
    /// Total wire bytes forwarded (line plus newline).
    pub bytes_forwarded: AtomicU64,
    /// Packets dropped by the encryption/session gate.
    pub gated_drops: AtomicU64,
    /// Packets addressed to an offline nickname.
    pub delivery_misses: AtomicU64,
    /// Packets dropped because a peer's outbound queue was full.
    pub overflow_drops: AtomicU64,
    /// Malformed or incomplete records discarded.
    pub protocol_errors: AtomicU64,
    /// Total bans applied.
    pub bans_total: AtomicU64,
}

/// Live handle to one online client connection.
///
/// Owned exclusively by the registry; routers identify themselves by
/// nickname plus connection id and never hold another client's handle.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    /// Distinguishes this connection from earlier ones with the same nick.
    pub conn_id: u64,
    /// Remote peer address.
    pub addr: SocketAddr,
    /// Bounded queue into the connection's writer task.
    pub outbound: OutboundSender,
    /// Tells the connection's reader task to stop (ban, takeover).
    pub closer: Arc<Notify>,
}

/// Everything guarded by the relay lock.
struct RelayState {
    clients: HashMap<String, ClientHandle>,
    banned: HashSet<String>,
    sessions: HashMap<SessionKey, PairSession>,
    registered: BTreeSet<String>,
    events: EventLog,
}

/// Why a presence handshake was rejected.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// The nickname is banned for the life of the process.
    #[error("nickname {0:?} is banned")]
    Banned(String),
}

/// Main relay service.
pub struct ChatRelay {
    config: Config,
    store: RegisteredStore,
    state: Mutex<RelayState>,
    metrics: RelayMetrics,
    next_conn_id: AtomicU64,
}

impl std::fmt::Debug for ChatRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRelay")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ChatRelay {
    /// Create the relay: load the registered-nickname set from disk and
    /// start with an empty registry, ban list and session tracker.
    pub fn new(config: Config) -> Self {
        let store = RegisteredStore::new(&config.storage.registered_path);
        let registered = store.load();
        tracing::info!(count = registered.len(), "loaded registered nicknames");
        let events = EventLog::new(config.limits.event_buffer);
        Self {
            state: Mutex::new(RelayState {
                clients: HashMap::new(),
                banned: HashSet::new(),
                sessions: HashMap::new(),
                registered,
                events,
            }),
            store,
            config,
            metrics: RelayMetrics::default(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Handle a presence handshake.
    ///
    /// Rejects banned nicknames. If the nickname is already online the old
    /// connection is evicted first: its sessions are torn down with reason
    /// `disconnect` and its reader is told to stop. On success the nickname
    /// joins the durable registered set and the user list is rebroadcast.
    pub async fn register(
        &self,
        nick: &str,
        addr: SocketAddr,
        outbound: OutboundSender,
        closer: Arc<Notify>,
    ) -> Result<u64, RegisterError> {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().await;

        if state.banned.contains(nick) {
            return Err(RegisterError::Banned(nick.to_string()));
        }

        if let Some(old) = state.clients.remove(nick) {
            tracing::info!(
                nick,
                old_conn = old.conn_id,
                new_conn = conn_id,
                "nickname reconnected, evicting old connection"
            );
            Self::teardown_sessions(&mut state, nick, "disconnect");
            old.closer.notify_one();
        }

        state.clients.insert(
            nick.to_string(),
            ClientHandle {
                conn_id,
                addr,
                outbound,
                closer,
            },
        );

        if state.registered.insert(nick.to_string()) {
            if let Err(e) = self.store.persist(&state.registered) {
                tracing::error!("failed to persist registered nicknames: {e}");
            }
        }

        let ts = now_millis();
        state.events.push(EventKind::Connect, nick, ts);
        tracing::info!(nick, %addr, "client connected");
        Self::broadcast_user_list(&state);
        Ok(conn_id)
    }

    /// Handle stream termination for a connection.
    ///
    /// A no-op unless `conn_id` still owns the registry slot — a takeover
    /// or ban already cleaned up otherwise.
    pub async fn disconnect(&self, nick: &str, conn_id: u64) {
        let mut state = self.state.lock().await;
        match state.clients.get(nick) {
            Some(handle) if handle.conn_id == conn_id => {}
            _ => return,
        }
        state.clients.remove(nick);
        Self::teardown_sessions(&mut state, nick, "disconnect");
        let ts = now_millis();
        state.events.push(EventKind::Disconnect, nick, ts);
        tracing::info!(nick, "client disconnected");
        Self::broadcast_user_list(&state);
    }

    /// Ban a nickname for the life of the process. Idempotent.
    ///
    /// If the nickname is online, all in one critical section: its sessions
    /// are torn down with reason `ban`, it is removed from the registry, a
    /// `ban` packet is queued to it, its reader is told to stop, and the
    /// user list is rebroadcast.
    pub async fn ban(&self, nick: &str) {
        let mut state = self.state.lock().await;
        let newly_banned = state.banned.insert(nick.to_string());
        let online = state.clients.remove(nick);
        if !newly_banned && online.is_none() {
            return;
        }

        if newly_banned {
            self.metrics.bans_total.fetch_add(1, Ordering::Relaxed);
            let ts = now_millis();
            state.events.push(EventKind::Ban, nick, ts);
            tracing::info!(nick, "nickname banned");
        }

        if let Some(handle) = online {
            Self::teardown_sessions(&mut state, nick, "ban");
            let _ = handle.outbound.enqueue(ServerPacket::Ban.to_line());
            handle.closer.notify_one();
            Self::broadcast_user_list(&state);
        }
    }

    /// Route one addressed packet through the session gate to its target.
    ///
    /// Negotiation and teardown packets drive the session state machine
    /// before forwarding. Every packet kind that actually reaches a peer
    /// queue updates the pair's byte counter and transcript.
    pub async fn route(&self, routed: Routed) {
        let mut state = self.state.lock().await;
        let key = SessionKey::new(routed.from.as_str(), routed.to.as_str());

        match &routed.kind {
            RoutedKind::Message { encrypted } => {
                let active =
                    state.sessions.get(&key).map(PairSession::status) == Some(SessionStatus::Active);
                if !encrypted || !active {
                    self.metrics.gated_drops.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        from = %routed.from,
                        to = %routed.to,
                        encrypted,
                        "message dropped by session gate"
                    );
                    return;
                }
            }
            RoutedKind::EncryptResponse { accepted } => {
                // Activation requires both parties online, otherwise an
                // active pair could name an absent member.
                let both_online = state.clients.contains_key(&routed.from)
                    && state.clients.contains_key(&routed.to);
                let event = if *accepted && both_online {
                    SessionEvent::NegotiateAccept
                } else {
                    if *accepted {
                        tracing::debug!(
                            from = %routed.from,
                            to = %routed.to,
                            "negotiation accept naming an offline party, treated as reject"
                        );
                    }
                    SessionEvent::NegotiateReject
                };
                state.sessions.entry(key.clone()).or_default().apply(event);
            }
            RoutedKind::EndEncryption => {
                state
                    .sessions
                    .entry(key.clone())
                    .or_default()
                    .apply(SessionEvent::ExplicitEnd);
            }
            RoutedKind::Other(_) => {}
        }

        // Lookup-then-forward stays inside the critical section so the
        // target cannot be unregistered in between.
        let outbound = match state.clients.get(&routed.to) {
            Some(handle) => handle.outbound.clone(),
            None => {
                self.metrics.delivery_misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(to = %routed.to, "target offline, packet dropped");
                return;
            }
        };

        let line = routed.to_line();
        let wire_len = line.len() + 1; // the newline counts
        match outbound.enqueue(line) {
            Ok(()) => {
                self.metrics.packets_forwarded.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .bytes_forwarded
                    .fetch_add(wire_len as u64, Ordering::Relaxed);
                state
                    .sessions
                    .entry(key)
                    .or_default()
                    .record_transfer(wire_len, routed.value, now_millis());
            }
            Err(EnqueueError::Full) => {
                self.metrics.overflow_drops.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(to = %routed.to, "outbound queue full, packet dropped");
            }
            Err(EnqueueError::Closed) => {
                self.metrics.delivery_misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(to = %routed.to, "outbound queue closed, packet dropped");
            }
        }
    }

    /// Which of the requested nicknames have ever registered, sorted.
    pub async fn check_users(&self, requested: &BTreeSet<String>) -> Vec<String> {
        let state = self.state.lock().await;
        state.registered.intersection(requested).cloned().collect()
    }

    /// Sorted list of online nicknames.
    pub async fn online_users(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut users: Vec<String> = state.clients.keys().cloned().collect();
        users.sort();
        users
    }

    /// Summaries of every tracked session pair, in canonical pair order.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let state = self.state.lock().await;
        let mut out: Vec<SessionSummary> = state
            .sessions
            .iter()
            .map(|(key, session)| SessionSummary {
                pair: key.clone(),
                status: session.status(),
                bytes_forwarded: session.bytes_forwarded(),
                packets_forwarded: session.packets_forwarded(),
            })
            .collect();
        out.sort_by(|a, b| a.pair.cmp(&b.pair));
        out
    }

    /// Transcript of one pair, oldest first. `None` if never referenced.
    pub async fn transcript(&self, a: &str, b: &str) -> Option<Vec<TranscriptEntry>> {
        let state = self.state.lock().await;
        state
            .sessions
            .get(&SessionKey::new(a, b))
            .map(|session| session.transcript().to_vec())
    }

    /// Lifecycle events with sequence numbers greater than `since`.
    pub async fn events_since(&self, since: u64) -> Vec<EventRecord> {
        self.state.lock().await.events.since(since)
    }

    /// Number of online connections.
    pub async fn online_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    /// Number of tracked session pairs.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Whether `nick` is banned.
    pub async fn is_banned(&self, nick: &str) -> bool {
        self.state.lock().await.banned.contains(nick)
    }

    /// Persist the registered set (explicit shutdown flush).
    pub async fn flush(&self) -> Result<(), StorageError> {
        let state = self.state.lock().await;
        self.store.persist(&state.registered)
    }

    /// Force every active session containing `nick` inactive, queueing a
    /// teardown notice to the surviving peer. Caller holds the lock.
    fn teardown_sessions(state: &mut RelayState, nick: &str, reason: &str) {
        let RelayState {
            clients, sessions, ..
        } = state;
        for (key, session) in sessions.iter_mut() {
            if !key.contains(nick) || session.status() != SessionStatus::Active {
                continue;
            }
            session.apply(SessionEvent::PeerDeparted);
            let Some(peer) = key.peer_of(nick) else { continue };
            if let Some(handle) = clients.get(peer) {
                let notice = ServerPacket::EndEncryption {
                    from: nick.to_string(),
                    to: peer.to_string(),
                    reason: reason.to_string(),
                };
                let _ = handle.outbound.enqueue(notice.to_line());
            }
        }
    }

    /// Queue the current online user list to every connection. Best effort:
    /// a full or closed queue just misses this update. Caller holds the lock.
    fn broadcast_user_list(state: &RelayState) {
        let mut users: Vec<String> = state
            .clients
            .keys()
            .filter(|nick| !state.banned.contains(*nick))
            .cloned()
            .collect();
        users.sort();
        let line = ServerPacket::UserList { users }.to_line();
        for handle in state.clients.values() {
            let _ = handle.outbound.enqueue(line.clone());
        }
    }
}
