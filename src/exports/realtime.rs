//! # Shared realtime client.
//!
//! One connection per host, shared by every remote through `./realtime`.
//!
//! ## Protocol
//! ```text
//! subscribe   { room }          join a room
//! unsubscribe { room }          leave a room
//! <event>     payload           room-scoped server push, delivered to `on` listeners
//! request(event, payload) ──►   server acknowledges with a value, or nothing (timeout)
//! ```
//!
//! ## Rules
//! - `connect()` is idempotent; concurrent callers share one connection.
//! - After a reconnect, previously joined rooms are joined again.
//! - `request` fails with [`RealtimeError::RequestTimeout`] when no
//!   acknowledgement arrives in time, and the `loading` flag is cleared on
//!   every exit path.
//! - Listener panics are caught and logged; other listeners still run.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::RealtimeConfig;
use crate::error::RealtimeError;

/// Message exchanged with the realtime server.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Event name.
    pub event: String,
    /// Room the event is scoped to, if any.
    pub room: Option<String>,
    /// Event payload.
    pub payload: Value,
}

/// Acknowledgement slot for a request.
pub type Ack = oneshot::Sender<Value>;

/// Establishes connections.
#[async_trait]
pub trait RealtimeTransport: Send + Sync + 'static {
    /// Opens a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Arc<dyn RealtimeConnection>, RealtimeError>;
}

/// One open connection.
pub trait RealtimeConnection: Send + Sync + 'static {
    /// Sends `event`; `ack` receives the server's acknowledgement, if any.
    fn emit(&self, event: &str, payload: Value, ack: Option<Ack>) -> Result<(), RealtimeError>;

    /// Stream of server pushes.
    fn incoming(&self) -> broadcast::Receiver<Envelope>;

    /// True until closed.
    fn is_open(&self) -> bool;

    /// Closes the connection.
    fn close(&self);
}

/// Handle to the current connection.
#[derive(Clone)]
pub struct ClientHandle {
    id: u64,
    conn: Arc<dyn RealtimeConnection>,
}

impl ClientHandle {
    /// Connection number (increments on every reconnect).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True until the connection closes.
    pub fn is_connected(&self) -> bool {
        self.conn.is_open()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Identifier of a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

struct Listener {
    id: ListenerId,
    room: Option<String>,
    event: String,
    handler: Handler,
}

#[derive(Default)]
struct Listeners {
    entries: RwLock<Vec<Listener>>,
    rooms: RwLock<BTreeSet<String>>,
}

impl Listeners {
    fn dispatch(&self, env: &Envelope) {
        if let Some(room) = &env.room {
            if !self.rooms.read().contains(room) {
                return;
            }
        }
        let handlers: Vec<Handler> = self
            .entries
            .read()
            .iter()
            .filter(|l| l.event == env.event)
            .filter(|l| l.room.is_none() || l.room == env.room)
            .map(|l| Arc::clone(&l.handler))
            .collect();

        for handler in handlers {
            let call = std::panic::AssertUnwindSafe(|| handler(env));
            if let Err(panic_err) = std::panic::catch_unwind(call) {
                let info = crate::panic_message(panic_err.as_ref());
                tracing::warn!(event = %env.event, %info, "realtime listener panicked");
            }
        }
    }
}

/// Clears the loading flag when the last in-flight request ends.
struct InFlight<'a> {
    pending: &'a AtomicUsize,
    loading: &'a watch::Sender<bool>,
}

impl<'a> InFlight<'a> {
    fn enter(pending: &'a AtomicUsize, loading: &'a watch::Sender<bool>) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        loading.send_replace(true);
        Self { pending, loading }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.loading.send_replace(false);
        }
    }
}

/// Realtime client shared by the host and its remotes.
pub struct RealtimeClient {
    transport: Arc<dyn RealtimeTransport>,
    url: String,
    request_timeout: Duration,
    handle: AsyncMutex<Option<ClientHandle>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    listeners: Arc<Listeners>,
    next_listener: AtomicU64,
    connections: AtomicU64,
    pending: AtomicUsize,
    loading: watch::Sender<bool>,
}

impl RealtimeClient {
    /// Creates a disconnected client.
    pub fn new(transport: Arc<dyn RealtimeTransport>, cfg: &RealtimeConfig) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            transport,
            url: cfg.url.clone(),
            request_timeout: cfg.request_timeout(),
            handle: AsyncMutex::new(None),
            dispatcher: Mutex::new(None),
            listeners: Arc::default(),
            next_listener: AtomicU64::new(1),
            connections: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            loading,
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connects, or returns the open connection.
    pub async fn connect(&self) -> Result<ClientHandle, RealtimeError> {
        let mut current = self.handle.lock().await;
        if let Some(handle) = current.as_ref().filter(|h| h.is_connected()) {
            return Ok(handle.clone());
        }

        let conn = self.transport.connect(&self.url).await.inspect_err(|e| {
            tracing::warn!(url = %self.url, error = %e, "realtime connect failed");
        })?;
        let handle = ClientHandle {
            id: self.connections.fetch_add(1, Ordering::SeqCst) + 1,
            conn,
        };

        let mut incoming = handle.conn.incoming();
        let listeners = Arc::clone(&self.listeners);
        let dispatcher = tokio::spawn(async move {
            loop {
                match incoming.recv().await {
                    Ok(env) => listeners.dispatch(&env),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "realtime listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(old) = self.dispatcher.lock().replace(dispatcher) {
            old.abort();
        }

        let rooms: Vec<String> = self.listeners.rooms.read().iter().cloned().collect();
        for room in rooms {
            handle.conn.emit("subscribe", json!({ "room": room }), None)?;
        }

        tracing::debug!(url = %self.url, connection = handle.id, "realtime connected");
        *current = Some(handle.clone());
        Ok(handle)
    }

    /// Current connection, if open.
    pub async fn handle(&self) -> Option<ClientHandle> {
        self.handle
            .lock()
            .await
            .as_ref()
            .filter(|h| h.is_connected())
            .cloned()
    }

    /// Joins `room`, connecting first if needed.
    pub async fn subscribe(&self, room: &str) -> Result<(), RealtimeError> {
        let handle = self.connect().await?;
        handle.conn.emit("subscribe", json!({ "room": room }), None)?;
        self.listeners.rooms.write().insert(room.to_string());
        Ok(())
    }

    /// Leaves `room`.
    pub async fn unsubscribe(&self, room: &str) -> Result<(), RealtimeError> {
        let joined = self.listeners.rooms.write().remove(room);
        if let Some(handle) = self.handle().await {
            if joined {
                handle.conn.emit("unsubscribe", json!({ "room": room }), None)?;
            }
        }
        Ok(())
    }

    /// Rooms currently joined.
    pub fn rooms(&self) -> Vec<String> {
        self.listeners.rooms.read().iter().cloned().collect()
    }

    /// Registers `handler` for `event`, optionally restricted to `room`.
    pub fn on<F>(&self, room: Option<&str>, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.entries.write().push(Listener {
            id,
            room: room.map(str::to_string),
            event: event.to_string(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes a listener.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut entries = self.listeners.entries.write();
        let before = entries.len();
        entries.retain(|l| l.id != id);
        entries.len() != before
    }

    /// Sends `event` without waiting for an acknowledgement.
    pub async fn emit(&self, event: &str, payload: Value) -> Result<(), RealtimeError> {
        let handle = self.handle().await.ok_or(RealtimeError::NotConnected)?;
        handle.conn.emit(event, payload, None)
    }

    /// Sends `event` and waits for the acknowledgement.
    pub async fn request(&self, event: &str, payload: Value) -> Result<Value, RealtimeError> {
        let _in_flight = InFlight::enter(&self.pending, &self.loading);

        let handle = self.connect().await?;
        let (tx, rx) = oneshot::channel();
        handle.conn.emit(event, payload, Some(tx))?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(RealtimeError::Closed),
            Err(_) => {
                tracing::warn!(event, timeout = ?self.request_timeout, "realtime request timed out");
                Err(RealtimeError::RequestTimeout {
                    event: event.to_string(),
                    timeout: self.request_timeout,
                })
            }
        }
    }

    /// True while at least one request is in flight.
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Receiver for the loading flag.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Closes the connection. Joined rooms are remembered for the next connect.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.conn.close();
            tracing::debug!(connection = handle.id, "realtime disconnected");
        }
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.url)
            .field("request_timeout", &self.request_timeout)
            .field("rooms", &self.rooms())
            .finish()
    }
}

/// Envelopes the loopback transport keeps for inspection; older ones are dropped.
const RECEIVED_CAPACITY: usize = 1024;

/// Server-side handler of the loopback transport: returns the acknowledgement,
/// or `None` to leave the request unanswered.
pub type ServerHandler = Arc<dyn Fn(&Envelope) -> Option<Value> + Send + Sync>;

/// In-process transport; one shared "server" for every connection.
pub struct LoopbackTransport {
    handler: ServerHandler,
    hub: broadcast::Sender<Envelope>,
    reachable: AtomicBool,
    connects: AtomicUsize,
    received: Arc<Mutex<VecDeque<Envelope>>>,
    unanswered: Arc<Mutex<Vec<Ack>>>,
}

impl LoopbackTransport {
    /// Creates a transport whose server answers with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Envelope) -> Option<Value> + Send + Sync + 'static,
    {
        let (hub, _) = broadcast::channel(256);
        Self {
            handler: Arc::new(handler),
            hub,
            reachable: AtomicBool::new(true),
            connects: AtomicUsize::new(0),
            received: Arc::default(),
            unanswered: Arc::default(),
        }
    }

    /// A server that never acknowledges.
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    /// Pushes `envelope` to every open connection.
    pub fn push(&self, envelope: Envelope) {
        let _ = self.hub.send(envelope);
    }

    /// Makes subsequent connects fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The most recent envelopes received from clients, oldest first.
    pub fn received(&self) -> Vec<Envelope> {
        self.received.lock().iter().cloned().collect()
    }

    /// Requests the server left unanswered whose caller is still waiting.
    pub fn unanswered(&self) -> usize {
        let mut acks = self.unanswered.lock();
        acks.retain(|ack| !ack.is_closed());
        acks.len()
    }
}

#[async_trait]
impl RealtimeTransport for LoopbackTransport {
    async fn connect(&self, url: &str) -> Result<Arc<dyn RealtimeConnection>, RealtimeError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(RealtimeError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(LoopbackConnection {
            handler: Arc::clone(&self.handler),
            hub: self.hub.clone(),
            open: AtomicBool::new(true),
            received: Arc::clone(&self.received),
            unanswered: Arc::clone(&self.unanswered),
        }))
    }
}

impl fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("connects", &self.connects())
            .finish()
    }
}

struct LoopbackConnection {
    handler: ServerHandler,
    hub: broadcast::Sender<Envelope>,
    open: AtomicBool,
    received: Arc<Mutex<VecDeque<Envelope>>>,
    unanswered: Arc<Mutex<Vec<Ack>>>,
}

impl RealtimeConnection for LoopbackConnection {
    fn emit(&self, event: &str, payload: Value, ack: Option<Ack>) -> Result<(), RealtimeError> {
        if !self.is_open() {
            return Err(RealtimeError::Closed);
        }
        let env = Envelope {
            event: event.to_string(),
            room: payload.get("room").and_then(Value::as_str).map(str::to_string),
            payload,
        };
        {
            let mut received = self.received.lock();
            if received.len() == RECEIVED_CAPACITY {
                received.pop_front();
            }
            received.push_back(env.clone());
        }

        let reply = (self.handler)(&env);
        let mut unanswered = self.unanswered.lock();
        // Callers that timed out dropped their receiver.
        unanswered.retain(|pending| !pending.is_closed());
        if let Some(ack) = ack {
            match reply {
                Some(value) => {
                    let _ = ack.send(value);
                }
                None => unanswered.push(ack),
            }
        }
        Ok(())
    }

    fn incoming(&self) -> broadcast::Receiver<Envelope> {
        self.hub.subscribe()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_client() -> (RealtimeClient, Arc<LoopbackTransport>) {
        let transport = Arc::new(LoopbackTransport::new(|env| {
            (env.event == "getUsers").then(|| json!(["ada", "grace"]))
        }));
        let client = RealtimeClient::new(transport.clone(), &RealtimeConfig::default());
        (client, transport)
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let (client, transport) = echo_client();
        let a = client.connect().await.unwrap();
        let b = client.connect().await.unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(transport.connects(), 1);

        client.disconnect().await;
        let c = client.connect().await.unwrap();
        assert_ne!(c.id(), a.id());
    }

    #[tokio::test]
    async fn request_is_acknowledged() {
        let (client, _) = echo_client();
        let users = client.request("getUsers", json!({})).await.unwrap();
        assert_eq!(users, json!(["ada", "grace"]));
        assert!(!client.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_and_clears_loading() {
        let transport = Arc::new(LoopbackTransport::silent());
        let client = Arc::new(RealtimeClient::new(transport, &RealtimeConfig::default()));
        let mut loading = client.loading();

        let req = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.request("getUsers", json!({})).await }
        });

        loading.wait_for(|l| *l).await.unwrap();
        let err = req.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            RealtimeError::RequestTimeout {
                event: "getUsers".into(),
                timeout: Duration::from_secs(30)
            }
        );
        assert!(!client.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn long_lived_transport_drops_abandoned_requests() {
        let transport = Arc::new(LoopbackTransport::silent());
        let client = RealtimeClient::new(transport.clone(), &RealtimeConfig::default());

        for _ in 0..3 {
            assert!(client.request("getUsers", json!({})).await.is_err());
        }
        client.emit("ping", json!({})).await.unwrap();
        assert_eq!(transport.unanswered(), 0);

        for i in 0..RECEIVED_CAPACITY + 10 {
            client.emit("tick", json!({ "seq": i })).await.unwrap();
        }
        let received = transport.received();
        assert_eq!(received.len(), RECEIVED_CAPACITY);
        assert_eq!(received[0].payload["seq"], json!(10));
        assert_eq!(received[RECEIVED_CAPACITY - 1].payload["seq"], json!(RECEIVED_CAPACITY + 9));
    }

    #[tokio::test]
    async fn refused_connect_clears_loading() {
        let transport = Arc::new(LoopbackTransport::silent());
        transport.set_reachable(false);
        let client = RealtimeClient::new(transport, &RealtimeConfig::default());

        let err = client.request("getUsers", json!({})).await.unwrap_err();
        assert_eq!(err.as_label(), "realtime_connect_failed");
        assert!(!client.is_loading());
    }

    #[tokio::test]
    async fn room_events_reach_room_listeners() {
        let (client, transport) = echo_client();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let id = client.on(Some("acme"), "user.updated", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        client.on(None, "user.updated", |_| panic!("listener bug"));

        client.subscribe("acme").await.unwrap();
        tokio::task::yield_now().await;

        transport.push(Envelope {
            event: "user.updated".into(),
            room: Some("acme".into()),
            payload: json!({ "room": "acme", "id": "u1" }),
        });
        transport.push(Envelope {
            event: "user.updated".into(),
            room: Some("globex".into()),
            payload: json!({ "room": "globex", "id": "u9" }),
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(client.off(id));
        client.unsubscribe("acme").await.unwrap();
        assert!(client.rooms().is_empty());

        let sent: Vec<String> = transport.received().into_iter().map(|e| e.event).collect();
        assert_eq!(sent, vec!["subscribe", "unsubscribe"]);
    }

    #[tokio::test]
    async fn rooms_are_rejoined_after_reconnect() {
        let (client, transport) = echo_client();
        client.subscribe("acme").await.unwrap();
        client.disconnect().await;
        client.connect().await.unwrap();

        let joins = transport
            .received()
            .into_iter()
            .filter(|e| e.event == "subscribe" && e.room.as_deref() == Some("acme"))
            .count();
        assert_eq!(joins, 2);
    }
}
