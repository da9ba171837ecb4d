use crate::client::backoff::ReconnectPolicy;
use crate::domain::{ClientEvent, ServerEvent, is_clean_close};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client-side connection state, ephemeral per manager, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

pub type StatusHandler = Box<dyn Fn(ConnectionStatus) + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(&ServerEvent) + Send + Sync>;

/// Handle returned by the subscription methods. Call [`Subscription::unsubscribe`]
/// to stop receiving notifications; dropping the handle keeps the subscription
/// alive for the manager's lifetime.
pub struct Subscription<T> {
    id: u64,
    handlers: Weak<DashMap<u64, T>>,
}

impl<T> Subscription<T> {
    pub fn unsubscribe(self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.remove(&self.id);
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct Inner {
    endpoint: String,
    token: String,
    user_id: i64,
    policy: ReconnectPolicy,
    status_tx: watch::Sender<ConnectionStatus>,
    status_handlers: Arc<DashMap<u64, StatusHandler>>,
    message_handlers: Arc<DashMap<u64, MessageHandler>>,
    next_subscription: AtomicU64,
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            for handler in self.status_handlers.iter() {
                (handler.value())(status);
            }
        }
    }

    fn notify_message(&self, event: &ServerEvent) {
        for handler in self.message_handlers.iter() {
            (handler.value())(event);
        }
    }
}

/// Owns at most one live socket to the relay. Registers the user on open,
/// recovers from abnormal drops with exponential backoff, and fans inbound
/// events and status changes out to subscribers.
pub struct ConnectionManager {
    inner: Arc<Inner>,
    outbound_tx: mpsc::Sender<ClientEvent>,
    outbound_rx: Mutex<Option<mpsc::Receiver<ClientEvent>>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint)
            .field("user_id", &self.inner.user_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

enum SocketOutcome {
    Clean,
    Abnormal,
    Shutdown,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        user_id: i64,
        token: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::channel(32);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                token: token.into(),
                user_id,
                policy,
                status_tx,
                status_handlers: Arc::new(DashMap::new()),
                message_handlers: Arc::new(DashMap::new()),
                next_subscription: AtomicU64::new(0),
            }),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Starts the connection task. Idempotent: a second call while the task is
    /// alive is a no-op, so one manager never holds two sockets.
    pub fn connect(&self) {
        let mut task = self.task.lock().expect("connection task lock poisoned");
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::debug!("Connection task already running");
            return;
        }

        let Some(outbound_rx) = self.outbound_rx.lock().expect("outbound lock poisoned").take() else {
            tracing::warn!("Connection manager already exhausted; create a new one to reconnect");
            return;
        };

        let inner = Arc::clone(&self.inner);
        let shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(run(inner, outbound_rx, shutdown_rx)));
    }

    /// Queues an event for the socket if currently connected. Otherwise a
    /// no-op returning false; callers fall back on the REST path for
    /// durability.
    pub fn send(&self, event: ClientEvent) -> bool {
        if *self.inner.status_tx.borrow() != ConnectionStatus::Connected {
            tracing::debug!("Socket not connected; dropping outbound event");
            return false;
        }
        self.outbound_tx.try_send(event).is_ok()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status_tx.borrow()
    }

    /// A watch receiver mirroring the status callbacks, for callers that
    /// prefer awaiting changes over registering closures.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn add_status_handler(
        &self,
        handler: impl Fn(ConnectionStatus) + Send + Sync + 'static,
    ) -> Subscription<StatusHandler> {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.inner.status_handlers.insert(id, Box::new(handler));
        Subscription { id, handlers: Arc::downgrade(&self.inner.status_handlers) }
    }

    pub fn add_message_handler(
        &self,
        handler: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> Subscription<MessageHandler> {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.inner.message_handlers.insert(id, Box::new(handler));
        Subscription { id, handlers: Arc::downgrade(&self.inner.message_handlers) }
    }

    /// Deliberate teardown: closes the socket with a normal-closure code and
    /// cancels any pending reconnect timer. Neither end schedules a reconnect
    /// after this.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().expect("connection task lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

async fn run(
    inner: Arc<Inner>,
    mut outbound_rx: mpsc::Receiver<ClientEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = inner.policy.backoff();
    let mut attempt: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            inner.set_status(ConnectionStatus::Disconnected);
            return;
        }

        inner.set_status(ConnectionStatus::Connecting);
        let url = format!("{}?token={}", inner.endpoint, inner.token);

        let connected = tokio::select! {
            res = connect_async(&url) => res,
            _ = shutdown_rx.changed() => {
                inner.set_status(ConnectionStatus::Disconnected);
                return;
            }
        };

        match connected {
            Ok((stream, _response)) => {
                attempt = 0;
                backoff = inner.policy.backoff();
                tracing::info!(endpoint = %inner.endpoint, "Connected to relay");
                inner.set_status(ConnectionStatus::Connected);

                let outcome = drive_socket(&inner, stream, &mut outbound_rx, &mut shutdown_rx).await;
                inner.set_status(ConnectionStatus::Disconnected);

                match outcome {
                    SocketOutcome::Clean => {
                        tracing::info!("Connection closed cleanly");
                        return;
                    }
                    SocketOutcome::Shutdown => return,
                    SocketOutcome::Abnormal => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Relay connection failed");
                inner.set_status(ConnectionStatus::Disconnected);
            }
        }

        attempt += 1;
        let Some(delay) = backoff.next() else {
            tracing::warn!("Could not connect to messaging service after multiple attempts");
            return;
        };
        tracing::debug!(attempt, ?delay, "Scheduling reconnect");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => {
                inner.set_status(ConnectionStatus::Disconnected);
                return;
            }
        }
    }
}

async fn drive_socket(
    inner: &Inner,
    stream: WsStream,
    outbound_rx: &mut mpsc::Receiver<ClientEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SocketOutcome {
    let (mut sink, mut stream) = stream.split();

    // Register immediately on open; the server does not acknowledge.
    let register = ClientEvent::Register { user_id: inner.user_id };
    match serde_json::to_string(&register) {
        Ok(json) => {
            if sink.send(Message::text(json)).await.is_err() {
                return SocketOutcome::Abnormal;
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to serialize register event"),
    }

    loop {
        tokio::select! {
            biased;

            res = shutdown_rx.changed() => {
                if res.is_err() || *shutdown_rx.borrow() {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client closing".into(),
                        })))
                        .await;
                    return SocketOutcome::Shutdown;
                }
            }

            event = outbound_rx.recv() => {
                match event {
                    Some(event) => match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sink.send(Message::text(json)).await.is_err() {
                                return SocketOutcome::Abnormal;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Failed to serialize outbound event"),
                    },
                    None => return SocketOutcome::Shutdown,
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => inner.notify_message(&event),
                            // Malformed frames are dropped without touching the
                            // connection.
                            Err(e) => tracing::warn!(error = %e, "Dropping malformed inbound frame"),
                        }
                    }
                    Some(Ok(Message::Close(close))) => {
                        // 1005: the peer closed without a status code.
                        let code = close.as_ref().map_or(1005, |f| u16::from(f.code));
                        if is_clean_close(code) {
                            return SocketOutcome::Clean;
                        }
                        tracing::warn!(code, "Abnormal close");
                        return SocketOutcome::Abnormal;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket error");
                        return SocketOutcome::Abnormal;
                    }
                    None => return SocketOutcome::Abnormal,
                }
            }
        }
    }
}
