use crate::config::WsConfig;
use crate::domain::{ClientEvent, DirectMessage, ServerEvent};
use crate::services::relay::RelayService;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One relay socket. Owns the per-socket room subscriptions and pumps room
/// broadcasts out through a single bounded outbound channel.
pub struct Session {
    pub user_id: i64,
    pub request_id: String,
    pub socket: WebSocket,
    pub relay: RelayService,
    pub config: WsConfig,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    #[tracing::instrument(
        name = "relay_session",
        skip(self),
        fields(
            user_id = %self.user_id,
            request_id = %self.request_id,
            session_id = %Uuid::new_v4()
        )
    )]
    pub(crate) async fn run(self) {
        let Self { user_id, socket, relay, config, mut shutdown_rx, .. } = self;

        tracing::info!("WebSocket connected");

        let (mut ws_sink, mut ws_stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel(config.outbound_buffer_size);
        let mut rooms = RoomSubscriptions::new(relay.clone(), outbound_tx);

        loop {
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing WebSocket");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => {
                            match serde_json::from_str::<ClientEvent>(&text) {
                                Ok(event) => handle_event(event, user_id, &relay, &mut rooms),
                                // Malformed frames are dropped; the connection stays up.
                                Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket error");
                            break;
                        }
                        _ => {}
                    }
                }

                res = outbound_rx.recv() => {
                    match res {
                        Some(event) => {
                            let Ok(json) = serde_json::to_string(&event) else { continue };
                            if ws_sink.send(WsMessage::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let _ = ws_sink.close().await;
        rooms.abort_all();
        tracing::info!("WebSocket disconnected");
    }
}

fn handle_event(event: ClientEvent, user_id: i64, relay: &RelayService, rooms: &mut RoomSubscriptions) {
    match event {
        ClientEvent::Register { user_id: claimed } => {
            if claimed != user_id {
                tracing::warn!(claimed, "Register user id does not match token; using authenticated id");
            }
            rooms.join(&RelayService::user_room(user_id));
        }
        ClientEvent::JoinRoom { room } => rooms.join(&room),
        ClientEvent::SendMessage { room, content } => {
            // The sender receives its own broadcast, so make sure it is joined.
            rooms.join(&room);
            let event = ServerEvent::RoomMessage {
                room: room.clone(),
                sender_id: user_id,
                content,
                timestamp: OffsetDateTime::now_utc(),
            };
            relay.publish(&room, event);
        }
        ClientEvent::DirectMessage { receiver_id, content } => {
            if receiver_id == user_id {
                tracing::warn!("Dropping self-addressed direct message");
                return;
            }
            let message = DirectMessage::ephemeral(user_id, receiver_id, content);
            relay.publish(
                &RelayService::user_room(receiver_id),
                ServerEvent::NewMessage { message: message.clone() },
            );
            relay.publish(&RelayService::user_room(user_id), ServerEvent::NewMessage { message });
        }
    }
}

/// The set of rooms one socket is subscribed to. Each joined room gets a
/// forwarder task that copies broadcasts into the session's outbound channel;
/// dropping the receivers is what removes the socket from its rooms.
struct RoomSubscriptions {
    relay: RelayService,
    outbound_tx: mpsc::Sender<ServerEvent>,
    joined: HashSet<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSubscriptions {
    fn new(relay: RelayService, outbound_tx: mpsc::Sender<ServerEvent>) -> Self {
        Self { relay, outbound_tx, joined: HashSet::new(), tasks: Vec::new() }
    }

    fn join(&mut self, room: &str) {
        if !self.joined.insert(room.to_string()) {
            return;
        }
        tracing::debug!(room = %room, "Joined room");

        let mut rx = self.relay.subscribe(room);
        let tx = self.outbound_tx.clone();
        let room_name = room.to_string();
        self.tasks.push(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(room = %room_name, missed, "Room subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    fn abort_all(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
