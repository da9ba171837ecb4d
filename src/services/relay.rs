use crate::config::WsConfig;
use crate::domain::ServerEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Multiplexes sessions into logical rooms and fans out events. Holds no
/// durable state; a room exists only while someone is subscribed to it, and a
/// periodic GC reclaims rooms whose subscribers are all gone.
#[derive(Clone, Debug)]
pub struct RelayService {
    rooms: Arc<DashMap<String, broadcast::Sender<ServerEvent>>>,
    channel_capacity: usize,
}

impl RelayService {
    #[must_use]
    pub fn new(config: &WsConfig) -> Self {
        Self { rooms: Arc::new(DashMap::new()), channel_capacity: config.room_channel_capacity }
    }

    /// The personal room every registered socket of a user joins.
    #[must_use]
    pub fn user_room(user_id: i64) -> String {
        format!("user:{user_id}")
    }

    /// Subscribes to a room, creating it on first join.
    #[must_use]
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .value()
            .subscribe()
    }

    /// Broadcasts to every current subscriber of a room, including the sender's
    /// own session if it is subscribed. Returns the number of sockets reached.
    pub fn publish(&self, room: &str, event: ServerEvent) -> usize {
        match self.rooms.get(room) {
            Some(tx) => {
                let reached = tx.send(event).unwrap_or(0);
                tracing::debug!(room = %room, reached, "Broadcast event");
                reached
            }
            None => {
                tracing::debug!(room = %room, "Broadcast to empty room dropped");
                0
            }
        }
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Spawns the empty-room reclaim loop, stopped by the shutdown channel.
    pub fn spawn_gc(&self, interval_secs: u64, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let rooms = Arc::clone(&self.rooms);
        tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let before = rooms.len();
                            rooms.retain(|_, tx| tx.receiver_count() > 0);
                            let reclaimed = before - rooms.len();
                            if reclaimed > 0 {
                                tracing::debug!(reclaimed, "Reclaimed empty rooms");
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }
            .instrument(tracing::info_span!("room_gc")),
        )
    }
}
