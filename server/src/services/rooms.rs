//! Room membership and event fan-out.
//!
//! DESIGN
//! ======
//! A room is a thread id. Each connected websocket registers an outbound
//! sender per room it joined. `notify_room` encodes the event once, copies
//! the room's senders out under the read lock, and sends without holding it.
//! Delivery is best-effort: a client whose queue is full misses the event,
//! and a client whose queue is closed is evicted from the room.

use std::collections::HashMap;
use std::sync::Arc;

use frames::{InboundEvent, RoomId};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

/// Outbound queue for one websocket: encoded JSON text frames.
pub type ClientTx = mpsc::Sender<String>;

#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<RoomId, HashMap<Uuid, ClientTx>>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `client_id` to `room_id`. Joining twice replaces the sender.
    pub async fn join(&self, room_id: RoomId, client_id: Uuid, tx: ClientTx) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id).or_default();
        room.insert(client_id, tx);
        info!(room_id, %client_id, members = room.len(), "client joined room");
    }

    /// Remove `client_id` from `room_id`. Returns whether it was a member.
    pub async fn leave(&self, room_id: RoomId, client_id: Uuid) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(&room_id) else {
            return false;
        };
        let removed = room.remove(&client_id).is_some();
        if room.is_empty() {
            rooms.remove(&room_id);
        }
        if removed {
            info!(room_id, %client_id, "client left room");
        }
        removed
    }

    /// Remove `client_id` from every room. Returns how many rooms it left.
    pub async fn leave_all(&self, client_id: Uuid) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut left = 0;
        rooms.retain(|_, room| {
            if room.remove(&client_id).is_some() {
                left += 1;
            }
            !room.is_empty()
        });
        left
    }

    /// Send `event` to every member of `room_id`. Returns how many accepted it.
    pub async fn notify_room(&self, room_id: RoomId, event: &InboundEvent) -> usize {
        let members: Vec<(Uuid, ClientTx)> = {
            let rooms = self.rooms.read().await;
            let Some(room) = rooms.get(&room_id) else {
                return 0;
            };
            room.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let text = frames::encode(event);
        let mut delivered = 0;
        let mut closed = Vec::new();
        for (client_id, tx) in members {
            match tx.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(room_id, %client_id, "client queue full; event skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(client_id),
            }
        }

        for client_id in closed {
            self.leave(room_id, client_id).await;
        }

        debug!(room_id, kind = event.kind(), delivered, "room notified");
        delivered
    }

    pub async fn member_count(&self, room_id: RoomId) -> usize {
        self.rooms.read().await.get(&room_id).map_or(0, HashMap::len)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
