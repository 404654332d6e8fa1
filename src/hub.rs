use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;
use crate::protocol::{ErrorCode, PlayerId, RoomCode, ServerMessage};

/// Outbound queue capacity per connection. A full queue closes the peer.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Per-connection handle owned by the hub and shared with the peer's
/// read/write tasks.
#[derive(Debug)]
pub struct ClientHandle {
    pub player_id: PlayerId,
    sender: mpsc::Sender<Arc<ServerMessage>>,
    /// Room the connection currently belongs to; assigned by the hub.
    room_code: RwLock<Option<RoomCode>>,
    /// Cancelled when the hub force-closes this connection.
    closed: CancellationToken,
}

impl ClientHandle {
    pub fn new(player_id: PlayerId, sender: mpsc::Sender<Arc<ServerMessage>>) -> Arc<Self> {
        Arc::new(Self {
            player_id,
            sender,
            room_code: RwLock::new(None),
            closed: CancellationToken::new(),
        })
    }

    /// Non-blocking enqueue. Returns false when the queue is full or the
    /// peer is gone; the caller applies the slow-consumer policy.
    pub fn send(&self, message: Arc<ServerMessage>) -> bool {
        self.sender.try_send(message).is_ok()
    }

    pub fn send_error(&self, code: ErrorCode, message: impl Into<String>) -> bool {
        self.send(Arc::new(ServerMessage::Error {
            code,
            message: message.into(),
        }))
    }

    pub fn room_code(&self) -> Option<RoomCode> {
        self.room_code.read().map(|code| code.clone()).ok().flatten()
    }

    fn set_room_code(&self, code: Option<RoomCode>) {
        if let Ok(mut slot) = self.room_code.write() {
            *slot = code;
        }
    }

    /// Token observed by the connection's write task.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }
}

enum HubCommand {
    Register {
        handle: Arc<ClientHandle>,
        /// Fired once the handle is in the global set; the connection only
        /// starts its read loop after this lands.
        ack: oneshot::Sender<()>,
    },
    Unregister(PlayerId),
    Broadcast {
        code: RoomCode,
        message: Arc<ServerMessage>,
        exclude: Option<PlayerId>,
    },
    SendToSubset {
        code: RoomCode,
        ids: Vec<PlayerId>,
        message: Arc<ServerMessage>,
    },
}

/// Process-wide registry of connections and room membership sets.
///
/// Membership mutations take a short-scoped exclusive lock on the rooms
/// map; room broadcasts are serialized through a single consumer task so
/// that a broadcast dequeued at time T reaches every member's queue before
/// the next broadcast is dequeued.
pub struct Hub {
    clients: DashMap<PlayerId, Arc<ClientHandle>>,
    rooms: RwLock<HashMap<RoomCode, HashSet<PlayerId>>>,
    commands: mpsc::UnboundedSender<HubCommand>,
    metrics: Arc<ServerMetrics>,
}

impl Hub {
    pub fn new(metrics: Arc<ServerMetrics>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Arc::new(Self {
            clients: DashMap::new(),
            rooms: RwLock::new(HashMap::new()),
            commands: tx,
            metrics,
        });

        let loop_hub = Arc::clone(&hub);
        tokio::spawn(async move {
            loop_hub.run(rx).await;
        });

        hub
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                HubCommand::Register { handle, ack } => {
                    self.metrics.increment_connections();
                    self.clients.insert(handle.player_id.clone(), handle);
                    let _ = ack.send(());
                }
                HubCommand::Unregister(player_id) => {
                    self.unregister(&player_id);
                }
                HubCommand::Broadcast {
                    code,
                    message,
                    exclude,
                } => self.deliver_broadcast(&code, &message, exclude.as_ref()),
                HubCommand::SendToSubset {
                    code,
                    ids,
                    message,
                } => self.deliver_to_subset(&code, &ids, &message),
            }
        }
    }

    fn deliver_broadcast(
        &self,
        code: &str,
        message: &Arc<ServerMessage>,
        exclude: Option<&PlayerId>,
    ) {
        let members = self.room_members(code);
        self.metrics.increment_broadcasts();

        for member in members {
            if exclude == Some(&member) {
                continue;
            }
            let Some(handle) = self.get(&member) else {
                continue;
            };
            if !handle.send(Arc::clone(message)) {
                // Slow-consumer policy: close the lagging peer, leave the
                // rest of the room untouched.
                warn!(player_id = %member, room_code = %code, "Outbound queue full, dropping peer");
                self.metrics.increment_frames_dropped();
                let _ = self.commands.send(HubCommand::Unregister(member));
            }
        }
    }

    /// Add a connection to the global set, serialized through the consumer
    /// task. Resolves once the handle is visible to lookups and broadcasts.
    pub async fn register(&self, handle: Arc<ClientHandle>) {
        let (ack, registered) = oneshot::channel();
        let _ = self.commands.send(HubCommand::Register { handle, ack });
        // Recv only fails when the hub loop is already torn down
        let _ = registered.await;
    }

    /// Remove a connection from the global set and any room it belonged
    /// to, and close its outbound queue. Idempotent; the consumer task
    /// dispatches slow-consumer evictions here, and teardown paths call it
    /// directly.
    pub fn unregister(&self, player_id: &PlayerId) -> Option<Arc<ClientHandle>> {
        let removed = self.clients.remove(player_id).map(|(_, handle)| handle);
        if let Some(handle) = &removed {
            self.metrics.decrement_connections();
            if let Some(code) = handle.room_code() {
                self.remove_membership(player_id, &code);
                handle.set_room_code(None);
            }
            handle.closed.cancel();
            debug!(%player_id, "Connection unregistered");
        }
        removed
    }

    /// Assign the connection to a room's membership set.
    pub fn join_room(&self, player_id: &PlayerId, code: &str) {
        if let Ok(mut rooms) = self.rooms.write() {
            rooms
                .entry(code.to_string())
                .or_default()
                .insert(player_id.clone());
        }
        if let Some(handle) = self.get(player_id) {
            handle.set_room_code(Some(code.to_string()));
        }
    }

    /// Remove the connection from its room's membership set, if any.
    pub fn leave_room(&self, player_id: &PlayerId) -> Option<RoomCode> {
        let code = self.get(player_id).and_then(|handle| {
            let code = handle.room_code();
            handle.set_room_code(None);
            code
        })?;

        self.remove_membership(player_id, &code);
        Some(code)
    }

    fn remove_membership(&self, player_id: &PlayerId, code: &str) {
        if let Ok(mut rooms) = self.rooms.write() {
            if let Some(members) = rooms.get_mut(code) {
                members.remove(player_id);
                if members.is_empty() {
                    rooms.remove(code);
                }
            }
        }
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<Arc<ClientHandle>> {
        self.clients
            .get(player_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn room_size(&self, code: &str) -> usize {
        self.rooms
            .read()
            .ok()
            .and_then(|rooms| rooms.get(code).map(HashSet::len))
            .unwrap_or(0)
    }

    fn room_members(&self, code: &str) -> Vec<PlayerId> {
        self.rooms
            .read()
            .ok()
            .and_then(|rooms| rooms.get(code).map(|members| members.iter().cloned().collect()))
            .unwrap_or_default()
    }

    /// Queue a room broadcast for serialized delivery.
    pub fn broadcast_to_room(
        &self,
        code: &str,
        message: ServerMessage,
        exclude: Option<&PlayerId>,
    ) {
        let _ = self.commands.send(HubCommand::Broadcast {
            code: code.to_string(),
            message: Arc::new(message),
            exclude: exclude.cloned(),
        });
    }

    /// Fan-out to a subset of a room's members, serialized behind any
    /// earlier room broadcasts so per-peer ordering holds.
    pub fn broadcast_to_players(&self, code: &str, ids: &[PlayerId], message: ServerMessage) {
        let _ = self.commands.send(HubCommand::SendToSubset {
            code: code.to_string(),
            ids: ids.to_vec(),
            message: Arc::new(message),
        });
    }

    fn deliver_to_subset(&self, code: &str, ids: &[PlayerId], message: &Arc<ServerMessage>) {
        let members: HashSet<PlayerId> = self.room_members(code).into_iter().collect();
        for id in ids {
            if !members.contains(id) {
                continue;
            }
            if let Some(handle) = self.get(id) {
                if !handle.send(Arc::clone(message)) {
                    self.metrics.increment_frames_dropped();
                    let _ = self.commands.send(HubCommand::Unregister(id.clone()));
                }
            }
        }
    }

    /// Direct send to one peer; overflow closes that peer like any other
    /// slow consumer.
    pub fn send_to_player(&self, player_id: &PlayerId, message: ServerMessage) -> bool {
        let Some(handle) = self.get(player_id) else {
            return false;
        };
        let sent = handle.send(Arc::new(message));
        if !sent {
            self.metrics.increment_frames_dropped();
            let _ = self.commands.send(HubCommand::Unregister(player_id.clone()));
        }
        sent
    }

    /// Move a live connection onto a previous player identity. Used by
    /// reconnection: the fresh socket adopts the disconnected player's id.
    /// The sender and close token carry over so the existing write task
    /// keeps draining the same queue.
    pub fn reassign(
        &self,
        current_id: &PlayerId,
        original_id: &PlayerId,
    ) -> Option<Arc<ClientHandle>> {
        let (_, old) = self.clients.remove(current_id)?;
        let adopted = Arc::new(ClientHandle {
            player_id: original_id.clone(),
            sender: old.sender.clone(),
            room_code: RwLock::new(old.room_code()),
            closed: old.closed.clone(),
        });
        self.clients
            .insert(original_id.clone(), Arc::clone(&adopted));
        Some(adopted)
    }

    /// Close every connection. Used at teardown.
    pub fn close_all(&self) {
        let ids: Vec<PlayerId> = self.clients.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.unregister(&id);
        }
    }
}
