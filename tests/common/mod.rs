// Shared between the integration test crates; not every crate uses every
// helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use mafia_server::config::AppConfig;
use mafia_server::hub::{ClientHandle, OUTBOUND_QUEUE_CAPACITY};
use mafia_server::protocol::{PlayerId, Role, ServerMessage, Team};
use mafia_server::server::GameServer;
use mafia_server::voice::NullSfu;

/// An injected connection: the server sees a registered client whose
/// outbound queue we can read directly.
pub struct TestClient {
    pub id: PlayerId,
    rx: mpsc::Receiver<Arc<ServerMessage>>,
}

pub fn test_server() -> Arc<GameServer> {
    GameServer::new(Arc::new(AppConfig::default()), Arc::new(NullSfu::new()))
}

pub async fn connect(server: &Arc<GameServer>, id: &str) -> TestClient {
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    server
        .hub
        .register(ClientHandle::new(id.to_string(), tx))
        .await;
    TestClient {
        id: id.to_string(),
        rx,
    }
}

/// Connect `n` clients named p1..pn.
pub async fn connect_many(server: &Arc<GameServer>, n: usize) -> Vec<TestClient> {
    let mut clients = Vec::with_capacity(n);
    for i in 1..=n {
        clients.push(connect(server, &format!("p{i}")).await);
    }
    clients
}

pub fn frame(msg_type: &str, payload: serde_json::Value) -> String {
    serde_json::json!({ "type": msg_type, "payload": payload }).to_string()
}

impl TestClient {
    /// Send one frame as this client.
    pub async fn send(&mut self, server: &Arc<GameServer>, msg_type: &str, payload: serde_json::Value) {
        if let Some(new_id) = server.handle_frame(&self.id, &frame(msg_type, payload)).await {
            self.id = new_id;
        }
    }

    /// Next outbound message, bounded by a timeout.
    pub async fn recv(&mut self) -> Arc<ServerMessage> {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a server message")
            .expect("connection closed")
    }

    /// Skip messages until the predicate matches, returning the match.
    pub async fn recv_until<F>(&mut self, mut pred: F) -> Arc<ServerMessage>
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        for _ in 0..200 {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
        panic!("predicate never matched within 200 messages");
    }

    /// True when nothing is queued right now.
    pub fn is_idle(&mut self) -> bool {
        matches!(self.rx.try_recv(), Err(mpsc::error::TryRecvError::Empty))
    }

    /// Everything queued right now, without waiting.
    pub fn drain_now(&mut self) -> Vec<Arc<ServerMessage>> {
        let mut drained = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            drained.push(msg);
        }
        drained
    }
}

/// Create a room with `host` and join the rest; returns the room code.
pub async fn setup_room(
    server: &Arc<GameServer>,
    host: &mut TestClient,
    others: &mut [&mut TestClient],
) -> String {
    host.send(server, "create_room", serde_json::json!({ "nickname": format!("nick_{}", host.id) }))
        .await;
    let created = host
        .recv_until(|msg| matches!(msg, ServerMessage::RoomCreated { .. }))
        .await;
    let code = match &*created {
        ServerMessage::RoomCreated { code } => code.clone(),
        _ => unreachable!(),
    };

    for client in others.iter_mut() {
        client
            .send(
                server,
                "join_room",
                serde_json::json!({ "code": code, "nickname": format!("nick_{}", client.id) }),
            )
            .await;
        client
            .recv_until(|msg| matches!(msg, ServerMessage::RoomJoined(_)))
            .await;
    }
    code
}

/// Mark every client ready.
pub async fn ready_all(server: &Arc<GameServer>, clients: &mut [&mut TestClient]) {
    for client in clients.iter_mut() {
        client
            .send(server, "ready", serde_json::json!({ "is_ready": true }))
            .await;
    }
}

/// Read each client's `role_assigned` and return (role, team) per client id.
pub async fn learn_roles(
    clients: &mut [&mut TestClient],
) -> std::collections::HashMap<PlayerId, (Role, Team)> {
    let mut roles = std::collections::HashMap::new();
    for client in clients.iter_mut() {
        let assigned = client
            .recv_until(|msg| matches!(msg, ServerMessage::RoleAssigned(_)))
            .await;
        if let ServerMessage::RoleAssigned(payload) = &*assigned {
            roles.insert(client.id.clone(), (payload.role, payload.team));
        }
    }
    roles
}

/// First client id holding the given role.
pub fn find_role(
    roles: &std::collections::HashMap<PlayerId, (Role, Team)>,
    role: Role,
) -> Option<PlayerId> {
    roles
        .iter()
        .find(|(_, (r, _))| *r == role)
        .map(|(id, _)| id.clone())
}
