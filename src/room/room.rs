use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::protocol::messages::{PlayerPublic, RoomStatePayload};
use crate::protocol::{
    GameSettings, Player, PlayerId, PlayerStatus, Role, RoomCode, RoomState, MAX_PLAYERS,
};

/// SHA-256 hex of a room password. Room passwords gate casual entry, not
/// accounts, so a memory-hard KDF is a deliberate non-goal.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// A named lobby: the unit of isolation for membership and fan-out.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub password_hash: Option<String>,
    pub state: RoomState,
    pub settings: GameSettings,
    pub players: HashMap<PlayerId, Player>,
    /// Join order minus departures; a permutation of `players` keys.
    pub player_order: Vec<PlayerId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Room {
    pub fn new(code: RoomCode, password: Option<&str>) -> Self {
        Self {
            code,
            password_hash: password.map(hash_password),
            state: RoomState::Waiting,
            settings: GameSettings::default(),
            players: HashMap::new(),
            player_order: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn verify_password(&self, password: Option<&str>) -> bool {
        match &self.password_hash {
            None => true,
            Some(hash) => password.is_some_and(|p| &hash_password(p) == hash),
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.player_order
            .iter()
            .find(|id| self.players.get(*id).is_some_and(|p| p.is_host))
            .cloned()
    }

    pub fn nickname_taken(&self, nickname: &str) -> bool {
        self.players
            .values()
            .any(|p| p.nickname.eq_ignore_ascii_case(nickname))
    }

    /// Add a player; the first joiner becomes host.
    pub fn add_player(&mut self, id: PlayerId, nickname: String) -> &Player {
        let is_host = self.players.is_empty();
        self.players
            .insert(id.clone(), Player::new(id.clone(), nickname, is_host));
        self.player_order.push(id.clone());
        // Insert above guarantees presence.
        #[allow(clippy::indexing_slicing)]
        &self.players[&id]
    }

    /// Remove a player. If the host departs and others remain, the first
    /// remaining player in join order is promoted and returned.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<(Player, Option<PlayerId>)> {
        let removed = self.players.remove(id)?;
        self.player_order.retain(|other| other != id);

        let new_host = if removed.is_host {
            let next = self.player_order.first().cloned();
            if let Some(next_id) = &next {
                if let Some(player) = self.players.get_mut(next_id) {
                    player.is_host = true;
                }
            }
            next
        } else {
            None
        };

        Some((removed, new_host))
    }

    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.is_ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.is_ready)
    }

    pub fn set_status(&mut self, id: &PlayerId, status: PlayerStatus) {
        if let Some(player) = self.players.get_mut(id) {
            player.status = status;
        }
    }

    pub fn set_role(&mut self, id: &PlayerId, role: Role) {
        if let Some(player) = self.players.get_mut(id) {
            player.role = Some(role);
        }
    }

    pub fn set_connected(&mut self, id: &PlayerId, connected: bool) {
        if let Some(player) = self.players.get_mut(id) {
            player.is_connected = connected;
        }
    }

    /// Public snapshot in join order.
    pub fn public_players(&self) -> Vec<PlayerPublic> {
        self.player_order
            .iter()
            .filter_map(|id| self.players.get(id))
            .map(|p| PlayerPublic {
                id: p.id.clone(),
                nickname: p.nickname.clone(),
                is_host: p.is_host,
                is_ready: p.is_ready,
                is_connected: p.is_connected,
                status: p.status,
            })
            .collect()
    }

    pub fn state_payload(&self) -> RoomStatePayload {
        RoomStatePayload {
            code: self.code.clone(),
            state: self.state,
            players: self.public_players(),
            host_id: self.host_id(),
            settings: self.settings.clone(),
        }
    }
}
