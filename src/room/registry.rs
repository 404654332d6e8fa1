use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::protocol::{
    ids, ErrorCode, GameSettings, PlayerId, PlayerStatus, Role, RoomCode, RoomState,
};

use super::room::Room;

/// How long an empty room lingers before deletion.
pub const EMPTY_ROOM_TTL: Duration = Duration::from_secs(5 * 60);

/// How long a disconnected player of a running game may reconnect.
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,
    #[error("wrong password")]
    WrongPassword,
    #[error("room is full")]
    RoomFull,
    #[error("nickname already in use")]
    NicknameInUse,
    #[error("game already started")]
    GameAlreadyStarted,
    #[error("player is not in the room")]
    NotInRoom,
    #[error("player is not the host")]
    NotHost,
    #[error("reconnect window expired")]
    ReconnectExpired,
}

impl RoomError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::WrongPassword => ErrorCode::WrongPassword,
            Self::RoomFull => ErrorCode::RoomFull,
            Self::NicknameInUse => ErrorCode::NicknameInUse,
            Self::GameAlreadyStarted => ErrorCode::GameStarted,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotHost => ErrorCode::NotHost,
            Self::ReconnectExpired => ErrorCode::ReconnectFailed,
        }
    }
}

/// Bookkeeping for a player who dropped out of a running game.
#[derive(Debug, Clone)]
pub struct DisconnectedPlayer {
    pub player_id: PlayerId,
    pub room_code: RoomCode,
    pub expires_at: DateTime<Utc>,
    /// Cancelled on reconnect or room deletion; observed by the expiry task.
    pub cancel: CancellationToken,
}

impl DisconnectedPlayer {
    /// Strict less-than: reconnecting at exactly the deadline is timed out.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Thread-safe registry of rooms keyed by code, with disconnect and
/// empty-room-TTL bookkeeping. Expiry timer tasks are armed by the server;
/// the registry owns the cancellation handles so reconnect and deletion can
/// stop them, and expiry double-fires are guarded by map lookups.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, Room>>,
    disconnected: DashMap<PlayerId, DisconnectedPlayer>,
    empty_ttls: DashMap<RoomCode, CancellationToken>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            disconnected: DashMap::new(),
            empty_ttls: DashMap::new(),
        }
    }

    fn write_rooms(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<RoomCode, Room>> {
        // Lock poisoning only follows a panic in a critical section, which
        // the crate-level panic policy forbids.
        match self.rooms.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_rooms(&self) -> std::sync::RwLockReadGuard<'_, HashMap<RoomCode, Room>> {
        match self.rooms.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create a room with a fresh unique code.
    pub fn create_room(&self, password: Option<&str>) -> Room {
        let mut rooms = self.write_rooms();
        let code = loop {
            let candidate = ids::generate_room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Room::new(code.clone(), password);
        rooms.insert(code.clone(), room.clone());
        info!(room_code = %code, locked = password.is_some(), "Room created");
        room
    }

    pub fn join_room(
        &self,
        code: &str,
        password: Option<&str>,
        player_id: &PlayerId,
        nickname: &str,
    ) -> Result<Room, RoomError> {
        let mut rooms = self.write_rooms();
        let room = rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;

        if room.state != RoomState::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        if !room.verify_password(password) {
            return Err(RoomError::WrongPassword);
        }
        if room.is_full() {
            return Err(RoomError::RoomFull);
        }
        if room.nickname_taken(nickname) {
            return Err(RoomError::NicknameInUse);
        }

        room.add_player(player_id.clone(), nickname.to_string());
        let snapshot = room.clone();
        drop(rooms);

        // A joiner rescues a room pending empty-room deletion.
        self.cancel_empty_ttl(code);

        info!(room_code = %code, %player_id, "Player joined room");
        Ok(snapshot)
    }

    /// Remove a player. Returns the removed player, the promoted host if
    /// any, and whether the room is now empty (the caller arms the TTL).
    pub fn leave_room(
        &self,
        code: &str,
        player_id: &PlayerId,
    ) -> Result<(crate::protocol::Player, Option<PlayerId>, bool), RoomError> {
        let mut rooms = self.write_rooms();
        let room = rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;
        let (player, new_host) = room
            .remove_player(player_id)
            .ok_or(RoomError::NotInRoom)?;
        let now_empty = room.players.is_empty();
        drop(rooms);

        // A departing player cannot be awaiting reconnection.
        self.remove_disconnected(player_id);

        info!(room_code = %code, %player_id, now_empty, "Player left room");
        Ok((player, new_host, now_empty))
    }

    pub fn set_ready(&self, code: &str, player_id: &PlayerId, ready: bool) -> Result<(), RoomError> {
        let mut rooms = self.write_rooms();
        let room = rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;
        if room.set_ready(player_id, ready) {
            Ok(())
        } else {
            Err(RoomError::NotInRoom)
        }
    }

    /// Host-only. Counts are validated at `start_game`, not here.
    pub fn update_settings(
        &self,
        code: &str,
        player_id: &PlayerId,
        settings: GameSettings,
    ) -> Result<GameSettings, RoomError> {
        let mut rooms = self.write_rooms();
        let room = rooms.get_mut(code).ok_or(RoomError::RoomNotFound)?;
        if room.host_id().as_ref() != Some(player_id) {
            return Err(RoomError::NotHost);
        }
        room.settings = settings.clone();
        Ok(settings)
    }

    pub fn set_room_state(&self, code: &str, state: RoomState) {
        let mut rooms = self.write_rooms();
        if let Some(room) = rooms.get_mut(code) {
            room.state = state;
        }
    }

    pub fn set_player_status(&self, code: &str, player_id: &PlayerId, status: PlayerStatus) {
        let mut rooms = self.write_rooms();
        if let Some(room) = rooms.get_mut(code) {
            room.set_status(player_id, status);
        }
    }

    pub fn set_player_role(&self, code: &str, player_id: &PlayerId, role: Role) {
        let mut rooms = self.write_rooms();
        if let Some(room) = rooms.get_mut(code) {
            room.set_role(player_id, role);
        }
    }

    pub fn get_room(&self, code: &str) -> Option<Room> {
        self.read_rooms().get(code).cloned()
    }

    pub fn room_exists(&self, code: &str) -> bool {
        self.read_rooms().contains_key(code)
    }

    /// Delete a room, cancelling its TTL and any reconnect windows
    /// belonging to its players.
    pub fn delete_room(&self, code: &str) -> Option<Room> {
        self.cancel_empty_ttl(code);

        let stale: Vec<PlayerId> = self
            .disconnected
            .iter()
            .filter(|entry| entry.room_code == code)
            .map(|entry| entry.player_id.clone())
            .collect();
        for player_id in stale {
            self.remove_disconnected(&player_id);
        }

        let removed = self.write_rooms().remove(code);
        if removed.is_some() {
            info!(room_code = %code, "Room deleted");
        }
        removed
    }

    // -- disconnect / reconnect bookkeeping --------------------------------

    /// Mark a player disconnected. Only effective while the room is
    /// `playing`; returns the reconnect record for the caller to arm the
    /// expiry task.
    pub fn mark_disconnected(
        &self,
        code: &str,
        player_id: &PlayerId,
    ) -> Option<DisconnectedPlayer> {
        let mut rooms = self.write_rooms();
        let room = rooms.get_mut(code)?;
        if room.state != RoomState::Playing || !room.players.contains_key(player_id) {
            return None;
        }
        room.set_connected(player_id, false);
        drop(rooms);

        let entry = DisconnectedPlayer {
            player_id: player_id.clone(),
            room_code: code.to_string(),
            expires_at: Utc::now()
                + chrono::Duration::from_std(RECONNECT_WINDOW).unwrap_or_default(),
            cancel: CancellationToken::new(),
        };
        self.disconnected.insert(player_id.clone(), entry.clone());
        debug!(%player_id, room_code = %code, "Reconnect window armed");
        Some(entry)
    }

    /// Look up an unexpired reconnect record.
    pub fn can_reconnect(&self, player_id: &PlayerId) -> Option<DisconnectedPlayer> {
        self.disconnected
            .get(player_id)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value().clone())
    }

    /// Complete a reconnection: cancel the window, restore `is_connected`,
    /// and return the room snapshot.
    pub fn reconnect(&self, player_id: &PlayerId) -> Result<Room, RoomError> {
        let entry = self
            .can_reconnect(player_id)
            .ok_or(RoomError::ReconnectExpired)?;
        self.remove_disconnected(player_id);

        let mut rooms = self.write_rooms();
        let room = rooms
            .get_mut(&entry.room_code)
            .ok_or(RoomError::RoomNotFound)?;
        room.set_connected(player_id, true);
        Ok(room.clone())
    }

    /// Expiry-task entry point. Removes the record if it is still present
    /// (the map lookup guards double-fires) and returns its room code.
    pub fn expire_disconnected(&self, player_id: &PlayerId) -> Option<RoomCode> {
        let (_, entry) = self.disconnected.remove(player_id)?;
        entry.cancel.cancel();
        debug!(%player_id, room_code = %entry.room_code, "Reconnect window expired");
        Some(entry.room_code)
    }

    fn remove_disconnected(&self, player_id: &PlayerId) {
        if let Some((_, entry)) = self.disconnected.remove(player_id) {
            entry.cancel.cancel();
        }
    }

    // -- empty-room TTL ----------------------------------------------------

    /// Arm (or re-arm) the empty-room TTL and return the token the deletion
    /// task must observe.
    pub fn arm_empty_ttl(&self, code: &str) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.empty_ttls.insert(code.to_string(), token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn cancel_empty_ttl(&self, code: &str) {
        if let Some((_, token)) = self.empty_ttls.remove(code) {
            token.cancel();
        }
    }

    /// TTL-task entry point: delete the room only if it is still empty.
    pub fn expire_if_empty(&self, code: &str) -> bool {
        self.empty_ttls.remove(code);
        let mut rooms = self.write_rooms();
        let still_empty = rooms
            .get(code)
            .is_some_and(|room| room.players.is_empty());
        if still_empty {
            rooms.remove(code);
            info!(room_code = %code, "Empty room expired");
        }
        still_empty
    }

    /// Teardown: cancel every pending timer token.
    pub fn cancel_all_timers(&self) {
        for entry in self.empty_ttls.iter() {
            entry.value().cancel();
        }
        self.empty_ttls.clear();
        for entry in self.disconnected.iter() {
            entry.value().cancel.cancel();
        }
        self.disconnected.clear();
    }
}
