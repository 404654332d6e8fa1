use tracing::info;

use crate::protocol::messages::{CreateRoomPayload, JoinRoomPayload, ReadyPayload, ReconnectPayload, UpdateSettingsPayload};
use crate::protocol::{validation, ErrorCode, PlayerId, ServerMessage};

use super::GameServer;

impl GameServer {
    pub(crate) async fn handle_create_room(
        &self,
        player_id: &PlayerId,
        payload: CreateRoomPayload,
    ) {
        if let Err(code) = validation::validate_nickname(&payload.nickname) {
            self.send_error(player_id, code, "nickname rejected");
            return;
        }
        if self.hub.get(player_id).and_then(|h| h.room_code()).is_some() {
            self.send_error(player_id, ErrorCode::CreateFailed, "already in a room");
            return;
        }

        let room = self.registry.create_room(payload.password.as_deref());
        let joined = self.registry.join_room(
            &room.code,
            payload.password.as_deref(),
            player_id,
            &payload.nickname,
        );
        let room = match joined {
            Ok(room) => room,
            Err(err) => {
                // Freshly created rooms only fail to join on pathological races
                self.registry.delete_room(&room.code);
                self.send_error(player_id, ErrorCode::CreateFailed, err.to_string());
                return;
            }
        };

        self.metrics.increment_rooms_created();
        self.hub.join_room(player_id, &room.code);
        self.hub.send_to_player(
            player_id,
            ServerMessage::RoomCreated {
                code: room.code.clone(),
            },
        );
        self.hub.send_to_player(
            player_id,
            ServerMessage::RoomState(Box::new(room.state_payload())),
        );
        self.refresh_lobby_routing(&room.code).await;
    }

    pub(crate) async fn handle_join_room(
        &self,
        player_id: &PlayerId,
        payload: JoinRoomPayload,
    ) {
        if let Err(code) = validation::validate_nickname(&payload.nickname) {
            self.send_error(player_id, code, "nickname rejected");
            return;
        }
        let code = payload.code.to_uppercase();
        if let Err(err_code) = validation::validate_room_code(&code) {
            self.send_error(player_id, err_code, "room code rejected");
            return;
        }
        if self.hub.get(player_id).and_then(|h| h.room_code()).is_some() {
            self.send_error(player_id, ErrorCode::JoinFailed, "already in a room");
            return;
        }

        let room = match self.registry.join_room(
            &code,
            payload.password.as_deref(),
            player_id,
            &payload.nickname,
        ) {
            Ok(room) => room,
            Err(err) => {
                self.send_error(player_id, err.code(), err.to_string());
                return;
            }
        };

        self.hub.join_room(player_id, &code);
        self.hub.send_to_player(
            player_id,
            ServerMessage::RoomJoined(Box::new(room.state_payload())),
        );

        let joined = room
            .public_players()
            .into_iter()
            .find(|p| &p.id == player_id);
        if let Some(player) = joined {
            self.hub.broadcast_to_room(
                &code,
                ServerMessage::PlayerJoined { player },
                Some(player_id),
            );
        }
        self.refresh_lobby_routing(&code).await;
    }

    pub(crate) async fn handle_leave_room(&self, player_id: &PlayerId) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };

        self.sfu.leave_voice(&code, player_id).await;
        self.hub.broadcast_to_room(
            &code,
            ServerMessage::VoiceLeft {
                player_id: player_id.clone(),
            },
            Some(player_id),
        );

        self.evict_player(&code, player_id).await;
    }

    pub(crate) async fn handle_ready(&self, player_id: &PlayerId, payload: ReadyPayload) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self.registry.set_ready(&code, player_id, payload.is_ready) {
            self.send_error(player_id, ErrorCode::ReadyFailed, err.to_string());
            return;
        }
        self.hub.broadcast_to_room(
            &code,
            ServerMessage::PlayerReady {
                player_id: player_id.clone(),
                is_ready: payload.is_ready,
            },
            None,
        );
    }

    pub(crate) async fn handle_update_settings(
        &self,
        player_id: &PlayerId,
        payload: UpdateSettingsPayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        match self
            .registry
            .update_settings(&code, player_id, payload.settings)
        {
            Ok(settings) => {
                self.hub
                    .broadcast_to_room(&code, ServerMessage::SettingsUpdated { settings }, None);
            }
            Err(err) => self.send_error(player_id, err.code(), err.to_string()),
        }
    }

    /// Restore a dropped player's identity, membership, and game view.
    pub(crate) async fn handle_reconnect(
        &self,
        current_id: &PlayerId,
        payload: ReconnectPayload,
    ) -> Option<PlayerId> {
        let original_id = payload.player_id;

        if self.registry.can_reconnect(&original_id).is_none() {
            self.send_error(
                current_id,
                ErrorCode::ReconnectFailed,
                "no reconnectable session for that player id",
            );
            return None;
        }

        let room = match self.registry.reconnect(&original_id) {
            Ok(room) => room,
            Err(err) => {
                self.send_error(current_id, err.code(), err.to_string());
                return None;
            }
        };

        // The fresh socket adopts the original identity
        if self.hub.reassign(current_id, &original_id).is_none() {
            self.send_error(current_id, ErrorCode::ReconnectFailed, "connection vanished");
            return None;
        }
        self.hub.join_room(&original_id, &room.code);
        self.metrics.increment_reconnections();
        info!(room_code = %room.code, %original_id, "Player reconnected");

        self.hub.send_to_player(
            &original_id,
            ServerMessage::RoomState(Box::new(room.state_payload())),
        );
        if let Some(role) = self.runtime.role_payload(&room.code, &original_id).await {
            self.hub.send_to_player(
                &original_id,
                ServerMessage::RoleAssigned(Box::new(role)),
            );
        }
        if let Some((phase, round, remaining)) = self.runtime.phase_snapshot(&room.code).await {
            self.hub.send_to_player(
                &original_id,
                ServerMessage::PhaseChanged {
                    phase,
                    round,
                    timer: remaining,
                },
            );
        }
        if let Some(routing) = self.current_routing(&room.code).await {
            self.hub.send_to_player(
                &original_id,
                ServerMessage::VoiceRouting { routing },
            );
        }

        self.hub.broadcast_to_room(
            &room.code,
            ServerMessage::PlayerReconnected {
                player_id: original_id.clone(),
            },
            Some(&original_id),
        );

        Some(original_id)
    }
}
