use crate::protocol::messages::{DayVotePayload, GhostChatPayload, NightActionPayload};
use crate::protocol::{validation, ErrorCode, PlayerId, PlayerStatus, ServerMessage};

use super::GameServer;

impl GameServer {
    pub(crate) async fn handle_start_game(&self, player_id: &PlayerId) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self.runtime.start_game(&code, player_id) {
            self.send_error(player_id, err.code(), err.to_string());
        }
    }

    pub(crate) async fn handle_night_action(
        &self,
        player_id: &PlayerId,
        payload: NightActionPayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self
            .runtime
            .submit_night_action(&code, player_id, payload.target.as_ref())
            .await
        {
            self.send_error(player_id, err.code(), err.to_string());
        }
    }

    pub(crate) async fn handle_day_vote(
        &self,
        player_id: &PlayerId,
        payload: DayVotePayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self
            .runtime
            .submit_day_vote(&code, player_id, payload.target.as_ref())
            .await
        {
            self.send_error(player_id, err.code(), err.to_string());
        }
    }

    /// Dead-only chat channel, fanned out to the dead subset of the room.
    /// Eligibility is the player's status at send time.
    pub(crate) async fn handle_ghost_chat(
        &self,
        player_id: &PlayerId,
        payload: GhostChatPayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err_code) = validation::validate_chat_message(&payload.message) {
            self.send_error(player_id, err_code, "chat message rejected");
            return;
        }

        let Some(room) = self.registry.get_room(&code) else {
            self.send_error(player_id, ErrorCode::NotInRoom, "room vanished");
            return;
        };
        let sender = room.players.get(player_id);
        if sender.map(|p| p.status) != Some(PlayerStatus::Dead) {
            self.send_error(player_id, ErrorCode::NotDead, "the ghost chat is for the dead");
            return;
        }
        let nickname = sender.map(|p| p.nickname.clone()).unwrap_or_default();

        let dead: Vec<PlayerId> = room
            .players
            .values()
            .filter(|p| p.status == PlayerStatus::Dead)
            .map(|p| p.id.clone())
            .collect();

        self.hub.broadcast_to_players(
            &code,
            &dead,
            ServerMessage::GhostChatBroadcast {
                player_id: player_id.clone(),
                nickname,
                message: payload.message,
            },
        );
    }
}
