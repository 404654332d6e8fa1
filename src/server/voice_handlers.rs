use crate::protocol::messages::{SpeakingStatePayload, VoiceCandidatePayload, VoiceOfferPayload};
use crate::protocol::{PlayerId, ServerMessage};

use super::GameServer;

impl GameServer {
    pub(crate) async fn handle_voice_join(&self, player_id: &PlayerId) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self.sfu.join_voice(&code, player_id).await {
            self.send_error(player_id, err.code(), err.to_string());
            return;
        }
        self.hub.broadcast_to_room(
            &code,
            ServerMessage::VoiceJoined {
                player_id: player_id.clone(),
            },
            None,
        );
        // A new participant needs the current table applied
        if let Some(routing) = self.current_routing(&code).await {
            self.apply_voice_routing(&code, routing).await;
        }
    }

    pub(crate) async fn handle_voice_leave(&self, player_id: &PlayerId) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        self.sfu.leave_voice(&code, player_id).await;
        self.hub.broadcast_to_room(
            &code,
            ServerMessage::VoiceLeft {
                player_id: player_id.clone(),
            },
            None,
        );
    }

    pub(crate) async fn handle_voice_offer(
        &self,
        player_id: &PlayerId,
        payload: VoiceOfferPayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        match self.sfu.handle_offer(&code, player_id, payload.sdp).await {
            Ok(answer) => {
                self.hub
                    .send_to_player(player_id, ServerMessage::VoiceAnswer { sdp: answer });
            }
            Err(err) => self.send_error(player_id, err.code(), err.to_string()),
        }
    }

    pub(crate) async fn handle_voice_answer(
        &self,
        player_id: &PlayerId,
        payload: VoiceOfferPayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self.sfu.handle_answer(&code, player_id, payload.sdp).await {
            self.send_error(player_id, err.code(), err.to_string());
        }
    }

    pub(crate) async fn handle_voice_candidate(
        &self,
        player_id: &PlayerId,
        payload: VoiceCandidatePayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        if let Err(err) = self
            .sfu
            .add_ice_candidate(&code, player_id, payload.candidate)
            .await
        {
            self.send_error(player_id, err.code(), err.to_string());
        }
    }

    pub(crate) async fn handle_speaking_state(
        &self,
        player_id: &PlayerId,
        payload: SpeakingStatePayload,
    ) {
        let Some(code) = self.require_room(player_id) else {
            return;
        };
        self.hub.broadcast_to_room(
            &code,
            ServerMessage::SpeakingState {
                player_id: player_id.clone(),
                speaking: payload.speaking,
            },
            Some(player_id),
        );
    }
}
