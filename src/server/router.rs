use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::protocol::messages::{
    CreateRoomPayload, DayVotePayload, GhostChatPayload, JoinRoomPayload, NightActionPayload,
    ReadyPayload, ReconnectPayload, SpeakingStatePayload, UpdateSettingsPayload,
    VoiceCandidatePayload, VoiceOfferPayload,
};
use crate::protocol::{codec, ErrorCode, PlayerId};

use super::GameServer;

impl GameServer {
    /// Dispatch one inbound frame. Returns the player's new identity when
    /// the frame completed a reconnection (the connection adopts it).
    pub async fn handle_frame(&self, player_id: &PlayerId, frame: &str) -> Option<PlayerId> {
        let envelope = match codec::parse(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%player_id, error = %err, "Rejected inbound frame");
                self.send_error(player_id, ErrorCode::InvalidMessage, err.to_string());
                return None;
            }
        };

        debug!(%player_id, msg_type = %envelope.msg_type, "Inbound message");

        match envelope.msg_type.as_str() {
            "create_room" => {
                if let Some(payload) = self.decode::<CreateRoomPayload>(player_id, envelope.payload)
                {
                    self.handle_create_room(player_id, payload).await;
                }
            }
            "join_room" => {
                if let Some(payload) = self.decode::<JoinRoomPayload>(player_id, envelope.payload) {
                    self.handle_join_room(player_id, payload).await;
                }
            }
            "leave_room" => self.handle_leave_room(player_id).await,
            "reconnect" => {
                if let Some(payload) = self.decode::<ReconnectPayload>(player_id, envelope.payload)
                {
                    return self.handle_reconnect(player_id, payload).await;
                }
            }
            "ready" => {
                if let Some(payload) = self.decode::<ReadyPayload>(player_id, envelope.payload) {
                    self.handle_ready(player_id, payload).await;
                }
            }
            "update_settings" => {
                if let Some(payload) =
                    self.decode::<UpdateSettingsPayload>(player_id, envelope.payload)
                {
                    self.handle_update_settings(player_id, payload).await;
                }
            }
            "start_game" => self.handle_start_game(player_id).await,
            "night_action" => {
                if let Some(payload) =
                    self.decode::<NightActionPayload>(player_id, envelope.payload)
                {
                    self.handle_night_action(player_id, payload).await;
                }
            }
            "day_vote" => {
                if let Some(payload) = self.decode::<DayVotePayload>(player_id, envelope.payload) {
                    self.handle_day_vote(player_id, payload).await;
                }
            }
            "ghost_chat" => {
                if let Some(payload) = self.decode::<GhostChatPayload>(player_id, envelope.payload)
                {
                    self.handle_ghost_chat(player_id, payload).await;
                }
            }
            "voice_join" => self.handle_voice_join(player_id).await,
            "voice_leave" => self.handle_voice_leave(player_id).await,
            "voice_offer" => {
                if let Some(payload) =
                    self.decode::<VoiceOfferPayload>(player_id, envelope.payload)
                {
                    self.handle_voice_offer(player_id, payload).await;
                }
            }
            "voice_answer" => {
                if let Some(payload) =
                    self.decode::<VoiceOfferPayload>(player_id, envelope.payload)
                {
                    self.handle_voice_answer(player_id, payload).await;
                }
            }
            "voice_candidate" => {
                if let Some(payload) =
                    self.decode::<VoiceCandidatePayload>(player_id, envelope.payload)
                {
                    self.handle_voice_candidate(player_id, payload).await;
                }
            }
            "speaking_state" => {
                if let Some(payload) =
                    self.decode::<SpeakingStatePayload>(player_id, envelope.payload)
                {
                    self.handle_speaking_state(player_id, payload).await;
                }
            }
            other => {
                debug!(%player_id, msg_type = %other, "Unknown message type");
                self.send_error(
                    player_id,
                    ErrorCode::UnknownMessage,
                    format!("unknown message type '{other}'"),
                );
            }
        }
        None
    }

    /// Decode a payload lazily for its registered handler; a mismatch is an
    /// `invalid_payload` error to the sender with state untouched.
    fn decode<T: DeserializeOwned>(
        &self,
        player_id: &PlayerId,
        payload: serde_json::Value,
    ) -> Option<T> {
        match serde_json::from_value(payload) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                self.send_error(player_id, ErrorCode::InvalidPayload, err.to_string());
                None
            }
        }
    }

    pub(crate) fn send_error(
        &self,
        player_id: &PlayerId,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        if let Some(handle) = self.hub.get(player_id) {
            handle.send_error(code, message);
        }
    }

    /// Room code of the player's current room, or a `not_in_room` error.
    pub(crate) fn require_room(&self, player_id: &PlayerId) -> Option<String> {
        let code = self.hub.get(player_id).and_then(|handle| handle.room_code());
        if code.is_none() {
            self.send_error(player_id, ErrorCode::NotInRoom, "join a room first");
        }
        code
    }

    /// Connection teardown hook: decides between marking the player
    /// disconnected (room is playing, reconnect window armed) and eviction.
    pub async fn handle_disconnect(&self, player_id: &PlayerId) {
        let code = self.hub.get(player_id).and_then(|handle| handle.room_code());
        self.hub.unregister(player_id);

        let Some(code) = code else {
            return;
        };

        // Leaving voice always fans out
        self.sfu.leave_voice(&code, player_id).await;
        self.hub.broadcast_to_room(
            &code,
            crate::protocol::ServerMessage::VoiceLeft {
                player_id: player_id.clone(),
            },
            Some(player_id),
        );

        if let Some(entry) = self.registry.mark_disconnected(&code, player_id) {
            self.hub.broadcast_to_room(
                &code,
                crate::protocol::ServerMessage::PlayerDisconnected {
                    player_id: player_id.clone(),
                },
                Some(player_id),
            );
            self.arm_reconnect_window(entry);
        } else {
            self.evict_player(&code, player_id).await;
        }
    }
}
