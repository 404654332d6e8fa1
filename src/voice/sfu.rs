use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::RouteCaps;
use crate::protocol::{ErrorCode, PlayerId, RoomCode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceError {
    #[error("voice is not available on this server")]
    Unavailable,
    #[error("player has not joined voice")]
    NotJoined,
    #[error("voice negotiation failed: {0}")]
    NegotiationFailed(String),
}

impl VoiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable => ErrorCode::VoiceUnavailable,
            Self::NotJoined => ErrorCode::VoiceJoinFailed,
            Self::NegotiationFailed(_) => ErrorCode::VoiceOfferFailed,
        }
    }
}

/// Signaling seam to the SFU. The media plane (SDP negotiation, ICE, RTP
/// forwarding) is an external collaborator; the core only drives this
/// interface and never inspects media internals.
#[async_trait]
pub trait SfuSignaling: Send + Sync {
    /// Register a participant for a room's voice mesh.
    async fn join_voice(&self, code: &RoomCode, player_id: &PlayerId) -> Result<(), VoiceError>;

    /// Drop a participant. Must be idempotent.
    async fn leave_voice(&self, code: &RoomCode, player_id: &PlayerId);

    /// Negotiate a peer's offer; returns the answer SDP.
    async fn handle_offer(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        sdp: String,
    ) -> Result<String, VoiceError>;

    /// Accept a peer's answer to a server-initiated offer.
    async fn handle_answer(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        sdp: String,
    ) -> Result<(), VoiceError>;

    /// Add a trickled ICE candidate for a participant.
    async fn add_ice_candidate(
        &self,
        code: &RoomCode,
        player_id: &PlayerId,
        candidate: serde_json::Value,
    ) -> Result<(), VoiceError>;

    /// Apply a freshly derived routing table for a room.
    async fn apply_voice_routing(&self, code: &RoomCode, routing: &BTreeMap<PlayerId, RouteCaps>);
}

/// Stand-alone implementation of the seam: tracks participants and the last
/// applied routing table so signaling fan-out works without a media plane,
/// and reports `voice_unavailable` for media negotiation.
#[derive(Default)]
pub struct NullSfu {
    participants: Mutex<HashMap<RoomCode, HashSet<PlayerId>>>,
    routing: Mutex<HashMap<RoomCode, BTreeMap<PlayerId, RouteCaps>>>,
}

impl NullSfu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_participant(&self, code: &RoomCode, player_id: &PlayerId) -> bool {
        self.participants
            .lock()
            .map(|rooms| {
                rooms
                    .get(code)
                    .is_some_and(|members| members.contains(player_id))
            })
            .unwrap_or(false)
    }

    pub fn last_routing(&self, code: &RoomCode) -> Option<BTreeMap<PlayerId, RouteCaps>> {
        self.routing
            .lock()
            .ok()
            .and_then(|rooms| rooms.get(code).cloned())
    }
}

#[async_trait]
impl SfuSignaling for NullSfu {
    async fn join_voice(&self, code: &RoomCode, player_id: &PlayerId) -> Result<(), VoiceError> {
        if let Ok(mut rooms) = self.participants.lock() {
            rooms
                .entry(code.clone())
                .or_default()
                .insert(player_id.clone());
        }
        debug!(%player_id, room_code = %code, "Voice participant joined");
        Ok(())
    }

    async fn leave_voice(&self, code: &RoomCode, player_id: &PlayerId) {
        if let Ok(mut rooms) = self.participants.lock() {
            if let Some(members) = rooms.get_mut(code) {
                members.remove(player_id);
                if members.is_empty() {
                    rooms.remove(code);
                }
            }
        }
        debug!(%player_id, room_code = %code, "Voice participant left");
    }

    async fn handle_offer(
        &self,
        _code: &RoomCode,
        _player_id: &PlayerId,
        _sdp: String,
    ) -> Result<String, VoiceError> {
        // No media plane to answer with
        Err(VoiceError::Unavailable)
    }

    async fn handle_answer(
        &self,
        _code: &RoomCode,
        _player_id: &PlayerId,
        _sdp: String,
    ) -> Result<(), VoiceError> {
        Err(VoiceError::Unavailable)
    }

    async fn add_ice_candidate(
        &self,
        _code: &RoomCode,
        _player_id: &PlayerId,
        _candidate: serde_json::Value,
    ) -> Result<(), VoiceError> {
        Err(VoiceError::Unavailable)
    }

    async fn apply_voice_routing(&self, code: &RoomCode, routing: &BTreeMap<PlayerId, RouteCaps>) {
        if let Ok(mut rooms) = self.routing.lock() {
            rooms.insert(code.clone(), routing.clone());
        }
    }
}
