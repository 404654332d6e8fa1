use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error_codes::ErrorCode;
use super::types::{GamePhase, GameSettings, PlayerId, PlayerStatus, Role, RoomCode, RoomState, Team};

// ---------------------------------------------------------------------------
// Inbound payloads
//
// Inbound frames are parsed in two steps: the codec splits the envelope into
// `(type, raw payload)` and the router decodes the payload lazily with the
// struct registered for that type. This keeps `unknown_message` (unregistered
// type) distinct from `invalid_payload` (registered type, bad shape).
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomPayload {
    pub nickname: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinRoomPayload {
    pub code: RoomCode,
    pub nickname: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectPayload {
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    pub is_ready: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingsPayload {
    pub settings: GameSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NightActionPayload {
    #[serde(default)]
    pub target: Option<PlayerId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayVotePayload {
    #[serde(default)]
    pub target: Option<PlayerId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GhostChatPayload {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceOfferPayload {
    pub sdp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceCandidatePayload {
    pub candidate: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeakingStatePayload {
    pub speaking: bool,
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// Public view of a player, shared with every room member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPublic {
    pub id: PlayerId,
    pub nickname: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub status: PlayerStatus,
}

/// Full room snapshot sent on join, create, and reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomStatePayload {
    pub code: RoomCode,
    pub state: RoomState,
    pub players: Vec<PlayerPublic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<PlayerId>,
    pub settings: GameSettings,
}

/// A fellow mafia-team member, revealed only to the mafia team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MafiaTeammate {
    pub id: PlayerId,
    pub nickname: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignedPayload {
    pub role: Role,
    pub team: Team,
    /// Populated only for mafia-team recipients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub teammates: Vec<MafiaTeammate>,
}

/// Delivered only to the detective inside their copy of `night_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationResult {
    pub target: PlayerId,
    pub is_mafia: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killed: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killed_nickname: Option<String>,
    pub was_saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigation: Option<InvestigationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eliminated: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eliminated_nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eliminated_role: Option<Role>,
    pub no_majority: bool,
}

/// Final reveal of every player's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalPlayer {
    pub id: PlayerId,
    pub nickname: String,
    pub role: Role,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverPayload {
    pub winner: Team,
    pub players: Vec<FinalPlayer>,
}

/// Per-player speak/hear capabilities derived from game state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteCaps {
    pub can_speak: bool,
    pub can_hear: Vec<PlayerId>,
}

/// Message types sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First frame after the upgrade; assigns the player token
    Connected { player_id: PlayerId },
    /// Typed error delivered to the originating peer only
    Error { code: ErrorCode, message: String },
    /// Room created; followed by a full `room_state`
    RoomCreated { code: RoomCode },
    /// Successfully joined a room (boxed to reduce enum size)
    RoomJoined(Box<RoomStatePayload>),
    /// Full room snapshot
    RoomState(Box<RoomStatePayload>),
    /// Another player joined the room
    PlayerJoined { player: PlayerPublic },
    /// Another player left; carries the promoted host if one was chosen
    PlayerLeft {
        player_id: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_host: Option<PlayerId>,
    },
    PlayerReady {
        player_id: PlayerId,
        is_ready: bool,
    },
    PlayerDisconnected { player_id: PlayerId },
    PlayerReconnected { player_id: PlayerId },
    SettingsUpdated { settings: GameSettings },
    /// Game is starting; roles follow as targeted `role_assigned` frames
    GameStarting,
    RoleAssigned(Box<RoleAssignedPayload>),
    PhaseChanged {
        phase: GamePhase,
        round: u32,
        /// Seconds until the phase deadline; 0 for untimed phases
        timer: u64,
    },
    TimerTick { remaining: u64 },
    NightResult(Box<NightResultPayload>),
    /// Day vote state; full voter → target map plus who has submitted
    VoteUpdate {
        votes: BTreeMap<PlayerId, PlayerId>,
        submitted: Vec<PlayerId>,
    },
    /// Mafia-only view of a teammate's night vote
    MafiaVote {
        voter: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<PlayerId>,
    },
    DayResult(Box<DayResultPayload>),
    GameOver(Box<GameOverPayload>),
    GhostChatBroadcast {
        player_id: PlayerId,
        nickname: String,
        message: String,
    },
    VoiceJoined { player_id: PlayerId },
    VoiceLeft { player_id: PlayerId },
    VoiceOffer { sdp: String },
    VoiceAnswer { sdp: String },
    VoiceCandidate { candidate: serde_json::Value },
    SpeakingState {
        player_id: PlayerId,
        speaking: bool,
    },
    VoiceRouting {
        routing: BTreeMap<PlayerId, RouteCaps>,
    },
}
