use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable wire error codes for structured error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Protocol errors
    InvalidMessage,
    InvalidPayload,
    UnknownMessage,

    // Validation errors
    InvalidNickname,
    InvalidRoomCode,
    InvalidTarget,

    // Room errors
    RoomNotFound,
    WrongPassword,
    RoomFull,
    NicknameInUse,
    GameStarted,
    NotInRoom,
    NotHost,

    // Game errors
    NotEnoughPlayers,
    NotAllReady,
    InvalidPhase,
    PlayerDead,
    NotDead,

    // Transient / internal
    CreateFailed,
    JoinFailed,
    LeaveFailed,
    ReadyFailed,
    SettingsFailed,
    StartFailed,
    ActionFailed,
    VoteFailed,
    ReconnectFailed,

    // Voice errors
    VoiceUnavailable,
    VoiceJoinFailed,
    VoiceOfferFailed,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidMessage => "The message frame is malformed or exceeds the size limit.",
            Self::InvalidPayload => "The message payload does not match the expected shape.",
            Self::UnknownMessage => "The message type is not recognized by this server.",
            Self::InvalidNickname => {
                "The nickname is invalid. Nicknames must be 1-20 visible characters."
            }
            Self::InvalidRoomCode => "The room code is malformed. Codes are 6 characters.",
            Self::InvalidTarget => "The targeted player does not exist or is not a valid target.",
            Self::RoomNotFound => "No room exists with that code. It may have expired.",
            Self::WrongPassword => "The room password is incorrect.",
            Self::RoomFull => "The room has reached its maximum of 12 players.",
            Self::NicknameInUse => "Another player in the room already uses that nickname.",
            Self::GameStarted => "The game in this room has already started.",
            Self::NotInRoom => "You are not currently in a room.",
            Self::NotHost => "Only the room host can perform this action.",
            Self::NotEnoughPlayers => "The room does not have enough players to start.",
            Self::NotAllReady => "All players must be ready before the game can start.",
            Self::InvalidPhase => "That action is not allowed in the current game phase.",
            Self::PlayerDead => "Dead players cannot perform this action.",
            Self::NotDead => "Only dead players can use the ghost chat.",
            Self::CreateFailed => "Failed to create the room. Please try again.",
            Self::JoinFailed => "Failed to join the room. Please try again.",
            Self::LeaveFailed => "Failed to leave the room.",
            Self::ReadyFailed => "Failed to update the ready state.",
            Self::SettingsFailed => "Failed to update the room settings.",
            Self::StartFailed => "Failed to start the game.",
            Self::ActionFailed => "Failed to record the night action.",
            Self::VoteFailed => "Failed to record the vote.",
            Self::ReconnectFailed => {
                "Reconnection failed. The window may have expired or the room may be closed."
            }
            Self::VoiceUnavailable => "Voice is not available on this server.",
            Self::VoiceJoinFailed => "Failed to join the voice channel.",
            Self::VoiceOfferFailed => "Failed to negotiate the voice connection.",
        }
    }

    /// The stable snake_case string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessage => "invalid_message",
            Self::InvalidPayload => "invalid_payload",
            Self::UnknownMessage => "unknown_message",
            Self::InvalidNickname => "invalid_nickname",
            Self::InvalidRoomCode => "invalid_room_code",
            Self::InvalidTarget => "invalid_target",
            Self::RoomNotFound => "room_not_found",
            Self::WrongPassword => "wrong_password",
            Self::RoomFull => "room_full",
            Self::NicknameInUse => "nickname_in_use",
            Self::GameStarted => "game_started",
            Self::NotInRoom => "not_in_room",
            Self::NotHost => "not_host",
            Self::NotEnoughPlayers => "not_enough_players",
            Self::NotAllReady => "not_all_ready",
            Self::InvalidPhase => "invalid_phase",
            Self::PlayerDead => "player_dead",
            Self::NotDead => "not_dead",
            Self::CreateFailed => "create_failed",
            Self::JoinFailed => "join_failed",
            Self::LeaveFailed => "leave_failed",
            Self::ReadyFailed => "ready_failed",
            Self::SettingsFailed => "settings_failed",
            Self::StartFailed => "start_failed",
            Self::ActionFailed => "action_failed",
            Self::VoteFailed => "vote_failed",
            Self::ReconnectFailed => "reconnect_failed",
            Self::VoiceUnavailable => "voice_unavailable",
            Self::VoiceJoinFailed => "voice_join_failed",
            Self::VoiceOfferFailed => "voice_offer_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
