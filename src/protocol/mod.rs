// Protocol module: envelope codec, message types, error codes, validation

pub mod codec;
pub mod error_codes;
pub mod ids;
pub mod messages;
pub mod types;
pub mod validation;

pub use codec::{CodecError, Envelope, MAX_FRAME_BYTES};
pub use error_codes::ErrorCode;
pub use messages::{
    DayResultPayload, FinalPlayer, GameOverPayload, InvestigationResult, MafiaTeammate,
    NightResultPayload, PlayerPublic, RoleAssignedPayload, RoomStatePayload, RouteCaps,
    ServerMessage,
};
pub use types::{
    GamePhase, GameSettings, Player, PlayerId, PlayerStatus, Role, RoomCode, RoomState, Team,
    MAX_PLAYERS, MIN_PLAYERS,
};
