use std::collections::BTreeMap;

use tokio::sync::mpsc;

use crate::protocol::messages::{
    DayResultPayload, GameOverPayload, NightResultPayload, RoleAssignedPayload, RouteCaps,
};
use crate::protocol::{GamePhase, PlayerId, RoomCode};

/// Typed events emitted by the game runtime through the sink the router
/// installs at startup. The runtime never touches the hub directly.
#[derive(Debug)]
pub enum GameEvent {
    /// Game accepted; role assignments follow as targeted events.
    GameStarting { code: RoomCode },
    /// Secret role delivery to one player.
    RoleAssigned {
        code: RoomCode,
        target: PlayerId,
        payload: RoleAssignedPayload,
    },
    PhaseChanged {
        code: RoomCode,
        phase: GamePhase,
        round: u32,
        timer: u64,
    },
    TimerTick { code: RoomCode, remaining: u64 },
    /// A mafia member's night vote, visible to the mafia team only.
    MafiaVote {
        code: RoomCode,
        recipients: Vec<PlayerId>,
        voter: PlayerId,
        target: Option<PlayerId>,
    },
    VoteUpdate {
        code: RoomCode,
        votes: BTreeMap<PlayerId, PlayerId>,
        submitted: Vec<PlayerId>,
    },
    /// Broadcast copy plus, when a detective investigated, a targeted copy
    /// carrying the investigation result.
    NightResult {
        code: RoomCode,
        broadcast: NightResultPayload,
        detective: Option<(PlayerId, NightResultPayload)>,
    },
    DayResult {
        code: RoomCode,
        payload: DayResultPayload,
    },
    GameOver {
        code: RoomCode,
        payload: GameOverPayload,
    },
    /// New speak/hear table to apply to the SFU and broadcast to clients.
    VoiceRouting {
        code: RoomCode,
        routing: BTreeMap<PlayerId, RouteCaps>,
    },
}

/// Capability handed to the runtime for event emission.
pub type EventSink = mpsc::UnboundedSender<GameEvent>;
