use serde::{Deserialize, Serialize};

/// Unique identifier for players: a 12-char lowercase base32 token.
pub type PlayerId = String;
/// Six-character room code.
pub type RoomCode = String;

/// Smallest player count for which the start constraints are satisfiable.
pub const MIN_PLAYERS: usize = 4;
/// Hard cap on room size.
pub const MAX_PLAYERS: usize = 12;

/// Lifecycle of a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    #[default]
    Waiting,
    Playing,
    Ended,
}

/// Alive/dead status of a player inside a running game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    #[default]
    Alive,
    Dead,
}

/// Team allegiance derived from role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Town,
    Mafia,
}

/// Role dealt to a player at game start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Villager,
    Mafia,
    Godfather,
    Doctor,
    Detective,
}

impl Role {
    pub fn team(self) -> Team {
        match self {
            Self::Mafia | Self::Godfather => Team::Mafia,
            Self::Villager | Self::Doctor | Self::Detective => Team::Town,
        }
    }

    /// Whether this role submits an action during the night phase.
    pub fn can_act_at_night(self) -> bool {
        !matches!(self, Self::Villager)
    }
}

/// Step of the game state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    RoleReveal,
    Night,
    NightResult,
    Day,
    DayResult,
    GameOver,
}

/// A member of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_connected: bool,
    pub status: PlayerStatus,
    /// Assigned at game start; never serialized into public room state.
    #[serde(skip)]
    pub role: Option<Role>,
}

impl Player {
    pub fn new(id: PlayerId, nickname: String, is_host: bool) -> Self {
        Self {
            id,
            nickname,
            is_host,
            is_ready: false,
            is_connected: true,
            status: PlayerStatus::Alive,
            role: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }
}

/// Per-room game configuration chosen by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSettings {
    pub villagers: usize,
    pub mafia: usize,
    pub godfather: usize,
    pub doctor: usize,
    pub detective: usize,
    /// Night phase length in seconds. Day is twice this.
    pub night_timer: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            villagers: 3,
            mafia: 1,
            godfather: 0,
            doctor: 1,
            detective: 1,
            night_timer: 30,
        }
    }
}

impl GameSettings {
    /// Total number of roles in the pool.
    pub fn total_roles(&self) -> usize {
        self.villagers + self.mafia + self.godfather + self.doctor + self.detective
    }
}
