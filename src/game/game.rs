use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tokio::time::Instant;

use crate::protocol::messages::{FinalPlayer, InvestigationResult};
use crate::protocol::{ErrorCode, GamePhase, PlayerId, PlayerStatus, Role, RoomCode, Team};

use super::day::DayVotes;
use super::night::NightActions;
use super::timers::PhaseTimers;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("no game in progress")]
    GameNotFound,
    #[error("a game is already running in this room")]
    GameInProgress,
    #[error("only the host can start the game")]
    NotHost,
    #[error("not all players are ready")]
    NotAllReady,
    #[error("player count is outside the allowed range")]
    NotEnoughPlayers,
    #[error("{0}")]
    BadRoleCounts(String),
    #[error("action not allowed in the current phase")]
    InvalidPhase,
    #[error("dead players cannot act")]
    PlayerDead,
    #[error("this role has no night action")]
    NoNightAction,
    #[error("target is not a living player")]
    InvalidTarget,
    #[error("mafia cannot target the mafia team")]
    MafiaTargetsMafia,
    #[error("the detective cannot investigate themselves")]
    CannotTargetSelf,
    #[error("player is not part of this game")]
    NotInGame,
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::GameNotFound | Self::InvalidPhase => ErrorCode::InvalidPhase,
            Self::GameInProgress => ErrorCode::GameStarted,
            Self::NotHost => ErrorCode::NotHost,
            Self::NotAllReady => ErrorCode::NotAllReady,
            Self::NotEnoughPlayers => ErrorCode::NotEnoughPlayers,
            Self::BadRoleCounts(_) => ErrorCode::StartFailed,
            Self::PlayerDead => ErrorCode::PlayerDead,
            Self::NoNightAction => ErrorCode::ActionFailed,
            Self::InvalidTarget | Self::MafiaTargetsMafia | Self::CannotTargetSelf => {
                ErrorCode::InvalidTarget
            }
            Self::NotInGame => ErrorCode::NotInRoom,
        }
    }
}

/// What a night resolution decided, after deaths were applied.
#[derive(Debug, Clone)]
pub struct NightOutcome {
    pub killed: Option<PlayerId>,
    pub killed_nickname: Option<String>,
    pub was_saved: bool,
    pub investigation: Option<(PlayerId, InvestigationResult)>,
}

/// What a day resolution decided, after the elimination was applied.
#[derive(Debug, Clone)]
pub struct DayResolution {
    pub eliminated: Option<PlayerId>,
    pub eliminated_nickname: Option<String>,
    pub eliminated_role: Option<Role>,
    pub no_majority: bool,
}

/// Per-room game state, owned by the runtime behind a per-game lock.
/// References its room by code only; the registry keeps owning the room.
#[derive(Debug)]
pub struct GameState {
    pub code: RoomCode,
    pub phase: GamePhase,
    /// Night counter; the first night is round 1.
    pub round: u32,
    pub night_timer: u64,
    pub phase_deadline: Option<Instant>,
    pub roles: HashMap<PlayerId, Role>,
    pub nicknames: HashMap<PlayerId, String>,
    pub player_order: Vec<PlayerId>,
    dead: HashSet<PlayerId>,
    pub night_actions: NightActions,
    pub day_votes: DayVotes,
    pub winner: Option<Team>,
    pub timers: PhaseTimers,
    seq: u64,
}

impl GameState {
    pub fn new(
        code: RoomCode,
        night_timer: u64,
        assignments: Vec<(PlayerId, Role)>,
        nicknames: HashMap<PlayerId, String>,
    ) -> Self {
        let player_order = assignments.iter().map(|(id, _)| id.clone()).collect();
        Self {
            code,
            phase: GamePhase::RoleReveal,
            round: 0,
            night_timer,
            phase_deadline: None,
            roles: assignments.into_iter().collect(),
            nicknames,
            player_order,
            dead: HashSet::new(),
            night_actions: NightActions::default(),
            day_votes: DayVotes::default(),
            winner: None,
            timers: PhaseTimers::disarmed(),
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    pub fn is_alive(&self, id: &PlayerId) -> bool {
        self.roles.contains_key(id) && !self.dead.contains(id)
    }

    pub fn status_of(&self, id: &PlayerId) -> PlayerStatus {
        if self.dead.contains(id) {
            PlayerStatus::Dead
        } else {
            PlayerStatus::Alive
        }
    }

    pub fn alive_players(&self) -> Vec<PlayerId> {
        self.player_order
            .iter()
            .filter(|id| self.is_alive(id))
            .cloned()
            .collect()
    }

    pub fn alive_count(&self) -> usize {
        self.player_order.iter().filter(|id| self.is_alive(id)).count()
    }

    fn team_of(&self, id: &PlayerId) -> Option<Team> {
        self.roles.get(id).map(|role| role.team())
    }

    /// Living mafia-team members, the recipients of `mafia_vote` updates.
    pub fn mafia_members(&self) -> Vec<PlayerId> {
        self.player_order
            .iter()
            .filter(|id| self.is_alive(id) && self.team_of(id) == Some(Team::Mafia))
            .cloned()
            .collect()
    }

    pub fn nickname(&self, id: &PlayerId) -> String {
        self.nicknames.get(id).cloned().unwrap_or_default()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.phase_deadline
            .map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs()
            })
            .unwrap_or(0)
    }

    /// Kill a player directly (reconnect-window eviction). Returns false if
    /// they were already dead.
    pub fn kill(&mut self, id: &PlayerId) -> bool {
        if self.roles.contains_key(id) {
            self.dead.insert(id.clone())
        } else {
            false
        }
    }

    // -- night ------------------------------------------------------------

    /// Validate and record a night action. The sequence number is assigned
    /// here, at validation time, and drives later tie-breaks.
    pub fn record_night_action(
        &mut self,
        actor: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<Role, GameError> {
        if self.phase != GamePhase::Night {
            return Err(GameError::InvalidPhase);
        }
        let role = *self.roles.get(actor).ok_or(GameError::NotInGame)?;
        if !self.is_alive(actor) {
            return Err(GameError::PlayerDead);
        }
        if !role.can_act_at_night() {
            return Err(GameError::NoNightAction);
        }
        if let Some(target) = target {
            if !self.is_alive(target) {
                return Err(GameError::InvalidTarget);
            }
        }

        match role {
            Role::Mafia | Role::Godfather => {
                if let Some(target) = target {
                    if self.team_of(target) == Some(Team::Mafia) {
                        return Err(GameError::MafiaTargetsMafia);
                    }
                }
                let seq = self.next_seq();
                self.night_actions
                    .record_mafia_vote(actor.clone(), target.cloned(), seq);
            }
            Role::Detective => {
                if target == Some(actor) {
                    return Err(GameError::CannotTargetSelf);
                }
                self.night_actions.detective_target = target.cloned();
                self.night_actions.detective_submitted = true;
            }
            Role::Doctor => {
                // Self-protection is allowed
                self.night_actions.doctor_target = target.cloned();
                self.night_actions.doctor_submitted = true;
            }
            Role::Villager => unreachable!("filtered by can_act_at_night"),
        }
        Ok(role)
    }

    /// All living night-capable roles have submitted.
    pub fn night_complete(&self) -> bool {
        self.player_order.iter().all(|id| {
            let Some(role) = self.roles.get(id) else {
                return true;
            };
            !self.is_alive(id)
                || !role.can_act_at_night()
                || self.night_actions.has_submitted(id, *role)
        })
    }

    /// Resolve the night and apply any death. The first night suppresses
    /// the kill outcome; every other effect still runs.
    pub fn resolve_night(&mut self) -> NightOutcome {
        let mafia_target = self.night_actions.resolved_mafia_target(&self.roles);
        let doctor_target = self.night_actions.doctor_target.clone();

        let (killed, was_saved) = if self.round == 1 {
            (None, false)
        } else {
            match mafia_target {
                Some(target) if doctor_target.as_ref() == Some(&target) => (None, true),
                Some(target) => (Some(target), false),
                None => (None, false),
            }
        };

        if let Some(victim) = &killed {
            self.dead.insert(victim.clone());
        }

        let investigation = self.night_actions.detective_target.clone().map(|target| {
            let detective = self
                .player_order
                .iter()
                .find(|id| self.roles.get(*id) == Some(&Role::Detective))
                .cloned()
                .unwrap_or_default();
            let is_mafia = self.roles.get(&target) == Some(&Role::Mafia);
            (detective, InvestigationResult { target, is_mafia })
        });

        NightOutcome {
            killed_nickname: killed.as_ref().map(|id| self.nickname(id)),
            killed,
            was_saved,
            investigation,
        }
    }

    // -- day --------------------------------------------------------------

    pub fn record_day_vote(
        &mut self,
        voter: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<(), GameError> {
        if self.phase != GamePhase::Day {
            return Err(GameError::InvalidPhase);
        }
        if !self.roles.contains_key(voter) {
            return Err(GameError::NotInGame);
        }
        if !self.is_alive(voter) {
            return Err(GameError::PlayerDead);
        }
        if let Some(target) = target {
            if !self.is_alive(target) {
                return Err(GameError::InvalidTarget);
            }
        }
        let seq = self.next_seq();
        self.day_votes.record(voter.clone(), target.cloned(), seq);
        Ok(())
    }

    /// Every living player has submitted a vote (or an abstain).
    pub fn day_complete(&self) -> bool {
        self.alive_players()
            .iter()
            .all(|id| self.day_votes.has_submitted(id))
    }

    /// Resolve the day vote and apply the elimination.
    pub fn resolve_day(&mut self) -> DayResolution {
        let outcome = self.day_votes.outcome(self.alive_count());
        let eliminated = outcome.eliminated;

        if let Some(victim) = &eliminated {
            self.dead.insert(victim.clone());
        }

        DayResolution {
            eliminated_nickname: eliminated.as_ref().map(|id| self.nickname(id)),
            eliminated_role: eliminated.as_ref().and_then(|id| self.roles.get(id)).copied(),
            eliminated,
            no_majority: outcome.no_majority,
        }
    }

    // -- win check --------------------------------------------------------

    /// Evaluate the win condition after a death.
    pub fn check_win(&self) -> Option<Team> {
        let mafia_alive = self
            .player_order
            .iter()
            .filter(|id| self.is_alive(id) && self.team_of(id) == Some(Team::Mafia))
            .count();
        let town_alive = self.alive_count() - mafia_alive;

        if self.alive_count() == 0 {
            // Degenerate edge: mafia at least match the town
            Some(Team::Mafia)
        } else if mafia_alive == 0 {
            Some(Team::Town)
        } else if mafia_alive >= town_alive {
            Some(Team::Mafia)
        } else {
            None
        }
    }

    /// Full role reveal for `game_over`.
    pub fn final_players(&self) -> Vec<FinalPlayer> {
        self.player_order
            .iter()
            .filter_map(|id| {
                self.roles.get(id).map(|role| FinalPlayer {
                    id: id.clone(),
                    nickname: self.nickname(id),
                    role: *role,
                    status: self.status_of(id),
                })
            })
            .collect()
    }

    /// Snapshot for the voice routing derivation.
    pub fn voice_players(&self) -> Vec<(PlayerId, Team, bool)> {
        self.player_order
            .iter()
            .filter_map(|id| {
                self.team_of(id)
                    .map(|team| (id.clone(), team, self.is_alive(id)))
            })
            .collect()
    }
}
