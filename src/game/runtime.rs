use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::protocol::messages::{
    DayResultPayload, GameOverPayload, MafiaTeammate, NightResultPayload, RoleAssignedPayload,
};
use crate::protocol::{GamePhase, PlayerId, Role, RoomCode, RoomState, Team};
use crate::room::RoomRegistry;
use crate::voice::{derive_routing, voice_phase_for, VoicePlayer};

use super::events::{EventSink, GameEvent};
use super::game::{GameError, GameState};
use super::roles::{assign_roles, validate_settings};
use super::timers::PhaseTimers;
use super::{RESULT_INTERSTITIAL_SECS, ROLE_REVEAL_SECS};

/// Per-room game state machines. Owns every `GameState` behind a per-game
/// lock, schedules phase timers, and emits typed events through the sink
/// the router installed at startup.
pub struct GameRuntime {
    games: DashMap<RoomCode, Arc<RwLock<GameState>>>,
    registry: Arc<RoomRegistry>,
    events: EventSink,
    /// Handle to ourselves for the timer tasks we spawn.
    weak_self: Weak<GameRuntime>,
}

impl GameRuntime {
    pub fn new(registry: Arc<RoomRegistry>, events: EventSink) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            games: DashMap::new(),
            registry,
            events,
            weak_self: weak.clone(),
        })
    }

    fn get(&self, code: &str) -> Option<Arc<RwLock<GameState>>> {
        self.games.get(code).map(|entry| Arc::clone(entry.value()))
    }

    fn emit(&self, event: GameEvent) {
        let _ = self.events.send(event);
    }

    fn emit_voice_routing(&self, game: &GameState) {
        let players: Vec<VoicePlayer> = game
            .voice_players()
            .into_iter()
            .map(|(id, team, is_alive)| VoicePlayer { id, team, is_alive })
            .collect();
        let routing = derive_routing(voice_phase_for(game.phase), &players);
        self.emit(GameEvent::VoiceRouting {
            code: game.code.clone(),
            routing,
        });
    }

    // -- start -------------------------------------------------------------

    /// Validate and begin a game for a waiting room.
    pub fn start_game(&self, code: &str, host_id: &PlayerId) -> Result<(), GameError> {
        let room = self
            .registry
            .get_room(code)
            .ok_or(GameError::GameNotFound)?;

        if self.games.contains_key(code) || room.state != RoomState::Waiting {
            return Err(GameError::GameInProgress);
        }
        if room.host_id().as_ref() != Some(host_id) {
            return Err(GameError::NotHost);
        }
        if !room.all_ready() {
            return Err(GameError::NotAllReady);
        }
        validate_settings(&room.settings, room.players.len())?;

        let assignments = assign_roles(&room.settings, &room.player_order);
        let nicknames: HashMap<PlayerId, String> = room
            .players
            .values()
            .map(|p| (p.id.clone(), p.nickname.clone()))
            .collect();

        self.registry.set_room_state(code, RoomState::Playing);
        for (player_id, role) in &assignments {
            self.registry.set_player_role(code, player_id, *role);
        }

        let mut game = GameState::new(
            code.to_string(),
            room.settings.night_timer,
            assignments.clone(),
            nicknames,
        );

        info!(room_code = %code, players = assignments.len(), "Game started");
        self.emit(GameEvent::GameStarting {
            code: code.to_string(),
        });

        let mafia_team: Vec<(PlayerId, Role)> = assignments
            .iter()
            .filter(|(_, role)| role.team() == Team::Mafia)
            .cloned()
            .collect();

        for (player_id, role) in &assignments {
            let teammates = if role.team() == Team::Mafia {
                mafia_team
                    .iter()
                    .filter(|(id, _)| id != player_id)
                    .map(|(id, role)| MafiaTeammate {
                        id: id.clone(),
                        nickname: game.nickname(id),
                        role: *role,
                    })
                    .collect()
            } else {
                Vec::new()
            };
            self.emit(GameEvent::RoleAssigned {
                code: code.to_string(),
                target: player_id.clone(),
                payload: RoleAssignedPayload {
                    role: *role,
                    team: role.team(),
                    teammates,
                },
            });
        }

        self.emit_voice_routing(&game);
        self.arm_phase(
            &mut game,
            Duration::from_secs(ROLE_REVEAL_SECS),
            GamePhase::RoleReveal,
            0,
            false,
        );

        self.games
            .insert(code.to_string(), Arc::new(RwLock::new(game)));
        Ok(())
    }

    // -- timers ------------------------------------------------------------

    /// Install a fresh cancellation handle for the current phase and spawn
    /// its deadline one-shot (plus the 1-Hz ticker for timed night phases).
    /// The previous handle is cancelled first, so the deadline and ticker
    /// always die together.
    fn arm_phase(
        &self,
        game: &mut GameState,
        duration: Duration,
        phase: GamePhase,
        round: u32,
        tick: bool,
    ) {
        game.timers.cancel();
        game.timers = PhaseTimers::arm();
        let token = game.timers.token();
        let deadline = Instant::now() + duration;
        game.phase_deadline = Some(deadline);

        let runtime = self.weak_self.clone();
        let code = game.code.clone();
        let oneshot_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = oneshot_token.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => {
                    // A dead runtime means the server is tearing down
                    if let Some(runtime) = runtime.upgrade() {
                        runtime.on_deadline(&code, phase, round).await;
                    }
                }
            }
        });

        if tick {
            let events = self.events.clone();
            let code = game.code.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(1));
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                interval.tick().await;
                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = interval.tick() => {
                            let remaining = deadline
                                .saturating_duration_since(Instant::now())
                                .as_secs();
                            let _ = events.send(GameEvent::TimerTick {
                                code: code.clone(),
                                remaining,
                            });
                            if remaining == 0 {
                                break;
                            }
                        }
                    }
                }
            });
        }
    }

    /// Phase-deadline entry point. The phase/round check guards against a
    /// deadline that lost the race with an early resolution, and a vanished
    /// game is a no-op.
    async fn on_deadline(&self, code: &str, phase: GamePhase, round: u32) {
        let Some(game_lock) = self.get(code) else {
            debug!(room_code = %code, "Deadline fired for a vanished game");
            return;
        };
        let mut game = game_lock.write().await;
        if game.phase != phase || game.round != round {
            return;
        }
        debug!(room_code = %code, ?phase, round, "Phase deadline reached");

        let finished = match phase {
            GamePhase::RoleReveal => {
                self.enter_night(&mut game);
                false
            }
            GamePhase::Night => self.resolve_night_locked(&mut game),
            GamePhase::NightResult => {
                self.enter_day(&mut game);
                false
            }
            GamePhase::Day => self.resolve_day_locked(&mut game),
            GamePhase::DayResult => {
                self.enter_night(&mut game);
                false
            }
            GamePhase::GameOver => false,
        };
        drop(game);

        if finished {
            self.games.remove(code);
        }
    }

    // -- phase transitions --------------------------------------------------

    fn enter_night(&self, game: &mut GameState) {
        game.night_actions.reset();
        game.round += 1;
        game.phase = GamePhase::Night;
        let timer = game.night_timer;
        self.arm_phase(
            game,
            Duration::from_secs(timer),
            GamePhase::Night,
            game.round,
            true,
        );
        self.emit(GameEvent::PhaseChanged {
            code: game.code.clone(),
            phase: GamePhase::Night,
            round: game.round,
            timer,
        });
        self.emit_voice_routing(game);
    }

    fn enter_day(&self, game: &mut GameState) {
        game.day_votes.reset();
        game.phase = GamePhase::Day;
        // Discussion gets twice the night length and no countdown ticks
        let timer = game.night_timer * 2;
        self.arm_phase(
            game,
            Duration::from_secs(timer),
            GamePhase::Day,
            game.round,
            false,
        );
        self.emit(GameEvent::PhaseChanged {
            code: game.code.clone(),
            phase: GamePhase::Day,
            round: game.round,
            timer,
        });
        self.emit_voice_routing(game);
    }

    /// Resolve the night under the game lock. Returns true when the game
    /// finished and must be dropped from the map.
    fn resolve_night_locked(&self, game: &mut GameState) -> bool {
        game.timers.cancel();
        let outcome = game.resolve_night();

        if let Some(victim) = &outcome.killed {
            self.registry
                .set_player_status(&game.code, victim, crate::protocol::PlayerStatus::Dead);
        }

        game.phase = GamePhase::NightResult;

        let broadcast = NightResultPayload {
            killed: outcome.killed.clone(),
            killed_nickname: outcome.killed_nickname.clone(),
            was_saved: outcome.was_saved,
            investigation: None,
        };
        let detective = outcome.investigation.map(|(detective, result)| {
            let mut payload = broadcast.clone();
            payload.investigation = Some(result);
            (detective, payload)
        });
        self.emit(GameEvent::NightResult {
            code: game.code.clone(),
            broadcast,
            detective,
        });
        self.emit_voice_routing(game);

        if let Some(winner) = game.check_win() {
            self.finish_locked(game, winner);
            return true;
        }

        self.arm_phase(
            game,
            Duration::from_secs(RESULT_INTERSTITIAL_SECS),
            GamePhase::NightResult,
            game.round,
            false,
        );
        false
    }

    fn resolve_day_locked(&self, game: &mut GameState) -> bool {
        game.timers.cancel();
        let resolution = game.resolve_day();

        if let Some(victim) = &resolution.eliminated {
            self.registry
                .set_player_status(&game.code, victim, crate::protocol::PlayerStatus::Dead);
        }

        game.phase = GamePhase::DayResult;

        self.emit(GameEvent::DayResult {
            code: game.code.clone(),
            payload: DayResultPayload {
                eliminated: resolution.eliminated.clone(),
                eliminated_nickname: resolution.eliminated_nickname,
                eliminated_role: resolution.eliminated_role,
                no_majority: resolution.no_majority,
            },
        });
        self.emit_voice_routing(game);

        if let Some(winner) = game.check_win() {
            self.finish_locked(game, winner);
            return true;
        }

        self.arm_phase(
            game,
            Duration::from_secs(RESULT_INTERSTITIAL_SECS),
            GamePhase::DayResult,
            game.round,
            false,
        );
        false
    }

    fn finish_locked(&self, game: &mut GameState, winner: Team) {
        game.timers.cancel();
        game.winner = Some(winner);
        game.phase = GamePhase::GameOver;
        game.phase_deadline = None;
        self.registry.set_room_state(&game.code, RoomState::Ended);

        info!(room_code = %game.code, ?winner, round = game.round, "Game over");
        self.emit(GameEvent::GameOver {
            code: game.code.clone(),
            payload: GameOverPayload {
                winner,
                players: game.final_players(),
            },
        });
        self.emit_voice_routing(game);
    }

    // -- player input --------------------------------------------------------

    /// Record a night action; resolves the night early when the last
    /// night-capable role submits.
    pub async fn submit_night_action(
        &self,
        code: &str,
        actor: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<(), GameError> {
        let game_lock = self.get(code).ok_or(GameError::GameNotFound)?;
        let mut game = game_lock.write().await;

        let role = game.record_night_action(actor, target)?;

        if role.team() == Team::Mafia {
            self.emit(GameEvent::MafiaVote {
                code: code.to_string(),
                recipients: game.mafia_members(),
                voter: actor.clone(),
                target: target.cloned(),
            });
        }

        let finished = if game.night_complete() {
            debug!(room_code = %code, "All night actions in, resolving early");
            self.resolve_night_locked(&mut game)
        } else {
            false
        };
        drop(game);

        if finished {
            self.games.remove(code);
        }
        Ok(())
    }

    /// Record (or overwrite) a day vote; resolves early once every living
    /// player has submitted.
    pub async fn submit_day_vote(
        &self,
        code: &str,
        voter: &PlayerId,
        target: Option<&PlayerId>,
    ) -> Result<(), GameError> {
        let game_lock = self.get(code).ok_or(GameError::GameNotFound)?;
        let mut game = game_lock.write().await;

        game.record_day_vote(voter, target)?;

        let (votes, submitted) = game.day_votes.wire_view();
        self.emit(GameEvent::VoteUpdate {
            code: code.to_string(),
            votes,
            submitted,
        });

        let finished = if game.day_complete() {
            debug!(room_code = %code, "All day votes in, resolving early");
            self.resolve_day_locked(&mut game)
        } else {
            false
        };
        drop(game);

        if finished {
            self.games.remove(code);
        }
        Ok(())
    }

    /// A player's reconnect window expired mid-game: mark them dead so the
    /// game cannot deadlock waiting for a vanished player, then re-check
    /// the win condition and phase completeness.
    pub async fn handle_eviction(&self, code: &str, player_id: &PlayerId) {
        let Some(game_lock) = self.get(code) else {
            return;
        };
        let mut game = game_lock.write().await;
        if game.phase == GamePhase::GameOver || !game.is_alive(player_id) {
            return;
        }

        warn!(room_code = %code, %player_id, "Evicting vanished player from the game");
        game.kill(player_id);
        self.registry
            .set_player_status(code, player_id, crate::protocol::PlayerStatus::Dead);
        self.emit_voice_routing(&game);

        let finished = if let Some(winner) = game.check_win() {
            self.finish_locked(&mut game, winner);
            true
        } else if game.phase == GamePhase::Night && game.night_complete() {
            self.resolve_night_locked(&mut game)
        } else if game.phase == GamePhase::Day && game.day_complete() {
            self.resolve_day_locked(&mut game)
        } else {
            false
        };
        drop(game);

        if finished {
            self.games.remove(code);
        }
    }

    // -- queries -------------------------------------------------------------

    /// Phase, round, and remaining seconds; used for reconnect resync.
    pub async fn phase_snapshot(&self, code: &str) -> Option<(GamePhase, u32, u64)> {
        let game_lock = self.get(code)?;
        let game = game_lock.read().await;
        Some((game.phase, game.round, game.remaining_secs()))
    }

    /// Re-derive a player's `role_assigned` payload; used for reconnect.
    pub async fn role_payload(&self, code: &str, player_id: &PlayerId) -> Option<RoleAssignedPayload> {
        let game_lock = self.get(code)?;
        let game = game_lock.read().await;
        let role = *game.roles.get(player_id)?;
        let teammates = if role.team() == Team::Mafia {
            game.roles
                .iter()
                .filter(|(id, other)| *id != player_id && other.team() == Team::Mafia)
                .map(|(id, other)| MafiaTeammate {
                    id: id.clone(),
                    nickname: game.nickname(id),
                    role: *other,
                })
                .collect()
        } else {
            Vec::new()
        };
        Some(RoleAssignedPayload {
            role,
            team: role.team(),
            teammates,
        })
    }

    /// Current routing table for the room's game, if one is running.
    pub async fn voice_routing_snapshot(
        &self,
        code: &str,
    ) -> Option<std::collections::BTreeMap<PlayerId, crate::protocol::RouteCaps>> {
        let game_lock = self.get(code)?;
        let game = game_lock.read().await;
        let players: Vec<VoicePlayer> = game
            .voice_players()
            .into_iter()
            .map(|(id, team, is_alive)| VoicePlayer { id, team, is_alive })
            .collect();
        Some(derive_routing(voice_phase_for(game.phase), &players))
    }

    /// Drop a room's game and cancel its timers (room deletion path).
    pub async fn remove_game(&self, code: &str) {
        if let Some((_, game_lock)) = self.games.remove(code) {
            let game = game_lock.read().await;
            game.timers.cancel();
            debug!(room_code = %code, "Game removed");
        }
    }

    /// Teardown: cancel every game's timers and drop all state.
    pub async fn shutdown(&self) {
        let codes: Vec<RoomCode> = self.games.iter().map(|e| e.key().clone()).collect();
        for code in codes {
            self.remove_game(&code).await;
        }
    }
}
