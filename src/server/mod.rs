// Server state, message router, and handlers

mod game_handlers;
mod room_handlers;
mod router;
mod voice_handlers;

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::game::{GameEvent, GameRuntime};
use crate::hub::Hub;
use crate::metrics::ServerMetrics;
use crate::protocol::messages::RouteCaps;
use crate::protocol::{PlayerId, RoomCode, RoomState, ServerMessage, Team};
use crate::room::RoomRegistry;
use crate::voice::{derive_routing, SfuSignaling, VoicePhase, VoicePlayer};

/// Central server state: hub, room registry, game runtime, SFU seam, and
/// metrics, wired together at startup and torn down on shutdown.
pub struct GameServer {
    pub config: Arc<AppConfig>,
    pub hub: Arc<Hub>,
    pub registry: Arc<RoomRegistry>,
    pub runtime: Arc<GameRuntime>,
    pub sfu: Arc<dyn SfuSignaling>,
    pub metrics: Arc<ServerMetrics>,
    shutdown: CancellationToken,
    /// Handle to ourselves for the timer tasks we spawn.
    weak_self: Weak<GameServer>,
}

impl GameServer {
    pub fn new(config: Arc<AppConfig>, sfu: Arc<dyn SfuSignaling>) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        let hub = Hub::new(Arc::clone(&metrics));
        let registry = Arc::new(RoomRegistry::new());

        let (events_tx, events_rx) = mpsc::unbounded_channel::<GameEvent>();
        let runtime = GameRuntime::new(Arc::clone(&registry), events_tx);

        let server = Arc::new_cyclic(|weak| Self {
            config,
            hub,
            registry,
            runtime,
            sfu,
            metrics,
            shutdown: CancellationToken::new(),
            weak_self: weak.clone(),
        });

        // Single fan-in point for game events: maps each typed event onto
        // wire messages and hub fan-out, and pushes routing to the SFU.
        let pump = Arc::clone(&server);
        tokio::spawn(async move {
            let mut events = events_rx;
            loop {
                let event = tokio::select! {
                    () = pump.shutdown.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                pump.dispatch_game_event(event).await;
            }
        });

        server
    }

    async fn dispatch_game_event(&self, event: GameEvent) {
        match event {
            GameEvent::GameStarting { code } => {
                self.metrics.increment_games_started();
                self.hub
                    .broadcast_to_room(&code, ServerMessage::GameStarting, None);
            }
            GameEvent::RoleAssigned {
                code,
                target,
                payload,
            } => {
                // Through the room loop so it lands after `game_starting`
                self.hub.broadcast_to_players(
                    &code,
                    std::slice::from_ref(&target),
                    ServerMessage::RoleAssigned(Box::new(payload)),
                );
            }
            GameEvent::PhaseChanged {
                code,
                phase,
                round,
                timer,
            } => {
                self.hub.broadcast_to_room(
                    &code,
                    ServerMessage::PhaseChanged {
                        phase,
                        round,
                        timer,
                    },
                    None,
                );
            }
            GameEvent::TimerTick { code, remaining } => {
                self.hub
                    .broadcast_to_room(&code, ServerMessage::TimerTick { remaining }, None);
            }
            GameEvent::MafiaVote {
                code,
                recipients,
                voter,
                target,
            } => {
                self.hub.broadcast_to_players(
                    &code,
                    &recipients,
                    ServerMessage::MafiaVote { voter, target },
                );
            }
            GameEvent::VoteUpdate {
                code,
                votes,
                submitted,
            } => {
                self.hub.broadcast_to_room(
                    &code,
                    ServerMessage::VoteUpdate { votes, submitted },
                    None,
                );
            }
            GameEvent::NightResult {
                code,
                broadcast,
                detective,
            } => {
                let exclude = detective.as_ref().map(|(id, _)| id.clone());
                self.hub.broadcast_to_room(
                    &code,
                    ServerMessage::NightResult(Box::new(broadcast)),
                    exclude.as_ref(),
                );
                if let Some((detective_id, targeted)) = detective {
                    self.hub.broadcast_to_players(
                        &code,
                        std::slice::from_ref(&detective_id),
                        ServerMessage::NightResult(Box::new(targeted)),
                    );
                }
            }
            GameEvent::DayResult { code, payload } => {
                self.hub.broadcast_to_room(
                    &code,
                    ServerMessage::DayResult(Box::new(payload)),
                    None,
                );
            }
            GameEvent::GameOver { code, payload } => {
                self.metrics.increment_games_completed();
                self.hub.broadcast_to_room(
                    &code,
                    ServerMessage::GameOver(Box::new(payload)),
                    None,
                );
            }
            GameEvent::VoiceRouting { code, routing } => {
                self.apply_voice_routing(&code, routing).await;
            }
        }
    }

    /// Push a routing table to the SFU and mirror it to the clients.
    pub(crate) async fn apply_voice_routing(
        &self,
        code: &RoomCode,
        routing: BTreeMap<PlayerId, RouteCaps>,
    ) {
        self.sfu.apply_voice_routing(code, &routing).await;
        self.hub
            .broadcast_to_room(code, ServerMessage::VoiceRouting { routing }, None);
    }

    /// Lobby rooms route everyone-to-everyone; recomputed when waiting-room
    /// membership changes.
    pub(crate) async fn refresh_lobby_routing(&self, code: &RoomCode) {
        let Some(room) = self.registry.get_room(code) else {
            return;
        };
        if room.state != RoomState::Waiting {
            return;
        }
        let players: Vec<VoicePlayer> = room
            .player_order
            .iter()
            .map(|id| VoicePlayer::new(id.clone(), Team::Town, true))
            .collect();
        let routing = derive_routing(VoicePhase::Lobby, &players);
        self.apply_voice_routing(code, routing).await;
    }

    /// Routing table for a room in any state.
    pub(crate) async fn current_routing(
        &self,
        code: &RoomCode,
    ) -> Option<BTreeMap<PlayerId, RouteCaps>> {
        if let Some(routing) = self.runtime.voice_routing_snapshot(code).await {
            return Some(routing);
        }
        let room = self.registry.get_room(code)?;
        let players: Vec<VoicePlayer> = room
            .player_order
            .iter()
            .map(|id| VoicePlayer::new(id.clone(), Team::Town, true))
            .collect();
        Some(derive_routing(VoicePhase::Lobby, &players))
    }

    /// Arm the empty-room deletion timer.
    pub(crate) fn arm_empty_room_ttl(&self, code: &RoomCode) {
        let token = self.registry.arm_empty_ttl(code);
        let registry = Arc::clone(&self.registry);
        let runtime = Arc::clone(&self.runtime);
        let code = code.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(crate::room::EMPTY_ROOM_TTL) => {
                    if registry.expire_if_empty(&code) {
                        runtime.remove_game(&code).await;
                    }
                }
            }
        });
    }

    /// Arm the 60-second reconnect window for a freshly disconnected
    /// player. Expiry evicts them from the room and, mid-game, kills them.
    pub(crate) fn arm_reconnect_window(&self, entry: crate::room::DisconnectedPlayer) {
        let server = self.weak_self.clone();
        let token = entry.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(crate::room::RECONNECT_WINDOW) => {
                    let Some(server) = server.upgrade() else {
                        return;
                    };
                    // The map lookup guards a double fire racing a reconnect
                    if let Some(code) = server.registry.expire_disconnected(&entry.player_id) {
                        server.evict_player(&code, &entry.player_id).await;
                    }
                }
            }
        });
    }

    /// Remove a player from their room with full fan-out: `player_left`
    /// (with host succession), TTL arming, and mid-game eviction.
    pub(crate) async fn evict_player(&self, code: &RoomCode, player_id: &PlayerId) {
        let Ok((_, new_host, now_empty)) = self.registry.leave_room(code, player_id) else {
            return;
        };
        self.hub.leave_room(player_id);

        self.hub.broadcast_to_room(
            code,
            ServerMessage::PlayerLeft {
                player_id: player_id.clone(),
                new_host,
            },
            Some(player_id),
        );

        self.runtime.handle_eviction(code, player_id).await;

        if now_empty {
            self.arm_empty_room_ttl(code);
        } else {
            self.refresh_lobby_routing(code).await;
        }
    }

    /// Graceful teardown: cancels all timers and closes all connections.
    pub async fn shutdown(&self) {
        info!("Server shutting down, cancelling timers and closing connections");
        self.shutdown.cancel();
        self.runtime.shutdown().await;
        self.registry.cancel_all_timers();
        self.hub.close_all();
    }
}
