use std::collections::BTreeMap;

use crate::protocol::messages::RouteCaps;
use crate::protocol::{GamePhase, PlayerId, Team};

/// Voice phases collapse the game's interstitial phases onto the four
/// routing-relevant states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoicePhase {
    Lobby,
    Night,
    Day,
    GameOver,
}

/// The role-reveal silence routes like night; result interstitials route
/// like the day discussion they precede or follow.
pub fn voice_phase_for(phase: GamePhase) -> VoicePhase {
    match phase {
        GamePhase::RoleReveal | GamePhase::Night => VoicePhase::Night,
        GamePhase::NightResult | GamePhase::Day | GamePhase::DayResult => VoicePhase::Day,
        GamePhase::GameOver => VoicePhase::GameOver,
    }
}

/// Per-player inputs to the routing table.
#[derive(Debug, Clone)]
pub struct VoicePlayer {
    pub id: PlayerId,
    pub team: Team,
    pub is_alive: bool,
}

impl VoicePlayer {
    pub fn new(id: impl Into<PlayerId>, team: Team, is_alive: bool) -> Self {
        Self {
            id: id.into(),
            team,
            is_alive,
        }
    }
}

/// Pure derivation of per-player speak/hear capabilities.
///
/// | Phase     | Alive town        | Alive mafia             | Dead              |
/// |-----------|-------------------|-------------------------|-------------------|
/// | lobby     | speak, hear all   | speak, hear all         | n/a               |
/// | night     | muted, hear none  | speak, hear alive mafia | muted, hear none  |
/// | day       | speak, hear alive | speak, hear alive       | muted, hear alive |
/// | game_over | speak, hear all   | speak, hear all         | speak, hear all   |
pub fn derive_routing(
    phase: VoicePhase,
    players: &[VoicePlayer],
) -> BTreeMap<PlayerId, RouteCaps> {
    let everyone: Vec<PlayerId> = players.iter().map(|p| p.id.clone()).collect();
    let alive: Vec<PlayerId> = players
        .iter()
        .filter(|p| p.is_alive)
        .map(|p| p.id.clone())
        .collect();
    let alive_mafia: Vec<PlayerId> = players
        .iter()
        .filter(|p| p.is_alive && p.team == Team::Mafia)
        .map(|p| p.id.clone())
        .collect();

    players
        .iter()
        .map(|player| {
            let caps = match phase {
                VoicePhase::Lobby | VoicePhase::GameOver => RouteCaps {
                    can_speak: true,
                    can_hear: hear_others(&everyone, &player.id),
                },
                VoicePhase::Night => {
                    if player.is_alive && player.team == Team::Mafia {
                        RouteCaps {
                            can_speak: true,
                            can_hear: hear_others(&alive_mafia, &player.id),
                        }
                    } else {
                        RouteCaps {
                            can_speak: false,
                            can_hear: Vec::new(),
                        }
                    }
                }
                VoicePhase::Day => RouteCaps {
                    can_speak: player.is_alive,
                    can_hear: hear_others(&alive, &player.id),
                },
            };
            (player.id.clone(), caps)
        })
        .collect()
}

fn hear_others(ids: &[PlayerId], own: &PlayerId) -> Vec<PlayerId> {
    ids.iter().filter(|id| *id != own).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<VoicePlayer> {
        vec![
            VoicePlayer::new("t1", Team::Town, true),
            VoicePlayer::new("t2", Team::Town, true),
            VoicePlayer::new("m1", Team::Mafia, true),
            VoicePlayer::new("m2", Team::Mafia, true),
            VoicePlayer::new("dead_t", Team::Town, false),
            VoicePlayer::new("dead_m", Team::Mafia, false),
        ]
    }

    #[test]
    fn lobby_routes_everyone_to_everyone() {
        let routing = derive_routing(VoicePhase::Lobby, &players());
        for (id, caps) in &routing {
            assert!(caps.can_speak);
            assert_eq!(caps.can_hear.len(), 5);
            assert!(!caps.can_hear.contains(id));
        }
    }

    #[test]
    fn night_isolates_the_mafia_channel() {
        let routing = derive_routing(VoicePhase::Night, &players());

        // Alive mafia talk among themselves
        assert!(routing["m1"].can_speak);
        assert_eq!(routing["m1"].can_hear, vec!["m2".to_string()]);
        assert!(routing["m2"].can_speak);
        assert_eq!(routing["m2"].can_hear, vec!["m1".to_string()]);

        // Town and the dead hear silence
        for id in ["t1", "t2", "dead_t", "dead_m"] {
            assert!(!routing[id].can_speak);
            assert!(routing[id].can_hear.is_empty());
        }
    }

    #[test]
    fn day_mutes_the_dead_but_lets_them_listen() {
        let routing = derive_routing(VoicePhase::Day, &players());

        for id in ["t1", "t2", "m1", "m2"] {
            assert!(routing[id].can_speak);
            assert_eq!(routing[id].can_hear.len(), 3);
        }

        assert!(!routing["dead_t"].can_speak);
        assert_eq!(routing["dead_t"].can_hear.len(), 4);
        assert!(!routing["dead_m"].can_speak);
    }

    #[test]
    fn game_over_opens_every_channel() {
        let routing = derive_routing(VoicePhase::GameOver, &players());
        for (_, caps) in &routing {
            assert!(caps.can_speak);
            assert_eq!(caps.can_hear.len(), 5);
        }
    }

    #[test]
    fn interstitial_phases_collapse_onto_voice_phases() {
        assert_eq!(voice_phase_for(GamePhase::RoleReveal), VoicePhase::Night);
        assert_eq!(voice_phase_for(GamePhase::Night), VoicePhase::Night);
        assert_eq!(voice_phase_for(GamePhase::NightResult), VoicePhase::Day);
        assert_eq!(voice_phase_for(GamePhase::Day), VoicePhase::Day);
        assert_eq!(voice_phase_for(GamePhase::DayResult), VoicePhase::Day);
        assert_eq!(voice_phase_for(GamePhase::GameOver), VoicePhase::GameOver);
    }

    #[test]
    fn routing_covers_every_player_exactly_once() {
        let input = players();
        let routing = derive_routing(VoicePhase::Day, &input);
        assert_eq!(routing.len(), input.len());
        for player in &input {
            assert!(routing.contains_key(&player.id));
        }
    }
}
