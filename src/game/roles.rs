use rand::seq::SliceRandom;

use crate::protocol::{GameSettings, PlayerId, Role, MAX_PLAYERS, MIN_PLAYERS};

use super::game::GameError;

/// Validate start constraints: the pool must exactly cover the players,
/// carry at least one mafia-team role, and at most one of each unique role.
pub fn validate_settings(settings: &GameSettings, player_count: usize) -> Result<(), GameError> {
    let total = settings.total_roles();
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
        return Err(GameError::NotEnoughPlayers);
    }
    if total != player_count {
        return Err(GameError::BadRoleCounts(format!(
            "role counts sum to {total} but the room has {player_count} players"
        )));
    }
    if settings.mafia + settings.godfather < 1 {
        return Err(GameError::BadRoleCounts(
            "at least one mafia or godfather is required".into(),
        ));
    }
    if settings.godfather > 1 || settings.doctor > 1 || settings.detective > 1 {
        return Err(GameError::BadRoleCounts(
            "godfather, doctor, and detective are limited to one each".into(),
        ));
    }
    Ok(())
}

/// Build the role pool from settings and deal it uniformly over the room's
/// join order.
pub fn assign_roles(
    settings: &GameSettings,
    player_order: &[PlayerId],
) -> Vec<(PlayerId, Role)> {
    let mut pool = Vec::with_capacity(settings.total_roles());
    pool.extend(std::iter::repeat(Role::Villager).take(settings.villagers));
    pool.extend(std::iter::repeat(Role::Mafia).take(settings.mafia));
    pool.extend(std::iter::repeat(Role::Godfather).take(settings.godfather));
    pool.extend(std::iter::repeat(Role::Doctor).take(settings.doctor));
    pool.extend(std::iter::repeat(Role::Detective).take(settings.detective));

    let mut rng = rand::rng();
    pool.shuffle(&mut rng);

    player_order.iter().cloned().zip(pool).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn players(n: usize) -> Vec<PlayerId> {
        (0..n).map(|i| format!("p{i}")).collect()
    }

    #[test]
    fn validates_bounds_and_sums() {
        let settings = GameSettings::default(); // sums to 6

        assert!(validate_settings(&settings, 6).is_ok());
        assert!(matches!(
            validate_settings(&settings, 5),
            Err(GameError::BadRoleCounts(_))
        ));
        assert!(matches!(
            validate_settings(&settings, 3),
            Err(GameError::NotEnoughPlayers)
        ));
        assert!(matches!(
            validate_settings(&settings, 13),
            Err(GameError::NotEnoughPlayers)
        ));
    }

    #[test]
    fn requires_a_mafia_team() {
        let settings = GameSettings {
            villagers: 6,
            mafia: 0,
            godfather: 0,
            doctor: 0,
            detective: 0,
            night_timer: 30,
        };
        assert!(matches!(
            validate_settings(&settings, 6),
            Err(GameError::BadRoleCounts(_))
        ));
    }

    #[test]
    fn caps_unique_roles() {
        let settings = GameSettings {
            villagers: 2,
            mafia: 1,
            godfather: 2,
            doctor: 1,
            detective: 0,
            night_timer: 30,
        };
        assert!(matches!(
            validate_settings(&settings, 6),
            Err(GameError::BadRoleCounts(_))
        ));
    }

    #[test]
    fn deals_every_role_exactly_once() {
        let settings = GameSettings {
            villagers: 2,
            mafia: 1,
            godfather: 1,
            doctor: 1,
            detective: 1,
            night_timer: 30,
        };
        let order = players(6);
        let dealt = assign_roles(&settings, &order);

        assert_eq!(dealt.len(), 6);
        let mut counts: HashMap<Role, usize> = HashMap::new();
        for (_, role) in &dealt {
            *counts.entry(*role).or_default() += 1;
        }
        assert_eq!(counts[&Role::Villager], 2);
        assert_eq!(counts[&Role::Mafia], 1);
        assert_eq!(counts[&Role::Godfather], 1);
        assert_eq!(counts[&Role::Doctor], 1);
        assert_eq!(counts[&Role::Detective], 1);

        // Every player in order receives a role
        let ids: Vec<_> = dealt.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, order);
    }
}
