mod common;

use common::{connect_many, find_role, learn_roles, ready_all, setup_room, test_server};
use mafia_server::protocol::{GamePhase, Role, ServerMessage, Team};

/// Drive a room of `n` clients into a started game and return its code.
macro_rules! start_game {
    ($server:expr, $clients:expr, $settings:expr) => {{
        let mut refs: Vec<&mut common::TestClient> = $clients.iter_mut().collect();
        let (host, rest) = refs.split_first_mut().unwrap();
        let code = setup_room($server, host, rest).await;

        if let Some(settings) = $settings {
            host.send($server, "update_settings", serde_json::json!({ "settings": settings }))
                .await;
        }

        ready_all($server, &mut refs).await;
        refs[0].send($server, "start_game", serde_json::json!({})).await;
        for client in refs.iter_mut() {
            client
                .recv_until(|msg| matches!(msg, ServerMessage::GameStarting))
                .await;
        }
        code
    }};
}

async fn await_phase(client: &mut common::TestClient, phase: GamePhase) -> (u32, u64) {
    let msg = client
        .recv_until(|m| matches!(m, ServerMessage::PhaseChanged { phase: p, .. } if *p == phase))
        .await;
    match &*msg {
        ServerMessage::PhaseChanged { round, timer, .. } => (*round, *timer),
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn grace_first_night_kills_nobody() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    start_game!(&server, clients, None::<serde_json::Value>);

    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let roles = learn_roles(&mut refs).await;
    let mafia = find_role(&roles, Role::Mafia).unwrap();
    let doctor = find_role(&roles, Role::Doctor).unwrap();
    let detective = find_role(&roles, Role::Detective).unwrap();
    let villagers: Vec<String> = roles
        .iter()
        .filter(|(_, (r, _))| *r == Role::Villager)
        .map(|(id, _)| id.clone())
        .collect();

    for client in refs.iter_mut() {
        let (round, timer) = await_phase(client, GamePhase::Night).await;
        assert_eq!(round, 1);
        assert_eq!(timer, 30);
    }

    // Mafia picks a victim, doctor protects someone else
    let victim = villagers[0].clone();
    let protected = villagers[1].clone();
    for client in refs.iter_mut() {
        if client.id == mafia {
            client
                .send(&server, "night_action", serde_json::json!({ "target": victim }))
                .await;
        } else if client.id == doctor {
            client
                .send(&server, "night_action", serde_json::json!({ "target": protected }))
                .await;
        } else if client.id == detective {
            client
                .send(&server, "night_action", serde_json::json!({ "target": mafia }))
                .await;
        }
    }

    for client in refs.iter_mut() {
        let result = client
            .recv_until(|m| matches!(m, ServerMessage::NightResult(_)))
            .await;
        let ServerMessage::NightResult(payload) = &*result else {
            unreachable!()
        };
        assert_eq!(payload.killed, None);
        assert!(!payload.was_saved);
        if client.id == detective {
            let investigation = payload.investigation.as_ref().unwrap();
            assert_eq!(investigation.target, mafia);
            assert!(investigation.is_mafia);
        } else {
            assert!(payload.investigation.is_none());
        }
    }

    // Phase advances to day with twice the night timer
    let (round, timer) = await_phase(&mut *refs[0], GamePhase::Day).await;
    assert_eq!(round, 1);
    assert_eq!(timer, 60);
}

#[tokio::test(start_paused = true)]
async fn godfather_override_wins_the_vote() {
    let server = test_server();
    let mut clients = connect_many(&server, 7).await;
    start_game!(
        &server,
        clients,
        Some(serde_json::json!({
            "villagers": 3, "mafia": 1, "godfather": 1,
            "doctor": 1, "detective": 1, "night_timer": 30,
        }))
    );

    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let roles = learn_roles(&mut refs).await;
    let mafia = find_role(&roles, Role::Mafia).unwrap();
    let godfather = find_role(&roles, Role::Godfather).unwrap();
    let doctor = find_role(&roles, Role::Doctor).unwrap();
    let detective = find_role(&roles, Role::Detective).unwrap();
    let villagers: Vec<String> = roles
        .iter()
        .filter(|(_, (r, _))| *r == Role::Villager)
        .map(|(id, _)| id.clone())
        .collect();

    // Night 1 is the grace round: everyone skips, detective checks the
    // godfather and must be told they look innocent
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Night).await;
        if client.id == detective {
            client
                .send(&server, "night_action", serde_json::json!({ "target": godfather }))
                .await;
        } else if roles[&client.id].0.can_act_at_night() {
            client
                .send(&server, "night_action", serde_json::json!({}))
                .await;
        }
    }
    for client in refs.iter_mut() {
        let result = client
            .recv_until(|m| matches!(m, ServerMessage::NightResult(_)))
            .await;
        let ServerMessage::NightResult(payload) = &*result else {
            unreachable!()
        };
        if client.id == detective {
            let investigation = payload.investigation.as_ref().unwrap();
            assert_eq!(investigation.target, godfather);
            assert!(!investigation.is_mafia, "godfather must read as innocent");
        }
    }

    // Hung day vote: everyone abstains
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Day).await;
        client.send(&server, "day_vote", serde_json::json!({})).await;
    }
    for client in refs.iter_mut() {
        let result = client
            .recv_until(|m| matches!(m, ServerMessage::DayResult(_)))
            .await;
        let ServerMessage::DayResult(payload) = &*result else {
            unreachable!()
        };
        assert!(payload.no_majority);
        assert_eq!(payload.eliminated, None);
    }

    // Night 2: the godfather's pick beats the mafia's, and the doctor's
    // protection of the mafia's pick is irrelevant
    let mafia_pick = villagers[0].clone();
    let godfather_pick = villagers[1].clone();
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Night).await;
        if client.id == mafia {
            client
                .send(&server, "night_action", serde_json::json!({ "target": mafia_pick }))
                .await;
        } else if client.id == godfather {
            client
                .send(&server, "night_action", serde_json::json!({ "target": godfather_pick }))
                .await;
        } else if client.id == doctor {
            client
                .send(&server, "night_action", serde_json::json!({ "target": mafia_pick }))
                .await;
        } else if client.id == detective {
            client.send(&server, "night_action", serde_json::json!({})).await;
        }
    }

    for client in refs.iter_mut() {
        let result = client
            .recv_until(|m| matches!(m, ServerMessage::NightResult(_)))
            .await;
        let ServerMessage::NightResult(payload) = &*result else {
            unreachable!()
        };
        assert_eq!(payload.killed.as_deref(), Some(godfather_pick.as_str()));
        assert!(!payload.was_saved);
    }
}

#[tokio::test(start_paused = true)]
async fn majority_vote_eliminates_and_reveals() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    start_game!(&server, clients, None::<serde_json::Value>);

    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let roles = learn_roles(&mut refs).await;
    let villagers: Vec<String> = roles
        .iter()
        .filter(|(_, (r, _))| *r == Role::Villager)
        .map(|(id, _)| id.clone())
        .collect();
    let target = villagers[0].clone();

    // Grace night, everyone skips
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Night).await;
        if roles[&client.id].0.can_act_at_night() {
            client.send(&server, "night_action", serde_json::json!({})).await;
        }
    }

    // Day: threshold is 4 of 6; four players gang up on one villager
    let voters: Vec<String> = roles
        .keys()
        .filter(|id| **id != target)
        .take(4)
        .cloned()
        .collect();
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Day).await;
    }
    for client in refs.iter_mut() {
        if voters.contains(&client.id) {
            client
                .send(&server, "day_vote", serde_json::json!({ "target": target }))
                .await;
        } else {
            client.send(&server, "day_vote", serde_json::json!({})).await;
        }
    }

    // Everyone watched the votes accumulate
    let update = refs[0]
        .recv_until(|m| {
            matches!(m, ServerMessage::VoteUpdate { submitted, .. } if submitted.len() == 6)
        })
        .await;
    let ServerMessage::VoteUpdate { votes, .. } = &*update else {
        unreachable!()
    };
    assert_eq!(votes.len(), 4);
    assert!(votes.values().all(|t| *t == target));

    for client in refs.iter_mut() {
        let result = client
            .recv_until(|m| matches!(m, ServerMessage::DayResult(_)))
            .await;
        let ServerMessage::DayResult(payload) = &*result else {
            unreachable!()
        };
        assert_eq!(payload.eliminated.as_deref(), Some(target.as_str()));
        assert_eq!(payload.eliminated_role, Some(Role::Villager));
        assert!(!payload.no_majority);
    }
}

#[tokio::test(start_paused = true)]
async fn town_wins_when_the_mafia_hangs() {
    let server = test_server();
    let mut clients = connect_many(&server, 4).await;
    start_game!(
        &server,
        clients,
        Some(serde_json::json!({
            "villagers": 2, "mafia": 1, "godfather": 0,
            "doctor": 1, "detective": 0, "night_timer": 30,
        }))
    );

    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let roles = learn_roles(&mut refs).await;
    let mafia = find_role(&roles, Role::Mafia).unwrap();

    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Night).await;
        if roles[&client.id].0.can_act_at_night() {
            client.send(&server, "night_action", serde_json::json!({})).await;
        }
    }

    // Threshold 3 of 4: the three town players hang the mafia
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Day).await;
        if client.id == mafia {
            client.send(&server, "day_vote", serde_json::json!({})).await;
        } else {
            client
                .send(&server, "day_vote", serde_json::json!({ "target": mafia }))
                .await;
        }
    }

    for client in refs.iter_mut() {
        let over = client
            .recv_until(|m| matches!(m, ServerMessage::GameOver(_)))
            .await;
        let ServerMessage::GameOver(payload) = &*over else {
            unreachable!()
        };
        assert_eq!(payload.winner, Team::Town);
        assert_eq!(payload.players.len(), 4);
        // Roles are revealed to everyone at the end
        assert!(payload.players.iter().any(|p| p.role == Role::Mafia));
    }
}

#[tokio::test(start_paused = true)]
async fn mafia_wins_at_parity() {
    let server = test_server();
    let mut clients = connect_many(&server, 4).await;
    start_game!(
        &server,
        clients,
        Some(serde_json::json!({
            "villagers": 3, "mafia": 1, "godfather": 0,
            "doctor": 0, "detective": 0, "night_timer": 30,
        }))
    );

    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let roles = learn_roles(&mut refs).await;
    let mafia = find_role(&roles, Role::Mafia).unwrap();
    let villagers: Vec<String> = roles
        .iter()
        .filter(|(_, (r, _))| *r == Role::Villager)
        .map(|(id, _)| id.clone())
        .collect();

    // Grace night: only the mafia acts, so one submission resolves it
    for client in refs.iter_mut() {
        await_phase(client, GamePhase::Night).await;
        if client.id == mafia {
            client.send(&server, "night_action", serde_json::json!({})).await;
        }
    }

    // Hung day, then the mafia kills a villager each night
    let mut expected_alive = 4;
    for night in 0..2 {
        for client in refs.iter_mut() {
            await_phase(client, GamePhase::Day).await;
            // Dead players cannot vote
            if !villagers[..night].contains(&client.id) {
                client.send(&server, "day_vote", serde_json::json!({})).await;
            }
        }
        for client in refs.iter_mut() {
            client
                .recv_until(|m| matches!(m, ServerMessage::DayResult(_)))
                .await;
        }

        let victim = villagers[night].clone();
        for client in refs.iter_mut() {
            let dead_so_far = &villagers[..night];
            if dead_so_far.contains(&client.id) {
                continue;
            }
            await_phase(client, GamePhase::Night).await;
            if client.id == mafia {
                client
                    .send(&server, "night_action", serde_json::json!({ "target": victim }))
                    .await;
            }
        }
        expected_alive -= 1;

        if expected_alive > 2 {
            for client in refs.iter_mut() {
                let result = client
                    .recv_until(|m| matches!(m, ServerMessage::NightResult(_)))
                    .await;
                let ServerMessage::NightResult(payload) = &*result else {
                    unreachable!()
                };
                assert_eq!(payload.killed.as_deref(), Some(victim.as_str()));
            }
        }
    }

    // Two alive, one of them mafia: parity
    let over = refs[0]
        .recv_until(|m| matches!(m, ServerMessage::GameOver(_)))
        .await;
    let ServerMessage::GameOver(payload) = &*over else {
        unreachable!()
    };
    assert_eq!(payload.winner, Team::Mafia);
}

#[tokio::test(start_paused = true)]
async fn night_timer_ticks_reach_clients() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    start_game!(&server, clients, None::<serde_json::Value>);

    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    learn_roles(&mut refs).await;
    await_phase(&mut *refs[0], GamePhase::Night).await;

    let tick = refs[0]
        .recv_until(|m| matches!(m, ServerMessage::TimerTick { .. }))
        .await;
    let ServerMessage::TimerTick { remaining } = &*tick else {
        unreachable!()
    };
    assert!(*remaining <= 30);
}

#[tokio::test(start_paused = true)]
async fn start_game_preconditions() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let (host, rest) = refs.split_first_mut().unwrap();
    setup_room(&server, host, rest).await;

    // Not everyone is ready yet
    refs[0].send(&server, "start_game", serde_json::json!({})).await;
    let err = refs[0]
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, mafia_server::protocol::ErrorCode::NotAllReady);

    ready_all(&server, &mut refs).await;

    // Only the host may start
    refs[1].send(&server, "start_game", serde_json::json!({})).await;
    let err = refs[1]
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, mafia_server::protocol::ErrorCode::NotHost);
}
