mod common;

use std::time::Duration;

use common::{connect, connect_many, learn_roles, ready_all, setup_room, test_server};
use mafia_server::protocol::{ErrorCode, GamePhase, ServerMessage};

/// Bring six players into a running game and through the grace night into
/// the first day.
async fn game_in_day(
    server: &std::sync::Arc<mafia_server::server::GameServer>,
    clients: &mut Vec<common::TestClient>,
) -> std::collections::HashMap<String, (mafia_server::protocol::Role, mafia_server::protocol::Team)>
{
    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let (host, rest) = refs.split_first_mut().unwrap();
    setup_room(server, host, rest).await;
    ready_all(server, &mut refs).await;
    refs[0].send(server, "start_game", serde_json::json!({})).await;

    let roles = learn_roles(&mut refs).await;

    for client in refs.iter_mut() {
        client
            .recv_until(|m| {
                matches!(m, ServerMessage::PhaseChanged { phase, .. } if *phase == GamePhase::Night)
            })
            .await;
        if roles[&client.id].0.can_act_at_night() {
            client.send(server, "night_action", serde_json::json!({})).await;
        }
    }
    for client in refs.iter_mut() {
        client
            .recv_until(|m| {
                matches!(m, ServerMessage::PhaseChanged { phase, .. } if *phase == GamePhase::Day)
            })
            .await;
    }
    roles
}

#[tokio::test(start_paused = true)]
async fn reconnect_within_window_restores_role_and_phase() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    let roles = game_in_day(&server, &mut clients).await;
    let original_role = roles["p3"].0;

    // p3 drops mid-day
    server.handle_disconnect(&"p3".to_string()).await;

    let disconnected = clients[0]
        .recv_until(|m| matches!(m, ServerMessage::PlayerDisconnected { .. }))
        .await;
    let ServerMessage::PlayerDisconnected { player_id } = &*disconnected else {
        unreachable!()
    };
    assert_eq!(player_id, "p3");

    // A fresh connection reclaims the identity
    let mut fresh = connect(&server, "fresh1").await;
    fresh
        .send(&server, "reconnect", serde_json::json!({ "player_id": "p3" }))
        .await;
    assert_eq!(fresh.id, "p3");

    let state = fresh
        .recv_until(|m| matches!(m, ServerMessage::RoomState(_)))
        .await;
    let ServerMessage::RoomState(state) = &*state else {
        unreachable!()
    };
    let me = state.players.iter().find(|p| p.id == "p3").unwrap();
    assert!(me.is_connected);
    assert!(!me.is_host);

    let role = fresh
        .recv_until(|m| matches!(m, ServerMessage::RoleAssigned(_)))
        .await;
    let ServerMessage::RoleAssigned(payload) = &*role else {
        unreachable!()
    };
    assert_eq!(payload.role, original_role);

    let phase = fresh
        .recv_until(|m| matches!(m, ServerMessage::PhaseChanged { .. }))
        .await;
    let ServerMessage::PhaseChanged { phase, timer, .. } = &*phase else {
        unreachable!()
    };
    assert_eq!(*phase, GamePhase::Day);
    assert!(*timer <= 60);

    // Everyone else hears about the return; no host change happened
    let reconnected = clients[0]
        .recv_until(|m| matches!(m, ServerMessage::PlayerReconnected { .. }))
        .await;
    let ServerMessage::PlayerReconnected { player_id } = &*reconnected else {
        unreachable!()
    };
    assert_eq!(player_id, "p3");
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_window_fails_and_player_is_evicted() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    game_in_day(&server, &mut clients).await;

    server.handle_disconnect(&"p3".to_string()).await;
    clients[0]
        .recv_until(|m| matches!(m, ServerMessage::PlayerDisconnected { .. }))
        .await;

    // Let the 60-second window lapse
    tokio::time::sleep(Duration::from_secs(61)).await;

    let left = clients[0]
        .recv_until(|m| matches!(m, ServerMessage::PlayerLeft { .. }))
        .await;
    let ServerMessage::PlayerLeft { player_id, .. } = &*left else {
        unreachable!()
    };
    assert_eq!(player_id, "p3");

    let mut late = connect(&server, "fresh1").await;
    late.send(&server, "reconnect", serde_json::json!({ "player_id": "p3" }))
        .await;
    assert_eq!(late.id, "fresh1", "identity must not transfer after expiry");

    let err = late
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, ErrorCode::ReconnectFailed);
}

#[tokio::test(start_paused = true)]
async fn disconnect_in_waiting_room_evicts_immediately() {
    let server = test_server();
    let mut p1 = connect(&server, "p1").await;
    let mut p2 = connect(&server, "p2").await;
    setup_room(&server, &mut p1, &mut [&mut p2]).await;

    server.handle_disconnect(&"p2".to_string()).await;

    // No reconnect window outside a running game
    let left = p1
        .recv_until(|m| matches!(m, ServerMessage::PlayerLeft { .. }))
        .await;
    let ServerMessage::PlayerLeft { player_id, .. } = &*left else {
        unreachable!()
    };
    assert_eq!(player_id, "p2");

    let mut fresh = connect(&server, "fresh1").await;
    fresh
        .send(&server, "reconnect", serde_json::json!({ "player_id": "p2" }))
        .await;
    let err = fresh
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, ErrorCode::ReconnectFailed);
}
