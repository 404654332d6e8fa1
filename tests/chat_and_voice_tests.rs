mod common;

use common::{connect, connect_many, learn_roles, ready_all, setup_room, test_server};
use mafia_server::protocol::{ErrorCode, GamePhase, Role, ServerMessage};

#[tokio::test(start_paused = true)]
async fn ghost_chat_is_dead_only() {
    let server = test_server();
    let mut clients = connect_many(&server, 6).await;
    let mut refs: Vec<&mut common::TestClient> = clients.iter_mut().collect();
    let (host, rest) = refs.split_first_mut().unwrap();
    setup_room(&server, host, rest).await;
    ready_all(&server, &mut refs).await;
    refs[0].send(&server, "start_game", serde_json::json!({})).await;
    let roles = learn_roles(&mut refs).await;

    // Alive players cannot use the channel
    refs[0]
        .send(&server, "ghost_chat", serde_json::json!({ "message": "boo" }))
        .await;
    let err = refs[0]
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, ErrorCode::NotDead);

    // Hang a villager through the grace night and a majority vote
    let victim = roles
        .iter()
        .find(|(_, (r, _))| *r == Role::Villager)
        .map(|(id, _)| id.clone())
        .unwrap();
    for client in refs.iter_mut() {
        client
            .recv_until(|m| {
                matches!(m, ServerMessage::PhaseChanged { phase, .. } if *phase == GamePhase::Night)
            })
            .await;
        if roles[&client.id].0.can_act_at_night() {
            client.send(&server, "night_action", serde_json::json!({})).await;
        }
    }
    for client in refs.iter_mut() {
        client
            .recv_until(|m| {
                matches!(m, ServerMessage::PhaseChanged { phase, .. } if *phase == GamePhase::Day)
            })
            .await;
        if client.id == victim {
            client.send(&server, "day_vote", serde_json::json!({})).await;
        } else {
            client
                .send(&server, "day_vote", serde_json::json!({ "target": victim }))
                .await;
        }
    }
    for client in refs.iter_mut() {
        client
            .recv_until(|m| matches!(m, ServerMessage::DayResult(_)))
            .await;
    }

    // The dead villager haunts the dead-only channel
    for client in refs.iter_mut() {
        if client.id == victim {
            client
                .send(&server, "ghost_chat", serde_json::json!({ "message": "it was p2!" }))
                .await;
        }
    }
    for client in refs.iter_mut() {
        if client.id == victim {
            let chat = client
                .recv_until(|m| matches!(m, ServerMessage::GhostChatBroadcast { .. }))
                .await;
            let ServerMessage::GhostChatBroadcast { player_id, message, .. } = &*chat else {
                unreachable!()
            };
            assert_eq!(player_id, &victim);
            assert_eq!(message, "it was p2!");
        }
    }

    // Empty messages are rejected
    for client in refs.iter_mut() {
        if client.id == victim {
            client
                .send(&server, "ghost_chat", serde_json::json!({ "message": "   " }))
                .await;
            let err = client
                .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
                .await;
            let ServerMessage::Error { code, .. } = &*err else {
                unreachable!()
            };
            assert_eq!(*code, ErrorCode::InvalidMessage);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn voice_join_and_routing_fanout() {
    let server = test_server();
    let mut p1 = connect(&server, "p1").await;
    let mut p2 = connect(&server, "p2").await;
    setup_room(&server, &mut p1, &mut [&mut p2]).await;

    p2.send(&server, "voice_join", serde_json::json!({})).await;

    for client in [&mut p1, &mut p2] {
        let joined = client
            .recv_until(|m| matches!(m, ServerMessage::VoiceJoined { .. }))
            .await;
        let ServerMessage::VoiceJoined { player_id } = &*joined else {
            unreachable!()
        };
        assert_eq!(player_id, "p2");

        // Lobby routing: everyone speaks and hears everyone else
        let routing = client
            .recv_until(|m| matches!(m, ServerMessage::VoiceRouting { .. }))
            .await;
        let ServerMessage::VoiceRouting { routing } = &*routing else {
            unreachable!()
        };
        assert!(routing["p1"].can_speak);
        assert_eq!(routing["p1"].can_hear, vec!["p2".to_string()]);
        assert_eq!(routing["p2"].can_hear, vec!["p1".to_string()]);
    }
}

#[tokio::test(start_paused = true)]
async fn voice_offer_without_media_plane_is_unavailable() {
    let server = test_server();
    let mut p1 = connect(&server, "p1").await;
    setup_room(&server, &mut p1, &mut []).await;

    p1.send(
        &server,
        "voice_offer",
        serde_json::json!({ "sdp": "v=0 o=- fake" }),
    )
    .await;
    let err = p1
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, ErrorCode::VoiceUnavailable);
}

#[tokio::test(start_paused = true)]
async fn speaking_state_excludes_the_sender() {
    let server = test_server();
    let mut p1 = connect(&server, "p1").await;
    let mut p2 = connect(&server, "p2").await;
    setup_room(&server, &mut p1, &mut [&mut p2]).await;

    p1.send(&server, "speaking_state", serde_json::json!({ "speaking": true }))
        .await;

    let speaking = p2
        .recv_until(|m| matches!(m, ServerMessage::SpeakingState { .. }))
        .await;
    let ServerMessage::SpeakingState { player_id, speaking } = &*speaking else {
        unreachable!()
    };
    assert_eq!(player_id, "p1");
    assert!(*speaking);

    // Sender never sees their own echo
    let leftovers = p1.drain_now();
    assert!(leftovers
        .iter()
        .all(|m| !matches!(&**m, ServerMessage::SpeakingState { .. })));
}

#[tokio::test(start_paused = true)]
async fn voice_requires_a_room() {
    let server = test_server();
    let mut loner = connect(&server, "p1").await;

    loner.send(&server, "voice_join", serde_json::json!({})).await;
    let err = loner
        .recv_until(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    let ServerMessage::Error { code, .. } = &*err else {
        unreachable!()
    };
    assert_eq!(*code, ErrorCode::NotInRoom);
}
