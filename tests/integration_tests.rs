//! End-to-end pairing flows against the in-process server.


use pairlink_server::config::MatchingConfig;
use pairlink_server::protocol::{
    ChatMode, ClientMessage, RegisterPayload, ServerMessage, TeardownReason,
};
use pairlink_server::server::{ServerConfig, SessionStatus};
use test_helpers::*;
use tokio::time::Duration;

#[tokio::test]
async fn full_text_chat_session() {
    let server = create_test_server();
    let (a, mut rx_a) = connect_peer(&server);
    let (b, mut rx_b) = connect_peer(&server);

    register_peer(&server, a, "ana", 25, &["music", "travel"]).await;
    register_peer(&server, b, "ben", 27, &["music"]).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    server
        .handle_client_message(&b, ClientMessage::Search { mode: None })
        .await;

    // Both sides see the same room and a compatibility at or above the
    // text threshold, with the shared interest listed.
    let matched_a = wait_for(&mut rx_a, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::Matched(_))
    })
    .await;
    let matched_b = wait_for(&mut rx_b, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::Matched(_))
    })
    .await;

    let (ServerMessage::Matched(payload_a), ServerMessage::Matched(payload_b)) =
        (&*matched_a, &*matched_b)
    else {
        panic!("expected matched payloads");
    };
    assert_eq!(payload_a.room_id, payload_b.room_id);
    assert!(payload_a.compatibility >= 65.0);
    assert_eq!(payload_a.shared_interests, vec!["music"]);
    assert_eq!(payload_a.match_mode, ChatMode::Text);

    // Chat both ways, in order
    for text in ["hello", "how are you"] {
        server
            .handle_client_message(
                &a,
                ClientMessage::Message {
                    text: text.to_string(),
                },
            )
            .await;
    }
    let first = wait_for(&mut rx_b, Duration::from_secs(1), |m| {
        matches!(m, ServerMessage::Message(_))
    })
    .await;
    let second = wait_for(&mut rx_b, Duration::from_secs(1), |m| {
        matches!(m, ServerMessage::Message(_))
    })
    .await;
    let (ServerMessage::Message(first), ServerMessage::Message(second)) = (&*first, &*second)
    else {
        panic!("expected messages");
    };
    assert_eq!(first.text, "hello");
    assert_eq!(second.text, "how are you");

    // Clean manual disconnect
    server
        .handle_client_message(&a, ClientMessage::DisconnectPartner { reason: None })
        .await;
    wait_for(&mut rx_b, Duration::from_secs(1), |m| {
        matches!(
            m,
            ServerMessage::PartnerDisconnected {
                reason: TeardownReason::ManualDisconnect
            }
        )
    })
    .await;
    assert_eq!(server.session_status(&a).await, Some(SessionStatus::Ready));
    assert_eq!(server.session_status(&b).await, Some(SessionStatus::Ready));
}

#[tokio::test]
async fn video_pair_gets_call_bootstrap() {
    let server = create_test_server();
    let (a, mut rx_a) = connect_peer(&server);
    let (b, mut rx_b) = connect_peer(&server);

    register_peer(&server, a, "ana", 25, &["music", "travel"]).await;
    register_peer(&server, b, "ben", 26, &["music", "travel"]).await;

    server
        .handle_client_message(
            &a,
            ClientMessage::Search {
                mode: Some(ChatMode::Video),
            },
        )
        .await;
    server
        .handle_client_message(
            &b,
            ClientMessage::Search {
                mode: Some(ChatMode::Video),
            },
        )
        .await;

    for rx in [&mut rx_a, &mut rx_b] {
        let ready = wait_for(rx, Duration::from_secs(2), |m| {
            matches!(m, ServerMessage::VideoMatchReady { .. })
        })
        .await;
        let ServerMessage::VideoMatchReady { room_id, .. } = &*ready else {
            panic!("expected video-match-ready");
        };
        assert_eq!(Some(room_id.clone()), server.room_of(&a).await);
    }
}

#[tokio::test]
async fn auto_connect_video_pair_auto_starts() {
    let server = create_test_server();
    let (a, mut rx_a) = connect_peer(&server);
    let (b, _rx_b) = connect_peer(&server);

    for (peer, name) in [(a, "ana"), (b, "ben")] {
        server
            .handle_client_message(
                &peer,
                ClientMessage::Register(RegisterPayload {
                    username: name.to_string(),
                    age: 25,
                    interests: vec!["music".to_string()],
                    chat_mode: Some(ChatMode::Video),
                    auto_connect: true,
                    ..RegisterPayload::default()
                }),
            )
            .await;
        server
            .handle_client_message(&peer, ClientMessage::Search { mode: None })
            .await;
    }

    wait_for(&mut rx_a, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::VideoCallAutoStart { .. })
    })
    .await;
}

#[tokio::test]
async fn search_times_out_and_peer_can_search_again() {
    let server = create_test_server_with_config(
        ServerConfig {
            max_wait_time: Duration::from_millis(80),
            rematch_interval: Duration::from_millis(20),
            ..test_server_config()
        },
        MatchingConfig::default(),
    );
    tokio::spawn(server.clone().rematch_task());

    let (a, mut rx_a) = connect_peer(&server);
    register_peer(&server, a, "ana", 25, &["music"]).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    wait_for(&mut rx_a, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::SearchTimeout { .. })
    })
    .await;

    assert_eq!(server.session_status(&a).await, Some(SessionStatus::Ready));
    assert!(!server.is_waiting(&a).await);

    // The peer can go right back into the pool
    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    assert!(server.is_waiting(&a).await);
}

#[tokio::test]
async fn next_cycles_to_a_new_partner() {
    let server = create_test_server();
    let (a, mut rx_a) = connect_peer(&server);
    let (b, mut rx_b) = connect_peer(&server);

    register_peer(&server, a, "ana", 25, &["music", "travel"]).await;
    register_peer(&server, b, "ben", 27, &["music"]).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    server
        .handle_client_message(&b, ClientMessage::Search { mode: None })
        .await;
    assert_eq!(server.partner_of(&a).await, Some(b));
    drain(&mut rx_a);

    server.handle_client_message(&a, ClientMessage::Next).await;

    wait_for(&mut rx_b, Duration::from_secs(1), |m| {
        matches!(
            m,
            ServerMessage::PartnerDisconnected {
                reason: TeardownReason::NextRequested
            }
        )
    })
    .await;

    // A is searching again; a third peer pairs with it
    let (c, _rx_c) = connect_peer(&server);
    register_peer(&server, c, "cal", 24, &["music", "travel"]).await;
    server
        .handle_client_message(&c, ClientMessage::Search { mode: None })
        .await;

    assert_eq!(server.partner_of(&a).await, Some(c));
    let matched = wait_for(&mut rx_a, Duration::from_secs(1), |m| {
        matches!(m, ServerMessage::Matched(_))
    })
    .await;
    let ServerMessage::Matched(payload) = &*matched else {
        panic!("expected matched");
    };
    assert_eq!(payload.partner.username, "cal");
}

#[tokio::test]
async fn stats_broadcast_reaches_connected_peers() {
    let server = create_test_server();
    tokio::spawn(server.clone().stats_broadcast_task());

    let (a, mut rx_a) = connect_peer(&server);
    register_peer(&server, a, "ana", 25, &[]).await;

    let update = wait_for(&mut rx_a, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::StatsUpdated(_))
    })
    .await;
    let ServerMessage::StatsUpdated(stats) = &*update else {
        panic!("expected stats-updated");
    };
    assert_eq!(stats.online_peers, 1);
}

#[tokio::test]
async fn searching_update_is_sent_while_waiting() {
    let server = create_test_server_with_config(
        ServerConfig {
            rematch_interval: Duration::from_millis(20),
            max_wait_time: Duration::from_secs(30),
            ..test_server_config()
        },
        MatchingConfig::default(),
    );
    tokio::spawn(server.clone().rematch_task());

    let (a, mut rx_a) = connect_peer(&server);
    register_peer(&server, a, "ana", 25, &["music"]).await;
    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;

    let update = wait_for(&mut rx_a, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::SearchingUpdate { .. })
    })
    .await;
    let ServerMessage::SearchingUpdate { pool_size, .. } = &*update else {
        panic!("expected searching-update");
    };
    assert_eq!(*pool_size, 1);
}
