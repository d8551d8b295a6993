//! Registration and search flow tests at the message-router level.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::MatchingConfig;
use crate::protocol::{
    AgeRange, ChatMode, ClientMessage, ErrorCode, PeerId, RegisterPayload, ServerMessage,
};
use crate::server::{ChatServer, ServerConfig, SessionStatus};

type Rx = mpsc::Receiver<Arc<ServerMessage>>;

fn test_server() -> Arc<ChatServer> {
    ChatServer::new(ServerConfig::default(), MatchingConfig::default())
}

fn connect(server: &Arc<ChatServer>) -> (PeerId, Rx) {
    let (tx, rx) = mpsc::channel(64);
    let peer_id = PeerId::new_v4();
    server.connect_client(peer_id, tx);
    (peer_id, rx)
}

fn register_payload(username: &str, age: u8, interests: &[&str]) -> RegisterPayload {
    RegisterPayload {
        username: username.to_string(),
        age,
        interests: interests.iter().map(|s| s.to_string()).collect(),
        ..RegisterPayload::default()
    }
}

async fn register(server: &Arc<ChatServer>, peer_id: PeerId, payload: RegisterPayload) {
    server
        .handle_client_message(&peer_id, ClientMessage::Register(payload))
        .await;
}

fn drain(rx: &mut Rx) -> Vec<Arc<ServerMessage>> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

#[tokio::test]
async fn register_creates_a_ready_session() {
    let server = test_server();
    let (peer_id, mut rx) = connect(&server);

    register(&server, peer_id, register_payload("ana", 25, &["music"])).await;

    assert_eq!(
        server.session_status(&peer_id).await,
        Some(SessionStatus::Ready)
    );
    let messages = drain(&mut rx);
    assert!(messages
        .iter()
        .any(|m| matches!(&**m, ServerMessage::Registered { peer_id: id, .. } if *id == peer_id)));
}

#[tokio::test]
async fn invalid_profile_is_rejected_without_state_change() {
    let server = test_server();
    let (peer_id, mut rx) = connect(&server);

    let payload = RegisterPayload {
        age_range: Some(AgeRange { min: 50, max: 20 }),
        ..register_payload("ana", 25, &[])
    };
    register(&server, peer_id, payload).await;

    assert!(server.session_status(&peer_id).await.is_none());
    let messages = drain(&mut rx);
    assert!(messages.iter().any(|m| matches!(
        &**m,
        ServerMessage::RegisterError {
            error_code: ErrorCode::InvalidProfile,
            ..
        }
    )));
}

#[tokio::test]
async fn duplicate_register_is_rejected() {
    let server = test_server();
    let (peer_id, mut rx) = connect(&server);

    register(&server, peer_id, register_payload("ana", 25, &[])).await;
    register(&server, peer_id, register_payload("other", 30, &[])).await;

    let messages = drain(&mut rx);
    assert!(messages.iter().any(|m| matches!(
        &**m,
        ServerMessage::RegisterError {
            error_code: ErrorCode::AlreadyRegistered,
            ..
        }
    )));
}

#[tokio::test]
async fn search_before_register_is_an_error() {
    let server = test_server();
    let (peer_id, mut rx) = connect(&server);

    server
        .handle_client_message(&peer_id, ClientMessage::Search { mode: None })
        .await;

    let messages = drain(&mut rx);
    assert!(messages.iter().any(|m| matches!(
        &**m,
        ServerMessage::SearchError {
            error_code: ErrorCode::NotRegistered,
            ..
        }
    )));
    assert!(!server.is_waiting(&peer_id).await);
}

#[tokio::test]
async fn happy_path_text_pair() {
    let server = test_server();
    let (a, mut rx_a) = connect(&server);
    let (b, mut rx_b) = connect(&server);

    register(&server, a, register_payload("ana", 25, &["music", "travel"])).await;
    register(&server, b, register_payload("ben", 27, &["music"])).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    server
        .handle_client_message(&b, ClientMessage::Search { mode: None })
        .await;

    // Symmetry: both ends chat with each other in the same room
    assert_eq!(server.partner_of(&a).await, Some(b));
    assert_eq!(server.partner_of(&b).await, Some(a));
    let room_a = server.room_of(&a).await.expect("room for a");
    let room_b = server.room_of(&b).await.expect("room for b");
    assert_eq!(room_a, room_b);

    // Pool/pair disjointness
    assert!(!server.is_waiting(&a).await);
    assert!(!server.is_waiting(&b).await);

    let matched_a = drain(&mut rx_a)
        .into_iter()
        .find_map(|m| match &*m {
            ServerMessage::Matched(payload) => Some(payload.clone()),
            _ => None,
        })
        .expect("a receives matched");
    let matched_b = drain(&mut rx_b)
        .into_iter()
        .find_map(|m| match &*m {
            ServerMessage::Matched(payload) => Some(payload.clone()),
            _ => None,
        })
        .expect("b receives matched");

    assert_eq!(matched_a.room_id, matched_b.room_id);
    assert_eq!(matched_a.partner.username, "ben");
    assert_eq!(matched_b.partner.username, "ana");
    assert!(matched_a.compatibility >= 65.0);
    assert_eq!(matched_a.shared_interests, vec!["music"]);
    assert_eq!(matched_a.match_mode, ChatMode::Text);
}

#[tokio::test]
async fn mode_strictness_keeps_text_and_video_apart() {
    let server = test_server();
    let (a, _rx_a) = connect(&server);
    let (b, _rx_b) = connect(&server);

    register(&server, a, register_payload("ana", 25, &["music", "travel"])).await;
    register(&server, b, register_payload("ben", 25, &["music", "travel"])).await;

    server
        .handle_client_message(
            &a,
            ClientMessage::Search {
                mode: Some(ChatMode::Text),
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

    // No fallback, even after extra sweeps
    server.run_rematch_sweep().await;
    assert!(server.partner_of(&a).await.is_none());
    assert!(server.partner_of(&b).await.is_none());
    assert!(server.is_waiting(&a).await);
    assert!(server.is_waiting(&b).await);

    // A compatible video peer arrives and pairs with b only
    let (c, _rx_c) = connect(&server);
    register(&server, c, register_payload("cal", 26, &["music"])).await;
    server
        .handle_client_message(
            &c,
            ClientMessage::Search {
                mode: Some(ChatMode::Video),
            },
        )
        .await;

    assert_eq!(server.partner_of(&b).await, Some(c));
    assert!(server.partner_of(&a).await.is_none());
}

#[tokio::test]
async fn age_out_of_range_never_matches() {
    let server = test_server();
    let (a, _rx_a) = connect(&server);
    let (b, _rx_b) = connect(&server);

    let payload_a = RegisterPayload {
        age_range: Some(AgeRange { min: 30, max: 60 }),
        ..register_payload("ana", 22, &["music"])
    };
    register(&server, a, payload_a).await;
    register(&server, b, register_payload("ben", 25, &["music"])).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    server
        .handle_client_message(&b, ClientMessage::Search { mode: None })
        .await;
    server.run_rematch_sweep().await;

    assert!(server.partner_of(&a).await.is_none());
    assert!(server.partner_of(&b).await.is_none());
}

#[tokio::test]
async fn blocked_peers_never_pair() {
    let server = test_server();
    let (a, _rx_a) = connect(&server);
    let (b, _rx_b) = connect(&server);

    register(&server, a, register_payload("ana", 25, &["music", "travel"])).await;
    register(&server, b, register_payload("ben", 25, &["music", "travel"])).await;

    server.block_peer(a, b).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    server
        .handle_client_message(&b, ClientMessage::Search { mode: None })
        .await;
    server.run_rematch_sweep().await;

    assert!(server.partner_of(&a).await.is_none());
    assert!(server.partner_of(&b).await.is_none());
}

#[tokio::test]
async fn cancel_search_leaves_the_pool() {
    let server = test_server();
    let (peer_id, mut rx) = connect(&server);
    register(&server, peer_id, register_payload("ana", 25, &[])).await;

    server
        .handle_client_message(&peer_id, ClientMessage::Search { mode: None })
        .await;
    assert!(server.is_waiting(&peer_id).await);

    server
        .handle_client_message(&peer_id, ClientMessage::CancelSearch)
        .await;

    assert!(!server.is_waiting(&peer_id).await);
    assert_eq!(
        server.session_status(&peer_id).await,
        Some(SessionStatus::Ready)
    );
    let messages = drain(&mut rx);
    assert!(messages
        .iter()
        .any(|m| matches!(&**m, ServerMessage::SearchCancelled)));
}

#[tokio::test]
async fn cancel_search_without_searching_stays_ready() {
    let server = test_server();
    let (peer_id, _rx) = connect(&server);
    register(&server, peer_id, register_payload("ana", 25, &[])).await;

    server
        .handle_client_message(&peer_id, ClientMessage::CancelSearch)
        .await;

    assert_eq!(
        server.session_status(&peer_id).await,
        Some(SessionStatus::Ready)
    );
}

#[tokio::test]
async fn search_timeout_returns_peer_to_ready() {
    let server = ChatServer::new(
        ServerConfig {
            max_wait_time: tokio::time::Duration::from_millis(10),
            ..ServerConfig::default()
        },
        MatchingConfig::default(),
    );
    let (peer_id, mut rx) = connect(&server);
    register(&server, peer_id, register_payload("ana", 25, &[])).await;

    server
        .handle_client_message(&peer_id, ClientMessage::Search { mode: None })
        .await;
    tokio::time::sleep(tokio::time::Duration::from_millis(30)).await;
    server.run_rematch_sweep().await;

    assert!(!server.is_waiting(&peer_id).await);
    assert_eq!(
        server.session_status(&peer_id).await,
        Some(SessionStatus::Ready)
    );
    let messages = drain(&mut rx);
    assert!(messages
        .iter()
        .any(|m| matches!(&**m, ServerMessage::SearchTimeout { .. })));
}

#[tokio::test]
async fn get_stats_reports_live_counts() {
    let server = test_server();
    let (a, mut rx_a) = connect(&server);
    register(&server, a, register_payload("ana", 25, &[])).await;

    server
        .handle_client_message(&a, ClientMessage::Search { mode: None })
        .await;
    server.handle_client_message(&a, ClientMessage::GetStats).await;

    let stats = drain(&mut rx_a)
        .into_iter()
        .find_map(|m| match &*m {
            ServerMessage::Stats(payload) => Some(payload.clone()),
            _ => None,
        })
        .expect("stats payload");
    assert_eq!(stats.online_peers, 1);
    assert_eq!(stats.searching_peers, 1);
    assert_eq!(stats.active_pairs, 0);
}
