//! Integration tests for turn synchronisation through a relay

use morris_core::{
    Action, AiConfig, AiEngine, Controller, Difficulty, GameMode, GameSettings, Move, Outcome, Player,
    Position, Variant,
};
use morris_net::{
    ConnectionState, Endpoint, LocalRelay, NetClient, NetConfig, NetError, RelayMessage,
    SessionEvent,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn pos(i: u8) -> Position {
    Position::new(i).unwrap()
}

fn quiet_config() -> NetConfig {
    NetConfig {
        keepalive_interval_ms: 60_000,
        reconnect_backoff_ms: 10,
        max_reconnect_attempts: 3,
    }
}

fn controller(local: Player) -> Controller {
    let settings = GameSettings {
        variant: Variant::Classic,
        ..Default::default()
    };
    Controller::new(GameMode::Networked { local }, &settings)
}

struct Peer {
    client: NetClient,
    ctrl: Controller,
}

/// Host and client paired through an in-process relay
async fn paired(config: NetConfig) -> (Peer, Peer) {
    let relay = LocalRelay::new();
    let endpoint = Endpoint::Local(relay);

    let mut host = Peer {
        client: NetClient::connect_as_host(endpoint.clone(), "Ada", config.clone())
            .await
            .unwrap(),
        ctrl: controller(Player::A),
    };
    let code = match host.client.next_event(&mut host.ctrl).await.unwrap() {
        SessionEvent::HostAccepted { room_code } => room_code,
        other => panic!("unexpected {:?}", other),
    };

    let mut guest = Peer {
        client: NetClient::connect_as_client(endpoint, &code, "Bo", config)
            .await
            .unwrap(),
        ctrl: controller(Player::B),
    };

    assert_eq!(
        host.client.next_event(&mut host.ctrl).await.unwrap(),
        SessionEvent::OpponentJoined { name: "Bo".to_string() }
    );
    assert_eq!(
        guest.client.next_event(&mut guest.ctrl).await.unwrap(),
        SessionEvent::OpponentJoined { name: "Ada".to_string() }
    );
    (host, guest)
}

#[tokio::test]
async fn test_host_placement_reaches_client() {
    init_tracing();
    let (mut host, mut guest) = paired(quiet_config()).await;
    assert!(host.client.session().is_local_turn());
    assert!(!guest.client.session().is_local_turn());

    host.client.send_local_move(&mut host.ctrl, Move::place(pos(5))).unwrap();
    assert!(!host.client.session().is_local_turn());

    let event = guest.client.next_event(&mut guest.ctrl).await.unwrap();
    assert!(matches!(event, SessionEvent::RemoteAction(_)));
    assert_eq!(guest.ctrl.state().board(), host.ctrl.state().board());
    assert_eq!(guest.ctrl.state().board().get(pos(5)), Some(Player::A));
    assert!(guest.client.session().is_local_turn());
}

#[tokio::test]
async fn test_out_of_turn_is_rejected_locally() {
    let (mut host, mut guest) = paired(quiet_config()).await;
    let result = guest.client.send_local_move(&mut guest.ctrl, Move::place(pos(0)));
    assert!(matches!(result, Err(NetError::OutOfTurn)));
    assert!(guest.ctrl.state().board().is_empty(pos(0)));

    // Nothing was forwarded to the host
    let waited = tokio::time::timeout(
        Duration::from_millis(50),
        host.client.next_event(&mut host.ctrl),
    )
    .await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn test_full_game_stays_in_sync() {
    init_tracing();
    let (mut host, mut guest) = paired(quiet_config()).await;
    let ai_config = AiConfig::default().with_seed(11);
    let mut host_ai = AiEngine::new(Player::A, Variant::Classic, Difficulty::Medium, &ai_config);
    let mut guest_ai = AiEngine::new(Player::B, Variant::Classic, Difficulty::Easy, &ai_config);

    let mut plies = 0;
    while host.ctrl.state().outcome() == Outcome::Ongoing && plies < 1000 {
        let host_to_move = host.client.session().is_local_turn();
        let (mover, ai, receiver) = if host_to_move {
            (&mut host, &mut host_ai, &mut guest)
        } else {
            (&mut guest, &mut guest_ai, &mut host)
        };

        let Some(mv) = ai.select_move(mover.ctrl.state()) else {
            break;
        };
        mover.client.send_local_move(&mut mover.ctrl, mv).unwrap();

        let messages = 1 + usize::from(mv.capture.is_some());
        for _ in 0..messages {
            let event = receiver.client.next_event(&mut receiver.ctrl).await.unwrap();
            assert!(matches!(event, SessionEvent::RemoteAction(_)));
        }

        assert_eq!(host.ctrl.state(), guest.ctrl.state());
        assert_ne!(
            host.client.session().is_local_turn(),
            guest.client.session().is_local_turn()
        );
        plies += 1;
    }
    assert!(plies >= 18);
}

#[tokio::test]
async fn test_client_reset_is_not_forwarded() {
    let (mut host, mut guest) = paired(quiet_config()).await;
    host.client.send_local_move(&mut host.ctrl, Move::place(pos(5))).unwrap();
    guest.client.next_event(&mut guest.ctrl).await.unwrap();

    let result = guest.client.request_reset(&mut guest.ctrl);
    assert!(matches!(result, Err(NetError::ResetNotAllowed)));
    assert_eq!(guest.ctrl.state().move_count(), 1);

    host.client.request_reset(&mut host.ctrl).unwrap();
    assert_eq!(
        guest.client.next_event(&mut guest.ctrl).await.unwrap(),
        SessionEvent::MatchReset
    );
    assert_eq!(guest.ctrl.state(), host.ctrl.state());
    assert!(host.client.session().is_local_turn());
}

#[tokio::test]
async fn test_keepalive_measures_round_trip() {
    let config = NetConfig {
        keepalive_interval_ms: 20,
        ..quiet_config()
    };
    let (mut host, mut guest) = paired(config).await;
    assert!(host.client.has_keepalive());

    let (host_event, _) = tokio::join!(
        host.client.next_event(&mut host.ctrl),
        // The guest keeps answering probes until the host has its ack
        tokio::time::timeout(Duration::from_millis(300), async {
            loop {
                let _ = guest.client.next_event(&mut guest.ctrl).await;
            }
        }),
    );
    assert!(matches!(host_event.unwrap(), SessionEvent::Latency { .. }));
    assert!(host.client.session().round_trip_ms().is_some());

    host.client.disconnect();
    assert!(!host.client.has_keepalive());
    assert_eq!(host.client.session().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_forged_move_desyncs_client() {
    let relay = LocalRelay::new();
    let mut raw_host = relay.connect();
    raw_host
        .send(RelayMessage::Host {
            player_name: "Mallory".to_string(),
            room_code: None,
        })
        .unwrap();
    let code = match raw_host.recv().await {
        Some(RelayMessage::HostAccepted { room_code }) => room_code,
        other => panic!("unexpected {:?}", other),
    };

    let mut ctrl = controller(Player::B);
    let mut client = NetClient::connect_as_client(Endpoint::Local(relay), &code, "Bo", quiet_config())
        .await
        .unwrap();
    client.next_event(&mut ctrl).await.unwrap();

    let placement = RelayMessage::Move { from: None, to: pos(5) };
    raw_host.send(placement.clone()).unwrap();
    raw_host.send(placement).unwrap();

    client.next_event(&mut ctrl).await.unwrap();
    let result = client.next_event(&mut ctrl).await;
    assert!(matches!(result, Err(NetError::Desync(_))));
    assert_eq!(client.session().state(), ConnectionState::Disconnected);
    assert!(matches!(
        client.next_event(&mut ctrl).await,
        Err(NetError::NotConnected)
    ));
}

#[tokio::test]
async fn test_unknown_room_surfaces_relay_error() {
    let relay = LocalRelay::new();
    let mut ctrl = controller(Player::B);
    let mut client = NetClient::connect_as_client(Endpoint::Local(relay), "ZZZZ", "Bo", quiet_config())
        .await
        .unwrap();
    assert!(matches!(
        client.next_event(&mut ctrl).await,
        Err(NetError::Relay(_))
    ));
}

#[tokio::test]
async fn test_client_connection_lost() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let mut ctrl = controller(Player::B);
    let mut client = NetClient::connect_as_client(Endpoint::Tcp(addr.to_string()), "ABCD", "Bo", quiet_config())
        .await
        .unwrap();
    server.await.unwrap();

    assert!(matches!(
        client.next_event(&mut ctrl).await,
        Err(NetError::ConnectionLost)
    ));
}

#[tokio::test]
async fn test_host_reconnects_to_same_room() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A relay that accepts the host, then drops it once
    let server = tokio::spawn(async move {
        let mut openings = Vec::new();
        for _ in 0..2 {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            openings.push(morris_net::protocol::decode(&line).unwrap());

            let reply = morris_net::protocol::encode(&RelayMessage::HostAccepted {
                room_code: "WXYZ".to_string(),
            })
            .unwrap();
            write_half.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
            if openings.len() == 2 {
                // Keep the second connection open until the test is done
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        openings
    });

    let mut ctrl = controller(Player::A);
    let mut host = NetClient::connect_as_host(Endpoint::Tcp(addr.to_string()), "Ada", quiet_config())
        .await
        .unwrap();

    for _ in 0..2 {
        assert_eq!(
            host.next_event(&mut ctrl).await.unwrap(),
            SessionEvent::HostAccepted { room_code: "WXYZ".to_string() }
        );
    }

    let openings = server.await.unwrap();
    assert_eq!(
        openings[1],
        RelayMessage::Host {
            player_name: "Ada".to_string(),
            room_code: Some("WXYZ".to_string()),
        }
    );
}

#[tokio::test]
async fn test_move_on_dead_connection_is_rolled_back() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // A relay that pairs the host with a phantom opponent, then hangs up
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        lines.next_line().await.unwrap().unwrap();
        for msg in [
            RelayMessage::HostAccepted { room_code: "WXYZ".to_string() },
            RelayMessage::OpponentJoined { name: "Bo".to_string() },
        ] {
            let line = morris_net::protocol::encode(&msg).unwrap();
            write_half.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
        }
    });

    let config = NetConfig {
        keepalive_interval_ms: 5,
        ..quiet_config()
    };
    let mut ctrl = controller(Player::A);
    let mut host = NetClient::connect_as_host(Endpoint::Tcp(addr.to_string()), "Ada", config)
        .await
        .unwrap();
    host.next_event(&mut ctrl).await.unwrap();
    assert_eq!(
        host.next_event(&mut ctrl).await.unwrap(),
        SessionEvent::OpponentJoined { name: "Bo".to_string() }
    );
    server.await.unwrap();

    // Keepalive writes against the closed socket until the writer gives up
    tokio::time::sleep(Duration::from_millis(300)).await;

    let result = host.send_local_action(&mut ctrl, Action::Place(pos(5)));
    assert!(matches!(result, Err(NetError::ConnectionLost)));
    assert!(ctrl.state().board().is_empty(pos(5)));
    assert_eq!(ctrl.state().active_player(), Player::A);
    assert_eq!(
        host.session().is_local_turn(),
        ctrl.state().active_player() == Player::A,
        "turn flag diverged from the active player"
    );
    assert!(!host.has_keepalive());
    assert_eq!(host.session().state(), ConnectionState::Disconnected);

    // Nothing further goes out until the session is re-established
    assert!(matches!(
        host.send_local_move(&mut ctrl, Move::place(pos(5))),
        Err(NetError::NotConnected)
    ));
    assert_eq!(ctrl.state().move_count(), 0);
}

#[tokio::test]
async fn test_forged_placement_on_occupied_point_desyncs_client() {
    let relay = LocalRelay::new();
    let mut raw_host = relay.connect();
    raw_host
        .send(RelayMessage::Host {
            player_name: "Mallory".to_string(),
            room_code: None,
        })
        .unwrap();
    let code = match raw_host.recv().await {
        Some(RelayMessage::HostAccepted { room_code }) => room_code,
        other => panic!("unexpected {:?}", other),
    };

    let mut ctrl = controller(Player::B);
    let mut client = NetClient::connect_as_client(Endpoint::Local(relay), &code, "Bo", quiet_config())
        .await
        .unwrap();
    client.next_event(&mut ctrl).await.unwrap();

    raw_host.send(RelayMessage::Move { from: None, to: pos(5) }).unwrap();
    client.next_event(&mut ctrl).await.unwrap();
    client.send_local_move(&mut ctrl, Move::place(pos(6))).unwrap();
    let before = ctrl.state().clone();

    // A claims the point B already holds
    raw_host.send(RelayMessage::Move { from: None, to: pos(6) }).unwrap();
    let result = client.next_event(&mut ctrl).await;
    assert!(matches!(result, Err(NetError::Desync(_))));
    assert_eq!(client.session().state(), ConnectionState::Disconnected);
    assert_eq!(ctrl.state(), &before);
}

#[tokio::test]
async fn test_reset_restarts_keepalive() {
    let config = NetConfig {
        keepalive_interval_ms: 20,
        ..quiet_config()
    };
    let (mut host, mut guest) = paired(config).await;
    host.client.send_local_move(&mut host.ctrl, Move::place(pos(5))).unwrap();
    guest.client.next_event(&mut guest.ctrl).await.unwrap();

    host.client.request_reset(&mut host.ctrl).unwrap();
    assert!(host.client.has_keepalive());
    assert_eq!(
        guest.client.next_event(&mut guest.ctrl).await.unwrap(),
        SessionEvent::MatchReset
    );
    assert!(guest.client.has_keepalive());

    // Probes keep flowing in the new match
    let (measured, _) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match host.client.next_event(&mut host.ctrl).await {
                    Ok(SessionEvent::Latency { .. }) => break,
                    Ok(_) => continue,
                    Err(e) => panic!("unexpected {:?}", e),
                }
            }
        }),
        tokio::time::timeout(Duration::from_millis(300), async {
            loop {
                let _ = guest.client.next_event(&mut guest.ctrl).await;
            }
        }),
    );
    assert!(measured.is_ok());
    assert!(host.client.session().round_trip_ms().is_some());
}
