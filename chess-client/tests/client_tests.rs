//! End-to-end tests of the client actor against a scripted server.

use std::sync::Arc;
use std::time::Duration;

use chess::{CozyRules, PieceColor, STARTING_FEN};
use chess_client::mock::{MockConnector, MockPeer};
use chess_client::{
    Backoff, ClientConfig, ClientError, ClientEvent, ConnectionState, GameClient,
    GameClientHandle, Identity, MatchRequest, MoveIntent, Rejection, RetryPolicy,
};
use chess_proto::{
    ClientMessage, ColorPreference, GameStartPayload, GameStatePayload, ServerMessage, TimeControl,
};
use tokio::sync::broadcast;

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

fn config() -> ClientConfig {
    ClientConfig::default().with_retry(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(50),
        backoff: Backoff::Fixed,
    })
}

fn spawn(connector: &MockConnector) -> GameClientHandle {
    GameClient::spawn(
        config(),
        Arc::new(connector.clone()),
        Arc::new(CozyRules),
        None,
    )
    .unwrap()
}

async fn wait_for(
    events: &mut broadcast::Receiver<ClientEvent>,
    mut pred: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn next_message(peer: &mut MockPeer) -> ClientMessage {
    tokio::time::timeout(Duration::from_secs(60), peer.next_client_message())
        .await
        .expect("timed out waiting for client message")
        .expect("connection closed")
}

fn game_start(session_id: &str) -> ServerMessage {
    ServerMessage::GameStart(GameStartPayload {
        session_id: session_id.into(),
        initial_position: STARTING_FEN.into(),
        white_id: "alice".into(),
        black_id: "bob".into(),
        white_ms: 180_000,
        black_ms: 180_000,
        is_resumed_game: false,
    })
}

fn e4() -> GameStatePayload {
    GameStatePayload {
        move_index: 0,
        notation: "e4".into(),
        mover: PieceColor::White,
        resulting_position: AFTER_E4.into(),
        server_timestamp_delta: None,
    }
}

/// Connect as bob and consume the identify frame.
async fn connect_bob(
    client: &GameClientHandle,
    peer: &mut MockPeer,
    events: &mut broadcast::Receiver<ClientEvent>,
) {
    client.connect(Identity::new("bob", "secret")).await.unwrap();
    assert_eq!(
        next_message(peer).await,
        ClientMessage::Identify {
            user_id: "bob".into(),
            auth_token: "secret".into(),
        }
    );
    wait_for(events, |e| {
        matches!(e, ClientEvent::Connection(ConnectionState::Connected))
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_without_credentials_fails() {
    let connector = MockConnector::new();
    let client = spawn(&connector);
    let err = client.connect(Identity::new("bob", "")).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthRequired));
    assert_eq!(connector.attempts(), 0);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_reuses_connection() {
    let connector = MockConnector::new();
    let mut peer = connector.expect_connection();
    let client = spawn(&connector);
    let (_, mut events) = client.subscribe().await.unwrap();

    connect_bob(&client, &mut peer, &mut events).await;
    client.connect(Identity::new("bob", "secret")).await.unwrap();

    assert_eq!(connector.attempts(), 1);
    assert_eq!(client.view().await.unwrap().connection, ConnectionState::Connected);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_matchmaking_to_first_move() {
    let connector = MockConnector::new();
    let mut peer = connector.expect_connection();
    let client = spawn(&connector);
    let (_, mut events) = client.subscribe().await.unwrap();
    connect_bob(&client, &mut peer, &mut events).await;

    client
        .find_match(MatchRequest::queue(TimeControl::Blitz, ColorPreference::Random))
        .await
        .unwrap();
    assert!(matches!(
        next_message(&mut peer).await,
        ClientMessage::FindMatch { mode: TimeControl::Blitz, .. }
    ));
    // A second request while queued is refused locally.
    assert!(client
        .find_match(MatchRequest::queue(TimeControl::Rapid, ColorPreference::White))
        .await
        .is_err());

    peer.push(&ServerMessage::MatchFound {
        session_id: "s1".into(),
        assigned_color: PieceColor::Black,
    });
    assert_eq!(
        next_message(&mut peer).await,
        ClientMessage::JoinGame {
            session_id: "s1".into(),
            user_id: "bob".into(),
        }
    );

    peer.push(&game_start("s1"));
    peer.push(&ServerMessage::GameState(e4()));
    wait_for(&mut events, |e| {
        matches!(e, ClientEvent::SessionUpdated(view)
            if view.session.as_ref().is_some_and(|s| s.move_log.len() == 1))
    })
    .await;

    let session = client.view().await.unwrap().session.unwrap();
    assert_eq!(session.turn, PieceColor::Black);
    assert_eq!(session.position, AFTER_E4);
    assert_eq!(session.local_color, Some(PieceColor::Black));
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_move_gate_runs_before_sending() {
    let connector = MockConnector::new();
    let mut peer = connector.expect_connection();
    let client = spawn(&connector);
    let (_, mut events) = client.subscribe().await.unwrap();

    let err = client
        .submit_move(MoveIntent::new("e7", "e5"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::NotConnected)));

    connect_bob(&client, &mut peer, &mut events).await;
    peer.push(&game_start("s1"));
    wait_for(&mut events, |e| matches!(e, ClientEvent::SessionUpdated(_))).await;

    let err = client
        .submit_move(MoveIntent::new("e7", "e5"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::NotYourTurn)));

    peer.push(&ServerMessage::GameState(e4()));
    wait_for(&mut events, |e| {
        matches!(e, ClientEvent::SessionUpdated(view)
            if view.session.as_ref().is_some_and(|s| s.turn == PieceColor::Black))
    })
    .await;
    let sent = client.submit_move(MoveIntent::new("e7", "e5")).await.unwrap();
    assert_eq!(sent, "e7e5");
    assert_eq!(
        next_message(&mut peer).await,
        ClientMessage::SubmitMove {
            session_id: "s1".into(),
            user_id: "bob".into(),
            move_notation: "e7e5".into(),
        }
    );
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_rejoins_and_resumes() {
    let connector = MockConnector::new();
    let mut first = connector.expect_connection();
    let mut second = connector.expect_connection();
    let client = spawn(&connector);
    let (_, mut events) = client.subscribe().await.unwrap();
    connect_bob(&client, &mut first, &mut events).await;

    first.push(&game_start("s1"));
    first.push(&ServerMessage::GameState(e4()));
    wait_for(&mut events, |e| {
        matches!(e, ClientEvent::SessionUpdated(view)
            if view.session.as_ref().is_some_and(|s| s.move_log.len() == 1))
    })
    .await;

    first.drop_connection();
    wait_for(&mut events, |e| matches!(e, ClientEvent::ConnectionLost { .. })).await;

    assert!(matches!(
        next_message(&mut second).await,
        ClientMessage::Identify { .. }
    ));
    assert_eq!(
        next_message(&mut second).await,
        ClientMessage::RejoinGame {
            session_id: "s1".into(),
            user_id: "bob".into(),
        }
    );

    second.push(&ServerMessage::MoveHistoryBulk {
        moves: vec![e4().to_move_entry()],
    });
    let resumed = wait_for(&mut events, |e| matches!(e, ClientEvent::Resumed { .. })).await;
    assert!(matches!(resumed, ClientEvent::Resumed { session_id } if session_id == "s1"));

    let session = client.view().await.unwrap().session.unwrap();
    assert_eq!(session.move_log.len(), 1);
    assert_eq!(session.turn, PieceColor::Black);
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_keeps_session_for_manual_rejoin() {
    let connector = MockConnector::new();
    let mut peer = connector.expect_connection();
    let client = spawn(&connector);
    let (_, mut events) = client.subscribe().await.unwrap();
    connect_bob(&client, &mut peer, &mut events).await;

    peer.push(&game_start("s1"));
    wait_for(&mut events, |e| matches!(e, ClientEvent::SessionUpdated(_))).await;

    // No further connections are scripted, so every retry fails.
    peer.drop_connection();
    let exhausted = wait_for(&mut events, |e| {
        matches!(e, ClientEvent::RetriesExhausted { .. })
    })
    .await;
    assert!(matches!(exhausted, ClientEvent::RetriesExhausted { attempts: 3 }));

    let view = client.view().await.unwrap();
    assert_eq!(view.session.unwrap().session_id, "s1");
    assert!(matches!(
        client.rejoin().await,
        Err(ClientError::NotConnected)
    ));
    assert!(client.cancel_rejoin().await.unwrap());
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_challenge_flow() {
    let connector = MockConnector::new();
    let mut peer = connector.expect_connection();
    let client = spawn(&connector);
    let (_, mut events) = client.subscribe().await.unwrap();
    connect_bob(&client, &mut peer, &mut events).await;

    peer.push(&ServerMessage::ChallengeReceived {
        challenger_id: "carol".into(),
        challenger_name: "Carol".into(),
        mode: TimeControl::Rapid,
        color_preference: ColorPreference::White,
    });
    wait_for(&mut events, |e| matches!(e, ClientEvent::ChallengeOffered(_))).await;

    client.respond_to_challenge(true).await.unwrap();
    assert_eq!(
        next_message(&mut peer).await,
        ClientMessage::RespondToChallenge {
            accept: true,
            challenger_id: "carol".into(),
        }
    );
    assert!(client.respond_to_challenge(false).await.is_err());
    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_handle_fails_after_shutdown() {
    let connector = MockConnector::new();
    let client = spawn(&connector);
    client.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(client.view().await, Err(ClientError::ActorClosed)));
}
