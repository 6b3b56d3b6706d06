// Integration tests for the quiz server
// Each test boots the full warp stack on an ephemeral port and talks to it over HTTP and WebSocket

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use quiz_server::api::quiz_routes;
use quiz_server::config::QuizTiming;
use quiz_server::quiz::catalog::QuestionRecord;
use quiz_server::quiz::{ConnectionHub, QuizCoordinator, ServerMessage, StaticLoader};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn sample_records() -> Vec<QuestionRecord> {
    vec![
        QuestionRecord {
            id: "q1".to_string(),
            prompt: "2 + 2?".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            answer: 1,
        },
        QuestionRecord {
            id: "q2".to_string(),
            prompt: "Capital of France?".to_string(),
            options: vec!["Paris".to_string(), "Rome".to_string()],
            answer: 0,
        },
    ]
}

async fn spawn_server() -> SocketAddr {
    let hub = Arc::new(ConnectionHub::new());
    let timing = QuizTiming::new(2, Duration::from_millis(20)).unwrap();
    let coordinator = QuizCoordinator::new(
        Arc::new(StaticLoader::new(sample_records())),
        hub.clone(),
        timing,
    );

    let routes = quiz_routes::routes(coordinator, hub, "http://localhost:4200");
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/quiz", addr))
        .await
        .expect("WebSocket connect");
    ws
}

async fn send(client: &mut Client, message: serde_json::Value) {
    client
        .send(Message::Text(message.to_string()))
        .await
        .expect("send");
}

async fn next_message(client: &mut Client) -> ServerMessage {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a server message")
            .expect("stream closed")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("decodable server message");
        }
    }
}

/// Skips messages until one matches.
async fn expect(client: &mut Client, predicate: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
    loop {
        let message = next_message(client).await;
        if predicate(&message) {
            return message;
        }
    }
}

async fn host_room(addr: SocketAddr, room_id: &str) -> Client {
    let mut host = connect(addr).await;
    send(&mut host, json!({"type": "createRoom", "roomId": room_id})).await;
    let created = next_message(&mut host).await;
    assert_eq!(
        created,
        ServerMessage::UserJoined {
            room_id: room_id.to_string(),
            joined_users: 0
        }
    );
    host
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_server().await;

    let resp = reqwest::get(format!("http://{}/quiz/health", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Quiz Server");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_config_endpoint() {
    let addr = spawn_server().await;

    let body: serde_json::Value = reqwest::get(format!("http://{}/quiz/config", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["countdownSecs"], 2);
    assert_eq!(body["tickMillis"], 20);
}

#[tokio::test]
async fn test_join_broadcasts_member_count() {
    let addr = spawn_server().await;
    let mut host = host_room(addr, "room-1").await;

    let mut alice = connect(addr).await;
    send(&mut alice, json!({"type": "joinRoom", "roomId": "room-1"})).await;
    let expected = ServerMessage::UserJoined {
        room_id: "room-1".to_string(),
        joined_users: 1,
    };
    assert_eq!(next_message(&mut host).await, expected);
    assert_eq!(next_message(&mut alice).await, expected);

    let mut bob = connect(addr).await;
    send(&mut bob, json!({"type": "joinRoom", "roomId": "room-1"})).await;
    let expected = ServerMessage::UserJoined {
        room_id: "room-1".to_string(),
        joined_users: 2,
    };
    assert_eq!(next_message(&mut host).await, expected);
    assert_eq!(next_message(&mut alice).await, expected);
    assert_eq!(next_message(&mut bob).await, expected);
}

#[tokio::test]
async fn test_join_unknown_room_reports_error() {
    let addr = spawn_server().await;
    let mut client = connect(addr).await;

    send(&mut client, json!({"type": "joinRoom", "roomId": "nowhere"})).await;
    assert_eq!(
        next_message(&mut client).await,
        ServerMessage::Error {
            message: "Room not found".to_string()
        }
    );
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let addr = spawn_server().await;
    let mut client = connect(addr).await;

    client
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    assert!(matches!(
        next_message(&mut client).await,
        ServerMessage::Error { .. }
    ));

    send(&mut client, json!({"type": "joinQuiz"})).await;
    let ServerMessage::QuizQuestions { questions } = next_message(&mut client).await else {
        panic!("expected quizQuestions");
    };
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].prompt, "2 + 2?");
}

#[tokio::test]
async fn test_full_quiz_flow() {
    let addr = spawn_server().await;
    let mut host = host_room(addr, "room-1").await;

    let mut player = connect(addr).await;
    send(&mut player, json!({"type": "joinRoom", "roomId": "room-1"})).await;
    expect(&mut player, |m| matches!(m, ServerMessage::UserJoined { .. })).await;

    send(&mut host, json!({"type": "startQuiz", "roomId": "room-1"})).await;

    let started = expect(&mut player, |m| matches!(m, ServerMessage::QuizStarted { .. })).await;
    assert_eq!(
        started,
        ServerMessage::QuizStarted {
            room_id: "room-1".to_string()
        }
    );

    let mut events = Vec::new();
    loop {
        let message = next_message(&mut player).await;
        let done = message == ServerMessage::QuizEnded;
        events.push(message);
        if done {
            break;
        }
    }

    assert_eq!(
        events,
        vec![
            ServerMessage::QuizTimerUpdate { seconds_left: 1 },
            ServerMessage::QuizTimerUpdate { seconds_left: 0 },
            ServerMessage::NextQuestion { question_index: 1 },
            ServerMessage::QuizTimerUpdate { seconds_left: 1 },
            ServerMessage::QuizTimerUpdate { seconds_left: 0 },
            ServerMessage::QuizEnded,
        ]
    );

    // The room is idle again and can be restarted.
    send(&mut host, json!({"type": "startQuiz", "roomId": "room-1"})).await;
    expect(&mut player, |m| matches!(m, ServerMessage::QuizStarted { .. })).await;
}

#[tokio::test]
async fn test_answer_result_is_broadcast_to_room() {
    let addr = spawn_server().await;
    let mut host = host_room(addr, "room-1").await;

    let mut player = connect(addr).await;
    send(&mut player, json!({"type": "joinRoom", "roomId": "room-1"})).await;
    expect(&mut host, |m| matches!(m, ServerMessage::UserJoined { .. })).await;

    send(&mut player, json!({"type": "joinQuiz"})).await;
    expect(&mut player, |m| matches!(m, ServerMessage::QuizQuestions { .. })).await;

    send(
        &mut player,
        json!({"type": "submitAnswer", "questionId": "q1", "selectedOption": "4", "roomId": "room-1"}),
    )
    .await;
    let verdict = expect(&mut host, |m| matches!(m, ServerMessage::AnswerResult { .. })).await;
    assert_eq!(verdict, ServerMessage::answer_accepted(true));

    send(
        &mut player,
        json!({"type": "submitAnswer", "questionId": "q2", "selectedOption": "Rome", "roomId": "room-1"}),
    )
    .await;
    let verdict = expect(&mut host, |m| matches!(m, ServerMessage::AnswerResult { .. })).await;
    assert_eq!(verdict, ServerMessage::answer_accepted(false));
}

#[tokio::test]
async fn test_answer_without_room_is_rejected_privately() {
    let addr = spawn_server().await;
    let mut player = connect(addr).await;

    send(&mut player, json!({"type": "joinQuiz"})).await;
    expect(&mut player, |m| matches!(m, ServerMessage::QuizQuestions { .. })).await;

    send(
        &mut player,
        json!({"type": "submitAnswer", "questionId": "q1", "selectedOption": "4"}),
    )
    .await;
    assert_eq!(
        next_message(&mut player).await,
        ServerMessage::AnswerResult {
            success: false,
            correct: None,
            message: Some("Room ID not provided".to_string()),
        }
    );

    send(
        &mut player,
        json!({"type": "submitAnswer", "questionId": "missing", "selectedOption": "4", "roomId": "r"}),
    )
    .await;
    assert_eq!(
        next_message(&mut player).await,
        ServerMessage::AnswerResult {
            success: false,
            correct: None,
            message: Some("Question not found".to_string()),
        }
    );
}

#[tokio::test]
async fn test_disconnect_broadcasts_user_left() {
    let addr = spawn_server().await;
    let mut host = host_room(addr, "room-1").await;

    let mut alice = connect(addr).await;
    send(&mut alice, json!({"type": "joinRoom", "roomId": "room-1"})).await;
    expect(&mut host, |m| matches!(m, ServerMessage::UserJoined { joined_users: 1, .. })).await;

    let mut bob = connect(addr).await;
    send(&mut bob, json!({"type": "joinRoom", "roomId": "room-1"})).await;
    expect(&mut host, |m| matches!(m, ServerMessage::UserJoined { joined_users: 2, .. })).await;

    alice.close(None).await.unwrap();

    let left = expect(&mut host, |m| matches!(m, ServerMessage::UserLeft { .. })).await;
    assert_eq!(
        left,
        ServerMessage::UserLeft {
            room_id: "room-1".to_string(),
            joined_users: 1
        }
    );
}
