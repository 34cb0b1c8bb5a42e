//! End-to-end tests over real WebSocket connections

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use pairing_chat_server::{accept_loop, server, ConnectionSettings};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cmd_tx = server::spawn(Duration::from_secs(3600), 64);
    tokio::spawn(accept_loop(listener, cmd_tx, ConnectionSettings::default()));
    addr
}

async fn connect(addr: SocketAddr, query: &str) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/?{}", addr, query))
        .await
        .unwrap();
    ws
}

/// Next JSON text frame, skipping control frames
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

fn find_pairing(user: &str, age: u32, sex: &str, wants: &str) -> Value {
    json!({
        "type": "find-pairing",
        "userId": user,
        "attributes": {"age": age, "sex": sex},
        "criteria": {"sexWanted": wants, "ageFrom": 20, "ageTo": 30}
    })
}

#[tokio::test]
async fn test_pair_chat_and_disconnect() {
    let addr = start_server().await;

    let mut bob = connect(addr, "userId=bob").await;
    assert_eq!(next_json(&mut bob).await["type"], "connected");
    send_json(&mut bob, find_pairing("bob", 22, "female", "male")).await;
    assert_eq!(next_json(&mut bob).await["type"], "queued");

    let mut alice = connect(addr, "userId=alice").await;
    assert_eq!(next_json(&mut alice).await["type"], "connected");
    send_json(&mut alice, find_pairing("alice", 25, "male", "female")).await;

    for ws in [&mut alice, &mut bob] {
        let paired = next_json(ws).await;
        assert_eq!(paired["type"], "paired");
        assert_eq!(paired["sessionId"], "alice_bob");
        assert_eq!(paired["userA"], "alice");
        assert_eq!(paired["userB"], "bob");

        let count = next_json(ws).await;
        assert_eq!(count["type"], "member-count");
        assert_eq!(count["count"], 2);
    }

    send_json(
        &mut alice,
        json!({
            "type": "send-message",
            "sessionId": "alice_bob",
            "userId": "alice",
            "message": "hello",
            "createdAt": 1
        }),
    )
    .await;
    let received = next_json(&mut bob).await;
    assert_eq!(received["type"], "receive-message");
    assert_eq!(received["message"], "hello");
    assert_eq!(received["pending"], false);

    alice.close(None).await.unwrap();

    let ended = next_json(&mut bob).await;
    assert_eq!(ended["type"], "session-ended");
    assert_eq!(ended["userId"], "alice");
    assert_eq!(next_json(&mut bob).await["count"], 1);
}

#[tokio::test]
async fn test_duplicate_identity_is_rejected() {
    let addr = start_server().await;

    let mut first = connect(addr, "userId=carol").await;
    assert_eq!(next_json(&mut first).await["type"], "connected");

    let mut second = connect(addr, "userId=carol").await;
    assert_eq!(next_json(&mut second).await["type"], "already-active");

    // Superseding connection is accepted
    let mut third = connect(addr, "userId=carol&leftPrevious=true").await;
    assert_eq!(next_json(&mut third).await["type"], "connected");
}

#[tokio::test]
async fn test_missing_user_id_fails_handshake() {
    let addr = start_server().await;

    let result = connect_async(format!("ws://{}/", addr)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_invalid_json_gets_error() {
    let addr = start_server().await;

    let mut ws = connect(addr, "userId=dave").await;
    assert_eq!(next_json(&mut ws).await["type"], "connected");

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    let err = next_json(&mut ws).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["code"], "invalid_message");
}

#[tokio::test]
async fn test_rejected_connection_is_closed_promptly() {
    let addr = start_server().await;

    let mut first = connect(addr, "userId=erin").await;
    assert_eq!(next_json(&mut first).await["type"], "connected");

    let mut second = connect(addr, "userId=erin").await;
    assert_eq!(next_json(&mut second).await["type"], "already-active");

    // The writer ends first; the reader must not outlive it until idle timeout
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match second.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
