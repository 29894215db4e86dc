//! End-to-end tests over real TCP connections.

use pairlink_relay::config::Config;
use pairlink_relay::listener;
use pairlink_relay::server::ChatRelay;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr, nick: &str) -> Self {
        let mut client = Self::connect_raw(addr).await;
        client.send(json!({"type": "presence", "nick": nick})).await;
        client
    }

    async fn connect_raw(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, write) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer: write,
        }
    }

    async fn send(&mut self, packet: Value) {
        let line = format!("{packet}\n");
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        let n = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a packet")
            .unwrap();
        assert!(n > 0, "connection closed while expecting a packet");
        serde_json::from_str(&line).unwrap()
    }

    /// Read packets until one of the given type arrives.
    async fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let packet = self.recv().await;
            if packet["type"] == kind {
                return packet;
            }
        }
    }

    /// Read until the server closes the connection.
    async fn expect_closed(&mut self) {
        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .expect("timed out waiting for close")
                .unwrap();
            if n == 0 {
                return;
            }
        }
    }
}

async fn start_relay() -> (Arc<ChatRelay>, SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.registered_path = dir.path().join("registered.json");
    let relay = Arc::new(ChatRelay::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener::serve(relay.clone(), listener));
    (relay, addr, dir)
}

#[tokio::test]
async fn presence_yields_user_list_broadcast() {
    let (_relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let list = alice.recv_type("user_list").await;
    assert_eq!(list["users"], json!(["alice"]));

    let mut bob = TestClient::connect(addr, "bob").await;
    let list = bob.recv_type("user_list").await;
    assert_eq!(list["users"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn negotiated_message_is_delivered_and_counted() {
    let (relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;

    // Alice accepts the encrypted channel; the response relays to bob.
    alice
        .send(json!({"type": "encrypt_response", "from": "alice", "to": "bob", "status": "accept"}))
        .await;
    let response = bob.recv_type("encrypt_response").await;
    assert_eq!(response["status"], "accept");

    let bytes_before = relay.sessions().await[0].bytes_forwarded;

    let msg = json!({
        "type": "message",
        "from": "bob",
        "to": "alice",
        "content": "hi",
        "encrypted": true
    });
    let expected_len = (serde_json::to_string(&msg).unwrap().len() + 1) as u64;
    bob.send(msg).await;

    let delivered = alice.recv_type("message").await;
    assert_eq!(delivered["content"], "hi");
    assert_eq!(delivered["from"], "bob");

    let sessions = relay.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].bytes_forwarded - bytes_before, expected_len);
}

#[tokio::test]
async fn gated_messages_never_arrive() {
    let (_relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;

    alice
        .send(json!({"type": "encrypt_response", "from": "alice", "to": "bob", "status": "accept"}))
        .await;
    bob.recv_type("encrypt_response").await;

    // Unencrypted over an active session: dropped. The later encrypted
    // message proves the drop, since per-sender order is preserved.
    bob.send(json!({"type": "message", "from": "bob", "to": "alice", "content": "sneaky", "encrypted": false}))
        .await;
    bob.send(json!({"type": "message", "from": "bob", "to": "alice", "content": "legit", "encrypted": true}))
        .await;

    let delivered = alice.recv_type("message").await;
    assert_eq!(delivered["content"], "legit");
}

#[tokio::test]
async fn check_users_returns_registered_subset() {
    let (_relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    alice.recv_type("user_list").await;

    alice
        .send(json!({"type": "check_users", "users": ["alice", "zed"]}))
        .await;
    let reply = alice.recv_type("registered_users").await;
    assert_eq!(reply["users"], json!(["alice"]));
}

#[tokio::test]
async fn ban_closes_notifies_and_rejects_rehandshake() {
    let (relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;
    alice
        .send(json!({"type": "encrypt_response", "from": "alice", "to": "bob", "status": "accept"}))
        .await;
    bob.recv_type("encrypt_response").await;

    relay.ban("alice").await;

    // Alice sees the ban notice, then the connection closes.
    alice.recv_type("ban").await;
    alice.expect_closed().await;

    // Bob sees the teardown and the shrunken user list.
    let teardown = bob.recv_type("end_encryption").await;
    assert_eq!(teardown["reason"], "ban");
    assert_eq!(teardown["from"], "alice");
    let list = bob.recv_type("user_list").await;
    assert_eq!(list["users"], json!(["bob"]));

    // A fresh handshake from alice is rejected with a ban notice.
    let mut again = TestClient::connect(addr, "alice").await;
    let notice = again.recv().await;
    assert_eq!(notice["type"], "ban");
    again.expect_closed().await;
    assert_eq!(relay.online_users().await, vec!["bob"]);
}

#[tokio::test]
async fn disconnect_tears_down_sessions_and_allows_return() {
    let (relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    let mut bob = TestClient::connect(addr, "bob").await;
    alice
        .send(json!({"type": "encrypt_response", "from": "alice", "to": "bob", "status": "accept"}))
        .await;
    bob.recv_type("encrypt_response").await;

    drop(alice);

    let teardown = bob.recv_type("end_encryption").await;
    assert_eq!(teardown["reason"], "disconnect");
    let list = bob.recv_type("user_list").await;
    assert_eq!(list["users"], json!(["bob"]));
    assert!(!relay.is_banned("alice").await);

    // Unlike a ban, alice may reconnect.
    let mut returned = TestClient::connect(addr, "alice").await;
    let list = returned.recv_type("user_list").await;
    assert_eq!(list["users"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn reconnect_takes_over_the_nickname() {
    let (relay, addr, _dir) = start_relay().await;

    let mut first = TestClient::connect(addr, "alice").await;
    first.recv_type("user_list").await;

    let mut second = TestClient::connect(addr, "alice").await;
    let list = second.recv_type("user_list").await;
    assert_eq!(list["users"], json!(["alice"]));

    // The first connection is force-closed; only one handle stays live.
    first.expect_closed().await;
    assert_eq!(relay.online_count().await, 1);
}

#[tokio::test]
async fn malformed_records_do_not_kill_the_connection() {
    let (_relay, addr, _dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    alice.recv_type("user_list").await;

    // Garbage, a record with no type, and an unaddressed unknown type are
    // all discarded without ending the stream.
    alice.writer.write_all(b"this is not json\n").await.unwrap();
    alice.send(json!({"nick": "alice"})).await;
    alice.send(json!({"type": "mystery"})).await;

    alice
        .send(json!({"type": "check_users", "users": ["alice"]}))
        .await;
    let reply = alice.recv_type("registered_users").await;
    assert_eq!(reply["users"], json!(["alice"]));
}

#[tokio::test]
async fn registered_set_survives_restart() {
    let (_relay, addr, dir) = start_relay().await;

    let mut alice = TestClient::connect(addr, "alice").await;
    alice.recv_type("user_list").await;
    drop(alice);

    // A second relay over the same storage path sees alice even though she
    // is long gone.
    let mut config = Config::default();
    config.storage.registered_path = dir.path().join("registered.json");
    let restarted = ChatRelay::new(config);
    let requested = ["alice".to_string(), "zed".to_string()].into_iter().collect();
    assert_eq!(restarted.check_users(&requested).await, vec!["alice"]);
}
