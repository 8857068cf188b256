//! Integration tests for PING/PONG handling and ping timeouts.

mod common;

use common::{TestClient, TestServer, code};

#[tokio::test]
async fn client_ping_is_answered() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::registered(&server.address(), "alice").await.unwrap();

    alice.send_raw("PING :abc123").await.unwrap();
    assert_eq!(alice.recv().await.unwrap(), ":irc.test PONG irc.test :abc123");
}

#[tokio::test]
async fn silent_client_times_out() {
    let server = TestServer::spawn_with("", "[ping]\nfrequency = 1\ntimeout = 1")
        .await
        .expect("spawn server");
    let mut alice = TestClient::registered(&server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(&server.address(), "bob").await.unwrap();
    alice.join("#x").await.unwrap();
    bob.join("#x").await.unwrap();

    let lines = alice.until_closed().await.unwrap();
    assert!(lines.iter().any(|line| line.starts_with("PING :")));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("ERROR :Closing Link: 127.0.0.1 (Ping timeout)")
    );
}

#[tokio::test]
async fn answering_pings_keeps_the_connection() {
    let server = TestServer::spawn_with("", "[ping]\nfrequency = 1\ntimeout = 2")
        .await
        .expect("spawn server");
    let mut alice = TestClient::registered(&server.address(), "alice").await.unwrap();

    let mut tokens = Vec::new();
    for _ in 0..2 {
        let ping = alice.expect("PING").await.unwrap();
        let token = ping.trim_start_matches("PING :").to_string();
        alice.send_raw(&format!("PONG irc.test :{token}")).await.unwrap();
        tokens.push(token);
    }
    assert_ne!(tokens[0], tokens[1]);

    alice.send_raw("PING :still-here").await.unwrap();
    let lines = alice.recv_until(|line| code(line) == Some("PONG")).await.unwrap();
    assert!(lines.iter().all(|line| !line.starts_with("ERROR")));
}
