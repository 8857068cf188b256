//! Integration tests for connection registration and the nickname lifecycle.

mod common;

use common::{TestClient, TestServer, code};
use lanternd::state::Connection;
use std::time::Duration;

#[tokio::test]
async fn welcome_fires_once_and_rename_updates_identity() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::connect(&server.address(), "alice").await.unwrap();

    alice.send_raw("NICK alice").await.unwrap();
    alice.send_raw("USER a 0 0 :Alice A").await.unwrap();
    let burst = alice
        .recv_until(|line| code(line) == Some("422"))
        .await
        .unwrap();
    let codes: Vec<_> = burst.iter().filter_map(|l| code(l)).collect();
    assert_eq!(codes, vec!["001", "002", "003", "004", "005", "422"]);
    assert!(burst[0].starts_with(":irc.test 001 alice :Welcome to the "));
    assert!(burst[0].ends_with(" alice!~a@127.0.0.1"));

    alice.send_raw("NICK alice2").await.unwrap();
    assert_eq!(alice.recv().await.unwrap(), ":alice!~a@127.0.0.1 NICK :alice2");

    // More USER/NICK after registration never replays the burst.
    alice.send_raw("USER b 0 0 :Other").await.unwrap();
    assert_eq!(
        alice.recv().await.unwrap(),
        ":irc.test 462 alice2 :Unauthorized command (already registered)"
    );
    alice.send_raw("NICK alice3").await.unwrap();
    alice.send_raw("PING :probe").await.unwrap();
    let rest = alice.recv_until(|line| code(line) == Some("PONG")).await.unwrap();
    assert!(rest.iter().all(|line| code(line) != Some("001")));
    assert_eq!(rest[0], ":alice2!~a@127.0.0.1 NICK :alice3");

    let conn = server.hub.connections.find_by_common_name("ALICE3").unwrap();
    assert_eq!(conn.common_name().as_deref(), Some("alice3"));
    assert!(server.hub.connections.find_by_common_name("alice").is_none());
}

#[tokio::test]
async fn second_nick_claim_is_refused() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut first = TestClient::connect(&server.address(), "bob").await.unwrap();
    let mut second = TestClient::connect(&server.address(), "bob").await.unwrap();

    first.send_raw("NICK bob").await.unwrap();
    // Let the first claim commit before the second arrives.
    first.send_raw("PING :sync").await.unwrap();
    first.expect("PONG").await.unwrap();

    second.send_raw("NICK Bob").await.unwrap();
    assert_eq!(
        second.recv().await.unwrap(),
        ":irc.test 433 * Bob :Nickname is already in use"
    );

    // The loser keeps its placeholder and can pick another nick.
    second.send_raw("NICK carol").await.unwrap();
    second.send_raw("USER carol 0 * :Carol").await.unwrap();
    let welcome = second.expect("001").await.unwrap();
    assert!(welcome.starts_with(":irc.test 001 carol "));

    first.send_raw("USER bob 0 * :Bob").await.unwrap();
    let welcome = first.expect("001").await.unwrap();
    assert!(welcome.starts_with(":irc.test 001 bob "));
}

#[tokio::test]
async fn illegal_nicknames_are_rejected_without_disconnect() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(&server.address(), "x").await.unwrap();

    client.send_raw("NICK 9lives").await.unwrap();
    assert_eq!(code(&client.recv().await.unwrap()), Some("432"));
    client.send_raw("NICK").await.unwrap();
    assert_eq!(code(&client.recv().await.unwrap()), Some("431"));

    client.send_raw("NICK fine").await.unwrap();
    client.send_raw("USER fine 0 * :Fine").await.unwrap();
    client.expect("001").await.unwrap();
}

#[tokio::test]
async fn illegal_username_disconnects() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(&server.address(), "x").await.unwrap();

    client.send_raw("USER bad@user 0 * :Bad").await.unwrap();
    let lines = client.until_closed().await.unwrap();
    assert_eq!(
        lines,
        vec!["ERROR :Closing Link: 127.0.0.1 (Invalid username)".to_string()]
    );
}

#[tokio::test]
async fn password_gates_registration() {
    let server = TestServer::spawn_with("password_required = true\npassword = \"sesame\"", "")
        .await
        .expect("spawn server");
    let mut client = TestClient::connect(&server.address(), "dave").await.unwrap();

    client.send_raw("NICK dave").await.unwrap();
    client.send_raw("USER dave 0 * :Dave").await.unwrap();
    client.send_raw("PASS wrong").await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        ":irc.test 464 dave :Password incorrect"
    );

    client.send_raw("PASS sesame").await.unwrap();
    let welcome = client.recv().await.unwrap();
    assert!(welcome.starts_with(":irc.test 001 dave "));
}

#[tokio::test]
async fn commands_before_registration_are_refused() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut client = TestClient::connect(&server.address(), "x").await.unwrap();

    client.send_raw("JOIN #x").await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        ":irc.test 451 * :You have not registered"
    );
    client.send_raw("FROB").await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        ":irc.test 421 * FROB :Unknown command"
    );
}

#[tokio::test]
async fn registration_timeout_closes_the_connection() {
    let server = TestServer::spawn_with("", "[registration]\ntimeout = 1")
        .await
        .expect("spawn server");
    let mut client = TestClient::connect(&server.address(), "slow").await.unwrap();
    client.send_raw("NICK slow").await.unwrap();

    let lines = client.until_closed().await.unwrap();
    assert_eq!(
        lines.last().map(String::as_str),
        Some("ERROR :Closing Link: 127.0.0.1 (Registration timeout)")
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.hub.connections.is_empty());
}

#[tokio::test]
async fn quit_reaches_channel_peers() {
    let server = TestServer::spawn().await.expect("spawn server");
    let mut alice = TestClient::registered(&server.address(), "alice").await.unwrap();
    let mut bob = TestClient::registered(&server.address(), "bob").await.unwrap();
    alice.join("#x").await.unwrap();
    bob.join("#x").await.unwrap();
    alice.drain().await;

    bob.send_raw("QUIT :gone fishing").await.unwrap();
    let lines = bob.until_closed().await.unwrap();
    assert_eq!(
        lines.last().map(String::as_str),
        Some("ERROR :Closing Link: 127.0.0.1 (Quit: gone fishing)")
    );
    assert_eq!(
        alice.recv().await.unwrap(),
        ":bob!~bob@127.0.0.1 QUIT :Quit: gone fishing"
    );
}
