//! Integration tests for operator privileges: OPER, MODE on other users,
//! KILL and STOP.

mod common;

use common::{TestClient, TestServer, code};

const OPER_BLOCK: &str = "[[oper]]\nname = \"root\"\npassword = \"hunter2\"\n";

async fn opered(server: &TestServer, nick: &str) -> TestClient {
    let mut client = TestClient::registered(&server.address(), nick).await.unwrap();
    client.send_raw("OPER root hunter2").await.unwrap();
    client.expect("381").await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        format!(":irc.test MODE {nick} :+o")
    );
    client
}

#[tokio::test]
async fn oper_cannot_set_other_users_modes_by_default() {
    let server = TestServer::spawn_with("", OPER_BLOCK).await.expect("spawn server");
    let mut oper = opered(&server, "oper").await;
    let mut bob = TestClient::registered(&server.address(), "bob").await.unwrap();

    oper.send_raw("MODE bob +i").await.unwrap();
    assert_eq!(
        oper.recv().await.unwrap(),
        ":irc.test 502 oper :Can't change mode for other users"
    );
    assert!(bob.drain().await.is_empty());
}

#[tokio::test]
async fn oper_policy_allows_other_users_modes() {
    let sections = format!("[policy]\nopers_set_user_modes = true\n\n{OPER_BLOCK}");
    let server = TestServer::spawn_with("", &sections).await.expect("spawn server");
    let mut oper = opered(&server, "oper").await;
    let mut bob = TestClient::registered(&server.address(), "bob").await.unwrap();

    oper.send_raw("MODE bob +i").await.unwrap();
    let confirm = ":oper!~oper@127.0.0.1 MODE bob :+i";
    assert_eq!(bob.recv().await.unwrap(), confirm);
    assert_eq!(oper.recv().await.unwrap(), confirm);

    bob.send_raw("MODE bob").await.unwrap();
    assert_eq!(bob.recv().await.unwrap(), ":irc.test 221 bob +i");
}

#[tokio::test]
async fn wrong_oper_password_is_refused() {
    let server = TestServer::spawn_with("", OPER_BLOCK).await.expect("spawn server");
    let mut alice = TestClient::registered(&server.address(), "alice").await.unwrap();

    alice.send_raw("OPER root letmein").await.unwrap();
    assert_eq!(
        alice.recv().await.unwrap(),
        ":irc.test 464 alice :Password incorrect"
    );
    alice.send_raw("KILL alice").await.unwrap();
    assert_eq!(code(&alice.recv().await.unwrap()), Some("481"));
}

#[tokio::test]
async fn kill_disconnects_the_target() {
    let server = TestServer::spawn_with("", OPER_BLOCK).await.expect("spawn server");
    let mut oper = opered(&server, "oper").await;
    let mut bob = TestClient::registered(&server.address(), "bob").await.unwrap();

    oper.send_raw("KILL bob :spamming").await.unwrap();
    let lines = bob.until_closed().await.unwrap();
    assert_eq!(
        lines.last().map(String::as_str),
        Some("ERROR :Closing Link: 127.0.0.1 (Killed (oper (spamming)))")
    );
    assert!(server.hub.connections.find_by_common_name("bob").is_none());
}

#[tokio::test]
async fn stop_disconnects_everyone_and_closes_listeners() {
    let server = TestServer::spawn_with("", OPER_BLOCK).await.expect("spawn server");
    let address = server.address();
    let mut oper = opered(&server, "oper").await;
    let mut bob = TestClient::registered(&address, "bob").await.unwrap();

    oper.send_raw("STOP").await.unwrap();
    for client in [&mut oper, &mut bob] {
        let lines = client.until_closed().await.unwrap();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("ERROR :Closing Link: 127.0.0.1 (Server shutting down)")
        );
    }

    server.wait_stopped().await.unwrap();
    assert!(TestClient::connect(&address, "late").await.is_err());
}
