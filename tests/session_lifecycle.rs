//! Integration tests for session lifecycle: authentication, presence, and
//! disconnect cleanup.

mod common;

use common::{TestClient, TestServer};
use slchat_proto::{ClientEvent, ServerEvent};
use std::time::Duration;

#[tokio::test]
async fn connect_authenticates_and_lands_in_default_room() {
    let server = TestServer::spawn(17711)
        .await
        .expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("connect alice");

    let joined = alice.expect("joined_room").await.expect("joined_room");
    let ServerEvent::JoinedRoom { room, users } = joined else {
        panic!("wrong event");
    };
    assert_eq!(room, "general");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "alice");
}

#[tokio::test]
async fn bad_assertion_is_rejected_before_any_state() {
    let server = TestServer::spawn(17712)
        .await
        .expect("Failed to spawn test server");

    let mut mallory = TestClient::connect(&server.address(), "mallory")
        .await
        .expect("tcp connect");
    let forged = mallory.mint_token("wrong-secret-wrong-secret");
    mallory
        .send(ClientEvent::Auth { token: forged })
        .await
        .expect("send auth");

    let event = mallory.recv().await.expect("error event");
    let ServerEvent::Error { code, .. } = event else {
        panic!("expected error event, got {event:?}");
    };
    assert_eq!(code, "authentication_error");

    // The daemon closes the link after the error notice.
    assert!(mallory.recv().await.is_err());

    // No ghost appeared in presence: a real login sees only itself.
    let mut alice = server.connect("alice").await.expect("connect alice");
    let roster = alice.expect("user_list").await.expect("user_list");
    let ServerEvent::UserList { users } = roster else {
        panic!("wrong event");
    };
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn events_before_auth_close_the_connection() {
    let server = TestServer::spawn(17713)
        .await
        .expect("Failed to spawn test server");

    let mut eve = TestClient::connect(&server.address(), "eve")
        .await
        .expect("tcp connect");
    eve.send(ClientEvent::Typing { is_typing: true })
        .await
        .expect("send typing");

    let event = eve.recv().await.expect("error event");
    assert_eq!(event.name(), "error");
    assert!(eve.recv().await.is_err());
}

#[tokio::test]
async fn disconnect_cleanup_is_complete() {
    let server = TestServer::spawn(17714)
        .await
        .expect("Failed to spawn test server");

    let mut alice = server.connect("alice").await.expect("connect alice");
    alice.expect("joined_room").await.expect("alice joined");

    let mut bob = server.connect("bob").await.expect("connect bob");
    bob.expect("joined_room").await.expect("bob joined");
    alice.drain().await;
    bob.drain().await;

    // Alice starts typing, then the wire drops mid-session.
    alice
        .send(ClientEvent::Typing { is_typing: true })
        .await
        .expect("send typing");
    let typing = bob.expect("typing_users").await.expect("typing");
    let ServerEvent::TypingUsers { users, .. } = typing else {
        panic!("wrong event");
    };
    assert_eq!(users, ["alice"]);

    drop(alice);

    // Bob observes the full cleanup: room departure, typing sweep, global
    // presence delta, and a refreshed roster without alice.
    let events = bob
        .recv_until(|e| e.name() == "user_list")
        .await
        .expect("cleanup events");

    let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    assert!(names.contains(&"user_left_room"));
    assert!(names.contains(&"user_left"));

    let typing_sweep = events.iter().find_map(|e| match e {
        ServerEvent::TypingUsers { users, .. } => Some(users.clone()),
        _ => None,
    });
    assert_eq!(typing_sweep, Some(vec![]));

    let ServerEvent::UserList { users } = events.last().expect("roster") else {
        panic!("wrong event");
    };
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, "bob");

    // Bob is unaffected and still fully functional.
    bob.send(ClientEvent::Typing { is_typing: true })
        .await
        .expect("send typing");
    let event = bob
        .recv_timeout(Duration::from_secs(5))
        .await
        .expect("bob still served");
    assert_eq!(event.name(), "typing_users");
}
