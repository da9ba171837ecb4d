mod common;

use appmo_relay::client::{Messenger, ReconnectPolicy};
use appmo_relay::domain::{Conversation, DirectMessage, ServerEvent};
use common::TestApp;
use reqwest::StatusCode;
use std::time::Duration;

#[tokio::test]
async fn send_message_persists_and_lists() {
    let app = TestApp::spawn().await;
    let alice = app.token_for(1);
    let bob = app.token_for(2);

    let response = app.post_message(&alice, 2, "first").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: DirectMessage = response.json().await.expect("message body");
    assert_eq!(created.sender_id, 1);
    assert_eq!(created.receiver_id, 2);
    assert_eq!(created.content, "first");
    assert!(!created.read);

    app.post_message(&alice, 2, "second").await;

    // Oldest first, from the sender's side.
    let messages: Vec<DirectMessage> = app
        .client
        .get(format!("{}/v1/messages/2", app.server_url))
        .bearer_auth(&alice)
        .send()
        .await
        .expect("list messages")
        .json()
        .await
        .expect("messages body");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "first");
    assert_eq!(messages[1].content, "second");
    assert!(messages[0].created_at <= messages[1].created_at);

    // The receiver sees the same conversation.
    let from_bob: Vec<DirectMessage> = app
        .client
        .get(format!("{}/v1/messages/1", app.server_url))
        .bearer_auth(&bob)
        .send()
        .await
        .expect("list messages")
        .json()
        .await
        .expect("messages body");
    assert_eq!(from_bob.len(), 2);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/v1/messages/2", app.server_url))
        .json(&serde_json::json!({ "content": "hi" }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(format!("{}/v1/conversations", app.server_url))
        .bearer_auth("garbage")
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn self_sends_and_empty_content_are_rejected() {
    let app = TestApp::spawn().await;
    let alice = app.token_for(1);

    let response = app.post_message(&alice, 1, "to myself").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.post_message(&alice, 2, "   ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mark_read_is_scoped_and_monotonic() {
    let app = TestApp::spawn().await;
    let alice = app.token_for(1);
    let bob = app.token_for(2);
    let carol = app.token_for(3);

    app.post_message(&alice, 2, "one").await;
    app.post_message(&alice, 2, "two").await;
    app.post_message(&carol, 2, "from carol").await;

    // Bob flips the alice conversation only.
    let response = app
        .client
        .post(format!("{}/v1/messages/1/read", app.server_url))
        .bearer_auth(&bob)
        .send()
        .await
        .expect("mark read");
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["updated"], 2);

    // Repeating is a no-op; already-read rows stay read.
    let response = app
        .client
        .post(format!("{}/v1/messages/1/read", app.server_url))
        .bearer_auth(&bob)
        .send()
        .await
        .expect("mark read");
    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["updated"], 0);

    let conversations: Vec<Conversation> = app
        .client
        .get(format!("{}/v1/conversations", app.server_url))
        .bearer_auth(&bob)
        .send()
        .await
        .expect("conversations")
        .json()
        .await
        .expect("body");
    assert_eq!(conversations.len(), 2);
    let alice_conv = conversations.iter().find(|c| c.peer_id == 1).expect("alice conversation");
    assert_eq!(alice_conv.unread_count, 0);
    let carol_conv = conversations.iter().find(|c| c.peer_id == 3).expect("carol conversation");
    assert_eq!(carol_conv.unread_count, 1);
}

#[tokio::test]
async fn conversations_order_by_recency() {
    let app = TestApp::spawn().await;
    let alice = app.token_for(1);
    let carol = app.token_for(3);

    app.post_message(&alice, 2, "older").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    app.post_message(&carol, 2, "newer").await;

    let conversations: Vec<Conversation> = app
        .client
        .get(format!("{}/v1/conversations", app.server_url))
        .bearer_auth(app.token_for(2))
        .send()
        .await
        .expect("conversations")
        .json()
        .await
        .expect("body");
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].peer_id, 3);
    assert_eq!(conversations[1].peer_id, 1);
}

#[tokio::test]
async fn dual_path_send_pushes_and_persists() {
    let app = TestApp::spawn().await;

    let messenger =
        Messenger::new(app.server_url.clone(), app.ws_url.clone(), 1, app.token_for(1), ReconnectPolicy::default());
    messenger.connect();
    let mut status = messenger.connection().watch_status();
    tokio::time::timeout(Duration::from_secs(2), async {
        status.wait_for(|s| *s == appmo_relay::client::ConnectionStatus::Connected).await
    })
    .await
    .expect("connect timeout")
    .expect("status channel");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut bob = app.connect_ws(2).await;

    let sent = messenger.send_direct_message(2, "hi bob").await.expect("send");
    assert_eq!(sent.content, "hi bob");

    // Realtime path: bob's socket sees the push.
    let event = bob.recv_event(Duration::from_secs(2)).await.expect("push to bob");
    let ServerEvent::NewMessage { message } = event else {
        panic!("expected new_message, got {event:?}");
    };
    assert_eq!(message.content, "hi bob");

    // Durable path: the same content is readable over REST.
    let stored: Vec<DirectMessage> = app
        .client
        .get(format!("{}/v1/messages/1", app.server_url))
        .bearer_auth(app.token_for(2))
        .send()
        .await
        .expect("list messages")
        .json()
        .await
        .expect("body");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hi bob");

    messenger.close().await;
}

#[tokio::test]
async fn rest_send_works_while_disconnected() {
    let app = TestApp::spawn().await;

    // Never connected: the socket push is skipped, REST still persists.
    let messenger =
        Messenger::new(app.server_url.clone(), app.ws_url.clone(), 1, app.token_for(1), ReconnectPolicy::default());

    let sent = messenger.send_direct_message(2, "offline send").await.expect("send");
    assert_eq!(sent.content, "offline send");

    let stored = messenger.conversation(2).await.expect("fetch");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "offline send");
}
