//! HTTP and WebSocket ingress tests against a live server

mod common;

use common::*;
use futures::{SinkExt, StreamExt};
use rootbot_engine::adapter::{BufferedSink, ReplySink};
use rootbot_engine::auth::{ClaimsValidator, CredentialProvider};
use rootbot_engine::bot::root::{BACK_IN_ROOT_MESSAGE, DEFAULT_REPLY};
use rootbot_engine::server::{self, ServerState};
use sdk::activity::{Activity, ActivityType};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

const ROOT_APP_ID: &str = "root-app";
const SECRET: &str = "shared-secret";

struct TestServer {
    addr: SocketAddr,
    harness: Harness,
    connector: Arc<BufferedSink>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(validator: ClaimsValidator) -> Self {
        let harness = Harness::new(MockSkillClient::ok());
        let connector = Arc::new(BufferedSink::new());
        let connector_sink: Arc<dyn ReplySink> = connector.clone();

        let state = ServerState::new(
            Arc::clone(&harness.adapter),
            registry(),
            Arc::clone(&harness.conversation_ids),
            Arc::new(validator),
            connector_sink,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server::serve(listener, state, async move {
                rx.await.ok();
            })
            .await
            .unwrap();
        });

        Self {
            addr,
            harness,
            connector,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn without_auth() -> Self {
        Self::start(ClaimsValidator::new("", "", Vec::<String>::new())).await
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn skill_url(&self, skill_conversation_id: &str) -> String {
        self.url(&format!(
            "/api/skills/v3/conversations/{}/activities",
            skill_conversation_id
        ))
    }

    /// Start a skill session for `conversation_id` and return the skill's
    /// conversation id for it
    async fn start_session(&self, conversation_id: &str) -> String {
        let activity = message(conversation_id, "skill");
        let reference = activity.conversation_reference();
        self.harness.turn(activity).await;
        self.harness
            .conversation_ids
            .create_skill_conversation_id(&reference, SKILL_ID)
    }

    /// Wait until the connector has received `count` activities
    async fn connector_activities(&self, count: usize) -> Vec<Activity> {
        let mut received = Vec::new();
        for _ in 0..100 {
            received.extend(self.connector.take());
            if received.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        received
    }
}

fn post_json(url: &str, body: &Value) -> reqwest::RequestBuilder {
    reqwest::Client::new().post(url).json(body)
}

#[tokio::test]
async fn test_health_lists_skills() {
    let server = TestServer::without_auth().await;

    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["skills"], json!([SKILL_ID]));
}

#[tokio::test]
async fn test_expect_replies_returns_activities_in_body() {
    let server = TestServer::without_auth().await;
    let mut activity = message("c1", "hello");
    activity.delivery_mode = Some("expectReplies".to_string());

    let response = post_json(&server.url("/api/messages"), &serde_json::to_value(&activity).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let activities = body["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["text"], DEFAULT_REPLY);
    assert_eq!(activities[0]["replyToId"], json!(activity.id));
    assert!(server.connector.take().is_empty());
}

#[tokio::test]
async fn test_normal_delivery_goes_to_connector() {
    let server = TestServer::without_auth().await;
    let activity = message("c1", "hello");

    let response = post_json(&server.url("/api/messages"), &serde_json::to_value(&activity).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let delivered = server.connector.take();
    assert_eq!(texts(&delivered), vec![DEFAULT_REPLY.to_string()]);
}

#[tokio::test]
async fn test_activity_without_conversation_is_bad_request() {
    let server = TestServer::without_auth().await;

    let response = post_json(&server.url("/api/messages"), &json!({"type": "message", "text": "hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_skill_callback_unknown_conversation_is_not_found() {
    let server = TestServer::without_auth().await;

    let response = post_json(
        &server.skill_url("nope-EchoSkillBot-test-skillconvo"),
        &json!({"type": "message", "text": "hi"}),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_skill_message_is_relayed_to_user() {
    let server = TestServer::without_auth().await;
    let skill_conversation_id = server.start_session("c1").await;
    server.connector.take();

    let response = post_json(
        &server.url(&format!(
            "/api/skills/v3/conversations/{}/activities/orig-1",
            skill_conversation_id
        )),
        &json!({"type": "message", "text": "Echo: hi", "id": "skill-msg-1"}),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], "skill-msg-1");

    let delivered = server.connector.take();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].text.as_deref(), Some("Echo: hi"));
    assert_eq!(delivered[0].conversation_id(), Some("c1"));
    assert_eq!(delivered[0].reply_to_id.as_deref(), Some("orig-1"));
    assert_eq!(delivered[0].recipient.as_ref().unwrap().id, "user1");
    assert_eq!(
        delivered[0].service_url.as_deref(),
        Some("http://localhost:5000")
    );
}

#[tokio::test]
async fn test_skill_end_of_conversation_returns_to_root() {
    let server = TestServer::without_auth().await;
    let skill_conversation_id = server.start_session("c1").await;
    server.connector.take();

    let response = post_json(
        &server.skill_url(&skill_conversation_id),
        &json!({"type": "endOfConversation", "code": "completedSuccessfully"}),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    let delivered = server.connector_activities(2).await;
    assert_eq!(
        texts(&delivered),
        vec![
            "Received endOfConversation.\n\nCode: completedSuccessfully".to_string(),
            BACK_IN_ROOT_MESSAGE.to_string(),
        ]
    );
    assert_eq!(server.harness.active_skill("c1").await, None);
    assert!(server
        .harness
        .conversation_ids
        .get_conversation_reference(&skill_conversation_id)
        .is_none());
}

#[tokio::test]
async fn test_skill_callback_requires_token_when_auth_enabled() {
    let server = TestServer::start(ClaimsValidator::new(
        ROOT_APP_ID,
        SECRET,
        vec!["echo-skill-app"],
    ))
    .await;
    let skill_conversation_id = server.start_session("c1").await;
    let body = json!({"type": "message", "text": "Echo: hi"});

    let response = post_json(&server.skill_url(&skill_conversation_id), &body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let stranger = CredentialProvider::new("stranger-app", SECRET, 60)
        .token_for(ROOT_APP_ID)
        .unwrap()
        .unwrap();
    let response = post_json(&server.skill_url(&skill_conversation_id), &body)
        .bearer_auth(stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let token = CredentialProvider::new("echo-skill-app", SECRET, 60)
        .token_for(ROOT_APP_ID)
        .unwrap()
        .unwrap();
    let response = post_json(&server.skill_url(&skill_conversation_id), &body)
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_websocket_turns_reply_on_socket() {
    let server = TestServer::without_auth().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/messages/ws", server.addr))
        .await
        .unwrap();

    let activity = message("ws-1", "hello");
    socket
        .send(Message::Text(serde_json::to_string(&activity).unwrap()))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply: Activity = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(reply.text.as_deref(), Some(DEFAULT_REPLY));
    assert_eq!(reply.conversation_id(), Some("ws-1"));

    socket.close(None).await.ok();
}

#[tokio::test]
async fn test_skill_replies_reach_websocket_conversation() {
    let server = TestServer::without_auth().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/messages/ws", server.addr))
        .await
        .unwrap();

    let activity = message("ws-2", "skill");
    let reference = activity.conversation_reference();
    socket
        .send(Message::Text(serde_json::to_string(&activity).unwrap()))
        .await
        .unwrap();

    // "Got it, connecting you to the skill..."
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let connecting: Activity = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert!(connecting.is_type(&ActivityType::Message));

    let skill_conversation_id = server
        .harness
        .conversation_ids
        .create_skill_conversation_id(&reference, SKILL_ID);
    let response = post_json(
        &server.skill_url(&skill_conversation_id),
        &json!({"type": "message", "text": "Echo: skill"}),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(response.status(), 200);

    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let relayed: Activity = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(relayed.text.as_deref(), Some("Echo: skill"));
    assert!(server.connector.take().is_empty());

    socket.close(None).await.ok();
}

#[tokio::test]
async fn test_malformed_websocket_frame_keeps_connection_open() {
    let server = TestServer::without_auth().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/messages/ws", server.addr))
        .await
        .unwrap();

    socket
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let error: Activity = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert!(error.is_type(&ActivityType::Trace));

    socket
        .send(Message::Text(
            serde_json::to_string(&message("ws-3", "hello")).unwrap(),
        ))
        .await
        .unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply: Activity = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(reply.text.as_deref(), Some(DEFAULT_REPLY));
}

#[tokio::test]
async fn test_websocket_rejects_second_conversation() {
    let server = TestServer::without_auth().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/messages/ws", server.addr))
        .await
        .unwrap();

    for conversation in ["ws-4", "ws-5"] {
        socket
            .send(Message::Text(
                serde_json::to_string(&message(conversation, "hello")).unwrap(),
            ))
            .await
            .unwrap();
    }

    let mut frames = Vec::new();
    for _ in 0..2 {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        frames.push(serde_json::from_str::<Activity>(frame.to_text().unwrap()).unwrap());
    }

    assert_eq!(frames[0].text.as_deref(), Some(DEFAULT_REPLY));
    assert_eq!(frames[0].conversation_id(), Some("ws-4"));
    assert!(frames[1].is_type(&ActivityType::Trace));
    assert_eq!(frames[1].label.as_deref(), Some("InvalidActivity"));
    assert!(frames[1].value.as_ref().unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("ws-4"));
    assert_eq!(server.harness.active_skill("ws-5").await, None);

    socket.close(None).await.ok();
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let mut server = TestServer::without_auth().await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), 200);

    server.shutdown.take().unwrap().send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), &mut server.handle)
        .await
        .expect("server did not shut down")
        .unwrap();
}
