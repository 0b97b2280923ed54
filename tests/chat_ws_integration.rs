//! Integration tests for the chat WebSocket + REST surface.
//!
//! Each test spins up an Axum server on a random port, connects via
//! tokio-tungstenite or reqwest, and exercises the real WS / REST contract.
//! Dialogue delays are zeroed so scripts complete as soon as they are queued.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use eva_assist::chat::SessionRegistry;
use eva_assist::chat::ws::chat_routes;
use eva_assist::config::AssistantConfig;
use eva_assist::dialogue::Orchestrator;
use eva_assist::documents::AssetDirectory;
use eva_assist::identity::{HandoffFlags, MockIdentityStore};
use eva_assist::store::MemoryStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn instant_config() -> AssistantConfig {
    AssistantConfig {
        typing_delay: Duration::ZERO,
        sign_in_follow_up_delay: Duration::ZERO,
        amount_confirm_delay: Duration::ZERO,
        analysis_delay: Duration::ZERO,
        download_delay: Duration::ZERO,
        payment_processing_delay: Duration::ZERO,
        resume_delay: Duration::ZERO,
        reopen_delay: Duration::ZERO,
        login_delay: Duration::ZERO,
        ..AssistantConfig::default()
    }
}

/// Start an Axum server on a random port, return (port, registry).
async fn start_server() -> (u16, Arc<SessionRegistry>) {
    let config = Arc::new(instant_config());
    let identity = Arc::new(MockIdentityStore::new(
        Arc::new(MemoryStore::new()),
        Duration::ZERO,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        config,
        identity,
    ));
    let documents = Arc::new(AssetDirectory::new("./assets/does-not-exist.pdf"));
    let registry = SessionRegistry::new(
        orchestrator,
        documents,
        HandoffFlags::new(Arc::new(MemoryStore::new())),
    );
    let app = chat_routes(Arc::clone(&registry));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, registry)
}

/// Create a session over REST and return its id.
async fn create_session(port: u16) -> String {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/chat/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

/// Read frames until one with the given `type` arrives.
async fn next_of_type<S>(ws: &mut S, kind: &str) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        if json["type"] == kind {
            return json;
        }
    }
}

/// Poll the REST log until `pred` holds.
async fn wait_for_log(port: u16, id: &str, pred: impl Fn(&[Value]) -> bool) -> Vec<Value> {
    loop {
        let log: Vec<Value> = reqwest::get(format!(
            "http://127.0.0.1:{port}/api/chat/sessions/{id}/messages"
        ))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        if pred(&log) {
            return log;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── WebSocket Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn ws_connect_receives_empty_sync() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;

        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{port}/ws/chat/{id}"))
            .await
            .expect("WS connect failed");

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "messages_sync");
        assert!(json["messages"].as_array().unwrap().is_empty());
        assert_eq!(json["open"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_open_frame_greets() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/chat/{id}"))
            .await
            .unwrap();
        next_of_type(&mut ws, "messages_sync").await;

        ws.send(Message::Text(json!({"type": "open"}).to_string().into()))
            .await
            .unwrap();

        let visibility = next_of_type(&mut ws, "chat_visibility").await;
        assert_eq!(visibility["open"], true);

        let appended = next_of_type(&mut ws, "message_appended").await;
        assert_eq!(appended["message"]["author"], "bot");
        assert_eq!(appended["message"]["card"]["type"], "text");
        assert!(
            appended["message"]["card"]["text"]
                .as_str()
                .unwrap()
                .starts_with("Hi! I'm EVA")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_guest_request_gets_sign_in_card() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/chat/{id}"))
            .await
            .unwrap();
        next_of_type(&mut ws, "messages_sync").await;

        ws.send(Message::Text(
            json!({"type": "send", "text": "view my bill"}).to_string().into(),
        ))
        .await
        .unwrap();

        let user = next_of_type(&mut ws, "message_appended").await;
        assert_eq!(user["message"]["author"], "user");
        assert_eq!(user["message"]["card"]["text"], "view my bill");

        let prompt = next_of_type(&mut ws, "message_appended").await;
        assert_eq!(prompt["message"]["card"]["type"], "card");
        assert_eq!(prompt["message"]["card"]["title"], "Sign in required");
        assert_eq!(prompt["message"]["card"]["buttons"][0]["action"], "login");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_login_button_redirects() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/chat/{id}"))
            .await
            .unwrap();
        next_of_type(&mut ws, "messages_sync").await;

        for frame in [
            json!({"type": "click", "action": "login"}),
            json!({"type": "send", "text": "pat@example.com"}),
        ] {
            ws.send(Message::Text(frame.to_string().into())).await.unwrap();
        }

        let redirect = next_of_type(&mut ws, "redirect").await;
        assert_eq!(redirect["path"], "/login");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_invalid_frame_returns_error() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/chat/{id}"))
            .await
            .unwrap();
        next_of_type(&mut ws, "messages_sync").await;

        ws.send(Message::Text(r#"{"type":"teleport"}"#.into()))
            .await
            .unwrap();
        let error = next_of_type(&mut ws, "error").await;
        assert!(error["message"].as_str().unwrap().contains("Invalid client frame"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_unknown_session_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let missing = uuid::Uuid::new_v4();
        let result = connect_async(format!("ws://127.0.0.1:{port}/ws/chat/{missing}")).await;
        assert!(result.is_err());
    })
    .await
    .expect("test timed out");
}

// ── REST Endpoint Tests ──────────────────────────────────────────────

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "eva-assist");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_create_session_registers_it() {
    timeout(TEST_TIMEOUT, async {
        let (port, registry) = start_server().await;
        let id = create_session(port).await;

        assert_eq!(registry.len().await, 1);
        let log = wait_for_log(port, &id, |_| true).await;
        assert!(log.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_message_then_login_resumes_request() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/chat/sessions/{id}/messages"))
            .json(&json!({"text": "show my bill"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
        wait_for_log(port, &id, |log| log.len() >= 3).await;

        let resp = client
            .post(format!("http://127.0.0.1:{port}/api/chat/sessions/{id}/login"))
            .json(&json!({"user_id": "pat@example.com", "password": "correct-horse"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["resumed"], true);

        let log = wait_for_log(port, &id, |log| {
            log.iter().any(|m| m["card"]["type"] == "bill-summary")
        })
        .await;
        let bill = log
            .iter()
            .find(|m| m["card"]["type"] == "bill-summary")
            .unwrap();
        assert_eq!(bill["card"]["bill_data"]["account_number"], "287301224446");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_login_rejects_short_password() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let id = create_session(port).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/api/chat/sessions/{id}/login"))
            .json(&json!({"user_id": "pat", "password": "short"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_invalid_session_id_returns_400() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/api/chat/sessions/not-a-uuid/messages"
        ))
        .await
        .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_unknown_session_returns_404() {
    timeout(TEST_TIMEOUT, async {
        let (port, _registry) = start_server().await;
        let missing = uuid::Uuid::new_v4();

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}/api/chat/sessions/{missing}/actions"))
            .json(&json!({"action": "view_bill"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_delete_ends_session() {
    timeout(TEST_TIMEOUT, async {
        let (port, registry) = start_server().await;
        let id = create_session(port).await;
        let client = reqwest::Client::new();
        assert_eq!(registry.len().await, 1);

        let resp = client
            .delete(format!("http://127.0.0.1:{port}/api/chat/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(registry.is_empty().await);

        let resp = client
            .get(format!("http://127.0.0.1:{port}/api/chat/sessions/{id}/messages"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client
            .delete(format!("http://127.0.0.1:{port}/api/chat/sessions/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}
