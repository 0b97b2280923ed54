//! WebSocket server + REST endpoints for chat sessions.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::Message;
use super::registry::SessionRegistry;
use super::session::ChatSession;
use crate::error::{Error, SessionError, TransportError};
use crate::identity::FlowContext;

/// Frame from a client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Send {
        text: String,
    },
    Click {
        action: String,
    },
    Submit {
        action: String,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Open,
    Close,
    Reset,
}

/// Frame to a client that is not a session event.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Full log, sent on connect and after lagging.
    MessagesSync { messages: Vec<Message>, open: bool },
    Error { message: String },
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

/// Build the Axum router with chat WebSocket and REST routes.
pub fn chat_routes(registry: Arc<SessionRegistry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat/sessions", post(create_session))
        .route("/api/chat/sessions/{id}", delete(delete_session))
        .route(
            "/api/chat/sessions/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/api/chat/sessions/{id}/actions", post(click_action))
        .route("/api/chat/sessions/{id}/open", post(open_chat))
        .route("/api/chat/sessions/{id}/close", post(close_chat))
        .route("/api/chat/sessions/{id}/reset", post(reset_chat))
        .route("/api/chat/sessions/{id}/login", post(login))
        .route("/api/chat/sessions/{id}/logout", post(logout))
        .route("/ws/chat/{id}", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve `app` until the server stops.
pub async fn serve(addr: &str, app: Router) -> Result<(), TransportError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(addr = %addr, "Chat server started");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "eva-assist"
    }))
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn lookup(state: &AppState, id: &str) -> Result<Arc<ChatSession>, Response> {
    let session_id = Uuid::parse_str(id)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid session ID"))?;
    state
        .registry
        .get(session_id)
        .await
        .map_err(|e| error_response(StatusCode::NOT_FOUND, &e.to_string()))
}

fn queued(result: Result<(), SessionError>) -> Response {
    match result {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "queued" })),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    info!(session_id = %session.id(), "WebSocket client connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn send_sync(socket: &mut WebSocket, session: &ChatSession) -> bool {
    let sync = ServerFrame::MessagesSync {
        messages: session.snapshot().await,
        open: session.is_open(),
    };
    match serde_json::to_string(&sync) {
        Ok(json) => socket.send(WsMessage::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize sync frame");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, session: Arc<ChatSession>) {
    // Subscribe before the sync so nothing falls between them
    let mut rx = session.subscribe();

    if !send_sync(&mut socket, &session).await {
        warn!("Failed to send initial sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            // Forward session events to this client
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(WsMessage::Text(json.into())).await.is_err() {
                                debug!("Client disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS client lagged behind session events");
                        if !send_sync(&mut socket, &session).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Session event channel closed");
                        break;
                    }
                }
            }

            // Receive input from client
            result = socket.recv() => {
                match result {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Err(e) = handle_client_frame(&text, &session).await {
                            let frame = ServerFrame::Error { message: e.to_string() };
                            if let Ok(json) = serde_json::to_string(&frame) {
                                if socket.send(WsMessage::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if socket.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!(session_id = %session.id(), "WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!(session_id = %session.id(), "WebSocket connection closed");
}

async fn handle_client_frame(text: &str, session: &ChatSession) -> Result<(), Error> {
    let frame: ClientFrame = serde_json::from_str(text).map_err(|e| {
        debug!(error = %e, text = text, "Unrecognized WS frame from client");
        TransportError::InvalidFrame(e.to_string())
    })?;

    match frame {
        ClientFrame::Send { text } => session.send_message(&text).await?,
        ClientFrame::Click { action } => session.click(&action).await?,
        ClientFrame::Submit { action, fields } => session.submit_form(&action, &fields).await?,
        ClientFrame::Open => session.open_chat().await?,
        ClientFrame::Close => session.close_chat(),
        ClientFrame::Reset => session.reset_chat().await?,
    }
    Ok(())
}

// ── REST Endpoints ──────────────────────────────────────────────────────

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.registry.create().await;
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "session_id": session.id() })),
    )
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(session_id) = Uuid::parse_str(&id) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid session ID");
    };
    if state.registry.remove(session_id).await {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "removed" })),
        )
            .into_response()
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &SessionError::NotFound { id: session_id }.to_string(),
        )
    }
}

async fn list_messages(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => Json(session.snapshot().await).into_response(),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct SendRequest {
    text: String,
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendRequest>,
) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => queued(session.send_message(&body.text).await),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct ActionRequest {
    action: String,
    #[serde(default)]
    fields: Option<BTreeMap<String, String>>,
}

async fn click_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    let result = match body.fields {
        Some(fields) => session.submit_form(&body.action, &fields).await,
        None => session.click(&body.action).await,
    };
    queued(result)
}

async fn open_chat(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => queued(session.open_chat().await),
        Err(response) => response,
    }
}

async fn close_chat(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => {
            session.close_chat();
            (StatusCode::OK, Json(serde_json::json!({ "status": "closed" }))).into_response()
        }
        Err(response) => response,
    }
}

async fn reset_chat(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup(&state, &id).await {
        Ok(session) => queued(session.reset_chat().await),
        Err(response) => response,
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    user_id: String,
    password: SecretString,
    #[serde(default)]
    context: Option<FlowContext>,
}

async fn login(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    let authenticated = match session.login(&body.user_id, &body.password).await {
        Ok(ok) => ok,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    if !authenticated {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "authenticated": false })),
        )
            .into_response();
    }

    let context = body.context.unwrap_or_default();
    match session.resume_pending(context).await {
        Ok(resumed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "authenticated": true, "resumed": resumed })),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn logout(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let session = match lookup(&state, &id).await {
        Ok(session) => session,
        Err(response) => return response,
    };
    match session.logout() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "logged_out" })),
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssistantConfig;
    use crate::dialogue::Orchestrator;
    use crate::documents::AssetDirectory;
    use crate::identity::{HandoffFlags, MockIdentityStore};
    use crate::store::MemoryStore;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<SessionRegistry>) {
        let identity = Arc::new(MockIdentityStore::new(
            Arc::new(MemoryStore::new()),
            Duration::ZERO,
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(AssistantConfig::default()),
            identity,
        ));
        let registry = SessionRegistry::new(
            orchestrator,
            Arc::new(AssetDirectory::new("./assets/bill.pdf")),
            HandoffFlags::new(Arc::new(MemoryStore::new())),
        );
        (chat_routes(Arc::clone(&registry)), registry)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_service() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "eva-assist");
    }

    #[tokio::test]
    async fn close_unknown_session_is_not_found() {
        let (app, _) = app();
        let uri = format!("/api/chat/sessions/{}/close", Uuid::new_v4());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn click_is_queued() {
        let (app, registry) = app();
        let session = registry.create().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/chat/sessions/{}/actions", session.id()))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"view_bill"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["status"], "queued");
        assert!(session.conversation_state().await.pending_action.is_some());
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let (app, registry) = app();
        let session = registry.create().await;
        let uri = format!("/api/chat/sessions/{}", session.id());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "removed");
        assert!(registry.is_empty().await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(&uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn login_replays_parked_request_for_each_session() {
        let (app, registry) = app();
        let a = registry.create().await;
        let b = registry.create().await;
        a.send_message("view my bill").await.unwrap();
        b.send_message("view my bill").await.unwrap();

        for session in [&b, &a] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri(format!("/api/chat/sessions/{}/login", session.id()))
                        .header("content-type", "application/json")
                        .body(Body::from(
                            r#"{"user_id":"pat@example.com","password":"password1"}"#,
                        ))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await["resumed"], true);
        }

        for session in [&a, &b] {
            session.flush().await.unwrap();
            let log = session.snapshot().await;
            assert!(log.iter().any(|m| m.card.kind() == "bill-summary"));
        }
    }

    #[test]
    fn client_frames_parse() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"send","text":"hi"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Send { text } if text == "hi"));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"submit","action":"submit_payment"}"#).unwrap();
        match frame {
            ClientFrame::Submit { action, fields } => {
                assert_eq!(action, "submit_payment");
                assert!(fields.is_empty());
            }
            other => panic!("Expected Submit, got {other:?}"),
        }

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Reset));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"launch"}"#).is_err());
    }

    #[test]
    fn sync_frame_tag() {
        let frame = ServerFrame::MessagesSync {
            messages: vec![],
            open: false,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "messages_sync");
        assert_eq!(json["messages"], serde_json::json!([]));
    }
}
