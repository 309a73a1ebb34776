//! Integration tests: run an in-process mock of the dbchat REST service on a free
//! port and drive the real clients, session store, conversation and sidebar against it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dbchat::api::{AuthClient, ChatClient};
use dbchat::conversation::{Conversation, ConversationState, Persistence};
use dbchat::history::HistorySidebar;
use dbchat::models::{LoginCredentials, ModelType, RegisterData, Role, APOLOGY};
use dbchat::routing::{Navigator, Route};
use dbchat::session::SessionStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    histories: Vec<Value>,
    next_id: u32,
    prompts: Vec<Value>,
}

type Shared = Arc<Mutex<MockState>>;

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != "secret" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid email or password"})),
        )
            .into_response();
    }
    Json(json!({
        "user": {"_id": "u1", "id": "u1", "username": "ana", "email": body["email"]},
        "token": {"access_token": "tok-1", "token_type": "bearer"}
    }))
    .into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    Json(json!({
        "_id": "u2",
        "username": body["username"],
        "email": body["email"],
        "created_at": "2025-03-01T10:00:00Z"
    }))
    .into_response()
}

async fn query(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    state.lock().unwrap().prompts.push(body);
    if prompt.contains("fail") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({
        "message": "Found 2 sites",
        "sql_query": "SELECT site, count(*) AS patients FROM dm GROUP BY site",
        "data": [
            {"site": "Boston", "patients": 12},
            {"site": "Lyon", "patients": 7}
        ],
        "rowcount": 2
    }))
    .into_response()
}

async fn create_history(State(state): State<Shared>, Json(mut body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    s.next_id += 1;
    body["_id"] = json!(format!("c{}", s.next_id));
    s.histories.push(body.clone());
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn list_histories(State(state): State<Shared>, Path(user_id): Path<String>) -> Response {
    let s = state.lock().unwrap();
    let items: Vec<Value> = s
        .histories
        .iter()
        .filter(|h| h["user_id"] == user_id.as_str())
        .cloned()
        .collect();
    Json(Value::Array(items)).into_response()
}

async fn single_history(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let s = state.lock().unwrap();
    match s.histories.iter().find(|h| h["_id"] == id.as_str()) {
        Some(h) => Json(h.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found"}))).into_response(),
    }
}

async fn update_history(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut s = state.lock().unwrap();
    match s.histories.iter_mut().find(|h| h["_id"] == id.as_str()) {
        Some(h) => {
            h["messages"] = body["messages"].clone();
            Json(json!({"message": "updated"})).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_history(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    let before = s.histories.len();
    s.histories.retain(|h| h["_id"] != id.as_str());
    if s.histories.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({"message": "deleted"})).into_response()
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Start the mock service; returns its base URL and shared state.
async fn start_mock() -> (String, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/user/login", post(login))
        .route("/user/register", post(register))
        .route("/api/ai/query", post(query))
        .route("/api/chat-history", post(create_history))
        .route("/api/chat-history/single/:id", get(single_history))
        .route(
            "/api/chat-history/:id",
            get(list_histories)
                .put(update_history)
                .delete(delete_history),
        )
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}/", addr), state)
}

fn temp_session_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("dbchat-test-{}", uuid::Uuid::new_v4()))
        .join("session.json")
}

fn creds(password: &str) -> LoginCredentials {
    LoginCredentials {
        email: "ana@example.com".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn login_persists_session_across_stores() {
    let (url, _) = start_mock().await;
    let auth = AuthClient::new(Some(url));
    let path = temp_session_path();
    let session = SessionStore::file(&path);

    let res = session.login(&auth, &creds("secret")).await.unwrap();
    assert_eq!(res.user.id, "u1");
    assert!(session.is_authenticated());
    assert_eq!(session.token().as_deref(), Some("tok-1"));

    let reopened = SessionStore::file(&path);
    assert!(reopened.has_session());
    assert_eq!(reopened.current_user_id().as_deref(), Some("u1"));

    reopened.logout().unwrap();
    assert!(!session.has_session());
    assert!(session.token().is_none());
}

#[tokio::test]
async fn rejected_login_reports_server_message() {
    let (url, _) = start_mock().await;
    let auth = AuthClient::new(Some(url));
    let session = SessionStore::in_memory();

    let err = session.login(&auth, &creds("wrong")).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");
    assert!(!session.has_session());
}

#[tokio::test]
async fn unreachable_server_reports_connection_message() {
    let auth = AuthClient::new(Some(format!("http://127.0.0.1:{}", free_port())));
    let session = SessionStore::in_memory();

    let err = session.login(&auth, &creds("secret")).await.unwrap_err();
    assert_eq!(err.to_string(), "Unable to connect to the server");
}

#[tokio::test]
async fn register_without_token_signs_in_user_only() {
    let (url, _) = start_mock().await;
    let auth = AuthClient::new(Some(url));
    let session = SessionStore::in_memory();
    let data = RegisterData {
        email: "bo@example.com".to_string(),
        password: "pw".to_string(),
        username: "bo".to_string(),
    };

    let res = session.register(&auth, &data).await.unwrap();
    assert_eq!(res.user.username, "bo");
    assert!(res.token.is_none());
    assert!(session.has_session());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn conversation_creates_then_updates_history() {
    let (url, state) = start_mock().await;
    let client = ChatClient::new(Some(url));
    let mut convo = Conversation::fresh(Arc::new(client.clone()), Some("u1".to_string()));

    let first = convo
        .send("List all sites with patient counts", ModelType::SqlCoder)
        .await
        .unwrap();
    assert!(first.answered);
    assert_eq!(first.created_chat_id(), Some("c1"));
    assert_eq!(first.reply.rows().len(), 2);
    assert_eq!(first.reply.rowcount, Some(2));
    assert_eq!(convo.messages().len(), 3);

    let second = convo.send("Only Boston", ModelType::Gemini).await.unwrap();
    assert_eq!(second.persistence, Persistence::Updated);
    assert_eq!(
        convo.state(),
        &ConversationState::Active {
            chat_id: "c1".to_string()
        }
    );

    let stored = client.get_chat_history("c1").await.unwrap();
    assert_eq!(stored.title, "List all sites with patient...");
    assert_eq!(stored.messages.len(), 5);
    assert_eq!(stored.messages[4].role, Role::Assistant);

    let prompts = state.lock().unwrap().prompts.clone();
    assert_eq!(prompts[0]["model"], "sqlCoder");
    assert_eq!(prompts[0]["user_id"], "u1");
    assert_eq!(prompts[1]["model"], "gemini");
}

#[tokio::test]
async fn failed_query_is_not_saved() {
    let (url, _) = start_mock().await;
    let client = ChatClient::new(Some(url));
    let mut convo = Conversation::fresh(Arc::new(client.clone()), Some("u1".to_string()));

    let out = convo.send("this will fail", ModelType::Gemini).await.unwrap();
    assert!(!out.answered);
    assert_eq!(out.reply.content, APOLOGY);
    assert_eq!(out.persistence, Persistence::Skipped);
    assert_eq!(convo.messages().len(), 3);
    assert!(client.list_chat_histories("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn opening_stored_and_missing_chats() {
    let (url, _) = start_mock().await;
    let client = ChatClient::new(Some(url));
    let backend = Arc::new(client.clone());
    let mut convo = Conversation::fresh(backend.clone(), Some("u1".to_string()));
    convo.send("List sites", ModelType::Gemini).await.unwrap();

    let reopened = Conversation::open(backend.clone(), Some("u1".to_string()), Some("c1")).await;
    assert_eq!(reopened.messages(), convo.messages());
    assert_eq!(reopened.chat_id(), Some("c1"));

    let missing = Conversation::open(backend, Some("u1".to_string()), Some("nope")).await;
    assert!(missing.messages().is_empty());
    assert_eq!(missing.chat_id(), Some("nope"));
}

#[tokio::test]
async fn sidebar_refresh_and_delete() {
    let (url, _) = start_mock().await;
    let client = ChatClient::new(Some(url));
    let backend = Arc::new(client.clone());
    for q in ["List sites", "Count adverse events"] {
        let mut convo = Conversation::fresh(backend.clone(), Some("u1".to_string()));
        convo.send(q, ModelType::Gemini).await.unwrap();
    }

    let mut sidebar = HistorySidebar::new();
    assert!(sidebar.refresh(&client, "u1").await);
    assert_eq!(sidebar.items().len(), 2);

    let mut nav = Navigator::new(Route::Chat(Some("c1".to_string())), true);
    assert!(sidebar.delete(&client, "c1", &mut nav).await);
    assert_eq!(nav.current(), &Route::Chat(None));
    assert_eq!(sidebar.items().len(), 1);
    assert_eq!(sidebar.items()[0].id, "c2");
    let listed = client.list_chat_histories("u1").await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, ["c2"]);

    // Unknown id: server says 404, nothing changes.
    assert!(!sidebar.delete(&client, "c9", &mut nav).await);
    assert_eq!(sidebar.items().len(), 1);

    let offline = ChatClient::new(Some(format!("http://127.0.0.1:{}", free_port())));
    assert!(!sidebar.refresh(&offline, "u1").await);
    assert_eq!(sidebar.items().len(), 1);
}
