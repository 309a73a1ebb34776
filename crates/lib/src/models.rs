//! Wire and domain types shared by the gateway clients, the session store and the
//! conversation controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First message of every fresh conversation.
pub const GREETING: &str =
    "Hello! I can help you query your database. What would you like to know?";

/// Assistant message appended when a query request fails.
pub const APOLOGY: &str = "I'm sorry, I encountered an error while processing your request. Please try again later.";

/// One result row as returned by the query endpoint (column order preserved).
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Authenticated user record. Created at registration, read-only on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UserRecord")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// User as sent by the server: `id`, `_id`, or both.
#[derive(Deserialize)]
struct UserRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<String>,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        Self {
            id: pick_id(r.id, r.underscore_id).unwrap_or_default(),
            username: r.username,
            email: r.email,
            created_at: r.created_at,
        }
    }
}

/// First non-empty of `id` and `_id`.
fn pick_id(id: Option<String>, underscore_id: Option<String>) -> Option<String> {
    id.filter(|s| !s.is_empty())
        .or(underscore_id.filter(|s| !s.is_empty()))
}

/// Bearer token issued at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

/// `POST /user/login` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<AuthToken>,
}

impl AuthResponse {
    /// Accept either `{ user, token }` or a bare user record (what `/user/register` returns on some servers).
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("user").map(|u| u.is_object()).unwrap_or(false) {
            serde_json::from_value(value)
        } else {
            let user: User = serde_json::from_value(value)?;
            Ok(Self { user, token: None })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation message. Assistant replies may carry the generated SQL and a result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rowcount: Option<i64>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sql_query: None,
            answer: None,
            data: None,
            rowcount: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(content)
        }
    }

    pub fn greeting() -> Self {
        Self::assistant(GREETING)
    }

    pub fn apology() -> Self {
        Self::assistant(APOLOGY)
    }

    /// Text shown for the message: the answer when the backend produced one, else the content.
    pub fn display_text(&self) -> &str {
        match self.answer.as_deref() {
            Some(a) if !a.is_empty() => a,
            _ => &self.content,
        }
    }

    /// Result rows, empty when the message carries no table.
    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or(&[])
    }
}

/// Body of a query reply. Older servers wrap it in a `data` envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sql_query: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub rowcount: Option<i64>,
}

impl QueryReply {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        match value {
            serde_json::Value::Object(mut obj)
                if obj.get("data").map(|d| d.is_object()).unwrap_or(false) =>
            {
                let inner = obj.remove("data").unwrap_or_default();
                serde_json::from_value(inner)
            }
            other => serde_json::from_value(other),
        }
    }

    pub fn into_message(self) -> Message {
        let content = self
            .message
            .or_else(|| self.answer.clone())
            .unwrap_or_default();
        Message {
            role: Role::Assistant,
            content,
            sql_query: self.sql_query,
            answer: self.answer,
            data: self.data,
            rowcount: self.rowcount,
        }
    }
}

/// Persisted conversation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChatHistoryRecord")]
pub struct ChatHistory {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Deserialize)]
struct ChatHistoryRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    underscore_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl TryFrom<ChatHistoryRecord> for ChatHistory {
    type Error = &'static str;

    fn try_from(r: ChatHistoryRecord) -> Result<Self, Self::Error> {
        // Create may answer with an empty id; the conversation treats that as a failed save.
        let id = match (r.id, r.underscore_id) {
            (None, None) => return Err("missing field `_id`"),
            (id, underscore_id) => pick_id(id, underscore_id).unwrap_or_default(),
        };
        Ok(Self {
            id,
            title: r.title,
            messages: r.messages,
            user_id: r.user_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Backend inference strategy chosen per query. Not validated against the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "sqlCoder")]
    SqlCoder,
    #[default]
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openAI")]
    OpenAi,
    #[serde(rename = "rag")]
    Rag,
    #[serde(rename = "langchain")]
    Langchain,
    #[serde(rename = "agent")]
    Agent,
}

impl ModelType {
    /// Selector order used by the front ends.
    pub const ALL: [ModelType; 6] = [
        ModelType::SqlCoder,
        ModelType::Gemini,
        ModelType::OpenAi,
        ModelType::Langchain,
        ModelType::Agent,
        ModelType::Rag,
    ];

    /// Wire token.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::SqlCoder => "sqlCoder",
            ModelType::Gemini => "gemini",
            ModelType::OpenAi => "openAI",
            ModelType::Rag => "rag",
            ModelType::Langchain => "langchain",
            ModelType::Agent => "agent",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelType::SqlCoder => "SQL Coder",
            ModelType::Gemini => "Gemini",
            ModelType::OpenAi => "OpenAI",
            ModelType::Rag => "RAG",
            ModelType::Langchain => "Langchain",
            ModelType::Agent => "Agent",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model {0:?} (expected one of: sqlCoder, gemini, openAI, rag, langchain, agent)")]
pub struct UnknownModel(pub String);

impl FromStr for ModelType {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        ModelType::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| UnknownModel(t.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_accepts_underscore_id() {
        let u: User = serde_json::from_value(json!({
            "_id": "u-1",
            "username": "ana",
            "email": "ana@example.com",
            "created_at": "2025-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(u.id, "u-1");
        assert_eq!(u.created_at.as_deref(), Some("2025-03-01T10:00:00Z"));
    }

    #[test]
    fn user_with_both_id_keys() {
        let r = AuthResponse::from_value(json!({
            "user": {"_id": "u1", "id": "u1", "username": "ana", "email": "ana@example.com"},
            "token": {"access_token": "tok", "token_type": "bearer"}
        }))
        .unwrap();
        assert_eq!(r.user.id, "u1");

        let u: User = serde_json::from_value(json!({"id": "", "_id": "u2", "username": "bo"})).unwrap();
        assert_eq!(u.id, "u2");
        let back = serde_json::to_value(&u).unwrap();
        assert_eq!(back.get("id"), Some(&json!("u2")));
    }

    #[test]
    fn register_payload_may_be_bare_user() {
        let r = AuthResponse::from_value(json!({"id": "7", "username": "bo", "email": "b@x"})).unwrap();
        assert_eq!(r.user.id, "7");
        assert!(r.token.is_none());

        let r = AuthResponse::from_value(json!({
            "user": {"id": "8", "username": "cy", "email": "c@x"},
            "token": {"access_token": "tok", "token_type": "bearer"}
        }))
        .unwrap();
        assert_eq!(r.user.id, "8");
        assert_eq!(r.token.unwrap().access_token, "tok");
    }

    #[test]
    fn message_omits_absent_fields() {
        let v = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(v, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn query_reply_unwraps_data_envelope() {
        let wrapped = json!({
            "data": {
                "message": "Found 2 patients",
                "sql_query": "SELECT subject_id FROM dm",
                "data": [{"subject_id": 1}, {"subject_id": 2}],
                "rowcount": 2
            }
        });
        let m = QueryReply::from_value(wrapped).unwrap().into_message();
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.content, "Found 2 patients");
        assert_eq!(m.rows().len(), 2);
        assert_eq!(m.rowcount, Some(2));

        let flat = json!({"message": "ok", "data": [{"n": 3}]});
        let m = QueryReply::from_value(flat).unwrap().into_message();
        assert_eq!(m.content, "ok");
        assert_eq!(m.rows()[0].get("n"), Some(&json!(3)));
    }

    #[test]
    fn display_text_prefers_answer() {
        let mut m = Message::assistant("raw");
        assert_eq!(m.display_text(), "raw");
        m.answer = Some("There are **3** sites.".to_string());
        assert_eq!(m.display_text(), "There are **3** sites.");
    }

    #[test]
    fn chat_history_id_wire_name() {
        let h: ChatHistory = serde_json::from_value(json!({
            "_id": "c1",
            "title": "List sites",
            "messages": [{"role": "user", "content": "List sites"}],
            "user_id": "u1"
        }))
        .unwrap();
        assert_eq!(h.id, "c1");
        assert_eq!(h.messages.len(), 1);
        let back = serde_json::to_value(&h).unwrap();
        assert_eq!(back.get("_id"), Some(&json!("c1")));
    }

    #[test]
    fn chat_history_with_both_id_keys() {
        let h: ChatHistory = serde_json::from_value(json!({
            "_id": "c1",
            "id": "c1",
            "title": "List sites"
        }))
        .unwrap();
        assert_eq!(h.id, "c1");
        let h: ChatHistory = serde_json::from_value(json!({"id": "c2"})).unwrap();
        assert_eq!(h.id, "c2");
        assert!(serde_json::from_value::<ChatHistory>(json!({"title": "x"})).is_err());
    }

    #[test]
    fn negative_rowcount_is_accepted() {
        let reply = QueryReply::from_value(json!({
            "message": "Updated",
            "sql_query": "UPDATE x SET y = 1",
            "rowcount": -1
        }))
        .unwrap();
        let m = reply.into_message();
        assert_eq!(m.rowcount, Some(-1));
        assert_eq!(m.content, "Updated");
    }

    #[test]
    fn model_type_tokens() {
        assert_eq!("openai".parse::<ModelType>().unwrap(), ModelType::OpenAi);
        assert_eq!("sqlCoder".parse::<ModelType>().unwrap(), ModelType::SqlCoder);
        assert!("gpt".parse::<ModelType>().is_err());
        assert_eq!(serde_json::to_value(ModelType::OpenAi).unwrap(), json!("openAI"));
        assert_eq!(ModelType::default(), ModelType::Gemini);
    }
}
