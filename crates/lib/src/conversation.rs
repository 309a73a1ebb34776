//! Conversation controller: the message list of the open chat and its persistence.
//!
//! A conversation starts `Fresh` (greeting only, no id), becomes `Active` once the first
//! exchange has been saved as a new chat history, or is `Loaded` when opened by id.
//! Every successful exchange after that replaces the stored message list.
//!
//! `send` takes `&mut self`, so two sends on one conversation cannot overlap.

use crate::api::ApiError;
use crate::models::{ChatHistory, Message, ModelType};
use async_trait::async_trait;
use std::sync::Arc;

/// Titles are cut to this many characters.
pub const TITLE_MAX_CHARS: usize = 30;

/// Remote side of a conversation. [`crate::api::ChatClient`] is the real one.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn query(
        &self,
        prompt: &str,
        model: ModelType,
        user_id: Option<&str>,
    ) -> Result<Message, ApiError>;

    async fn create_history(
        &self,
        title: &str,
        messages: &[Message],
        user_id: &str,
    ) -> Result<ChatHistory, ApiError>;

    async fn fetch_history(&self, chat_id: &str) -> Result<ChatHistory, ApiError>;

    async fn update_history(&self, chat_id: &str, messages: &[Message]) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    /// Not saved yet; the next successful exchange creates a chat history.
    Fresh,
    /// Saved by this controller; later exchanges update it.
    Active { chat_id: String },
    /// Opened by id; later exchanges update it.
    Loaded { chat_id: String },
}

impl ConversationState {
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            ConversationState::Fresh => None,
            ConversationState::Active { chat_id } | ConversationState::Loaded { chat_id } => {
                Some(chat_id)
            }
        }
    }
}

/// What happened to the server copy after a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    /// A new chat history was created; the caller should navigate to it.
    Created { chat_id: String },
    Updated,
    /// Not attempted: the query failed, or no user is signed in.
    Skipped,
    /// Attempted and failed; logged, local state kept.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    /// The assistant message appended (reply or apology).
    pub reply: Message,
    /// False when the query failed and the apology was appended instead.
    pub answered: bool,
    pub persistence: Persistence,
}

impl SendOutcome {
    pub fn created_chat_id(&self) -> Option<&str> {
        match &self.persistence {
            Persistence::Created { chat_id } => Some(chat_id),
            _ => None,
        }
    }
}

pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    user_id: Option<String>,
    state: ConversationState,
    messages: Vec<Message>,
}

impl Conversation {
    /// New unsaved conversation seeded with the greeting.
    pub fn fresh(backend: Arc<dyn ChatBackend>, user_id: Option<String>) -> Self {
        Self {
            backend,
            user_id,
            state: ConversationState::Fresh,
            messages: vec![Message::greeting()],
        }
    }

    /// Open a stored conversation by id.
    pub async fn load(
        backend: Arc<dyn ChatBackend>,
        user_id: Option<String>,
        chat_id: &str,
    ) -> Result<Self, ApiError> {
        let history = backend.fetch_history(chat_id).await?;
        log::info!(
            "loaded chat {} ({} messages)",
            chat_id,
            history.messages.len()
        );
        Ok(Self {
            backend,
            user_id,
            state: ConversationState::Loaded {
                chat_id: chat_id.to_string(),
            },
            messages: history.messages,
        })
    }

    /// Entry point for navigation: fresh without an id, loaded with one. A failed
    /// load is logged and leaves an empty conversation bound to the id.
    pub async fn open(
        backend: Arc<dyn ChatBackend>,
        user_id: Option<String>,
        chat_id: Option<&str>,
    ) -> Self {
        let Some(chat_id) = chat_id else {
            return Self::fresh(backend, user_id);
        };
        match Self::load(backend.clone(), user_id.clone(), chat_id).await {
            Ok(c) => c,
            Err(e) => {
                log::error!("loading chat {} failed: {}", chat_id, e);
                Self {
                    backend,
                    user_id,
                    state: ConversationState::Loaded {
                        chat_id: chat_id.to_string(),
                    },
                    messages: Vec::new(),
                        }
            }
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.state.chat_id()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Drop the current conversation and start over with the greeting.
    pub fn reset(&mut self) {
        self.state = ConversationState::Fresh;
        self.messages = vec![Message::greeting()];
    }

    /// Send one query. Blank input is ignored (returns None).
    ///
    /// The user message is appended before the request goes out; the reply (or the
    /// apology on failure) follows. A successful exchange is then saved: created on
    /// the first one, updated afterwards. Save failures never undo local state.
    pub async fn send(&mut self, query: &str, model: ModelType) -> Option<SendOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        self.messages.push(Message::user(query));

        let result = self
            .backend
            .query(query, model, self.user_id.as_deref())
            .await;
        let (reply, answered) = match result {
            Ok(reply) => (reply, true),
            Err(e) => {
                log::error!("query failed: {}", e);
                (Message::apology(), false)
            }
        };
        self.messages.push(reply.clone());

        let persistence = if answered {
            self.persist(query).await
        } else {
            Persistence::Skipped
        };
        Some(SendOutcome {
            reply,
            answered,
            persistence,
        })
    }

    async fn persist(&mut self, query: &str) -> Persistence {
        let Some(user_id) = self.user_id.clone().filter(|id| !id.is_empty()) else {
            log::warn!("no signed-in user; chat history will not be saved");
            return Persistence::Skipped;
        };
        match self.state.chat_id().map(str::to_string) {
            Some(chat_id) => match self.backend.update_history(&chat_id, &self.messages).await {
                Ok(()) => Persistence::Updated,
                Err(e) => {
                    log::warn!("saving chat {} failed: {}", chat_id, e);
                    Persistence::Failed
                }
            },
            None => {
                let title = derive_title(query);
                match self
                    .backend
                    .create_history(&title, &self.messages, &user_id)
                    .await
                {
                    Ok(history) if !history.id.is_empty() => {
                        log::info!("created chat {} ({:?})", history.id, title);
                        self.state = ConversationState::Active {
                            chat_id: history.id.clone(),
                        };
                        Persistence::Created {
                            chat_id: history.id,
                        }
                    }
                    Ok(_) => {
                        log::warn!("server created a chat history without an id");
                        Persistence::Failed
                    }
                    Err(e) => {
                        log::warn!("creating chat history failed: {}", e);
                        Persistence::Failed
                    }
                }
            }
        }
    }
}

/// Chat title from the first query: up to 30 characters, cut back to the last whole
/// word when that splits one, with `...` appended when anything was dropped.
///
/// The word backoff is deliberate: a plain 30-character cut would give
/// "Show me all patients over 65 g..." where this gives "Show me all patients over 65...".
/// A single word longer than 30 characters is still cut mid-word.
pub fn derive_title(query: &str) -> String {
    let query = query.trim();
    if query.chars().count() <= TITLE_MAX_CHARS {
        return query.to_string();
    }
    let cut = query
        .char_indices()
        .nth(TITLE_MAX_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(query.len());
    let head = &query[..cut];
    let splits_word = !query[cut..].starts_with(char::is_whitespace);
    let head = match head.rfind(char::is_whitespace) {
        Some(i) if splits_word => &head[..i],
        _ => head,
    };
    format!("{}...", head.trim_end())
}
