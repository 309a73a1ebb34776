//! Query and chat-history endpoints.

use super::{check_status, normalize_base_url, ApiError};
use crate::conversation::ChatBackend;
use crate::models::{ChatHistory, Message, ModelType, QueryReply};
use async_trait::async_trait;
use serde::Serialize;

/// Client for `/api/ai/query` and `/api/chat-history`.
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    prompt: &'a str,
    model: ModelType,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateHistoryRequest<'a> {
    title: &'a str,
    messages: &'a [Message],
    user_id: &'a str,
}

#[derive(Serialize)]
struct UpdateHistoryRequest<'a> {
    messages: &'a [Message],
}

impl ChatClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/ai/query. Returns the reply as an assistant message.
    pub async fn query(
        &self,
        prompt: &str,
        model: ModelType,
        user_id: Option<&str>,
    ) -> Result<Message, ApiError> {
        let url = format!("{}/api/ai/query", self.base_url);
        log::debug!("POST {} model={}", url, model);
        let body = QueryRequest {
            prompt,
            model,
            user_id,
        };
        let res = self.client.post(&url).json(&body).send().await?;
        let res = check_status(res).await?;
        let value: serde_json::Value = res.json().await?;
        Ok(QueryReply::from_value(value)?.into_message())
    }

    /// POST /api/chat-history. Returns the created record with its id.
    pub async fn create_chat_history(
        &self,
        title: &str,
        messages: &[Message],
        user_id: &str,
    ) -> Result<ChatHistory, ApiError> {
        let url = format!("{}/api/chat-history", self.base_url);
        log::debug!("POST {}", url);
        let body = CreateHistoryRequest {
            title,
            messages,
            user_id,
        };
        let res = self.client.post(&url).json(&body).send().await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    /// GET /api/chat-history/{user_id}. Order is whatever the server returns.
    pub async fn list_chat_histories(&self, user_id: &str) -> Result<Vec<ChatHistory>, ApiError> {
        let url = format!("{}/api/chat-history/{}", self.base_url, user_id);
        log::debug!("GET {}", url);
        let res = self.client.get(&url).send().await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    /// GET /api/chat-history/single/{chat_id}
    pub async fn get_chat_history(&self, chat_id: &str) -> Result<ChatHistory, ApiError> {
        let url = format!("{}/api/chat-history/single/{}", self.base_url, chat_id);
        log::debug!("GET {}", url);
        let res = self.client.get(&url).send().await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    /// PUT /api/chat-history/{chat_id}. Replaces the stored message list.
    pub async fn update_chat_history(
        &self,
        chat_id: &str,
        messages: &[Message],
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/chat-history/{}", self.base_url, chat_id);
        log::debug!("PUT {}", url);
        let res = self
            .client
            .put(&url)
            .json(&UpdateHistoryRequest { messages })
            .send()
            .await?;
        check_status(res).await?;
        Ok(())
    }

    /// DELETE /api/chat-history/{chat_id}
    pub async fn delete_chat_history(&self, chat_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/chat-history/{}", self.base_url, chat_id);
        log::debug!("DELETE {}", url);
        let res = self.client.delete(&url).send().await?;
        check_status(res).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn query(
        &self,
        prompt: &str,
        model: ModelType,
        user_id: Option<&str>,
    ) -> Result<Message, ApiError> {
        ChatClient::query(self, prompt, model, user_id).await
    }

    async fn create_history(
        &self,
        title: &str,
        messages: &[Message],
        user_id: &str,
    ) -> Result<ChatHistory, ApiError> {
        self.create_chat_history(title, messages, user_id).await
    }

    async fn fetch_history(&self, chat_id: &str) -> Result<ChatHistory, ApiError> {
        self.get_chat_history(chat_id).await
    }

    async fn update_history(&self, chat_id: &str, messages: &[Message]) -> Result<(), ApiError> {
        self.update_chat_history(chat_id, messages).await
    }
}
