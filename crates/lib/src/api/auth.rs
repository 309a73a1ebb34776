//! Auth endpoints: `POST /user/login`, `POST /user/register`.

use super::{check_status, normalize_base_url, ApiError};
use crate::models::{AuthResponse, LoginCredentials, RegisterData};
use crate::session::AuthBackend;
use async_trait::async_trait;

/// Client for the `/user` endpoints.
#[derive(Clone)]
pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
}

impl AuthClient {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /user/login: `{ email, password }` → `{ user, token }`.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        let url = format!("{}/user/login", self.base_url);
        log::debug!("POST {}", url);
        let res = self.client.post(&url).json(credentials).send().await?;
        let res = check_status(res).await?;
        let body: serde_json::Value = res.json().await?;
        Ok(serde_json::from_value(body)?)
    }

    /// POST /user/register: `{ email, password, username }` → user, with or without a token.
    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse, ApiError> {
        let url = format!("{}/user/register", self.base_url);
        log::debug!("POST {}", url);
        let res = self.client.post(&url).json(data).send().await?;
        let res = check_status(res).await?;
        let body: serde_json::Value = res.json().await?;
        Ok(AuthResponse::from_value(body)?)
    }
}

#[async_trait]
impl AuthBackend for AuthClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse, ApiError> {
        AuthClient::login(self, credentials).await
    }

    async fn register(&self, data: &RegisterData) -> Result<AuthResponse, ApiError> {
        AuthClient::register(self, data).await
    }
}
