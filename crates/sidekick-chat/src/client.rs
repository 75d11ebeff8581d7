//! HTTP client for the chat backend
//!
//! Covers the chat, history and auth endpoints. Chat replies come back as a
//! raw byte stream; turning them into messages is the job of
//! [`crate::streaming`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Deserializer, Serialize};
use sidekick_common::{
    ClientConfig, Message, Persona, Result, Role, SidekickError, endpoints, timeouts,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Body chunks of a streaming reply
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Body of `POST /chat/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub user_id: i64,
    pub session_id: i64,
    pub message: String,
    pub persona_mode: Persona,
}

/// The backend operations the chat session depends on
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Post a message and return the reply body as it arrives
    async fn send_message(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Stored messages of a session
    async fn fetch_history(&self, user_id: i64, session_id: i64) -> Result<Vec<Message>>;
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    role: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Account created by `POST /auth/register`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Credentials returned by `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(deserialize_with = "numeric_id")]
    pub user_id: i64,
    #[serde(deserialize_with = "numeric_id")]
    pub session_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Ids may arrive as JSON numbers or numeric strings
fn numeric_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("non-numeric id: {}", text))),
    }
}

/// reqwest client bound to one backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts::DEFAULT_CONNECT_TIMEOUT))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create an account
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<RegisteredUser> {
        info!("Registering account for {}", email);
        let response = self
            .http
            .post(self.config.endpoint(endpoints::REGISTER))
            .timeout(self.config.request_timeout())
            .json(&RegisterRequest {
                name,
                email,
                password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!("Registration rejected with status {}", status);
            return Err(SidekickError::Status {
                status,
                message: "User already exists or invalid info.".to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// Exchange email and password for a token and session ids
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        info!("Logging in {}", email);
        let response = self
            .http
            .post(self.config.endpoint(endpoints::LOGIN))
            .timeout(self.config.request_timeout())
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SidekickError::Auth("Invalid email or password.".to_string()));
        }
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };
        Err(SidekickError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn send_message(&self, request: &ChatRequest) -> Result<ByteStream> {
        debug!(
            user_id = request.user_id,
            session_id = request.session_id,
            persona = request.persona_mode.key(),
            "Posting chat message"
        );
        // no overall timeout: replies stream for as long as the backend talks
        let response = self
            .authorized(self.http.post(self.config.endpoint(endpoints::CHAT)))
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(SidekickError::from))
            .boxed())
    }

    async fn fetch_history(&self, user_id: i64, session_id: i64) -> Result<Vec<Message>> {
        let response = self
            .authorized(self.http.get(self.config.endpoint(endpoints::CHAT_HISTORY)))
            .query(&[("user_id", user_id), ("session_id", session_id)])
            .timeout(self.config.request_timeout())
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let history: HistoryResponse = response.json().await?;

        debug!("Loaded {} history messages", history.messages.len());
        Ok(history
            .messages
            .into_iter()
            .map(|entry| Message {
                role: Role::from_history(&entry.role),
                text: entry.text,
            })
            .collect())
    }
}
