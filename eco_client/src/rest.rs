//! HTTP side of the server: login, chat, lobby status and the final code.

use eco_proto::{
    ChatMessage, ChatMessagesResponse, ChatSendRequest, ChatSendResponse, ErrorBody,
    FinalCodeRequest, FinalCodeResponse, LobbyStatus,
};
use reqwest::StatusCode;
use thiserror::Error;

use crate::chat::{ChatApi, ChatError};
use crate::final_code::FinalCodeApi;
use crate::lobby::LobbyApi;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("login rejected for '{0}'")]
    LoginRejected(String),
    #[error("server answered {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl From<RestError> for ChatError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(err) => ChatError::Http(err),
            RestError::NotLoggedIn => ChatError::NotLoggedIn,
            other => ChatError::Rejected(other.to_string()),
        }
    }
}

/// Cookie-carrying client for one logged-in player.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: String,
}

impl RestClient {
    pub fn new(base: impl Into<String>) -> Result<Self, RestError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Register `username` and keep the session cookie. The server answers a
    /// successful login with a redirect to the lobby.
    pub async fn login(&self, username: &str) -> Result<(), RestError> {
        let response = self
            .http
            .post(self.url("/login"))
            .form(&[("username", username)])
            .send()
            .await?
            .error_for_status()?;
        if response.url().path() == "/lobby" {
            tracing::info!(target: "eco_quest::rest", username, "login.accepted");
            Ok(())
        } else {
            tracing::warn!(target: "eco_quest::rest", username, "login.rejected");
            Err(RestError::LoginRejected(username.to_string()))
        }
    }

    pub async fn logout(&self) -> Result<(), RestError> {
        self.http
            .get(self.url("/logout"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Ask the server to wipe the game; every player receives `game_reset`.
    pub async fn reset_game(&self) -> Result<(), RestError> {
        let response = self.http.post(self.url("/reset_game")).send().await?;
        check_status(response).await.map(|_| ())
    }
}

/// Map 401 to `NotLoggedIn` and other failures to their `{error}` body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RestError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(RestError::NotLoggedIn);
    }
    if status.is_client_error() || status.is_server_error() {
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("error").to_string());
        return Err(RestError::Status { status, message });
    }
    Ok(response)
}

impl ChatApi for RestClient {
    async fn fetch_messages_since(&self, last_id: u64) -> Result<Vec<ChatMessage>, ChatError> {
        let response = self
            .http
            .get(self.url("/api/chat/messages"))
            .query(&[("last_id", last_id)])
            .send()
            .await?;
        let body: ChatMessagesResponse = check_status(response).await?.json().await?;
        Ok(body.messages)
    }

    async fn submit_message(&self, text: &str) -> Result<ChatSendResponse, ChatError> {
        let response = self
            .http
            .post(self.url("/api/chat/send"))
            .json(&ChatSendRequest {
                message: text.to_string(),
            })
            .send()
            .await?;
        match check_status(response).await {
            Ok(response) => Ok(response.json().await?),
            Err(RestError::Status { status, message }) if status.is_client_error() => {
                Ok(ChatSendResponse {
                    success: false,
                    error: Some(message),
                    message: None,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl LobbyApi for RestClient {
    async fn poll_status(&self) -> Result<LobbyStatus, RestError> {
        let response = self.http.get(self.url("/api/poll_status")).send().await?;
        Ok(check_status(response).await?.json().await?)
    }
}

impl FinalCodeApi for RestClient {
    async fn validate_final_code(&self, code: &str) -> Result<FinalCodeResponse, RestError> {
        let response = self
            .http
            .post(self.url("/api/validate_final_code"))
            .json(&FinalCodeRequest {
                code: code.to_string(),
            })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}
