#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use eco_client::chat::ChatApi;
use eco_client::transport::read_frame;
use eco_client::{load_client_config_from_env, ChatError, ClientConfig, CLIENT_CONFIG_ENV};
use eco_proto::{decode_frame_payload, ChatMessage, ChatSendResponse, EventFrame};
use parking_lot::Mutex;
use tokio::net::TcpStream;

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_client_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test client config at {}",
            config_path.display()
        );

        std::env::set_var(CLIENT_CONFIG_ENV, &config_path);
    });
}

pub fn test_config() -> Arc<ClientConfig> {
    ensure_test_config();
    load_client_config_from_env()
}

/// Read one frame from the server side of a fake event channel.
pub async fn next_frame(stream: &mut TcpStream) -> anyhow::Result<EventFrame> {
    let payload = read_frame(stream)
        .await?
        .ok_or_else(|| anyhow::anyhow!("client closed the channel"))?;
    Ok(decode_frame_payload(&payload)?)
}

/// In-memory stand-in for the chat endpoints.
#[derive(Clone, Default)]
pub struct FakeChat {
    pub store: Arc<Mutex<Vec<ChatMessage>>>,
    pub reject_with: Option<String>,
}

impl FakeChat {
    pub fn post(&self, username: &str, message: &str) {
        let mut store = self.store.lock();
        let id = store.len() as u64 + 1;
        store.push(ChatMessage {
            id,
            username: username.to_string(),
            message: message.to_string(),
            timestamp: format!("2025-03-01T09:{:02}:00", id % 60),
        });
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }
}

impl ChatApi for FakeChat {
    async fn fetch_messages_since(&self, since: u64) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self
            .store
            .lock()
            .iter()
            .filter(|message| message.id > since)
            .cloned()
            .collect())
    }

    async fn submit_message(&self, text: &str) -> Result<ChatSendResponse, ChatError> {
        if let Some(error) = &self.reject_with {
            return Ok(ChatSendResponse {
                success: false,
                error: Some(error.clone()),
                message: None,
            });
        }
        self.post("me", text);
        Ok(ChatSendResponse {
            success: true,
            error: None,
            message: None,
        })
    }
}
