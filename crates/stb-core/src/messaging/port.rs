use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{domain::ChatId, messaging::types::TransportEvent, Result};

/// Outbound side of one transport connection.
#[async_trait]
pub trait ReplyPort: Send + Sync {
    /// Queue a plain-text message for `chat_id`. Delivery is fire-and-forget.
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()>;
}

/// Parameters for one connection attempt.
#[derive(Clone, Debug)]
pub struct ConnectRequest {
    /// Previously persisted credentials; `None` starts a fresh QR login.
    pub credentials: Option<serde_json::Value>,
    /// Browser identity shown in the phone's linked-devices list.
    pub browser: Vec<String>,
}

/// A live connection: its event stream plus the handle to reply on it.
///
/// The stream ends when the connection is gone; the transport sends a
/// `close` update first whenever it knows why.
pub struct Connection {
    pub events: mpsc::Receiver<TransportEvent>,
    pub replies: std::sync::Arc<dyn ReplyPort>,
}

/// Messaging transport (the Baileys sidecar in production).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run the full connection sequence once.
    async fn connect(&self, req: ConnectRequest) -> Result<Connection>;
}

/// Presents a login challenge (QR payload) to the operator.
#[async_trait]
pub trait ChallengeRenderer: Send + Sync {
    /// Render `payload`; returns where the image was written, if anywhere.
    async fn render(&self, payload: &str) -> Result<Option<PathBuf>>;
}
