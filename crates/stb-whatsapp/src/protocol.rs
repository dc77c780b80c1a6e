//! JSON frames exchanged with the Baileys sidecar.
//!
//! Sidecar → bot frames carry Baileys event names and payloads verbatim
//! (`{"event": "...", "data": {...}}`); bot → sidecar frames are small
//! commands tagged by `op`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use stb_core::{
    domain::{ChatId, MessageId},
    messaging::types::{
        ConnectionPhase, ConnectionUpdate, InboundMessage, MessagesUpsert, TransportEvent,
        UpsertKind,
    },
};

/// Commands sent to the sidecar.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BotFrame {
    /// Start a Baileys socket; `auth: null` begins a QR login.
    Start {
        auth: Option<Value>,
        browser: Vec<String>,
    },
    Send {
        id: u64,
        jid: String,
        text: String,
    },
}

/// Events received from the sidecar.
#[derive(Clone, Debug)]
pub enum SidecarFrame {
    ConnectionUpdate(WaConnectionUpdate),
    CredsUpdate(Value),
    MessagesUpsert(WaUpsert),
    SendResult(WaSendResult),
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Parse one text frame. Unknown event names yield `Ok(None)`.
pub fn parse_frame(text: &str) -> serde_json::Result<Option<SidecarFrame>> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let frame = match raw.event.as_str() {
        "connection.update" => SidecarFrame::ConnectionUpdate(serde_json::from_value(raw.data)?),
        "creds.update" => SidecarFrame::CredsUpdate(raw.data),
        "messages.upsert" => SidecarFrame::MessagesUpsert(serde_json::from_value(raw.data)?),
        "send.result" => SidecarFrame::SendResult(serde_json::from_value(raw.data)?),
        _ => return Ok(None),
    };
    Ok(Some(frame))
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaConnectionUpdate {
    pub connection: Option<String>,
    pub last_disconnect: Option<WaLastDisconnect>,
    pub qr: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WaLastDisconnect {
    pub error: Option<WaDisconnectError>,
}

/// Baileys wraps disconnect errors in a Boom error: `error.output.statusCode`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WaDisconnectError {
    pub output: Option<WaBoomOutput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaBoomOutput {
    pub status_code: Option<u16>,
}

impl WaConnectionUpdate {
    pub fn into_domain(self) -> ConnectionUpdate {
        let connection = match self.connection.as_deref() {
            Some("open") => Some(ConnectionPhase::Open),
            Some("close") => Some(ConnectionPhase::Close),
            Some("connecting") => Some(ConnectionPhase::Connecting),
            _ => None,
        };
        let disconnect_status = self
            .last_disconnect
            .and_then(|d| d.error)
            .and_then(|e| e.output)
            .and_then(|o| o.status_code);

        ConnectionUpdate {
            connection,
            disconnect_status,
            qr: self.qr.filter(|q| !q.is_empty()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WaUpsert {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub messages: Vec<WaMessage>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaMessage {
    #[serde(default)]
    pub key: WaKey,
    pub push_name: Option<String>,
    pub message: Option<WaContent>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaKey {
    pub remote_jid: Option<String>,
    pub from_me: Option<bool>,
    pub id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaContent {
    pub conversation: Option<String>,
    pub extended_text_message: Option<WaExtendedText>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct WaExtendedText {
    pub text: Option<String>,
}

impl WaMessage {
    /// Envelopes without a conversation id cannot be answered and are dropped.
    pub fn into_domain(self) -> Option<InboundMessage> {
        let chat_id = ChatId(self.key.remote_jid.filter(|j| !j.is_empty())?);
        let text = self.message.and_then(|m| {
            m.conversation
                .filter(|t| !t.is_empty())
                .or_else(|| m.extended_text_message.and_then(|e| e.text))
        });

        Some(InboundMessage {
            chat_id,
            message_id: self.key.id.map(MessageId),
            from_me: self.key.from_me.unwrap_or(false),
            push_name: self.push_name,
            text,
        })
    }
}

impl WaUpsert {
    /// Only the batch's first envelope is carried over; if it cannot be
    /// answered the batch maps to no messages at all.
    pub fn into_domain(self) -> MessagesUpsert {
        MessagesUpsert {
            kind: UpsertKind::parse(&self.kind),
            messages: self
                .messages
                .into_iter()
                .next()
                .and_then(WaMessage::into_domain)
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WaSendResult {
    pub id: u64,
    pub ok: bool,
    pub error: Option<String>,
}

impl SidecarFrame {
    /// The core event this frame maps to; send results stay adapter-local.
    pub fn into_event(self) -> Option<TransportEvent> {
        match self {
            Self::ConnectionUpdate(u) => Some(TransportEvent::Connection(u.into_domain())),
            Self::CredsUpdate(creds) => Some(TransportEvent::CredsUpdate(creds)),
            Self::MessagesUpsert(u) => Some(TransportEvent::Messages(u.into_domain())),
            Self::SendResult(_) => None,
        }
    }
}
