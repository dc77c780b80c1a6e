use crate::domain::{ChatId, MessageId};

/// Everything a transport connection reports to the bot.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    Connection(ConnectionUpdate),
    /// Opaque session credentials to persist verbatim.
    CredsUpdate(serde_json::Value),
    Messages(MessagesUpsert),
}

/// Connection phase as reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Close,
}

/// A `connection.update` event. Every field is optional: the transport sends
/// partial updates (a QR challenge alone, a phase change alone).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub connection: Option<ConnectionPhase>,
    /// Status code of the error that closed the connection, if any.
    pub disconnect_status: Option<u16>,
    /// QR challenge payload to show the operator.
    pub qr: Option<String>,
}

impl ConnectionUpdate {
    /// Close without a known reason (socket dropped, sidecar unreachable).
    pub fn closed_without_reason() -> Self {
        Self {
            connection: Some(ConnectionPhase::Close),
            ..Default::default()
        }
    }
}

/// Batch tag of a `messages.upsert` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertKind {
    /// New messages that should trigger notifications; the only kind handled.
    Notify,
    /// History sync / messages appended while offline.
    Append,
    Other(String),
}

impl UpsertKind {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "notify" => Self::Notify,
            "append" => Self::Append,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessagesUpsert {
    pub kind: UpsertKind,
    pub messages: Vec<InboundMessage>,
}

/// One inbound message envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub message_id: Option<MessageId>,
    pub from_me: bool,
    pub push_name: Option<String>,
    /// Plain or extended text body; `None` for media and other message kinds.
    pub text: Option<String>,
}

impl InboundMessage {
    pub fn is_group(&self) -> bool {
        self.chat_id.is_group()
    }
}
