//! WhatsApp adapter (Baileys sidecar over WebSocket).
//!
//! This crate implements the `stb-core` transport and challenge ports: the
//! sidecar owns the WhatsApp Web session, this side owns everything else.

pub mod protocol;
pub mod qr;
pub mod router;
pub mod transport;

pub use qr::QrRenderer;
pub use transport::{WhatsAppReplies, WhatsAppTransport};
