//! Transport-neutral messaging model and ports (WhatsApp today).

pub mod port;
pub mod types;
