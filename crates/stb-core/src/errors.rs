use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the supervisor
/// can handle failures consistently (log-and-continue vs terminal).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("record store error: {0}")]
    Store(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
