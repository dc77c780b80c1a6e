use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub chat_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn lookup(
        chat_id: &str,
        sender: Option<&str>,
        code: &str,
        found: bool,
        response: &str,
    ) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "lookup".to_string(),
            chat_id: chat_id.to_string(),
            sender: sender.map(|s| s.to_string()),
            code: Some(code.to_string()),
            found: Some(found),
            response: Some(response.to_string()),
            error: None,
        }
    }

    pub fn send_error(chat_id: &str, code: &str, error: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "send_error".to_string(),
            chat_id: chat_id.to_string(),
            sender: None,
            code: Some(code.to_string()),
            found: None,
            response: None,
            error: Some(error.to_string()),
        }
    }
}

/// Append-only lookup audit log (plain text or JSON lines).
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.response {
            event.response = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::Store(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
