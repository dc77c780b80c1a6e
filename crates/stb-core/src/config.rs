use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Every value has a default, so a bare `stb` in a directory holding
/// `shipments.json` is a working setup.
#[derive(Clone, Debug)]
pub struct Config {
    // Lookup
    pub shipments_file: PathBuf,

    // Session
    pub auth_dir: PathBuf,
    pub qr_image_path: PathBuf,
    pub qr_terminal: bool,

    // Transport
    pub sidecar_url: String,
    pub browser: Vec<String>,
    pub reconnect_delay: Duration,
    pub message_queue_capacity: usize,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let str_of = |key: &str| lookup(key).and_then(non_empty);

        let shipments_file = PathBuf::from(
            str_of("SHIPMENTS_FILE").unwrap_or_else(|| "shipments.json".to_string()),
        );

        let auth_dir =
            PathBuf::from(str_of("AUTH_DIR").unwrap_or_else(|| "./auth_info_baileys".to_string()));
        let qr_image_path =
            PathBuf::from(str_of("QR_IMAGE_PATH").unwrap_or_else(|| "qr.png".to_string()));
        let qr_terminal = str_of("QR_TERMINAL").map(|s| parse_bool(&s)).unwrap_or(true);

        let sidecar_url =
            str_of("WA_SIDECAR_URL").unwrap_or_else(|| "ws://127.0.0.1:3030".to_string());
        if !(sidecar_url.starts_with("ws://") || sidecar_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "WA_SIDECAR_URL must be a ws:// or wss:// url, got {sidecar_url}"
            )));
        }

        let browser = parse_csv(str_of("WA_BROWSER").unwrap_or_else(|| "Baileys,NodeJS".into()));
        if browser.len() != 2 {
            return Err(Error::Config(
                "WA_BROWSER must have exactly two comma-separated parts (name,platform)"
                    .to_string(),
            ));
        }

        let reconnect_delay = Duration::from_millis(
            parse_num::<u64>(&str_of, "RECONNECT_DELAY_MS")?.unwrap_or(1000),
        );
        let message_queue_capacity =
            parse_num::<usize>(&str_of, "MESSAGE_QUEUE_CAPACITY")?.unwrap_or(64);
        if message_queue_capacity == 0 {
            return Err(Error::Config(
                "MESSAGE_QUEUE_CAPACITY must be at least 1".to_string(),
            ));
        }

        let audit_log_path = str_of("AUDIT_LOG_PATH").map(PathBuf::from);
        let audit_log_json = str_of("AUDIT_LOG_JSON")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        Ok(Self {
            shipments_file,
            auth_dir,
            qr_image_path,
            qr_terminal,
            sidecar_url,
            browser,
            reconnect_delay,
            message_queue_capacity,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(
    str_of: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = str_of(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw}")))
}

fn parse_csv(v: String) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_need_no_env() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.shipments_file, PathBuf::from("shipments.json"));
        assert_eq!(cfg.auth_dir, PathBuf::from("./auth_info_baileys"));
        assert_eq!(cfg.qr_image_path, PathBuf::from("qr.png"));
        assert!(cfg.qr_terminal);
        assert_eq!(cfg.sidecar_url, "ws://127.0.0.1:3030");
        assert_eq!(cfg.browser, vec!["Baileys", "NodeJS"]);
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(1000));
        assert_eq!(cfg.message_queue_capacity, 64);
        assert!(cfg.audit_log_path.is_none());
        assert!(!cfg.audit_log_json);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = from_pairs(&[
            ("SHIPMENTS_FILE", "/data/ships.json"),
            ("QR_TERMINAL", "off"),
            ("WA_BROWSER", "Tracker, Linux"),
            ("RECONNECT_DELAY_MS", "250"),
            ("AUDIT_LOG_PATH", "/tmp/stb-audit.log"),
            ("AUDIT_LOG_JSON", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.shipments_file, PathBuf::from("/data/ships.json"));
        assert!(!cfg.qr_terminal);
        assert_eq!(cfg.browser, vec!["Tracker", "Linux"]);
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(250));
        assert_eq!(
            cfg.audit_log_path.as_deref(),
            Some(Path::new("/tmp/stb-audit.log"))
        );
        assert!(cfg.audit_log_json);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = from_pairs(&[("SHIPMENTS_FILE", "  "), ("AUDIT_LOG_PATH", "")]).unwrap();
        assert_eq!(cfg.shipments_file, PathBuf::from("shipments.json"));
        assert!(cfg.audit_log_path.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            from_pairs(&[("WA_SIDECAR_URL", "http://localhost:3030")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("RECONNECT_DELAY_MS", "soon")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("MESSAGE_QUEUE_CAPACITY", "0")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            from_pairs(&[("WA_BROWSER", "OnlyOne")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
        assert_eq!(unquote("x"), "x");
    }
}
