//! Session credential persistence (the `creds.update` blob).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::{errors::Error, Result};

const CREDS_FILE: &str = "creds.json";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Previously saved credentials, `None` when the account was never linked.
    async fn load(&self) -> Result<Option<serde_json::Value>>;
    async fn save(&self, creds: &serde_json::Value) -> Result<()>;
}

/// Stores credentials as `creds.json` inside an auth folder.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }

    /// Create the auth folder if needed; fails if the path is not a directory.
    pub async fn ensure_dir(&self) -> Result<()> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(md) if md.is_dir() => Ok(()),
            Ok(_) => Err(Error::InvalidPath {
                path: self.dir.clone(),
                reason: "auth path exists but is not a directory".to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.dir).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<serde_json::Value>> {
        let path = self.creds_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, creds: &serde_json::Value) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.creds_path();
        let tmp = tmp_sibling(&path);
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(creds)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), "saved session credentials");
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn tmp_dir(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    #[tokio::test]
    async fn missing_creds_load_as_none() {
        let store = FileCredentialStore::new(tmp_dir("stb-creds-none"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_creates_folder_and_round_trips() {
        let dir = tmp_dir("stb-creds");
        let store = FileCredentialStore::new(&dir);
        let creds = serde_json::json!({
            "me": {"id": "966500000000:1@s.whatsapp.net"},
            "registered": true
        });

        store.save(&creds).await.unwrap();
        assert!(dir.join("creds.json").is_file());
        assert!(!dir.join("creds.json.tmp").exists());
        assert_eq!(store.load().await.unwrap(), Some(creds));

        let updated = serde_json::json!({"registered": false});
        store.save(&updated).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(updated));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn auth_path_that_is_a_file_is_rejected() {
        let path = tmp_dir("stb-creds-file");
        std::fs::write(&path, "x").unwrap();
        let store = FileCredentialStore::new(&path);
        let err = store
            .save(&serde_json::json!({}))
            .await
            .expect_err("file is not a directory");
        assert!(matches!(err, Error::InvalidPath { .. }));
        let _ = std::fs::remove_file(&path);
    }
}
