//! Credential persistence.
//!
//! A single credential set is kept at a time; every save replaces the
//! previous one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;

/// Default location of the persisted credential file.
pub const DEFAULT_COOKIE_FILE: &str = "cookies/bilibili_cookies.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error while {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted credential set.
    ///
    /// Returns `None` (and logs why) when nothing usable is stored.
    async fn load(&self) -> Option<Credentials>;

    /// Replace the persisted credential set.
    async fn save(&self, credentials: &Credentials) -> Result<()>;
}

/// Stores the credential set as a flat JSON object in one file.
#[derive(Debug, Clone)]
pub struct JsonFileCredentialStore {
    path: PathBuf,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Ensure the parent directory of a file path exists.
async fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| StoreError::io("creating directory", parent, e))
}

#[async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn load(&self) -> Option<Credentials> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Cookie file not found");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read cookie file");
                return None;
            }
        };

        match serde_json::from_slice::<Credentials>(&raw) {
            Ok(credentials) => {
                debug!(
                    path = %self.path.display(),
                    fields = credentials.len(),
                    "Loaded credentials"
                );
                Some(credentials)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cookie file is not valid JSON");
                None
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        ensure_parent_dir(&self.path).await?;

        let json = serde_json::to_vec_pretty(credentials)?;
        let tmp = self.temp_path();

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| StoreError::io("writing", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io("replacing", &self.path, e))?;

        info!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }
}

/// Keeps the credential set in memory only.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Option<Credentials> {
        self.inner.lock().clone()
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.lock() = Some(credentials.clone());
        Ok(())
    }
}
