//! JSON token file storage.
//!
//! The file holds a single record:
//!
//! ```json
//! { "access_token": "eyJ...", "expires_at": 1718000000.0 }
//! ```
//!
//! `expires_at` is Unix seconds and may be fractional. A record whose
//! `access_token` is `null` is treated as empty.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use super::{StoreError, TokenStore};
use crate::token::Credential;

/// On-disk layout of the token file.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    access_token: Option<String>,
    #[serde(default)]
    expires_at: f64,
}

/// Token store backed by a JSON file.
///
/// Writes go through a sibling temporary file and a rename so a reader never
/// sees a partially written record.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store for the given file path. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn read(&self) -> Result<Option<Credential>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let record: TokenRecord = serde_json::from_str(&contents)?;
        let Some(access_token) = record.access_token else {
            return Ok(None);
        };

        if !record.expires_at.is_finite() || record.expires_at < 0.0 {
            return Err(StoreError::InvalidExpiry {
                value: record.expires_at,
            });
        }

        let secs = record.expires_at.trunc() as i64;
        let nanos = (record.expires_at.fract() * 1e9) as u32;
        let expires_at = DateTime::from_timestamp(secs, nanos).ok_or(StoreError::InvalidExpiry {
            value: record.expires_at,
        })?;

        Ok(Some(Credential::new(access_token, expires_at)))
    }

    async fn write(&self, credential: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let record = TokenRecord {
            access_token: Some(credential.access_token.expose().to_string()),
            expires_at: credential.expires_at.timestamp() as f64,
        };
        let contents = serde_json::to_string(&record)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, contents)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        tracing::debug!("Persisted credential to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileTokenStore {
        FileTokenStore::new(dir.path().join("token_cache.json"))
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let expires_at = Utc.timestamp_opt(1_900_000_000, 0).unwrap();

        store
            .write(&Credential::new("cached-token", expires_at))
            .await
            .unwrap();

        let credential = store.read().await.unwrap().unwrap();
        assert_eq!(credential.access_token.expose(), "cached-token");
        assert_eq!(credential.expires_at, expires_at);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_reads_fractional_expiry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"access_token": "abc", "expires_at": 1900000000.5}"#,
        )
        .unwrap();

        let credential = store.read().await.unwrap().unwrap();
        assert_eq!(credential.expires_at.timestamp(), 1_900_000_000);
        assert_eq!(credential.expires_at.timestamp_subsec_millis(), 500);
    }

    #[tokio::test]
    async fn test_null_token_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"access_token": null, "expires_at": 0}"#).unwrap();

        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "not json").unwrap();

        assert!(matches!(
            store.read().await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested/cache/token.json"));

        store
            .write(&Credential::new("t", Utc::now()))
            .await
            .unwrap();

        assert!(store.path().exists());
    }
}
