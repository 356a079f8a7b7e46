//! Credential persistence.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`TokenStore`] - Trait for persisting the API credential between runs
//! - [`MemoryTokenStore`] - In-memory implementation for testing
//! - [`FileTokenStore`] - JSON token file compatible with the `{access_token, expires_at}` layout
//!
//! A store that is empty or cannot be read is treated by the
//! [`TokenGuard`](crate::token_guard::TokenGuard) as holding an expired
//! credential, which forces a refresh.
//!
//! # Example
//!
//! ```rust,ignore
//! use scmforge_core::store::{FileTokenStore, TokenStore};
//!
//! let store = FileTokenStore::new("token_cache.json");
//! if let Some(credential) = store.read().await? {
//!     println!("cached token expires at {}", credential.expires_at);
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::token::Credential;

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose) and is
/// wiped from memory when dropped. Debug and Display implementations show
/// `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for token store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the token file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored record could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored record parsed but holds an unusable expiry.
    #[error("invalid expiry timestamp: {value}")]
    InvalidExpiry { value: f64 },
}

/// Persistence backend for the single API credential.
///
/// Implementations include:
/// - [`MemoryTokenStore`] - In-memory storage for testing
/// - [`FileTokenStore`] - JSON file on disk
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the persisted credential.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    async fn read(&self) -> Result<Option<Credential>, StoreError>;

    /// Persist a credential, replacing whatever was stored before.
    async fn write(&self, credential: &Credential) -> Result<(), StoreError>;
}
