//! API credential types.
//!
//! This module provides:
//! - [`Credential`] - A bearer token and the instant it stops being accepted
//! - [`TokenProvider`] - Trait for obtaining a fresh credential from the identity service
//! - [`AuthError`] - Failure to obtain a usable credential

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::store::{Secret, StoreError};

/// Default safety margin before expiry, in seconds.
///
/// A credential is treated as expired once the current time is within this
/// many seconds of its `expires_at`.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 180;

/// Error type for credential acquisition.
///
/// Any variant is fatal to a batch: create calls are never issued against a
/// credential that could not be refreshed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity service rejected or failed the token request.
    #[error("token request failed: {message}")]
    RefreshFailed { message: String },

    /// The token endpoint or client configuration is unusable.
    #[error("invalid token endpoint configuration: {message}")]
    InvalidConfig { message: String },

    /// The identity service answered with a token we could not interpret.
    #[error("malformed token response: {message}")]
    MalformedResponse { message: String },

    /// Storage error while reading or persisting the credential.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// A bearer token with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The bearer token value.
    pub access_token: Secret,

    /// When the identity service stops accepting this token.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a new credential.
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            expires_at,
        }
    }

    /// Whether the credential should be considered expired at `now`.
    ///
    /// Expired iff `now > expires_at - buffer`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now > self.expires_at - buffer
    }

    /// Whether the credential should be considered expired right now.
    pub fn is_expired(&self, buffer: Duration) -> bool {
        self.is_expired_at(Utc::now(), buffer)
    }
}

/// Source of fresh credentials.
///
/// The [`TokenGuard`](crate::token_guard::TokenGuard) calls this only while
/// holding its refresh lock, so implementations need not deduplicate
/// concurrent requests themselves.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Request a new credential from the identity service.
    async fn fetch_token(&self) -> Result<Credential, AuthError>;
}
