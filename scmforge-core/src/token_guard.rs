//! Single-flight credential holder.
//!
//! [`TokenGuard`] owns the one credential shared by every worker in a batch.
//! Callers only ever see [`TokenGuard::valid_token`]; the raw credential is
//! never handed out for independent mutation.
//!
//! # Refresh discipline
//!
//! A single async mutex is held across both the expiry check and the refresh
//! call. When N callers observe an expired credential at once, the first one
//! through the lock refreshes; the rest queue on the lock and then find the
//! fresh credential already cached.
//!
//! ```text
//! Valid --(time passes)--> NearExpiry --(first caller)--> Refreshing --> Valid
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scmforge_core::{ClientCredentials, ClientCredentialsProvider, FileTokenStore, TokenGuard};
//!
//! let credentials = ClientCredentials::new("client-id", "client-secret", "1234567890");
//! let provider = ClientCredentialsProvider::new(scmforge_core::provider::DEFAULT_TOKEN_URL, &credentials)?;
//! let guard = TokenGuard::new(Arc::new(provider), Arc::new(FileTokenStore::new("token_cache.json")));
//!
//! let token = guard.valid_token().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::store::{Secret, TokenStore};
use crate::token::{AuthError, Credential, DEFAULT_EXPIRY_BUFFER_SECS, TokenProvider};

/// Guards the shared API credential.
pub struct TokenGuard {
    provider: Arc<dyn TokenProvider>,
    store: Arc<dyn TokenStore>,
    /// `None` until the persisted credential has been loaded or a refresh has run.
    cached: Mutex<Option<Credential>>,
    expiry_buffer: Duration,
    refreshes: AtomicU64,
}

impl TokenGuard {
    /// Create a guard with the default 180 second expiry buffer.
    pub fn new(provider: Arc<dyn TokenProvider>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            provider,
            store,
            cached: Mutex::new(None),
            expiry_buffer: Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECS),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Override the safety margin before expiry.
    pub fn with_expiry_buffer(mut self, buffer: std::time::Duration) -> Self {
        self.expiry_buffer = Duration::seconds(buffer.as_secs() as i64);
        self
    }

    /// Return a token that is not expired at the instant of return.
    ///
    /// Refreshes first if the cached credential is missing or within the
    /// expiry buffer.
    pub async fn valid_token(&self) -> Result<Secret, AuthError> {
        Ok(self.obtain_token(false).await?.access_token)
    }

    /// Return the current credential, refreshing it when expired or when
    /// `force_refresh` is set.
    pub async fn obtain_token(&self, force_refresh: bool) -> Result<Credential, AuthError> {
        let mut cached = self.cached.lock().await;

        if !force_refresh {
            if cached.is_none() {
                *cached = self.load_persisted().await;
            }

            if let Some(credential) = cached.as_ref() {
                if !credential.is_expired(self.expiry_buffer) {
                    tracing::debug!("Using cached access token");
                    return Ok(credential.clone());
                }
            }

            tracing::info!("Access token missing or near expiry, refreshing");
        } else {
            tracing::info!("Forced access token refresh");
        }

        let fresh = self.refresh().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// When the cached credential expires, without refreshing.
    ///
    /// Returns `None` when nothing has been loaded or refreshed yet.
    pub async fn cached_expiry(&self) -> Option<DateTime<Utc>> {
        self.cached.lock().await.as_ref().map(|c| c.expires_at)
    }

    /// Number of refresh calls issued to the provider since creation.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Must only be called with `cached` locked.
    async fn refresh(&self) -> Result<Credential, AuthError> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let fresh = self.provider.fetch_token().await.map_err(|e| {
            tracing::error!("Failed to refresh access token: {}", e);
            e
        })?;

        if fresh.is_expired(self.expiry_buffer) {
            tracing::error!(
                "Refreshed access token expires at {}, inside the {}s expiry buffer",
                fresh.expires_at,
                self.expiry_buffer.num_seconds()
            );
            return Err(AuthError::MalformedResponse {
                message: "token lifetime shorter than expiry buffer".to_string(),
            });
        }

        // The in-memory credential is still good for this run even if it
        // cannot be persisted for the next one.
        if let Err(e) = self.store.write(&fresh).await {
            tracing::warn!("Failed to persist refreshed access token: {}", e);
        }

        tracing::info!("Refreshed access token, expires at {}", fresh.expires_at);
        Ok(fresh)
    }

    async fn load_persisted(&self) -> Option<Credential> {
        match self.store.read().await {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!("Stored access token unreadable, treating as expired: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for TokenGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGuard")
            .field("expiry_buffer", &self.expiry_buffer)
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTokenStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Provider that counts calls and takes a while to answer.
    struct CountingProvider {
        calls: AtomicUsize,
        delay: std::time::Duration,
        lifetime: Duration,
        fail: bool,
    }

    impl CountingProvider {
        fn new(delay_ms: u64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: std::time::Duration::from_millis(delay_ms),
                lifetime: Duration::minutes(15),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(0)
            }
        }

        fn short_lived(lifetime: Duration) -> Self {
            Self {
                lifetime,
                ..Self::new(0)
            }
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn fetch_token(&self) -> Result<Credential, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AuthError::RefreshFailed {
                    message: "invalid_client".to_string(),
                });
            }
            Ok(Credential::new(
                format!("fresh-token-{}", n),
                Utc::now() + self.lifetime,
            ))
        }
    }

    fn guard_with(
        provider: Arc<CountingProvider>,
        store: Arc<MemoryTokenStore>,
    ) -> TokenGuard {
        TokenGuard::new(provider, store)
    }

    #[tokio::test]
    async fn test_uses_persisted_token_without_refresh() {
        let provider = Arc::new(CountingProvider::new(0));
        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "persisted",
            Utc::now() + Duration::hours(1),
        )));
        let guard = guard_with(provider.clone(), store);

        let token = guard.valid_token().await.unwrap();
        assert_eq!(token.expose(), "persisted");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refreshes_near_expiry_and_persists() {
        let provider = Arc::new(CountingProvider::new(0));
        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "stale",
            Utc::now() + Duration::seconds(90),
        )));
        let guard = guard_with(provider.clone(), store.clone());

        let token = guard.valid_token().await.unwrap();
        assert_eq!(token.expose(), "fresh-token-1");

        let persisted = store.read().await.unwrap().unwrap();
        assert_eq!(persisted.access_token.expose(), "fresh-token-1");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let provider = Arc::new(CountingProvider::new(50));
        let store = Arc::new(MemoryTokenStore::new());
        let guard = Arc::new(guard_with(provider.clone(), store));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move { guard.valid_token().await }));
        }

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.expose(), "fresh-token-1");
        }

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let provider = Arc::new(CountingProvider::new(0));
        let store = Arc::new(MemoryTokenStore::with_credential(Credential::new(
            "persisted",
            Utc::now() + Duration::hours(1),
        )));
        let guard = guard_with(provider.clone(), store);

        let credential = guard.obtain_token(true).await.unwrap();
        assert_eq!(credential.access_token.expose(), "fresh-token-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_auth_error() {
        let provider = Arc::new(CountingProvider::failing());
        let guard = guard_with(provider, Arc::new(MemoryTokenStore::new()));

        let result = guard.valid_token().await;
        assert!(matches!(result, Err(AuthError::RefreshFailed { .. })));
        assert!(guard.cached_expiry().await.is_none());
    }

    #[tokio::test]
    async fn test_token_shorter_than_buffer_is_rejected() {
        let provider = Arc::new(CountingProvider::short_lived(Duration::seconds(120)));
        let store = Arc::new(MemoryTokenStore::new());
        let guard = guard_with(provider.clone(), store.clone());

        let result = guard.valid_token().await;
        assert!(matches!(result, Err(AuthError::MalformedResponse { .. })));

        // Neither cached nor persisted
        assert!(guard.cached_expiry().await.is_none());
        assert!(store.read().await.unwrap().is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shorter_buffer_accepts_short_token() {
        let provider = Arc::new(CountingProvider::short_lived(Duration::seconds(120)));
        let guard = guard_with(provider.clone(), Arc::new(MemoryTokenStore::new()))
            .with_expiry_buffer(std::time::Duration::from_secs(60));

        for _ in 0..5 {
            assert_eq!(guard.valid_token().await.unwrap().expose(), "fresh-token-1");
        }
        assert_eq!(guard.refresh_count(), 1);
    }
}
