//! In-memory token storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{StoreError, TokenStore};
use crate::token::Credential;

/// In-memory token store for testing and one-shot runs.
///
/// This store is not persistent; the credential is lost when the process exits.
#[derive(Default)]
pub struct MemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store that already holds a credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore")
            .field("populated", &self.credential.read().is_some())
            .finish()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.credential.read().clone())
    }

    async fn write(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.credential.write() = Some(credential.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_memory_store_empty() {
        let store = MemoryTokenStore::new();
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryTokenStore::with_credential(Credential::new(
            "old",
            Utc::now() + Duration::minutes(5),
        ));

        let fresh = Credential::new("new", Utc::now() + Duration::minutes(15));
        store.write(&fresh).await.unwrap();

        let stored = store.read().await.unwrap().unwrap();
        assert_eq!(stored.access_token.expose(), "new");
    }
}
