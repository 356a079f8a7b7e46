//! Create one object with bounded retries.
//!
//! [`ObjectCreator::create`] always ends in exactly one [`CreateOutcome`]
//! unless the credential cannot be refreshed, which is returned as
//! [`AuthError`] so the caller can abort the batch.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::classify::{ResponseClass, classify_response};
use crate::model::{CreateOutcome, FailureReason, ObjectDefinition};
use crate::token::AuthError;
use crate::token_guard::TokenGuard;
use crate::transport::{ApiRequest, DEFAULT_REQUEST_TIMEOUT, Transport};

/// Retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Bounds on how hard one definition is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; at most `max_retries + 1` requests are sent.
    pub max_retries: u32,
    /// Fixed pause before each retry.
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

/// Creates objects of one type in one folder.
pub struct ObjectCreator {
    guard: Arc<TokenGuard>,
    transport: Arc<dyn Transport>,
    endpoint: Url,
    timeout: Duration,
}

impl ObjectCreator {
    /// Create a creator posting to `endpoint`.
    pub fn new(guard: Arc<TokenGuard>, transport: Arc<dyn Transport>, endpoint: Url) -> Self {
        Self {
            guard,
            transport,
            endpoint,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Attempt to create one object.
    pub async fn create(
        &self,
        definition: &ObjectDefinition,
        policy: &RetryPolicy,
    ) -> Result<CreateOutcome, AuthError> {
        let name = definition.name();
        let max_attempts = policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let exhausted = attempt >= max_attempts;

            // Re-checked every attempt; a long retry sleep may cross expiry.
            let token = self.guard.valid_token().await?;
            let request = ApiRequest::post(self.endpoint.as_str())
                .bearer(token)
                .json(definition.to_payload())
                .timeout(self.timeout);

            let last_error = match self.transport.call(request).await {
                Ok(response) => match classify_response(&response) {
                    class if class.is_retryable() => {
                        tracing::warn!(
                            object = %name,
                            attempt,
                            max_attempts,
                            "{:?} response, will re-attempt; verify this went through: {}",
                            class,
                            response.body
                        );
                        response.body.to_string()
                    }
                    ResponseClass::Created => {
                        tracing::info!(object = %name, "Object created");
                        return Ok(CreateOutcome::Created(name.to_string()));
                    }
                    ResponseClass::AlreadyExists => {
                        tracing::info!(object = %name, "Object already exists");
                        return Ok(CreateOutcome::AlreadyExists(name.to_string()));
                    }
                    _ => {
                        tracing::error!(
                            object = %name,
                            status = response.status,
                            "Error response: {}",
                            response.body
                        );
                        return Ok(CreateOutcome::Failed {
                            name: name.to_string(),
                            reason: FailureReason::CreationFailed {
                                status: response.status,
                                body: response.body.to_string(),
                            },
                        });
                    }
                },
                Err(e) => {
                    tracing::warn!(object = %name, attempt, max_attempts, "Request failed: {}", e);
                    if exhausted {
                        return Ok(CreateOutcome::Failed {
                            name: name.to_string(),
                            reason: FailureReason::Exception {
                                message: e.to_string(),
                            },
                        });
                    }
                    e.to_string()
                }
            };

            if exhausted {
                tracing::error!(object = %name, "Giving up after {} attempts", attempt);
                return Ok(CreateOutcome::Failed {
                    name: name.to_string(),
                    reason: FailureReason::RetriesExhausted {
                        attempts: attempt,
                        last_error,
                    },
                });
            }

            tokio::time::sleep(policy.retry_delay).await;
        }
    }
}

impl std::fmt::Debug for ObjectCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCreator")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}
