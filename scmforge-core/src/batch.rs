//! Bounded-concurrency batch creation.
//!
//! Every definition becomes one task in a [`JoinSet`]; a [`Semaphore`] with
//! `concurrency` permits caps how many of them are inside
//! [`ObjectCreator::create`] at once. Tasks are spawned in input order and
//! collected in completion order.
//!
//! Item failures stay inside their [`CreateOutcome`]. The only batch-level
//! failure is [`AuthError`]: the worker that hits it closes the semaphore so
//! queued items never start, in-flight items are drained, and the error is
//! returned.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::creator::{ObjectCreator, RetryPolicy};
use crate::model::{CreateOutcome, ObjectDefinition};
use crate::token::AuthError;

/// Error that stops a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A pool with no workers would never make progress.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// The shared credential could not be refreshed.
    #[error("batch aborted, credential unavailable: {0}")]
    Auth(#[from] AuthError),

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
}

/// Fans create calls out over a bounded worker pool.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    creator: Arc<ObjectCreator>,
    policy: RetryPolicy,
}

impl BatchOrchestrator {
    pub fn new(creator: Arc<ObjectCreator>, policy: RetryPolicy) -> Self {
        Self { creator, policy }
    }

    /// Create every definition, at most `concurrency` at a time.
    ///
    /// Returns one outcome per definition, in completion order.
    pub async fn run(
        &self,
        definitions: Vec<ObjectDefinition>,
        concurrency: usize,
    ) -> Result<Vec<CreateOutcome>, BatchError> {
        if concurrency == 0 {
            return Err(BatchError::ZeroConcurrency);
        }

        let total = definitions.len();
        tracing::info!(
            endpoint = %self.creator.endpoint(),
            "Creating {} objects with {} workers",
            total,
            concurrency
        );

        let permits = Arc::new(Semaphore::new(concurrency));
        let mut workers = JoinSet::new();

        for definition in definitions {
            let permits = permits.clone();
            let creator = self.creator.clone();
            let policy = self.policy;

            workers.spawn(async move {
                // Closed after an auth failure: skip without touching the API.
                let Ok(_permit) = permits.clone().acquire_owned().await else {
                    return Ok(None);
                };
                let result = creator.create(&definition, &policy).await;
                if result.is_err() {
                    // Before our permit is released, so no queued item starts.
                    permits.close();
                }
                result.map(Some)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut auth_failure = None;
        let mut worker_failure = None;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(Some(outcome))) => {
                    tracing::info!("[{}/{}] {}", outcomes.len() + 1, total, outcome);
                    outcomes.push(outcome);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    if auth_failure.is_none() {
                        tracing::error!("Credential refresh failed, aborting batch: {}", e);
                        auth_failure = Some(e);
                    }
                }
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    worker_failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = auth_failure {
            return Err(e.into());
        }
        if let Some(e) = worker_failure {
            return Err(e.into());
        }

        Ok(outcomes)
    }

    /// Like [`run`](Self::run), skipping the first `start_index` definitions.
    ///
    /// Used to resume a batch that was interrupted part way through.
    pub async fn resume(
        &self,
        definitions: Vec<ObjectDefinition>,
        start_index: usize,
        concurrency: usize,
    ) -> Result<Vec<CreateOutcome>, BatchError> {
        if start_index > definitions.len() {
            tracing::warn!(
                "Start index {} is past the end of {} definitions, nothing to do",
                start_index,
                definitions.len()
            );
        }
        let remaining = definitions.into_iter().skip(start_index).collect();
        self.run(remaining, concurrency).await
    }
}
