//! # scmforge Core
//!
//! Core library for bulk-provisioning Strata Cloud Manager configuration objects.
//!
//! This crate provides:
//! - A single-flight [`TokenGuard`] that shares one OAuth credential across workers
//! - A one-shot HTTP [`Transport`] with a fixed per-request timeout
//! - An [`ObjectCreator`] that retries invalid-reference and rate-limit responses
//! - A [`BatchOrchestrator`] that runs creators over a bounded worker pool
//! - A [`BatchReport`] summarizing created, existing, and failed objects
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use scmforge_core::*;
//!
//! async fn provision(definitions: Vec<ObjectDefinition>) -> Result<BatchReport, ScmforgeError> {
//!     let credentials = ClientCredentials::new("client-id", "client-secret", "1234567890");
//!     let provider = ClientCredentialsProvider::new(provider::DEFAULT_TOKEN_URL, &credentials)?;
//!     let guard = Arc::new(TokenGuard::new(
//!         Arc::new(provider),
//!         Arc::new(FileTokenStore::new("token_cache.json")),
//!     ));
//!
//!     let client = ScmClient::new(
//!         endpoint::parse_base(endpoint::DEFAULT_API_BASE_URL)?,
//!         guard,
//!         Arc::new(HttpTransport::new()),
//!     );
//!     let creator = client.creator(ObjectType::Tags, "Shared", "")?;
//!     let batch = BatchOrchestrator::new(Arc::new(creator), RetryPolicy::default());
//!
//!     let outcomes = batch.run(definitions, 8).await?;
//!     Ok(BatchReport::from_outcomes(outcomes))
//! }
//! ```

pub mod batch;
pub mod classify;
pub mod client;
pub mod creator;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod provider;
pub mod report;
pub mod store;
pub mod token;
pub mod token_guard;
pub mod transport;

// Re-export commonly used types at crate root
pub use model::{
    CreateOutcome,
    DefinitionError,
    FailureReason,
    ObjectDefinition,
    ObjectType,
};

pub use store::{
    FileTokenStore,
    MemoryTokenStore,
    Secret,
    StoreError,
    TokenStore,
};

pub use token::{
    AuthError,
    Credential,
    TokenProvider,
};

pub use token_guard::TokenGuard;

pub use provider::{
    ClientCredentials,
    ClientCredentialsProvider,
};

pub use transport::{
    ApiRequest,
    ApiResponse,
    HttpTransport,
    Method,
    ResponseBody,
    Transport,
    TransportError,
};

pub use classify::{
    ResponseClass,
    classify_response,
};

pub use creator::{
    ObjectCreator,
    RetryPolicy,
};

pub use batch::{
    BatchError,
    BatchOrchestrator,
};

pub use report::BatchReport;

pub use client::{
    ListQuery,
    MoveDestination,
    MoveRule,
    Rulebase,
    ScmClient,
};

pub use error::ScmforgeError;
