//! Top-level error types for scmforge.

use thiserror::Error;

use crate::batch::BatchError;
use crate::endpoint::EndpointError;
use crate::model::DefinitionError;
use crate::token::AuthError;
use crate::transport::TransportError;

/// Top-level error type encompassing all scmforge errors.
#[derive(Debug, Error)]
pub enum ScmforgeError {
    /// The credential could not be obtained.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A request never completed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API answered with an unexpected status.
    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The API answered 2xx with a body we could not use.
    #[error("unexpected response: {message}")]
    UnexpectedResponse { message: String },

    /// A request was rejected before it was sent.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// An endpoint URL could not be built.
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// An object definition was rejected before submission.
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// A batch stopped before completing.
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),
}
