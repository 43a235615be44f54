//! Error types for artifact loading

use crate::service::RawResponse;
use std::sync::Arc;

/// Failure of a load operation
///
/// Cloneable so a single in-flight fetch can hand the same error to every
/// caller that joined it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// A required parameter was missing or out of range; no request was made
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model is not part of the backend's model registry
    #[error("no model named {0}")]
    UnknownModel(String),

    /// The backend refused to list its models
    #[error("failed to load model registry (status {})", .0.status)]
    RegistryLoad(RawResponse),

    /// Non-success response for any other resource
    #[error("backend returned status {} for {resource}", .response.status)]
    Backend {
        resource: String,
        response: RawResponse,
    },

    /// Response body did not match the expected schema
    #[error("failed to decode {resource}: {message}")]
    Decode { resource: String, message: String },

    /// Connection, timeout or protocol failure
    #[error("transport error: {0:#}")]
    Transport(Arc<anyhow::Error>),
}

impl LoadError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn transport(err: anyhow::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Returned when a notification is sent after the relay has stopped
#[derive(Debug, Clone, thiserror::Error)]
#[error("notification relay is closed")]
pub struct RelayClosed;
