//! Error types for the permission engine.

use thiserror::Error;

/// The main error type for permission engine operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The API server rejected the request because the caller lacks the
    /// RBAC permission to ask the question.
    #[error("access to {0} is forbidden")]
    Forbidden(String),

    /// The requested object does not exist on the API server.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// The kind of the missing object (e.g. "Organization").
        kind: String,
        /// The name of the missing object.
        name: String,
    },

    /// A permission key string did not have the `group:resource:name` shape.
    #[error("invalid permission key: '{0}'")]
    InvalidKey(String),

    /// The externally supplied use-case document could not be parsed.
    #[error("invalid use-case configuration: {0}")]
    InvalidUseCases(#[from] serde_json::Error),

    /// Any other API failure (transport, server-side, serialization).
    /// Never swallowed; always propagated to the caller.
    #[error("api request failed: {0}")]
    Api(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary API client failure.
    pub fn api(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Api(Box::new(err))
    }

    /// Whether the error means "the caller may not ask this question".
    ///
    /// Probe fan-outs treat forbidden responses as "false/unavailable" for
    /// the probed item; authoritative listing paths propagate them.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Forbidden(_))
    }

    /// Whether the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Result type alias for permission engine operations.
pub type Result<T> = std::result::Result<T, Error>;
