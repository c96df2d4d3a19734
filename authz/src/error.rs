//! Error types for the authorization core.
//!
//! # Security Note
//! Error messages must balance providing useful information for debugging while
//! not leaking policy details to clients. The HTTP layer maps every variant
//! here to an opaque 5xx body; the detailed message only reaches the logs.
//!
//! Denials are *not* errors. A request that lacks permissions produces an
//! [`Authorization`](crate::Authorization) with a deny decision, never an
//! `AuthzError`.

use thiserror::Error;

/// Errors that can occur while computing an authorization decision.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A permission document could not be parsed as a whole.
    ///
    /// Individual malformed rules never produce this error; they are dropped
    /// and the rest of the document applies.
    #[error("Malformed permission document {uri}: {reason}")]
    MalformedDocument { uri: String, reason: String },

    /// Reading a document or probing a resource failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The group membership resolver failed.
    #[error("Group resolution failed: {0}")]
    GroupResolution(String),

    /// An identifier is not an absolute URI or lies outside the server.
    #[error("Invalid resource identifier: {0}")]
    InvalidIdentifier(String),

    /// The HTTP method has no access-mode mapping.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The reader composition could not be built.
    #[error("Invalid authorization configuration: {0}")]
    Configuration(String),

    /// The request-scoped deadline expired before a decision was reached.
    ///
    /// In-flight reader work has been cancelled. This is an abort, not a
    /// denial.
    #[error("Authorization deadline exceeded")]
    DeadlineExceeded,

    /// Catch-all for unexpected failures that should be investigated.
    #[error("Internal authorization error: {0}")]
    Internal(String),
}

impl AuthzError {
    pub fn malformed(uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedDocument {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for AuthzError {
    fn from(err: std::io::Error) -> Self {
        AuthzError::Fetch(err.to_string())
    }
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
