//! Error types for the entity store.

use thiserror::Error;

use crate::schema::ValidationError;

/// Errors that can occur while fetching or mutating entities.
#[derive(Debug, Error)]
pub enum EntityError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("request failed ({status}): {body}")]
    Status { status: u16, body: String },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response payload did not match the expected entity shape.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failure reported by a non-HTTP transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// Mutation attempted without a configured endpoint.
    #[error("no {0} endpoint configured")]
    MissingEndpoint(&'static str),

    /// Store configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EntityError {
    /// HTTP status of the failed request, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            EntityError::Status { status, .. } => Some(*status),
            EntityError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the server was reachable but returned a malformed payload.
    pub fn is_validation(&self) -> bool {
        matches!(self, EntityError::Validation(_) | EntityError::Json(_))
    }
}
