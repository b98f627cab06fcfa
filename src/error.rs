//! Error types for the survey API and the console's error taxonomy.
//!
//! [`ApiError`] is what every store operation returns. There is no structured
//! error-code scheme on the wire: server messages pass through verbatim.
//!
//! [`ErrorClass`] decides how an error is presented:
//!
//! | Class | Source | Presentation |
//! |-------|--------|--------------|
//! | `DegradedRead` | reference lists, schema, list data | logged, empty result |
//! | `PrimaryFetch` | the record being viewed or edited | blocking message in place of content |
//! | `Mutation` | add/update/delete | blocking notice naming the action |
//! | `Validation` | client-side checks | immediate message, no request sent |

use thiserror::Error;

/// Survey API error.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-success status
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Response body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rejected locally before any request was sent
    #[error("{0}")]
    Validation(String),

    /// Operation needs a session token and none is held
    #[error("not logged in; run `census login` first")]
    Unauthenticated,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// True when the failure happened locally and no request was issued.
    pub fn is_local(&self) -> bool {
        matches!(self, ApiError::Validation(_) | ApiError::Unauthenticated)
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// How a failure surfaces to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    DegradedRead,
    PrimaryFetch,
    Mutation { action: String },
    Validation,
}

impl ErrorClass {
    pub fn mutation(action: impl Into<String>) -> Self {
        ErrorClass::Mutation {
            action: action.into(),
        }
    }

    /// Whether the failure blocks the view. Degraded reads never do.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ErrorClass::DegradedRead)
    }

    /// Operator-facing text for `err` under this class.
    pub fn report(&self, err: &ApiError) -> String {
        match self {
            ErrorClass::DegradedRead => format!("warning: {} (showing empty data)", err),
            ErrorClass::PrimaryFetch => err.to_string(),
            ErrorClass::Mutation { action } => format!("Failed to {}: {}", action, err),
            ErrorClass::Validation => err.to_string(),
        }
    }
}

/// Converts a failed mutation into the operator-facing error: local
/// validation failures keep their message, server failures name `action`.
pub fn mutation_failure(err: ApiError, action: &str) -> anyhow::Error {
    let class = if err.is_local() {
        ErrorClass::Validation
    } else {
        ErrorClass::mutation(action)
    };
    anyhow::anyhow!(class.report(&err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_passes_through() {
        let err = ApiError::Server {
            status: 401,
            message: "Invalid credentials".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!err.is_local());
    }

    #[test]
    fn test_mutation_report_names_action() {
        let err = ApiError::Server {
            status: 500,
            message: "boom".to_string(),
        };
        let text = ErrorClass::mutation("delete households").report(&err);
        assert_eq!(text, "Failed to delete households: boom");
    }

    #[test]
    fn test_only_degraded_reads_are_non_blocking() {
        assert!(!ErrorClass::DegradedRead.is_blocking());
        assert!(ErrorClass::PrimaryFetch.is_blocking());
        assert!(ErrorClass::Validation.is_blocking());
        assert!(ErrorClass::mutation("x").is_blocking());
    }

    #[test]
    fn test_validation_is_local() {
        assert!(ApiError::validation("Field name cannot be empty").is_local());
        assert!(ApiError::Unauthenticated.is_local());
    }
}
