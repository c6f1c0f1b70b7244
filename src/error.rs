use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Rule that caused the safety validator to refuse a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyViolation {
    NotSelect,
    DisallowedKeyword(String),
    LimitExceeded { limit: u64, max: u64 },
    StatementStacking,
    ParameterInjection(String),
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyViolation::NotSelect => {
                write!(f, "only read-only SELECT queries are permitted")
            }
            SafetyViolation::DisallowedKeyword(word) => {
                write!(f, "write operations are blocked by safety policy ('{}')", word)
            }
            SafetyViolation::LimitExceeded { limit, max } => {
                write!(f, "query limit {} exceeds allowed maximum {}", limit, max)
            }
            SafetyViolation::StatementStacking => {
                write!(f, "multiple statements are not allowed")
            }
            SafetyViolation::ParameterInjection(name) => {
                write!(f, "potential injection attempt detected in parameter '{}'", name)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum DataWiseError {
    #[error("Unable to map question to a known table: {0}")]
    UnresolvableIntent(String),

    #[error("Safety rejection: {0}")]
    SafetyRejection(SafetyViolation),

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, transient: bool },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataWiseError {
    pub fn upstream(message: impl Into<String>, transient: bool) -> Self {
        DataWiseError::UpstreamUnavailable {
            message: message.into(),
            transient,
        }
    }

    /// Errors caused by the question itself. These are reported to the caller
    /// as bad input and never retried.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DataWiseError::UnresolvableIntent(_) | DataWiseError::SafetyRejection(_)
        )
    }

    /// Network-class failures that may succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataWiseError::UpstreamUnavailable { transient: true, .. }
        )
    }
}

impl From<SafetyViolation> for DataWiseError {
    fn from(violation: SafetyViolation) -> Self {
        DataWiseError::SafetyRejection(violation)
    }
}

impl From<sqlx::Error> for DataWiseError {
    fn from(err: sqlx::Error) -> Self {
        let transient = matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
        );
        DataWiseError::upstream(err.to_string(), transient)
    }
}

pub type Result<T> = std::result::Result<T, DataWiseError>;
