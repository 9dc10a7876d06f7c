// Central Error Type for the Application

use crate::domain::QueueError;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The queue rule that was violated, if this is a domain error
    pub fn queue_error(&self) -> Option<&QueueError> {
        match self {
            AppError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Adapter crates turn their native errors into strings first (orphan rules)
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_is_exposed() {
        let err: AppError = QueueError::FeatureDisabled.into();
        assert_eq!(err.queue_error(), Some(&QueueError::FeatureDisabled));
        assert!(err.to_string().contains("disabled"));

        let err = AppError::from("disk I/O error".to_string());
        assert!(err.queue_error().is_none());
        assert!(matches!(err, AppError::Store(_)));
    }
}
