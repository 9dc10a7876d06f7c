//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use ohq_core::domain::QueueError;
use ohq_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const UNAUTHORIZED: i32 = 4003;
    pub const FEATURE_DISABLED: i32 = 4005;
    pub const QUEUE_CLOSED: i32 = 4006;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const STORE_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Domain(e) => domain_code(e),
        AppError::Store(_) => code::STORE_ERROR,
        AppError::Corrupt(_) | AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

fn domain_code(err: &QueueError) -> i32 {
    match err {
        QueueError::FeatureDisabled => code::FEATURE_DISABLED,
        QueueError::QueueClosed(_) => code::QUEUE_CLOSED,
        QueueError::AlreadyJoined { .. } | QueueError::InvalidState { .. } => code::CONFLICT,
        QueueError::NotInQueue { .. } | QueueError::EntryNotFound(_) => code::NOT_FOUND,
        QueueError::Unauthorized(_) => code::UNAUTHORIZED,
    }
}

/// Parameter rejected before reaching the engine
pub fn invalid_params(msg: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg.into(), None::<()>)
}
