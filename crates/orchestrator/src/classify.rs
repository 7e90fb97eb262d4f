//! Transient-vs-terminal classification of provider failures seen while
//! polling an asynchronous operation.

use crate::provider::ProviderError;

/// HTTP statuses that mean "try again later" rather than "this failed":
/// 429 Too Many Requests and 503 Service Unavailable.
const TRANSIENT_STATUS_CODES: [u16; 2] = [429, 503];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The operation is presumably still running; report it in progress.
    Transient,
    /// The operation failed.
    Terminal,
}

pub fn classify(err: &ProviderError) -> ErrorClass {
    match err {
        ProviderError::Unavailable(_) => ErrorClass::Transient,
        ProviderError::Upstream { status, .. } if TRANSIENT_STATUS_CODES.contains(status) => {
            ErrorClass::Transient
        }
        ProviderError::Upstream { .. } | ProviderError::Failed(_) => ErrorClass::Terminal,
    }
}
