//! Core error types.

use thiserror::Error;

/// Store collaborator errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Notification channel errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    #[error("send failed: {0}")]
    SendFailed(String),
}
