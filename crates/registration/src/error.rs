//! Error types of the registration core.
//!
//! Validation problems are not errors here: they live as messages in
//! `ValidationState`. The enums below cover remote calls, persisted session
//! state, photo uploads and misuse of a closed wizard.

use thiserror::Error;

use crate::photo::MAX_PHOTO_BYTES;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of a backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No usable response (connection refused, timeout, TLS, ...).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("request rejected with status {status}: {}", message.as_deref().unwrap_or("no details"))]
    Rejected { status: u16, message: Option<String> },
    /// The server answered, but not with the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text suitable for a user-facing notification.
    ///
    /// Network failures get a connectivity hint, server rejections surface the
    /// server's own message when it sent one, everything else falls back to
    /// `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            ApiError::Rejected {
                message: Some(m), ..
            } if !m.trim().is_empty() => m.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Failure of the injected session storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session store is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

/// Rejected photo upload. Nothing in the form is changed when this is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhotoError {
    #[error("Only PNG, JPG and JPEG images are allowed")]
    UnsupportedType { mime: String },
    #[error("Image size must be less than {} MB", MAX_PHOTO_BYTES / (1024 * 1024))]
    TooLarge { bytes: usize },
    #[error("Could not read the selected file: {0}")]
    Unreadable(String),
}

/// Misuse of the wizard controller (as opposed to user-facing failures,
/// which are reported through notifications and field errors).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("the registration wizard has been closed")]
    Closed,
    #[error("another {0} request is still running")]
    Busy(&'static str),
    /// Cancel was requested; only confirming or dismissing it is accepted.
    #[error("cancellation is awaiting confirmation")]
    CancelPending,
}
