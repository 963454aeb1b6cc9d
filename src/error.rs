//! Stable error codes shared by the HTTP surface and logs.

use serde::Serialize;

/// An error that carries a machine-readable code.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    /// Whether repeating the same operation later may succeed.
    fn retryable(&self) -> bool {
        false
    }
}

/// JSON body returned for a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
}

impl ErrorBody {
    pub fn from_error(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { error: err.to_string(), code: err.error_code(), retryable: err.retryable() }
    }
}
