//! # Reference Error Inspection
//!
//! Remote requests that carry several file references fail with
//! `FILE_REFERENCE_<n>_EXPIRED` when the `n`-th reference is stale, or with a
//! bare `FILE_REFERENCE_EXPIRED`/`FILE_REFERENCE_INVALID` when there is only
//! one. Callers use these helpers to decide whether a failure is worth a
//! repair at all, and which file it is about.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message prefix of every file-reference error.
pub const FILE_REFERENCE_ERROR_PREFIX: &str = "FILE_REFERENCE_";

/// Status code the remote side uses for bad requests.
pub const BAD_REQUEST_CODE: i32 = 400;

/// Error returned by a remote request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteError {
    /// Numeric status code.
    pub code: i32,
    /// Error message, e.g. `FILE_REFERENCE_EXPIRED`.
    pub message: String,
}

impl RemoteError {
    /// Create a remote error.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// See [`is_reference_error`].
    pub fn is_reference_error(&self) -> bool {
        is_reference_error(self)
    }

    /// See [`error_position`].
    pub fn reference_position(&self) -> Option<usize> {
        error_position(self)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// True if the error says one of the request's file references is stale.
pub fn is_reference_error(error: &RemoteError) -> bool {
    error.code == BAD_REQUEST_CODE && error.message.starts_with(FILE_REFERENCE_ERROR_PREFIX)
}

/// Zero-based position of the stale reference inside the failed request.
///
/// `None` if the error is not a reference error or does not name a position.
pub fn error_position(error: &RemoteError) -> Option<usize> {
    if !is_reference_error(error) {
        return None;
    }
    let rest = &error.message[FILE_REFERENCE_ERROR_PREFIX.len()..];
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    rest[..digits].parse().ok()
}
