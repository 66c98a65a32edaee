// THEORY:
// Every fallible operation in the crate reports through a single `PatchError`.
// Parameter and dimension problems are caught before any scan starts, so a caller
// never receives a partial result alongside an error. Numeric degeneracies that
// occur in normal data (a flat patch with no gradient) are NOT errors; the
// component that meets them returns a documented fallback value instead.

use thiserror::Error;

/// Errors produced by the patch extraction core and its drivers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchError {
    /// A buffer or region does not have the dimensions an operation requires.
    #[error("invalid dimensions: expected {expected}, got {actual}")]
    InvalidDimensions { expected: String, actual: String },

    /// A configuration value is out of its legal range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The input carries no pixels to work on.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A background job of the parallel pipeline died before reporting.
    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

impl PatchError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        PatchError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn dimensions(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        PatchError::InvalidDimensions {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatchError>;
