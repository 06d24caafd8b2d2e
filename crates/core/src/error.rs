//! Error types for the SatClass workflow

use thiserror::Error;

/// Errors surfaced by the ROI-to-classification workflow.
///
/// None of these variants are ever produced after the map surface has been
/// mutated: every failure path leaves the overlay state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A precondition was not met before submitting (no raster, no ROI, bad input).
    /// Raised locally, never after a network call.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("bounds unavailable: {0}")]
    BoundsUnavailable(String),

    #[error("classification failed: {reason}")]
    ClassificationFailed { reason: String },

    #[error("invalid model: {0} (expected one of XGBoost, Random Forest, LightGBM)")]
    InvalidModel(String),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl Error {
    /// Shorthand for a [`Error::ClassificationFailed`] with the given reason.
    pub fn classification_failed(reason: impl Into<String>) -> Self {
        Error::ClassificationFailed {
            reason: reason.into(),
        }
    }
}

/// Result type alias for SatClass operations
pub type Result<T> = std::result::Result<T, Error>;
