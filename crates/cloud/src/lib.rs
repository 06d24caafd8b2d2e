//! # SatClass Cloud
//!
//! Network side of the SatClass workflow: the HTTP client for the
//! upload/classification backend, bounds resolution for new rasters, and the
//! [`ClassificationSession`] that turns an ROI into a map overlay.
//!
//! ## Features
//!
//! - `native` (default): blocking API via a private tokio runtime

pub mod api_models;
pub mod backend;
pub mod error;
pub mod http;
pub mod resolver;
pub mod session;

pub mod sync_api;

pub use api_models::{PredictMetadata, PredictResponse, UploadResponse};
pub use backend::{Backend, HttpBackend, HttpBackendOptions, DEFAULT_BACKEND_URL};
pub use error::{CloudError, Result};
pub use resolver::{BoundsResolver, RasterSource};
pub use session::{ClassificationSession, Outcome, SessionOptions, SubmitOutcome};

/// Blocking API re-exported as `blocking` module (native only).
#[cfg(feature = "native")]
pub mod blocking {
    pub use crate::sync_api::*;
}
