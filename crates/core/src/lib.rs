//! # SatClass Core
//!
//! Core types for the SatClass ROI-to-classification workflow.
//!
//! This crate provides:
//! - `GeoBounds` / `LatLngBounds`: backend extents and the map's corner convention
//! - `RasterReference`: backend key or external URL of the source GeoTIFF
//! - `RoiCapture`: single-shape region-of-interest tracking with a full-bounds default
//! - `OverlayManager`: sole owner of the one image overlay on a `MapSurface`
//! - `ModelSelection`: the fixed set of classifiers
//!
//! Nothing here performs I/O; the network side lives in `satclass-cloud`.

pub mod bounds;
pub mod error;
pub mod model;
pub mod overlay;
pub mod raster;
pub mod request;
pub mod roi;

pub use bounds::{GeoBounds, LatLng, LatLngBounds};
pub use error::{Error, Result};
pub use model::{ModelName, ModelSelection};
pub use overlay::{HeadlessMap, ImageOverlay, LayerId, MapSurface, OverlayKind, OverlayManager, DEFAULT_OPACITY};
pub use raster::{LocatorKind, RasterReference, SelectedRaster};
pub use request::{ClassificationRequest, ClassificationResult, ResultMetadata};
pub use roi::{DrawnShape, RegionOfInterest, RoiCapture, RoiOrigin};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::bounds::{GeoBounds, LatLng, LatLngBounds};
    pub use crate::error::{Error, Result};
    pub use crate::model::ModelName;
    pub use crate::overlay::{MapSurface, OverlayKind, OverlayManager};
    pub use crate::raster::{RasterReference, SelectedRaster};
    pub use crate::roi::{DrawnShape, RegionOfInterest, RoiCapture};
}
