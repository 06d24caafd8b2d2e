//! GeoBounds resolution for newly selected rasters.
//!
//! The resolver only talks to the backend; it never touches the map.
//! Callers decide what to do with the bounds it returns.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use satclass_core::{Error, GeoBounds, RasterReference, Result, SelectedRaster};

use crate::backend::Backend;

/// Where a raster comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterSource {
    /// A local GeoTIFF to upload.
    File(std::path::PathBuf),
    /// An externally hosted GeoTIFF, optionally with known bounds.
    Url {
        url: String,
        bounds: Option<GeoBounds>,
    },
}

/// Resolves a raster's geographic extent via the backend.
pub struct BoundsResolver<B: Backend + ?Sized> {
    backend: Arc<B>,
}

impl<B: Backend + ?Sized> BoundsResolver<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Resolve any raster source into a selection with cached bounds.
    pub async fn resolve(&self, source: RasterSource) -> Result<SelectedRaster> {
        match source {
            RasterSource::File(path) => self.upload(&path).await,
            RasterSource::Url { url, bounds } => reference_url(url, bounds),
        }
    }

    /// Upload a local GeoTIFF and return its backend key and bounds.
    ///
    /// Fails with [`Error::BoundsUnavailable`] for non-TIFF files, unreadable
    /// files, and any backend failure.
    pub async fn upload(&self, path: &Path) -> Result<SelectedRaster> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::BoundsUnavailable(format!("invalid file name: {}", path.display())))?
            .to_string();
        if !is_geotiff_name(&file_name) {
            return Err(Error::BoundsUnavailable(format!(
                "{file_name} is not a GeoTIFF (.tif/.tiff)"
            )));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::BoundsUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;

        let response = self.backend.upload(&file_name, bytes).await.map_err(|e| {
            warn!(file = %file_name, error = %e, "upload failed");
            Error::BoundsUnavailable(e.reason())
        })?;

        let bounds = response.geo_bounds()?;
        let key = response.key.clone().unwrap_or(file_name);
        debug!(%key, ?bounds, "raster bounds resolved");

        Ok(SelectedRaster::new(RasterReference::backend_key(key)?, Some(bounds)).with_preview(response.url))
    }
}

/// Select an externally hosted raster. No network call is made; bounds are
/// whatever the caller already knows.
pub fn reference_url(url: impl AsRef<str>, bounds: Option<GeoBounds>) -> Result<SelectedRaster> {
    let reference = RasterReference::url(url)?;
    if let Some(b) = bounds.filter(|b| !b.has_area()) {
        return Err(Error::Validation(format!(
            "raster bounds enclose no area: {:?}",
            b.to_backend()
        )));
    }
    let preview = bounds.map(|_| reference.value().to_string());
    let selected = SelectedRaster::new(reference, bounds);
    Ok(match preview {
        Some(url) => selected.with_preview(url),
        None => selected,
    })
}

fn is_geotiff_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tif") || lower.ends_with(".tiff")
}
