//! Raster references: which image a classification runs against.

use serde::Serialize;
use url::Url;

use crate::bounds::GeoBounds;
use crate::error::{Error, Result};

/// Which backend form field a [`RasterReference`] travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Key of a raster resident on the backend (uploaded earlier).
    BackendKey,
    /// Externally hosted raster (S3, Hugging Face, ...).
    Url,
}

/// Identifies the source GeoTIFF.
///
/// The backend accepts exactly one locator per request: `input_tif_key` for
/// rasters previously uploaded to it, `tif_url` for externally hosted files.
/// Values can only be built through [`RasterReference::url`] and
/// [`RasterReference::backend_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RasterReference {
    kind: LocatorKind,
    value: String,
}

impl RasterReference {
    /// Reference an externally hosted raster.
    ///
    /// The URL must parse, use `http` or `https`, and name a host.
    pub fn url(url: impl AsRef<str>) -> Result<Self> {
        let raw = url.as_ref().trim();
        let parsed = Url::parse(raw)
            .map_err(|e| Error::Validation(format!("invalid raster URL {raw:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Validation(format!(
                "raster URL must be http(s): {raw:?}"
            )));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(Error::Validation(format!("raster URL has no host: {raw:?}")));
        }
        Ok(Self {
            kind: LocatorKind::Url,
            value: parsed.to_string(),
        })
    }

    /// Reference a raster already stored on the backend.
    pub fn backend_key(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::Validation("raster key is empty".into()));
        }
        Ok(Self {
            kind: LocatorKind::BackendKey,
            value: key,
        })
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    /// Multipart form field name carrying this locator.
    pub fn form_field(&self) -> &'static str {
        match self.kind {
            LocatorKind::BackendKey => "input_tif_key",
            LocatorKind::Url => "tif_url",
        }
    }

    /// The locator value (key or URL).
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for RasterReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.form_field(), self.value())
    }
}

/// The raster currently selected in a workflow.
///
/// Bounds are cached here for the lifetime of the selection; selecting a
/// different raster replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRaster {
    pub reference: RasterReference,
    /// Geographic extent, when known. Always known for uploads.
    pub bounds: Option<GeoBounds>,
    /// Displayable URL of the input image, when the backend returned one.
    pub preview_url: Option<String>,
}

impl SelectedRaster {
    pub fn new(reference: RasterReference, bounds: Option<GeoBounds>) -> Self {
        Self {
            reference,
            bounds,
            preview_url: None,
        }
    }

    pub fn with_preview(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }
}
