//! Backend wire types.
//!
//! Lightweight serde models for the `/upload` and `/predict` responses and
//! the FastAPI-style error body.

use serde::{Deserialize, Serialize};

use satclass_core::{ClassificationResult, Error, GeoBounds, RegionOfInterest, ResultMetadata};

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Response of `POST /upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Displayable URL of the uploaded raster.
    pub url: String,

    /// `[minLon, minLat, maxLon, maxLat]`.
    pub bounds: Vec<f64>,

    /// Storage key, when the backend names it differently from the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl UploadResponse {
    pub fn geo_bounds(&self) -> satclass_core::Result<GeoBounds> {
        GeoBounds::from_backend(&self.bounds)
    }
}

// ---------------------------------------------------------------------------
// Predict
// ---------------------------------------------------------------------------

/// `metadata` block of a `/predict` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
}

/// Response of `POST /predict`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default)]
    pub result_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PredictMetadata>,
}

impl PredictResponse {
    /// A successful response pointing at `url`, with no metadata.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            result_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Attach `[minLon, minLat, maxLon, maxLat]` bounds.
    pub fn bounds(mut self, bounds: [f64; 4]) -> Self {
        self.metadata.get_or_insert_with(PredictMetadata::default).bounds = Some(bounds.to_vec());
        self
    }

    /// Turn the wire response into a result.
    ///
    /// Bounds come from `metadata.bounds` when present, otherwise from the
    /// envelope of the submitted ROI.
    pub fn into_result(self, roi: &RegionOfInterest) -> satclass_core::Result<ClassificationResult> {
        let result_url = self
            .result_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::classification_failed("response missing result_url"))?;

        let metadata = self.metadata.unwrap_or_default();
        let bounds = match metadata.bounds.as_deref() {
            Some(values) => GeoBounds::from_backend(values)
                .map_err(|e| Error::classification_failed(format!("malformed result bounds: {e}")))?,
            None => roi
                .envelope()
                .ok_or_else(|| Error::classification_failed("no bounds for result"))?,
        };

        Ok(ClassificationResult {
            result_url,
            bounds,
            metadata: ResultMetadata {
                crs: metadata.crs,
                width: metadata.width,
                height: metadata.height,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body. FastAPI sends `detail` as a string, or as a list of
/// validation errors for malformed forms.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Extract a displayable detail from a raw error body.
    pub fn detail_from(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail? {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            serde_json::Value::Array(items) => {
                let msgs: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg").and_then(|m| m.as_str()) {
                        Some(msg) => msg.to_string(),
                        None => item.to_string(),
                    })
                    .collect();
                Some(msgs.join("; "))
            }
            other => Some(other.to_string()),
        }
    }
}
