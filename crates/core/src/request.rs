//! Classification requests and results.

use serde::{Deserialize, Serialize};

use crate::bounds::GeoBounds;
use crate::error::{Error, Result};
use crate::model::ModelName;
use crate::raster::{RasterReference, SelectedRaster};
use crate::roi::RegionOfInterest;

/// One submission to the classification service.
///
/// Only constructible through [`ClassificationRequest::build`], which
/// refuses to produce a request without a raster or without a region.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    model: ModelName,
    roi: RegionOfInterest,
    raster: RasterReference,
}

impl ClassificationRequest {
    /// Validate inputs and assemble a request.
    ///
    /// A missing `roi` falls back to the full bounds of the selected raster.
    pub fn build(
        model: ModelName,
        roi: Option<RegionOfInterest>,
        raster: Option<&SelectedRaster>,
    ) -> Result<Self> {
        let raster = raster.ok_or_else(|| {
            Error::Validation("no raster selected: upload a GeoTIFF or enter its URL".into())
        })?;
        let roi = match roi {
            Some(roi) => roi,
            None => raster
                .bounds
                .as_ref()
                .filter(|b| b.has_area())
                .map(RegionOfInterest::from_bounds)
                .ok_or_else(|| {
                    Error::Validation(
                        "no region of interest: draw one on the map (raster bounds are unknown)"
                            .into(),
                    )
                })?,
        };
        Ok(Self {
            model,
            roi,
            raster: raster.reference.clone(),
        })
    }

    pub fn model(&self) -> ModelName {
        self.model
    }

    pub fn roi(&self) -> &RegionOfInterest {
        &self.roi
    }

    pub fn raster(&self) -> &RasterReference {
        &self.raster
    }

    /// Multipart form fields for `POST /predict`, in submission order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("model_name", self.model.as_str().to_string()),
            ("roi", self.roi.to_geojson_string()),
            (self.raster.form_field(), self.raster.value().to_string()),
        ]
    }
}

/// Extra metadata the service may attach to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub crs: Option<String>,
    pub width: Option<u64>,
    pub height: Option<u64>,
}

/// A classified raster ready to be overlaid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub result_url: String,
    pub bounds: GeoBounds,
    #[serde(default)]
    pub metadata: ResultMetadata,
}
