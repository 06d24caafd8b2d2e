//! Region-of-interest capture.
//!
//! [`RoiCapture`] keeps at most one logical ROI. A completed drawing replaces
//! whatever was there before; with nothing drawn, the ROI is the full extent
//! of the selected raster. Geometries are always stored closed.

use geo_types::{Coord, LineString, Polygon};
use geojson::{Feature, GeoJson, Geometry, JsonObject};
use tracing::debug;

use crate::bounds::{GeoBounds, LatLng};
use crate::error::{Error, Result};

/// Where the current ROI came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiOrigin {
    /// Drawn (or edited) by the user.
    Drawn,
    /// Synthesized from the raster's full bounds.
    FullBounds,
}

/// A polygonal region of interest in `(lon, lat)` coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionOfInterest {
    polygon: Polygon<f64>,
    origin: RoiOrigin,
}

impl RegionOfInterest {
    /// Build from an exterior ring of `(lon, lat)` positions.
    ///
    /// The ring is closed if the caller left it open. At least three distinct
    /// positions are required.
    pub fn from_ring(ring: Vec<(f64, f64)>) -> Result<Self> {
        let exterior = validated_ring(ring)?;
        Ok(Self {
            polygon: Polygon::new(exterior, Vec::new()),
            origin: RoiOrigin::Drawn,
        })
    }

    /// The rectangle covering `bounds`, as a closed 5-point ring.
    pub fn from_bounds(bounds: &GeoBounds) -> Self {
        let exterior: LineString<f64> = bounds.ring().to_vec().into();
        Self {
            polygon: Polygon::new(exterior, Vec::new()),
            origin: RoiOrigin::FullBounds,
        }
    }

    /// Parse a GeoJSON Feature, Geometry or FeatureCollection.
    ///
    /// A FeatureCollection collapses to its last polygonal feature.
    pub fn from_geojson(text: &str) -> Result<Self> {
        let geojson = text
            .parse::<GeoJson>()
            .map_err(|e| Error::InvalidGeometry(format!("not valid GeoJSON: {e}")))?;
        Self::from_geojson_object(&geojson)
    }

    pub fn from_geojson_object(geojson: &GeoJson) -> Result<Self> {
        match geojson {
            GeoJson::FeatureCollection(fc) => fc
                .features
                .iter()
                .rev()
                .find_map(|f| Self::from_feature(f).ok())
                .ok_or_else(|| Error::InvalidGeometry("no polygon feature in collection".into())),
            GeoJson::Feature(feature) => Self::from_feature(feature),
            GeoJson::Geometry(geometry) => Self::from_geometry(geometry),
        }
    }

    fn from_feature(feature: &Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| Error::InvalidGeometry("feature has no geometry".into()))?;
        Self::from_geometry(geometry)
    }

    /// Convert a Polygon geometry. Positions beyond `(lon, lat)` are ignored.
    pub fn from_geometry(geometry: &Geometry) -> Result<Self> {
        if let geojson::Value::Polygon(rings) = &geometry.value {
            if rings.iter().flatten().any(|p| p.len() < 2) {
                return Err(Error::InvalidGeometry("position with fewer than 2 values".into()));
            }
        }
        let polygon = Polygon::<f64>::try_from(&geometry.value)
            .map_err(|e| Error::InvalidGeometry(e.to_string()))?;

        let (exterior, interiors) = polygon.into_inner();
        let exterior = validated_ring(ring_positions(&exterior))?;
        let interiors = interiors
            .iter()
            .map(|ring| validated_ring(ring_positions(ring)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            polygon: Polygon::new(exterior, interiors),
            origin: RoiOrigin::Drawn,
        })
    }

    pub fn origin(&self) -> RoiOrigin {
        self.origin
    }

    /// Exterior ring as `(lon, lat)` pairs, first position repeated last.
    pub fn exterior(&self) -> Vec<(f64, f64)> {
        self.polygon.exterior().coords().map(|c| (c.x, c.y)).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.polygon.exterior().is_closed()
            && self.polygon.interiors().iter().all(LineString::is_closed)
    }

    /// Bounding box of the exterior ring.
    pub fn envelope(&self) -> Option<GeoBounds> {
        GeoBounds::envelope(self.polygon.exterior().coords().map(|c| (c.x, c.y)))
    }

    /// GeoJSON Polygon geometry.
    pub fn to_geometry(&self) -> Geometry {
        Geometry::new(geojson::Value::from(&self.polygon))
    }

    /// GeoJSON Feature wrapping this polygon, with empty properties.
    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(self.to_geometry()),
            id: None,
            properties: Some(JsonObject::new()),
            foreign_members: None,
        }
    }

    /// Stringified GeoJSON Feature, as sent in the `roi` form field.
    pub fn to_geojson_string(&self) -> String {
        GeoJson::Feature(self.to_feature()).to_string()
    }
}

fn ring_positions(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    ring.coords().map(|c| (c.x, c.y)).collect()
}

/// Close the ring and check it can bound a region: finite positions, at
/// least three of them distinct, and a non-zero enclosed area.
fn validated_ring(mut ring: Vec<(f64, f64)>) -> Result<LineString<f64>> {
    if ring.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(Error::InvalidGeometry("non-finite coordinate".into()));
    }
    let mut distinct: Vec<(f64, f64)> = Vec::with_capacity(3);
    for p in &ring {
        if !distinct.contains(p) {
            distinct.push(*p);
            if distinct.len() == 3 {
                break;
            }
        }
    }
    if distinct.len() < 3 {
        return Err(Error::InvalidGeometry(format!(
            "ring needs at least 3 distinct positions, got {}",
            distinct.len()
        )));
    }
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    if shoelace_area(&ring) == 0.0 {
        return Err(Error::InvalidGeometry("ring encloses no area".into()));
    }
    Ok(ring.into_iter().map(|(x, y)| Coord { x, y }).collect())
}

/// Twice the signed area of a closed ring.
fn shoelace_area(ring: &[(f64, f64)]) -> f64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

/// A completed shape from the drawing tool, independent of the drawing library.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawnShape {
    /// Vertices in map order (`lat`, `lon`), open or closed.
    Polygon(Vec<LatLng>),
    /// An axis-aligned rectangle.
    Rectangle(GeoBounds),
    /// Raw GeoJSON text (Feature, Geometry or FeatureCollection).
    GeoJson(String),
}

impl DrawnShape {
    fn into_roi(self) -> Result<RegionOfInterest> {
        match self {
            DrawnShape::Polygon(vertices) => {
                RegionOfInterest::from_ring(vertices.into_iter().map(|v| (v.lon, v.lat)).collect())
            }
            DrawnShape::Rectangle(bounds) => {
                if !bounds.has_area() {
                    return Err(Error::InvalidGeometry("rectangle has no area".into()));
                }
                Ok(RegionOfInterest {
                    origin: RoiOrigin::Drawn,
                    ..RegionOfInterest::from_bounds(&bounds)
                })
            }
            DrawnShape::GeoJson(text) => RegionOfInterest::from_geojson(&text),
        }
    }
}

/// Tracks the single current ROI.
#[derive(Debug, Clone, Default)]
pub struct RoiCapture {
    drawn: Option<RegionOfInterest>,
    bounds: Option<GeoBounds>,
}

impl RoiCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over for a newly selected raster: forget the drawing, adopt its bounds.
    pub fn reset(&mut self, bounds: Option<GeoBounds>) {
        self.drawn = None;
        self.bounds = bounds;
    }

    /// A shape was completed. Replaces any previously drawn shape.
    ///
    /// On invalid geometry the previous ROI is kept.
    pub fn on_draw_complete(&mut self, shape: DrawnShape) -> Result<&RegionOfInterest> {
        let roi = shape.into_roi()?;
        debug!(points = roi.exterior().len(), "ROI drawn");
        Ok(&*self.drawn.insert(roi))
    }

    /// An existing shape was edited. Same semantics as completion.
    pub fn on_draw_edited(&mut self, shape: DrawnShape) -> Result<&RegionOfInterest> {
        self.on_draw_complete(shape)
    }

    /// Forget the drawn shape, falling back to the full-bounds ROI.
    pub fn clear_drawn(&mut self) {
        self.drawn = None;
    }

    pub fn is_drawn(&self) -> bool {
        self.drawn.is_some()
    }

    /// The drawn shape, or else the full-bounds rectangle.
    ///
    /// `None` only when nothing was drawn and no bounds with a positive
    /// area are known.
    pub fn current_roi(&self) -> Option<RegionOfInterest> {
        self.drawn.clone().or_else(|| {
            self.bounds
                .as_ref()
                .filter(|b| b.has_area())
                .map(RegionOfInterest::from_bounds)
        })
    }
}
