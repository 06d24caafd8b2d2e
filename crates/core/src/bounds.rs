//! Geographic bounding boxes and the map library's corner convention.
//!
//! The backend reports extents as `[minLon, minLat, maxLon, maxLat]`
//! (west, south, east, north). Map surfaces address rectangles by their
//! south-west and north-east corners, each given as `(lat, lon)`. Keeping the
//! two as distinct types makes swapping the axes a type error rather than a
//! misplaced overlay.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A geographic bounding box in (west, south, east, north) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    /// Create a bounding box, validating that the edges are finite and ordered.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(Error::BoundsUnavailable(format!(
                "non-finite bounds [{west}, {south}, {east}, {north}]"
            )));
        }
        if west > east || south > north {
            return Err(Error::BoundsUnavailable(format!(
                "inverted bounds [{west}, {south}, {east}, {north}]"
            )));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Build from the backend's `[minLon, minLat, maxLon, maxLat]` array.
    ///
    /// A raster extent must enclose a positive area.
    pub fn from_backend(values: &[f64]) -> Result<Self> {
        match values {
            [min_lon, min_lat, max_lon, max_lat] => {
                let bounds = Self::new(*min_lon, *min_lat, *max_lon, *max_lat)?;
                if !bounds.has_area() {
                    return Err(Error::BoundsUnavailable(format!(
                        "empty extent {values:?}"
                    )));
                }
                Ok(bounds)
            }
            other => Err(Error::BoundsUnavailable(format!(
                "expected 4 bound values, got {}",
                other.len()
            ))),
        }
    }

    /// Back to the backend's `[minLon, minLat, maxLon, maxLat]` ordering.
    pub fn to_backend(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Convert to the display library's south-west / north-east corners.
    pub fn to_lat_lng_bounds(&self) -> LatLngBounds {
        LatLngBounds {
            south_west: LatLng::new(self.south, self.west),
            north_east: LatLng::new(self.north, self.east),
        }
    }

    /// Whether the box encloses a positive area.
    pub fn has_area(&self) -> bool {
        self.east > self.west && self.north > self.south
    }

    /// Closed exterior ring as `(lon, lat)` pairs: SW, SE, NE, NW, SW.
    pub fn ring(&self) -> [(f64, f64); 5] {
        [
            (self.west, self.south),
            (self.east, self.south),
            (self.east, self.north),
            (self.west, self.north),
            (self.west, self.south),
        ]
    }

    /// Smallest box covering every `(lon, lat)` position, `None` if empty.
    pub fn envelope<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = positions.into_iter();
        let (x0, y0) = iter.next()?;
        let (mut west, mut south, mut east, mut north) = (x0, y0, x0, y0);
        for (x, y) in iter {
            west = west.min(x);
            east = east.max(x);
            south = south.min(y);
            north = north.max(y);
        }
        Self::new(west, south, east, north).ok()
    }
}

/// A `(lat, lon)` position as expected by map surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A map rectangle expressed by its south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    /// Inverse of [`GeoBounds::to_lat_lng_bounds`].
    pub fn to_geo_bounds(&self) -> Result<GeoBounds> {
        GeoBounds::new(
            self.south_west.lon,
            self.south_west.lat,
            self.north_east.lon,
            self.north_east.lat,
        )
    }
}

impl From<GeoBounds> for LatLngBounds {
    fn from(bounds: GeoBounds) -> Self {
        bounds.to_lat_lng_bounds()
    }
}
