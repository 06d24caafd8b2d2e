//! Image overlays on the map surface.
//!
//! [`OverlayManager`] is the only component allowed to add or remove image
//! overlays. It owns the map surface for the lifetime of a workflow and
//! removes its overlay when dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bounds::{GeoBounds, LatLngBounds};
use crate::error::{Error, Result};

/// Opacity applied when the caller does not specify one.
pub const DEFAULT_OPACITY: f64 = 0.7;

/// Default base tile layer (OpenStreetMap).
pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Handle for a layer added to a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u64);

/// What an overlay is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    InputPreview,
    ClassificationResult,
}

/// An image drawn over the map, stretched to a geographic rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    pub url: String,
    pub bounds: GeoBounds,
    /// Layer opacity [0.0, 1.0].
    pub opacity: f64,
    pub kind: OverlayKind,
}

/// The imperative primitives a map rendering surface offers.
pub trait MapSurface {
    /// Add an image overlay and return its layer handle.
    fn add_image_overlay(&mut self, overlay: &ImageOverlay) -> LayerId;

    /// Remove a previously added layer. Unknown ids are ignored.
    fn remove_layer(&mut self, id: LayerId);

    /// Move the view so that `bounds` is visible.
    fn fit_bounds(&mut self, bounds: LatLngBounds);
}

/// Owns the map surface and at most one overlay on it.
pub struct OverlayManager<S: MapSurface> {
    surface: S,
    active: Option<(LayerId, ImageOverlay)>,
}

impl<S: MapSurface> OverlayManager<S> {
    /// Take ownership of a map surface.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            active: None,
        }
    }

    /// Show `url` over `bounds`, replacing the current overlay if any.
    ///
    /// The previous layer is removed before the new one is added, so the
    /// surface never holds two overlays from this manager.
    pub fn set_overlay(
        &mut self,
        url: impl Into<String>,
        bounds: GeoBounds,
        opacity: Option<f64>,
        kind: OverlayKind,
    ) -> Result<&ImageOverlay> {
        let opacity = opacity.unwrap_or(DEFAULT_OPACITY);
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::Validation(format!(
                "opacity must be within [0, 1], got {opacity}"
            )));
        }
        let overlay = ImageOverlay {
            url: url.into(),
            bounds,
            opacity,
            kind,
        };

        self.clear();
        let id = self.surface.add_image_overlay(&overlay);
        debug!(layer = id.0, url = %overlay.url, ?kind, "overlay set");
        let (_, overlay) = self.active.insert((id, overlay));
        Ok(&*overlay)
    }

    /// Remove the current overlay, if any.
    pub fn clear(&mut self) {
        if let Some((id, _)) = self.active.take() {
            self.surface.remove_layer(id);
            debug!(layer = id.0, "overlay removed");
        }
    }

    pub fn fit_bounds(&mut self, bounds: &GeoBounds) {
        self.surface.fit_bounds(bounds.to_lat_lng_bounds());
    }

    /// The overlay currently shown.
    pub fn active(&self) -> Option<&ImageOverlay> {
        self.active.as_ref().map(|(_, overlay)| overlay)
    }
}

impl<S: MapSurface> Drop for OverlayManager<S> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_id: u64,
    layers: Vec<(LayerId, ImageOverlay)>,
    view: Option<LatLngBounds>,
    peak_layers: usize,
    adds: usize,
    removes: usize,
}

/// In-memory map surface for command-line use and tests.
///
/// Clones share the same state, so a caller can hand one clone to an
/// [`OverlayManager`] and inspect the map through another.
#[derive(Debug, Clone)]
pub struct HeadlessMap {
    tile_url: String,
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::with_tile_url(DEFAULT_TILE_URL)
    }

    pub fn with_tile_url(template: impl Into<String>) -> Self {
        Self {
            tile_url: template.into(),
            state: Arc::new(Mutex::new(HeadlessState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn tile_url(&self) -> &str {
        &self.tile_url
    }

    /// Image overlays currently on the map, oldest first.
    pub fn overlays(&self) -> Vec<ImageOverlay> {
        self.state().layers.iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn layer_count(&self) -> usize {
        self.state().layers.len()
    }

    /// Highest number of simultaneous overlays ever observed.
    pub fn peak_layers(&self) -> usize {
        self.state().peak_layers
    }

    /// Total `(adds, removes)` performed on this surface.
    pub fn operation_counts(&self) -> (usize, usize) {
        let state = self.state();
        (state.adds, state.removes)
    }

    pub fn view(&self) -> Option<LatLngBounds> {
        self.state().view
    }
}

impl Default for HeadlessMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MapSurface for HeadlessMap {
    fn add_image_overlay(&mut self, overlay: &ImageOverlay) -> LayerId {
        let mut state = self.state();
        state.next_id += 1;
        let id = LayerId(state.next_id);
        state.layers.push((id, overlay.clone()));
        state.adds += 1;
        state.peak_layers = state.peak_layers.max(state.layers.len());
        id
    }

    fn remove_layer(&mut self, id: LayerId) {
        let mut state = self.state();
        let before = state.layers.len();
        state.layers.retain(|(layer, _)| *layer != id);
        if state.layers.len() < before {
            state.removes += 1;
        }
    }

    fn fit_bounds(&mut self, bounds: LatLngBounds) {
        self.state().view = Some(bounds);
    }
}
