//! Classification session: the ROI-to-overlay workflow.
//!
//! A session ties together the raster selection, ROI capture, model
//! selection and the overlay manager, and runs classifications against a
//! [`Backend`].
//!
//! Overlapping submissions are allowed. Each one takes a sequence token when
//! it starts; when a response arrives it is applied only if no newer
//! submission (or raster selection) has started since. Late responses are
//! dropped and the call resolves to [`Outcome::Superseded`].
//!
//! All state sits behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use satclass_core::{
    ClassificationRequest, ClassificationResult, DrawnShape, Error, GeoBounds, ImageOverlay,
    MapSurface, ModelName, ModelSelection, OverlayKind, OverlayManager, RegionOfInterest, Result,
    RoiCapture, SelectedRaster, DEFAULT_OPACITY,
};

use crate::backend::Backend;
use crate::resolver::{reference_url, BoundsResolver, RasterSource};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`ClassificationSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Upper bound on one `/predict` round trip (default 120 s).
    pub request_timeout: Duration,
    /// Opacity of input and result overlays (default 0.7).
    pub overlay_opacity: f64,
    /// Classify as soon as a shape is drawn, if a raster is selected (default true).
    pub auto_classify: bool,
    /// Model selected when the session starts (default XGBoost).
    pub initial_model: ModelName,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            overlay_opacity: DEFAULT_OPACITY,
            auto_classify: true,
            initial_model: ModelName::default(),
        }
    }
}

/// How an asynchronous step ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The step was the latest of its kind and its result is now shown.
    Applied(T),
    /// A newer step started while this one was in flight; its result was dropped.
    Superseded,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }
}

/// Outcome of a classification submission.
pub type SubmitOutcome = Outcome<ClassificationResult>;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct SessionState<S: MapSurface> {
    selection: Option<SelectedRaster>,
    roi: RoiCapture,
    model: ModelSelection,
    overlay: OverlayManager<S>,
    /// Token of the most recently started classification.
    latest_submit: u64,
    /// Token of the most recently started raster selection.
    latest_selection: u64,
    last_result: Option<ClassificationResult>,
    last_error: Option<String>,
}

/// Marks a request in flight for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Drives raster selection, ROI capture and classification for one map.
///
/// The session owns the map surface through its [`OverlayManager`]; dropping
/// the session removes its overlay.
pub struct ClassificationSession<B: Backend + ?Sized, S: MapSurface> {
    backend: Arc<B>,
    resolver: BoundsResolver<B>,
    options: SessionOptions,
    state: Mutex<SessionState<S>>,
    in_flight: AtomicUsize,
}

impl<B: Backend + ?Sized, S: MapSurface> ClassificationSession<B, S> {
    /// Start a session on `surface`.
    pub fn new(backend: Arc<B>, surface: S, options: SessionOptions) -> Result<Self> {
        if !(0.0..=1.0).contains(&options.overlay_opacity) {
            return Err(Error::Validation(format!(
                "overlay opacity must be within [0, 1], got {}",
                options.overlay_opacity
            )));
        }
        if options.request_timeout.is_zero() {
            return Err(Error::Validation("request timeout must be positive".into()));
        }

        let state = SessionState {
            selection: None,
            roi: RoiCapture::new(),
            model: ModelSelection::new(options.initial_model),
            overlay: OverlayManager::new(surface),
            latest_submit: 0,
            latest_selection: 0,
            last_result: None,
            last_error: None,
        };

        Ok(Self {
            resolver: BoundsResolver::new(Arc::clone(&backend)),
            backend,
            options,
            state: Mutex::new(state),
            in_flight: AtomicUsize::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState<S>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Raster selection ───────────────────────────────────────────

    /// Resolve `source` and make it the active raster.
    ///
    /// If another selection starts while this one resolves, this one
    /// resolves to [`Outcome::Superseded`] whether it succeeded or not.
    pub async fn select(&self, source: RasterSource) -> Result<Outcome<SelectedRaster>> {
        let token = self.begin_selection();
        match self.resolver.resolve(source).await {
            Ok(selected) => self.apply_selection(token, selected),
            Err(e) => self.fail_selection(token, e),
        }
    }

    /// Upload a local GeoTIFF and make it the active raster.
    pub async fn select_file(&self, path: impl AsRef<Path>) -> Result<Outcome<SelectedRaster>> {
        self.select(RasterSource::File(path.as_ref().to_path_buf())).await
    }

    /// Make an externally hosted GeoTIFF the active raster. No network call is made.
    pub fn select_url(&self, url: &str, bounds: Option<GeoBounds>) -> Result<Outcome<SelectedRaster>> {
        let token = self.begin_selection();
        match reference_url(url, bounds) {
            Ok(selected) => self.apply_selection(token, selected),
            Err(e) => self.fail_selection(token, e),
        }
    }

    fn begin_selection(&self) -> u64 {
        let mut st = self.lock();
        st.latest_selection += 1;
        st.latest_selection
    }

    fn fail_selection(&self, token: u64, e: Error) -> Result<Outcome<SelectedRaster>> {
        let mut st = self.lock();
        if st.latest_selection != token {
            warn!(token, error = %e, "stale raster selection failed; ignored");
            return Ok(Outcome::Superseded);
        }
        warn!(error = %e, "raster selection failed");
        st.last_error = Some(e.to_string());
        Err(e)
    }

    fn apply_selection(&self, token: u64, selected: SelectedRaster) -> Result<Outcome<SelectedRaster>> {
        let mut st = self.lock();
        if st.latest_selection != token {
            debug!(raster = %selected.reference, "dropping superseded raster selection");
            return Ok(Outcome::Superseded);
        }

        // Any classification still in flight targets the old raster.
        st.latest_submit += 1;
        st.last_result = None;
        st.last_error = None;
        st.roi.reset(selected.bounds);

        match (selected.bounds, selected.preview_url.as_deref()) {
            (Some(bounds), Some(preview)) => {
                st.overlay.set_overlay(
                    preview,
                    bounds,
                    Some(self.options.overlay_opacity),
                    OverlayKind::InputPreview,
                )?;
                st.overlay.fit_bounds(&bounds);
            }
            (Some(bounds), None) => {
                st.overlay.clear();
                st.overlay.fit_bounds(&bounds);
            }
            (None, _) => st.overlay.clear(),
        }

        info!(raster = %selected.reference, bounds = ?selected.bounds, "raster selected");
        st.selection = Some(selected.clone());
        Ok(Outcome::Applied(selected))
    }

    // ── ROI and model ──────────────────────────────────────────────

    /// A shape was completed on the map.
    ///
    /// With `auto_classify` on and a raster selected, this immediately
    /// classifies the new ROI and returns the submission's outcome.
    pub async fn draw_complete(&self, shape: DrawnShape) -> Result<Option<SubmitOutcome>> {
        let trigger = {
            let mut st = self.lock();
            let drawn = st.roi.on_draw_complete(shape).map(|_| ());
            if let Err(e) = drawn {
                st.last_error = Some(e.to_string());
                return Err(e);
            }
            self.options.auto_classify && st.selection.is_some()
        };

        if trigger {
            self.classify().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Drop the drawn shape; the ROI reverts to the raster's full bounds.
    pub fn clear_drawing(&self) {
        self.lock().roi.clear_drawn();
    }

    pub fn set_model(&self, name: &str) -> Result<ModelName> {
        self.lock().model.set(name)
    }

    // ── Classification ─────────────────────────────────────────────

    /// Classify using the session's current model, ROI and raster.
    pub async fn classify(&self) -> Result<SubmitOutcome> {
        let (model, roi, selection) = {
            let st = self.lock();
            (st.model.get(), st.roi.current_roi(), st.selection.clone())
        };
        self.submit(model, roi, selection.as_ref()).await
    }

    /// Submit one classification.
    ///
    /// Preconditions are checked before any network call: a raster must be
    /// given, and either `roi` or the raster's bounds must be available.
    /// On failure the overlay is left exactly as it was.
    pub async fn submit(
        &self,
        model: ModelName,
        roi: Option<RegionOfInterest>,
        raster: Option<&SelectedRaster>,
    ) -> Result<SubmitOutcome> {
        let request = match ClassificationRequest::build(model, roi, raster) {
            Ok(request) => request,
            Err(e) => {
                self.record_error(&e);
                return Err(e);
            }
        };

        let token = {
            let mut st = self.lock();
            st.latest_submit += 1;
            st.last_result = None;
            st.last_error = None;
            st.latest_submit
        };

        let response = {
            let _busy = InFlight::enter(&self.in_flight);
            info!(token, model = %model, raster = %request.raster(), "classification started");
            tokio::time::timeout(self.options.request_timeout, self.backend.predict(&request)).await
        };

        let result = match response {
            Err(_) => Err(Error::classification_failed("timeout")),
            Ok(Err(e)) => Err(Error::classification_failed(e.reason())),
            Ok(Ok(resp)) => resp.into_result(request.roi()),
        };

        let mut st = self.lock();
        if st.latest_submit != token {
            match &result {
                Ok(r) => debug!(token, url = %r.result_url, "discarding stale classification result"),
                Err(e) => warn!(token, error = %e, "stale classification failed; ignored"),
            }
            return Ok(Outcome::Superseded);
        }

        match result {
            Ok(result) => {
                st.overlay.set_overlay(
                    result.result_url.clone(),
                    result.bounds,
                    Some(self.options.overlay_opacity),
                    OverlayKind::ClassificationResult,
                )?;
                info!(token, url = %result.result_url, "classification applied");
                st.last_result = Some(result.clone());
                Ok(Outcome::Applied(result))
            }
            Err(e) => {
                warn!(token, error = %e, "classification failed");
                st.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn record_error(&self, e: &Error) {
        warn!(error = %e, "request rejected");
        self.lock().last_error = Some(e.to_string());
    }

    // ── Observers ──────────────────────────────────────────────────

    /// Whether a classification round trip is currently running.
    pub fn in_progress(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn model(&self) -> ModelName {
        self.lock().model.get()
    }

    pub fn selection(&self) -> Option<SelectedRaster> {
        self.lock().selection.clone()
    }

    /// The ROI a classification would use right now.
    pub fn current_roi(&self) -> Option<RegionOfInterest> {
        self.lock().roi.current_roi()
    }

    pub fn active_overlay(&self) -> Option<ImageOverlay> {
        self.lock().overlay.active().cloned()
    }

    pub fn last_result(&self) -> Option<ClassificationResult> {
        self.lock().last_result.clone()
    }

    /// Message of the most recent failure, cleared when a new step starts.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Remove the overlay and forget pending results. Also happens on drop.
    pub fn teardown(&self) {
        let mut st = self.lock();
        st.latest_submit += 1;
        st.last_result = None;
        st.overlay.clear();
        debug!("session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_options() {
        let opts = SessionOptions::default();
        assert_eq!(opts.overlay_opacity, 0.7);
        assert_eq!(opts.request_timeout, Duration::from_secs(120));
        assert!(opts.auto_classify);
        assert_eq!(opts.initial_model, ModelName::XGBoost);
    }

    #[test]
    fn in_flight_guard_balances() {
        let counter = AtomicUsize::new(0);
        {
            let _a = InFlight::enter(&counter);
            let _b = InFlight::enter(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn outcome_helpers() {
        assert_eq!(Outcome::Applied(3).applied(), Some(3));
        assert!(Outcome::<u8>::Superseded.is_superseded());
        assert_eq!(Outcome::<u8>::Superseded.applied(), None);
    }
}
