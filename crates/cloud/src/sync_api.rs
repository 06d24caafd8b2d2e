//! Blocking (synchronous) API for native platforms.
//!
//! Wraps the async [`ClassificationSession`] with a Tokio runtime so callers
//! don't need to manage their own async runtime.

#[cfg(feature = "native")]
mod inner {
    use std::path::Path;
    use std::sync::Arc;

    use satclass_core::{
        DrawnShape, Error, GeoBounds, ImageOverlay, MapSurface, Result, SelectedRaster,
    };

    use crate::backend::Backend;
    use crate::session::{ClassificationSession, Outcome, SessionOptions, SubmitOutcome};

    /// Blocking wrapper around [`ClassificationSession`].
    ///
    /// Uses an internal single-threaded Tokio runtime.
    pub struct SessionBlocking<B: Backend + ?Sized, S: MapSurface> {
        rt: tokio::runtime::Runtime,
        inner: ClassificationSession<B, S>,
    }

    impl<B: Backend + ?Sized, S: MapSurface> SessionBlocking<B, S> {
        /// Start a blocking session on `surface`.
        pub fn new(backend: Arc<B>, surface: S, options: SessionOptions) -> Result<Self> {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::Validation(format!("cannot start runtime: {e}")))?;

            let inner = ClassificationSession::new(backend, surface, options)?;
            Ok(Self { rt, inner })
        }

        /// Upload a local GeoTIFF (blocking).
        pub fn select_file(&self, path: &Path) -> Result<Outcome<SelectedRaster>> {
            self.rt.block_on(self.inner.select_file(path))
        }

        pub fn select_url(&self, url: &str, bounds: Option<GeoBounds>) -> Result<Outcome<SelectedRaster>> {
            self.inner.select_url(url, bounds)
        }

        /// Report a completed shape (blocking when it triggers classification).
        pub fn draw_complete(&self, shape: DrawnShape) -> Result<Option<SubmitOutcome>> {
            self.rt.block_on(self.inner.draw_complete(shape))
        }

        /// Classify with the current model, ROI and raster (blocking).
        pub fn classify(&self) -> Result<SubmitOutcome> {
            self.rt.block_on(self.inner.classify())
        }

        pub fn active_overlay(&self) -> Option<ImageOverlay> {
            self.inner.active_overlay()
        }

        /// The wrapped async session.
        pub fn session(&self) -> &ClassificationSession<B, S> {
            &self.inner
        }
    }
}

#[cfg(feature = "native")]
pub use inner::*;

#[cfg(all(test, feature = "native"))]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use satclass_core::{ClassificationRequest, GeoBounds, HeadlessMap, OverlayKind};

    use super::SessionBlocking;
    use crate::api_models::{PredictResponse, UploadResponse};
    use crate::backend::Backend;
    use crate::error::{CloudError, Result};
    use crate::session::SessionOptions;

    struct FixedBackend;

    #[async_trait]
    impl Backend for FixedBackend {
        async fn upload(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<UploadResponse> {
            Err(CloudError::Timeout)
        }

        async fn predict(&self, _request: &ClassificationRequest) -> Result<PredictResponse> {
            Ok(PredictResponse::with_url("https://r.tif"))
        }
    }

    #[test]
    fn blocking_classify() {
        let map = HeadlessMap::new();
        let session =
            SessionBlocking::new(Arc::new(FixedBackend), map.clone(), SessionOptions::default()).unwrap();
        let bounds = GeoBounds::new(30.0, 10.0, 32.0, 12.0).unwrap();
        session.select_url("https://x/y.tif", Some(bounds)).unwrap();

        let result = session.classify().unwrap().applied().unwrap();
        assert_eq!(result.result_url, "https://r.tif");
        assert_eq!(session.active_overlay().unwrap().kind, OverlayKind::ClassificationResult);
        assert_eq!(map.layer_count(), 1);
        assert!(!session.session().in_progress());
    }
}
