//! Workflow tests for the classification session against a scripted backend.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use satclass_cloud::{
    Backend, ClassificationSession, CloudError, Outcome, PredictResponse, RasterSource,
    SessionOptions, UploadResponse,
};
use satclass_core::{
    ClassificationRequest, DrawnShape, Error, GeoBounds, HeadlessMap, LatLng, ModelName,
    OverlayKind, RasterReference, RegionOfInterest, RoiOrigin,
};

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

enum Reply {
    Now(satclass_cloud::Result<PredictResponse>),
    Later(oneshot::Receiver<satclass_cloud::Result<PredictResponse>>),
    Never,
}

#[derive(Default)]
struct MockBackend {
    replies: Mutex<VecDeque<Reply>>,
    upload_reply: Mutex<Option<satclass_cloud::Result<UploadResponse>>>,
    upload_gate: Mutex<Option<oneshot::Receiver<()>>>,
    requests: Mutex<Vec<ClassificationRequest>>,
    uploads: Mutex<Vec<(String, usize)>>,
}

impl MockBackend {
    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn reply_with(&self, resp: PredictResponse) {
        self.push(Reply::Now(Ok(resp)));
    }

    fn fail_with(&self, err: CloudError) {
        self.push(Reply::Now(Err(err)));
    }

    /// Queue a reply that arrives when the returned sender fires.
    fn deferred(&self) -> oneshot::Sender<satclass_cloud::Result<PredictResponse>> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Later(rx));
        tx
    }

    fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> satclass_cloud::Result<UploadResponse> {
        self.uploads.lock().unwrap().push((file_name.to_string(), bytes.len()));
        let gate = self.upload_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let reply = self.upload_reply.lock().unwrap().take();
        reply.expect("unexpected upload")
    }

    async fn predict(&self, request: &ClassificationRequest) -> satclass_cloud::Result<PredictResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Now(r)) => r,
            Some(Reply::Later(rx)) => rx.await.unwrap_or(Err(CloudError::Timeout)),
            Some(Reply::Never) => std::future::pending().await,
            None => panic!("unexpected predict call"),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bounds() -> GeoBounds {
    GeoBounds::new(30.0, 10.0, 32.0, 12.0).unwrap()
}

fn session_with(
    options: SessionOptions,
) -> (Arc<MockBackend>, HeadlessMap, ClassificationSession<MockBackend, HeadlessMap>) {
    let backend = Arc::new(MockBackend::default());
    let map = HeadlessMap::new();
    let session = ClassificationSession::new(Arc::clone(&backend), map.clone(), options).unwrap();
    (backend, map, session)
}

fn session() -> (Arc<MockBackend>, HeadlessMap, ClassificationSession<MockBackend, HeadlessMap>) {
    session_with(SessionOptions::default())
}

fn roi_field(request: &ClassificationRequest) -> RegionOfInterest {
    let fields = request.form_fields();
    let (_, text) = fields.iter().find(|(name, _)| *name == "roi").unwrap();
    RegionOfInterest::from_geojson(text).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn url_flow_without_drawing_shows_result() {
    let (backend, map, session) = session();
    session.set_model("Random Forest").unwrap();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    backend.reply_with(PredictResponse::with_url("https://r.tif"));

    let outcome = session.classify().await.unwrap();
    let result = outcome.applied().unwrap();
    assert_eq!(result.result_url, "https://r.tif");

    let overlay = session.active_overlay().unwrap();
    assert_eq!(overlay.url, "https://r.tif");
    assert_eq!(overlay.opacity, 0.7);
    assert_eq!(overlay.kind, OverlayKind::ClassificationResult);
    assert_eq!(map.overlays(), vec![overlay]);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let fields = requests[0].form_fields();
    assert!(fields.contains(&("model_name", "Random Forest".to_string())));
    assert!(fields.contains(&("tif_url", "https://x/y.tif".to_string())));
    assert!(!fields.iter().any(|(name, _)| *name == "input_tif_key"));

    let roi = roi_field(&requests[0]);
    assert!(roi.is_closed());
    assert_eq!(roi.exterior(), bounds().ring().to_vec());
}

#[tokio::test]
async fn submit_without_raster_makes_no_request() {
    let (backend, map, session) = session();

    let err = session.classify().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(session.last_error().is_some());

    let err = session
        .submit(ModelName::LightGBM, Some(RegionOfInterest::from_bounds(&bounds())), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(backend.requests().is_empty());
    assert_eq!(map.operation_counts(), (0, 0));
    assert!(!session.in_progress());
}

#[tokio::test]
async fn url_without_bounds_needs_a_drawing() {
    let (backend, _map, session) = session_with(SessionOptions {
        auto_classify: false,
        ..Default::default()
    });
    session.select_url("https://x/y.tif", None).unwrap();
    assert!(session.current_roi().is_none());

    let err = session.classify().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(backend.requests().is_empty());

    session
        .draw_complete(DrawnShape::Rectangle(GeoBounds::new(30.5, 10.5, 31.0, 11.0).unwrap()))
        .await
        .unwrap();
    backend.reply_with(PredictResponse::with_url("https://r.tif"));
    let result = session.classify().await.unwrap().applied().unwrap();
    assert_eq!(result.bounds, GeoBounds::new(30.5, 10.5, 31.0, 11.0).unwrap());
}

#[tokio::test]
async fn drawn_roi_is_sent_exactly_once() {
    let (backend, _map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    backend.reply_with(PredictResponse::with_url("https://r.tif").bounds([30.5, 10.5, 31.5, 11.5]));

    let shape = DrawnShape::Polygon(vec![
        LatLng::new(10.5, 30.5),
        LatLng::new(10.5, 31.5),
        LatLng::new(11.5, 31.5),
        LatLng::new(11.5, 30.5),
    ]);
    let outcome = session.draw_complete(shape).await.unwrap();
    assert!(matches!(outcome, Some(Outcome::Applied(_))));

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let sent = roi_field(&requests[0]);
    assert!(sent.is_closed());
    assert_eq!(&sent, &session.current_roi().unwrap());
    assert_eq!(sent.exterior().first(), Some(&(30.5, 10.5)));
}

#[tokio::test]
async fn drawing_without_raster_does_not_classify() {
    let (backend, _map, session) = session();
    let outcome = session
        .draw_complete(DrawnShape::Rectangle(bounds()))
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn invalid_drawing_is_rejected_locally() {
    let (backend, _map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    let err = session
        .draw_complete(DrawnShape::GeoJson(r#"{"type":"Point","coordinates":[31,11]}"#.into()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidGeometry(_)));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn invalid_model_is_rejected() {
    let (_backend, _map, session) = session();
    assert!(matches!(session.set_model("SVM"), Err(Error::InvalidModel(_))));
    assert_eq!(session.model(), ModelName::XGBoost);
}

#[tokio::test]
async fn clearing_drawing_sends_full_bounds() {
    let (backend, _map, session) = session_with(SessionOptions {
        auto_classify: false,
        ..Default::default()
    });
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    session
        .draw_complete(DrawnShape::Rectangle(GeoBounds::new(30.5, 10.5, 31.0, 11.0).unwrap()))
        .await
        .unwrap();
    assert_eq!(session.current_roi().unwrap().origin(), RoiOrigin::Drawn);

    session.clear_drawing();
    backend.reply_with(PredictResponse::with_url("https://r.tif"));
    session.classify().await.unwrap();

    let sent = roi_field(&backend.requests()[0]);
    assert_eq!(sent.exterior(), bounds().ring().to_vec());
    assert_eq!(session.current_roi().unwrap().origin(), RoiOrigin::FullBounds);
}

#[tokio::test]
async fn select_resolves_url_source() {
    let (backend, map, session) = session();
    let selected = session
        .select(RasterSource::Url {
            url: "https://x/y.tif".into(),
            bounds: Some(bounds()),
        })
        .await
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!(selected.reference, RasterReference::url("https://x/y.tif").unwrap());
    assert_eq!(map.overlays()[0].kind, OverlayKind::InputPreview);
    assert_eq!(backend.upload_count(), 0);

    let err = session
        .select(RasterSource::Url {
            url: "https://exa mple.com/a.tif".into(),
            bounds: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(session.selection().unwrap().reference.value(), "https://x/y.tif");
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn later_submission_wins_when_it_returns_first() {
    let (backend, map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    let reply_a = backend.deferred();
    let reply_b = backend.deferred();

    let (a, b, ()) = tokio::join!(session.classify(), session.classify(), async {
        tokio::task::yield_now().await;
        assert!(session.in_progress());
        reply_b.send(Ok(PredictResponse::with_url("https://b.tif"))).unwrap();
        tokio::task::yield_now().await;
        reply_a.send(Ok(PredictResponse::with_url("https://a.tif"))).unwrap();
    });

    assert!(a.unwrap().is_superseded());
    assert_eq!(b.unwrap().applied().unwrap().result_url, "https://b.tif");
    assert_eq!(session.active_overlay().unwrap().url, "https://b.tif");
    assert_eq!(session.last_result().unwrap().result_url, "https://b.tif");
    assert_eq!(map.layer_count(), 1);
    assert!(!session.in_progress());
}

#[tokio::test]
async fn later_submission_wins_when_it_returns_last() {
    let (backend, map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    let reply_a = backend.deferred();
    let reply_b = backend.deferred();

    let (a, b, ()) = tokio::join!(session.classify(), session.classify(), async {
        tokio::task::yield_now().await;
        reply_a.send(Ok(PredictResponse::with_url("https://a.tif"))).unwrap();
        tokio::task::yield_now().await;
        reply_b.send(Ok(PredictResponse::with_url("https://b.tif"))).unwrap();
    });

    assert!(a.unwrap().is_superseded());
    assert!(b.unwrap().applied().is_some());
    let urls: Vec<String> = map.overlays().into_iter().map(|o| o.url).collect();
    assert_eq!(urls, vec!["https://b.tif".to_string()]);
}

#[tokio::test]
async fn stale_failure_is_not_reported() {
    let (backend, _map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    let reply_a = backend.deferred();
    let reply_b = backend.deferred();

    let (a, b, ()) = tokio::join!(session.classify(), session.classify(), async {
        tokio::task::yield_now().await;
        reply_b.send(Ok(PredictResponse::with_url("https://b.tif"))).unwrap();
        reply_a
            .send(Err(CloudError::Status {
                status: 500,
                detail: Some("late failure".into()),
            }))
            .unwrap();
    });

    assert!(a.unwrap().is_superseded());
    assert!(b.is_ok());
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn new_raster_discards_pending_result() {
    let (backend, map, session) = session();
    session.select_url("https://x/old.tif", Some(bounds())).unwrap();
    let reply = backend.deferred();
    let other = GeoBounds::new(0.0, 0.0, 1.0, 1.0).unwrap();

    let (outcome, ()) = tokio::join!(session.classify(), async {
        tokio::task::yield_now().await;
        session.select_url("https://x/new.tif", Some(other)).unwrap();
        reply.send(Ok(PredictResponse::with_url("https://r.tif"))).unwrap();
    });

    assert!(outcome.unwrap().is_superseded());
    let overlay = session.active_overlay().unwrap();
    assert_eq!(overlay.url, "https://x/new.tif");
    assert_eq!(overlay.kind, OverlayKind::InputPreview);
    assert_eq!(map.layer_count(), 1);
    assert_eq!(session.current_roi().unwrap().envelope(), Some(other));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failure_leaves_overlay_untouched() {
    let (backend, map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    backend.reply_with(PredictResponse::with_url("https://first.tif").bounds([30.0, 10.0, 32.0, 12.0]));
    session.classify().await.unwrap();

    let before = session.active_overlay().unwrap();
    let map_before = map.overlays();
    let ops_before = map.operation_counts();

    backend.fail_with(CloudError::Status {
        status: 500,
        detail: Some("File not found in S3".into()),
    });
    let err = session.classify().await.unwrap_err();

    assert_eq!(
        err,
        Error::ClassificationFailed {
            reason: "File not found in S3".into()
        }
    );
    assert_eq!(session.active_overlay().unwrap(), before);
    assert_eq!(map.overlays(), map_before);
    assert_eq!(map.operation_counts(), ops_before);
    assert!(session.last_result().is_none());
    assert!(session.last_error().unwrap().contains("File not found in S3"));
    assert!(!session.in_progress());
}

#[tokio::test]
async fn malformed_response_is_a_failure() {
    let (backend, map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    let before = map.overlays();
    backend.reply_with(PredictResponse::default());

    let err = session.classify().await.unwrap_err();
    assert!(matches!(err, Error::ClassificationFailed { .. }));
    assert_eq!(map.overlays(), before);
}

#[tokio::test(start_paused = true)]
async fn slow_backend_times_out() {
    let (backend, _map, session) = session_with(SessionOptions {
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    });
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    backend.push(Reply::Never);

    let err = session.classify().await.unwrap_err();
    assert_eq!(
        err,
        Error::ClassificationFailed {
            reason: "timeout".into()
        }
    );
    assert!(!session.in_progress());
}

// ---------------------------------------------------------------------------
// Upload flow
// ---------------------------------------------------------------------------

fn temp_tif() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".tif").tempfile().unwrap();
    file.write_all(b"II*\0fake tiff").unwrap();
    file
}

#[tokio::test]
async fn upload_flow_replaces_preview_with_result() {
    let (backend, map, session) = session();
    *backend.upload_reply.lock().unwrap() = Some(Ok(UploadResponse {
        url: "https://u/preview.png".into(),
        bounds: vec![30.0, 10.0, 32.0, 12.0],
        key: None,
    }));
    let file = temp_tif();
    let name = file.path().file_name().unwrap().to_str().unwrap().to_string();

    let selected = session.select_file(file.path()).await.unwrap().applied().unwrap();
    assert_eq!(selected.reference, RasterReference::backend_key(name.clone()).unwrap());
    assert_eq!(backend.upload_count(), 1);

    let preview = session.active_overlay().unwrap();
    assert_eq!(preview.kind, OverlayKind::InputPreview);
    assert_eq!(preview.url, "https://u/preview.png");
    let view = map.view().unwrap();
    assert_eq!((view.south_west.lat, view.south_west.lon), (10.0, 30.0));
    assert_eq!((view.north_east.lat, view.north_east.lon), (12.0, 32.0));

    backend.reply_with(PredictResponse::with_url("https://r.tif"));
    session.classify().await.unwrap();

    let fields = backend.requests()[0].form_fields();
    assert!(fields.contains(&("input_tif_key", name)));
    assert!(!fields.iter().any(|(n, _)| *n == "tif_url"));

    let overlays = map.overlays();
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].kind, OverlayKind::ClassificationResult);
    assert_eq!(map.peak_layers(), 1);
}

#[tokio::test]
async fn failed_upload_keeps_previous_selection() {
    let (backend, _map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    *backend.upload_reply.lock().unwrap() = Some(Err(CloudError::Status {
        status: 422,
        detail: Some("unreadable raster".into()),
    }));
    let file = temp_tif();

    let err = session.select_file(file.path()).await.unwrap_err();
    assert_eq!(err, Error::BoundsUnavailable("unreadable raster".into()));
    assert!(session.last_error().unwrap().contains("unreadable raster"));
    assert_eq!(
        session.selection().unwrap().reference,
        RasterReference::url("https://x/y.tif").unwrap()
    );
    assert_eq!(session.active_overlay().unwrap().url, "https://x/y.tif");
}

#[tokio::test]
async fn upload_with_flat_extent_is_rejected() {
    let (backend, map, session) = session();
    *backend.upload_reply.lock().unwrap() = Some(Ok(UploadResponse {
        url: "https://u/preview.png".into(),
        bounds: vec![30.0, 10.0, 30.0, 12.0],
        key: None,
    }));
    let file = temp_tif();

    let err = session.select_file(file.path()).await.unwrap_err();
    assert!(matches!(err, Error::BoundsUnavailable(_)));
    assert!(session.selection().is_none());
    assert!(session.current_roi().is_none());
    assert_eq!(map.layer_count(), 0);

    assert!(session.classify().await.is_err());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn stale_upload_failure_is_not_reported() {
    let (backend, _map, session) = session();
    let (open_gate, gate) = oneshot::channel();
    *backend.upload_gate.lock().unwrap() = Some(gate);
    *backend.upload_reply.lock().unwrap() = Some(Err(CloudError::Status {
        status: 500,
        detail: Some("late upload failure".into()),
    }));
    let file = temp_tif();

    let (upload, ()) = tokio::join!(session.select_file(file.path()), async {
        tokio::task::yield_now().await;
        session.select_url("https://x/new.tif", Some(bounds())).unwrap();
        open_gate.send(()).unwrap();
    });

    assert!(upload.unwrap().is_superseded());
    assert!(session.last_error().is_none());
    assert_eq!(session.selection().unwrap().reference.value(), "https://x/new.tif");
    assert_eq!(session.active_overlay().unwrap().url, "https://x/new.tif");
}

#[tokio::test]
async fn non_tiff_is_rejected_before_upload() {
    let (backend, _map, session) = session();
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    let err = session.select_file(file.path()).await.unwrap_err();
    assert!(matches!(err, Error::BoundsUnavailable(_)));
    assert_eq!(backend.upload_count(), 0);
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropping_session_releases_overlay() {
    let (backend, map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    backend.reply_with(PredictResponse::with_url("https://r.tif"));
    session.classify().await.unwrap();
    assert_eq!(map.layer_count(), 1);

    drop(session);
    assert_eq!(map.layer_count(), 0);
}

#[tokio::test]
async fn teardown_clears_overlay() {
    let (_backend, map, session) = session();
    session.select_url("https://x/y.tif", Some(bounds())).unwrap();
    assert_eq!(map.layer_count(), 1);
    session.teardown();
    assert_eq!(map.layer_count(), 0);
    assert!(session.active_overlay().is_none());
}
