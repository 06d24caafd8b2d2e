//! The classification backend: trait seam and reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::info;

use satclass_core::ClassificationRequest;

use crate::api_models::{PredictResponse, UploadResponse};
use crate::error::Result;
use crate::http::HttpClient;

/// Default backend address (local FastAPI development server).
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Operations the remote upload/classification service offers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /upload`: store a GeoTIFF and report its URL and bounds.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse>;

    /// `POST /predict`: classify the request's ROI with its model.
    async fn predict(&self, request: &ClassificationRequest) -> Result<PredictResponse>;
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for [`HttpBackend`].
pub struct HttpBackendOptions {
    /// Backend root URL (default `http://localhost:8000`).
    pub base_url: String,
    /// Per-request timeout (default 120 s; classification can be slow).
    pub request_timeout: Duration,
}

impl Default for HttpBackendOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`Backend`] over HTTP multipart forms.
pub struct HttpBackend {
    http: HttpClient,
}

impl HttpBackend {
    pub fn new(options: HttpBackendOptions) -> Result<Self> {
        let http = HttpClient::new(&options.base_url, options.request_timeout)?;
        Ok(Self { http })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        info!(file = file_name, size = bytes.len(), "uploading raster");
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/tiff")?;
        let form = Form::new().part("file", part);
        self.http.post_form("/upload", form).await
    }

    async fn predict(&self, request: &ClassificationRequest) -> Result<PredictResponse> {
        info!(model = %request.model(), raster = %request.raster(), "requesting classification");
        let form = request
            .form_fields()
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        self.http.post_form("/predict", form).await
    }
}
