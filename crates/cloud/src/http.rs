//! HTTP client wrapper for multipart form submissions.

use std::time::Duration;

use reqwest::multipart::Form;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api_models::ErrorBody;
use crate::error::{CloudError, Result};

/// HTTP client bound to one backend base URL.
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for an endpoint path such as `"/predict"`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a multipart form and decode the JSON response.
    ///
    /// Multipart bodies are streamed once, so there is no retry here.
    pub async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let url = self.endpoint(path);
        debug!(%url, "POST multipart");

        let resp = self.client.post(&url).multipart(form).send().await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(CloudError::Status {
                status: status.as_u16(),
                detail: ErrorBody::detail_from(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            CloudError::Decode(format!(
                "{e} in response from {url}: {}",
                body.chars().take(300).collect::<String>()
            ))
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
