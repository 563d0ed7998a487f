//! Google Gemini REST client
//!
//! Implements [`GenAiApi`] over the public `generativelanguage` endpoints:
//! `models/{model}:generateContent` for text, `models/{model}:predictLongRunning`
//! for video, `{operation}` for status, and the returned retrieval URI for
//! the finished video.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    classify_failure, FetchedMedia, GenAiApi, GenerateContentRequest, GenerateContentResponse,
    GenerateVideosRequest, VideoOperation, DEFAULT_BASE_URL,
};
use crate::core::credentials::Credential;
use crate::core::{CoreError, CoreResult};

/// Default request timeout; inline video uploads can be large
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Maximum allowed download size (2 GB)
const MAX_DOWNLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Google Gemini API client
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Creates a client against the default endpoint
    pub fn new() -> CoreResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom per-request timeout
    pub fn with_timeout(timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Sets a custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn generate_content_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    fn generate_videos_url(&self, model: &str) -> String {
        format!("{}/models/{}:predictLongRunning", self.base_url, model)
    }

    fn operation_url(&self, operation_name: &str) -> String {
        format!(
            "{}/{}",
            self.base_url,
            operation_name.trim_start_matches('/')
        )
    }

    /// Builds the authenticated download URL for a retrieval location.
    ///
    /// The key travels as the `key` query parameter; only http(s) is allowed.
    fn download_url(uri: &str, credential: &Credential) -> CoreResult<reqwest::Url> {
        let mut parsed = reqwest::Url::parse(uri).map_err(|e| {
            CoreError::Generation(format!("Invalid video location '{}': {}", uri, e))
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(CoreError::Generation(format!(
                    "Unsupported video location scheme '{}'",
                    scheme
                )))
            }
        }

        parsed
            .query_pairs_mut()
            .append_pair("key", credential.expose());
        Ok(parsed)
    }

    /// Maps a non-success response body to the error taxonomy
    fn parse_api_error(status: StatusCode, body: &str) -> CoreError {
        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => classify_failure(
                status.as_u16(),
                err.error.status.as_deref(),
                &err.error.message,
            ),
            Err(_) => {
                let truncated: String = body.chars().take(500).collect();
                classify_failure(status.as_u16(), None, &truncated)
            }
        }
    }

    /// Sends a request and decodes a JSON body, mapping failures
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> CoreResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| CoreError::Upstream(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Upstream(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_api_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| CoreError::Upstream(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl GenAiApi for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_content(
        &self,
        credential: &Credential,
        model: &str,
        request: &GenerateContentRequest,
    ) -> CoreResult<GenerateContentResponse> {
        // API key goes in a header so it never shows up in logged URLs.
        let builder = self
            .client
            .post(self.generate_content_url(model))
            .header("x-goog-api-key", credential.expose())
            .json(request);

        debug!("Gemini generateContent: model={}", model);
        self.send_json(builder).await
    }

    async fn generate_videos(
        &self,
        credential: &Credential,
        model: &str,
        request: &GenerateVideosRequest,
    ) -> CoreResult<VideoOperation> {
        let builder = self
            .client
            .post(self.generate_videos_url(model))
            .header("x-goog-api-key", credential.expose())
            .json(request);

        let operation: VideoOperation = self.send_json(builder).await?;
        info!("Gemini video generation submitted: operation={}", operation.name);
        Ok(operation)
    }

    async fn get_operation(
        &self,
        credential: &Credential,
        operation: &VideoOperation,
    ) -> CoreResult<VideoOperation> {
        let builder = self
            .client
            .get(self.operation_url(&operation.name))
            .header("x-goog-api-key", credential.expose());

        self.send_json(builder).await
    }

    async fn fetch_media(&self, credential: &Credential, uri: &str) -> CoreResult<FetchedMedia> {
        let url = Self::download_url(uri, credential)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Upstream(format!("Download failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_api_error(status, &body));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_DOWNLOAD_BYTES {
                return Err(CoreError::Upstream(format!(
                    "Generated video is too large ({} bytes > {} bytes limit)",
                    len, MAX_DOWNLOAD_BYTES
                )));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::Upstream(format!("Failed to read video: {}", e.without_url())))?;

        info!("Downloaded generated video ({} bytes)", bytes.len());

        Ok(FetchedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
