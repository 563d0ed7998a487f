//! External API seam
//!
//! [`GenAiApi`] is the one boundary between the job adapter and the hosted
//! multimodal service. The production implementation is
//! [`GeminiClient`]; tests drive the adapter through [`mock::MockGenAiApi`].

#[cfg(feature = "ai-providers")]
mod gemini;
pub mod mock;
mod models;

#[cfg(feature = "ai-providers")]
pub use gemini::GeminiClient;
pub use models::*;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::credentials::Credential;
use crate::core::{CoreError, CoreResult};

/// Default REST endpoint of the hosted service
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Operations offered by the hosted generation service.
///
/// Every call carries the credential explicitly; implementations never
/// look it up themselves.
#[async_trait]
pub trait GenAiApi: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Synchronous content generation over mixed text/media input
    async fn generate_content(
        &self,
        credential: &Credential,
        model: &str,
        request: &GenerateContentRequest,
    ) -> CoreResult<GenerateContentResponse>;

    /// Starts a long-running video generation and returns its handle
    async fn generate_videos(
        &self,
        credential: &Credential,
        model: &str,
        request: &GenerateVideosRequest,
    ) -> CoreResult<VideoOperation>;

    /// Re-queries an operation, returning the updated handle
    async fn get_operation(
        &self,
        credential: &Credential,
        operation: &VideoOperation,
    ) -> CoreResult<VideoOperation>;

    /// Downloads a completed video from its retrieval location
    async fn fetch_media(&self, credential: &Credential, uri: &str) -> CoreResult<FetchedMedia>;
}

// =============================================================================
// Failure Classification
// =============================================================================

/// Status strings the service uses for credential problems
const AUTH_STATUSES: &[&str] = &["UNAUTHENTICATED", "PERMISSION_DENIED"];

/// Message fragments that indicate a rejected credential
const AUTH_MESSAGE_SIGNALS: &[&str] = &["API key", "API_KEY_INVALID"];

/// 401 or 403 standing alone, not inside a longer number or token
static RE_AUTH_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b40[13]\b").expect("valid auth code regex"));

/// Whether an error message carries an authentication-failure signal
pub fn is_auth_signal(message: &str) -> bool {
    AUTH_MESSAGE_SIGNALS.iter().any(|s| message.contains(s)) || RE_AUTH_CODE.is_match(message)
}

/// Maps a failed API response to the error taxonomy.
///
/// Credential rejections become [`CoreError::Auth`]; everything else is
/// [`CoreError::Upstream`] carrying the service's message.
pub fn classify_failure(http_status: u16, api_status: Option<&str>, message: &str) -> CoreError {
    let status_label = api_status.unwrap_or("unknown");
    let detail = format!(
        "API error ({}; status={}): {}",
        http_status, status_label, message
    );

    let auth_status = matches!(http_status, 401 | 403)
        || api_status.is_some_and(|s| AUTH_STATUSES.contains(&s));

    if auth_status || is_auth_signal(message) {
        CoreError::Auth(detail)
    } else {
        CoreError::Upstream(detail)
    }
}
