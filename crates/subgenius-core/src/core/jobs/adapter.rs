//! Job Adapter
//!
//! Maps the three user-facing operations onto the generation API:
//! subtitle transcription and image analysis are single request/response
//! calls; video generation is submit, poll, then fetch.
//!
//! All three share one failure path. A rejected credential is cleared from
//! the store before the error is returned, and nothing is retried.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::polling::{PollPolicy, PollingDriver};
use crate::core::ai::{
    Content, GenAiApi, GenerateContentRequest, GenerateVideosRequest, GenerationConfig, Part,
    VideoInstance, VideoParameters,
};
use crate::core::credentials::{Credential, CredentialStore};
use crate::core::media::MediaPayload;
use crate::core::settings::AppSettings;
use crate::core::{
    BinaryResult, CoreError, CoreResult, ExtractionMode, GenerationRequest, TextResult,
};

/// Media type assumed when the download does not declare one
pub const DEFAULT_VIDEO_MEDIA_TYPE: &str = "video/mp4";

/// Instruction used when the caller has no specific question about an image
pub const DEFAULT_ANALYSIS_PROMPT: &str =
    "Analyze this image in detail and describe what you see.";

/// Number of videos requested per generation
const VIDEO_SAMPLE_COUNT: u32 = 1;

// =============================================================================
// Configuration
// =============================================================================

/// Models and decoding options used by the adapter
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    pub transcription_model: String,
    pub analysis_model: String,
    pub video_model: String,
    pub transcription_temperature: f32,
    pub video_resolution: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for AdapterConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            transcription_model: settings.ai.transcription_model.clone(),
            analysis_model: settings.ai.analysis_model.clone(),
            video_model: settings.ai.video_model.clone(),
            transcription_temperature: settings.ai.transcription_temperature,
            video_resolution: settings.ai.video_resolution.clone(),
        }
    }
}

impl From<&AppSettings> for PollPolicy {
    fn from(settings: &AppSettings) -> Self {
        PollPolicy::default()
            .with_interval(settings.polling.interval())
            .with_max_attempts(settings.polling.max_attempts())
            .with_max_wait(settings.polling.max_wait())
    }
}

// =============================================================================
// Prompts
// =============================================================================

/// System instruction for subtitle extraction
fn subtitler_instruction(mode: ExtractionMode) -> String {
    format!(
        "You are an expert subtitler. Extract {} from the provided video and output ONLY valid SRT format.\n\
         Do not include any other text, markdown formatting, or explanations.\n\
         Format Rules:\n\
         1. Index number\n\
         2. StartTime --> EndTime (HH:MM:SS,mmm)\n\
         3. Subtitle text\n\
         4. Blank line\n\
         Language: Maintain the original language. If multi-lingual, transcribe as is.",
        mode.subject()
    )
}

/// User turn text for subtitle extraction
fn subtitler_request(mode: ExtractionMode) -> String {
    format!(
        "Extract all subtitles and output in SRT format. Focus on {}.",
        mode.focus()
    )
}

// =============================================================================
// Adapter
// =============================================================================

/// Runs transcription, analysis and video generation against a [`GenAiApi`]
pub struct JobAdapter {
    api: Arc<dyn GenAiApi>,
    credentials: Arc<dyn CredentialStore>,
    config: AdapterConfig,
    poll_policy: PollPolicy,
}

impl JobAdapter {
    pub fn new(
        api: Arc<dyn GenAiApi>,
        credentials: Arc<dyn CredentialStore>,
        config: AdapterConfig,
        poll_policy: PollPolicy,
    ) -> Self {
        Self {
            api,
            credentials,
            config,
            poll_policy,
        }
    }

    /// Builds an adapter whose models and polling bounds come from settings
    pub fn from_settings(
        api: Arc<dyn GenAiApi>,
        credentials: Arc<dyn CredentialStore>,
        settings: &AppSettings,
    ) -> Self {
        Self::new(
            api,
            credentials,
            AdapterConfig::from(settings),
            PollPolicy::from(settings),
        )
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll_policy
    }

    /// Replaces the polling policy
    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Extracts subtitles from a video as SRT text, returned verbatim
    pub async fn transcribe(
        &self,
        payload: &MediaPayload,
        mode: ExtractionMode,
    ) -> CoreResult<TextResult> {
        let credential = self.require_credential().await?;

        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::media(payload),
                Part::text(subtitler_request(mode)),
            ])],
            system_instruction: Some(Content::instruction(subtitler_instruction(mode))),
            generation_config: Some(GenerationConfig {
                temperature: Some(self.config.transcription_temperature),
            }),
        };

        info!(
            "Transcribing {} media (mode={}, model={})",
            payload.content_type, mode, self.config.transcription_model
        );

        let result = async {
            self.api
                .generate_content(&credential, &self.config.transcription_model, &request)
                .await?
                .into_text()
        }
        .await;

        self.settle(result).await.map(|text| TextResult { text })
    }

    /// Answers a free-text instruction about an image
    pub async fn analyze(&self, payload: &MediaPayload, instruction: &str) -> CoreResult<TextResult> {
        let credential = self.require_credential().await?;

        if instruction.trim().is_empty() {
            return Err(CoreError::Validation(
                "Analysis instruction cannot be empty".to_string(),
            ));
        }

        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                Part::media(payload),
                Part::text(instruction),
            ])],
            system_instruction: None,
            generation_config: None,
        };

        info!(
            "Analyzing {} image (model={})",
            payload.content_type, self.config.analysis_model
        );

        let result = async {
            self.api
                .generate_content(&credential, &self.config.analysis_model, &request)
                .await?
                .into_text()
        }
        .await;

        self.settle(result).await.map(|text| TextResult { text })
    }

    /// Generates a video and waits for it without external cancellation
    pub async fn generate_video(&self, request: &GenerationRequest) -> CoreResult<BinaryResult> {
        self.generate_video_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Generates a video: submit, poll until terminal, then download.
    ///
    /// Cancelling `cancel` stops polling with [`CoreError::Cancelled`].
    pub async fn generate_video_with_cancel(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> CoreResult<BinaryResult> {
        let credential = self.require_credential().await?;
        request.validate()?;

        let body = GenerateVideosRequest {
            instances: vec![VideoInstance {
                prompt: request.prompt_text.trim().to_string(),
            }],
            parameters: VideoParameters {
                aspect_ratio: request.aspect_ratio.as_str().to_string(),
                resolution: self.config.video_resolution.clone(),
                sample_count: VIDEO_SAMPLE_COUNT,
            },
        };

        let result = self.run_video_job(&credential, &body, cancel).await;
        self.settle(result).await
    }

    async fn run_video_job(
        &self,
        credential: &Credential,
        body: &GenerateVideosRequest,
        cancel: &CancellationToken,
    ) -> CoreResult<BinaryResult> {
        let handle = self
            .api
            .generate_videos(credential, &self.config.video_model, body)
            .await?;

        info!(
            "Video job submitted: operation={}, aspect_ratio={}",
            handle.name, body.parameters.aspect_ratio
        );

        let driver = PollingDriver::new(self.poll_policy, cancel.clone());
        let outcome = driver
            .run(handle, |operation| {
                let api = Arc::clone(&self.api);
                let credential = credential.clone();
                async move { api.get_operation(&credential, &operation).await }
            })
            .await?;

        let uri = outcome
            .operation
            .video_uri()
            .ok_or_else(|| CoreError::Generation("no output produced".to_string()))?;

        info!(
            "Video job {} finished after {} waits, downloading",
            outcome.operation.name, outcome.waits
        );

        let media = self.api.fetch_media(credential, uri).await?;

        Ok(BinaryResult {
            bytes: media.bytes,
            media_type: media
                .content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VIDEO_MEDIA_TYPE.to_string()),
        })
    }

    // =========================================================================
    // Credential Handling
    // =========================================================================

    async fn require_credential(&self) -> CoreResult<Credential> {
        self.credentials
            .get()
            .await
            .ok_or(CoreError::MissingCredential)
    }

    /// Single exit path for every operation's outcome.
    ///
    /// An authentication failure clears the stored credential so the next
    /// request observes "no credential" instead of reusing a rejected one.
    /// If the clear itself fails the caller gets
    /// [`CoreError::AuthKeyRetained`], since the rejected key is still stored.
    async fn settle<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        match result {
            Err(CoreError::Auth(reason)) => {
                warn!("API key rejected by {}; clearing stored key", self.api.name());
                match self.credentials.clear().await {
                    Ok(()) => Err(CoreError::Auth(reason)),
                    Err(source) => {
                        warn!("Failed to clear rejected API key: {}", source);
                        Err(CoreError::AuthKeyRetained { reason, source })
                    }
                }
            }
            other => other,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
