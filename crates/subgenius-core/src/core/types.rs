//! Shared request and result types.

use serde::{Deserialize, Serialize};

use super::{CoreError, CoreResult};

/// Maximum prompt length accepted for video generation
pub const MAX_PROMPT_CHARS: usize = 4096;

// =============================================================================
// Extraction Mode
// =============================================================================

/// Which track of a video subtitles are extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Transcribe spoken dialogue
    #[default]
    AudioTranscription,
    /// Read hardcoded on-screen text
    VisualOcr,
}

impl ExtractionMode {
    /// What the subtitler is asked to extract
    pub fn subject(&self) -> &'static str {
        match self {
            ExtractionMode::AudioTranscription => "dialogue",
            ExtractionMode::VisualOcr => "hardcoded subtitles",
        }
    }

    /// What the model should focus on while extracting
    pub fn focus(&self) -> &'static str {
        match self {
            ExtractionMode::AudioTranscription => "spoken audio",
            ExtractionMode::VisualOcr => "on-screen text/hard subs",
        }
    }
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMode::AudioTranscription => write!(f, "audio"),
            ExtractionMode::VisualOcr => write!(f, "visual"),
        }
    }
}

impl std::str::FromStr for ExtractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" | "audio_transcription" | "dialogue" => Ok(ExtractionMode::AudioTranscription),
            "visual" | "visual_ocr" | "ocr" => Ok(ExtractionMode::VisualOcr),
            _ => Err(format!("Unknown extraction mode: {}", s)),
        }
    }
}

// =============================================================================
// Aspect Ratio
// =============================================================================

/// Output frame shape for generated video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 16:9 landscape
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    /// Value sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "16:9" | "landscape" => Ok(AspectRatio::Landscape),
            "9:16" | "portrait" => Ok(AspectRatio::Portrait),
            _ => Err(format!(
                "Invalid aspect ratio '{}'. Valid: 16:9, 9:16",
                s
            )),
        }
    }
}

// =============================================================================
// Generation Request
// =============================================================================

/// A text-to-video request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Text prompt describing the desired video
    pub prompt_text: String,
    /// Output aspect ratio
    pub aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    /// Creates a landscape request
    pub fn new(prompt_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            aspect_ratio: AspectRatio::default(),
        }
    }

    /// Sets the aspect ratio
    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Rejects blank or oversized prompts
    pub fn validate(&self) -> CoreResult<()> {
        let trimmed = self.prompt_text.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("Prompt cannot be empty".to_string()));
        }
        if trimmed.chars().count() > MAX_PROMPT_CHARS {
            return Err(CoreError::Validation(format!(
                "Prompt too long (max {} characters)",
                MAX_PROMPT_CHARS
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Result Artifacts
// =============================================================================

/// Text produced by transcription or analysis, verbatim from the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResult {
    pub text: String,
}

/// Binary media produced by video generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryResult {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl BinaryResult {
    /// File extension matching the media type
    pub fn extension(&self) -> &'static str {
        match self.media_type.as_str() {
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            _ => "mp4",
        }
    }
}

/// Result of one completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultArtifact {
    Text(TextResult),
    Binary(BinaryResult),
}

impl ResultArtifact {
    /// Content type to present or save the artifact with
    pub fn media_type(&self) -> &str {
        match self {
            ResultArtifact::Text(_) => "text/plain; charset=utf-8",
            ResultArtifact::Binary(result) => &result.media_type,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        match self {
            ResultArtifact::Text(result) => result.text.len(),
            ResultArtifact::Binary(result) => result.bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<TextResult> for ResultArtifact {
    fn from(result: TextResult) -> Self {
        ResultArtifact::Text(result)
    }
}

impl From<BinaryResult> for ResultArtifact {
    fn from(result: BinaryResult) -> Self {
        ResultArtifact::Binary(result)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_mode_parsing() {
        assert_eq!(
            "audio".parse::<ExtractionMode>().unwrap(),
            ExtractionMode::AudioTranscription
        );
        assert_eq!(
            "OCR".parse::<ExtractionMode>().unwrap(),
            ExtractionMode::VisualOcr
        );
        assert!("subtitles".parse::<ExtractionMode>().is_err());
    }

    #[test]
    fn test_extraction_mode_framing() {
        assert_eq!(ExtractionMode::AudioTranscription.subject(), "dialogue");
        assert_eq!(ExtractionMode::VisualOcr.subject(), "hardcoded subtitles");
        assert_eq!(ExtractionMode::AudioTranscription.focus(), "spoken audio");
    }

    #[test]
    fn test_aspect_ratio_round_trip_strings() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap(), AspectRatio::Landscape);
        assert_eq!("portrait".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert!("1:1".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::Portrait.to_string(), "9:16");
    }

    #[test]
    fn test_aspect_ratio_serialization() {
        assert_eq!(
            serde_json::to_string(&AspectRatio::Landscape).unwrap(),
            "\"16:9\""
        );
        assert_eq!(
            serde_json::from_str::<AspectRatio>("\"9:16\"").unwrap(),
            AspectRatio::Portrait
        );
    }

    #[test]
    fn test_generation_request_validation() {
        assert!(GenerationRequest::new("A tiger in the rain").validate().is_ok());
        assert!(matches!(
            GenerationRequest::new("   ").validate(),
            Err(CoreError::Validation(_))
        ));

        let long = "x".repeat(MAX_PROMPT_CHARS + 1);
        assert!(GenerationRequest::new(long).validate().is_err());
    }

    #[test]
    fn test_binary_result_extension() {
        let result = BinaryResult {
            bytes: vec![0, 1],
            media_type: "video/webm".to_string(),
        };
        assert_eq!(result.extension(), "webm");

        let result = BinaryResult {
            bytes: vec![],
            media_type: "application/octet-stream".to_string(),
        };
        assert_eq!(result.extension(), "mp4");
    }

    #[test]
    fn test_result_artifact_describes_payload() {
        let text: ResultArtifact = TextResult {
            text: "1\n00:00:00,000 --> 00:00:01,000\nHi\n".to_string(),
        }
        .into();
        assert!(text.media_type().starts_with("text/plain"));
        assert_eq!(text.len(), 35);

        let video: ResultArtifact = BinaryResult {
            bytes: vec![0, 1, 2],
            media_type: "video/mp4".to_string(),
        }
        .into();
        assert_eq!(video.media_type(), "video/mp4");
        assert_eq!(video.len(), 3);
        assert!(!video.is_empty());

        let empty: ResultArtifact = TextResult { text: String::new() }.into();
        assert!(empty.is_empty());
    }
}
