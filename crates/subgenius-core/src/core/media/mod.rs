//! Media Encoder
//!
//! Turns a user-supplied video or image into a transport-safe payload:
//! standard base64 text paired with the unchanged content type. A blob is
//! read to completion before anything is returned, so a request never
//! carries a partial payload.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::{CoreError, CoreResult};

/// Fallback content type when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

// =============================================================================
// Payload
// =============================================================================

/// Encoded media ready to embed in a request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    /// Base64 (standard alphabet, padded) encoding of the bytes
    pub data: String,
    /// Declared content type, preserved exactly as supplied
    pub content_type: String,
}

impl MediaPayload {
    /// Encodes raw bytes
    pub fn from_bytes(bytes: &[u8], content_type: impl Into<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            content_type: content_type.into(),
        }
    }

    /// Decodes the payload back to the original bytes
    pub fn decode(&self) -> CoreResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| CoreError::Internal(format!("Invalid base64 payload: {}", e)))
    }
}

impl std::fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Payloads can be hundreds of megabytes; never dump them.
        f.debug_struct("MediaPayload")
            .field("content_type", &self.content_type)
            .field("encoded_len", &self.data.len())
            .finish()
    }
}

// =============================================================================
// Blobs
// =============================================================================

/// A readable piece of media with a declared content type
#[async_trait]
pub trait MediaBlob: Send + Sync {
    /// Declared content type
    fn content_type(&self) -> &str;

    /// Size in bytes, when known without reading
    async fn size_hint(&self) -> Option<u64>;

    /// Reads the whole blob
    async fn read_all(&self) -> std::io::Result<Vec<u8>>;
}

/// Media backed by a file on disk
#[derive(Debug, Clone)]
pub struct FileBlob {
    path: PathBuf,
    content_type: String,
}

impl FileBlob {
    /// Opens a file, inferring the content type from its extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = guess_content_type(&path).to_string();
        Self { path, content_type }
    }

    /// Overrides the inferred content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MediaBlob for FileBlob {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn size_hint(&self) -> Option<u64> {
        tokio::fs::metadata(&self.path).await.ok().map(|m| m.len())
    }

    async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Media already held in memory
#[derive(Debug, Clone)]
pub struct MemoryBlob {
    bytes: Vec<u8>,
    content_type: String,
}

impl MemoryBlob {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl MediaBlob for MemoryBlob {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn size_hint(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Reads a blob to completion and encodes it.
///
/// Any read failure yields [`CoreError::MediaRead`]; no payload is produced.
pub async fn encode(blob: &dyn MediaBlob) -> CoreResult<MediaPayload> {
    let bytes = blob
        .read_all()
        .await
        .map_err(|e| CoreError::MediaRead(e.to_string()))?;

    debug!(
        "Encoded {} bytes of {} media",
        bytes.len(),
        blob.content_type()
    );

    Ok(MediaPayload::from_bytes(&bytes, blob.content_type()))
}

// =============================================================================
// Kind Validation
// =============================================================================

/// Broad media category accepted by each surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/",
            MediaKind::Image => "image/",
        }
    }

    /// Whether a content type belongs to this kind
    pub fn accepts(&self, content_type: &str) -> bool {
        content_type
            .to_ascii_lowercase()
            .starts_with(self.prefix())
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

/// Checks a blob's type and size before it is read
pub async fn validate_blob(blob: &dyn MediaBlob, kind: MediaKind, max_bytes: u64) -> CoreResult<()> {
    if !kind.accepts(blob.content_type()) {
        return Err(CoreError::Validation(format!(
            "Expected {} media, got '{}'",
            kind,
            blob.content_type()
        )));
    }

    if let Some(size) = blob.size_hint().await {
        if size > max_bytes {
            return Err(CoreError::Validation(format!(
                "{} file size {} bytes exceeds {} byte limit",
                kind, size, max_bytes
            )));
        }
    }

    Ok(())
}

/// Infers a content type from a file extension
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "3gp" => "video/3gpp",
        "mpeg" | "mpg" => "video/mpeg",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        _ => OCTET_STREAM,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct UnreadableBlob;

    #[async_trait]
    impl MediaBlob for UnreadableBlob {
        fn content_type(&self) -> &str {
            "video/mp4"
        }

        async fn size_hint(&self) -> Option<u64> {
            None
        }

        async fn read_all(&self) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream ended early",
            ))
        }
    }

    #[tokio::test]
    async fn test_encode_preserves_bytes_and_content_type() {
        let samples: Vec<(Vec<u8>, &str)> = vec![
            (vec![], "video/mp4"),
            (vec![0x00], "image/png"),
            (vec![0xFF, 0x00, 0x7F, 0x80], "video/x-custom; codecs=\"avc1\""),
            ((0..=255u8).cycle().take(4099).collect(), "Image/JPEG"),
        ];

        for (bytes, content_type) in samples {
            let blob = MemoryBlob::new(bytes.clone(), content_type);
            let payload = encode(&blob).await.unwrap();

            assert_eq!(payload.content_type, content_type);
            assert_eq!(payload.decode().unwrap(), bytes);
        }
    }

    #[tokio::test]
    async fn test_encode_uses_standard_base64() {
        let payload = MediaPayload::from_bytes(b"hi?", "text/plain");
        assert_eq!(payload.data, "aGk/");
    }

    #[tokio::test]
    async fn test_encode_read_failure_is_media_read_error() {
        let result = encode(&UnreadableBlob).await;
        assert!(matches!(result, Err(CoreError::MediaRead(_))));
    }

    #[tokio::test]
    async fn test_file_blob_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.MOV");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let blob = FileBlob::new(&path);
        assert_eq!(blob.content_type(), "video/quicktime");
        assert_eq!(blob.size_hint().await, Some(3));

        let payload = encode(&blob).await.unwrap();
        assert_eq!(payload.decode().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_missing_file_is_media_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let blob = FileBlob::new(temp_dir.path().join("missing.mp4"));

        assert!(matches!(
            encode(&blob).await,
            Err(CoreError::MediaRead(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_blob_kind_and_size() {
        let video = MemoryBlob::new(vec![0; 10], "video/mp4");
        assert!(validate_blob(&video, MediaKind::Video, 10).await.is_ok());
        assert!(matches!(
            validate_blob(&video, MediaKind::Video, 9).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            validate_blob(&video, MediaKind::Image, 100).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(guess_content_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("a.webp")), "image/webp");
        assert_eq!(guess_content_type(Path::new("noext")), OCTET_STREAM);
    }

    #[test]
    fn test_payload_debug_omits_data() {
        let payload = MediaPayload::from_bytes(b"secret-bytes", "image/png");
        let debug = format!("{:?}", payload);
        assert!(debug.contains("image/png"));
        assert!(!debug.contains(&payload.data));
    }
}
