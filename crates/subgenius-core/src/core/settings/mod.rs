//! Settings Persistence System
//!
//! Provides persistent application settings with:
//! - Atomic file writes (temp file + rename)
//! - Defaults for missing fields and clamping of out-of-range values
//! - Advisory file locking between concurrent processes
//!
//! Storage location: {config_dir}/subgenius/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::core::ai::DEFAULT_BASE_URL;
use crate::core::{CoreError, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

const MIB: u64 = 1024 * 1024;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Service endpoints, models and decoding options
    #[serde(default)]
    pub ai: AiSettings,

    /// Video job polling bounds
    #[serde(default)]
    pub polling: PollingSettings,

    /// Upload limits
    #[serde(default)]
    pub media: MediaSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            ai: AiSettings::default(),
            polling: PollingSettings::default(),
            media: MediaSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Tolerant: bad values are corrected rather than rejected.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;
        self.ai.normalize();
        self.polling.normalize();
        self.media.normalize();
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

fn non_blank_or(value: &mut String, fallback: String) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = fallback;
    } else if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

// =============================================================================
// AI Settings
// =============================================================================

/// Service endpoints, models and decoding options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    /// REST endpoint of the hosted service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for subtitle extraction
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    /// Model used for image analysis
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,

    /// Model used for video generation
    #[serde(default = "default_video_model")]
    pub video_model: String,

    /// Temperature for subtitle extraction (0.0-1.0, default 0.1)
    #[serde(default = "default_transcription_temperature")]
    pub transcription_temperature: f32,

    /// Output resolution for generated video ("720p" or "1080p")
    #[serde(default = "default_video_resolution")]
    pub video_resolution: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_transcription_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_analysis_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_video_model() -> String {
    "veo-3.1-fast-generate-preview".to_string()
}

fn default_transcription_temperature() -> f32 {
    0.1
}

fn default_video_resolution() -> String {
    "720p".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            transcription_model: default_transcription_model(),
            analysis_model: default_analysis_model(),
            video_model: default_video_model(),
            transcription_temperature: default_transcription_temperature(),
            video_resolution: default_video_resolution(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AiSettings {
    /// Normalize AI settings to valid ranges
    pub fn normalize(&mut self) {
        non_blank_or(&mut self.base_url, default_base_url());
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        non_blank_or(&mut self.transcription_model, default_transcription_model());
        non_blank_or(&mut self.analysis_model, default_analysis_model());
        non_blank_or(&mut self.video_model, default_video_model());

        self.transcription_temperature = clamp_f32(
            self.transcription_temperature,
            0.0,
            1.0,
            default_transcription_temperature(),
        );

        self.video_resolution = normalize_enum(
            &self.video_resolution,
            &["720p", "1080p"],
            default_video_resolution(),
        );

        self.request_timeout_secs = self.request_timeout_secs.clamp(10, 3600);
    }

    /// HTTP timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Polling Settings
// =============================================================================

/// Video job polling bounds. Zero means unbounded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollingSettings {
    /// Seconds between status queries (1-300, default 5)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum number of waits before giving up (0 = unbounded)
    #[serde(default)]
    pub max_attempts: u32,

    /// Maximum total wait in seconds (0 = unbounded, default 900)
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_max_wait_secs() -> u64 {
    900
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: 0,
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl PollingSettings {
    pub fn normalize(&mut self) {
        self.interval_secs = self.interval_secs.clamp(1, 300);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_attempts(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs))
    }
}

// =============================================================================
// Media Settings
// =============================================================================

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaSettings {
    /// Largest accepted video in bytes (default 300 MiB)
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,

    /// Largest accepted image in bytes (default 20 MiB)
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
}

fn default_max_video_bytes() -> u64 {
    300 * MIB
}

fn default_max_image_bytes() -> u64 {
    20 * MIB
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            max_video_bytes: default_max_video_bytes(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl MediaSettings {
    pub fn normalize(&mut self) {
        // 0 would reject every upload; treat it as "use the default".
        if self.max_video_bytes == 0 {
            self.max_video_bytes = default_max_video_bytes();
        }
        if self.max_image_bytes == 0 {
            self.max_image_bytes = default_max_image_bytes();
        }
    }
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager with the given config directory
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    /// Default config directory for this application
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("subgenius"))
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(
        &self,
        exclusive: bool,
        op: impl FnOnce() -> Result<T, String>,
    ) -> Result<T, String> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| format!("Failed to open settings lock file: {}", e))?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)
                .map_err(|e| format!("Failed to lock settings file (exclusive): {}", e))?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)
                .map_err(|e| format!("Failed to lock settings file (shared): {}", e))?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> AppSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)
                .map_err(|e| format!("Failed to read settings file: {}", e))?;

            let mut settings = serde_json::from_str::<AppSettings>(&content)
                .map_err(|e| format!("Failed to parse settings file: {}", e))?;

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            let content = serde_json::to_string_pretty(&normalized)
                .map_err(|e| format!("Failed to serialize settings: {}", e))?;

            let temp_path = self.settings_path.with_extension("json.tmp");
            if temp_path.exists() {
                let _ = fs::remove_file(&temp_path);
            }

            let mut file = fs::File::create(&temp_path)
                .map_err(|e| format!("Failed to create temp settings file: {}", e))?;
            file.write_all(content.as_bytes())
                .map_err(|e| format!("Failed to write settings: {}", e))?;
            file.sync_all()
                .map_err(|e| format!("Failed to sync settings file: {}", e))?;

            if cfg!(windows) && self.settings_path.exists() {
                // Windows: rename does not overwrite.
                fs::remove_file(&self.settings_path)
                    .map_err(|e| format!("Failed to replace settings file: {}", e))?;
            }

            fs::rename(&temp_path, &self.settings_path)
                .map_err(|e| format!("Failed to finalize settings file: {}", e))?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
        .map_err(CoreError::Internal)
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)
                    .map_err(|e| format!("Failed to delete settings file: {}", e))?;
                info!("Settings file deleted");
            }
            Ok(AppSettings::default())
        })
        .map_err(CoreError::Internal)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.ai.transcription_model, "gemini-3-flash-preview");
        assert_eq!(settings.ai.analysis_model, "gemini-3-pro-preview");
        assert_eq!(settings.ai.video_model, "veo-3.1-fast-generate-preview");
        assert!((settings.ai.transcription_temperature - 0.1).abs() < 0.001);
        assert_eq!(settings.ai.video_resolution, "720p");
        assert_eq!(settings.polling.interval_secs, 5);
        assert_eq!(settings.media.max_video_bytes, 300 * MIB);
    }

    #[test]
    fn test_polling_bounds_zero_means_unbounded() {
        let polling = PollingSettings {
            interval_secs: 5,
            max_attempts: 0,
            max_wait_secs: 0,
        };
        assert_eq!(polling.max_attempts(), None);
        assert_eq!(polling.max_wait(), None);

        let polling = PollingSettings::default();
        assert_eq!(polling.max_wait(), Some(Duration::from_secs(900)));
        assert_eq!(polling.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_normalization_clamps_values() {
        let mut settings = AppSettings::default();
        settings.ai.transcription_temperature = 3.0;
        settings.ai.video_resolution = "4K".to_string();
        settings.ai.request_timeout_secs = 1;
        settings.ai.base_url = "https://example.com/v1/".to_string();
        settings.ai.video_model = "   ".to_string();
        settings.polling.interval_secs = 0;
        settings.media.max_image_bytes = 0;

        settings.normalize();

        assert!((settings.ai.transcription_temperature - 1.0).abs() < 0.001);
        assert_eq!(settings.ai.video_resolution, "720p");
        assert_eq!(settings.ai.request_timeout_secs, 10);
        assert_eq!(settings.ai.base_url, "https://example.com/v1");
        assert_eq!(settings.ai.video_model, "veo-3.1-fast-generate-preview");
        assert_eq!(settings.polling.interval_secs, 1);
        assert_eq!(settings.media.max_image_bytes, 20 * MIB);
    }

    #[test]
    fn test_temperature_nan_resets_to_default() {
        let mut ai = AiSettings {
            transcription_temperature: f32::NAN,
            ..Default::default()
        };
        ai.normalize();
        assert!((ai.transcription_temperature - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let mut settings = AppSettings::default();
        settings.ai.video_resolution = "1080P".to_string();
        settings.polling.max_attempts = 40;

        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved.ai.video_resolution, "1080p");

        let loaded = manager.load();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.polling.max_attempts(), Some(40));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().join("nested"));
        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SETTINGS_FILE), "{ not json").unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SETTINGS_FILE),
            r#"{
                "version": 1,
                "polling": { "intervalSecs": 10 },
                "ai": { "analysisModel": "gemini-2.5-pro" }
            }"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        assert_eq!(settings.polling.interval_secs, 10);
        assert_eq!(settings.polling.max_wait_secs, 900);
        assert_eq!(settings.ai.analysis_model, "gemini-2.5-pro");
        assert_eq!(settings.ai.transcription_model, "gemini-3-flash-preview");
    }

    #[test]
    fn test_reset_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        manager.save(&AppSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        let reset = manager.reset().unwrap();
        assert_eq!(reset, AppSettings::default());
        assert!(!manager.settings_path().exists());
    }

    #[test]
    fn test_settings_serialize_camel_case() {
        let json = serde_json::to_string(&AppSettings::default()).unwrap();
        assert!(json.contains("\"transcriptionModel\""));
        assert!(json.contains("\"maxWaitSecs\""));
        assert!(json.contains("\"maxVideoBytes\""));
    }
}
