//! Shared command context: where state lives and how the adapter is built.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use subgenius_core::core::ai::GeminiClient;
use subgenius_core::core::credentials::{CredentialVault, VAULT_FILE};
use subgenius_core::core::jobs::JobAdapter;
use subgenius_core::core::settings::{AppSettings, SettingsManager};

pub struct Context {
    /// Set when `--config-dir` overrides the platform directories
    custom_dir: Option<PathBuf>,
    settings: SettingsManager,
    pub json: bool,
}

impl Context {
    pub fn new(config_dir: Option<PathBuf>, json: bool) -> anyhow::Result<Self> {
        let settings_dir = match &config_dir {
            Some(dir) => dir.clone(),
            None => SettingsManager::default_dir()
                .context("Could not determine a config directory; pass --config-dir")?,
        };

        Ok(Self {
            custom_dir: config_dir,
            settings: SettingsManager::new(settings_dir),
            json,
        })
    }

    pub fn settings_manager(&self) -> &SettingsManager {
        &self.settings
    }

    pub fn load_settings(&self) -> AppSettings {
        self.settings.load()
    }

    pub fn vault_path(&self) -> Option<PathBuf> {
        match &self.custom_dir {
            Some(dir) => Some(dir.join(VAULT_FILE)),
            None => CredentialVault::default_path(),
        }
    }

    /// Log files go next to the vault
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.vault_path()
            .as_deref()
            .and_then(Path::parent)
            .map(|dir| dir.join("logs"))
    }

    pub fn open_vault(&self) -> anyhow::Result<Arc<CredentialVault>> {
        let path = self
            .vault_path()
            .context("Could not determine a data directory; pass --config-dir")?;
        let vault = CredentialVault::new(path).context("Failed to open the key vault")?;
        Ok(Arc::new(vault))
    }

    /// Builds a job adapter backed by the Gemini REST client and the vault
    pub fn adapter(&self, settings: &AppSettings) -> anyhow::Result<JobAdapter> {
        let client = GeminiClient::with_timeout(settings.ai.request_timeout())?
            .with_base_url(settings.ai.base_url.as_str());

        Ok(JobAdapter::from_settings(
            Arc::new(client),
            self.open_vault()?,
            settings,
        ))
    }
}
