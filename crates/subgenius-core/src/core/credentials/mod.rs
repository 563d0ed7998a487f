//! Credential Store
//!
//! Holds the single API key used for every request to the hosted service.
//! At most one credential is active at a time; the job adapter clears it
//! whenever the service rejects it, so a known-bad key is never retried.
//!
//! # Storage
//!
//! [`CredentialVault`] persists the key as one named entry in an encrypted
//! vault file:
//!
//! - **Encryption at Rest**: XChaCha20-Poly1305 AEAD with a fresh nonce per write
//! - **Key Derivation**: Argon2id over machine-specific entropy, no password prompt
//! - **Atomic Writes**: temp file + rename under an exclusive file lock
//! - **No Secret Logging**: only presence/absence is ever logged
//!
//! [`MemoryCredentialStore`] keeps the key in process memory for tests and
//! embedders that manage persistence themselves.

use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Name of the single vault entry holding the API key
pub const CREDENTIAL_ENTRY: &str = "gemini_api_key";

/// Vault file name inside the application data directory
pub const VAULT_FILE: &str = "credentials.vault";

/// Longest accepted token, in bytes
const MAX_TOKEN_BYTES: usize = 1024;

// =============================================================================
// Credential
// =============================================================================

/// An opaque API token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Builds a credential from user input, trimming whitespace.
    ///
    /// Returns `None` for blank input.
    pub fn new(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw token, for placing on an outbound request
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Redacted preview safe for display
    pub fn redacted(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() < 12 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur during credential operations
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Failed to initialize vault: {0}")]
    InitializationFailed(String),

    #[error("Credential value is empty")]
    EmptyValue,

    #[error("Credential value too long (max 1024 bytes)")]
    ValueTooLong,

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Checks a trimmed token before it is persisted
fn validate_token(token: &str) -> CredentialResult<()> {
    if token.is_empty() {
        return Err(CredentialError::EmptyValue);
    }
    if token.len() > MAX_TOKEN_BYTES {
        return Err(CredentialError::ValueTooLong);
    }
    // Basic format check only; the service is the authority on validity.
    if !token.starts_with("AIza") {
        warn!("API key does not match expected format (AIza*), proceeding anyway");
    }
    Ok(())
}

// =============================================================================
// Store Trait
// =============================================================================

/// Injectable credential store used by the job adapter
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any. No side effects.
    async fn get(&self) -> Option<Credential>;

    /// Stores the trimmed token.
    ///
    /// Blank input is ignored and reported as `Ok(false)`; the existing
    /// credential (if any) is left untouched.
    async fn set(&self, token: &str) -> CredentialResult<bool>;

    /// Removes the credential
    async fn clear(&self) -> CredentialResult<()>;

    /// Whether a credential is present
    async fn is_present(&self) -> bool {
        self.get().await.is_some()
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a token
    pub fn with_token(token: &str) -> Self {
        Self {
            current: RwLock::new(Credential::new(token)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    async fn set(&self, token: &str) -> CredentialResult<bool> {
        let Some(credential) = Credential::new(token) else {
            return Ok(false);
        };
        validate_token(credential.expose())?;
        *self.current.write().await = Some(credential);
        Ok(true)
    }

    async fn clear(&self) -> CredentialResult<()> {
        *self.current.write().await = None;
        Ok(())
    }
}

// =============================================================================
// Encrypted Vault
// =============================================================================

/// Encrypted credential stored in the vault
#[derive(Clone, Serialize, Deserialize)]
struct EncryptedCredential {
    /// Encrypted value (XChaCha20-Poly1305 ciphertext)
    ciphertext: Vec<u8>,
    /// Nonce used for encryption (24 bytes for XChaCha20)
    nonce: [u8; 24],
    /// Timestamp when the credential was stored
    stored_at: i64,
}

/// Vault file format
#[derive(Serialize, Deserialize)]
struct VaultFile {
    /// Version for migration support
    version: u32,
    /// Named entries; only [`CREDENTIAL_ENTRY`] is ever written
    entries: HashMap<String, EncryptedCredential>,
}

/// Persistent, encrypted single-entry credential store
pub struct CredentialVault {
    /// Path to the vault file
    vault_path: PathBuf,
    /// Derived encryption key (32 bytes for XChaCha20)
    encryption_key: [u8; 32],
    /// Cached encrypted entry
    entry: RwLock<Option<EncryptedCredential>>,
    /// Serializes writes from concurrent tasks
    io_lock: Mutex<()>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("vault_path", &self.vault_path)
            .finish_non_exhaustive()
    }
}

impl CredentialVault {
    /// Current vault file version
    const VERSION: u32 = 1;

    /// Default vault location in the platform data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("subgenius").join(VAULT_FILE))
    }

    /// Opens (or creates) the vault at `vault_path`
    pub fn new(vault_path: PathBuf) -> CredentialResult<Self> {
        let parent = vault_path.parent().ok_or_else(|| {
            CredentialError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Invalid vault path",
            ))
        })?;

        std::fs::create_dir_all(parent)?;

        let encryption_key = Self::derive_key(&vault_path)?;

        let entry = if vault_path.exists() {
            Self::load_vault(&vault_path)?
        } else {
            None
        };

        info!("Credential vault opened at {}", vault_path.display());

        Ok(Self {
            vault_path,
            encryption_key,
            entry: RwLock::new(entry),
            io_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.vault_path
    }

    /// Derives the encryption key using Argon2id over machine entropy.
    ///
    /// Deterministic for the same vault path on the same machine, so the
    /// vault reopens across restarts without user input.
    fn derive_key(vault_path: &Path) -> CredentialResult<[u8; 32]> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let machine_id = Self::get_machine_entropy(vault_path);
        let salt = b"subgenius-vault-salt-v1";

        let params = Params::new(
            8 * 1024, // 8 MB memory cost (m)
            3,        // 3 iterations (t)
            1,        // 1 degree of parallelism (p)
            Some(32), // 32-byte output
        )
        .map_err(|e| {
            CredentialError::InitializationFailed(format!(
                "Failed to configure key derivation: {}",
                e
            ))
        })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(machine_id.as_bytes(), salt, &mut key)
            .map_err(|e| {
                CredentialError::InitializationFailed(format!("Key derivation failed: {}", e))
            })?;

        Ok(key)
    }

    /// Gets machine-specific entropy for key derivation
    fn get_machine_entropy(vault_path: &Path) -> String {
        let mut components = vec![
            "subgenius-credential-vault-v1".to_string(),
            vault_path.to_string_lossy().to_string(),
        ];

        #[cfg(target_os = "linux")]
        {
            if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
                components.push(id.trim().to_string());
            } else if let Ok(id) = std::fs::read_to_string("/var/lib/dbus/machine-id") {
                components.push(id.trim().to_string());
            }
        }

        #[cfg(target_os = "macos")]
        {
            if let Ok(output) = std::process::Command::new("ioreg")
                .args(["-rd1", "-c", "IOPlatformExpertDevice"])
                .output()
            {
                if output.status.success() {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    if let Some(uuid_line) = stdout.lines().find(|l| l.contains("IOPlatformUUID")) {
                        components.push(uuid_line.trim().to_string());
                    }
                }
            }
        }

        if let Ok(hostname) = hostname::get() {
            components.push(hostname.to_string_lossy().to_string());
        }

        components.join(":")
    }

    /// Loads the vault entry from disk
    fn load_vault(path: &Path) -> CredentialResult<Option<EncryptedCredential>> {
        let content = std::fs::read_to_string(path)?;
        let mut vault_file: VaultFile = serde_json::from_str(&content)
            .map_err(|e| CredentialError::SerializationError(e.to_string()))?;

        if vault_file.version > Self::VERSION {
            return Err(CredentialError::InitializationFailed(format!(
                "Vault version {} is newer than supported version {}",
                vault_file.version,
                Self::VERSION
            )));
        }

        let entry = vault_file.entries.remove(CREDENTIAL_ENTRY);
        debug!("Loaded vault (credential present: {})", entry.is_some());

        Ok(entry)
    }

    /// When the stored credential was last written
    pub async fn stored_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let guard = self.entry.read().await;
        chrono::DateTime::from_timestamp(guard.as_ref()?.stored_at, 0)
    }

    /// Writes `entry` to disk atomically. The cached entry is left alone;
    /// callers swap it in only after this succeeds.
    async fn save_vault(&self, entry: Option<&EncryptedCredential>) -> CredentialResult<()> {
        use fs2::FileExt;
        use std::fs::OpenOptions;

        let _io_guard = self.io_lock.lock().await;

        // Cross-process safety: separate CLI invocations may write at once.
        let lock_path = self.vault_path.with_extension("vault.lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        lock_file.lock_exclusive()?;

        let mut entries = HashMap::new();
        if let Some(entry) = entry {
            entries.insert(CREDENTIAL_ENTRY.to_string(), entry.clone());
        }

        let vault_file = VaultFile {
            version: Self::VERSION,
            entries,
        };

        let content = serde_json::to_string_pretty(&vault_file)
            .map_err(|e| CredentialError::SerializationError(e.to_string()))?;

        // Temp file lives in the same directory so the rename stays atomic.
        let temp_path = self
            .vault_path
            .with_extension(format!("vault.tmp.{}", uuid::Uuid::new_v4()));

        std::fs::write(&temp_path, &content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600));
        }

        #[cfg(windows)]
        {
            if self.vault_path.exists() {
                std::fs::remove_file(&self.vault_path)?;
            }
        }

        std::fs::rename(&temp_path, &self.vault_path)?;

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock vault lock file: {}", e);
        }

        Ok(())
    }

    /// Encrypt data using XChaCha20-Poly1305
    fn encrypt(key: &[u8; 32], nonce: &[u8; 24], plaintext: &[u8]) -> CredentialResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| CredentialError::EncryptionError(format!("Invalid key: {}", e)))?;

        cipher
            .encrypt(XNonce::from_slice(nonce), plaintext)
            .map_err(|e| CredentialError::EncryptionError(format!("Encryption failed: {}", e)))
    }

    /// Decrypt data using XChaCha20-Poly1305, verifying the auth tag
    fn decrypt(key: &[u8; 32], nonce: &[u8; 24], ciphertext: &[u8]) -> CredentialResult<Vec<u8>> {
        // XChaCha20-Poly1305 appends a 16-byte authentication tag
        if ciphertext.len() < 16 {
            return Err(CredentialError::DecryptionError(
                "Ciphertext too short (missing authentication tag)".to_string(),
            ));
        }

        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| CredentialError::DecryptionError(format!("Invalid key: {}", e)))?;

        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                CredentialError::DecryptionError(
                    "Decryption failed: authentication tag verification failed".to_string(),
                )
            })
    }

    fn open_entry(&self, entry: &EncryptedCredential) -> CredentialResult<Credential> {
        let plaintext = Self::decrypt(&self.encryption_key, &entry.nonce, &entry.ciphertext)?;
        let value = String::from_utf8(plaintext)
            .map_err(|e| CredentialError::DecryptionError(e.to_string()))?;
        Credential::new(&value).ok_or(CredentialError::EmptyValue)
    }
}

#[async_trait]
impl CredentialStore for CredentialVault {
    async fn get(&self) -> Option<Credential> {
        let guard = self.entry.read().await;
        let entry = guard.as_ref()?;

        match self.open_entry(entry) {
            Ok(credential) => Some(credential),
            Err(e) => {
                // A vault written on another machine cannot be opened here.
                warn!("Stored credential is unreadable, treating as absent: {}", e);
                None
            }
        }
    }

    async fn set(&self, token: &str) -> CredentialResult<bool> {
        let Some(credential) = Credential::new(token) else {
            debug!("Ignoring blank credential");
            return Ok(false);
        };
        validate_token(credential.expose())?;

        let mut nonce = [0u8; 24];
        rand::Rng::fill(&mut OsRng, &mut nonce);

        let ciphertext = Self::encrypt(&self.encryption_key, &nonce, credential.expose().as_bytes())?;

        let candidate = EncryptedCredential {
            ciphertext,
            nonce,
            stored_at: chrono::Utc::now().timestamp(),
        };

        let mut entry = self.entry.write().await;
        self.save_vault(Some(&candidate)).await?;
        *entry = Some(candidate);

        info!("Stored credential: {}", CREDENTIAL_ENTRY);
        Ok(true)
    }

    async fn clear(&self) -> CredentialResult<()> {
        let mut entry = self.entry.write().await;
        self.save_vault(None).await?;
        *entry = None;

        info!("Cleared credential: {}", CREDENTIAL_ENTRY);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_credential_trims_and_rejects_blank() {
        assert_eq!(Credential::new("  AIzaKey  ").unwrap().expose(), "AIzaKey");
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn test_credential_redaction() {
        let long = Credential::new("AIza1234567890abcdef").unwrap();
        assert_eq!(long.redacted(), "AIza...cdef");

        let short = Credential::new("short").unwrap();
        assert_eq!(short.redacted(), "*****");
    }

    #[test]
    fn test_credential_debug_hides_value() {
        let credential = Credential::new("AIzaSecretValue").unwrap();
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("Secret"));
    }

    #[tokio::test]
    async fn test_memory_store_set_get_clear() {
        let store = MemoryCredentialStore::new();
        assert!(store.get().await.is_none());

        assert!(store.set("  AIzaFirst  ").await.unwrap());
        assert_eq!(store.get().await.unwrap().expose(), "AIzaFirst");
        // Repeated reads return the same value
        assert_eq!(store.get().await.unwrap().expose(), "AIzaFirst");

        assert!(store.set("AIzaSecond").await.unwrap());
        assert_eq!(store.get().await.unwrap().expose(), "AIzaSecond");

        store.clear().await.unwrap();
        assert!(store.get().await.is_none());
        assert!(!store.is_present().await);
    }

    #[tokio::test]
    async fn test_memory_store_blank_set_is_noop() {
        let store = MemoryCredentialStore::with_token("AIzaKeep");

        assert!(!store.set("").await.unwrap());
        assert!(!store.set("   ").await.unwrap());
        assert_eq!(store.get().await.unwrap().expose(), "AIzaKeep");

        let empty = MemoryCredentialStore::new();
        assert!(!empty.set("  ").await.unwrap());
        assert!(empty.get().await.is_none());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_oversized_token() {
        let store = MemoryCredentialStore::new();
        let long = "x".repeat(2000);
        assert!(matches!(
            store.set(&long).await,
            Err(CredentialError::ValueTooLong)
        ));
        assert!(store.get().await.is_none());
    }

    #[tokio::test]
    async fn test_vault_set_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let vault = CredentialVault::new(temp_dir.path().join(VAULT_FILE)).unwrap();

        assert!(vault.get().await.is_none());
        assert!(vault.set(" AIzaVaultKey123 ").await.unwrap());
        assert_eq!(vault.get().await.unwrap().expose(), "AIzaVaultKey123");
    }

    #[tokio::test]
    async fn test_vault_does_not_store_plaintext() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(VAULT_FILE);
        let vault = CredentialVault::new(path.clone()).unwrap();

        vault.set("AIzaPlaintextCheck").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(CREDENTIAL_ENTRY));
        assert!(!content.contains("AIzaPlaintextCheck"));
    }

    #[tokio::test]
    async fn test_vault_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(VAULT_FILE);

        {
            let vault = CredentialVault::new(path.clone()).unwrap();
            vault.set("AIzaPersisted").await.unwrap();
        }

        {
            let vault = CredentialVault::new(path.clone()).unwrap();
            assert_eq!(vault.get().await.unwrap().expose(), "AIzaPersisted");
            vault.clear().await.unwrap();
        }

        let vault = CredentialVault::new(path).unwrap();
        assert!(vault.get().await.is_none());
    }

    #[tokio::test]
    async fn test_vault_records_stored_at() {
        let temp_dir = TempDir::new().unwrap();
        let vault = CredentialVault::new(temp_dir.path().join(VAULT_FILE)).unwrap();
        assert!(vault.stored_at().await.is_none());

        let before = chrono::Utc::now().timestamp();
        vault.set("AIzaTimestamped").await.unwrap();
        let stored_at = vault.stored_at().await.unwrap().timestamp();
        assert!(stored_at >= before && stored_at <= chrono::Utc::now().timestamp());

        vault.clear().await.unwrap();
        assert!(vault.stored_at().await.is_none());
    }

    #[tokio::test]
    async fn test_vault_failed_write_keeps_previous_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(VAULT_FILE);
        let vault = CredentialVault::new(path.clone()).unwrap();
        vault.set("AIzaOld").await.unwrap();

        // A directory at the lock path makes every save fail.
        let lock_path = path.with_extension("vault.lock");
        let _ = std::fs::remove_file(&lock_path);
        std::fs::create_dir(&lock_path).unwrap();

        assert!(vault.set("AIzaNew").await.is_err());
        assert_eq!(vault.get().await.unwrap().expose(), "AIzaOld");

        assert!(vault.clear().await.is_err());
        assert_eq!(vault.get().await.unwrap().expose(), "AIzaOld");

        std::fs::remove_dir(&lock_path).unwrap();
        let reopened = CredentialVault::new(path).unwrap();
        assert_eq!(reopened.get().await.unwrap().expose(), "AIzaOld");
    }

    #[tokio::test]
    async fn test_vault_blank_set_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let vault = CredentialVault::new(temp_dir.path().join(VAULT_FILE)).unwrap();

        vault.set("AIzaOriginal").await.unwrap();
        assert!(!vault.set("   ").await.unwrap());
        assert_eq!(vault.get().await.unwrap().expose(), "AIzaOriginal");
    }

    #[tokio::test]
    async fn test_vault_rejects_newer_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(VAULT_FILE);
        std::fs::write(&path, r#"{"version": 99, "entries": {}}"#).unwrap();

        assert!(matches!(
            CredentialVault::new(path),
            Err(CredentialError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_encryption_decryption() {
        let key = [42u8; 32];
        let nonce = [1u8; 24];
        let plaintext = b"AIzaRoundTrip";

        let ciphertext = CredentialVault::encrypt(&key, &nonce, plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + 16);

        let decrypted = CredentialVault::decrypt(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_aead_tamper_and_wrong_key_fail() {
        let key = [42u8; 32];
        let nonce = [1u8; 24];

        let mut ciphertext = CredentialVault::encrypt(&key, &nonce, b"secret").unwrap();
        let wrong_key = [43u8; 32];
        assert!(matches!(
            CredentialVault::decrypt(&wrong_key, &nonce, &ciphertext),
            Err(CredentialError::DecryptionError(_))
        ));

        ciphertext[0] ^= 0xFF;
        assert!(matches!(
            CredentialVault::decrypt(&key, &nonce, &ciphertext),
            Err(CredentialError::DecryptionError(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_set_does_not_corrupt_vault() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(VAULT_FILE);
        let vault = Arc::new(CredentialVault::new(path.clone()).unwrap());

        let mut tasks = Vec::new();
        for i in 0..16u32 {
            let v = Arc::clone(&vault);
            tasks.push(tokio::spawn(async move {
                v.set(&format!("AIzaConcurrent{:02}", i)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reopened = CredentialVault::new(path).unwrap();
        assert!(reopened
            .get()
            .await
            .unwrap()
            .expose()
            .starts_with("AIzaConcurrent"));
    }
}
