//! Configuration types shared across crates.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "COFFER_";

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/coffer.toml";

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Largest accepted upload body in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
    /// Mark session cookies `Secure` (enable when served over TLS).
    #[serde(default)]
    pub secure_cookies: bool,
    /// Key CSRF tokens on the first X-Forwarded-For address instead of the
    /// socket peer. Only enable behind a reverse proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_max_upload_size() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
            max_upload_size: default_max_upload_size(),
            secure_cookies: false,
            trust_forwarded_for: false,
        }
    }
}

/// Storage backend configuration.
///
/// The same backend holds both the JSON stores and uploaded file content.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-process memory. Nothing survives a restart.
    Memory,
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
        /// Permission bits for blobs and lock files (unix only).
        #[serde(default = "default_file_mode")]
        file_mode: u32,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs. Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_file_mode() -> u32 {
    0o600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data"),
            file_mode: default_file_mode(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Memory => Ok(()),
            StorageConfig::Filesystem { file_mode, .. } => {
                if file_mode & 0o600 != 0o600 {
                    return Err(format!(
                        "storage.file_mode {file_mode:o} must grant the owner read and write"
                    ));
                }
                if *file_mode > 0o777 {
                    return Err(format!(
                        "storage.file_mode {file_mode:o} is not a permission mask"
                    ));
                }
                Ok(())
            }
            StorageConfig::S3 {
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                if bucket.is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key_id and secret_access_key when either is set"
                            .to_string(),
                    ),
                }
            }
        }
    }

    /// Short backend label used in logs and status output.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Memory => "memory",
            StorageConfig::Filesystem { .. } => "filesystem",
            StorageConfig::S3 { .. } => "s3",
        }
    }
}

/// Lock wait and acquisition policy for the backing stores.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    /// Attempts before giving up with a lock timeout.
    #[serde(default = "default_lock_max_retries")]
    pub max_retries: u32,
    /// Sleep between attempts, in milliseconds.
    #[serde(default = "default_lock_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_lock_max_retries() -> u32 {
    10
}

fn default_lock_retry_interval_ms() -> u64 {
    100
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_retries: default_lock_max_retries(),
            retry_interval_ms: default_lock_retry_interval_ms(),
        }
    }
}

impl LockConfig {
    /// Get the retry interval as a std::time::Duration.
    pub fn retry_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("lock.max_retries must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Login session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds (default: 30 minutes).
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    /// Random bytes behind each session token.
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    /// Interval between background cleanup sweeps in the server.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_token_bytes() -> usize {
    crate::token::DEFAULT_TOKEN_BYTES
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            token_bytes: default_token_bytes(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl SessionConfig {
    /// Session lifetime in whole seconds, saturated to i64.
    pub fn ttl(&self) -> i64 {
        i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)
    }

    /// Get the cleanup interval as a std::time::Duration.
    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("session.ttl_secs cannot be 0".to_string());
        }
        // tokio::time::interval panics on a zero period
        if self.cleanup_interval_secs == 0 {
            return Err("session.cleanup_interval_secs cannot be 0".to_string());
        }
        validate_token_bytes("session.token_bytes", self.token_bytes)
    }
}

/// CSRF token configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Token lifetime in seconds (default: 1 hour).
    #[serde(default = "default_csrf_ttl_secs")]
    pub ttl_secs: u64,
    /// Random bytes behind each CSRF token.
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
}

fn default_csrf_ttl_secs() -> u64 {
    3600
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_csrf_ttl_secs(),
            token_bytes: default_token_bytes(),
        }
    }
}

impl CsrfConfig {
    /// Token lifetime in whole seconds, saturated to i64.
    pub fn ttl(&self) -> i64 {
        i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("csrf.ttl_secs cannot be 0".to_string());
        }
        validate_token_bytes("csrf.token_bytes", self.token_bytes)
    }
}

fn validate_token_bytes(field: &str, len: usize) -> Result<(), String> {
    if len == 0 || len > crate::token::MAX_TOKEN_BYTES {
        return Err(format!(
            "{field} must be between 1 and {}",
            crate::token::MAX_TOKEN_BYTES
        ));
    }
    Ok(())
}

/// Password strength policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PasswordConfig {
    /// Minimum length in characters.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Minimum estimated entropy in bits.
    #[serde(default = "default_min_entropy")]
    pub min_entropy: f64,
}

fn default_min_length() -> usize {
    8
}

fn default_min_entropy() -> f64 {
    28.0
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            min_entropy: default_min_entropy(),
        }
    }
}

/// Bootstrap administrator.
///
/// When present, startup creates this user (or promotes an existing user of
/// the same name) so a fresh deployment can be administered.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// User name of the administrator.
    pub name: String,
    /// Contact address.
    #[serde(default)]
    pub email: String,
    /// Argon2 PHC hash of the password.
    /// Generate with: `cofferctl hash-password`
    pub password_hash: String,
}

impl AdminConfig {
    pub fn validate(&self) -> Result<(), String> {
        crate::names::validate_user_name(&self.name).map_err(|e| format!("admin.name: {e}"))?;
        if !self.password_hash.starts_with("$argon2") {
            return Err("admin.password_hash must be an argon2 PHC string".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Backing store lock policy.
    #[serde(default)]
    pub lock: LockConfig,
    /// Login sessions.
    #[serde(default)]
    pub session: SessionConfig,
    /// CSRF tokens for HTML forms.
    #[serde(default)]
    pub csrf: CsrfConfig,
    /// Password strength policy.
    #[serde(default)]
    pub password: PasswordConfig,
    /// Bootstrap administrator (optional).
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses in-memory storage and a short lock budget.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Memory,
            lock: LockConfig {
                max_retries: 5,
                retry_interval_ms: 10,
            },
            session: SessionConfig::default(),
            csrf: CsrfConfig::default(),
            password: PasswordConfig::default(),
            admin: None,
        }
    }

    /// Layer an optional TOML file under `COFFER_`-prefixed environment
    /// variables, split on `__` (`COFFER_STORAGE__TYPE=memory`).
    ///
    /// A missing file contributes nothing.
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
    }

    /// Extract and validate the configuration built by [`AppConfig::figment`].
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(path).extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.lock.validate()?;
        self.session.validate()?;
        self.csrf.validate()?;
        if let Some(admin) = &self.admin {
            admin.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.lock.max_retries, 10);
        assert_eq!(config.lock.retry_interval_ms, 100);
        assert_eq!(config.session.ttl_secs, 1800);
        assert_eq!(config.csrf.ttl_secs, 3600);
        assert!(config.admin.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_storage_config_parses_tagged_variants() {
        let memory: StorageConfig = serde_json::from_str(r#"{"type":"memory"}"#).unwrap();
        assert_eq!(memory.kind(), "memory");

        let fs: StorageConfig =
            serde_json::from_str(r#"{"type":"filesystem","path":"/var/lib/coffer"}"#).unwrap();
        match fs {
            StorageConfig::Filesystem { path, file_mode } => {
                assert_eq!(path, PathBuf::from("/var/lib/coffer"));
                assert_eq!(file_mode, 0o600);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_s3_config_rejects_partial_credentials() {
        let config = StorageConfig::S3 {
            bucket: "coffer".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("key".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_mode_must_allow_owner_rw() {
        let config = StorageConfig::Filesystem {
            path: PathBuf::from("/tmp"),
            file_mode: 0o400,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = AppConfig::for_testing();
        config.session.cleanup_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::for_testing();
        config.lock.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::for_testing();
        config.csrf.token_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "coffer.toml",
                r#"
                [storage]
                type = "filesystem"
                path = "/srv/coffer"

                [lock]
                max_retries = 3
                "#,
            )?;
            jail.set_env("COFFER_LOCK__RETRY_INTERVAL_MS", "250");
            jail.set_env("COFFER_SESSION__TTL_SECS", "60");

            let config = AppConfig::load(Path::new("coffer.toml"))?;
            assert_eq!(config.storage.kind(), "filesystem");
            assert_eq!(config.lock.max_retries, 3);
            assert_eq!(config.lock.retry_interval_ms, 250);
            assert_eq!(config.session.ttl_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COFFER_STORAGE__TYPE", "memory");
            let config = AppConfig::load(Path::new("missing.toml"))?;
            assert_eq!(config.storage.kind(), "memory");
            assert_eq!(config.server.bind, "127.0.0.1:8080");
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COFFER_LOCK__MAX_RETRIES", "0");
            assert!(AppConfig::load(Path::new("missing.toml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_admin_requires_phc_hash() {
        let admin = AdminConfig {
            name: "root".to_string(),
            email: String::new(),
            password_hash: "plaintext".to_string(),
        };
        assert!(admin.validate().is_err());
    }
}
