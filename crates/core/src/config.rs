//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted resource upload size in bytes.
    #[serde(default = "default_max_resource_size")]
    pub max_resource_size: u64,
    /// Session lifetime in seconds for signup/login sessions.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Folder used when an upload names none.
    #[serde(default = "default_folder")]
    pub default_folder: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// When enabled, restrict the endpoint to authorized scraper IPs at the
    /// infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_resource_size() -> u64 {
    crate::MAX_RESOURCE_SIZE
}

fn default_session_ttl_secs() -> u64 {
    crate::DEFAULT_SESSION_TTL_SECS
}

fn default_folder() -> String {
    "General".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_resource_size: default_max_resource_size(),
            session_ttl_secs: default_session_ttl_secs(),
            default_folder: default_folder(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Get the session lifetime as a Duration.
    pub fn session_ttl(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
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
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (e.g., `endpoint/bucket/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite metadata store.
    Sqlite {
        /// Path to the database file.
        path: PathBuf,
        /// Advisory query timeout in seconds.
        query_timeout_secs: Option<u64>,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: None,
        }
    }
}

/// Unreferenced-content sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Grace period in seconds before a refcount-0 content record may be
    /// reclaimed. Protects uploads whose metadata transaction races the sweep.
    #[serde(default = "default_sweep_grace_secs")]
    pub grace_secs: u64,
    /// Maximum content records reclaimed per sweep invocation.
    #[serde(default = "default_sweep_batch_limit")]
    pub batch_limit: u32,
}

fn default_sweep_grace_secs() -> u64 {
    3600
}

fn default_sweep_batch_limit() -> u32 {
    1000
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_sweep_grace_secs(),
            batch_limit: default_sweep_batch_limit(),
        }
    }
}

impl SweepConfig {
    /// Validate sweep configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_limit == 0 {
            return Err("sweep.batch_limit must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Admin token configuration.
///
/// The admin token provides initial access for user administration and
/// maintenance endpoints. If the token hash changes between restarts, the
/// previous admin token is automatically revoked and a new one is created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Pre-computed hash of the admin token (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
    /// Description for the admin token.
    pub token_description: Option<String>,
}

impl AdminConfig {
    /// Create a test configuration with a dummy token hash.
    ///
    /// **For testing only.** The hash is deterministic but not a real token.
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-admin-token"
            token_hash: "9f735e0df9a1ddc702bf0a1a7b83033f9f7153a00c29de82cedadc9957289b05"
                .to_string(),
            token_description: Some("Test admin token".to_string()),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Create a configuration with test-friendly defaults.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            sweep: SweepConfig::default(),
            admin: AdminConfig::for_testing(),
        }
    }
}
