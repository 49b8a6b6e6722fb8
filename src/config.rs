/*!
 * Configuration types for stowage
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Bucket used by the health probe
pub const HEALTH_BUCKET: &str = "txtxtxtxt1";

/// Object key written by the health probe
pub const HEALTH_KEY: &str = "txtxtxtxt1";

/// Payload written by the health probe
pub const HEALTH_PAYLOAD: &[u8] = b"_t@@@1";

/// Hard quota registered for every bucket the store creates
pub const DEFAULT_BUCKET_QUOTA: &str = "1GB";

/// Connection settings for the object store and its admin API
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Server address as `host:port`, without scheme
    pub host: String,

    /// Access key (MinIO user)
    pub access_key: String,

    /// Secret key (MinIO password)
    pub secret_key: String,

    /// Use HTTPS instead of plain HTTP
    #[serde(default)]
    pub secure: bool,

    /// Signing region; MinIO accepts any value
    #[serde(default = "default_region")]
    pub region: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Hard quota for auto-created buckets (e.g. "1GB")
    #[serde(default = "default_bucket_quota")]
    pub bucket_quota: String,

    /// Attempt bounds and delay for the retrying operations
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Attempt bounds for each retrying operation and the fixed delay between attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts for `put`
    #[serde(default = "default_put_attempts")]
    pub put_attempts: u32,

    /// Attempts for `get`
    #[serde(default = "default_get_attempts")]
    pub get_attempts: u32,

    /// Attempts for `presign`
    #[serde(default = "default_presign_attempts")]
    pub presign_attempts: u32,

    /// Delay between attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Same bounds, no sleeping between attempts
    pub fn without_delay(self) -> Self {
        Self { delay_ms: 0, ..self }
    }

    pub fn validate(&self) -> StoreResult<()> {
        for (name, attempts) in [
            ("put_attempts", self.put_attempts),
            ("get_attempts", self.get_attempts),
            ("presign_attempts", self.presign_attempts),
        ] {
            if attempts == 0 {
                return Err(StoreError::InvalidConfig(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            put_attempts: default_put_attempts(),
            get_attempts: default_get_attempts(),
            presign_attempts: default_presign_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_bucket_quota() -> String {
    DEFAULT_BUCKET_QUOTA.to_string()
}

fn default_put_attempts() -> u32 {
    3
}

fn default_get_attempts() -> u32 {
    1
}

fn default_presign_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl StorageConfig {
    /// Create a config with default policy for the given server and credentials
    pub fn new(
        host: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            secure: false,
            region: default_region(),
            timeout_secs: default_timeout_secs(),
            bucket_quota: default_bucket_quota(),
            retry: RetryPolicy::default(),
            log: LogConfig::default(),
        }
    }

    /// Load from `MINIO_HOST`, `MINIO_USER`, `MINIO_PASSWORD` and optionally `MINIO_SECURE`
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source; `from_env` uses the process environment
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StoreError::InvalidConfig(format!("{} is not set", name)))
        };

        let mut config = Self::new(
            required("MINIO_HOST")?,
            required("MINIO_USER")?,
            required("MINIO_PASSWORD")?,
        );

        if let Some(secure) = lookup("MINIO_SECURE") {
            config.secure = matches!(
                secure.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        if let Some(region) = lookup("MINIO_REGION").filter(|v| !v.is_empty()) {
            config.region = region;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| StoreError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.host.is_empty() {
            return Err(StoreError::InvalidConfig("host cannot be empty".to_string()));
        }
        if self.host.contains("://") {
            return Err(StoreError::InvalidConfig(format!(
                "host must not include a scheme: {}",
                self.host
            )));
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(StoreError::InvalidConfig(
                "Both access_key and secret_key must be provided".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(StoreError::InvalidConfig(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.bucket_quota.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "bucket_quota cannot be empty".to_string(),
            ));
        }
        self.retry.validate()
    }

    fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Object storage endpoint URL
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.host)
    }

    /// Base URL of the MinIO admin API, with trailing slash
    pub fn admin_endpoint(&self) -> String {
        format!("{}/minio/admin/v3/", self.endpoint_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("host", &self.host)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("timeout_secs", &self.timeout_secs)
            .field("bucket_quota", &self.bucket_quota)
            .field("retry", &self.retry)
            .field("log", &self.log)
            .finish()
    }
}

/// Validate an S3 bucket name
pub fn validate_bucket_name(name: &str) -> StoreResult<()> {
    if is_valid_bucket_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidBucketName(format!(
            "{}: bucket names must be 3-63 characters of lowercase letters, \
             numbers, hyphens and periods",
            name
        )))
    }
}

fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();

    if !(3..=63).contains(&bytes.len()) {
        return false;
    }

    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
        return false;
    }

    if !bytes
        .iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return false;
    }

    if name.contains("..") {
        return false;
    }

    // IP-address-shaped names are reserved
    if name.split('.').count() == 4 && name.split('.').all(|s| s.parse::<u8>().is_ok()) {
        return false;
    }

    !name.starts_with("xn--") && !name.ends_with("-s3alias")
}
