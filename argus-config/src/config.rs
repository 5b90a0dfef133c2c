// argus-config/src/config.rs
// ============================================================================
// Module: Argus Runtime Configuration
// Description: Configuration loading and validation for the Argus pipeline.
// Purpose: Provide strict, fail-closed config parsing with hard limits and
//   environment-variable overrides for document-store credentials.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path
//! limits. Missing or invalid configuration fails closed: a pipeline that
//! cannot resolve a well-formed, validated config does not run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "argus.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "ARGUS_CONFIG";
/// Environment variable used to override the document-store URL.
pub(crate) const ES_URL_ENV_VAR: &str = "ES_URL";
/// Environment variable used to override the document-store API key.
pub(crate) const ES_API_KEY_ENV_VAR: &str = "ES_API_KEY";
/// Environment variable used to override the document-store username.
pub(crate) const ES_USERNAME_ENV_VAR: &str = "ES_USERNAME";
/// Environment variable used to override the document-store password.
pub(crate) const ES_PASSWORD_ENV_VAR: &str = "ES_PASSWORD";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum allowed bulk chunk size.
pub(crate) const MIN_BULK_CHUNK_SIZE: usize = 1;
/// Maximum allowed bulk chunk size.
pub(crate) const MAX_BULK_CHUNK_SIZE: usize = 10_000;
/// Maximum allowed bulk retry attempts.
pub(crate) const MAX_BULK_MAX_RETRIES: u32 = 20;
/// Maximum allowed retry backoff in milliseconds.
pub(crate) const MAX_RETRY_BACKOFF_MS: u64 = 60_000;
/// Default top-N ranked findings carried into the Act stage.
const DEFAULT_TOP_N: usize = 50;
/// Maximum allowed top-N value.
pub(crate) const MAX_TOP_N: usize = 10_000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Top-level Argus pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgusConfig {
    /// Document-store connection and bulk-client tuning.
    #[serde(default)]
    pub document_store: DocumentStoreConfig,
    /// Optional object-store configuration for raw bundle artifacts.
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
    /// Pipeline run defaults.
    #[serde(default)]
    pub run: RunConfig,
}

impl ArgusConfig {
    /// Loads configuration from disk using the default resolution rules,
    /// then applies environment-variable overrides and validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading, parsing, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies `ES_URL`/`ES_API_KEY`/`ES_USERNAME`/`ES_PASSWORD` overrides
    /// on top of whatever the config file declared. Environment variables
    /// always win, matching the deploy-time secret injection model.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(ES_URL_ENV_VAR) {
            self.document_store.url = url;
        }
        if let Ok(api_key) = env::var(ES_API_KEY_ENV_VAR) {
            self.document_store.api_key = Some(api_key);
        }
        if let Ok(username) = env::var(ES_USERNAME_ENV_VAR) {
            self.document_store.username = Some(username);
        }
        if let Ok(password) = env::var(ES_PASSWORD_ENV_VAR) {
            self.document_store.password = Some(password);
        }
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.document_store.validate()?;
        if let Some(object_store) = &self.object_store {
            object_store.validate()?;
        }
        self.run.validate()?;
        Ok(())
    }
}

/// Document-store connection and bulk-client tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentStoreConfig {
    /// Base URL of the document store, with no trailing slash.
    #[serde(default = "default_document_store_url")]
    pub url: String,
    /// API key sent as `Authorization: ApiKey <value>`, when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Basic-auth username, used only when `api_key` is unset.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password, used only when `api_key` is unset.
    #[serde(default)]
    pub password: Option<String>,
    /// Maximum number of retry attempts per bulk chunk.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between retries, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Number of documents per NDJSON bulk chunk.
    #[serde(default = "default_bulk_chunk_size")]
    pub bulk_chunk_size: usize,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            url: default_document_store_url(),
            api_key: None,
            username: None,
            password: None,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            bulk_chunk_size: default_bulk_chunk_size(),
        }
    }
}

impl DocumentStoreConfig {
    /// Validates document-store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document-store settings are
    /// invalid.
    fn validate(&self) -> Result<(), ConfigError> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid("document_store.url must be set".to_string()));
        }
        if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
            return Err(ConfigError::Invalid(
                "document_store.url must include http:// or https://".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::Invalid(
                "document_store.username and document_store.password must be set together"
                    .to_string(),
            ));
        }
        if self.max_retries > MAX_BULK_MAX_RETRIES {
            return Err(ConfigError::Invalid("document_store.max_retries too large".to_string()));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid(
                "document_store.retry_backoff_ms too large".to_string(),
            ));
        }
        if self.bulk_chunk_size < MIN_BULK_CHUNK_SIZE || self.bulk_chunk_size > MAX_BULK_CHUNK_SIZE
        {
            return Err(ConfigError::Invalid(
                "document_store.bulk_chunk_size out of range".to_string(),
            ));
        }
        Ok(())
    }
}

/// Supported object-store providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreProvider {
    /// Amazon S3 compatible object storage.
    S3,
}

/// Object-store configuration for raw bundle artifacts and manifests.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// Provider selection for the object store.
    pub provider: ObjectStoreProvider,
    /// Bucket name for bundle storage.
    pub bucket: String,
    /// Optional region (S3-only, defaults to environment).
    #[serde(default)]
    pub region: Option<String>,
    /// Optional object-store endpoint (S3-compatible).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Optional key prefix inside the bucket.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Force path-style addressing (S3-compatible).
    #[serde(default)]
    pub force_path_style: bool,
    /// Allow non-TLS endpoints (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
}

impl ObjectStoreConfig {
    /// Validates object-store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when object-store settings are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("object_store.bucket must be set".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            let trimmed = endpoint.trim();
            if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
                return Err(ConfigError::Invalid(
                    "object_store.endpoint must include http:// or https://".to_string(),
                ));
            }
            if trimmed.starts_with("http://") && !self.allow_http {
                return Err(ConfigError::Invalid(
                    "object_store.endpoint uses http:// without allow_http".to_string(),
                ));
            }
        }
        if let Some(prefix) = &self.prefix {
            validate_object_store_prefix(prefix)?;
        }
        Ok(())
    }
}

/// Pipeline run defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Number of top-ranked findings carried into the Act stage.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Run Act in dry-run mode by default.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { top_n: default_top_n(), dry_run: default_dry_run() }
    }
}

impl RunConfig {
    /// Validates run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when run defaults are invalid.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 || self.top_n > MAX_TOP_N {
            return Err(ConfigError::Invalid("run.top_n out of range".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

fn default_document_store_url() -> String {
    "http://localhost:9200".to_string()
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    100
}

const fn default_bulk_chunk_size() -> usize {
    500
}

const fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

const fn default_dry_run() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates the object-store prefix string against traversal and length
/// limits.
fn validate_object_store_prefix(value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid("object_store.prefix must be non-empty".to_string()));
    }
    if trimmed.contains('\\') {
        return Err(ConfigError::Invalid(
            "object_store.prefix must not contain backslashes".to_string(),
        ));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("object_store.prefix exceeds max length".to_string()));
    }
    if trimmed.starts_with('/') {
        return Err(ConfigError::Invalid("object_store.prefix must be relative".to_string()));
    }
    let normalized = trimmed.strip_suffix('/').unwrap_or(trimmed);
    for segment in normalized.split('/') {
        if segment.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("object_store.prefix segment too long".to_string()));
        }
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(ConfigError::Invalid("object_store.prefix segment invalid".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn load_applies_defaults_for_an_empty_file() {
        let file = write_config("");
        let config = ArgusConfig::load(Some(file.path())).expect("loads");
        assert_eq!(config.document_store.url, "http://localhost:9200");
        assert_eq!(config.document_store.bulk_chunk_size, 500);
        assert_eq!(config.run.top_n, DEFAULT_TOP_N);
        assert!(config.run.dry_run);
    }

    #[test]
    fn load_rejects_a_url_without_a_scheme() {
        let file = write_config("[document_store]\nurl = \"localhost:9200\"\n");
        let err = ArgusConfig::load(Some(file.path())).expect_err("rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_rejects_username_without_password() {
        let file = write_config("[document_store]\nurl = \"http://es:9200\"\nusername = \"elastic\"\n");
        let err = ArgusConfig::load(Some(file.path())).expect_err("rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    #[allow(unsafe_code, reason = "env::set_var/remove_var require unsafe in this edition")]
    fn env_overrides_take_precedence_over_the_file() {
        let file = write_config("[document_store]\nurl = \"http://from-file:9200\"\n");
        // SAFETY: tests run single-threaded per process here; no other test
        // reads this variable concurrently.
        unsafe {
            env::set_var(ES_URL_ENV_VAR, "http://from-env:9200");
        }
        let config = ArgusConfig::load(Some(file.path())).expect("loads");
        unsafe {
            env::remove_var(ES_URL_ENV_VAR);
        }
        assert_eq!(config.document_store.url, "http://from-env:9200");
    }

    #[test]
    fn object_store_prefix_rejects_parent_traversal() {
        let object_store = ObjectStoreConfig {
            provider: ObjectStoreProvider::S3,
            bucket: "argus-bundles".to_string(),
            region: None,
            endpoint: None,
            prefix: Some("bundles/../escape".to_string()),
            force_path_style: false,
            allow_http: false,
        };
        let err = object_store.validate().expect_err("rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn object_store_accepts_a_relative_prefix() {
        let object_store = ObjectStoreConfig {
            provider: ObjectStoreProvider::S3,
            bucket: "argus-bundles".to_string(),
            region: None,
            endpoint: None,
            prefix: Some("bundles/prod".to_string()),
            force_path_style: false,
            allow_http: false,
        };
        object_store.validate().expect("accepted");
    }

    #[test]
    fn run_config_rejects_zero_top_n() {
        let run = RunConfig { top_n: 0, dry_run: true };
        let err = run.validate().expect_err("rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn file_exceeding_size_limit_is_rejected() {
        let file = write_config(&"# padding\n".repeat(200_000));
        let err = ArgusConfig::load(Some(file.path())).expect_err("rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
