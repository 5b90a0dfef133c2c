// argus-objectstore/src/lib.rs
// ============================================================================
// Module: Bundle Object Storage
// Description: Object-store artifact sink/reader for raw bundle files and
//   manifests.
// Purpose: Persist bundle artifacts in durable object storage with strict
//   key validation, independent of the document store the pipeline writes
//   normalized findings to.
// Dependencies: argus-config, argus-core, aws-config, aws-sdk-s3, tokio
// ============================================================================

//! ## Overview
//! A bundle is a set of raw scanner output files (SARIF, lockfiles, SBOMs)
//! plus a manifest describing them (see `argus-pipeline::manifest`). This
//! crate persists those raw bytes in S3-compatible object storage, keyed by
//! repo and build id, so the Acquire stage can replay a bundle without
//! re-uploading it. Object keys are
//! `{prefix}/{repo}/{buildId}/artifacts/{filename}` for artifacts and
//! `{prefix}/{repo}/{buildId}/bundle.manifest.json` for the manifest.
//! Storage is untrusted: all keys and payload sizes are validated before
//! crossing the wire in either direction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::path::Component;
use std::path::Path;
use std::sync::Arc;

use argus_config::ObjectStoreConfig;
use argus_config::ObjectStoreProvider;
use argus_core::BuildId;
use argus_core::Repo;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest object name within a bundle's key prefix.
pub const MANIFEST_OBJECT_NAME: &str = "bundle.manifest.json";
/// Maximum length of a single key segment.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total key length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum size of a single bundle artifact, 64 MiB.
pub const MAX_ARTIFACT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Object-store errors for bundle storage.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// Invalid configuration or key input.
    #[error("object store invalid: {0}")]
    Invalid(String),
    /// Backend I/O failure.
    #[error("object store io error: {0}")]
    Io(String),
    /// Backend returned an error.
    #[error("object store backend error: {0}")]
    Backend(String),
    /// Object exceeds size limits.
    #[error("object too large: {key} ({actual_bytes} > {max_bytes})")]
    TooLarge {
        /// Object key.
        key: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Blocks on an object-store future using a compatible runtime, handling
/// the case where the caller is already inside a tokio runtime.
fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, ObjectStoreError>
where
    F: Future<Output = Result<T, ObjectStoreError>> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return tokio::task::block_in_place(|| handle.block_on(future));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = Runtime::new()
                .map_err(|err| ObjectStoreError::Io(err.to_string()))
                .and_then(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx
            .recv()
            .unwrap_or_else(|_| Err(ObjectStoreError::Io("object store thread join failed".to_string())));
    }
    runtime.block_on(future)
}

// ============================================================================
// SECTION: Object Store Client
// ============================================================================

/// Minimal object-store client abstraction, implemented by the S3 backend
/// and by an in-memory double for tests.
pub trait ObjectStoreClient: Send + Sync {
    /// Writes a single object to storage.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;
    /// Reads a single object from storage with a size limit.
    fn get(&self, key: &str, max_bytes: usize) -> Result<Vec<u8>, ObjectStoreError>;
}

/// S3-backed object-store client.
struct S3ObjectStoreClient {
    client: Client,
    bucket: String,
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3ObjectStoreClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3ObjectStoreClient {
    /// Builds a new S3-backed object store client from validated config.
    fn new(config: &ObjectStoreConfig) -> Result<Self, ObjectStoreError> {
        let runtime = Runtime::new().map_err(|err| ObjectStoreError::Io(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let shared_config = block_on_with_runtime(&runtime, async move {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(Region::new(region));
            }
            if let Some(endpoint) = endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            Ok(loader.load().await)
        })?;
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        Ok(Self { client, bucket: config.bucket.clone(), runtime: Some(Arc::new(runtime)) })
    }

    fn runtime(&self) -> Result<&Runtime, ObjectStoreError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| ObjectStoreError::Io("object store runtime closed".to_string()))
    }
}

impl ObjectStoreClient for S3ObjectStoreClient {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(bytes))
                .content_type("application/json")
                .send()
                .await
                .map_err(|err| ObjectStoreError::Backend(err.to_string()))?;
            Ok(())
        })
    }

    fn get(&self, key: &str, max_bytes: usize) -> Result<Vec<u8>, ObjectStoreError> {
        let bucket = self.bucket.clone();
        let key = key.to_string();
        let client = self.client.clone();
        block_on_with_runtime(self.runtime()?, async move {
            let output = client
                .get_object()
                .bucket(bucket)
                .key(key.clone())
                .send()
                .await
                .map_err(|err| ObjectStoreError::Backend(err.to_string()))?;
            if let Some(length) = output.content_length() {
                let actual_bytes = usize::try_from(length).unwrap_or(usize::MAX);
                if actual_bytes > max_bytes {
                    return Err(ObjectStoreError::TooLarge { key: key.clone(), max_bytes, actual_bytes });
                }
            }
            let mut reader = output.body.into_async_read();
            let mut buffer = Vec::new();
            let mut total_bytes = 0usize;
            let mut chunk = [0u8; 8192];
            loop {
                let read =
                    reader.read(&mut chunk).await.map_err(|err| ObjectStoreError::Io(err.to_string()))?;
                if read == 0 {
                    break;
                }
                total_bytes = total_bytes
                    .checked_add(read)
                    .ok_or_else(|| ObjectStoreError::Io("object size overflow".to_string()))?;
                if total_bytes > max_bytes {
                    return Err(ObjectStoreError::TooLarge { key: key.clone(), max_bytes, actual_bytes: total_bytes });
                }
                buffer.extend_from_slice(&chunk[.. read]);
            }
            Ok(buffer)
        })
    }
}

// ============================================================================
// SECTION: Bundle Object Store
// ============================================================================

/// Object-store backend for bundle artifacts and manifests.
pub struct BundleObjectStore {
    client: Arc<dyn ObjectStoreClient>,
    root_prefix: String,
}

impl BundleObjectStore {
    /// Creates a backend from object-store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the provider is unreachable or the
    /// prefix is invalid.
    pub fn new(config: &ObjectStoreConfig) -> Result<Self, ObjectStoreError> {
        let root_prefix = normalize_prefix(config.prefix.as_deref().unwrap_or(""))?;
        let client = match config.provider {
            ObjectStoreProvider::S3 => Arc::new(S3ObjectStoreClient::new(config)?) as Arc<_>,
        };
        Ok(Self { client, root_prefix })
    }

    /// Creates a backend from a custom object-store client (tests only).
    pub fn from_client(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self { client, root_prefix: String::new() }
    }

    /// Writes a single bundle artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the filename is invalid, the
    /// payload exceeds [`MAX_ARTIFACT_BYTES`], or the backend write fails.
    pub fn put_artifact(
        &self,
        repo: &Repo,
        build_id: &BuildId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ObjectStoreError> {
        if bytes.len() > MAX_ARTIFACT_BYTES {
            return Err(ObjectStoreError::TooLarge {
                key: filename.to_string(),
                max_bytes: MAX_ARTIFACT_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let key = self.artifact_key(repo, build_id, filename)?;
        self.client.put(&key, bytes)?;
        Ok(key)
    }

    /// Reads a single bundle artifact with a size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the filename is invalid, the
    /// object exceeds `max_bytes`, or the backend read fails.
    pub fn get_artifact(
        &self,
        repo: &Repo,
        build_id: &BuildId,
        filename: &str,
        max_bytes: usize,
    ) -> Result<Vec<u8>, ObjectStoreError> {
        let key = self.artifact_key(repo, build_id, filename)?;
        self.client.get(&key, max_bytes)
    }

    /// Writes the bundle manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the payload exceeds
    /// [`MAX_ARTIFACT_BYTES`] or the backend write fails.
    pub fn put_manifest(&self, repo: &Repo, build_id: &BuildId, bytes: Vec<u8>) -> Result<String, ObjectStoreError> {
        if bytes.len() > MAX_ARTIFACT_BYTES {
            return Err(ObjectStoreError::TooLarge {
                key: MANIFEST_OBJECT_NAME.to_string(),
                max_bytes: MAX_ARTIFACT_BYTES,
                actual_bytes: bytes.len(),
            });
        }
        let key = self.manifest_key(repo, build_id);
        self.client.put(&key, bytes)?;
        Ok(key)
    }

    /// Reads the bundle manifest with a size limit.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the object exceeds `max_bytes` or
    /// the backend read fails.
    pub fn get_manifest(&self, repo: &Repo, build_id: &BuildId, max_bytes: usize) -> Result<Vec<u8>, ObjectStoreError> {
        let key = self.manifest_key(repo, build_id);
        self.client.get(&key, max_bytes)
    }

    /// Returns the object key for a bundle artifact.
    fn artifact_key(&self, repo: &Repo, build_id: &BuildId, filename: &str) -> Result<String, ObjectStoreError> {
        validate_segment(filename)?;
        let key = format!("{}{}/{}/artifacts/{}", self.root_prefix, repo, build_id, filename);
        if key.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ObjectStoreError::Invalid("object key exceeds length limit".to_string()));
        }
        Ok(key)
    }

    /// Returns the object key for a bundle manifest.
    fn manifest_key(&self, repo: &Repo, build_id: &BuildId) -> String {
        format!("{}{}/{}/{}", self.root_prefix, repo, build_id, MANIFEST_OBJECT_NAME)
    }
}

// ============================================================================
// SECTION: Key Validation Helpers
// ============================================================================

/// Normalizes a root prefix string for object storage.
fn normalize_prefix(raw: &str) -> Result<String, ObjectStoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.starts_with('/') {
        return Err(ObjectStoreError::Invalid("prefix must be relative (no leading slash)".to_string()));
    }
    let normalized = trimmed.strip_suffix('/').unwrap_or(trimmed);
    for component in Path::new(normalized).components() {
        match component {
            Component::Normal(value) => validate_segment(&value.to_string_lossy())?,
            _ => {
                return Err(ObjectStoreError::Invalid("prefix must be relative without traversal".to_string()));
            }
        }
    }
    Ok(format!("{normalized}/"))
}

/// Validates a single path segment (filename or prefix component).
fn validate_segment(value: &str) -> Result<(), ObjectStoreError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(ObjectStoreError::Invalid("segment is invalid".to_string()));
    }
    if value.len() > MAX_PATH_COMPONENT_LENGTH {
        return Err(ObjectStoreError::Invalid("segment exceeds length limit".to_string()));
    }
    if value.contains(['/', '\\']) {
        return Err(ObjectStoreError::Invalid("segment contains invalid characters".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
