// argus-cli/src/lib.rs
// ============================================================================
// Module: Argus CLI Support
// Description: Shared bundle-loading, backend-construction, and
//   error-reporting helpers for the `argus-acquire` and `argus-determinism`
//   binaries.
// Purpose: Keep both binaries' main() functions thin by centralizing the
//   config/bundle-loading boilerplate they share.
// Dependencies: argus-config, argus-core, argus-http-client, argus-pipeline,
//   argus-store
// ============================================================================

//! ## Overview
//! A bundle directory on disk holds `bundle.manifest.json` plus the raw
//! artifact files it references. Loading one for the CLI means reading
//! every file named in the manifest into an [`argus_pipeline::acquire::BundleFile`],
//! in manifest order; the Acquire stage itself re-derives classification
//! and checksums from the bytes.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use argus_config::DocumentStoreConfig;
use argus_http_client::Credentials;
use argus_http_client::HttpDocumentStore;
use argus_http_client::HttpDocumentStoreConfig;
use argus_pipeline::acquire::BundleFile;
use argus_pipeline::manifest;

/// Errors surfaced by either CLI binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] argus_config::ConfigError),
    /// The pipeline itself returned an error.
    #[error(transparent)]
    Pipeline(#[from] argus_pipeline::error::PipelineError),
    /// The document store backend could not be constructed.
    #[error(transparent)]
    Store(#[from] argus_store::StoreError),
    /// An identifier built from CLI flags was invalid.
    #[error("invalid identifier: {0}")]
    Identifier(String),
    /// Reading the bundle directory from disk failed.
    #[error("bundle io error: {0}")]
    Io(String),
}

/// Builds an [`HttpDocumentStore`] from the loaded document-store config.
///
/// # Errors
///
/// Returns [`CliError::Store`] when the backend fails to construct, e.g. an
/// unparsable base URL.
pub fn build_document_store(config: &DocumentStoreConfig) -> Result<HttpDocumentStore, CliError> {
    let http_config = HttpDocumentStoreConfig {
        base_url: config.url.clone(),
        credentials: Credentials {
            api_key: config.api_key.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        },
        max_retries: config.max_retries,
        retry_backoff: Duration::from_millis(config.retry_backoff_ms),
    };
    Ok(HttpDocumentStore::new(http_config)?)
}

/// Reads a bundle directory: `bundle.manifest.json` plus the artifact files
/// it references, in manifest order.
///
/// # Errors
///
/// Returns [`CliError::Io`] when the manifest or an artifact file cannot be
/// read, and [`CliError::Pipeline`] when the manifest does not parse.
pub fn load_bundle_dir(dir: &Path) -> Result<(manifest::BundleManifest, Vec<BundleFile>), CliError> {
    let manifest_path = dir.join("bundle.manifest.json");
    let manifest_bytes =
        fs::read(&manifest_path).map_err(|err| CliError::Io(format!("{}: {err}", manifest_path.display())))?;
    let parsed = manifest::parse_manifest(&manifest_bytes)?;

    let mut files = Vec::with_capacity(parsed.artifacts.len());
    for artifact in &parsed.artifacts {
        let artifact_path: PathBuf = dir.join(&artifact.filename);
        let bytes =
            fs::read(&artifact_path).map_err(|err| CliError::Io(format!("{}: {err}", artifact_path.display())))?;
        files.push(BundleFile { filename: artifact.filename.clone(), bytes });
    }
    Ok((parsed, files))
}

/// Resolves the repo and build id from CLI flags, when the bundle manifest
/// did not already supply them.
///
/// # Errors
///
/// Returns [`CliError::Identifier`] when either value is empty.
pub fn resolve_ids(
    repo_flag: Option<&str>,
    build_id_flag: Option<&str>,
    manifest: &manifest::BundleManifest,
) -> Result<(argus_core::Repo, argus_core::BuildId), CliError> {
    let repo_value = repo_flag.unwrap_or(&manifest.repo);
    let build_id_value = build_id_flag.unwrap_or(&manifest.build_id);
    let repo = argus_core::Repo::new(repo_value).map_err(|err| CliError::Identifier(err.to_string()))?;
    let build_id = argus_core::BuildId::new(build_id_value).map_err(|err| CliError::Identifier(err.to_string()))?;
    Ok((repo, build_id))
}

/// Derives a run id by hashing the repo, build id, and start timestamp.
///
/// # Errors
///
/// Returns [`CliError::Identifier`] when the value fails to canonicalize,
/// which does not happen for the plain-string/integer fields used here.
pub fn derive_run_id(
    repo: &argus_core::Repo,
    build_id: &argus_core::BuildId,
    started_at: i64,
) -> Result<argus_core::RunId, CliError> {
    let digest = argus_core::hash(&serde_json::json!({
        "repo": repo.as_str(),
        "buildId": build_id.as_str(),
        "startedAt": started_at,
    }))
    .map_err(|err| CliError::Identifier(err.to_string()))?;
    argus_core::RunId::from_hash(digest).map_err(|err| CliError::Identifier(err.to_string()))
}
