// argus-pipeline/src/manifest.rs
// ============================================================================
// Module: Bundle Manifest
// Description: Parses `bundle.manifest.json` and derives the bundle and run
//   identifiers from its sorted artifact list.
// Dependencies: argus-core, serde, serde_json
// ============================================================================

//! ## Overview
//! A bundle's identity is a hash over its artifacts, not over the manifest
//! file's own bytes, so re-serializing the manifest (sorted keys, trailing
//! newline) never changes the derived `bundleId`.

use serde::Deserialize;
use serde::Serialize;

use crate::error::PipelineError;

/// One artifact entry inside a bundle manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestArtifact {
    /// Pre-computed artifact identifier, when the manifest supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    /// Recognized artifact kind.
    pub artifact_type: String,
    /// Name of the tool that produced the artifact.
    pub tool: String,
    /// Filename within the bundle directory.
    pub filename: String,
    /// Object-store key, when the artifact is mirrored to object storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    /// SHA-256 checksum of the artifact's bytes.
    pub sha256: String,
    /// Size of the artifact's bytes.
    pub bytes: u64,
}

/// The parsed and canonicalized `bundle.manifest.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    /// Manifest schema version, currently always `"1.0"`.
    pub manifest_version: String,
    /// Content-derived bundle identifier.
    pub bundle_id: String,
    /// Repository the bundle covers.
    pub repo: String,
    /// Build identifier the bundle covers.
    pub build_id: String,
    /// Manifest creation timestamp, epoch-ms.
    pub created_at: i64,
    /// Artifacts, sorted by `sha256` ascending.
    pub artifacts: Vec<ManifestArtifact>,
}

/// A manifest as read from disk, before its `bundleId` has been verified or
/// derived.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    manifest_version: String,
    repo: String,
    build_id: String,
    created_at: i64,
    artifacts: Vec<ManifestArtifact>,
}

/// Parses `bytes` as a bundle manifest, sorts its artifacts by `sha256`
/// ascending, and derives `bundleId` from the canonical hash of the sorted
/// artifact list.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedManifest`] when `bytes` is not valid
/// JSON or is missing required fields.
pub fn parse_manifest(bytes: &[u8]) -> Result<BundleManifest, PipelineError> {
    let mut raw: RawManifest =
        serde_json::from_slice(bytes).map_err(|err| PipelineError::MalformedManifest(err.to_string()))?;
    raw.artifacts.sort_by(|a, b| a.sha256.cmp(&b.sha256));

    let bundle_id = derive_bundle_id(&raw.artifacts)?;

    Ok(BundleManifest {
        manifest_version: raw.manifest_version,
        bundle_id,
        repo: raw.repo,
        build_id: raw.build_id,
        created_at: raw.created_at,
        artifacts: raw.artifacts,
    })
}

/// Derives `bundleId = hash(sortedArtifacts)` over the `(filename, sha256)`
/// pairs of every artifact, sorted ascending by `sha256`.
fn derive_bundle_id(sorted_artifacts: &[ManifestArtifact]) -> Result<String, PipelineError> {
    let identity: Vec<serde_json::Value> = sorted_artifacts
        .iter()
        .map(|artifact| serde_json::json!({"filename": artifact.filename, "sha256": artifact.sha256}))
        .collect();
    argus_core::hash(&serde_json::Value::Array(identity)).map_err(|err| PipelineError::MalformedManifest(err.to_string()))
}

/// Serializes `manifest` back to stable bytes: sorted object keys, UTF-8,
/// trailing newline.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedManifest`] if serialization fails,
/// which does not happen for a manifest built by [`parse_manifest`].
pub fn serialize_manifest(manifest: &BundleManifest) -> Result<Vec<u8>, PipelineError> {
    let value = serde_json::to_value(manifest).map_err(|err| PipelineError::MalformedManifest(err.to_string()))?;
    let mut bytes =
        argus_core::canonical_json(&value).map_err(|err| PipelineError::MalformedManifest(err.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "manifestVersion": "1.0",
            "repo": "acme/widgets",
            "buildId": "b1",
            "createdAt": 0,
            "artifacts": [
                {"artifactType": "sarif", "tool": "semgrep", "filename": "scan.sarif", "sha256": "bbb", "bytes": 10},
                {"artifactType": "lockfile", "tool": "npm", "filename": "package-lock.json", "sha256": "aaa", "bytes": 20},
            ],
        }))
        .expect("valid json")
    }

    #[test]
    fn artifacts_are_sorted_by_sha256_ascending() {
        let manifest = parse_manifest(&sample_bytes()).expect("parses");
        assert_eq!(manifest.artifacts[0].sha256, "aaa");
        assert_eq!(manifest.artifacts[1].sha256, "bbb");
    }

    #[test]
    fn bundle_id_is_independent_of_input_artifact_order() {
        let a = parse_manifest(&sample_bytes()).expect("parses");

        let mut reordered = serde_json::from_slice::<serde_json::Value>(&sample_bytes()).expect("valid json");
        let arr = reordered.get_mut("artifacts").expect("has artifacts").as_array_mut().expect("is array");
        arr.reverse();
        let b = parse_manifest(&serde_json::to_vec(&reordered).expect("serializes")).expect("parses");

        assert_eq!(a.bundle_id, b.bundle_id);
    }

    #[test]
    fn serialized_manifest_ends_with_a_trailing_newline() {
        let manifest = parse_manifest(&sample_bytes()).expect("parses");
        let bytes = serialize_manifest(&manifest).expect("serializes");
        assert_eq!(*bytes.last().expect("non-empty"), b'\n');
    }

    #[test]
    fn malformed_manifest_is_rejected() {
        assert!(parse_manifest(b"not json").is_err());
    }
}
