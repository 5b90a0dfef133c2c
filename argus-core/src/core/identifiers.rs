// argus-core/src/core/identifiers.rs
// ============================================================================
// Module: Argus Identifiers
// Description: Opaque, validated newtype wrappers for every stable entity
//   identifier in the data model, plus the typed ID constructors that derive
//   them from an entity's defining fields.
// Purpose: Make it impossible to pass a `Repo` where a `FindingId` is
//   expected, and to assemble an ID from the wrong field set.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every entity identifier in the data model is a SHA-256 hex digest over a
//! canonical JSON object built from the entity's defining fields (see
//! `SPEC_FULL.md` §3), with the single exception of [`IntelId`], which is
//! derived directly from the CVE identifier rather than hashed, and
//! [`Repo`]/[`BuildId`], which are caller-supplied labels rather than
//! content-addressed identifiers.

use serde::Deserialize;
use serde::Serialize;

use crate::core::error::IdentifierError;
use crate::core::hashing::hash_fields;

/// Declares a `#[serde(transparent)]` newtype wrapping a validated,
/// hash-shaped (64 lowercase hex character) string identifier.
macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an already-computed hash string, validating its shape.
            ///
            /// # Errors
            ///
            /// Returns [`IdentifierError::InvalidShape`] when `value` is not
            /// 64 lowercase hex characters.
            pub fn from_hash(value: impl Into<String>) -> Result<Self, IdentifierError> {
                let value = value.into();
                if value.len() != 64 || !value.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
                    return Err(IdentifierError::InvalidShape {
                        field: stringify!($name),
                        value,
                    });
                }
                Ok(Self(value))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

hash_id!(
    /// Stable identifier for an ingested bundle artifact.
    ArtifactId
);
hash_id!(
    /// Stable identifier for a normalized finding.
    FindingId
);
hash_id!(
    /// Stable identifier for a dependency-graph edge.
    DependencyId
);
hash_id!(
    /// Stable identifier for an SBOM component.
    ComponentId
);
hash_id!(
    /// Stable identifier for a reachability analysis result.
    ReachabilityId
);
hash_id!(
    /// Stable identifier for a run, equal to the bundle's content hash
    /// unless the caller supplies an explicit run identifier.
    RunId
);
hash_id!(
    /// Stable identifier for a single task-log entry within a run.
    TaskId
);
hash_id!(
    /// Stable identifier for a dry-run action, equal to its idempotency key.
    ActionId
);

/// Caller-supplied repository label. Not content-addressed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Repo(String);

impl Repo {
    /// Wraps a repository label, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] when `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdentifierError::Empty { field: "repo" });
        }
        Ok(Self(value))
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied build identifier label. Not content-addressed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(String);

impl BuildId {
    /// Wraps a build identifier label, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] when `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdentifierError::Empty { field: "buildId" });
        }
        Ok(Self(value))
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Threat-intel identifier, required to equal the uppercased CVE string it
/// describes (shape `CVE-YYYY-NNNN` with four or more sequence digits).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntelId(String);

impl IntelId {
    /// Builds an `IntelId` from a raw CVE string, uppercasing it and
    /// validating the `CVE-YYYY-NNNN(+)` shape.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidShape`] when `cve` does not match
    /// the required shape after uppercasing.
    pub fn from_cve(cve: &str) -> Result<Self, IdentifierError> {
        let upper = cve.to_ascii_uppercase();
        if !is_valid_cve_shape(&upper) {
            return Err(IdentifierError::InvalidShape {
                field: "intelId",
                value: upper,
            });
        }
        Ok(Self(upper))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IntelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates the `^CVE-\d{4}-\d{4,}$` shape without pulling in a regex
/// dependency for a single fixed pattern.
fn is_valid_cve_shape(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("CVE-") else {
        return false;
    };
    let Some((year, sequence)) = rest.split_once('-') else {
        return false;
    };
    year.len() == 4
        && year.bytes().all(|b| b.is_ascii_digit())
        && sequence.len() >= 4
        && sequence.bytes().all(|b| b.is_ascii_digit())
}

/// Computes `findingId = hash({repo, buildId, fingerprint})`.
///
/// # Errors
///
/// Returns [`crate::core::error::HashError`] (wrapped) if canonicalization
/// fails; in practice this only happens for non-finite floats, which never
/// occur in these string-only defining fields.
pub fn finding_id(repo: &Repo, build_id: &BuildId, fingerprint: &str) -> FindingId {
    let digest = hash_fields(serde_json::json!({
        "repo": repo.as_str(),
        "buildId": build_id.as_str(),
        "fingerprint": fingerprint,
    }))
    .unwrap_or_else(|_| unreachable!("string-only fields always canonicalize"));
    FindingId::from_hash(digest).unwrap_or_else(|_| unreachable!("sha256 hex is always valid shape"))
}

/// Computes `dependencyId = hash({repo, buildId, parent, child, version, scope})`.
#[must_use]
pub fn dependency_id(
    repo: &Repo,
    build_id: &BuildId,
    parent: &str,
    child: &str,
    version: &str,
    scope: &str,
) -> DependencyId {
    let digest = hash_fields(serde_json::json!({
        "repo": repo.as_str(),
        "buildId": build_id.as_str(),
        "parent": parent,
        "child": child,
        "version": version,
        "scope": scope,
    }))
    .unwrap_or_else(|_| unreachable!("string-only fields always canonicalize"));
    DependencyId::from_hash(digest).unwrap_or_else(|_| unreachable!("sha256 hex is always valid shape"))
}

/// Computes `artifactId = hash({repo, buildId, runId, filename, checksum})`.
#[must_use]
pub fn artifact_id(
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    filename: &str,
    checksum: &str,
) -> ArtifactId {
    let digest = hash_fields(serde_json::json!({
        "repo": repo.as_str(),
        "buildId": build_id.as_str(),
        "runId": run_id.as_str(),
        "filename": filename,
        "checksum": checksum,
    }))
    .unwrap_or_else(|_| unreachable!("string-only fields always canonicalize"));
    ArtifactId::from_hash(digest).unwrap_or_else(|_| unreachable!("sha256 hex is always valid shape"))
}

/// Computes `componentId = hash({repo, buildId, name, version})`.
#[must_use]
pub fn component_id(repo: &Repo, build_id: &BuildId, name: &str, version: &str) -> ComponentId {
    let digest = hash_fields(serde_json::json!({
        "repo": repo.as_str(),
        "buildId": build_id.as_str(),
        "name": name,
        "version": version,
    }))
    .unwrap_or_else(|_| unreachable!("string-only fields always canonicalize"));
    ComponentId::from_hash(digest).unwrap_or_else(|_| unreachable!("sha256 hex is always valid shape"))
}

/// Computes `reachabilityId = hash({findingId, analysisVersion, path})`,
/// where `path` is the lexicographically-chosen witness path's component
/// names. `analysisVersion` is part of identity, per the data model.
#[must_use]
pub fn reachability_id(
    finding_id: &FindingId,
    analysis_version: &str,
    path: &[String],
) -> ReachabilityId {
    let digest = hash_fields(serde_json::json!({
        "findingId": finding_id.as_str(),
        "analysisVersion": analysis_version,
        "path": path,
    }))
    .unwrap_or_else(|_| unreachable!("string-only fields always canonicalize"));
    ReachabilityId::from_hash(digest).unwrap_or_else(|_| unreachable!("sha256 hex is always valid shape"))
}

/// Computes `taskId = hash({runId, stage, taskKey})`.
#[must_use]
pub fn task_id(run_id: &RunId, stage: &str, task_key: &str) -> TaskId {
    let digest = hash_fields(serde_json::json!({
        "runId": run_id.as_str(),
        "stage": stage,
        "taskKey": task_key,
    }))
    .unwrap_or_else(|_| unreachable!("string-only fields always canonicalize"));
    TaskId::from_hash(digest).unwrap_or_else(|_| unreachable!("sha256 hex is always valid shape"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_id_is_stable_and_ignores_extraneous_input() {
        let repo = Repo::new("acme/widgets").expect("valid repo");
        let build = BuildId::new("build-1").expect("valid build");
        let a = finding_id(&repo, &build, "fp-1");
        let b = finding_id(&repo, &build, "fp-1");
        assert_eq!(a, b);
        let c = finding_id(&repo, &build, "fp-2");
        assert_ne!(a, c);
    }

    #[test]
    fn intel_id_uppercases_and_validates() {
        let id = IntelId::from_cve("cve-2024-12345").expect("valid cve");
        assert_eq!(id.as_str(), "CVE-2024-12345");
        assert!(IntelId::from_cve("CVE-24-1").is_err());
        assert!(IntelId::from_cve("NOT-A-CVE").is_err());
    }

    #[test]
    fn repo_rejects_empty_string() {
        assert!(Repo::new("").is_err());
        assert!(Repo::new("ok").is_ok());
    }
}
