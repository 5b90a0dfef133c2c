// argus-ingest/src/bundle.rs
// ============================================================================
// Module: Argus Bundle Recognition
// Description: Filesystem-path heuristics that classify a bundle artifact
//   before it reaches a parser.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Classification is filename-only: it never opens or sniffs the artifact's
//! contents. This keeps acquire's first pass over a bundle directory a pure
//! string operation, independent of I/O errors or partial reads.

/// Recognized bundle artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// SARIF static-analysis report.
    Sarif,
    /// Dependency lockfile.
    Lockfile,
    /// Software bill of materials.
    Sbom,
    /// Static threat-intel seed list (CVE/KEV/EPSS snapshot).
    ThreatIntelSeed,
    /// Anything else; still recorded as an [`argus_core::Artifact`] but never parsed.
    Other,
}

/// Classifies a bundle artifact by its path, using the filename heuristics
/// from the external interfaces specification:
///
/// - SARIF: extension `.sarif` or `.sarif.json`.
/// - Lockfile: basename `package-lock.json` or `yarn.lock`, or any path
///   segment containing `lock`.
/// - SBOM: path containing `sbom` or `cyclonedx`, extension `.cdx.json` or
///   `.spdx.json`.
/// - Threat-intel seed: path containing `threat-intel` or `threatintel`.
/// - Otherwise: [`ArtifactKind::Other`].
#[must_use]
pub fn classify_artifact(path: &str) -> ArtifactKind {
    let lower = path.to_ascii_lowercase();
    let basename = lower.rsplit('/').next().unwrap_or(&lower);

    if lower.ends_with(".sarif") || lower.ends_with(".sarif.json") {
        return ArtifactKind::Sarif;
    }
    if lower.ends_with(".cdx.json") || lower.ends_with(".spdx.json") || lower.contains("cyclonedx") || lower.contains("sbom") {
        return ArtifactKind::Sbom;
    }
    if lower.contains("threat-intel") || lower.contains("threatintel") {
        return ArtifactKind::ThreatIntelSeed;
    }
    if basename == "package-lock.json" || basename == "yarn.lock" || lower.contains("lock") {
        return ArtifactKind::Lockfile;
    }
    ArtifactKind::Other
}
