// argus-core/src/core/model.rs
// ============================================================================
// Module: Argus Data Model
// Description: Entity structs for every document kind the pipeline writes.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! These structs are the typed layer above the `serde_json::Value` documents
//! that actually cross the document-store wire boundary (see
//! `argus-store`/`argus-http-client`). Field names use `camelCase` to match
//! the wire shape the mapping contracts in [`crate::core::mapping`] describe.

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::BuildId;
use crate::core::identifiers::ComponentId;
use crate::core::identifiers::DependencyId;
use crate::core::identifiers::FindingId;
use crate::core::identifiers::IntelId;
use crate::core::identifiers::ReachabilityId;
use crate::core::identifiers::Repo;
use crate::core::identifiers::RunId;
use crate::core::identifiers::TaskId;

/// A single bundle artifact (scanner output file) recorded for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Stable identifier, `hash({repo, buildId, runId, filename, checksum})`.
    pub artifact_id: ArtifactId,
    /// Repository the artifact belongs to.
    pub repo: Repo,
    /// Build identifier the artifact belongs to.
    pub build_id: BuildId,
    /// Run this artifact was ingested under.
    pub run_id: RunId,
    /// Recognized artifact kind (`sarif`, `lockfile`, `sbom`, or `other`).
    pub artifact_type: String,
    /// Original filename within the bundle.
    pub filename: String,
    /// SHA-256 checksum of the artifact's bytes.
    pub checksum: String,
    /// Epoch-millisecond ingestion timestamp.
    pub created_at: i64,
}

/// A normalized finding extracted from a SARIF artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Stable identifier, `hash({repo, buildId, fingerprint})`.
    pub finding_id: FindingId,
    /// Repository the finding belongs to.
    pub repo: Repo,
    /// Build identifier the finding belongs to.
    pub build_id: BuildId,
    /// Run this finding was ingested under.
    pub run_id: RunId,
    /// Scanner rule identifier.
    pub rule_id: String,
    /// Scanner-reported severity string.
    pub severity: String,
    /// CVE identifiers associated with this finding, sorted and deduplicated.
    pub cves: Vec<String>,
    /// First of `cves`, if any, surfaced separately since most consumers
    /// only ever use the primary CVE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cve: Option<String>,
    /// Affected package name, if applicable.
    pub package: Option<String>,
    /// Affected package version, if applicable.
    pub version: Option<String>,
    /// Source file path reported by the scanner.
    pub file_path: Option<String>,
    /// Source line number reported by the scanner.
    pub line_number: Option<u32>,
    /// Name of the scanning tool that produced this finding.
    pub tool: String,
    /// Stable fingerprint the finding identity is derived from.
    pub fingerprint: String,
    /// Epoch-millisecond ingestion timestamp. Excluded from identity.
    pub created_at: i64,
    /// Attached after the enrich stage: the winning reachability record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachability_id: Option<ReachabilityId>,
    /// Attached after the score stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<i64>,
}

/// A dependency-graph edge between a parent and a child package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    /// Stable identifier, `hash({repo, buildId, parent, child, version, scope})`.
    pub dependency_id: DependencyId,
    /// Repository the edge belongs to.
    pub repo: Repo,
    /// Build identifier the edge belongs to.
    pub build_id: BuildId,
    /// Run this edge was ingested under.
    pub run_id: RunId,
    /// Parent package name, or the literal `__root__` for the application entry.
    pub parent: String,
    /// Child package name.
    pub child: String,
    /// Resolved version of the child package.
    pub version: String,
    /// Dependency scope (`runtime`, `dev`, `peer`, ...).
    pub scope: String,
}

/// Virtual root node name used as the dependency graph's single entry point.
pub const ROOT_PACKAGE: &str = "__root__";

/// A single SBOM-reported software component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SbomComponent {
    /// Stable identifier, `hash({repo, buildId, name, version})`.
    pub component_id: ComponentId,
    /// Repository the component belongs to.
    pub repo: Repo,
    /// Build identifier the component belongs to.
    pub build_id: BuildId,
    /// Run this component was ingested under.
    pub run_id: RunId,
    /// Package URL, when the SBOM provides one.
    pub purl: Option<String>,
    /// Component name.
    pub name: String,
    /// Component version.
    pub version: String,
}

/// Coarse outcome of a reachability analysis, independent of the numeric
/// confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReachabilityStatus {
    /// A path from the root to the affected package was found.
    Reachable,
    /// No path was found, or the graph held too little information to
    /// decide either way.
    InsufficientData,
}

/// Result of reachability analysis for a single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reachability {
    /// Stable identifier, `hash({findingId, analysisVersion, path})`.
    pub reachability_id: ReachabilityId,
    /// The finding this analysis applies to.
    pub finding_id: FindingId,
    /// Run this analysis was computed under.
    pub run_id: RunId,
    /// Version tag of the analysis algorithm, part of identity.
    pub analysis_version: String,
    /// Whether a path from the root to the affected package was found.
    pub reachable: bool,
    /// Coarse outcome, redundant with `reachable` but carried on the wire so
    /// consumers never need to re-derive it.
    pub status: ReachabilityStatus,
    /// Human-readable explanation, present when `status` is
    /// `INSUFFICIENT_DATA`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Lexicographically-smallest witness path of package names, root first.
    pub evidence_path: Vec<String>,
    /// Confidence score in `[0.0, 1.0]` derived from path properties.
    pub confidence_score: f64,
    /// Name of the algorithm that produced this record.
    pub method: String,
    /// Epoch-millisecond computation timestamp, from a deterministic seed.
    pub computed_at: i64,
}

/// A threat-intelligence record for a single CVE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatIntel {
    /// Stable identifier, equal to the uppercased CVE string.
    pub intel_id: IntelId,
    /// Whether CISA's Known Exploited Vulnerabilities catalog lists this CVE.
    pub kev: bool,
    /// EPSS exploitation-probability score in `[0.0, 1.0]`, if known.
    pub epss: Option<f64>,
    /// CVSS base severity label, if known.
    pub severity: Option<String>,
}

/// Lifecycle status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// The run is currently executing.
    Running,
    /// The run completed all stages successfully.
    Succeeded,
    /// The run failed during some stage.
    Failed,
    /// The run was cancelled before completion.
    Cancelled,
}

/// Header record for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Run identifier, the bundle's content hash unless overridden by the caller.
    pub run_id: RunId,
    /// Repository the run covers.
    pub repo: Repo,
    /// Build identifier the run covers.
    pub build_id: BuildId,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Epoch-millisecond start timestamp.
    pub started_at: i64,
    /// Epoch-millisecond completion timestamp, once terminal.
    pub finished_at: Option<i64>,
}

/// A single task-log entry recording one pipeline stage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLog {
    /// Task identifier, `hash({runId, stage, taskKey})`.
    pub task_id: TaskId,
    /// Run this task belongs to.
    pub run_id: RunId,
    /// Pipeline stage name (`acquire`, `enrich`, `score`, `act`).
    pub stage: String,
    /// Caller-chosen key distinguishing this task within its stage.
    pub task_key: String,
    /// Human-readable log message, truncated to 10 kB.
    pub message: String,
    /// Optional stack trace, truncated to 20 kB.
    pub stack: Option<String>,
    /// Epoch-millisecond log timestamp.
    pub logged_at: i64,
}

/// Maximum length, in bytes, of a [`TaskLog::message`] before truncation.
pub const MAX_LOG_MESSAGE_BYTES: usize = 10 * 1024;
/// Maximum length, in bytes, of a [`TaskLog::stack`] before truncation.
pub const MAX_LOG_STACK_BYTES: usize = 20 * 1024;
/// Maximum length, in bytes, of task-log parameters before replacement with a placeholder.
pub const MAX_LOG_PARAMS_BYTES: usize = 50 * 1024;
