// argus-core/src/lib.rs
// ============================================================================
// Module: Argus Core
// Description: Shared identity, hashing, data model, and mapping-contract
//   types used by every stage of the Argus finding-enrichment pipeline.
// Purpose: Give every other crate in the workspace one source of truth for
//   entity shapes and stable identifiers.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror
// ============================================================================

//! ## Overview
//! Argus Core holds no I/O and no orchestration logic. It defines what a
//! finding, a dependency edge, a reachability record, and a threat-intel
//! entry *are*, and how their identifiers are derived deterministically from
//! their defining fields. Every other crate in the workspace depends on this
//! one; this one depends on nothing in the workspace.

/// Shared identity, hashing, and data model types for the pipeline.
pub mod core;

pub use core::error::HashError;
pub use core::hashing::{canonical_json, hash};
pub use core::identifiers::{
    artifact_id, component_id, dependency_id, finding_id, reachability_id, task_id, ActionId,
    ArtifactId, BuildId, ComponentId, DependencyId, FindingId, IntelId, ReachabilityId, Repo,
    RunId, TaskId,
};
pub use core::mapping::{
    check_drift, validate_document_against_index, DynamicPolicy, FieldContract, IndexSettings,
    MappingContract, MappingError, ACTIONS_CONTRACT, ALL_CONTRACTS, ARTIFACTS_CONTRACT,
    DEPENDENCIES_CONTRACT, FINDINGS_CONTRACT, PRIORITY_EXPLANATIONS_CONTRACT,
    REACHABILITY_CONTRACT, SBOM_COMPONENTS_CONTRACT, THREAT_INTEL_CONTRACT,
};
pub use core::model::{
    Artifact, DependencyEdge, Finding, Reachability, ReachabilityStatus, Run, RunStatus,
    SbomComponent, TaskLog, ThreatIntel,
};
