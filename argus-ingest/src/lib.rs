// argus-ingest/src/lib.rs
// ============================================================================
// Module: Argus Ingest
// Description: Pure parsers turning raw bundle artifact bytes into typed
//   entities, plus the filesystem recognition heuristics that classify an
//   artifact before it is parsed.
// Purpose: Isolate every byte-level format decision (SARIF, lockfile, SBOM)
//   behind deterministic, side-effect-free functions.
// Dependencies: argus-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every parser in this crate is a pure function of its input bytes and the
//! caller-supplied identity context (`repo`, `buildId`, `runId`,
//! `createdAt`). None of them read the clock, the filesystem, or the
//! network, so replaying the same bundle always produces byte-identical
//! findings, dependency edges, and SBOM components.

pub mod bundle;
/// Error types for the ingest crate.
pub mod error;
pub mod lockfile;
pub mod sarif;
pub mod sbom;
pub mod threat_intel;

pub use bundle::{classify_artifact, ArtifactKind};
pub use error::ParserError;
pub use lockfile::parse_lockfile;
pub use sarif::parse_sarif;
pub use sbom::parse_sbom;
pub use threat_intel::parse_threat_intel_seed;
