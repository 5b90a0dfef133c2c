// argus-pipeline/src/lib.rs
// ============================================================================
// Package: argus-pipeline
// Description: Bundle manifest parsing, the Acquire/Enrich/Score/Act stages,
//   the agent workflow orchestrator, the determinism harness, and run/task
//   logging.
// Dependencies: argus-actions, argus-core, argus-ingest, argus-reachability,
//   argus-store, argus-writers, jsonschema, serde, serde_json, sha2,
//   thiserror, time
// ============================================================================

//! ## Overview
//! This crate composes every other `argus-*` crate into one pipeline. A
//! caller typically builds an [`orchestrator::OrchestratorRequest`] and
//! hands it to [`orchestrator::run_pipeline`]; the determinism harness in
//! [`determinism`] is the same entry point run twice and diffed.

pub mod acquire;
pub mod act;
pub mod determinism;
pub mod enrich;
/// Closed error codes for the manifest, stages, and orchestrator.
pub mod error;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod score;
/// Common stage-trace types shared by every pipeline stage.
pub mod stages;
