// argus-pipeline/src/orchestrator.rs
// ============================================================================
// Module: Agent Workflow Orchestrator
// Description: Runs Acquire, Enrich, Score, and Act in fixed order, records
//   a stage trace per stage, and declares the six tool schemas the stages
//   run under.
// Dependencies: argus-core, argus-store, jsonschema, serde, serde_json
// ============================================================================

//! ## Overview
//! The orchestrator never swallows a stage failure: the first `FAILED`
//! stage halts the run, and every stage after it is recorded `SKIPPED`
//! with `attempt=0` rather than silently omitted from the trace list. Every
//! stage trace is additionally wrapped in a `{status, errors, meta, data}`
//! envelope and checked against [`envelope_schema`] before it is recorded,
//! the same way a tool's output is checked against its declared schema
//! before being trusted by the rest of the run.

use argus_core::BuildId;
use argus_core::Repo;
use argus_core::RunId;
use argus_store::DocumentStore;
use jsonschema::Draft;
use serde::Serialize;
use serde_json::Value;

use crate::acquire;
use crate::act;
use crate::enrich;
use crate::error::PipelineError;
use crate::score;
use crate::stages::StageStatus;

/// Fixed order the orchestrator runs pipeline stages in.
pub const STAGE_ORDER: [&str; 4] = ["acquire", "enrich", "score", "act"];

/// Inputs to a single orchestrated pipeline run.
#[derive(Debug, Clone)]
pub struct OrchestratorRequest<'a> {
    /// Repository the run covers.
    pub repo: Repo,
    /// Build identifier the run covers.
    pub build_id: BuildId,
    /// Run identifier, typically the bundle's content hash.
    pub run_id: RunId,
    /// Deterministic timestamp seed used for every stage trace and the run
    /// header.
    pub started_at: i64,
    /// Bundle files to acquire.
    pub files: &'a [acquire::BundleFile],
    /// Number of top-ranked findings to act on.
    pub top_n: usize,
    /// Whether the act stage is permitted to run (always `true` in
    /// practice; `false` exercises `E_ACTION_WRITE_BLOCKED`).
    pub dry_run: bool,
    /// Attempt number recorded against every action this run generates.
    pub attempt: i64,
}

/// One stage's outcome within an orchestrated run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTrace {
    /// Stage name (`acquire`, `enrich`, `score`, `act`).
    pub name: &'static str,
    /// Attempt number; `0` for a stage that was skipped.
    pub attempt: i64,
    /// Outcome of this stage.
    pub status: StageStatus,
    /// Closed error code, present only when `status == Failed`.
    pub error_code: Option<&'static str>,
    /// Human-readable detail, present only when `status == Failed`.
    pub message: Option<String>,
    /// Stage-specific counters (documents written, findings ranked, ...).
    pub counts: serde_json::Value,
    /// Stable identifiers this stage produced or selected, for audit.
    pub key_ids: Vec<String>,
    /// Tool names this stage invoked.
    pub tool_calls: Vec<&'static str>,
    /// Deterministic start timestamp.
    pub started_at: i64,
    /// Deterministic finish timestamp.
    pub finished_at: i64,
}

impl StageTrace {
    fn skipped(name: &'static str, timestamp: i64) -> Self {
        Self {
            name,
            attempt: 0,
            status: StageStatus::Skipped,
            error_code: None,
            message: None,
            counts: serde_json::json!({}),
            key_ids: Vec::new(),
            tool_calls: Vec::new(),
            started_at: timestamp,
            finished_at: timestamp,
        }
    }

    fn failed(name: &'static str, tool: &'static str, timestamp: i64, err: &PipelineError) -> Self {
        Self {
            name,
            attempt: 1,
            status: StageStatus::Failed,
            error_code: Some(err.code()),
            message: Some(err.to_string()),
            counts: serde_json::json!({}),
            key_ids: Vec::new(),
            tool_calls: vec![tool],
            started_at: timestamp,
            finished_at: timestamp,
        }
    }
}

/// Outcome of [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    /// One trace per stage in [`STAGE_ORDER`].
    pub traces: Vec<StageTrace>,
    /// `true` iff every stage succeeded.
    pub succeeded: bool,
    /// The top-N ranking, populated once the score stage has run.
    pub ranking: Vec<score::RankedFinding>,
}

/// Runs Acquire → Enrich → Score → Act in fixed order against `store`,
/// halting and recording `SKIPPED` traces for the remainder on the first
/// stage failure.
///
/// # Errors
///
/// Returns [`PipelineError::ToolSchemaInvalid`] if the fixed tool-schema
/// table fails its own cross-rule validation, or if any recorded stage trace
/// fails to validate against [`envelope_schema`].
pub fn run_pipeline(store: &dyn DocumentStore, req: &OrchestratorRequest<'_>) -> Result<OrchestratorResult, PipelineError> {
    let result = run_pipeline_inner(store, req)?;
    for trace in &result.traces {
        validate_envelope(&build_envelope(trace, req))?;
    }
    Ok(result)
}

/// Does the actual stage-by-stage orchestration; see [`run_pipeline`] for
/// the public contract, which additionally validates every trace's envelope.
fn run_pipeline_inner(store: &dyn DocumentStore, req: &OrchestratorRequest<'_>) -> Result<OrchestratorResult, PipelineError> {
    if let Err(failures) = validate_all_tool_schemas() {
        return Err(PipelineError::ToolSchemaInvalid(failures.join("; ")));
    }

    let mut traces = Vec::with_capacity(STAGE_ORDER.len());
    let mut ranking = Vec::new();

    let acquire_result = match acquire::run_acquire(store, &req.repo, &req.build_id, &req.run_id, req.started_at, req.files) {
        Ok(result) if result.succeeded() => result,
        Ok(result) => {
            let message = result.stage_reports.iter().filter(|r| r.status == StageStatus::Failed).flat_map(|r| r.errors.clone()).collect::<Vec<_>>().join("; ");
            traces.push(StageTrace {
                name: "acquire",
                attempt: 1,
                status: StageStatus::Failed,
                error_code: Some("E_ACQUIRE_PIPELINE_FAILED"),
                message: Some(message),
                counts: serde_json::json!({"subStages": result.stage_reports}),
                key_ids: Vec::new(),
                tool_calls: vec!["acquire"],
                started_at: req.started_at,
                finished_at: req.started_at,
            });
            skip_rest(&mut traces, &["enrich", "score", "act"], req.started_at);
            return Ok(OrchestratorResult { traces, succeeded: false, ranking });
        }
        Err(err) => {
            traces.push(StageTrace::failed("acquire", "acquire", req.started_at, &err));
            skip_rest(&mut traces, &["enrich", "score", "act"], req.started_at);
            return Ok(OrchestratorResult { traces, succeeded: false, ranking });
        }
    };
    traces.push(StageTrace {
        name: "acquire",
        attempt: 1,
        status: StageStatus::Success,
        error_code: None,
        message: None,
        counts: serde_json::json!({"subStages": acquire_result.stage_reports}),
        key_ids: vec![acquire_result.run.run_id.to_string()],
        tool_calls: vec!["acquire"],
        started_at: req.started_at,
        finished_at: req.started_at,
    });

    let enrich_result = match enrich::run_enrich(store, &req.repo, &req.build_id) {
        Ok(result) => result,
        Err(err) => {
            traces.push(StageTrace::failed("enrich", "enrich", req.started_at, &err));
            skip_rest(&mut traces, &["score", "act"], req.started_at);
            return Ok(OrchestratorResult { traces, succeeded: false, ranking });
        }
    };
    traces.push(StageTrace {
        name: "enrich",
        attempt: 1,
        status: StageStatus::Success,
        error_code: None,
        message: None,
        counts: serde_json::json!({
            "written": enrich_result.stage_report.written,
            "brokenReachabilityRefsCount": enrich_result.integrity.broken_reachability_refs_count,
            "brokenExplanationRefsCount": enrich_result.integrity.broken_explanation_refs_count,
            "brokenDependencyBuildRefsCount": enrich_result.integrity.broken_dependency_build_refs_count,
            "sampleBrokenIds": enrich_result.integrity.sample_broken_ids,
        }),
        key_ids: Vec::new(),
        tool_calls: vec!["enrich"],
        started_at: req.started_at,
        finished_at: req.started_at,
    });

    let score_result = match score::run_score(store, &req.repo, &req.build_id, req.top_n) {
        Ok(result) => result,
        Err(err) => {
            traces.push(StageTrace::failed("score", "score", req.started_at, &err));
            skip_rest(&mut traces, &["act"], req.started_at);
            return Ok(OrchestratorResult { traces, succeeded: false, ranking });
        }
    };
    ranking = score_result.ranking.clone();
    traces.push(StageTrace {
        name: "score",
        attempt: 1,
        status: StageStatus::Success,
        error_code: None,
        message: None,
        counts: serde_json::json!({"written": score_result.stage_report.written, "rankingSize": score_result.ranking.len()}),
        key_ids: score_result.ranking.iter().map(|r| r.finding_id.clone()).collect(),
        tool_calls: vec!["score"],
        started_at: req.started_at,
        finished_at: req.started_at,
    });

    let act_result = match act::run_act(store, &req.repo, &req.build_id, &req.run_id, &ranking, req.dry_run, req.attempt) {
        Ok(result) => result,
        Err(err) => {
            traces.push(StageTrace::failed("act", "jira", req.started_at, &err));
            return Ok(OrchestratorResult { traces, succeeded: false, ranking });
        }
    };
    traces.push(StageTrace {
        name: "act",
        attempt: req.attempt,
        status: StageStatus::Success,
        error_code: None,
        message: None,
        counts: serde_json::json!({"written": act_result.stage_report.written, "actionsResolved": act_result.actions.len()}),
        key_ids: act_result.actions.iter().map(|a| a.action_id.clone()).collect(),
        tool_calls: vec!["jira", "slack"],
        started_at: req.started_at,
        finished_at: req.started_at,
    });

    Ok(OrchestratorResult { traces, succeeded: true, ranking })
}

/// Appends `SKIPPED` traces for every stage name in `remaining`.
fn skip_rest(traces: &mut Vec<StageTrace>, remaining: &[&'static str], timestamp: i64) {
    for name in remaining {
        traces.push(StageTrace::skipped(name, timestamp));
    }
}

/// A tool's declared access scope within the agent workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessMode {
    /// May only read indices.
    ReadOnly,
    /// May write to the domain pipeline indices.
    PipelineWrite,
    /// May write only to the actions index.
    ActionWrite,
}

/// A tool's declared write scope, paired with its [`AccessMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WritePolicy {
    /// No writes permitted.
    None,
    /// Writes are confined to the domain pipeline indices.
    EpicPipelineOnly,
    /// Writes are confined to the actions index.
    ActionsOnly,
}

/// Declared shape of a single tool the orchestrator may invoke.
#[derive(Debug, Clone, Copy)]
pub struct ToolSchema {
    /// Tool name.
    pub name: &'static str,
    /// Declared access mode.
    pub access_mode: AccessMode,
    /// Declared write policy.
    pub write_policy: WritePolicy,
    /// Indices this tool may read.
    pub read_indices: &'static [&'static str],
    /// Indices this tool may write.
    pub write_indices: &'static [&'static str],
    /// Deterministic sort keys this tool's output is ordered by.
    pub sort_keys: &'static [&'static str],
}

/// The six fixed tool schemas the orchestrator declares.
pub const TOOL_SCHEMAS: [ToolSchema; 6] = [
    ToolSchema {
        name: "acquire",
        access_mode: AccessMode::PipelineWrite,
        write_policy: WritePolicy::EpicPipelineOnly,
        read_indices: &[],
        write_indices: &["artifacts", "dependencies", "sbom_components", "findings"],
        sort_keys: &["artifactId"],
    },
    ToolSchema {
        name: "enrich",
        access_mode: AccessMode::PipelineWrite,
        write_policy: WritePolicy::EpicPipelineOnly,
        read_indices: &["findings", "reachability", "threat_intel", "dependencies", "artifacts"],
        write_indices: &["findings"],
        sort_keys: &["findingId"],
    },
    ToolSchema {
        name: "score",
        access_mode: AccessMode::PipelineWrite,
        write_policy: WritePolicy::EpicPipelineOnly,
        read_indices: &["findings"],
        write_indices: &["findings", "priority_explanations"],
        sort_keys: &["priorityScore", "findingId"],
    },
    ToolSchema {
        name: "jira",
        access_mode: AccessMode::ActionWrite,
        write_policy: WritePolicy::ActionsOnly,
        read_indices: &[],
        write_indices: &["actions"],
        sort_keys: &["actionId"],
    },
    ToolSchema {
        name: "slack",
        access_mode: AccessMode::ActionWrite,
        write_policy: WritePolicy::ActionsOnly,
        read_indices: &[],
        write_indices: &["actions"],
        sort_keys: &["actionId"],
    },
    ToolSchema {
        name: "search",
        access_mode: AccessMode::ReadOnly,
        write_policy: WritePolicy::None,
        read_indices: &["findings", "reachability", "threat_intel", "dependencies", "artifacts", "actions", "priority_explanations"],
        write_indices: &[],
        sort_keys: &["findingId"],
    },
];

/// Validates a single tool schema against the three cross-rules.
fn validate_tool_schema(schema: &ToolSchema) -> Vec<String> {
    let mut failures = Vec::new();
    match schema.access_mode {
        AccessMode::ReadOnly => {
            if schema.write_policy != WritePolicy::None || !schema.write_indices.is_empty() {
                failures.push(format!("{}: READ_ONLY tool must have writePolicy=NONE and no write indices", schema.name));
            }
        }
        AccessMode::ActionWrite => {
            if schema.write_policy != WritePolicy::ActionsOnly || schema.write_indices != ["actions"] {
                failures.push(format!("{}: ACTION_WRITE tool must have writePolicy=ACTIONS_ONLY and write only `actions`", schema.name));
            }
        }
        AccessMode::PipelineWrite => {
            if schema.write_policy != WritePolicy::EpicPipelineOnly {
                failures.push(format!("{}: PIPELINE_WRITE tool must have writePolicy=EPIC_PIPELINE_ONLY", schema.name));
            }
        }
    }
    failures
}

/// Validates every schema in [`TOOL_SCHEMAS`], returning all failures sorted
/// lexicographically.
///
/// # Errors
///
/// Returns the sorted failure list when any schema violates its cross-rule.
pub fn validate_all_tool_schemas() -> Result<(), Vec<String>> {
    let mut failures: Vec<String> = TOOL_SCHEMAS.iter().flat_map(validate_tool_schema).collect();
    if failures.is_empty() {
        Ok(())
    } else {
        failures.sort();
        Err(failures)
    }
}

/// JSON Schema for the `{status, errors, meta, data}` envelope every tool
/// call and stage trace is wrapped in.
fn envelope_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "required": ["status", "errors", "meta", "data"],
        "additionalProperties": false,
        "properties": {
            "status": {"type": "string", "enum": ["SUCCESS", "FAILED", "SKIPPED"]},
            "errors": {"type": "array", "items": {"type": "string"}},
            "meta": {
                "type": "object",
                "required": ["repo", "buildId", "runId", "startedAt", "finishedAt"],
                "properties": {
                    "repo": {"type": "string"},
                    "buildId": {"type": "string"},
                    "runId": {"type": "string"},
                    "startedAt": {"type": "integer"},
                    "finishedAt": {"type": "integer"},
                },
            },
            "data": {},
        },
    })
}

/// Wraps a stage trace in the `{status, errors, meta, data}` envelope shape.
fn build_envelope(trace: &StageTrace, req: &OrchestratorRequest<'_>) -> Value {
    serde_json::json!({
        "status": trace.status,
        "errors": trace.error_code.map(|code| vec![code.to_string()]).unwrap_or_default(),
        "meta": {
            "repo": req.repo.as_str(),
            "buildId": req.build_id.as_str(),
            "runId": req.run_id.as_str(),
            "startedAt": trace.started_at,
            "finishedAt": trace.finished_at,
        },
        "data": trace.counts,
    })
}

/// Validates `envelope` against [`envelope_schema`].
///
/// # Errors
///
/// Returns [`PipelineError::ToolSchemaInvalid`] when `envelope` does not
/// conform, or when the schema itself fails to compile (a defect in this
/// crate).
fn validate_envelope(envelope: &Value) -> Result<(), PipelineError> {
    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&envelope_schema())
        .map_err(|err| PipelineError::ToolSchemaInvalid(format!("invalid envelope schema: {err}")))?;
    let errors: Vec<String> = validator.iter_errors(envelope).map(|err| err.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::ToolSchemaInvalid(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use argus_store::InMemoryDocumentStore;

    use super::*;

    #[test]
    fn fixed_tool_schemas_satisfy_every_cross_rule() {
        assert!(validate_all_tool_schemas().is_ok());
    }

    fn ids() -> (Repo, BuildId, RunId) {
        (Repo::new("acme/widgets").expect("valid"), BuildId::new("b1").expect("valid"), RunId::from_hash("a".repeat(64)).expect("valid"))
    }

    #[test]
    fn acquire_failure_skips_every_later_stage() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let req = OrchestratorRequest { repo, build_id, run_id, started_at: 0, files: &[], top_n: 5, dry_run: true, attempt: 1 };
        let result = run_pipeline(&store, &req).expect("runs");
        assert!(!result.succeeded);
        assert_eq!(result.traces[0].status, StageStatus::Failed);
        assert!(result.traces[1..].iter().all(|t| t.status == StageStatus::Skipped && t.attempt == 0));
    }

    #[test]
    fn every_recorded_trace_validates_against_the_envelope_schema() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let req = OrchestratorRequest { repo, build_id, run_id, started_at: 0, files: &[], top_n: 5, dry_run: true, attempt: 1 };
        let result = run_pipeline(&store, &req).expect("runs");
        for trace in &result.traces {
            validate_envelope(&build_envelope(trace, &req)).expect("envelope is valid");
        }
    }

    #[test]
    fn full_bundle_runs_every_stage_to_success() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let sarif = serde_json::json!({
            "version": "2.1.0",
            "runs": [{
                "tool": {"driver": {"name": "semgrep"}},
                "results": [{
                    "ruleId": "rule-1",
                    "level": "error",
                    "locations": [{"physicalLocation": {"artifactLocation": {"uri": "src/a.rs"}, "region": {"startLine": 1}}}],
                    "properties": {"package": "left-pad", "version": "1.0.0"},
                }],
            }],
        });
        let lockfile = serde_json::json!({"dependencies": {"left-pad": {"version": "1.0.0"}}});
        let files = vec![
            acquire::BundleFile { filename: "scan.sarif".to_string(), bytes: serde_json::to_vec(&sarif).expect("valid") },
            acquire::BundleFile { filename: "package-lock.json".to_string(), bytes: serde_json::to_vec(&lockfile).expect("valid") },
        ];

        // Acquire now derives a real reachability record from the lockfile
        // edge alongside the finding, so enrich has something genuine to
        // join against without any hand-seeded document.
        let req = OrchestratorRequest { repo, build_id, run_id, started_at: 0, files: &files, top_n: 5, dry_run: true, attempt: 1 };
        let result = run_pipeline(&store, &req).expect("runs");
        assert!(result.succeeded, "traces: {:?}", result.traces);
        assert_eq!(result.traces.len(), STAGE_ORDER.len());
        assert!(result.traces.iter().all(|t| t.status == StageStatus::Success));
        assert_eq!(result.ranking.len(), 1);
        assert_eq!(store.list("reachability").expect("ok").len(), 1);
    }
}
