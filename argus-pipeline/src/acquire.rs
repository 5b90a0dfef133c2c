// argus-pipeline/src/acquire.rs
// ============================================================================
// Module: Acquire Stage
// Description: Loads a bundle directory, classifies and parses its
//   artifacts, and writes every resulting entity to the document store.
// Dependencies: argus-core, argus-ingest, argus-reachability, argus-store,
//   argus-writers, sha2
// ============================================================================

//! ## Overview
//! The acquire stage runs seven named sub-stages in fixed order:
//! `artifacts, dependencies, sbom, findings, reachability, threatIntel,
//! actions`. The first six are populated here from parsed bundle bytes:
//! `reachability` runs the dependency-graph analysis against the edges and
//! findings acquired earlier in the same pass, and `threatIntel` loads any
//! seed list shipped in the bundle. Only `actions` is left to the act stage,
//! since action records do not exist until a dry run decides to create one.
//! A sub-stage failure causes every later sub-stage to be recorded
//! `SKIPPED` rather than attempted.

use argus_core::BuildId;
use argus_core::DependencyEdge;
use argus_core::Finding;
use argus_core::Repo;
use argus_core::Run;
use argus_core::RunId;
use argus_core::RunStatus;
use argus_ingest::ArtifactKind;
use argus_reachability::DependencyGraph;
use argus_store::BulkOptions;
use argus_store::DocumentStore;
use argus_writers::validators::DependenciesValidator;
use argus_writers::validators::FindingsValidator;
use argus_writers::validators::ReachabilityValidator;
use argus_writers::validators::SbomComponentsValidator;
use argus_writers::validators::ThreatIntelValidator;
use argus_writers::write_documents;
use sha2::Digest;
use sha2::Sha256;

use crate::error::PipelineError;
use crate::stages::skip_remaining;
use crate::stages::StageReport;

/// Fixed sub-stage order the acquire stage reports against.
pub const SUBSTAGE_ORDER: [&str; 7] =
    ["artifacts", "dependencies", "sbom", "findings", "reachability", "threatIntel", "actions"];

/// One file from the bundle directory, excluding the manifest itself.
#[derive(Debug, Clone)]
pub struct BundleFile {
    /// Basename within the bundle directory.
    pub filename: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

/// Outcome of running the acquire stage for one run.
#[derive(Debug, Clone)]
pub struct AcquireResult {
    /// The run header, in its terminal (`SUCCEEDED`/`FAILED`) status.
    pub run: Run,
    /// Per-sub-stage reports, in [`SUBSTAGE_ORDER`].
    pub stage_reports: Vec<StageReport>,
}

impl AcquireResult {
    /// Returns `true` if every sub-stage attempted succeeded (none failed).
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stage_reports.iter().all(|report| report.status != crate::stages::StageStatus::Failed)
    }
}

/// Runs the acquire stage against a classified set of bundle files.
///
/// # Errors
///
/// Returns [`PipelineError::AcquireMissingArtifacts`] if no file classifies
/// as SARIF, a lockfile, or an SBOM.
pub fn run_acquire(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    started_at: i64,
    files: &[BundleFile],
) -> Result<AcquireResult, PipelineError> {
    let mut run = crate::logging::start_run(run_id.clone(), repo.clone(), build_id.clone(), started_at);
    let mut reports = Vec::new();

    let classified: Vec<(ArtifactKind, &BundleFile)> =
        files.iter().map(|file| (argus_ingest::classify_artifact(&file.filename), file)).collect();

    if !classified.iter().any(|(kind, _)| *kind != ArtifactKind::Other) {
        run = crate::logging::finish_run(run, RunStatus::Failed, started_at);
        return Err(PipelineError::AcquireMissingArtifacts);
    }

    reports.push(write_artifacts(store, repo, build_id, run_id, started_at, &classified)?);

    let (dependencies_report, edges) = match write_dependencies(store, repo, build_id, run_id, &classified) {
        Ok(result) => result,
        Err(err) => {
            reports.push(StageReport::failed("dependencies", vec![err.to_string()]));
            skip_remaining(&mut reports, &["sbom", "findings", "reachability", "threatIntel", "actions"]);
            run = crate::logging::finish_run(run, RunStatus::Failed, started_at);
            return Ok(AcquireResult { run, stage_reports: reports });
        }
    };
    reports.push(dependencies_report);

    let sbom_report = match write_sbom(store, repo, build_id, run_id, &classified) {
        Ok(report) => report,
        Err(err) => {
            reports.push(StageReport::failed("sbom", vec![err.to_string()]));
            skip_remaining(&mut reports, &["findings", "reachability", "threatIntel", "actions"]);
            run = crate::logging::finish_run(run, RunStatus::Failed, started_at);
            return Ok(AcquireResult { run, stage_reports: reports });
        }
    };
    reports.push(sbom_report);

    let (findings_report, findings) = match write_findings(store, repo, build_id, run_id, started_at, &classified) {
        Ok(result) => result,
        Err(err) => {
            reports.push(StageReport::failed("findings", vec![err.to_string()]));
            skip_remaining(&mut reports, &["reachability", "threatIntel", "actions"]);
            run = crate::logging::finish_run(run, RunStatus::Failed, started_at);
            return Ok(AcquireResult { run, stage_reports: reports });
        }
    };
    reports.push(findings_report);

    let reachability_report = match write_reachability(store, &edges, &findings, started_at) {
        Ok(report) => report,
        Err(err) => {
            reports.push(StageReport::failed("reachability", vec![err.to_string()]));
            skip_remaining(&mut reports, &["threatIntel", "actions"]);
            run = crate::logging::finish_run(run, RunStatus::Failed, started_at);
            return Ok(AcquireResult { run, stage_reports: reports });
        }
    };
    reports.push(reachability_report);

    let threat_intel_report = match write_threat_intel(store, &classified) {
        Ok(report) => report,
        Err(err) => {
            reports.push(StageReport::failed("threatIntel", vec![err.to_string()]));
            skip_remaining(&mut reports, &["actions"]);
            run = crate::logging::finish_run(run, RunStatus::Failed, started_at);
            return Ok(AcquireResult { run, stage_reports: reports });
        }
    };
    reports.push(threat_intel_report);

    // Action records do not exist until the act stage runs a dry run.
    reports.push(StageReport::success("actions", 0));

    run = crate::logging::finish_run(run, RunStatus::Succeeded, started_at);
    Ok(AcquireResult { run, stage_reports: reports })
}

/// Computes the SHA-256 hex checksum of `bytes`.
fn checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Writes one `artifacts` document per bundle file, regardless of its
/// recognized kind.
fn write_artifacts(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    created_at: i64,
    classified: &[(ArtifactKind, &BundleFile)],
) -> Result<StageReport, PipelineError> {
    let docs: Vec<serde_json::Value> = classified
        .iter()
        .map(|(kind, file)| {
            let artifact_id = argus_core::artifact_id(repo, build_id, run_id, &file.filename, &checksum(&file.bytes));
            serde_json::json!({
                "artifactId": artifact_id.to_string(),
                "repo": repo.as_str(),
                "buildId": build_id.as_str(),
                "runId": run_id.as_str(),
                "artifactType": kind_name(*kind),
                "filename": file.filename,
                "checksum": checksum(&file.bytes),
                "createdAt": created_at,
            })
        })
        .collect();

    let report = write_documents(&ArtifactsValidator, store, docs, &BulkOptions::default())
        .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
    Ok(StageReport::success("artifacts", report.succeeded))
}

/// Parses every lockfile-classified artifact and writes its dependency
/// edges, returning the parsed edges so `reachability` can build its graph
/// from them without re-parsing the bundle.
fn write_dependencies(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    classified: &[(ArtifactKind, &BundleFile)],
) -> Result<(StageReport, Vec<DependencyEdge>), PipelineError> {
    let mut edges = Vec::new();
    for (kind, file) in classified {
        if *kind != ArtifactKind::Lockfile {
            continue;
        }
        let text = std::str::from_utf8(&file.bytes)
            .map_err(|err| PipelineError::AcquirePipelineFailed(format!("{}: {err}", file.filename)))?;
        let parsed = argus_ingest::parse_lockfile(text, &file.filename, repo, build_id, run_id)
            .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
        edges.extend(parsed);
    }
    let docs: Vec<serde_json::Value> =
        edges.iter().cloned().map(|edge| serde_json::to_value(edge).unwrap_or(serde_json::Value::Null)).collect();
    let report = write_documents(&DependenciesValidator, store, docs, &BulkOptions::default())
        .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
    Ok((StageReport::success("dependencies", report.succeeded), edges))
}

/// Parses every SBOM-classified artifact and writes its components.
fn write_sbom(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    classified: &[(ArtifactKind, &BundleFile)],
) -> Result<StageReport, PipelineError> {
    let mut docs = Vec::new();
    for (kind, file) in classified {
        if *kind != ArtifactKind::Sbom {
            continue;
        }
        let text = std::str::from_utf8(&file.bytes)
            .map_err(|err| PipelineError::AcquirePipelineFailed(format!("{}: {err}", file.filename)))?;
        let components = argus_ingest::parse_sbom(text, &file.filename, repo, build_id, run_id)
            .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
        docs.extend(components.into_iter().map(|c| serde_json::to_value(c).unwrap_or(serde_json::Value::Null)));
    }
    let report = write_documents(&SbomComponentsValidator, store, docs, &BulkOptions::default())
        .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
    Ok(StageReport::success("sbom", report.succeeded))
}

/// Parses every SARIF-classified artifact and writes its findings,
/// returning the parsed findings so `reachability` can analyze them without
/// reading them back from the store.
fn write_findings(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    created_at: i64,
    classified: &[(ArtifactKind, &BundleFile)],
) -> Result<(StageReport, Vec<Finding>), PipelineError> {
    let mut findings = Vec::new();
    for (kind, file) in classified {
        if *kind != ArtifactKind::Sarif {
            continue;
        }
        let text = std::str::from_utf8(&file.bytes)
            .map_err(|err| PipelineError::AcquirePipelineFailed(format!("{}: {err}", file.filename)))?;
        let parsed = argus_ingest::parse_sarif(text, &file.filename, repo, build_id, run_id, created_at)
            .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
        findings.extend(parsed);
    }
    let docs: Vec<serde_json::Value> =
        findings.iter().cloned().map(|f| serde_json::to_value(f).unwrap_or(serde_json::Value::Null)).collect();
    let report = write_documents(&FindingsValidator, store, docs, &BulkOptions::default())
        .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
    Ok((StageReport::success("findings", report.succeeded), findings))
}

/// Builds the run's dependency graph from acquired edges and runs
/// reachability analysis for every finding that names a package, writing
/// one `reachability` document per analyzable finding.
fn write_reachability(
    store: &dyn DocumentStore,
    edges: &[DependencyEdge],
    findings: &[Finding],
    computed_at: i64,
) -> Result<StageReport, PipelineError> {
    let graph = DependencyGraph::build(edges);
    let docs: Vec<serde_json::Value> = findings
        .iter()
        .filter_map(|finding| argus_reachability::analyze(&graph, finding, computed_at))
        .map(|record| serde_json::to_value(record).unwrap_or(serde_json::Value::Null))
        .collect();
    let report = write_documents(&ReachabilityValidator, store, docs, &BulkOptions::default())
        .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
    Ok(StageReport::success("reachability", report.succeeded))
}

/// Parses every threat-intel-seed-classified artifact and writes its
/// normalized CVE/KEV/EPSS records.
fn write_threat_intel(
    store: &dyn DocumentStore,
    classified: &[(ArtifactKind, &BundleFile)],
) -> Result<StageReport, PipelineError> {
    let mut records = Vec::new();
    for (kind, file) in classified {
        if *kind != ArtifactKind::ThreatIntelSeed {
            continue;
        }
        let text = std::str::from_utf8(&file.bytes)
            .map_err(|err| PipelineError::AcquirePipelineFailed(format!("{}: {err}", file.filename)))?;
        let parsed = argus_ingest::parse_threat_intel_seed(text, &file.filename)
            .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
        records.extend(parsed);
    }
    let docs: Vec<serde_json::Value> =
        records.into_iter().map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null)).collect();
    let report = write_documents(&ThreatIntelValidator, store, docs, &BulkOptions::default())
        .map_err(|err| PipelineError::AcquirePipelineFailed(err.to_string()))?;
    Ok(StageReport::success("threatIntel", report.succeeded))
}

/// Maps a classified artifact kind to its wire-level type string.
const fn kind_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Sarif => "sarif",
        ArtifactKind::Lockfile => "lockfile",
        ArtifactKind::Sbom => "sbom",
        ArtifactKind::ThreatIntelSeed => "threat_intel_seed",
        ArtifactKind::Other => "other",
    }
}

/// Validator for the `artifacts` index, used only within this module.
struct ArtifactsValidator;
impl argus_writers::IndexValidator for ArtifactsValidator {
    fn index_name(&self) -> &'static str {
        "artifacts"
    }
    fn required_id_field(&self) -> &'static str {
        "artifactId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let field = |name: &str| doc.get(name).and_then(serde_json::Value::as_str).ok_or_else(|| format!("missing field `{name}`"));
        let repo = Repo::new(field("repo")?).map_err(|err| err.to_string())?;
        let build_id = BuildId::new(field("buildId")?).map_err(|err| err.to_string())?;
        let run_id = argus_core::RunId::from_hash(field("runId")?).map_err(|err| err.to_string())?;
        let filename = field("filename")?;
        let checksum = field("checksum")?;
        Ok(argus_core::artifact_id(&repo, &build_id, &run_id, filename, checksum).to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["repo", "buildId", "runId", "artifactType", "filename", "checksum"]
    }
}

#[cfg(test)]
mod tests {
    use argus_store::InMemoryDocumentStore;

    use super::*;

    fn ids() -> (Repo, BuildId, RunId) {
        (Repo::new("acme/widgets").expect("valid"), BuildId::new("b1").expect("valid"), RunId::from_hash("a".repeat(64)).expect("valid"))
    }

    #[test]
    fn bundle_with_no_recognized_artifacts_fails_fast() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let files = vec![BundleFile { filename: "README.md".to_string(), bytes: b"hi".to_vec() }];
        let err = run_acquire(&store, &repo, &build_id, &run_id, 0, &files).unwrap_err();
        assert_eq!(err, PipelineError::AcquireMissingArtifacts);
    }

    #[test]
    fn sarif_bundle_writes_findings_and_artifacts() {
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
                }],
            }],
        });
        let files = vec![BundleFile { filename: "scan.sarif".to_string(), bytes: serde_json::to_vec(&sarif).expect("valid") }];
        let result = run_acquire(&store, &repo, &build_id, &run_id, 0, &files).expect("acquires");
        assert!(result.succeeded());
        assert_eq!(store.list("findings").expect("ok").len(), 1);
        assert_eq!(store.list("artifacts").expect("ok").len(), 1);
    }

    #[test]
    fn bundle_with_lockfile_produces_a_real_reachability_record() {
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
            BundleFile { filename: "scan.sarif".to_string(), bytes: serde_json::to_vec(&sarif).expect("valid") },
            BundleFile { filename: "package-lock.json".to_string(), bytes: serde_json::to_vec(&lockfile).expect("valid") },
        ];
        let result = run_acquire(&store, &repo, &build_id, &run_id, 0, &files).expect("acquires");
        assert!(result.succeeded(), "reports: {:?}", result.stage_reports);

        let reachability_docs = store.list("reachability").expect("ok");
        assert_eq!(reachability_docs.len(), 1);
        assert_eq!(reachability_docs[0]["reachable"], serde_json::Value::Bool(true));
        assert_eq!(reachability_docs[0]["status"], serde_json::Value::String("REACHABLE".to_string()));
        assert_eq!(reachability_docs[0]["evidencePath"], serde_json::json!(["__root__", "left-pad"]));
    }

    #[test]
    fn bundle_with_threat_intel_seed_writes_normalized_records() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let sarif = serde_json::json!({"version": "2.1.0", "runs": []});
        let seed = serde_json::json!([{"cve": "CVE-2024-9999", "kev": true, "epss": 0.8}]);
        let files = vec![
            BundleFile { filename: "scan.sarif".to_string(), bytes: serde_json::to_vec(&sarif).expect("valid") },
            BundleFile { filename: "threat-intel-seed.json".to_string(), bytes: serde_json::to_vec(&seed).expect("valid") },
        ];
        let result = run_acquire(&store, &repo, &build_id, &run_id, 0, &files).expect("acquires");
        assert!(result.succeeded(), "reports: {:?}", result.stage_reports);

        let intel_docs = store.list("threat_intel").expect("ok");
        assert_eq!(intel_docs.len(), 1);
        assert_eq!(intel_docs[0]["intelId"], serde_json::Value::String("CVE-2024-9999".to_string()));
        assert_eq!(intel_docs[0]["kev"], serde_json::Value::Bool(true));
    }
}
