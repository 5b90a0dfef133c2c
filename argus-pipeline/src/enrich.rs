// argus-pipeline/src/enrich.rs
// ============================================================================
// Module: Enrich Stage
// Description: Joins findings with threat intel and the winning reachability
//   record per findingId, attaches a `context` object to each finding, and
//   runs the referential-integrity checks over reachability, inline
//   priority-explanation, and dependency-build references.
// Dependencies: argus-core, argus-store, argus-writers, serde_json
// ============================================================================

//! ## Overview
//! Enrich never repairs what it finds broken. It counts and samples broken
//! references so the orchestrator can surface them, the same way the writer
//! contract reports bad documents instead of silently dropping them.

use std::collections::BTreeMap;
use std::collections::HashSet;

use argus_core::BuildId;
use argus_core::Repo;
use argus_store::BulkOptions;
use argus_store::DocumentStore;
use argus_writers::validators::FindingsValidator;
use argus_writers::write_documents;
use serde_json::Value;

use crate::error::PipelineError;
use crate::stages::StageReport;

/// Upper bound on the number of broken ids surfaced in [`IntegrityReport`].
pub const MAX_SAMPLE_BROKEN_IDS: usize = 20;

/// Referential-integrity counts produced by a single enrich run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Reachability docs whose `findingId` has no matching finding.
    pub broken_reachability_refs_count: usize,
    /// Findings whose inline `priorityExplanation.findingId` does not equal
    /// the host finding's own id.
    pub broken_explanation_refs_count: usize,
    /// Dependency edges whose `(repo, buildId)` has no matching artifact.
    pub broken_dependency_build_refs_count: usize,
    /// Up to [`MAX_SAMPLE_BROKEN_IDS`] broken ids, sorted lexicographically.
    pub sample_broken_ids: Vec<String>,
}

/// Outcome of [`run_enrich`].
#[derive(Debug, Clone)]
pub struct EnrichResult {
    /// Stage-level report (`written` counts rewritten findings).
    pub stage_report: StageReport,
    /// Referential-integrity counts over the store as it stood at join time.
    pub integrity: IntegrityReport,
    /// Deterministic warnings, one per findingId with more than one
    /// reachability candidate, sorted by findingId.
    pub warnings: Vec<String>,
}

/// Runs the enrich stage: joins `(repo, buildId)`-scoped findings against
/// threat intel and reachability, rewrites each finding with an attached
/// `context`, and computes referential-integrity counts.
///
/// # Errors
///
/// Returns [`PipelineError::EnrichNoReachability`] if the store holds no
/// reachability records at all. Returns [`PipelineError::Store`] if the
/// underlying store transport fails.
pub fn run_enrich(store: &dyn DocumentStore, repo: &Repo, build_id: &BuildId) -> Result<EnrichResult, PipelineError> {
    let all_findings = store.list("findings")?;
    let reachability_docs = store.list("reachability")?;
    let threat_docs = store.list("threat_intel")?;
    let dependency_docs = store.list("dependencies")?;
    let artifact_docs = store.list("artifacts")?;

    if reachability_docs.is_empty() {
        return Err(PipelineError::EnrichNoReachability);
    }

    let scoped: Vec<&Value> = all_findings.iter().filter(|doc| doc_matches(doc, repo, build_id)).collect();

    let (winners, warnings) = winning_reachability_by_finding(&reachability_docs);
    let threat_by_cve = index_threat_by_cve(&threat_docs);

    let mut docs = Vec::with_capacity(scoped.len());
    for finding in &scoped {
        let finding_id = finding.get("findingId").and_then(Value::as_str).unwrap_or_default();
        let threat = finding
            .get("cves")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find_map(|cve| threat_by_cve.get(&cve.to_ascii_uppercase()).cloned());
        let reachability = winners.get(finding_id).cloned();

        let mut doc = (*finding).clone();
        doc["context"] = serde_json::json!({
            "threat": threat,
            "reachability": reachability.as_ref().map(|r| serde_json::json!({
                "reachable": r.get("reachable"),
                "confidenceScore": r.get("confidenceScore"),
                "method": r.get("method"),
                "status": r.get("status"),
                "reason": r.get("reason"),
                "evidencePath": r.get("evidencePath"),
                "analysisVersion": r.get("analysisVersion"),
            })),
        });
        if let Some(reachability_id) = reachability.as_ref().and_then(|r| r.get("reachabilityId")) {
            doc["reachabilityId"] = reachability_id.clone();
        }
        docs.push(doc);
    }

    let report = write_documents(&FindingsValidator, store, docs, &BulkOptions::default())?;

    let finding_ids: HashSet<&str> = all_findings.iter().filter_map(|f| f.get("findingId").and_then(Value::as_str)).collect();
    let artifact_repo_builds: HashSet<(String, String)> = artifact_docs
        .iter()
        .filter_map(|a| Some((a.get("repo")?.as_str()?.to_string(), a.get("buildId")?.as_str()?.to_string())))
        .collect();

    let mut broken_ids = Vec::new();

    let broken_reachability_refs_count = reachability_docs
        .iter()
        .filter(|doc| {
            let fid = doc.get("findingId").and_then(Value::as_str).unwrap_or_default();
            let broken = !finding_ids.contains(fid);
            if broken {
                broken_ids.push(fid.to_string());
            }
            broken
        })
        .count();

    let broken_explanation_refs_count = all_findings
        .iter()
        .filter(|doc| {
            let Some(explanation) = doc.get("priorityExplanation") else { return false };
            let host_id = doc.get("findingId").and_then(Value::as_str).unwrap_or_default();
            let referenced_id = explanation.get("findingId").and_then(Value::as_str).unwrap_or_default();
            let broken = referenced_id != host_id;
            if broken {
                broken_ids.push(host_id.to_string());
            }
            broken
        })
        .count();

    let broken_dependency_build_refs_count = dependency_docs
        .iter()
        .filter(|doc| {
            let dependency_id = doc.get("dependencyId").and_then(Value::as_str).unwrap_or_default();
            let repo = doc.get("repo").and_then(Value::as_str).unwrap_or_default().to_string();
            let build_id = doc.get("buildId").and_then(Value::as_str).unwrap_or_default().to_string();
            let broken = !artifact_repo_builds.contains(&(repo, build_id));
            if broken {
                broken_ids.push(dependency_id.to_string());
            }
            broken
        })
        .count();

    broken_ids.sort();
    broken_ids.dedup();
    broken_ids.truncate(MAX_SAMPLE_BROKEN_IDS);

    Ok(EnrichResult {
        stage_report: StageReport::success("enrich", report.succeeded),
        integrity: IntegrityReport {
            broken_reachability_refs_count,
            broken_explanation_refs_count,
            broken_dependency_build_refs_count,
            sample_broken_ids: broken_ids,
        },
        warnings,
    })
}

/// Returns `true` if `doc`'s `repo` and `buildId` fields match `repo` and
/// `build_id`.
fn doc_matches(doc: &Value, repo: &Repo, build_id: &BuildId) -> bool {
    doc.get("repo").and_then(Value::as_str) == Some(repo.as_str())
        && doc.get("buildId").and_then(Value::as_str) == Some(build_id.as_str())
}

/// Groups reachability docs by `findingId` and picks the lexicographically
/// smallest `reachabilityId` as the winner for each. Returns the winners map
/// plus one deterministic warning per findingId with more than one
/// candidate, sorted by findingId.
fn winning_reachability_by_finding(docs: &[Value]) -> (BTreeMap<String, Value>, Vec<String>) {
    let mut by_finding: BTreeMap<String, Vec<&Value>> = BTreeMap::new();
    for doc in docs {
        let finding_id = doc.get("findingId").and_then(Value::as_str).unwrap_or_default().to_string();
        by_finding.entry(finding_id).or_default().push(doc);
    }

    let mut winners = BTreeMap::new();
    let mut warnings = Vec::new();
    for (finding_id, mut candidates) in by_finding {
        candidates.sort_by(|a, b| {
            let a_id = a.get("reachabilityId").and_then(Value::as_str).unwrap_or_default();
            let b_id = b.get("reachabilityId").and_then(Value::as_str).unwrap_or_default();
            a_id.cmp(b_id)
        });
        if candidates.len() > 1 {
            warnings.push(format!("multiple reachability candidates for findingId {finding_id}; smallest reachabilityId wins"));
        }
        if let Some(winner) = candidates.first() {
            winners.insert(finding_id, (*winner).clone());
        }
    }
    (winners, warnings)
}

/// Indexes threat-intel docs by uppercased CVE.
fn index_threat_by_cve(docs: &[Value]) -> BTreeMap<String, Value> {
    docs.iter()
        .filter_map(|doc| {
            let intel_id = doc.get("intelId").and_then(Value::as_str)?;
            Some((intel_id.to_ascii_uppercase(), doc.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use argus_store::InMemoryDocumentStore;

    use super::*;

    fn ids() -> (Repo, BuildId) {
        (Repo::new("acme/widgets").expect("valid"), BuildId::new("b1").expect("valid"))
    }

    fn seed_finding(store: &InMemoryDocumentStore, repo: &Repo, build_id: &BuildId, fingerprint: &str, cves: &[&str]) -> String {
        let finding_id = argus_core::finding_id(repo, build_id, fingerprint).to_string();
        let doc = serde_json::json!({
            "findingId": finding_id,
            "repo": repo.as_str(),
            "buildId": build_id.as_str(),
            "runId": "a".repeat(64),
            "severity": "high",
            "fingerprint": fingerprint,
            "cves": cves,
        });
        store.bulk_upsert("findings", vec![argus_store::BulkDoc { id: finding_id.clone(), body: doc }], &BulkOptions::default()).expect("ok");
        finding_id
    }

    #[test]
    fn enrich_requires_at_least_one_reachability_record() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        let err = run_enrich(&store, &repo, &build_id).unwrap_err();
        assert_eq!(err, PipelineError::EnrichNoReachability);
    }

    #[test]
    fn finding_is_enriched_with_threat_and_reachability_context() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        let finding_id = seed_finding(&store, &repo, &build_id, "fp-1", &["CVE-2024-1111"]);

        let reachability_id = argus_core::reachability_id(
            &argus_core::FindingId::from_hash(finding_id.clone()).expect("valid"),
            "1.0",
            &["__root__".to_string()],
        )
        .to_string();
        store
            .bulk_upsert(
                "reachability",
                vec![argus_store::BulkDoc {
                    id: reachability_id.clone(),
                    body: serde_json::json!({
                        "reachabilityId": reachability_id,
                        "findingId": finding_id,
                        "runId": "a".repeat(64),
                        "analysisVersion": "1.0",
                        "reachable": true,
                        "status": "REACHABLE",
                        "evidencePath": ["__root__"],
                        "confidenceScore": 0.95,
                        "method": "DEPENDENCY_GRAPH_BFS",
                        "computedAt": 0,
                    }),
                }],
                &BulkOptions::default(),
            )
            .expect("ok");
        store
            .bulk_upsert(
                "threat_intel",
                vec![argus_store::BulkDoc {
                    id: "CVE-2024-1111".to_string(),
                    body: serde_json::json!({"intelId": "CVE-2024-1111", "kev": true, "epss": 0.91}),
                }],
                &BulkOptions::default(),
            )
            .expect("ok");

        let result = run_enrich(&store, &repo, &build_id).expect("enriches");
        assert_eq!(result.stage_report.written, 1);
        let stored = store.get_by_id("findings", &finding_id).expect("ok").expect("present");
        assert_eq!(stored["context"]["threat"]["kev"], serde_json::json!(true));
        assert_eq!(stored["context"]["reachability"]["reachable"], serde_json::json!(true));
    }

    #[test]
    fn integrity_check_detects_all_three_broken_reference_kinds() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        let finding_id = seed_finding(&store, &repo, &build_id, "fp-1", &[]);

        // Broken reachability ref: findingId not present anywhere.
        store
            .bulk_upsert(
                "reachability",
                vec![argus_store::BulkDoc {
                    id: "z".repeat(64),
                    body: serde_json::json!({
                        "reachabilityId": "z".repeat(64),
                        "findingId": "f".repeat(64),
                        "runId": "a".repeat(64),
                        "analysisVersion": "1.0",
                        "reachable": false,
                        "status": "INSUFFICIENT_DATA",
                        "evidencePath": [],
                        "method": "DEPENDENCY_GRAPH_BFS",
                    }),
                }],
                &BulkOptions::default(),
            )
            .expect("ok");

        // Broken explanation ref: priorityExplanation points elsewhere.
        let mut broken_explanation_finding = store.get_by_id("findings", &finding_id).expect("ok").expect("present");
        broken_explanation_finding["priorityExplanation"] = serde_json::json!({"findingId": "e".repeat(64)});
        store
            .bulk_upsert("findings", vec![argus_store::BulkDoc { id: finding_id.clone(), body: broken_explanation_finding }], &BulkOptions::default())
            .expect("ok");

        // Broken dependency-build ref: no artifact for (repo, buildId).
        let dependency_id = argus_core::dependency_id(&repo, &build_id, "__root__", "left-pad", "1.0.0", "runtime").to_string();
        store
            .bulk_upsert(
                "dependencies",
                vec![argus_store::BulkDoc {
                    id: dependency_id.clone(),
                    body: serde_json::json!({
                        "dependencyId": dependency_id,
                        "repo": repo.as_str(),
                        "buildId": build_id.as_str(),
                        "runId": "a".repeat(64),
                        "parent": "__root__",
                        "child": "left-pad",
                        "version": "1.0.0",
                        "scope": "runtime",
                    }),
                }],
                &BulkOptions::default(),
            )
            .expect("ok");

        let result = run_enrich(&store, &repo, &build_id).expect("enriches");
        assert_eq!(result.integrity.broken_reachability_refs_count, 1);
        assert_eq!(result.integrity.broken_explanation_refs_count, 1);
        assert_eq!(result.integrity.broken_dependency_build_refs_count, 1);
        assert!(!result.integrity.sample_broken_ids.is_empty());
    }
}
