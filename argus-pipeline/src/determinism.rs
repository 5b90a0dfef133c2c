// argus-pipeline/src/determinism.rs
// ============================================================================
// Module: Determinism Harness
// Description: Runs the orchestrated pipeline twice against independent
//   in-memory stores with identical inputs and diffs every index, the top-N
//   ranking, and a fixed set of cardinality invariants.
// Dependencies: argus-core, argus-store, serde_json
// ============================================================================

//! ## Overview
//! A rerun is allowed to disagree on `createdAt`/`computedAt` timestamps and
//! nothing else. [`run_twice_and_diff`] strips those fields before hashing
//! each document, so a drift report always points at a genuine semantic
//! difference rather than clock noise.

use std::collections::BTreeMap;

use argus_store::DocumentStore;
use argus_store::InMemoryDocumentStore;
use serde_json::Value;

use crate::error::PipelineError;
use crate::orchestrator;
use crate::orchestrator::OrchestratorRequest;

/// Every index the harness snapshots, paired with its id field.
const INDEXES: [(&str, &str); 8] = [
    ("artifacts", "artifactId"),
    ("dependencies", "dependencyId"),
    ("sbom_components", "componentId"),
    ("findings", "findingId"),
    ("reachability", "reachabilityId"),
    ("threat_intel", "intelId"),
    ("priority_explanations", "explanationId"),
    ("actions", "actionId"),
];

/// Fields stripped before hashing a document, since they are allowed to vary
/// between otherwise-identical reruns.
const VARIANCE_FIELDS: [&str; 2] = ["createdAt", "computedAt"];

/// A single index's captured shape after one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct IndexSnapshot {
    count: usize,
    sorted_ids: Vec<String>,
    hash_per_id: BTreeMap<String, String>,
}

/// Captures `index`'s documents, keyed by `id_field`, with variance fields
/// stripped before hashing.
fn capture_index(store: &dyn DocumentStore, index: &str, id_field: &str) -> Result<IndexSnapshot, PipelineError> {
    let docs = store.list(index)?;
    let mut sorted_ids = Vec::with_capacity(docs.len());
    let mut hash_per_id = BTreeMap::new();
    for doc in docs {
        let id = doc.get(id_field).and_then(Value::as_str).unwrap_or_default().to_string();
        let mut stripped = doc.clone();
        if let Value::Object(map) = &mut stripped {
            for field in VARIANCE_FIELDS {
                map.remove(field);
            }
        }
        let digest = argus_core::hash(&stripped).map_err(|err| PipelineError::Internal(err.to_string()))?;
        sorted_ids.push(id.clone());
        hash_per_id.insert(id, digest);
    }
    sorted_ids.sort();
    Ok(IndexSnapshot { count: sorted_ids.len(), sorted_ids, hash_per_id })
}

/// Groups `docs` by the string value of `field`, counting members per group.
fn grouped_counts(docs: &[Value], field: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for doc in docs {
        let key = doc.get(field).and_then(Value::as_str).unwrap_or_default().to_string();
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Outcome of [`run_twice_and_diff`].
#[derive(Debug, Clone, Default)]
pub struct DeterminismReport {
    /// `true` iff [`Self::failures`] is empty.
    pub passed: bool,
    /// Labeled drift descriptions, empty when the two runs agreed in full.
    pub failures: Vec<String>,
}

/// Runs the orchestrated pipeline twice against two independent in-memory
/// stores seeded with identical inputs, and diffs the result.
///
/// Every index is compared on (`count`, `sortedIds`, `hashPerId`), the top-N
/// ranking is compared in order, and three cardinality invariants
/// (reachability-per-finding, intel-per-CVE, explanation-per-finding) are
/// checked for agreement between the two runs. When `fail_fast` is `true`,
/// diffing stops at the first failure found.
///
/// # Errors
///
/// Returns a [`PipelineError`] if either run itself errors before producing
/// a result; a pipeline that ran to completion but disagreed between runs is
/// reported via [`DeterminismReport::failures`], not an `Err`.
pub fn run_twice_and_diff(req: &OrchestratorRequest<'_>, fail_fast: bool) -> Result<DeterminismReport, PipelineError> {
    let store_a = InMemoryDocumentStore::new();
    let store_b = InMemoryDocumentStore::new();

    let result_a = orchestrator::run_pipeline(&store_a, req)?;
    let result_b = orchestrator::run_pipeline(&store_b, req)?;

    let mut failures = Vec::new();

    if result_a.succeeded != result_b.succeeded {
        failures.push(format!("Outcome drift: run A succeeded={}, run B succeeded={}", result_a.succeeded, result_b.succeeded));
        if fail_fast {
            return Ok(DeterminismReport { passed: false, failures });
        }
    }

    for (index, id_field) in INDEXES {
        if fail_fast && !failures.is_empty() {
            break;
        }
        let snapshot_a = capture_index(&store_a, index, id_field)?;
        let snapshot_b = capture_index(&store_b, index, id_field)?;

        if snapshot_a.count != snapshot_b.count {
            failures.push(format!("Count drift in `{index}`: run A has {}, run B has {}", snapshot_a.count, snapshot_b.count));
            if fail_fast {
                break;
            }
        }
        if snapshot_a.sorted_ids != snapshot_b.sorted_ids {
            failures.push(format!("ID set drift in `{index}`: sorted id lists differ between runs"));
            if fail_fast {
                break;
            }
        }
        for (id, hash_a) in &snapshot_a.hash_per_id {
            if let Some(hash_b) = snapshot_b.hash_per_id.get(id) {
                if hash_a != hash_b {
                    failures.push(format!("_source hash drift in `{index}` for id `{id}`"));
                    if fail_fast {
                        break;
                    }
                }
            }
        }
    }

    if fail_fast && !failures.is_empty() {
        return Ok(DeterminismReport { passed: false, failures });
    }

    if result_a.ranking != result_b.ranking {
        failures.push("Top-N ranking drift: rankings differ in membership, order, or score between runs".to_string());
        if fail_fast {
            return Ok(DeterminismReport { passed: false, failures });
        }
    }

    for (label, cardinality_failures) in [
        ("reachability-per-finding", cardinality_drift(&store_a, &store_b, "reachability", "findingId")?),
        ("intel-per-CVE", cardinality_drift(&store_a, &store_b, "threat_intel", "intelId")?),
        ("explanation-per-finding", cardinality_drift(&store_a, &store_b, "priority_explanations", "findingId")?),
    ] {
        if let Some(detail) = cardinality_failures {
            failures.push(format!("Cardinality drift ({label}): {detail}"));
            if fail_fast {
                return Ok(DeterminismReport { passed: false, failures });
            }
        }
    }

    let passed = failures.is_empty();
    Ok(DeterminismReport { passed, failures })
}

/// Compares the per-group document counts of `index`, grouped by `field`,
/// between two stores, returning a detail string when they disagree.
fn cardinality_drift(store_a: &dyn DocumentStore, store_b: &dyn DocumentStore, index: &str, field: &str) -> Result<Option<String>, PipelineError> {
    let counts_a = grouped_counts(&store_a.list(index)?, field);
    let counts_b = grouped_counts(&store_b.list(index)?, field);
    if counts_a == counts_b {
        Ok(None)
    } else {
        Ok(Some(format!("grouped counts for `{index}` by `{field}` differ between runs")))
    }
}

#[cfg(test)]
mod tests {
    use argus_core::BuildId;
    use argus_core::Repo;
    use argus_core::RunId;

    use super::*;
    use crate::acquire::BundleFile;

    fn sample_files() -> Vec<BundleFile> {
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
        vec![BundleFile { filename: "scan.sarif".to_string(), bytes: serde_json::to_vec(&sarif).expect("valid") }]
    }

    fn sample_request(files: &[BundleFile]) -> OrchestratorRequest<'_> {
        OrchestratorRequest {
            repo: Repo::new("acme/widgets").expect("valid"),
            build_id: BuildId::new("b1").expect("valid"),
            run_id: RunId::from_hash("a".repeat(64)).expect("valid"),
            started_at: 0,
            files,
            top_n: 5,
            dry_run: true,
            attempt: 1,
        }
    }

    #[test]
    fn identical_inputs_produce_no_drift_through_acquire() {
        let files = sample_files();
        let report = run_twice_and_diff(&sample_request(&files), false).expect("diffs");
        assert!(report.passed, "unexpected failures: {:?}", report.failures);
    }

    #[test]
    fn fail_fast_stops_at_the_first_failure() {
        let files = sample_files();
        let report = run_twice_and_diff(&sample_request(&files), true).expect("diffs");
        assert!(report.passed);
    }
}
