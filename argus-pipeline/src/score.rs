// argus-pipeline/src/score.rs
// ============================================================================
// Module: Score Stage
// Description: Computes additive priority scores from enrich context,
//   writes the explanation documents and updated findings, and produces the
//   top-N ranking.
// Dependencies: argus-core, argus-store, argus-writers, serde_json
// ============================================================================

//! ## Overview
//! Every factor's contribution is computed independently of the others and
//! summed; see [`score_finding`] for the fixed point table. The explanation
//! document and the finding's inline `priorityExplanation` are built from
//! the same [`ScoreBreakdown`], so the two can never drift apart.

use argus_core::BuildId;
use argus_core::Repo;
use argus_store::BulkOptions;
use argus_store::DocumentStore;
use argus_writers::validators::ExplanationsValidator;
use argus_writers::validators::FindingsValidator;
use argus_writers::write_documents;
use serde_json::Value;

use crate::error::PipelineError;
use crate::stages::StageReport;

/// Version tag for the score explanation shape, part of `explanationId`
/// identity.
pub const EXPLANATION_VERSION: &str = "1.0";

/// One factor's raw input and point contribution.
#[derive(Debug, Clone, PartialEq)]
struct Factor {
    value: Value,
    points: i64,
    reason_code: Option<&'static str>,
}

/// The five scored factors and their total.
#[derive(Debug, Clone)]
struct ScoreBreakdown {
    kev: Factor,
    epss: Factor,
    reachable: Factor,
    internet_exposed: Factor,
    blast_radius: Factor,
    total: i64,
}

/// One finding's position in the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFinding {
    /// The finding's identifier.
    pub finding_id: String,
    /// Repository the finding belongs to.
    pub repo: String,
    /// Build identifier the finding belongs to.
    pub build_id: String,
    /// The computed priority score.
    pub priority_score: i64,
}

/// Outcome of [`run_score`].
#[derive(Debug, Clone)]
pub struct ScoreResult {
    /// Stage-level report (`written` counts rewritten findings).
    pub stage_report: StageReport,
    /// Top-N findings, sorted `priorityScore DESC, findingId ASC, repo ASC,
    /// buildId ASC`.
    pub ranking: Vec<RankedFinding>,
}

/// Runs the score stage over every `(repo, buildId)`-scoped finding, writes
/// `priority_explanations` and updated findings, and returns the top-N
/// ranking.
///
/// # Errors
///
/// Returns [`PipelineError::ScoreEmptyRanking`] if `top_n` is not positive
/// or the resulting ranking is empty. Returns [`PipelineError::Store`] if
/// the underlying store transport fails.
pub fn run_score(store: &dyn DocumentStore, repo: &Repo, build_id: &BuildId, top_n: usize) -> Result<ScoreResult, PipelineError> {
    if top_n == 0 {
        return Err(PipelineError::ScoreEmptyRanking);
    }

    let findings = store.list("findings")?;
    let scoped: Vec<Value> = findings.into_iter().filter(|doc| doc_matches(doc, repo, build_id)).collect();

    let mut finding_docs = Vec::with_capacity(scoped.len());
    let mut explanation_docs = Vec::with_capacity(scoped.len());
    let mut ranking = Vec::with_capacity(scoped.len());

    for finding in scoped {
        let finding_id = finding.get("findingId").and_then(Value::as_str).unwrap_or_default().to_string();
        let breakdown = score_finding(&finding);
        let inputs = serde_json::json!({
            "kev": breakdown.kev.value,
            "epss": breakdown.epss.value,
            "reachable": breakdown.reachable.value,
            "internetExposed": breakdown.internet_exposed.value,
            "blastRadius": breakdown.blast_radius.value,
        });
        let explanation_id = argus_core::hash(&serde_json::json!({
            "findingId": finding_id,
            "explanationVersion": EXPLANATION_VERSION,
            "inputs": inputs,
        }))
        .map_err(|err| PipelineError::Internal(err.to_string()))?;

        let reason_codes = reason_codes(&breakdown);
        let explanation = serde_json::json!({
            "explanationId": explanation_id,
            "findingId": finding_id,
            "explanationVersion": EXPLANATION_VERSION,
            "inputs": inputs,
            "totalScore": breakdown.total,
            "reasonCodes": reason_codes,
            "contributions": {
                "kev": breakdown.kev.points,
                "epss": breakdown.epss.points,
                "reachable": breakdown.reachable.points,
                "internetExposed": breakdown.internet_exposed.points,
                "blastRadius": breakdown.blast_radius.points,
            },
        });

        let mut updated = finding.clone();
        updated["priorityScore"] = serde_json::json!(breakdown.total);
        updated["priorityExplanation"] = serde_json::json!({
            "findingId": finding_id,
            "explanationId": explanation_id,
            "totalScore": breakdown.total,
            "reasonCodes": reason_codes,
        });

        ranking.push(RankedFinding {
            finding_id: finding_id.clone(),
            repo: finding.get("repo").and_then(Value::as_str).unwrap_or_default().to_string(),
            build_id: finding.get("buildId").and_then(Value::as_str).unwrap_or_default().to_string(),
            priority_score: breakdown.total,
        });

        finding_docs.push(updated);
        explanation_docs.push(explanation);
    }

    let finding_report = write_documents(&FindingsValidator, store, finding_docs, &BulkOptions::default())?;
    write_documents(&ExplanationsValidator, store, explanation_docs, &BulkOptions::default())?;

    ranking.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| a.finding_id.cmp(&b.finding_id))
            .then_with(|| a.repo.cmp(&b.repo))
            .then_with(|| a.build_id.cmp(&b.build_id))
    });
    ranking.truncate(top_n);

    if ranking.is_empty() {
        return Err(PipelineError::ScoreEmptyRanking);
    }

    Ok(ScoreResult { stage_report: StageReport::success("score", finding_report.succeeded), ranking })
}

/// Returns `true` if `doc`'s `repo` and `buildId` fields match `repo` and
/// `build_id`.
fn doc_matches(doc: &Value, repo: &Repo, build_id: &BuildId) -> bool {
    doc.get("repo").and_then(Value::as_str) == Some(repo.as_str())
        && doc.get("buildId").and_then(Value::as_str) == Some(build_id.as_str())
}

/// Computes the additive score breakdown for a single enriched finding.
fn score_finding(finding: &Value) -> ScoreBreakdown {
    let context = finding.get("context");
    let kev_value = context.and_then(|c| c.get("threat")).and_then(|t| t.get("kev")).cloned().unwrap_or(Value::Null);
    let kev = kev_value.as_bool().unwrap_or(false);
    let kev_factor = Factor {
        value: kev_value,
        points: if kev { 30 } else { 0 },
        reason_code: if kev { Some("KEV_TRUE") } else { None },
    };

    let epss_value = context.and_then(|c| c.get("threat")).and_then(|t| t.get("epss")).cloned().unwrap_or(Value::Null);
    let epss = epss_value.as_f64();
    let (epss_points, epss_reason) = match epss {
        Some(e) if e >= 0.5 => (20, Some("EPSS_HIGH")),
        Some(e) if e >= 0.1 => (10, Some("EPSS_MEDIUM")),
        Some(e) if e > 0.0 => (2, Some("EPSS_LOW")),
        _ => (0, None),
    };
    let epss_factor = Factor { value: epss_value, points: epss_points, reason_code: epss_reason };

    let reachable_value =
        context.and_then(|c| c.get("reachability")).and_then(|r| r.get("reachable")).cloned().unwrap_or(Value::Null);
    let reachable = reachable_value.as_bool().unwrap_or(false);
    let reachable_factor = Factor {
        value: reachable_value,
        points: if reachable { 25 } else { 0 },
        reason_code: if reachable { Some("REACHABLE_TRUE") } else { None },
    };

    let exposed_value = finding.get("internetExposed").cloned().unwrap_or(Value::Null);
    let exposed = exposed_value.as_bool().unwrap_or(false);
    let exposed_factor = Factor {
        value: exposed_value,
        points: if exposed { 15 } else { 0 },
        reason_code: if exposed { Some("INTERNET_EXPOSED_TRUE") } else { None },
    };

    let blast_value = finding.get("blastRadius").cloned().unwrap_or(Value::Null);
    let blast = blast_value.as_f64();
    let (blast_points, blast_reason) = match blast {
        Some(b) if b >= 10.0 => (10, Some("BLAST_RADIUS_HIGH")),
        Some(b) if b >= 3.0 => (5, Some("BLAST_RADIUS_MEDIUM")),
        Some(_) => (1, Some("BLAST_RADIUS_LOW")),
        None => (0, None),
    };
    let blast_factor = Factor { value: blast_value, points: blast_points, reason_code: blast_reason };

    let total = kev_factor.points + epss_factor.points + reachable_factor.points + exposed_factor.points + blast_factor.points;

    ScoreBreakdown { kev: kev_factor, epss: epss_factor, reachable: reachable_factor, internet_exposed: exposed_factor, blast_radius: blast_factor, total }
}

/// Collects the reason codes a [`ScoreBreakdown`] triggered, in fixed factor
/// order.
fn reason_codes(breakdown: &ScoreBreakdown) -> Vec<&'static str> {
    [&breakdown.kev, &breakdown.epss, &breakdown.reachable, &breakdown.internet_exposed, &breakdown.blast_radius]
        .into_iter()
        .filter_map(|factor| factor.reason_code)
        .collect()
}

#[cfg(test)]
mod tests {
    use argus_store::InMemoryDocumentStore;

    use super::*;

    fn ids() -> (Repo, BuildId) {
        (Repo::new("acme/widgets").expect("valid"), BuildId::new("b1").expect("valid"))
    }

    fn seed_enriched_finding(store: &InMemoryDocumentStore, repo: &Repo, build_id: &BuildId, fingerprint: &str, kev: bool, epss: f64, reachable: bool) -> String {
        let finding_id = argus_core::finding_id(repo, build_id, fingerprint).to_string();
        let doc = serde_json::json!({
            "findingId": finding_id,
            "repo": repo.as_str(),
            "buildId": build_id.as_str(),
            "runId": "a".repeat(64),
            "severity": "high",
            "fingerprint": fingerprint,
            "context": {
                "threat": {"kev": kev, "epss": epss},
                "reachability": {"reachable": reachable},
            },
        });
        store.bulk_upsert("findings", vec![argus_store::BulkDoc { id: finding_id.clone(), body: doc }], &BulkOptions::default()).expect("ok");
        finding_id
    }

    #[test]
    fn scenario_a_ranking_and_scores() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        let finding_a = seed_enriched_finding(&store, &repo, &build_id, "fp-a", true, 0.91, true);
        let finding_b = seed_enriched_finding(&store, &repo, &build_id, "fp-b", false, 0.26, true);

        let result = run_score(&store, &repo, &build_id, 10).expect("scores");
        assert_eq!(result.ranking[0].finding_id, finding_a);
        assert_eq!(result.ranking[0].priority_score, 75);
        assert_eq!(result.ranking[1].finding_id, finding_b);
        assert_eq!(result.ranking[1].priority_score, 35);
    }

    #[test]
    fn top_n_zero_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        seed_enriched_finding(&store, &repo, &build_id, "fp-a", true, 0.91, true);
        let err = run_score(&store, &repo, &build_id, 0).unwrap_err();
        assert_eq!(err, PipelineError::ScoreEmptyRanking);
    }

    #[test]
    fn empty_scope_yields_empty_ranking_error() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        let err = run_score(&store, &repo, &build_id, 5).unwrap_err();
        assert_eq!(err, PipelineError::ScoreEmptyRanking);
    }

    #[test]
    fn rerunning_score_is_deterministic() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id) = ids();
        seed_enriched_finding(&store, &repo, &build_id, "fp-a", true, 0.91, true);
        let first = run_score(&store, &repo, &build_id, 10).expect("scores");
        let second = run_score(&store, &repo, &build_id, 10).expect("scores");
        assert_eq!(first.ranking, second.ranking);
    }
}
