// argus-pipeline/src/act.rs
// ============================================================================
// Module: Act Stage
// Description: Generates dry-run ticket and chat actions for the top-N
//   ranking, enforcing idempotency and the dry-run-only execution model.
// Dependencies: argus-actions, argus-core, argus-store, argus-writers,
//   serde_json
// ============================================================================

//! ## Overview
//! The act stage never calls an external system; it persists would-be
//! payloads and their idempotency keys. Every action this stage writes goes
//! through [`argus_actions::resolve_action`] first, so a rerun with an
//! incremented `attempt` against the same selection always resolves to
//! `SKIPPED_DUPLICATE` without mutating the stored document.

use argus_actions::chat;
use argus_actions::ticket;
use argus_actions::ActionOutcome;
use argus_actions::ActionPayload;
use argus_core::BuildId;
use argus_core::Repo;
use argus_core::RunId;
use argus_store::BulkOptions;
use argus_store::DocumentStore;
use argus_writers::validators::ActionsValidator;
use argus_writers::write_documents;
use serde_json::Value;

use crate::error::PipelineError;
use crate::score::RankedFinding;
use crate::stages::StageReport;

/// One action's resolved outcome, surfaced to the orchestrator's `keyIds`.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    /// The action type discriminant (`JIRA_CREATE`, `CHAT_SUMMARY`,
    /// `CHAT_THREAD`).
    pub action_type: &'static str,
    /// The action's `actionId`, equal to its idempotency key.
    pub action_id: String,
    /// Whether this resolved to a skipped duplicate.
    pub duplicate: bool,
}

/// Outcome of [`run_act`].
#[derive(Debug, Clone)]
pub struct ActResult {
    /// Stage-level report (`written` counts newly created action docs).
    pub stage_report: StageReport,
    /// Every action resolved during this run, in generation order.
    pub actions: Vec<ActionRecord>,
}

/// Runs the act stage over `ranking`, generating one ticket per finding plus
/// one chat summary and one chat thread per finding.
///
/// # Errors
///
/// Returns [`PipelineError::ActionWriteBlocked`] when `dry_run` is `false`.
/// Returns [`PipelineError::AcquirePipelineFailed`] when a payload fails to
/// hash or exceeds its block budget. Returns [`PipelineError::Store`] when
/// the underlying store transport fails.
pub fn run_act(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    ranking: &[RankedFinding],
    dry_run: bool,
    attempt: i64,
) -> Result<ActResult, PipelineError> {
    if !dry_run {
        return Err(PipelineError::ActionWriteBlocked);
    }

    let mut records = Vec::new();
    let mut written = 0usize;

    for ranked in ranking {
        let Some(finding) = store.get_by_id("findings", &ranked.finding_id)? else { continue };
        let record = act_ticket(store, repo, build_id, run_id, &finding, attempt)?;
        if !record.duplicate {
            written += 1;
        }
        records.push(record);
    }

    let finding_ids: Vec<String> = ranking.iter().map(|r| r.finding_id.clone()).collect();
    let summary_record = act_chat_summary(store, repo, build_id, run_id, &finding_ids, attempt)?;
    if !summary_record.duplicate {
        written += 1;
    }
    records.push(summary_record);

    for finding_id in &finding_ids {
        let record = act_chat_thread(store, repo, build_id, run_id, finding_id, attempt)?;
        if !record.duplicate {
            written += 1;
        }
        records.push(record);
    }

    Ok(ActResult { stage_report: StageReport::success("act", written), actions: records })
}

/// Reads the stored attempt for `key`, if an action with that idempotency
/// key already exists.
fn existing_pairs(store: &dyn DocumentStore, key: &str) -> Result<Vec<(String, i64)>, PipelineError> {
    let existing = store.get_by_id("actions", key)?;
    Ok(existing
        .and_then(|doc| doc.get("attempt").and_then(Value::as_i64).map(|attempt| vec![(key.to_string(), attempt)]))
        .unwrap_or_default())
}

/// Writes an action document only when `outcome` is a fresh creation; a
/// skipped duplicate leaves the stored document untouched.
fn persist_if_created(
    store: &dyn DocumentStore,
    run_id: &RunId,
    key: &str,
    action_type: &str,
    payload: &ActionPayload,
    outcome: &ActionOutcome,
) -> Result<(), PipelineError> {
    if outcome.duplicate {
        return Ok(());
    }
    if let ActionPayload::ChatSummary(summary) = payload {
        let mut expected = summary.finding_ids.clone();
        expected.sort();
        if expected != summary.finding_ids {
            return Err(PipelineError::Internal("chat summary findingIds are not sorted ascending".to_string()));
        }
    }
    let payload_hash = argus_actions::payload_hash(payload).map_err(|err| PipelineError::Internal(err.to_string()))?;
    let doc = serde_json::json!({
        "actionId": key,
        "idempotencyKey": key,
        "runId": run_id.as_str(),
        "type": action_type,
        "status": "DRY_RUN_READY",
        "attempt": outcome.attempt,
        "payloadHash": payload_hash,
        "templateVersion": argus_actions::TEMPLATE_VERSION,
        "payload": payload,
    });
    write_documents(&ActionsValidator, store, vec![doc], &BulkOptions::default())?;
    Ok(())
}

/// Builds and resolves a single ticket action for `finding`.
fn act_ticket(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    finding: &Value,
    attempt: i64,
) -> Result<ActionRecord, PipelineError> {
    let finding_id = finding.get("findingId").and_then(Value::as_str).unwrap_or_default();
    let cves: Vec<String> = finding.get("cves").and_then(Value::as_array).into_iter().flatten().filter_map(|v| v.as_str().map(str::to_string)).collect();
    let evidence_path: Vec<String> = finding
        .get("context")
        .and_then(|c| c.get("reachability"))
        .and_then(|r| r.get("evidencePath"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    let reason_codes: Vec<String> = finding
        .get("priorityExplanation")
        .and_then(|e| e.get("reasonCodes"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    let ctx = ticket::TicketFindingContext {
        repo: repo.as_str(),
        build_id: build_id.as_str(),
        finding_id,
        rule_id: finding.get("ruleId").and_then(Value::as_str).unwrap_or_default(),
        severity: finding.get("severity").and_then(Value::as_str).unwrap_or_default(),
        package: finding.get("package").and_then(Value::as_str).unwrap_or_default(),
        version: finding.get("version").and_then(Value::as_str).unwrap_or_default(),
        cve: cves.first().map(String::as_str),
        reachable: finding.get("context").and_then(|c| c.get("reachability")).and_then(|r| r.get("reachable")).and_then(Value::as_bool),
        evidence_path: &evidence_path,
        kev: finding.get("context").and_then(|c| c.get("threat")).and_then(|t| t.get("kev")).and_then(Value::as_bool),
        epss: finding.get("context").and_then(|c| c.get("threat")).and_then(|t| t.get("epss")).and_then(Value::as_f64),
        priority_score: finding.get("priorityScore").and_then(Value::as_i64),
        reason_codes: &reason_codes,
    };

    let key = ticket::ticket_idempotency_key(&ctx).map_err(|err| PipelineError::Internal(err.to_string()))?;
    let payload = ActionPayload::Ticket(ticket::build_ticket_payload(&ctx));
    let existing = existing_pairs(store, &key)?;
    let outcome = argus_actions::resolve_action(&existing, &key, attempt, true).map_err(|err| PipelineError::Internal(err.to_string()))?;
    persist_if_created(store, run_id, &key, "JIRA_CREATE", &payload, &outcome)?;

    Ok(ActionRecord { action_type: "JIRA_CREATE", action_id: key, duplicate: outcome.duplicate })
}

/// Builds and resolves the single chat summary action for `finding_ids`.
fn act_chat_summary(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    finding_ids: &[String],
    attempt: i64,
) -> Result<ActionRecord, PipelineError> {
    let blocks: Vec<Value> = finding_ids
        .iter()
        .filter_map(|id| store.get_by_id("findings", id).ok().flatten())
        .map(|finding| serde_json::Value::String(chat::render_rationale(&rationale_fields(&finding))))
        .collect();

    let key = chat::chat_summary_idempotency_key(repo.as_str(), build_id.as_str(), finding_ids)
        .map_err(|err| PipelineError::Internal(err.to_string()))?;
    let mut sorted_finding_ids = finding_ids.to_vec();
    sorted_finding_ids.sort();
    let payload = ActionPayload::ChatSummary(
        chat::build_chat_summary_payload(sorted_finding_ids, blocks).map_err(|err| PipelineError::Internal(err.to_string()))?,
    );
    let existing = existing_pairs(store, &key)?;
    let outcome = argus_actions::resolve_action(&existing, &key, attempt, true).map_err(|err| PipelineError::Internal(err.to_string()))?;
    persist_if_created(store, run_id, &key, "CHAT_SUMMARY", &payload, &outcome)?;

    Ok(ActionRecord { action_type: "CHAT_SUMMARY", action_id: key, duplicate: outcome.duplicate })
}

/// Builds and resolves the chat thread action for a single finding.
fn act_chat_thread(
    store: &dyn DocumentStore,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    finding_id: &str,
    attempt: i64,
) -> Result<ActionRecord, PipelineError> {
    let finding = store.get_by_id("findings", finding_id)?;
    let blocks = finding.as_ref().map(|f| vec![Value::String(chat::render_rationale(&rationale_fields(f)))]).unwrap_or_default();

    let key = chat::chat_thread_idempotency_key(repo.as_str(), build_id.as_str(), finding_id)
        .map_err(|err| PipelineError::Internal(err.to_string()))?;
    let payload = ActionPayload::ChatThread(
        chat::build_chat_thread_payload(finding_id.to_string(), blocks).map_err(|err| PipelineError::Internal(err.to_string()))?,
    );
    let existing = existing_pairs(store, &key)?;
    let outcome = argus_actions::resolve_action(&existing, &key, attempt, true).map_err(|err| PipelineError::Internal(err.to_string()))?;
    persist_if_created(store, run_id, &key, "CHAT_THREAD", &payload, &outcome)?;

    Ok(ActionRecord { action_type: "CHAT_THREAD", action_id: key, duplicate: outcome.duplicate })
}

/// Extracts [`chat::RationaleFields`] from a stored finding document.
fn rationale_fields(finding: &Value) -> chat::RationaleFields<'_> {
    chat::RationaleFields {
        severity: finding.get("severity").and_then(Value::as_str),
        package: finding.get("package").and_then(Value::as_str),
        version: finding.get("version").and_then(Value::as_str),
        cve: finding.get("cves").and_then(Value::as_array).and_then(|arr| arr.first()).and_then(Value::as_str),
        reachable: finding.get("context").and_then(|c| c.get("reachability")).and_then(|r| r.get("reachable")).and_then(Value::as_bool),
        priority_score: finding.get("priorityScore").and_then(Value::as_i64),
    }
}

#[cfg(test)]
mod tests {
    use argus_store::InMemoryDocumentStore;

    use super::*;

    fn ids() -> (Repo, BuildId, RunId) {
        (Repo::new("acme/widgets").expect("valid"), BuildId::new("b1").expect("valid"), RunId::from_hash("a".repeat(64)).expect("valid"))
    }

    fn seed_scored_finding(store: &InMemoryDocumentStore, repo: &Repo, build_id: &BuildId) -> String {
        let finding_id = argus_core::finding_id(repo, build_id, "fp-1").to_string();
        let doc = serde_json::json!({
            "findingId": finding_id,
            "repo": repo.as_str(),
            "buildId": build_id.as_str(),
            "runId": "a".repeat(64),
            "severity": "HIGH",
            "fingerprint": "fp-1",
            "ruleId": "RULE-A",
            "package": "left-pad",
            "version": "1.0.0",
            "cves": ["CVE-2024-1111"],
            "context": {"threat": {"kev": true, "epss": 0.9}, "reachability": {"reachable": true, "evidencePath": ["__root__", "left-pad"]}},
            "priorityScore": 75,
            "priorityExplanation": {"findingId": finding_id, "reasonCodes": ["KEV_TRUE"]},
        });
        store.bulk_upsert("findings", vec![argus_store::BulkDoc { id: finding_id.clone(), body: doc }], &BulkOptions::default()).expect("ok");
        finding_id
    }

    #[test]
    fn live_execution_is_rejected_before_any_write() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let err = run_act(&store, &repo, &build_id, &run_id, &[], false, 1).unwrap_err();
        assert_eq!(err, PipelineError::ActionWriteBlocked);
    }

    #[test]
    fn first_run_creates_actions_second_run_skips_duplicates() {
        let store = InMemoryDocumentStore::new();
        let (repo, build_id, run_id) = ids();
        let finding_id = seed_scored_finding(&store, &repo, &build_id);
        let ranking = vec![RankedFinding { finding_id, repo: repo.as_str().to_string(), build_id: build_id.as_str().to_string(), priority_score: 75 }];

        let first = run_act(&store, &repo, &build_id, &run_id, &ranking, true, 1).expect("acts");
        assert!(first.actions.iter().all(|a| !a.duplicate));
        assert_eq!(first.stage_report.written, 3);

        let second = run_act(&store, &repo, &build_id, &run_id, &ranking, true, 2).expect("acts");
        assert!(second.actions.iter().all(|a| a.duplicate));
        assert_eq!(second.stage_report.written, 0);
        for (a, b) in first.actions.iter().zip(second.actions.iter()) {
            assert_eq!(a.action_id, b.action_id);
        }
    }
}
