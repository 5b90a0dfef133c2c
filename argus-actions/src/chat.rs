// argus-actions/src/chat.rs
// ============================================================================
// Module: Argus Chat Actions
// Description: Chat summary and per-finding thread dry-run payloads.
// Dependencies: argus-core, serde, serde_json
// ============================================================================

//! ## Overview
//! One [`ChatSummaryPayload`] covers the whole top-N ranking for a
//! `(repo, buildId)` pair; one [`ChatThreadPayload`] covers a single finding.
//! Both carry a fixed block budget (12 for summaries, 6 for threads)
//! enforced at construction time rather than left to the caller to check.

use crate::error::ActionError;
use crate::idempotency_key;
use crate::TEMPLATE_VERSION;

/// Maximum number of blocks a summary action may carry.
pub const SUMMARY_BLOCK_BUDGET: usize = 12;
/// Maximum number of blocks a thread action may carry.
pub const THREAD_BLOCK_BUDGET: usize = 6;

/// Fields used to render a finding's rationale line, in the stable order
/// they always appear in regardless of which are present.
#[derive(Debug, Clone)]
pub struct RationaleFields<'a> {
    /// Upper-cased severity, or `None` if unknown.
    pub severity: Option<&'a str>,
    /// Affected package name.
    pub package: Option<&'a str>,
    /// Affected package version.
    pub version: Option<&'a str>,
    /// First associated CVE.
    pub cve: Option<&'a str>,
    /// Reachability verdict.
    pub reachable: Option<bool>,
    /// Final additive priority score.
    pub priority_score: Option<i64>,
}

/// Renders a rationale line with `N/A` placeholders for any missing field,
/// in fixed field order: severity, package, cve, reachable, priority.
#[must_use]
pub fn render_rationale(fields: &RationaleFields<'_>) -> String {
    let package = match (fields.package, fields.version) {
        (Some(p), Some(v)) => format!("{p}@{v}"),
        (Some(p), None) => p.to_string(),
        _ => "N/A".to_string(),
    };
    format!(
        "Severity: {} | Package: {} | CVE: {} | Reachable: {} | Priority: {}",
        fields.severity.unwrap_or("N/A"),
        package,
        fields.cve.unwrap_or("N/A"),
        fields.reachable.map_or_else(|| "N/A".to_string(), |r| r.to_string()),
        fields.priority_score.map_or_else(|| "N/A".to_string(), |s| s.to_string()),
    )
}

/// A single summary chat action spanning the top-N findings for a build.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatSummaryPayload {
    /// Ids of the findings included in the summary, sorted ascending.
    pub finding_ids: Vec<String>,
    /// Opaque rendered chat blocks.
    pub blocks: Vec<serde_json::Value>,
}

/// A single per-finding chat thread action.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatThreadPayload {
    /// The finding this thread reply is about.
    pub finding_id: String,
    /// Opaque rendered chat blocks.
    pub blocks: Vec<serde_json::Value>,
}

/// Builds a summary payload, rejecting block lists over [`SUMMARY_BLOCK_BUDGET`].
///
/// # Errors
///
/// Returns [`ActionError::BlockBudgetExceeded`] when `blocks.len()` exceeds
/// the summary budget.
pub fn build_chat_summary_payload(
    finding_ids: Vec<String>,
    blocks: Vec<serde_json::Value>,
) -> Result<ChatSummaryPayload, ActionError> {
    if blocks.len() > SUMMARY_BLOCK_BUDGET {
        return Err(ActionError::BlockBudgetExceeded { kind: "CHAT_SUMMARY", count: blocks.len(), max: SUMMARY_BLOCK_BUDGET });
    }
    Ok(ChatSummaryPayload { finding_ids, blocks })
}

/// Builds a thread payload, rejecting block lists over [`THREAD_BLOCK_BUDGET`].
///
/// # Errors
///
/// Returns [`ActionError::BlockBudgetExceeded`] when `blocks.len()` exceeds
/// the thread budget.
pub fn build_chat_thread_payload(
    finding_id: String,
    blocks: Vec<serde_json::Value>,
) -> Result<ChatThreadPayload, ActionError> {
    if blocks.len() > THREAD_BLOCK_BUDGET {
        return Err(ActionError::BlockBudgetExceeded { kind: "CHAT_THREAD", count: blocks.len(), max: THREAD_BLOCK_BUDGET });
    }
    Ok(ChatThreadPayload { finding_id, blocks })
}

/// Computes `topNHash = hash(concat(sortedSelectedFindingIds joined by
/// '|'))`. Sorting before joining makes the hash, and therefore the summary
/// idempotency key, insensitive to the order the caller selected findings
/// in.
///
/// # Errors
///
/// Returns [`ActionError::Hash`] if canonicalization fails.
pub fn top_n_hash(selected_finding_ids: &[String]) -> Result<String, ActionError> {
    let mut sorted = selected_finding_ids.to_vec();
    sorted.sort();
    let joined = sorted.join("|");
    argus_core::hash(&serde_json::Value::String(joined)).map_err(|err| ActionError::Hash(err.to_string()))
}

/// Derives the summary idempotency key from `(repo, buildId, topNHash, templateVersion)`.
///
/// # Errors
///
/// Returns [`ActionError::Hash`] if canonicalization fails.
pub fn chat_summary_idempotency_key(repo: &str, build_id: &str, selected_finding_ids: &[String]) -> Result<String, ActionError> {
    let top_n = top_n_hash(selected_finding_ids)?;
    idempotency_key(&[
        ("type", "CHAT_SUMMARY"),
        ("repo", repo),
        ("buildId", build_id),
        ("topNHash", top_n.as_str()),
        ("templateVersion", TEMPLATE_VERSION),
    ])
}

/// Derives the thread idempotency key from `(repo, buildId, findingId, templateVersion)`.
///
/// # Errors
///
/// Returns [`ActionError::Hash`] if canonicalization fails.
pub fn chat_thread_idempotency_key(repo: &str, build_id: &str, finding_id: &str) -> Result<String, ActionError> {
    idempotency_key(&[
        ("type", "CHAT_THREAD"),
        ("repo", repo),
        ("buildId", build_id),
        ("findingId", finding_id),
        ("templateVersion", TEMPLATE_VERSION),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rationale_uses_na_placeholders_for_missing_fields() {
        let fields = RationaleFields { severity: Some("HIGH"), package: None, version: None, cve: None, reachable: None, priority_score: None };
        assert_eq!(render_rationale(&fields), "Severity: HIGH | Package: N/A | CVE: N/A | Reachable: N/A | Priority: N/A");
    }

    #[test]
    fn summary_payload_rejects_too_many_blocks() {
        let blocks = vec![serde_json::json!({}); SUMMARY_BLOCK_BUDGET + 1];
        let err = build_chat_summary_payload(vec!["f1".to_string()], blocks).unwrap_err();
        assert_eq!(err, ActionError::BlockBudgetExceeded { kind: "CHAT_SUMMARY", count: SUMMARY_BLOCK_BUDGET + 1, max: SUMMARY_BLOCK_BUDGET });
    }

    #[test]
    fn thread_payload_rejects_too_many_blocks() {
        let blocks = vec![serde_json::json!({}); THREAD_BLOCK_BUDGET + 1];
        let err = build_chat_thread_payload("f1".to_string(), blocks).unwrap_err();
        assert_eq!(err, ActionError::BlockBudgetExceeded { kind: "CHAT_THREAD", count: THREAD_BLOCK_BUDGET + 1, max: THREAD_BLOCK_BUDGET });
    }

    #[test]
    fn top_n_hash_is_order_insensitive() {
        let a = top_n_hash(&["f1".to_string(), "f2".to_string()]).expect("hashes");
        let b = top_n_hash(&["f2".to_string(), "f1".to_string()]).expect("hashes");
        assert_eq!(a, b);
    }

    #[test]
    fn summary_key_changes_with_selection() {
        let a = chat_summary_idempotency_key("acme/widgets", "b1", &["f1".to_string()]).expect("hashes");
        let b = chat_summary_idempotency_key("acme/widgets", "b1", &["f1".to_string(), "f2".to_string()]).expect("hashes");
        assert_ne!(a, b);
    }
}
