// argus-actions/src/ticket.rs
// ============================================================================
// Module: Argus Ticket Action
// Description: Per-finding ticket-creation dry-run payload.
// Dependencies: argus-core, serde, serde_json
// ============================================================================

//! ## Overview
//! One [`TicketPayload`] is built per ranked finding. The description is
//! always rendered with the same six fixed sections, in the same order,
//! regardless of which fields are present, so the rendered text diffs
//! cleanly across reruns.

use crate::error::ActionError;
use crate::idempotency_key;
use crate::TEMPLATE_VERSION;

/// Inputs needed to render one ticket action for a single finding.
#[derive(Debug, Clone)]
pub struct TicketFindingContext<'a> {
    /// Repository the finding belongs to.
    pub repo: &'a str,
    /// Build the finding was observed in.
    pub build_id: &'a str,
    /// The finding's stable identifier.
    pub finding_id: &'a str,
    /// The scanner rule that produced the finding.
    pub rule_id: &'a str,
    /// Upper-cased severity.
    pub severity: &'a str,
    /// Affected package name.
    pub package: &'a str,
    /// Affected package version.
    pub version: &'a str,
    /// First associated CVE, if any.
    pub cve: Option<&'a str>,
    /// Whether the reachability engine found this package reachable.
    pub reachable: Option<bool>,
    /// Reachability evidence path, root-to-target package names.
    pub evidence_path: &'a [String],
    /// KEV flag from the threat-intel join.
    pub kev: Option<bool>,
    /// EPSS score from the threat-intel join.
    pub epss: Option<f64>,
    /// Final additive priority score.
    pub priority_score: Option<i64>,
    /// Reason codes contributing to the priority score.
    pub reason_codes: &'a [String],
}

/// A single ticket-creation dry-run payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TicketPayload {
    /// One-line summary, `[SEV] pkg@ver rule (findingId)`.
    pub summary: String,
    /// Full multi-section description body.
    pub description: String,
    /// Labels attached to the ticket.
    pub labels: Vec<String>,
}

/// Builds the ticket payload for `ctx`.
#[must_use]
pub fn build_ticket_payload(ctx: &TicketFindingContext<'_>) -> TicketPayload {
    TicketPayload {
        summary: format!("[{}] {}@{} {} ({})", ctx.severity, ctx.package, ctx.version, ctx.rule_id, ctx.finding_id),
        description: render_description(ctx),
        labels: build_labels(ctx),
    }
}

/// Derives `idempotencyKey = hash("type=JIRA_CREATE|repo=…|buildId=…|findingId=…|templateVersion=…")`.
///
/// # Errors
///
/// Returns [`ActionError::Hash`] if canonicalization fails.
pub fn ticket_idempotency_key(ctx: &TicketFindingContext<'_>) -> Result<String, ActionError> {
    idempotency_key(&[
        ("type", "JIRA_CREATE"),
        ("repo", ctx.repo),
        ("buildId", ctx.build_id),
        ("findingId", ctx.finding_id),
        ("templateVersion", TEMPLATE_VERSION),
    ])
}

/// Builds the fixed label set: `argonaut`, `repo:`, `build:`, `finding:`,
/// and optionally `cve:` / `reachable:`.
fn build_labels(ctx: &TicketFindingContext<'_>) -> Vec<String> {
    let mut labels = vec![
        "argonaut".to_string(),
        format!("repo:{}", ctx.repo),
        format!("build:{}", ctx.build_id),
        format!("finding:{}", ctx.finding_id),
    ];
    if let Some(cve) = ctx.cve {
        labels.push(format!("cve:{cve}"));
    }
    if let Some(reachable) = ctx.reachable {
        labels.push(format!("reachable:{reachable}"));
    }
    labels
}

/// Renders the six fixed description sections, using `N/A` for absent
/// fields so the shape never changes across reruns.
fn render_description(ctx: &TicketFindingContext<'_>) -> String {
    let header = format!(
        "Repo: {}\nBuild: {}\nFinding: {}\nRule: {}\nSeverity: {}\nPackage: {}@{}",
        ctx.repo, ctx.build_id, ctx.finding_id, ctx.rule_id, ctx.severity, ctx.package, ctx.version
    );
    let evidence = format!("CVE: {}", ctx.cve.unwrap_or("N/A"));
    let reachability = if ctx.evidence_path.is_empty() {
        format!("Reachable: {}\nPath: N/A", display_opt_bool(ctx.reachable))
    } else {
        format!("Reachable: {}\nPath: {}", display_opt_bool(ctx.reachable), ctx.evidence_path.join(" -> "))
    };
    let threat = format!("KEV: {}\nEPSS: {}", display_opt_bool(ctx.kev), display_opt_f64(ctx.epss));
    let score = format!(
        "Priority score: {}\nReason codes: {}",
        ctx.priority_score.map_or_else(|| "N/A".to_string(), |s| s.to_string()),
        if ctx.reason_codes.is_empty() { "N/A".to_string() } else { ctx.reason_codes.join(", ") }
    );
    let next_step = "Review the finding and confirm remediation owner.".to_string();

    [
        ("Header", header),
        ("Evidence", evidence),
        ("Reachability Context", reachability),
        ("Threat Context", threat),
        ("Score and Explanation Context", score),
        ("Suggested Next Step", next_step),
    ]
    .into_iter()
    .map(|(title, body)| format!("## {title}\n{body}"))
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Renders an `Option<bool>` as `true`/`false`/`N/A`.
fn display_opt_bool(value: Option<bool>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Renders an `Option<f64>` as its value or `N/A`.
fn display_opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ctx() -> TicketFindingContext<'static> {
        TicketFindingContext {
            repo: "acme/widgets",
            build_id: "b1",
            finding_id: "f1",
            rule_id: "rule-1",
            severity: "HIGH",
            package: "left-pad",
            version: "1.0.0",
            cve: Some("CVE-2024-12345"),
            reachable: Some(true),
            evidence_path: &[],
            kev: Some(true),
            epss: Some(0.9),
            priority_score: Some(77),
            reason_codes: &[],
        }
    }

    #[test]
    fn summary_has_the_fixed_shape() {
        let payload = build_ticket_payload(&sample_ctx());
        assert_eq!(payload.summary, "[HIGH] left-pad@1.0.0 rule-1 (f1)");
    }

    #[test]
    fn labels_include_cve_and_reachable_when_present() {
        let payload = build_ticket_payload(&sample_ctx());
        assert!(payload.labels.contains(&"cve:CVE-2024-12345".to_string()));
        assert!(payload.labels.contains(&"reachable:true".to_string()));
        assert!(payload.labels.contains(&"argonaut".to_string()));
    }

    #[test]
    fn description_contains_all_six_sections_in_order() {
        let payload = build_ticket_payload(&sample_ctx());
        let headers: Vec<&str> = payload.description.lines().filter(|l| l.starts_with("## ")).collect();
        assert_eq!(
            headers,
            vec![
                "## Header",
                "## Evidence",
                "## Reachability Context",
                "## Threat Context",
                "## Score and Explanation Context",
                "## Suggested Next Step",
            ]
        );
    }

    #[test]
    fn idempotency_key_is_independent_of_mutable_fields() {
        let mut ctx = sample_ctx();
        let a = ticket_idempotency_key(&ctx).expect("hashes");
        ctx.priority_score = Some(1);
        ctx.cve = None;
        let b = ticket_idempotency_key(&ctx).expect("hashes");
        assert_eq!(a, b);
    }
}
