// argus-ingest/src/sarif.rs
// ============================================================================
// Module: Argus SARIF Parser
// Description: Extracts normalized findings from a SARIF artifact.
// Purpose: Turn a scanner's SARIF output into the fixed Finding shape the
//   rest of the pipeline depends on, independent of which tool produced it.
// Dependencies: argus-core, serde_json
// ============================================================================

//! ## Overview
//! Only the subset of SARIF the pipeline cares about is read:
//! `runs[].tool.driver.name`, `runs[].results[]` (`ruleId`, `level`,
//! `message.text`, `locations[].physicalLocation`, and
//! `properties.security-severity`/`properties.tags` for CVE extraction).
//! Anything else in the document is ignored. `createdAt` is supplied by the
//! caller, never read from the artifact or the clock, so `findingId` and
//! `fingerprint` cannot depend on it.

use argus_core::{BuildId, Finding, Repo, RunId};

use crate::error::ParserError;

/// Parses a SARIF document into normalized findings.
///
/// `filename` is used only for error context. `created_at` is the
/// epoch-millisecond ingestion timestamp assigned by the caller.
///
/// # Errors
///
/// Returns [`ParserError::MalformedJson`] when `bytes` is not valid JSON or
/// lacks a top-level `runs` array. A document declaring a `version` other
/// than `"2.1.0"` is not an error: it yields an empty finding list, since an
/// unsupported-but-present SARIF file is not a malformed bundle.
pub fn parse_sarif(
    bytes: &str,
    filename: &str,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    created_at: i64,
) -> Result<Vec<Finding>, ParserError> {
    let doc: serde_json::Value = serde_json::from_str(bytes).map_err(|err| ParserError::MalformedJson {
        filename: filename.to_string(),
        reason: err.to_string(),
    })?;

    if let Some(version) = doc.get("version").and_then(serde_json::Value::as_str)
        && version != "2.1.0"
    {
        return Ok(Vec::new());
    }

    let runs = doc.get("runs").and_then(serde_json::Value::as_array).ok_or_else(|| {
        ParserError::MalformedJson { filename: filename.to_string(), reason: "missing `runs` array".to_string() }
    })?;

    let mut findings = Vec::new();
    for run in runs {
        let tool = run
            .pointer("/tool/driver/name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let Some(results) = run.get("results").and_then(serde_json::Value::as_array) else {
            continue;
        };
        for result in results {
            findings.push(parse_result(result, filename, &tool, repo, build_id, run_id, created_at)?);
        }
    }
    Ok(findings)
}

/// Parses a single `runs[].results[]` entry into a [`Finding`].
fn parse_result(
    result: &serde_json::Value,
    filename: &str,
    tool: &str,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    created_at: i64,
) -> Result<Finding, ParserError> {
    let rule_id = result
        .get("ruleId")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ParserError::InvalidField {
            filename: filename.to_string(),
            field: "ruleId".to_string(),
            reason: "missing".to_string(),
        })?
        .to_string();

    let severity = severity_from_level(result.get("level").and_then(serde_json::Value::as_str));

    let (file_path, line_number) = result
        .pointer("/locations/0/physicalLocation")
        .map(|loc| {
            let file_path =
                loc.pointer("/artifactLocation/uri").and_then(serde_json::Value::as_str).map(str::to_string);
            let line_number =
                loc.pointer("/region/startLine").and_then(serde_json::Value::as_u64).and_then(|v| u32::try_from(v).ok());
            (file_path, line_number)
        })
        .unwrap_or((None, None));

    let package =
        result.pointer("/properties/package").and_then(serde_json::Value::as_str).map(str::to_string);
    let version =
        result.pointer("/properties/version").and_then(serde_json::Value::as_str).map(str::to_string);

    let cves = extract_cves(result);

    let fingerprint = build_fingerprint(&rule_id, file_path.as_deref(), line_number, package.as_deref());
    let finding_id = argus_core::finding_id(repo, build_id, &fingerprint);

    Ok(Finding {
        finding_id,
        repo: repo.clone(),
        build_id: build_id.clone(),
        run_id: run_id.clone(),
        rule_id,
        severity,
        cve: cves.first().cloned(),
        cves,
        package,
        version,
        file_path,
        line_number,
        tool: tool.to_string(),
        fingerprint,
        created_at,
        reachability_id: None,
        priority_score: None,
    })
}

/// Builds the stable fingerprint a finding's identity is derived from.
///
/// Deliberately excludes `createdAt` and any free-text message field so that
/// re-ingesting the same scan at a later time produces the same
/// `findingId`.
fn build_fingerprint(rule_id: &str, file_path: Option<&str>, line_number: Option<u32>, package: Option<&str>) -> String {
    format!(
        "{rule_id}|{}|{}|{}",
        file_path.unwrap_or(""),
        line_number.map_or_else(String::new, |n| n.to_string()),
        package.unwrap_or(""),
    )
}

/// Maps a SARIF `level` to the pipeline's severity vocabulary.
fn severity_from_level(level: Option<&str>) -> String {
    match level {
        Some("error") => "high",
        Some("warning") => "medium",
        Some("note") => "low",
        _ => "unknown",
    }
    .to_string()
}

/// Scans `properties.tags` for values shaped like a CVE identifier, sorted
/// and deduplicated so the result is independent of the tag array's order
/// in the source document.
fn extract_cves(result: &serde_json::Value) -> Vec<String> {
    let Some(tags) = result.pointer("/properties/tags").and_then(serde_json::Value::as_array) else {
        return Vec::new();
    };
    let mut cves: Vec<String> = tags
        .iter()
        .filter_map(serde_json::Value::as_str)
        .filter(|tag| tag.to_ascii_uppercase().starts_with("CVE-"))
        .map(str::to_string)
        .collect();
    cves.sort();
    cves.dedup();
    cves
}

#[cfg(test)]
mod tests {
    use argus_core::{BuildId, Repo, RunId};

    use super::*;

    fn ids() -> (Repo, BuildId, RunId) {
        (
            Repo::new("acme/widgets").expect("valid"),
            BuildId::new("build-1").expect("valid"),
            RunId::from_hash("a".repeat(64)).expect("valid"),
        )
    }

    #[test]
    fn parses_a_minimal_sarif_document() {
        let (repo, build, run) = ids();
        let doc = serde_json::json!({
            "version": "2.1.0",
            "runs": [{
                "tool": {"driver": {"name": "acme-scanner"}},
                "results": [{
                    "ruleId": "SEC-001",
                    "level": "error",
                    "locations": [{"physicalLocation": {"artifactLocation": {"uri": "src/a.rs"}, "region": {"startLine": 10}}}],
                    "properties": {"tags": ["CVE-2024-12345"], "package": "left-pad", "version": "1.0.0"}
                }]
            }]
        });
        let findings = parse_sarif(&doc.to_string(), "scan.sarif", &repo, &build, &run, 1_700_000_000_000).expect("parses");
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, "high");
        assert_eq!(finding.cves, vec!["CVE-2024-12345".to_string()]);
        assert_eq!(finding.tool, "acme-scanner");
    }

    #[test]
    fn finding_id_is_independent_of_created_at() {
        let (repo, build, run) = ids();
        let doc = serde_json::json!({
            "version": "2.1.0",
            "runs": [{"tool": {"driver": {"name": "t"}}, "results": [{"ruleId": "R1"}]}]
        });
        let a = parse_sarif(&doc.to_string(), "x.sarif", &repo, &build, &run, 1).expect("parses");
        let b = parse_sarif(&doc.to_string(), "x.sarif", &repo, &build, &run, 2).expect("parses");
        assert_eq!(a[0].finding_id, b[0].finding_id);
    }

    #[test]
    fn rejects_malformed_json() {
        let (repo, build, run) = ids();
        assert!(matches!(
            parse_sarif("not json", "x.sarif", &repo, &build, &run, 0),
            Err(ParserError::MalformedJson { .. })
        ));
    }

    #[test]
    fn unsupported_version_yields_no_findings() {
        let (repo, build, run) = ids();
        let doc = serde_json::json!({"version": "1.0.0", "runs": []});
        let findings = parse_sarif(&doc.to_string(), "x.sarif", &repo, &build, &run, 0).expect("not an error");
        assert!(findings.is_empty());
    }

    #[test]
    fn extracted_cves_are_sorted_and_deduped() {
        let (repo, build, run) = ids();
        let doc = serde_json::json!({
            "version": "2.1.0",
            "runs": [{
                "tool": {"driver": {"name": "t"}},
                "results": [{
                    "ruleId": "R1",
                    "properties": {"tags": ["CVE-2024-9999", "CVE-2024-1111", "CVE-2024-1111"]}
                }]
            }]
        });
        let findings = parse_sarif(&doc.to_string(), "x.sarif", &repo, &build, &run, 0).expect("parses");
        assert_eq!(findings[0].cves, vec!["CVE-2024-1111".to_string(), "CVE-2024-9999".to_string()]);
        assert_eq!(findings[0].cve, Some("CVE-2024-1111".to_string()));
    }
}
