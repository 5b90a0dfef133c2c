// argus-ingest/src/threat_intel.rs
// ============================================================================
// Module: Argus Threat-Intel Seed Parser
// Description: Normalizes a static seed list of CVE records into the
//   pipeline's `ThreatIntel` shape.
// Purpose: Let a bundle ship its own KEV/EPSS snapshot instead of requiring
//   the pipeline to call out to a live intel feed during acquire.
// Dependencies: argus-core, serde_json
// ============================================================================

//! ## Overview
//! The seed file is a flat JSON array of `{cve, kev, epss, severity}`
//! entries. Unlike the other parsers, the caller supplies no identity
//! context: a `ThreatIntel` record's id is the CVE itself, so no
//! `repo`/`buildId`/`runId` ever enters its derivation. Entries are sorted
//! by `intelId` and deduplicated, keeping the first occurrence of a
//! repeated CVE, so a seed file with accidental duplicate entries still
//! produces a deterministic result regardless of their order in the file.

use argus_core::{IntelId, ThreatIntel};

use crate::error::ParserError;

/// Parses a threat-intel seed document into normalized records.
///
/// `filename` is used only for error context.
///
/// # Errors
///
/// Returns [`ParserError::MalformedJson`] when `bytes` is not valid JSON or
/// is not a top-level array, and [`ParserError::InvalidField`] when an
/// entry's `cve` field is missing or not a valid CVE identifier.
pub fn parse_threat_intel_seed(bytes: &str, filename: &str) -> Result<Vec<ThreatIntel>, ParserError> {
    let doc: serde_json::Value = serde_json::from_str(bytes).map_err(|err| ParserError::MalformedJson {
        filename: filename.to_string(),
        reason: err.to_string(),
    })?;
    let entries = doc.as_array().ok_or_else(|| ParserError::MalformedJson {
        filename: filename.to_string(),
        reason: "expected a top-level array".to_string(),
    })?;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        records.push(parse_entry(entry, filename)?);
    }

    records.sort_by(|a, b| a.intel_id.as_str().cmp(b.intel_id.as_str()));
    records.dedup_by(|a, b| a.intel_id == b.intel_id);
    Ok(records)
}

/// Parses a single seed-list entry into a [`ThreatIntel`] record.
fn parse_entry(entry: &serde_json::Value, filename: &str) -> Result<ThreatIntel, ParserError> {
    let cve_raw = entry.get("cve").and_then(serde_json::Value::as_str).ok_or_else(|| ParserError::InvalidField {
        filename: filename.to_string(),
        field: "cve".to_string(),
        reason: "missing".to_string(),
    })?;
    let intel_id = IntelId::from_cve(cve_raw).map_err(|err| ParserError::InvalidField {
        filename: filename.to_string(),
        field: "cve".to_string(),
        reason: err.to_string(),
    })?;
    let kev = entry.get("kev").and_then(serde_json::Value::as_bool).unwrap_or(false);
    let epss = entry.get("epss").and_then(serde_json::Value::as_f64);
    let severity = entry.get("severity").and_then(serde_json::Value::as_str).map(str::to_string);

    Ok(ThreatIntel { intel_id, kev, epss, severity })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_seed_list() {
        let doc = serde_json::json!([
            {"cve": "cve-2024-12345", "kev": true, "epss": 0.91, "severity": "CRITICAL"},
        ]);
        let records = parse_threat_intel_seed(&doc.to_string(), "seed.json").expect("parses");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intel_id.as_str(), "CVE-2024-12345");
        assert!(records[0].kev);
        assert_eq!(records[0].epss, Some(0.91));
    }

    #[test]
    fn rejects_entry_with_invalid_cve_shape() {
        let doc = serde_json::json!([{"cve": "not-a-cve", "kev": false}]);
        assert!(matches!(
            parse_threat_intel_seed(&doc.to_string(), "seed.json"),
            Err(ParserError::InvalidField { .. })
        ));
    }

    #[test]
    fn duplicate_cves_collapse_to_one_record() {
        let doc = serde_json::json!([
            {"cve": "CVE-2024-1111", "kev": false},
            {"cve": "cve-2024-1111", "kev": true},
        ]);
        let records = parse_threat_intel_seed(&doc.to_string(), "seed.json").expect("parses");
        assert_eq!(records.len(), 1);
        assert!(!records[0].kev);
    }

    #[test]
    fn rejects_non_array_top_level_value() {
        let doc = serde_json::json!({"cve": "CVE-2024-1111"});
        assert!(matches!(
            parse_threat_intel_seed(&doc.to_string(), "seed.json"),
            Err(ParserError::MalformedJson { .. })
        ));
    }
}
