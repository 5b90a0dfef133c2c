// argus-writers/src/validators.rs
// ============================================================================
// Module: Argus Index Validators
// Description: Concrete `IndexValidator` implementations for every index the
//   pipeline writes.
// Dependencies: argus-core, serde_json
// ============================================================================

//! ## Overview
//! Each validator recomputes its index's id the same way
//! [`argus_core::core::identifiers`] does, directly from the document's own
//! fields, so a hand-edited or corrupted document is caught by step 2 of the
//! writer contract rather than silently accepted.

use argus_core::Repo;
use argus_core::{BuildId, FindingId};

use crate::IndexValidator;

/// Reads a required string field from `doc`, or returns an error message
/// suitable for [`IndexValidator::compute_expected_id`].
fn field<'a>(doc: &'a serde_json::Value, name: &str) -> Result<&'a str, String> {
    doc.get(name).and_then(serde_json::Value::as_str).ok_or_else(|| format!("missing field `{name}`"))
}

/// Validator for the `findings` index.
pub struct FindingsValidator;
impl IndexValidator for FindingsValidator {
    fn index_name(&self) -> &'static str {
        "findings"
    }
    fn required_id_field(&self) -> &'static str {
        "findingId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let repo = Repo::new(field(doc, "repo")?).map_err(|err| err.to_string())?;
        let build_id = BuildId::new(field(doc, "buildId")?).map_err(|err| err.to_string())?;
        let fingerprint = field(doc, "fingerprint")?;
        Ok(argus_core::finding_id(&repo, &build_id, fingerprint).to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["repo", "buildId", "runId", "severity", "fingerprint"]
    }
}

/// Validator for the `dependencies` index.
pub struct DependenciesValidator;
impl IndexValidator for DependenciesValidator {
    fn index_name(&self) -> &'static str {
        "dependencies"
    }
    fn required_id_field(&self) -> &'static str {
        "dependencyId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let repo = Repo::new(field(doc, "repo")?).map_err(|err| err.to_string())?;
        let build_id = BuildId::new(field(doc, "buildId")?).map_err(|err| err.to_string())?;
        let parent = field(doc, "parent")?;
        let child = field(doc, "child")?;
        let version = field(doc, "version")?;
        let scope = field(doc, "scope")?;
        Ok(argus_core::dependency_id(&repo, &build_id, parent, child, version, scope).to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["repo", "buildId", "runId", "parent", "child", "version", "scope"]
    }
}

/// Validator for the `sbom_components` index.
pub struct SbomComponentsValidator;
impl IndexValidator for SbomComponentsValidator {
    fn index_name(&self) -> &'static str {
        "sbom_components"
    }
    fn required_id_field(&self) -> &'static str {
        "componentId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let repo = Repo::new(field(doc, "repo")?).map_err(|err| err.to_string())?;
        let build_id = BuildId::new(field(doc, "buildId")?).map_err(|err| err.to_string())?;
        let name = field(doc, "name")?;
        let version = field(doc, "version")?;
        Ok(argus_core::component_id(&repo, &build_id, name, version).to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["repo", "buildId", "runId", "name", "version"]
    }
}

/// Validator for the `reachability` index.
pub struct ReachabilityValidator;
impl IndexValidator for ReachabilityValidator {
    fn index_name(&self) -> &'static str {
        "reachability"
    }
    fn required_id_field(&self) -> &'static str {
        "reachabilityId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let finding_id_raw = field(doc, "findingId")?;
        let finding_id = FindingId::from_hash(finding_id_raw).map_err(|err| err.to_string())?;
        let analysis_version = field(doc, "analysisVersion")?;
        let path: Vec<String> = doc
            .get("evidencePath")
            .and_then(serde_json::Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        Ok(argus_core::reachability_id(&finding_id, analysis_version, &path).to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["findingId", "runId", "analysisVersion", "reachable", "status", "evidencePath", "method"]
    }
}

/// Validator for the `threat_intel` index. `intelId` is not hash-derived;
/// it must equal the uppercased CVE string itself.
pub struct ThreatIntelValidator;
impl IndexValidator for ThreatIntelValidator {
    fn index_name(&self) -> &'static str {
        "threat_intel"
    }
    fn required_id_field(&self) -> &'static str {
        "intelId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let raw = field(doc, "intelId")?;
        let intel_id = argus_core::IntelId::from_cve(raw).map_err(|err| err.to_string())?;
        Ok(intel_id.to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["kev"]
    }
}

/// Validator for the `actions` index. `actionId` equals the precomputed
/// idempotency key, so no recomputation happens here beyond echoing it back.
pub struct ActionsValidator;
impl IndexValidator for ActionsValidator {
    fn index_name(&self) -> &'static str {
        "actions"
    }
    fn required_id_field(&self) -> &'static str {
        "actionId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        Ok(field(doc, "idempotencyKey")?.to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["idempotencyKey", "runId", "type", "status", "payloadHash", "templateVersion", "attempt"]
    }
}

/// Validator for the `priority_explanations` index. `explanationId` is
/// recomputed from the document's own `findingId`, `explanationVersion`,
/// and `inputs` fields, the same triple the score stage hashes to produce
/// it.
pub struct ExplanationsValidator;
impl IndexValidator for ExplanationsValidator {
    fn index_name(&self) -> &'static str {
        "priority_explanations"
    }
    fn required_id_field(&self) -> &'static str {
        "explanationId"
    }
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
        let finding_id = field(doc, "findingId")?;
        let explanation_version = field(doc, "explanationVersion")?;
        let inputs = doc.get("inputs").ok_or_else(|| "missing field `inputs`".to_string())?;
        argus_core::hash(&serde_json::json!({
            "findingId": finding_id,
            "explanationVersion": explanation_version,
            "inputs": inputs,
        }))
        .map_err(|err| err.to_string())
    }
    fn required_fields(&self) -> &'static [&'static str] {
        &["findingId", "explanationVersion", "inputs", "totalScore", "reasonCodes"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_validator_recomputes_the_same_id_the_parser_would() {
        let repo = Repo::new("acme/widgets").expect("valid");
        let build = BuildId::new("b1").expect("valid");
        let expected = argus_core::finding_id(&repo, &build, "fp-1").to_string();
        let doc = serde_json::json!({
            "findingId": expected,
            "repo": "acme/widgets",
            "buildId": "b1",
            "fingerprint": "fp-1",
        });
        assert_eq!(FindingsValidator.compute_expected_id(&doc).expect("computes"), expected);
    }

    #[test]
    fn threat_intel_validator_requires_uppercase_cve_shape() {
        let doc = serde_json::json!({"intelId": "cve-2024-12345"});
        assert_eq!(ThreatIntelValidator.compute_expected_id(&doc).expect("computes"), "CVE-2024-12345");
    }

    #[test]
    fn explanations_validator_recomputes_id_from_inputs() {
        let inputs = serde_json::json!({"kev": true});
        let expected = argus_core::hash(&serde_json::json!({
            "findingId": "f1",
            "explanationVersion": "1.0",
            "inputs": inputs,
        }))
        .expect("hashes");
        let doc = serde_json::json!({
            "explanationId": expected,
            "findingId": "f1",
            "explanationVersion": "1.0",
            "inputs": inputs,
        });
        assert_eq!(ExplanationsValidator.compute_expected_id(&doc).expect("computes"), expected);
    }
}
