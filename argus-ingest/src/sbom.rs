// argus-ingest/src/sbom.rs
// ============================================================================
// Module: Argus SBOM Parser
// Description: Extracts normalized software components from an SBOM artifact.
// Dependencies: argus-core, serde_json
// ============================================================================

//! ## Overview
//! Reads a CycloneDX-shaped `components[]` array (`{"name", "version",
//! "purl"}` per entry). Components lacking a usable `name`/`version` pair are
//! skipped rather than rejected outright, since real-world SBOMs frequently
//! include placeholder or metadata-only entries.

use argus_core::{BuildId, Repo, RunId, SbomComponent};

use crate::error::ParserError;

/// Parses an SBOM document into normalized components.
///
/// # Errors
///
/// Returns [`ParserError::MalformedJson`] when `bytes` is not valid JSON or
/// lacks a top-level `components` array.
pub fn parse_sbom(
    bytes: &str,
    filename: &str,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
) -> Result<Vec<SbomComponent>, ParserError> {
    let doc: serde_json::Value = serde_json::from_str(bytes).map_err(|err| ParserError::MalformedJson {
        filename: filename.to_string(),
        reason: err.to_string(),
    })?;
    let components = doc.get("components").and_then(serde_json::Value::as_array).ok_or_else(|| {
        ParserError::MalformedJson {
            filename: filename.to_string(),
            reason: "missing `components` array".to_string(),
        }
    })?;

    let mut out = Vec::new();
    for component in components {
        let (Some(name), Some(version)) = (
            component.get("name").and_then(serde_json::Value::as_str),
            component.get("version").and_then(serde_json::Value::as_str),
        ) else {
            continue;
        };
        let purl = component.get("purl").and_then(serde_json::Value::as_str).map(str::to_string);
        let component_id = argus_core::component_id(repo, build_id, name, version);
        out.push(SbomComponent {
            component_id,
            repo: repo.clone(),
            build_id: build_id.clone(),
            run_id: run_id.clone(),
            purl,
            name: name.to_string(),
            version: version.to_string(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use argus_core::{BuildId, Repo, RunId};

    use super::*;

    fn ids() -> (Repo, BuildId, RunId) {
        (
            Repo::new("acme/widgets").expect("valid"),
            BuildId::new("build-1").expect("valid"),
            RunId::from_hash("c".repeat(64)).expect("valid"),
        )
    }

    #[test]
    fn parses_components_and_skips_incomplete_entries() {
        let (repo, build, run) = ids();
        let doc = serde_json::json!({
            "components": [
                {"name": "left-pad", "version": "1.0.0", "purl": "pkg:npm/left-pad@1.0.0"},
                {"name": "no-version-here"}
            ]
        });
        let components = parse_sbom(&doc.to_string(), "sbom.cdx.json", &repo, &build, &run).expect("parses");
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].name, "left-pad");
    }

    #[test]
    fn rejects_missing_components_array() {
        let (repo, build, run) = ids();
        assert!(matches!(
            parse_sbom("{}", "sbom.cdx.json", &repo, &build, &run),
            Err(ParserError::MalformedJson { .. })
        ));
    }
}
