// argus-ingest/src/lockfile.rs
// ============================================================================
// Module: Argus Lockfile Parser
// Description: Extracts dependency-graph edges from a nested-tree lockfile.
// Purpose: Build the parent/child edge list the reachability engine walks,
//   independent of which package manager produced the lockfile.
// Dependencies: argus-core, serde_json
// ============================================================================

//! ## Overview
//! The parser reads a normalized nested-dependency-tree JSON shape:
//!
//! ```json
//! { "dependencies": { "left-pad": { "version": "1.0.0", "dev": false,
//!       "dependencies": { "nested": { "version": "2.0.0" } } } } }
//! ```
//!
//! Every first-level key is an edge from the virtual root
//! ([`argus_core::core::model::ROOT_PACKAGE`]); nested `dependencies` maps
//! produce edges from their containing package. `scope` is `"dev"` when a
//! node sets `"dev": true`, otherwise `"runtime"`.

use argus_core::core::model::ROOT_PACKAGE;
use argus_core::{BuildId, DependencyEdge, Repo, RunId};

use crate::error::ParserError;

/// Parses a lockfile document into dependency-graph edges.
///
/// # Errors
///
/// Returns [`ParserError::MalformedJson`] when `bytes` is not valid JSON or
/// lacks a top-level `dependencies` object.
pub fn parse_lockfile(
    bytes: &str,
    filename: &str,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
) -> Result<Vec<DependencyEdge>, ParserError> {
    let doc: serde_json::Value = serde_json::from_str(bytes).map_err(|err| ParserError::MalformedJson {
        filename: filename.to_string(),
        reason: err.to_string(),
    })?;
    let deps = doc.get("dependencies").and_then(serde_json::Value::as_object).ok_or_else(|| {
        ParserError::MalformedJson {
            filename: filename.to_string(),
            reason: "missing `dependencies` object".to_string(),
        }
    })?;

    let mut edges = Vec::new();
    walk(deps, ROOT_PACKAGE, repo, build_id, run_id, &mut edges);
    Ok(edges)
}

/// Recursively walks a `dependencies` object, emitting one edge per child
/// and recursing into any nested `dependencies` map.
fn walk(
    deps: &serde_json::Map<String, serde_json::Value>,
    parent: &str,
    repo: &Repo,
    build_id: &BuildId,
    run_id: &RunId,
    out: &mut Vec<DependencyEdge>,
) {
    for (child, node) in deps {
        let version = node.get("version").and_then(serde_json::Value::as_str).unwrap_or("").to_string();
        let scope = if node.get("dev").and_then(serde_json::Value::as_bool).unwrap_or(false) {
            "dev"
        } else {
            "runtime"
        }
        .to_string();
        let dependency_id = argus_core::dependency_id(repo, build_id, parent, child, &version, &scope);
        out.push(DependencyEdge {
            dependency_id,
            repo: repo.clone(),
            build_id: build_id.clone(),
            run_id: run_id.clone(),
            parent: parent.to_string(),
            child: child.clone(),
            version,
            scope,
        });
        if let Some(nested) = node.get("dependencies").and_then(serde_json::Value::as_object) {
            walk(nested, child, repo, build_id, run_id, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use argus_core::{BuildId, Repo, RunId};

    use super::*;

    fn ids() -> (Repo, BuildId, RunId) {
        (
            Repo::new("acme/widgets").expect("valid"),
            BuildId::new("build-1").expect("valid"),
            RunId::from_hash("b".repeat(64)).expect("valid"),
        )
    }

    #[test]
    fn builds_edges_from_root_and_nested_levels() {
        let (repo, build, run) = ids();
        let doc = serde_json::json!({
            "dependencies": {
                "left-pad": {"version": "1.0.0", "dependencies": {"nested": {"version": "2.0.0"}}},
                "devtool": {"version": "3.0.0", "dev": true}
            }
        });
        let edges = parse_lockfile(&doc.to_string(), "package-lock.json", &repo, &build, &run).expect("parses");
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().any(|e| e.parent == "__root__" && e.child == "left-pad" && e.scope == "runtime"));
        assert!(edges.iter().any(|e| e.parent == "left-pad" && e.child == "nested"));
        assert!(edges.iter().any(|e| e.parent == "__root__" && e.child == "devtool" && e.scope == "dev"));
    }

    #[test]
    fn rejects_missing_dependencies_object() {
        let (repo, build, run) = ids();
        assert!(matches!(
            parse_lockfile("{}", "package-lock.json", &repo, &build, &run),
            Err(ParserError::MalformedJson { .. })
        ));
    }
}
