// argus-reachability/src/lib.rs
// ============================================================================
// Module: Argus Reachability Engine
// Description: Breadth-first dependency-graph reachability analysis.
// Purpose: Decide, for each finding's affected package, whether a path from
//   the application's root exists, and expose the lexicographically smallest
//   such path as an auditable witness.
// Dependencies: argus-core, serde, serde_json, smallvec
// ============================================================================

//! ## Overview
//! The dependency graph is built once per run as an arena: package names are
//! interned into a dense index space, and each node's children are stored as
//! a sorted index slice rather than a map, so the BFS tie-break (smallest
//! child name first) falls out of a slice that is already sorted instead of
//! a per-step comparison. This keeps the algorithm allocation-free after
//! construction and makes its determinism structural rather than incidental.

use std::collections::HashMap;
use std::collections::VecDeque;

use argus_core::core::model::ROOT_PACKAGE;
use argus_core::{reachability_id, DependencyEdge, Finding, Reachability, ReachabilityStatus};
use smallvec::SmallVec;

/// Version of the reachability algorithm. Part of [`Reachability`] identity,
/// so changing the algorithm's behavior is always visible as a new set of
/// `reachabilityId`s rather than a silent reinterpretation of old ones.
pub const ANALYSIS_VERSION: &str = "1.0";

/// Fixed method label carried on every record this crate produces.
pub const METHOD: &str = "DEPENDENCY_GRAPH_BFS";

/// Reason recorded when no path from the root to the affected package exists.
const NO_PATH_REASON: &str = "no path found from application root to target package";

/// A single node in the interned dependency-graph arena.
#[derive(Debug, Clone)]
struct PackageNode {
    /// Lower-cased package name.
    name: String,
    /// Sorted indices of this node's direct children, ascending by name.
    children: SmallVec<[usize; 4]>,
}

/// The dependency graph for a single run, built once and queried per finding.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<PackageNode>,
    index_of: HashMap<String, usize>,
    root: usize,
}

impl DependencyGraph {
    /// Builds a graph from a run's dependency edges.
    ///
    /// Package names are interned case-insensitively; an edge whose parent
    /// has not been seen as a child of any other edge (including
    /// [`ROOT_PACKAGE`] itself) still gets a node, so disconnected
    /// subgraphs are represented rather than silently dropped.
    #[must_use]
    pub fn build(edges: &[DependencyEdge]) -> Self {
        let mut nodes = Vec::new();
        let mut index_of = HashMap::new();
        let mut children_by_index: Vec<Vec<(String, usize)>> = Vec::new();

        let intern = |name: &str, nodes: &mut Vec<PackageNode>, index_of: &mut HashMap<String, usize>, children: &mut Vec<Vec<(String, usize)>>| -> usize {
            let key = name.to_ascii_lowercase();
            if let Some(&idx) = index_of.get(&key) {
                return idx;
            }
            let idx = nodes.len();
            nodes.push(PackageNode { name: key.clone(), children: SmallVec::new() });
            children.push(Vec::new());
            index_of.insert(key, idx);
            idx
        };

        let root = intern(ROOT_PACKAGE, &mut nodes, &mut index_of, &mut children_by_index);

        for edge in edges {
            let parent_idx = intern(&edge.parent, &mut nodes, &mut index_of, &mut children_by_index);
            let child_idx = intern(&edge.child, &mut nodes, &mut index_of, &mut children_by_index);
            let child_name = nodes[child_idx].name.clone();
            children_by_index[parent_idx].push((child_name, child_idx));
        }

        for (idx, mut children) in children_by_index.into_iter().enumerate() {
            children.sort_by(|a, b| a.0.cmp(&b.0));
            nodes[idx].children = children.into_iter().map(|(_, i)| i).collect();
        }

        Self { nodes, index_of, root }
    }

    /// Runs a breadth-first search from the root, visiting children in
    /// sorted order, and returns the shortest (and, among ties, the
    /// lexicographically earliest-discovered) path of package names to
    /// `target`, root first.
    ///
    /// Returns `None` when `target` is not interned in this graph or is not
    /// reachable from the root.
    #[must_use]
    pub fn shortest_path_to(&self, target: &str) -> Option<Vec<String>> {
        let target_key = target.to_ascii_lowercase();
        let target_idx = *self.index_of.get(&target_key)?;

        let mut visited = vec![false; self.nodes.len()];
        let mut parent = vec![usize::MAX; self.nodes.len()];
        let mut queue = VecDeque::new();
        visited[self.root] = true;
        queue.push_back(self.root);

        while let Some(current) = queue.pop_front() {
            if current == target_idx {
                return Some(self.reconstruct_path(current, &parent));
            }
            for &child in &self.nodes[current].children {
                if !visited[child] {
                    visited[child] = true;
                    parent[child] = current;
                    queue.push_back(child);
                }
            }
        }
        None
    }

    /// Walks `parent` pointers from `node` back to the root, then reverses.
    fn reconstruct_path(&self, mut node: usize, parent: &[usize]) -> Vec<String> {
        let mut path = vec![self.nodes[node].name.clone()];
        while parent[node] != usize::MAX {
            node = parent[node];
            path.push(self.nodes[node].name.clone());
        }
        path.reverse();
        path
    }
}

/// Computes the reachability record for a single finding against a
/// prebuilt dependency graph.
///
/// `computed_at` is a caller-supplied deterministic seed (epoch
/// milliseconds), never read from the system clock, so that two runs over
/// identical input always produce byte-identical [`Reachability`] records.
#[must_use]
pub fn analyze(graph: &DependencyGraph, finding: &Finding, computed_at: i64) -> Option<Reachability> {
    let package = finding.package.as_deref()?;
    let path = graph.shortest_path_to(package);
    let reachable = path.is_some();
    let depth = path.as_ref().map_or(0, |p| p.len().saturating_sub(1));
    let confidence_score = if reachable { confidence_from_depth(depth) } else { 0.0 };
    let reachability_id = reachability_id(&finding.finding_id, ANALYSIS_VERSION, path.as_deref().unwrap_or_default());
    let status = if reachable { ReachabilityStatus::Reachable } else { ReachabilityStatus::InsufficientData };
    let reason = if reachable { None } else { Some(NO_PATH_REASON.to_string()) };

    Some(Reachability {
        reachability_id,
        finding_id: finding.finding_id.clone(),
        run_id: finding.run_id.clone(),
        analysis_version: ANALYSIS_VERSION.to_string(),
        reachable,
        status,
        reason,
        evidence_path: path.unwrap_or_default(),
        confidence_score,
        method: METHOD.to_string(),
        computed_at,
    })
}

/// Derives a confidence score from path depth: direct dependencies score
/// highest, confidence decays by a fixed step per hop, floored so a
/// reachable-but-deep finding is never scored as though it were
/// unreachable.
fn confidence_from_depth(depth: usize) -> f64 {
    let step = 0.1 * f64::from(u32::try_from(depth.saturating_sub(1)).unwrap_or(u32::MAX));
    (1.0 - step).max(0.1)
}

#[cfg(test)]
mod tests {
    use argus_core::{BuildId, Repo, RunId};

    use super::*;

    fn edge(repo: &Repo, build: &BuildId, run: &RunId, parent: &str, child: &str) -> DependencyEdge {
        DependencyEdge {
            dependency_id: argus_core::dependency_id(repo, build, parent, child, "1.0.0", "runtime"),
            repo: repo.clone(),
            build_id: build.clone(),
            run_id: run.clone(),
            parent: parent.to_string(),
            child: child.to_string(),
            version: "1.0.0".to_string(),
            scope: "runtime".to_string(),
        }
    }

    fn ids() -> (Repo, BuildId, RunId) {
        (
            Repo::new("acme/widgets").expect("valid"),
            BuildId::new("b1").expect("valid"),
            RunId::from_hash("d".repeat(64)).expect("valid"),
        )
    }

    #[test]
    fn finds_direct_and_transitive_paths() {
        let (repo, build, run) = ids();
        let edges = vec![
            edge(&repo, &build, &run, "__root__", "left-pad"),
            edge(&repo, &build, &run, "left-pad", "nested-vuln"),
        ];
        let graph = DependencyGraph::build(&edges);
        assert_eq!(graph.shortest_path_to("left-pad"), Some(vec!["__root__".to_string(), "left-pad".to_string()]));
        assert_eq!(
            graph.shortest_path_to("nested-vuln"),
            Some(vec!["__root__".to_string(), "left-pad".to_string(), "nested-vuln".to_string()])
        );
    }

    #[test]
    fn unreachable_package_returns_none() {
        let (repo, build, run) = ids();
        let edges = vec![edge(&repo, &build, &run, "__root__", "left-pad")];
        let graph = DependencyGraph::build(&edges);
        assert_eq!(graph.shortest_path_to("unrelated"), None);
    }

    #[test]
    fn ties_prefer_lexicographically_smaller_child() {
        let (repo, build, run) = ids();
        let edges = vec![
            edge(&repo, &build, &run, "__root__", "zeta"),
            edge(&repo, &build, &run, "__root__", "alpha"),
            edge(&repo, &build, &run, "zeta", "target"),
            edge(&repo, &build, &run, "alpha", "target"),
        ];
        let graph = DependencyGraph::build(&edges);
        assert_eq!(
            graph.shortest_path_to("target"),
            Some(vec!["__root__".to_string(), "alpha".to_string(), "target".to_string()])
        );
    }

    #[test]
    fn analysis_is_deterministic_across_runs() {
        let (repo, build, run) = ids();
        let edges = vec![edge(&repo, &build, &run, "__root__", "left-pad")];
        let graph = DependencyGraph::build(&edges);
        let finding = Finding {
            finding_id: argus_core::finding_id(&repo, &build, "fp"),
            repo: repo.clone(),
            build_id: build.clone(),
            run_id: run.clone(),
            rule_id: "R1".to_string(),
            severity: "high".to_string(),
            cves: vec![],
            cve: None,
            package: Some("left-pad".to_string()),
            version: None,
            file_path: None,
            line_number: None,
            tool: "t".to_string(),
            fingerprint: "fp".to_string(),
            created_at: 0,
            reachability_id: None,
            priority_score: None,
        };
        let a = analyze(&graph, &finding, 1).expect("reachable");
        let b = analyze(&graph, &finding, 2).expect("reachable");
        assert_eq!(a.reachability_id, b.reachability_id);
        assert!(a.reachable);
    }
}
