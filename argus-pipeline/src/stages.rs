// argus-pipeline/src/stages.rs
// ============================================================================
// Module: Shared Stage Types
// Description: The common stage-trace shape every pipeline stage reports
//   through.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Outcome of a single named sub-stage within a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    /// The sub-stage completed without error.
    Success,
    /// The sub-stage failed; later sub-stages are skipped.
    Failed,
    /// The sub-stage was never attempted because an earlier one failed.
    Skipped,
}

/// A single sub-stage's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Sub-stage name (`artifacts`, `dependencies`, `sbom`, `findings`,
    /// `reachability`, `threatIntel`, `actions`).
    pub stage: String,
    /// Outcome of this sub-stage.
    pub status: StageStatus,
    /// Number of documents written by this sub-stage.
    pub written: usize,
    /// Error messages collected, if any.
    pub errors: Vec<String>,
}

impl StageReport {
    /// Builds a successful stage report.
    #[must_use]
    pub fn success(stage: &str, written: usize) -> Self {
        Self { stage: stage.to_string(), status: StageStatus::Success, written, errors: Vec::new() }
    }

    /// Builds a failed stage report carrying `errors`.
    #[must_use]
    pub fn failed(stage: &str, errors: Vec<String>) -> Self {
        Self { stage: stage.to_string(), status: StageStatus::Failed, written: 0, errors }
    }

    /// Builds a skipped stage report (an earlier sub-stage already failed).
    #[must_use]
    pub fn skipped(stage: &str) -> Self {
        Self { stage: stage.to_string(), status: StageStatus::Skipped, written: 0, errors: Vec::new() }
    }
}

/// Appends `skipped` reports for every remaining stage name in `remaining`.
pub fn skip_remaining(reports: &mut Vec<StageReport>, remaining: &[&str]) {
    for stage in remaining {
        reports.push(StageReport::skipped(stage));
    }
}
