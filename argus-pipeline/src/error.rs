// argus-pipeline/src/error.rs
// ============================================================================
// Module: Pipeline Errors
// Description: Closed error codes for the bundle manifest, the four
//   pipeline stages, and the agent workflow orchestrator's tool schemas.
// Dependencies: thiserror
// ============================================================================

/// Errors raised while running the pipeline or validating its inputs.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The bundle manifest was missing, unparsable, or missing required
    /// fields.
    #[error("malformed bundle manifest: {0}")]
    MalformedManifest(String),
    /// The acquire stage found no recognized artifacts in the bundle.
    #[error("E_ACQUIRE_MISSING_ARTIFACTS: bundle contains no recognized artifacts")]
    AcquireMissingArtifacts,
    /// The acquire stage's ingest/write pipeline failed.
    #[error("E_ACQUIRE_PIPELINE_FAILED: {0}")]
    AcquirePipelineFailed(String),
    /// The enrich stage found no reachability candidates to join.
    #[error("E_ENRICH_NO_REACHABILITY: no reachability records available to join")]
    EnrichNoReachability,
    /// The score stage produced an empty ranking.
    #[error("E_SCORE_EMPTY_RANKING: ranking is empty or topN <= 0")]
    ScoreEmptyRanking,
    /// The act stage was asked to perform a live (non-dry-run) write.
    #[error("E_ACTION_WRITE_BLOCKED: live execution is not permitted")]
    ActionWriteBlocked,
    /// A tool schema failed pre-flight validation.
    #[error("E_TOOL_SCHEMA_INVALID: {0}")]
    ToolSchemaInvalid(String),
    /// The underlying document store failed.
    #[error(transparent)]
    Store(#[from] argus_store::StoreError),
    /// A hashing, canonicalization, or action-building step failed for
    /// reasons independent of any particular stage's own error taxonomy.
    #[error("E_INTERNAL: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Returns the closed error code string for documents and stage traces.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedManifest(_) => "MALFORMED_MANIFEST",
            Self::AcquireMissingArtifacts => "E_ACQUIRE_MISSING_ARTIFACTS",
            Self::AcquirePipelineFailed(_) => "E_ACQUIRE_PIPELINE_FAILED",
            Self::EnrichNoReachability => "E_ENRICH_NO_REACHABILITY",
            Self::ScoreEmptyRanking => "E_SCORE_EMPTY_RANKING",
            Self::ActionWriteBlocked => "E_ACTION_WRITE_BLOCKED",
            Self::ToolSchemaInvalid(_) => "E_TOOL_SCHEMA_INVALID",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "E_INTERNAL",
        }
    }
}
