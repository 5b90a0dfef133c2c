// argus-actions/src/error.rs
// ============================================================================
// Module: Argus Action Errors
// Description: Closed error set for action payload construction and the
//   execution model.
// Dependencies: thiserror
// ============================================================================

/// Errors raised while building or resolving an action.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActionError {
    /// Canonicalization or hashing failed while deriving a key or payload
    /// hash.
    #[error("failed to hash action payload: {0}")]
    Hash(String),
    /// A chat payload exceeded its block budget.
    #[error("{kind} action has {count} blocks, exceeding the budget of {max}")]
    BlockBudgetExceeded {
        /// Which chat action kind exceeded its budget.
        kind: &'static str,
        /// The number of blocks the caller supplied.
        count: usize,
        /// The maximum number of blocks allowed.
        max: usize,
    },
    /// `attempt` was not a positive integer.
    #[error("attempt must be a positive integer, got {0}")]
    NonPositiveAttempt(i64),
    /// Live (non-dry-run) execution was requested.
    #[error("live execution is rejected: actions may only run in dry-run mode")]
    LiveExecutionRejected,
}
