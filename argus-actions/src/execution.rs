// argus-actions/src/execution.rs
// ============================================================================
// Module: Argus Action Execution Model
// Description: Duplicate suppression and dry-run enforcement for actions.
// Dependencies: (none beyond this crate's error type)
// ============================================================================

//! ## Overview
//! Resolving an action never touches a store directly: the caller scans its
//! stored actions for a matching `idempotencyKey`/`actionId` and passes the
//! match (if any) in. This keeps the execution model pure and testable
//! without an in-memory or HTTP document store in scope.

use crate::error::ActionError;

/// Outcome of attempting to record an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// No prior action existed with this idempotency key; the new action
    /// should be written.
    Created,
    /// An action with this idempotency key already exists; the stored
    /// document is left untouched.
    SkippedDuplicate,
}

/// Result of resolving one action attempt against already-stored actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether to write the new action or leave the existing one alone.
    pub status: ActionStatus,
    /// Mirrors `status == SkippedDuplicate`, kept for document-field parity.
    pub duplicate: bool,
    /// The attempt number to record: the new attempt when created, or the
    /// existing stored attempt when skipped as a duplicate.
    pub attempt: i64,
}

/// Resolves an action attempt identified by `key` against `existing`, a list
/// of `(idempotencyKey, storedAttempt)` pairs already committed to the
/// actions index.
///
/// # Errors
///
/// Returns [`ActionError::NonPositiveAttempt`] when `attempt` is not
/// positive, and [`ActionError::LiveExecutionRejected`] when `dry_run` is
/// `false`. Both checks run before duplicate detection.
pub fn resolve_action(existing: &[(String, i64)], key: &str, attempt: i64, dry_run: bool) -> Result<ActionOutcome, ActionError> {
    if attempt <= 0 {
        return Err(ActionError::NonPositiveAttempt(attempt));
    }
    if !dry_run {
        return Err(ActionError::LiveExecutionRejected);
    }

    match existing.iter().find(|(existing_key, _)| existing_key == key) {
        Some((_, stored_attempt)) => Ok(ActionOutcome { status: ActionStatus::SkippedDuplicate, duplicate: true, attempt: *stored_attempt }),
        None => Ok(ActionOutcome { status: ActionStatus::Created, duplicate: false, attempt }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_created() {
        let outcome = resolve_action(&[], "key-1", 1, true).expect("ok");
        assert_eq!(outcome.status, ActionStatus::Created);
        assert!(!outcome.duplicate);
        assert_eq!(outcome.attempt, 1);
    }

    #[test]
    fn duplicate_key_is_skipped_and_preserves_stored_attempt() {
        let existing = vec![("key-1".to_string(), 1)];
        let outcome = resolve_action(&existing, "key-1", 2, true).expect("ok");
        assert_eq!(outcome.status, ActionStatus::SkippedDuplicate);
        assert!(outcome.duplicate);
        assert_eq!(outcome.attempt, 1);
    }

    #[test]
    fn non_positive_attempt_is_rejected() {
        assert_eq!(resolve_action(&[], "key-1", 0, true).unwrap_err(), ActionError::NonPositiveAttempt(0));
        assert_eq!(resolve_action(&[], "key-1", -5, true).unwrap_err(), ActionError::NonPositiveAttempt(-5));
    }

    #[test]
    fn live_execution_is_rejected_before_duplicate_check() {
        let existing = vec![("key-1".to_string(), 1)];
        assert_eq!(resolve_action(&existing, "key-1", 1, false).unwrap_err(), ActionError::LiveExecutionRejected);
    }
}
