// argus-pipeline/src/logging.rs
// ============================================================================
// Module: Run/Task Logging
// Description: Run header and task-log document builders, with defensive
//   truncation and non-throwing timestamp normalization.
// Dependencies: argus-core, serde_json
// ============================================================================

//! ## Overview
//! Logging must never abort the pipeline: every helper here returns a best
//! effort value rather than an error, including [`normalize_timestamp`],
//! which falls back to `0` for input it cannot interpret rather than
//! propagating a parse failure.

use argus_core::core::model::MAX_LOG_MESSAGE_BYTES;
use argus_core::core::model::MAX_LOG_PARAMS_BYTES;
use argus_core::core::model::MAX_LOG_STACK_BYTES;
use argus_core::BuildId;
use argus_core::Repo;
use argus_core::Run;
use argus_core::RunId;
use argus_core::RunStatus;
use argus_core::TaskLog;

/// Builds the initial `RUNNING` run header.
#[must_use]
pub fn start_run(run_id: RunId, repo: Repo, build_id: BuildId, started_at: i64) -> Run {
    Run { run_id, repo, build_id, status: RunStatus::Running, started_at, finished_at: None }
}

/// Transitions a run header to a terminal status, stamping `finished_at`.
#[must_use]
pub fn finish_run(mut run: Run, status: RunStatus, finished_at: i64) -> Run {
    run.status = status;
    run.finished_at = Some(finished_at);
    run
}

/// Builds a task-log entry, applying defensive truncation to `message` and
/// `stack` and replacing oversized `params` with a placeholder.
#[must_use]
pub fn task_log(
    run_id: &RunId,
    stage: &str,
    task_key: &str,
    message: &str,
    stack: Option<&str>,
    logged_at: i64,
) -> TaskLog {
    let task_id = argus_core::task_id(run_id, stage, task_key);
    TaskLog {
        task_id,
        run_id: run_id.clone(),
        stage: stage.to_string(),
        task_key: task_key.to_string(),
        message: truncate_bytes(message, MAX_LOG_MESSAGE_BYTES),
        stack: stack.map(|s| truncate_bytes(s, MAX_LOG_STACK_BYTES)),
        logged_at,
    }
}

/// Replaces `params` with a placeholder object if its canonical JSON
/// serialization exceeds [`MAX_LOG_PARAMS_BYTES`].
#[must_use]
pub fn normalize_params(params: serde_json::Value) -> serde_json::Value {
    let size = serde_json::to_vec(&params).map(|bytes| bytes.len()).unwrap_or(usize::MAX);
    if size > MAX_LOG_PARAMS_BYTES {
        serde_json::json!({"truncated": true, "originalBytes": size})
    } else {
        params
    }
}

/// Truncates `text` to at most `max_bytes` bytes at a UTF-8 char boundary.
fn truncate_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Normalizes a timestamp-like JSON value (ISO-8601 string, epoch seconds,
/// or epoch milliseconds) to epoch-ms. Never fails: unrecognized input
/// normalizes to `0`.
#[must_use]
pub fn normalize_timestamp(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => normalize_numeric_timestamp(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => normalize_string_timestamp(s),
        _ => 0,
    }
}

/// A numeric timestamp under this threshold is assumed to be epoch seconds
/// rather than epoch milliseconds (valid through roughly the year 5138).
const EPOCH_SECONDS_THRESHOLD: f64 = 1e12;

/// Normalizes a bare numeric timestamp, disambiguating seconds from
/// milliseconds by magnitude.
fn normalize_numeric_timestamp(raw: f64) -> i64 {
    if !raw.is_finite() {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, reason = "timestamps fit well within i64 range")]
    let scaled = if raw.abs() < EPOCH_SECONDS_THRESHOLD { raw * 1000.0 } else { raw };
    scaled as i64
}

/// Normalizes an ISO-8601 timestamp string to epoch-ms, returning `0` when
/// the string cannot be parsed.
fn normalize_string_timestamp(raw: &str) -> i64 {
    time::OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339)
        .map_or(0, |dt| dt.unix_timestamp() * 1000 + i64::from(dt.millisecond()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_over_the_limit_is_truncated() {
        let huge = "a".repeat(MAX_LOG_MESSAGE_BYTES + 100);
        let run_id = RunId::from_hash("a".repeat(64)).expect("valid");
        let log = task_log(&run_id, "acquire", "k1", &huge, None, 0);
        assert!(log.message.len() <= MAX_LOG_MESSAGE_BYTES);
    }

    #[test]
    fn oversized_params_are_replaced_with_a_placeholder() {
        let huge = serde_json::json!({"blob": "x".repeat(MAX_LOG_PARAMS_BYTES + 1)});
        let normalized = normalize_params(huge);
        assert_eq!(normalized["truncated"], serde_json::json!(true));
    }

    #[test]
    fn numeric_timestamps_disambiguate_seconds_from_millis() {
        assert_eq!(normalize_timestamp(&serde_json::json!(1_700_000_000)), 1_700_000_000_000);
        assert_eq!(normalize_timestamp(&serde_json::json!(1_700_000_000_000_i64)), 1_700_000_000_000);
    }

    #[test]
    fn unparseable_timestamp_normalizes_to_zero_without_panicking() {
        assert_eq!(normalize_timestamp(&serde_json::json!("not a date")), 0);
        assert_eq!(normalize_timestamp(&serde_json::json!(null)), 0);
    }

    #[test]
    fn iso_timestamp_parses_to_expected_epoch_ms() {
        assert_eq!(normalize_timestamp(&serde_json::json!("2023-11-14T22:13:20Z")), 1_700_000_000_000);
    }
}
