// argus-actions/src/lib.rs
// ============================================================================
// Module: Argus Action Generators
// Description: Dry-run ticket and chat payload builders with idempotency
//   keys, payload hashing, block budgets, and the duplicate-suppression
//   execution model.
// Dependencies: argus-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every action this crate produces is a pure function of its inputs: given
//! the same findings and template version, the same `idempotencyKey` and
//! `payloadHash` come out every time, and the crate never performs network
//! I/O. Duplicate suppression is evaluated against a caller-supplied list of
//! already-stored actions rather than a live store, keeping this crate free
//! of a storage dependency.

pub mod chat;
/// Error types for the actions crate.
pub mod error;
pub mod execution;
pub mod ticket;

pub use error::ActionError;
pub use execution::resolve_action;
pub use execution::ActionOutcome;
pub use execution::ActionStatus;

/// Template version embedded in every idempotency key and carried in every
/// action document's `templateVersion` field.
pub const TEMPLATE_VERSION: &str = "1.0";

/// Tagged union of every action payload shape this crate can build.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum ActionPayload {
    /// A single per-finding ticket creation payload.
    #[serde(rename = "JIRA_CREATE")]
    Ticket(ticket::TicketPayload),
    /// A single summary chat message spanning the top-N findings.
    #[serde(rename = "CHAT_SUMMARY")]
    ChatSummary(chat::ChatSummaryPayload),
    /// A single per-finding chat thread reply.
    #[serde(rename = "CHAT_THREAD")]
    ChatThread(chat::ChatThreadPayload),
}

impl ActionPayload {
    /// Returns the closed action-type discriminant string used in
    /// idempotency key derivation.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Ticket(_) => "JIRA_CREATE",
            Self::ChatSummary(_) => "CHAT_SUMMARY",
            Self::ChatThread(_) => "CHAT_THREAD",
        }
    }
}

/// Normalizes multiline text before it is canonicalized and hashed:
/// CRLF sequences collapse to LF, and trailing whitespace is trimmed from
/// every line.
#[must_use]
pub fn normalize_multiline(text: &str) -> String {
    text.replace("\r\n", "\n").lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Computes `payloadHash = hash(canonical(payload))` after normalizing the
/// payload's rendered text through [`normalize_multiline`].
///
/// # Errors
///
/// Returns [`ActionError::Hash`] if the payload cannot be canonicalized,
/// which in practice never happens for these string-only payload shapes.
pub fn payload_hash(payload: &ActionPayload) -> Result<String, ActionError> {
    let mut value = serde_json::to_value(payload).map_err(|err| ActionError::Hash(err.to_string()))?;
    normalize_value_strings(&mut value);
    argus_core::hash(&value).map_err(|err| ActionError::Hash(err.to_string()))
}

/// Recursively normalizes every string leaf in a JSON value through
/// [`normalize_multiline`], so both single-line and multiline fields hash
/// consistently regardless of platform line endings.
fn normalize_value_strings(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => *s = normalize_multiline(s),
        serde_json::Value::Array(items) => items.iter_mut().for_each(normalize_value_strings),
        serde_json::Value::Object(map) => map.values_mut().for_each(normalize_value_strings),
        serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {}
    }
}

/// Computes the idempotency key for an action from its discriminating parts,
/// in the fixed `key=value` order the pipeline assembles them in.
///
/// # Errors
///
/// Returns [`ActionError::Hash`] if canonicalization fails.
pub fn idempotency_key(parts: &[(&str, &str)]) -> Result<String, ActionError> {
    let joined = parts.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("|");
    argus_core::hash(&serde_json::Value::String(joined)).map_err(|err| ActionError::Hash(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_multiline_collapses_crlf_and_trims_trailing_whitespace() {
        let input = "line one   \r\nline two\t\r\nline three";
        assert_eq!(normalize_multiline(input), "line one\nline two\nline three");
    }

    #[test]
    fn idempotency_key_is_stable_for_identical_parts() {
        let parts = [("type", "JIRA_CREATE"), ("repo", "acme/widgets"), ("findingId", "abc")];
        let a = idempotency_key(&parts).expect("hashes");
        let b = idempotency_key(&parts).expect("hashes");
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_changes_with_any_part() {
        let a = idempotency_key(&[("type", "JIRA_CREATE"), ("findingId", "abc")]).expect("hashes");
        let b = idempotency_key(&[("type", "JIRA_CREATE"), ("findingId", "xyz")]).expect("hashes");
        assert_ne!(a, b);
    }
}
