// argus-ingest/src/error.rs
// ============================================================================
// Module: Argus Ingest Errors
// Description: Closed error taxonomy for artifact parsing.
// Dependencies: thiserror
// ============================================================================

/// Errors raised while parsing a bundle artifact.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParserError {
    /// The artifact bytes were not valid JSON, or not valid JSON of the
    /// expected top-level shape.
    #[error("malformed json in {filename}: {reason}")]
    MalformedJson {
        /// Artifact filename, for operator-facing context.
        filename: String,
        /// Human-readable reason the JSON was rejected.
        reason: String,
    },
    /// A required field was present but held a value of the wrong shape.
    #[error("invalid field `{field}` in {filename}: {reason}")]
    InvalidField {
        /// Artifact filename.
        filename: String,
        /// Name of the offending field.
        field: String,
        /// Human-readable reason the value was rejected.
        reason: String,
    },
}
