// argus-core/src/core/error.rs
// ============================================================================
// Module: Argus Core Errors
// Description: Closed error taxonomy shared by the identity and mapping
//   layers.
// Dependencies: thiserror
// ============================================================================

/// Errors raised while canonicalizing or hashing a JSON value.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The value could not be serialized into RFC 8785 canonical form, most
    /// commonly because it contained a non-finite float.
    #[error("value is not canonicalizable: {0}")]
    NotCanonicalizable(String),
}

/// Errors raised while constructing a typed identifier.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// The supplied string was empty where a non-empty identifier is required.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the field that failed validation.
        field: &'static str,
    },
    /// The supplied string did not match the expected identifier shape.
    #[error("{field} has invalid shape: {value}")]
    InvalidShape {
        /// Name of the field that failed validation.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}
