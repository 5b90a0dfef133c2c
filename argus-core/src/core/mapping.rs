// argus-core/src/core/mapping.rs
// ============================================================================
// Module: Argus Mapping Contracts
// Description: Frozen per-index field contracts and drift/validation checks.
// Purpose: Give every writer a single, versioned definition of what an index
//   is allowed to contain, instead of letting each writer invent its own
//   notion of "required field".
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Each index's contract is a `const` Rust value, not a file loaded at
//! startup: the set of indexes this pipeline writes is closed and known at
//! compile time, so there is nothing to gain from making the contract
//! data-driven and something to lose (a contract that can silently drift from
//! the code that enforces it). Contracts are compared by canonical hash to
//! detect drift, the way `argus-store`'s schema registry detects on-disk
//! schema drift.

use crate::core::hashing::hash;

/// Whether an index accepts only declared fields (`strict`) or permits extra
/// fields without indexing them (`dynamic: false`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicPolicy {
    /// Unknown fields are rejected outright.
    Strict,
    /// Unknown fields are accepted but not indexed.
    DynamicFalse,
}

/// A single field's declared contract within an index.
#[derive(Debug, Clone, Copy)]
pub struct FieldContract {
    /// Field name as it appears in the document.
    pub name: &'static str,
    /// Declared JSON type (`"string"`, `"number"`, `"boolean"`, `"array"`, `"object"`).
    pub json_type: &'static str,
    /// Whether the field must be present on every document.
    pub required: bool,
}

/// Index-level settings pinned by a contract, independent of its field
/// mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    /// Number of primary shards.
    pub shards: u32,
    /// Number of replicas per primary shard.
    pub replicas: u32,
}

/// The frozen contract for a single index.
#[derive(Debug, Clone)]
pub struct MappingContract {
    /// Index name.
    pub index: &'static str,
    /// Field used as the document's `_id` and required to match `body[idField]`.
    pub id_field: &'static str,
    /// Declared field contracts.
    pub fields: &'static [FieldContract],
    /// Unknown-field policy.
    pub dynamic: DynamicPolicy,
    /// `_meta.version` pinned for this contract.
    pub meta_version: &'static str,
    /// Index-level shard/replica settings.
    pub settings: IndexSettings,
    /// Whether the index attempts to auto-detect date-shaped strings.
    /// Always `false`: every timestamp field in this pipeline is an
    /// explicit epoch-millisecond integer, never a date string.
    pub date_detection: bool,
}

impl MappingContract {
    /// Computes a canonical-hash fingerprint of this contract's shape, used
    /// to detect drift between a contract baseline and a live index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::HashError`] only if `self` somehow
    /// canonicalizes to a non-finite float, which cannot happen for this
    /// fixed string/bool field set.
    pub fn fingerprint(&self) -> Result<String, crate::core::error::HashError> {
        let fields: Vec<_> = self
            .fields
            .iter()
            .map(|f| serde_json::json!({"name": f.name, "type": f.json_type, "required": f.required}))
            .collect();
        hash(&serde_json::json!({
            "index": self.index,
            "idField": self.id_field,
            "fields": fields,
            "dynamic": matches!(self.dynamic, DynamicPolicy::Strict),
            "metaVersion": self.meta_version,
            "settings": {"shards": self.settings.shards, "replicas": self.settings.replicas},
            "dateDetection": self.date_detection,
        }))
    }
}

/// Errors raised while validating a document against a mapping contract.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingError {
    /// A strict index received a field it does not declare.
    #[error("unknown field `{field}` on index `{index}`")]
    UnknownField {
        /// Offending index name.
        index: &'static str,
        /// Offending field name.
        field: String,
    },
    /// A declared field's value did not match its declared JSON type.
    #[error("field `{field}` on index `{index}` expected type `{expected}`, got `{actual}`")]
    TypeMismatch {
        /// Offending index name.
        index: &'static str,
        /// Offending field name.
        field: String,
        /// Declared type.
        expected: &'static str,
        /// Actual JSON type observed.
        actual: &'static str,
    },
    /// The live index's fingerprint no longer matches the frozen contract's.
    #[error("mapping drift detected on index `{index}`")]
    MappingDrift {
        /// Offending index name.
        index: &'static str,
    },
}

/// Default shard/replica settings shared by every domain index in this
/// pipeline. A single-node deployment never needs more shards than this to
/// stay within a reasonable segment count, and one replica is the minimum
/// that survives a single node loss.
const DEFAULT_SETTINGS: IndexSettings = IndexSettings { shards: 1, replicas: 1 };

/// Frozen contract for the `findings` index.
pub const FINDINGS_CONTRACT: MappingContract = MappingContract {
    index: "findings",
    id_field: "findingId",
    fields: &[
        FieldContract { name: "findingId", json_type: "string", required: true },
        FieldContract { name: "repo", json_type: "string", required: true },
        FieldContract { name: "buildId", json_type: "string", required: true },
        FieldContract { name: "runId", json_type: "string", required: true },
        FieldContract { name: "ruleId", json_type: "string", required: true },
        FieldContract { name: "severity", json_type: "string", required: true },
        FieldContract { name: "cves", json_type: "array", required: false },
        FieldContract { name: "cve", json_type: "string", required: false },
        FieldContract { name: "package", json_type: "string", required: false },
        FieldContract { name: "version", json_type: "string", required: false },
        FieldContract { name: "filePath", json_type: "string", required: false },
        FieldContract { name: "lineNumber", json_type: "number", required: false },
        FieldContract { name: "tool", json_type: "string", required: true },
        FieldContract { name: "fingerprint", json_type: "string", required: true },
        FieldContract { name: "createdAt", json_type: "number", required: true },
        FieldContract { name: "reachabilityId", json_type: "string", required: false },
        FieldContract { name: "priorityScore", json_type: "number", required: false },
        FieldContract { name: "context", json_type: "object", required: false },
        FieldContract { name: "priorityExplanation", json_type: "object", required: false },
    ],
    dynamic: DynamicPolicy::Strict,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `dependencies` index.
pub const DEPENDENCIES_CONTRACT: MappingContract = MappingContract {
    index: "dependencies",
    id_field: "dependencyId",
    fields: &[
        FieldContract { name: "dependencyId", json_type: "string", required: true },
        FieldContract { name: "repo", json_type: "string", required: true },
        FieldContract { name: "buildId", json_type: "string", required: true },
        FieldContract { name: "runId", json_type: "string", required: true },
        FieldContract { name: "parent", json_type: "string", required: true },
        FieldContract { name: "child", json_type: "string", required: true },
        FieldContract { name: "version", json_type: "string", required: true },
        FieldContract { name: "scope", json_type: "string", required: true },
    ],
    dynamic: DynamicPolicy::Strict,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `sbom_components` index.
pub const SBOM_COMPONENTS_CONTRACT: MappingContract = MappingContract {
    index: "sbom_components",
    id_field: "componentId",
    fields: &[
        FieldContract { name: "componentId", json_type: "string", required: true },
        FieldContract { name: "repo", json_type: "string", required: true },
        FieldContract { name: "buildId", json_type: "string", required: true },
        FieldContract { name: "runId", json_type: "string", required: true },
        FieldContract { name: "purl", json_type: "string", required: false },
        FieldContract { name: "name", json_type: "string", required: true },
        FieldContract { name: "version", json_type: "string", required: true },
    ],
    dynamic: DynamicPolicy::Strict,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `reachability` index.
pub const REACHABILITY_CONTRACT: MappingContract = MappingContract {
    index: "reachability",
    id_field: "reachabilityId",
    fields: &[
        FieldContract { name: "reachabilityId", json_type: "string", required: true },
        FieldContract { name: "findingId", json_type: "string", required: true },
        FieldContract { name: "runId", json_type: "string", required: true },
        FieldContract { name: "analysisVersion", json_type: "string", required: true },
        FieldContract { name: "reachable", json_type: "boolean", required: true },
        FieldContract { name: "status", json_type: "string", required: true },
        FieldContract { name: "reason", json_type: "string", required: false },
        FieldContract { name: "evidencePath", json_type: "array", required: true },
        FieldContract { name: "confidenceScore", json_type: "number", required: true },
        FieldContract { name: "method", json_type: "string", required: true },
        FieldContract { name: "computedAt", json_type: "number", required: true },
    ],
    dynamic: DynamicPolicy::Strict,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `threat_intel` index.
pub const THREAT_INTEL_CONTRACT: MappingContract = MappingContract {
    index: "threat_intel",
    id_field: "intelId",
    fields: &[
        FieldContract { name: "intelId", json_type: "string", required: true },
        FieldContract { name: "kev", json_type: "boolean", required: true },
        FieldContract { name: "epss", json_type: "number", required: false },
        FieldContract { name: "severity", json_type: "string", required: false },
    ],
    dynamic: DynamicPolicy::Strict,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `actions` index. Dynamic since `payload` varies
/// in shape by action type and is never queried field-by-field.
pub const ACTIONS_CONTRACT: MappingContract = MappingContract {
    index: "actions",
    id_field: "actionId",
    fields: &[
        FieldContract { name: "actionId", json_type: "string", required: true },
        FieldContract { name: "idempotencyKey", json_type: "string", required: true },
        FieldContract { name: "runId", json_type: "string", required: true },
        FieldContract { name: "type", json_type: "string", required: true },
        FieldContract { name: "status", json_type: "string", required: true },
        FieldContract { name: "attempt", json_type: "number", required: true },
        FieldContract { name: "payloadHash", json_type: "string", required: true },
        FieldContract { name: "templateVersion", json_type: "string", required: true },
        FieldContract { name: "payload", json_type: "object", required: true },
    ],
    dynamic: DynamicPolicy::DynamicFalse,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `priority_explanations` index.
pub const PRIORITY_EXPLANATIONS_CONTRACT: MappingContract = MappingContract {
    index: "priority_explanations",
    id_field: "explanationId",
    fields: &[
        FieldContract { name: "explanationId", json_type: "string", required: true },
        FieldContract { name: "findingId", json_type: "string", required: true },
        FieldContract { name: "explanationVersion", json_type: "string", required: true },
        FieldContract { name: "inputs", json_type: "object", required: true },
        FieldContract { name: "totalScore", json_type: "number", required: true },
        FieldContract { name: "reasonCodes", json_type: "array", required: true },
    ],
    dynamic: DynamicPolicy::Strict,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Frozen contract for the `artifacts` index. Dynamic since `artifacts` is a
/// workflow/audit record rather than a queried domain document.
pub const ARTIFACTS_CONTRACT: MappingContract = MappingContract {
    index: "artifacts",
    id_field: "artifactId",
    fields: &[
        FieldContract { name: "artifactId", json_type: "string", required: true },
        FieldContract { name: "repo", json_type: "string", required: true },
        FieldContract { name: "buildId", json_type: "string", required: true },
        FieldContract { name: "runId", json_type: "string", required: true },
        FieldContract { name: "artifactType", json_type: "string", required: true },
        FieldContract { name: "filename", json_type: "string", required: true },
        FieldContract { name: "checksum", json_type: "string", required: true },
        FieldContract { name: "createdAt", json_type: "number", required: true },
    ],
    dynamic: DynamicPolicy::DynamicFalse,
    meta_version: "1.0",
    settings: DEFAULT_SETTINGS,
    date_detection: false,
};

/// Every index contract this pipeline bootstraps, in the order a fresh
/// cluster should create them.
pub const ALL_CONTRACTS: [&MappingContract; 8] = [
    &FINDINGS_CONTRACT,
    &DEPENDENCIES_CONTRACT,
    &SBOM_COMPONENTS_CONTRACT,
    &REACHABILITY_CONTRACT,
    &THREAT_INTEL_CONTRACT,
    &ACTIONS_CONTRACT,
    &PRIORITY_EXPLANATIONS_CONTRACT,
    &ARTIFACTS_CONTRACT,
];

/// Validates `document` against `contract`'s declared fields and dynamic policy.
///
/// Required-field presence is the writer's concern (`argus-writers`); this
/// function only checks fields that *are* present, plus, under
/// [`DynamicPolicy::Strict`], that no undeclared field is present at all.
///
/// # Errors
///
/// Returns [`MappingError::UnknownField`] or [`MappingError::TypeMismatch`].
pub fn validate_document_against_index(
    contract: &MappingContract,
    document: &serde_json::Value,
) -> Result<(), MappingError> {
    let serde_json::Value::Object(map) = document else {
        return Ok(());
    };
    for (key, value) in map {
        let Some(field) = contract.fields.iter().find(|f| f.name == key) else {
            if matches!(contract.dynamic, DynamicPolicy::Strict) {
                return Err(MappingError::UnknownField {
                    index: contract.index,
                    field: key.clone(),
                });
            }
            continue;
        };
        if !json_type_matches(field.json_type, value) {
            return Err(MappingError::TypeMismatch {
                index: contract.index,
                field: key.clone(),
                expected: field.json_type,
                actual: json_type_name(value),
            });
        }
    }
    Ok(())
}

/// Checks whether a live contract fingerprint still matches the frozen baseline.
///
/// # Errors
///
/// Returns [`MappingError::MappingDrift`] when the fingerprints differ, or
/// propagates a [`crate::core::error::HashError`] converted into a drift
/// error when fingerprinting itself fails.
pub fn check_drift(contract: &MappingContract, baseline_fingerprint: &str) -> Result<(), MappingError> {
    let live = contract.fingerprint().map_err(|_| MappingError::MappingDrift { index: contract.index })?;
    if live != baseline_fingerprint {
        return Err(MappingError::MappingDrift { index: contract.index });
    }
    Ok(())
}

/// Returns true when `value`'s runtime JSON type matches `declared`.
fn json_type_matches(declared: &str, value: &serde_json::Value) -> bool {
    declared == json_type_name(value)
}

/// Returns the JSON type name of `value`, using the same vocabulary as
/// [`FieldContract::json_type`].
const fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINDINGS_CONTRACT: MappingContract = MappingContract {
        index: "findings",
        id_field: "findingId",
        fields: &[
            FieldContract { name: "findingId", json_type: "string", required: true },
            FieldContract { name: "severity", json_type: "string", required: true },
            FieldContract { name: "priorityScore", json_type: "number", required: false },
        ],
        dynamic: DynamicPolicy::Strict,
        meta_version: "1.0",
        settings: DEFAULT_SETTINGS,
        date_detection: false,
    };

    #[test]
    fn strict_index_rejects_unknown_field() {
        let doc = serde_json::json!({"findingId": "x", "severity": "high", "bogus": 1});
        assert_eq!(
            validate_document_against_index(&FINDINGS_CONTRACT, &doc),
            Err(MappingError::UnknownField { index: "findings", field: "bogus".to_string() })
        );
    }

    #[test]
    fn type_mismatch_is_detected() {
        let doc = serde_json::json!({"findingId": "x", "severity": 5});
        assert!(matches!(
            validate_document_against_index(&FINDINGS_CONTRACT, &doc),
            Err(MappingError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn fingerprint_is_stable_across_calls() {
        assert_eq!(
            FINDINGS_CONTRACT.fingerprint().expect("hashable"),
            FINDINGS_CONTRACT.fingerprint().expect("hashable")
        );
    }
}
