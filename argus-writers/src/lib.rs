// argus-writers/src/lib.rs
// ============================================================================
// Module: Argus Data-Plane Writers
// Description: Per-index document validators and the shared bulk-upsert
//   orchestration that enforces the writer contract before any document
//   reaches the document store.
// Purpose: Implement the five-step writer algorithm once, generically, and
//   specialize it per index via a small trait instead of duplicating the
//   algorithm per entity kind.
// Dependencies: argus-core, argus-store, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The writer contract runs in a fixed order: (1) every document must carry
//! its declared id field; (2) that id must equal the value the validator
//! recomputes from the document's defining fields; (3) every other declared
//! required field must be present; (4) if every document in the batch fails
//! steps 1-3, the batch is never sent to the store at all; (5) whatever
//! reaches the store and fails there is folded back into the same failure
//! list under `BULK_ITEM_FAILED`. A writer never partially validates: a
//! document that fails step 1 is never checked against steps 2 or 3.

pub mod validators;

use argus_store::BulkDoc;
use argus_store::BulkItemStatus;
use argus_store::BulkOptions;
use argus_store::DocumentStore;
use argus_store::StoreError;

/// Closed set of reasons a single document can fail the writer contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterErrorCode {
    /// The document did not carry its declared id field.
    MissingRequiredId,
    /// The document's id field did not match the id recomputed from its
    /// defining fields.
    IdMismatch,
    /// A declared required field was missing or null.
    MissingRequiredField,
    /// The document store rejected the document after it passed local
    /// validation.
    BulkItemFailed,
}

impl WriterErrorCode {
    /// Returns the taxonomy code string used in `WriterReport` output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequiredId => "MISSING_REQUIRED_ID",
            Self::IdMismatch => "ID_MISMATCH",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::BulkItemFailed => "BULK_ITEM_FAILED",
        }
    }
}

/// A single document's failure within a [`WriterReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterFailure {
    /// The document's id, when one could be determined.
    pub id: Option<String>,
    /// Closed failure code.
    pub code: WriterErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Aggregate outcome of [`write_documents`].
#[derive(Debug, Clone, Default)]
pub struct WriterReport {
    /// Number of documents submitted to the writer.
    pub attempted: usize,
    /// Number of documents successfully upserted.
    pub succeeded: usize,
    /// Number of documents that failed, at any step.
    pub failed: usize,
    /// Ids of successfully upserted documents, in submission order.
    pub upserted_ids: Vec<String>,
    /// Every failure encountered, in submission order.
    pub failures: Vec<WriterFailure>,
}

/// Per-index contract a writer enforces before submitting documents to the
/// document store.
pub trait IndexValidator {
    /// Name of the index this validator writes to.
    fn index_name(&self) -> &'static str;

    /// Name of the field that must hold the document's id.
    fn required_id_field(&self) -> &'static str;

    /// Recomputes the id a document should have from its defining fields.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message when the document's defining fields
    /// are themselves missing or malformed, distinct from an id mismatch.
    fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String>;

    /// Every field (other than the id field) that must be present and
    /// non-null for a document to be valid.
    fn required_fields(&self) -> &'static [&'static str];
}

/// Validates and writes `docs` to `validator`'s index via `store`, enforcing
/// the five-step writer contract.
///
/// # Errors
///
/// Returns [`StoreError`] only when the underlying store transport fails;
/// per-document validation and per-item store failures are reported inside
/// the returned [`WriterReport`], never as an `Err`.
pub fn write_documents(
    validator: &dyn IndexValidator,
    store: &dyn DocumentStore,
    docs: Vec<serde_json::Value>,
    opts: &BulkOptions,
) -> Result<WriterReport, StoreError> {
    let mut report = WriterReport { attempted: docs.len(), ..WriterReport::default() };
    let mut valid = Vec::new();

    for doc in docs {
        match validate_one(validator, &doc) {
            Ok(id) => valid.push(BulkDoc { id, body: doc }),
            Err(failure) => {
                report.failed += 1;
                report.failures.push(failure);
            }
        }
    }

    if valid.is_empty() {
        return Ok(report);
    }

    let bulk_report = store.bulk_upsert(validator.index_name(), valid, opts)?;
    for item in bulk_report.items {
        match item.status {
            BulkItemStatus::Created | BulkItemStatus::Updated => {
                report.succeeded += 1;
                report.upserted_ids.push(item.id);
            }
            BulkItemStatus::Failed { reason } => {
                report.failed += 1;
                report.failures.push(WriterFailure { id: Some(item.id), code: WriterErrorCode::BulkItemFailed, message: reason });
            }
        }
    }
    Ok(report)
}

/// Runs steps 1-3 of the writer contract against a single document,
/// returning its id on success.
fn validate_one(validator: &dyn IndexValidator, doc: &serde_json::Value) -> Result<String, WriterFailure> {
    let id_field = validator.required_id_field();
    let Some(id) = doc.get(id_field).and_then(serde_json::Value::as_str) else {
        return Err(WriterFailure {
            id: None,
            code: WriterErrorCode::MissingRequiredId,
            message: format!("document is missing required id field `{id_field}`"),
        });
    };

    let expected = validator.compute_expected_id(doc).map_err(|reason| WriterFailure {
        id: Some(id.to_string()),
        code: WriterErrorCode::MissingRequiredId,
        message: reason,
    })?;
    if expected != id {
        return Err(WriterFailure {
            id: Some(id.to_string()),
            code: WriterErrorCode::IdMismatch,
            message: format!("document id `{id}` does not match recomputed id `{expected}`"),
        });
    }

    for field in validator.required_fields() {
        let present = doc.get(field).is_some_and(|v| !v.is_null());
        if !present {
            return Err(WriterFailure {
                id: Some(id.to_string()),
                code: WriterErrorCode::MissingRequiredField,
                message: format!("document is missing required field `{field}`"),
            });
        }
    }

    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use argus_store::InMemoryDocumentStore;

    use super::*;

    struct TestValidator;
    impl IndexValidator for TestValidator {
        fn index_name(&self) -> &'static str {
            "findings"
        }
        fn required_id_field(&self) -> &'static str {
            "findingId"
        }
        fn compute_expected_id(&self, doc: &serde_json::Value) -> Result<String, String> {
            Ok(doc.get("findingId").and_then(serde_json::Value::as_str).unwrap_or_default().to_string())
        }
        fn required_fields(&self) -> &'static [&'static str] {
            &["severity"]
        }
    }

    #[test]
    fn missing_id_field_is_reported_without_touching_the_store() {
        let store = InMemoryDocumentStore::new();
        let docs = vec![serde_json::json!({"severity": "high"})];
        let report = write_documents(&TestValidator, &store, docs, &BulkOptions::default()).expect("ok");
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].code, WriterErrorCode::MissingRequiredId);
        assert!(store.list("findings").expect("ok").is_empty());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let store = InMemoryDocumentStore::new();
        let docs = vec![serde_json::json!({"findingId": "abc"})];
        let report = write_documents(&TestValidator, &store, docs, &BulkOptions::default()).expect("ok");
        assert_eq!(report.failures[0].code, WriterErrorCode::MissingRequiredField);
    }

    #[test]
    fn valid_document_is_upserted() {
        let store = InMemoryDocumentStore::new();
        let docs = vec![serde_json::json!({"findingId": "abc", "severity": "high"})];
        let report = write_documents(&TestValidator, &store, docs, &BulkOptions::default()).expect("ok");
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.upserted_ids, vec!["abc".to_string()]);
    }

    #[test]
    fn bulk_item_failures_are_mapped_back_into_the_report() {
        let store = InMemoryDocumentStore::new();
        store.set_fail_ids(["abc".to_string()]);
        let docs = vec![serde_json::json!({"findingId": "abc", "severity": "high"})];
        let report = write_documents(&TestValidator, &store, docs, &BulkOptions::default()).expect("ok");
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].code, WriterErrorCode::BulkItemFailed);
    }
}
