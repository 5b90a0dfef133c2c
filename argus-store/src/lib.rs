// argus-store/src/lib.rs
// ============================================================================
// Module: Argus Document Store
// Description: The `DocumentStore` trait every backend implements, plus an
//   in-memory implementation used by tests and the determinism harness.
// Purpose: Give the pipeline one storage abstraction regardless of whether
//   documents ultimately land in an Elasticsearch-compatible cluster or a
//   process-local map.
// Dependencies: argus-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`InMemoryDocumentStore`] mirrors the shape of a shared, mutex-guarded
//! map keyed by index then by document id, the same pattern a process-local
//! run-state store would use to back a single-node test double. It supports
//! fault injection (`fail_ids`, `throw_on_bulk`) so writer and retry-taxonomy
//! tests do not need a real HTTP server.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Mutex;

/// Errors a [`DocumentStore`] implementation may return.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// The underlying transport (HTTP, or a simulated fault) failed.
    #[error("document store transport error: {0}")]
    Transport(String),
    /// A lock was poisoned by a panic in another thread.
    #[error("document store lock poisoned")]
    Poisoned,
    /// A live index's mapping no longer matches its frozen contract.
    #[error("mapping drift detected on index `{0}`")]
    MappingDrift(String),
}

/// Refresh policy for a bulk write, mirroring the Elasticsearch `refresh`
/// query parameter. The pipeline's default is [`RefreshPolicy::WaitFor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Block until the write is visible to subsequent reads.
    #[default]
    WaitFor,
    /// Do not wait for visibility.
    False,
}

/// Options controlling a single [`DocumentStore::bulk_upsert`] call.
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    /// Refresh policy for this batch.
    pub refresh: RefreshPolicy,
}

/// A single document to upsert, paired with its required id.
#[derive(Debug, Clone)]
pub struct BulkDoc {
    /// Document id; MUST equal `body[idField]` per the writer contract.
    pub id: String,
    /// Document body.
    pub body: serde_json::Value,
}

/// Outcome of a single document within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkItemStatus {
    /// The document did not previously exist and was created.
    Created,
    /// The document previously existed and was overwritten.
    Updated,
    /// The document failed to write.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Per-document result within a [`BulkReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    /// Document id this result describes.
    pub id: String,
    /// Outcome for this document.
    pub status: BulkItemStatus,
}

/// Aggregate result of a [`DocumentStore::bulk_upsert`] call.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    /// Number of documents submitted.
    pub attempted: usize,
    /// Number of documents that succeeded (created or updated).
    pub succeeded: usize,
    /// Number of documents that failed.
    pub failed: usize,
    /// Per-document results, in submission order.
    pub items: Vec<BulkItemResult>,
}

/// Result of a [`DocumentStore::delete_by_run_id`] call.
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Number of documents deleted, keyed by index name.
    pub deleted_by_index: BTreeMap<String, usize>,
}

/// Storage abstraction for indexed, bulk-upsertable documents.
pub trait DocumentStore: Send + Sync {
    /// Pre-sorts `docs` by id and upserts them into `index`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transport itself fails; a partial
    /// per-document failure is reported in [`BulkReport`], not as an `Err`.
    fn bulk_upsert(&self, index: &str, docs: Vec<BulkDoc>, opts: &BulkOptions) -> Result<BulkReport, StoreError>;

    /// Fetches a single document by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport failure.
    fn get_by_id(&self, index: &str, id: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Lists every document in `index`, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport failure.
    fn list(&self, index: &str) -> Result<Vec<serde_json::Value>, StoreError>;

    /// Deletes every document whose `runId` field equals `run_id`, across
    /// `indexes` (or every known index when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transport failure.
    fn delete_by_run_id(&self, run_id: &str, indexes: Option<&[&str]>) -> Result<DeleteReport, StoreError>;
}

/// In-memory [`DocumentStore`] used by tests and the determinism harness.
pub struct InMemoryDocumentStore {
    indexes: Mutex<BTreeMap<String, BTreeMap<String, serde_json::Value>>>,
    fail_ids: Mutex<HashSet<String>>,
    throw_on_bulk: Mutex<bool>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Creates an empty store with no fault injection configured.
    #[must_use]
    pub fn new() -> Self {
        Self { indexes: Mutex::new(BTreeMap::new()), fail_ids: Mutex::new(HashSet::new()), throw_on_bulk: Mutex::new(false) }
    }

    /// Configures specific document ids to fail on the next (and every
    /// subsequent) bulk write, simulating `BULK_ITEM_FAILED`.
    ///
    /// # Panics
    ///
    /// Panics only if the internal lock was poisoned by an earlier panic in
    /// another thread, which would indicate an already-corrupted test
    /// fixture.
    pub fn set_fail_ids(&self, ids: impl IntoIterator<Item = String>) {
        let mut guard = self.fail_ids.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = ids.into_iter().collect();
    }

    /// Configures every subsequent `bulk_upsert` call to fail at the
    /// transport level, simulating a dropped connection.
    ///
    /// # Panics
    ///
    /// Panics only if the internal lock was poisoned by an earlier panic in
    /// another thread.
    pub fn set_throw_on_bulk(&self, throw: bool) {
        let mut guard = self.throw_on_bulk.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = throw;
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn bulk_upsert(&self, index: &str, mut docs: Vec<BulkDoc>, _opts: &BulkOptions) -> Result<BulkReport, StoreError> {
        if *self.throw_on_bulk.lock().map_err(|_| StoreError::Poisoned)? {
            return Err(StoreError::Transport("simulated bulk transport failure".to_string()));
        }
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let fail_ids = self.fail_ids.lock().map_err(|_| StoreError::Poisoned)?.clone();
        let mut indexes = self.indexes.lock().map_err(|_| StoreError::Poisoned)?;
        let table = indexes.entry(index.to_string()).or_default();

        let mut report = BulkReport { attempted: docs.len(), ..BulkReport::default() };
        for doc in docs {
            if fail_ids.contains(&doc.id) {
                report.failed += 1;
                report.items.push(BulkItemResult { id: doc.id, status: BulkItemStatus::Failed { reason: "injected failure".to_string() } });
                continue;
            }
            let status = if table.insert(doc.id.clone(), doc.body).is_some() { BulkItemStatus::Updated } else { BulkItemStatus::Created };
            report.succeeded += 1;
            report.items.push(BulkItemResult { id: doc.id, status });
        }
        Ok(report)
    }

    fn get_by_id(&self, index: &str, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let indexes = self.indexes.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(indexes.get(index).and_then(|table| table.get(id)).cloned())
    }

    fn list(&self, index: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        let indexes = self.indexes.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(indexes.get(index).map(|table| table.values().cloned().collect()).unwrap_or_default())
    }

    fn delete_by_run_id(&self, run_id: &str, indexes_filter: Option<&[&str]>) -> Result<DeleteReport, StoreError> {
        let mut indexes = self.indexes.lock().map_err(|_| StoreError::Poisoned)?;
        let mut report = DeleteReport::default();
        for (index, table) in indexes.iter_mut() {
            if let Some(filter) = indexes_filter
                && !filter.contains(&index.as_str())
            {
                continue;
            }
            let before = table.len();
            table.retain(|_, body| body.get("runId").and_then(serde_json::Value::as_str) != Some(run_id));
            let removed = before - table.len();
            if removed > 0 {
                report.deleted_by_index.insert(index.clone(), removed);
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_upsert_sorts_and_reports_per_document_results() {
        let store = InMemoryDocumentStore::new();
        let docs = vec![
            BulkDoc { id: "b".to_string(), body: serde_json::json!({"runId": "r1"}) },
            BulkDoc { id: "a".to_string(), body: serde_json::json!({"runId": "r1"}) },
        ];
        let report = store.bulk_upsert("findings", docs, &BulkOptions::default()).expect("ok");
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.items[0].id, "a");
        assert_eq!(report.items[1].id, "b");
    }

    #[test]
    fn fail_ids_surface_as_partial_failures() {
        let store = InMemoryDocumentStore::new();
        store.set_fail_ids(["bad".to_string()]);
        let docs = vec![
            BulkDoc { id: "bad".to_string(), body: serde_json::json!({}) },
            BulkDoc { id: "good".to_string(), body: serde_json::json!({}) },
        ];
        let report = store.bulk_upsert("findings", docs, &BulkOptions::default()).expect("ok");
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn throw_on_bulk_returns_transport_error() {
        let store = InMemoryDocumentStore::new();
        store.set_throw_on_bulk(true);
        let err = store.bulk_upsert("findings", vec![], &BulkOptions::default());
        assert!(matches!(err, Err(StoreError::Transport(_))));
    }

    #[test]
    fn delete_by_run_id_removes_matching_documents_only() {
        let store = InMemoryDocumentStore::new();
        store
            .bulk_upsert(
                "findings",
                vec![
                    BulkDoc { id: "a".to_string(), body: serde_json::json!({"runId": "r1"}) },
                    BulkDoc { id: "b".to_string(), body: serde_json::json!({"runId": "r2"}) },
                ],
                &BulkOptions::default(),
            )
            .expect("ok");
        let report = store.delete_by_run_id("r1", None).expect("ok");
        assert_eq!(report.deleted_by_index.get("findings"), Some(&1));
        assert_eq!(store.list("findings").expect("ok").len(), 1);
    }
}
