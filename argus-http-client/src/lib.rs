// argus-http-client/src/lib.rs
// ============================================================================
// Module: Argus HTTP Document Store
// Description: Elasticsearch-compatible bulk HTTP client implementing the
//   `DocumentStore` trait.
// Purpose: Give the pipeline a document store backend that talks to a real
//   ES-compatible cluster, with the pre-sort/chunk/retry discipline the
//   writer protocol requires.
// Dependencies: argus-core, argus-store, reqwest, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! `POST /_bulk` receives NDJSON action/document pairs. Per the data-plane
//! protocol, the client sorts every batch by document id before chunking it
//! into fixed-size pieces (500 documents per chunk) and pre-sorts so that
//! chunk boundaries are a pure function of the document id set, not of
//! submission order. HTTP statuses `429`, `502`, `503`, and `504`, and any
//! transport-level failure (connection refused, DNS, timeout), are retried
//! with a fixed backoff between attempts; every other non-2xx status is
//! surfaced immediately as a transport error.
//!
//! [`HttpDocumentStore::bootstrap_mappings`] is a separate, explicit step:
//! constructing a store does no network I/O, so a caller decides when (or
//! whether) to create missing indexes and check the rest for drift against
//! their frozen contracts.

use std::thread;
use std::time::Duration;

use argus_core::MappingContract;
use argus_store::BulkDoc;
use argus_store::BulkItemResult;
use argus_store::BulkItemStatus;
use argus_store::BulkOptions;
use argus_store::BulkReport;
use argus_store::DeleteReport;
use argus_store::DocumentStore;
use argus_store::RefreshPolicy;
use argus_store::StoreError;

/// Fixed size of each NDJSON bulk chunk, per the data-plane writer contract.
pub const BULK_CHUNK_SIZE: usize = 500;

/// HTTP statuses that are retried rather than surfaced immediately.
const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Credentials for an Elasticsearch-compatible document store, resolved by
/// the caller from `ES_URL`/`ES_API_KEY`/`ES_USERNAME`/`ES_PASSWORD`.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// API key sent as `Authorization: ApiKey <value>`, when set.
    pub api_key: Option<String>,
    /// Basic-auth username, used only when `api_key` is unset.
    pub username: Option<String>,
    /// Basic-auth password, used only when `api_key` is unset.
    pub password: Option<String>,
}

/// Configuration for an [`HttpDocumentStore`].
#[derive(Debug, Clone)]
pub struct HttpDocumentStoreConfig {
    /// Base URL of the document store, with no trailing slash.
    pub base_url: String,
    /// Authentication credentials.
    pub credentials: Credentials,
    /// Maximum number of retry attempts per bulk chunk, in addition to the
    /// first attempt.
    pub max_retries: u32,
    /// Fixed backoff slept before every retry attempt.
    pub retry_backoff: Duration,
}

impl Default for HttpDocumentStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            credentials: Credentials::default(),
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Elasticsearch-compatible bulk HTTP document store.
pub struct HttpDocumentStore {
    client: reqwest::blocking::Client,
    config: HttpDocumentStoreConfig,
}

impl HttpDocumentStore {
    /// Builds a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: HttpDocumentStoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    /// Applies the configured credentials to a request builder.
    fn authorize(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        if let Some(api_key) = &self.config.credentials.api_key {
            return req.header("Authorization", format!("ApiKey {api_key}"));
        }
        if let (Some(user), Some(pass)) = (&self.config.credentials.username, &self.config.credentials.password) {
            return req.basic_auth(user, Some(pass));
        }
        req
    }

    /// Sends a single bulk chunk, retrying on the statuses in
    /// [`RETRYABLE_STATUSES`] and on transport-level failures (connection
    /// refused, DNS, timeout) up to `max_retries` times.
    fn send_bulk_chunk(&self, index: &str, chunk: &[BulkDoc], refresh: RefreshPolicy) -> Result<BulkReport, StoreError> {
        let body = build_ndjson_body(index, chunk);
        let url = format!("{}/_bulk{}", self.config.base_url, refresh_query(refresh));

        let mut attempt: u32 = 0;
        loop {
            let request = self.authorize(self.client.post(&url).header("Content-Type", "application/x-ndjson")).body(body.clone());
            let response = match request.send() {
                Ok(response) => response,
                Err(err) => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        thread::sleep(self.config.retry_backoff);
                        continue;
                    }
                    return Err(StoreError::Transport(err.to_string()));
                }
            };
            let status = response.status().as_u16();
            if response.status().is_success() {
                return parse_bulk_response(chunk, &response.text().map_err(|err| StoreError::Transport(err.to_string()))?);
            }
            if RETRYABLE_STATUSES.contains(&status) && attempt < self.config.max_retries {
                attempt += 1;
                thread::sleep(self.config.retry_backoff);
                continue;
            }
            return Err(StoreError::Transport(format!("bulk request failed with status {status}")));
        }
    }

    /// Ensures every contract in `contracts` exists on the cluster with the
    /// expected shape. Creates an index that does not exist yet; for one
    /// that exists, compares the live `_meta.contractFingerprint` against
    /// the contract's own fingerprint and raises [`StoreError::MappingDrift`]
    /// on a mismatch rather than attempting to reconcile the difference.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transport`] on any HTTP failure, or
    /// [`StoreError::MappingDrift`] when a live index's mapping has diverged
    /// from its frozen contract.
    pub fn bootstrap_mappings(&self, contracts: &[&MappingContract]) -> Result<(), StoreError> {
        for contract in contracts {
            self.bootstrap_one_mapping(contract)?;
        }
        Ok(())
    }

    /// Bootstraps a single index against its contract.
    fn bootstrap_one_mapping(&self, contract: &MappingContract) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.config.base_url, contract.index);
        let response = self.authorize(self.client.get(&url)).send().map_err(|err| StoreError::Transport(err.to_string()))?;

        if response.status().as_u16() == 404 {
            let body = contract_creation_body(contract).map_err(|err| StoreError::Transport(err.to_string()))?;
            let create = self
                .authorize(self.client.put(&url).json(&body))
                .send()
                .map_err(|err| StoreError::Transport(err.to_string()))?;
            if !create.status().is_success() {
                return Err(StoreError::Transport(format!("index creation failed with status {}", create.status())));
            }
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!("mapping fetch failed with status {}", response.status())));
        }

        let body: serde_json::Value = response.json().map_err(|err| StoreError::Transport(err.to_string()))?;
        let live_fingerprint = body
            .pointer(&format!("/{}/mappings/_meta/contractFingerprint", contract.index))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let expected = contract.fingerprint().map_err(|err| StoreError::Transport(err.to_string()))?;
        if live_fingerprint != expected {
            return Err(StoreError::MappingDrift(contract.index.to_string()));
        }
        Ok(())
    }
}

/// Builds the index-creation body (`settings` + `mappings`) for a fresh
/// index, embedding the contract's fingerprint in `_meta` so a later
/// bootstrap call can detect drift without re-deriving the mapping.
fn contract_creation_body(contract: &MappingContract) -> Result<serde_json::Value, argus_core::HashError> {
    let dynamic = matches!(contract.dynamic, argus_core::DynamicPolicy::Strict);
    let mut properties = serde_json::Map::new();
    for field in contract.fields {
        let es_type = match field.json_type {
            "string" => "keyword",
            "number" => "long",
            "boolean" => "boolean",
            "array" | "object" => "object",
            other => other,
        };
        properties.insert(field.name.to_string(), serde_json::json!({"type": es_type}));
    }
    let fingerprint = contract.fingerprint()?;
    Ok(serde_json::json!({
        "settings": {
            "number_of_shards": contract.settings.shards,
            "number_of_replicas": contract.settings.replicas,
        },
        "mappings": {
            "dynamic": dynamic,
            "date_detection": contract.date_detection,
            "_meta": {
                "version": contract.meta_version,
                "contractFingerprint": fingerprint,
            },
            "properties": properties,
        },
    }))
}

impl DocumentStore for HttpDocumentStore {
    fn bulk_upsert(&self, index: &str, mut docs: Vec<BulkDoc>, opts: &BulkOptions) -> Result<BulkReport, StoreError> {
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let mut aggregate = BulkReport { attempted: docs.len(), ..BulkReport::default() };
        for chunk in docs.chunks(BULK_CHUNK_SIZE) {
            let chunk_report = self.send_bulk_chunk(index, chunk, opts.refresh)?;
            aggregate.succeeded += chunk_report.succeeded;
            aggregate.failed += chunk_report.failed;
            aggregate.items.extend(chunk_report.items);
        }
        Ok(aggregate)
    }

    fn get_by_id(&self, index: &str, id: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let url = format!("{}/{index}/_doc/{id}", self.config.base_url);
        let response = self.authorize(self.client.get(&url)).send().map_err(|err| StoreError::Transport(err.to_string()))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!("get failed with status {}", response.status())));
        }
        let body: serde_json::Value = response.json().map_err(|err| StoreError::Transport(err.to_string()))?;
        Ok(body.get("_source").cloned())
    }

    fn list(&self, index: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        let url = format!("{}/{index}/_search", self.config.base_url);
        let response = self
            .authorize(self.client.post(&url).json(&serde_json::json!({"query": {"match_all": {}}, "size": 10_000})))
            .send()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(StoreError::Transport(format!("search failed with status {}", response.status())));
        }
        let body: serde_json::Value = response.json().map_err(|err| StoreError::Transport(err.to_string()))?;
        let hits = body.pointer("/hits/hits").and_then(serde_json::Value::as_array).cloned().unwrap_or_default();
        Ok(hits.into_iter().filter_map(|hit| hit.get("_source").cloned()).collect())
    }

    fn delete_by_run_id(&self, run_id: &str, indexes: Option<&[&str]>) -> Result<DeleteReport, StoreError> {
        let Some(indexes) = indexes else {
            return Err(StoreError::Transport("delete_by_run_id over HTTP requires an explicit index list".to_string()));
        };
        let mut report = DeleteReport::default();
        for index in indexes {
            let url = format!("{}/{index}/_delete_by_query", self.config.base_url);
            let response = self
                .authorize(self.client.post(&url).json(&serde_json::json!({"query": {"term": {"runId": run_id}}})))
                .send()
                .map_err(|err| StoreError::Transport(err.to_string()))?;
            if !response.status().is_success() {
                return Err(StoreError::Transport(format!("delete_by_query failed with status {}", response.status())));
            }
            let body: serde_json::Value = response.json().map_err(|err| StoreError::Transport(err.to_string()))?;
            let deleted = body.get("deleted").and_then(serde_json::Value::as_u64).unwrap_or(0);
            if deleted > 0 {
                report.deleted_by_index.insert((*index).to_string(), usize::try_from(deleted).unwrap_or(usize::MAX));
            }
        }
        Ok(report)
    }
}

/// Returns the `?refresh=...` query suffix for a refresh policy, empty for
/// the ES default (`false`) since `wait_for` must be requested explicitly.
fn refresh_query(refresh: RefreshPolicy) -> &'static str {
    match refresh {
        RefreshPolicy::WaitFor => "?refresh=wait_for",
        RefreshPolicy::False => "",
    }
}

/// Builds the NDJSON body for a bulk chunk: one `{"index": {...}}` action
/// line followed by the document body, per document.
fn build_ndjson_body(index: &str, chunk: &[BulkDoc]) -> String {
    let mut body = String::new();
    for doc in chunk {
        let action = serde_json::json!({"index": {"_index": index, "_id": doc.id}});
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&doc.body.to_string());
        body.push('\n');
    }
    body
}

/// Parses a `/_bulk` response body into a [`BulkReport`] for one chunk.
fn parse_bulk_response(chunk: &[BulkDoc], response_body: &str) -> Result<BulkReport, StoreError> {
    let parsed: serde_json::Value =
        serde_json::from_str(response_body).map_err(|err| StoreError::Transport(err.to_string()))?;
    let items = parsed.get("items").and_then(serde_json::Value::as_array).cloned().unwrap_or_default();

    let mut report = BulkReport { attempted: chunk.len(), ..BulkReport::default() };
    for (doc, item) in chunk.iter().zip(items.iter()) {
        let action = item.get("index").or_else(|| item.get("create")).or_else(|| item.get("update"));
        let status_code = action.and_then(|a| a.get("status")).and_then(serde_json::Value::as_u64).unwrap_or(200);
        if (200..300).contains(&status_code) {
            report.succeeded += 1;
            report.items.push(BulkItemResult { id: doc.id.clone(), status: BulkItemStatus::Created });
        } else {
            let reason = action
                .and_then(|a| a.pointer("/error/reason"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("bulk item failed")
                .to_string();
            report.failed += 1;
            report.items.push(BulkItemResult { id: doc.id.clone(), status: BulkItemStatus::Failed { reason } });
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;

    /// Spawns a `tiny_http` server that serves a fixed sequence of
    /// responses to `/_bulk`, one per call, looping the last entry once
    /// exhausted. Returns the server's base URL and a call counter.
    fn spawn_bulk_server(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let addr = server.server_addr();
        let counter = Arc::new(AtomicUsize::new(0));
        let thread_counter = Arc::clone(&counter);
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok(mut request) = server.recv() else { return };
                let mut buf = String::new();
                let _ = request.as_reader().read_to_string(&mut buf);
                thread_counter.fetch_add(1, Ordering::SeqCst);
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(tiny_http::StatusCode(status));
                let _ = request.respond(response);
            }
        });
        (format!("http://{addr}"), counter)
    }

    fn store(base_url: String) -> HttpDocumentStore {
        HttpDocumentStore::new(HttpDocumentStoreConfig {
            base_url,
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            ..HttpDocumentStoreConfig::default()
        })
        .expect("client builds")
    }

    #[test]
    fn retries_on_503_then_succeeds() {
        let ok_body = serde_json::json!({"items": [{"index": {"status": 200}}]}).to_string();
        let (base_url, counter) = spawn_bulk_server(vec![(503, "service unavailable".to_string()), (200, ok_body)]);
        let store = store(base_url);
        let report = store
            .bulk_upsert("findings", vec![BulkDoc { id: "a".to_string(), body: serde_json::json!({}) }], &BulkOptions::default())
            .expect("eventually succeeds");
        assert_eq!(report.succeeded, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transport_failure_retries_then_surfaces_the_error() {
        // No listener on this port; every attempt fails at the transport
        // level, exercising the retry path that a bad status code cannot.
        let store = store("http://127.0.0.1:1".to_string());
        let result = store.bulk_upsert("findings", vec![BulkDoc { id: "a".to_string(), body: serde_json::json!({}) }], &BulkOptions::default());
        assert!(matches!(result, Err(StoreError::Transport(_))));
    }

    #[test]
    fn non_retryable_status_fails_immediately() {
        let (base_url, counter) = spawn_bulk_server(vec![(400, "bad request".to_string())]);
        let store = store(base_url);
        let result = store.bulk_upsert("findings", vec![BulkDoc { id: "a".to_string(), body: serde_json::json!({}) }], &BulkOptions::default());
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    const TEST_CONTRACT: MappingContract = MappingContract {
        index: "findings",
        id_field: "findingId",
        fields: &[argus_core::FieldContract { name: "findingId", json_type: "string", required: true }],
        dynamic: argus_core::DynamicPolicy::Strict,
        meta_version: "1.0",
        settings: argus_core::IndexSettings { shards: 1, replicas: 1 },
        date_detection: false,
    };

    /// Spawns a `tiny_http` server that serves one fixed response to any
    /// single request, regardless of method or path.
    fn spawn_single_response_server(status: u16, body: String) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let addr = server.server_addr();
        thread::spawn(move || {
            let Ok(request) = server.recv() else { return };
            let response = tiny_http::Response::from_string(body).with_status_code(tiny_http::StatusCode(status));
            let _ = request.respond(response);
        });
        format!("http://{addr}")
    }

    /// Spawns a `tiny_http` server that serves a fixed sequence of
    /// responses, one per request, then stops accepting connections.
    fn spawn_sequential_response_server(responses: Vec<(u16, String)>) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let addr = server.server_addr();
        thread::spawn(move || {
            for (status, body) in responses {
                let Ok(request) = server.recv() else { return };
                let response = tiny_http::Response::from_string(body).with_status_code(tiny_http::StatusCode(status));
                let _ = request.respond(response);
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn bootstrap_creates_missing_index() {
        let base_url = spawn_sequential_response_server(vec![
            (404, "not found".to_string()),
            (200, "created".to_string()),
        ]);
        let store = store(base_url);
        store.bootstrap_mappings(&[&TEST_CONTRACT]).expect("creates index");
    }

    #[test]
    fn bootstrap_detects_drift_on_mismatched_fingerprint() {
        let body = serde_json::json!({
            "findings": {"mappings": {"_meta": {"contractFingerprint": "stale"}}}
        })
        .to_string();
        let base_url = spawn_single_response_server(200, body);
        let store = store(base_url);
        let result = store.bootstrap_mappings(&[&TEST_CONTRACT]);
        assert!(matches!(result, Err(StoreError::MappingDrift(index)) if index == "findings"));
    }
}
