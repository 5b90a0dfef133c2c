// argus-objectstore/src/tests.rs
// ============================================================================
// Module: Bundle Object Store Tests
// Description: Exercises key derivation and round-trip behavior against an
//   in-memory object-store double.
// Dependencies: argus-core
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use argus_core::BuildId;
use argus_core::Repo;

use super::*;

struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    fn new() -> Self {
        Self { objects: Mutex::new(BTreeMap::new()) }
    }
}

impl ObjectStoreClient for InMemoryObjectStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object store lock poisoned".to_string()))?
            .insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str, max_bytes: usize) -> Result<Vec<u8>, ObjectStoreError> {
        let bytes = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Io("object store lock poisoned".to_string()))?
            .get(key)
            .ok_or_else(|| ObjectStoreError::Io("object not found".to_string()))?
            .clone();
        if bytes.len() > max_bytes {
            return Err(ObjectStoreError::TooLarge { key: key.to_string(), max_bytes, actual_bytes: bytes.len() });
        }
        Ok(bytes)
    }
}

fn ids() -> (Repo, BuildId) {
    (Repo::new("acme/widgets").expect("repo"), BuildId::new("b1").expect("build id"))
}

#[test]
fn artifact_round_trips_through_the_object_store() {
    let store = BundleObjectStore::from_client(Arc::new(InMemoryObjectStore::new()));
    let (repo, build_id) = ids();
    let key = store.put_artifact(&repo, &build_id, "results.sarif", b"{}".to_vec()).expect("put");
    assert_eq!(key, "acme/widgets/b1/artifacts/results.sarif");
    let bytes = store.get_artifact(&repo, &build_id, "results.sarif", 1024).expect("get");
    assert_eq!(bytes, b"{}");
}

#[test]
fn manifest_round_trips_through_the_object_store() {
    let store = BundleObjectStore::from_client(Arc::new(InMemoryObjectStore::new()));
    let (repo, build_id) = ids();
    let key = store.put_manifest(&repo, &build_id, b"[]".to_vec()).expect("put");
    assert_eq!(key, "acme/widgets/b1/bundle.manifest.json");
    let bytes = store.get_manifest(&repo, &build_id, 1024).expect("get");
    assert_eq!(bytes, b"[]");
}

#[test]
fn artifact_key_includes_the_configured_prefix() {
    let store = BundleObjectStore {
        client: Arc::new(InMemoryObjectStore::new()),
        root_prefix: normalize_prefix("bundles/prod").expect("prefix"),
    };
    let (repo, build_id) = ids();
    let key = store.put_artifact(&repo, &build_id, "results.sarif", b"{}".to_vec()).expect("put");
    assert_eq!(key, "bundles/prod/acme/widgets/b1/artifacts/results.sarif");
}

#[test]
fn filename_with_path_traversal_is_rejected() {
    let store = BundleObjectStore::from_client(Arc::new(InMemoryObjectStore::new()));
    let (repo, build_id) = ids();
    let err = store.put_artifact(&repo, &build_id, "../escape.sarif", b"{}".to_vec()).expect_err("rejected");
    assert!(matches!(err, ObjectStoreError::Invalid(_)));
}

#[test]
fn oversized_artifact_is_rejected_before_reaching_the_backend() {
    let store = BundleObjectStore::from_client(Arc::new(InMemoryObjectStore::new()));
    let (repo, build_id) = ids();
    let oversized = vec![0u8; MAX_ARTIFACT_BYTES + 1];
    let err = store.put_artifact(&repo, &build_id, "huge.sarif", oversized).expect_err("rejected");
    assert!(matches!(err, ObjectStoreError::TooLarge { .. }));
}

#[test]
fn reading_with_a_tight_limit_surfaces_too_large() {
    let store = BundleObjectStore::from_client(Arc::new(InMemoryObjectStore::new()));
    let (repo, build_id) = ids();
    store.put_artifact(&repo, &build_id, "results.sarif", vec![0u8; 100]).expect("put");
    let err = store.get_artifact(&repo, &build_id, "results.sarif", 10).expect_err("rejected");
    assert!(matches!(err, ObjectStoreError::TooLarge { .. }));
}

#[test]
fn prefix_with_parent_traversal_is_rejected() {
    let err = normalize_prefix("bundles/../escape").expect_err("rejected");
    assert!(matches!(err, ObjectStoreError::Invalid(_)));
}
