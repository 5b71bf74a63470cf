//! Integration tests for the CRD reconciler
//!
//! These tests run installation passes against the in-memory store and
//! check which reads and writes reach it.

use std::collections::BTreeMap;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use velero_crd_installer::crd::{decode, normalize, NONE_CONVERSION_STRATEGY};
use velero_crd_installer::reconcilers::crds::{install_crds, reconcile_crd, Outcome};
use velero_crd_installer::store::{CrdStore, MemoryCrdStore, Operation, StoreCall};
use velero_crd_installer::Error;

// ============================================================================
// Test Helpers
// ============================================================================

fn crd_manifest(name: &str, description: &str) -> Value {
    let (plural, _) = name.split_once('.').unwrap_or((name, ""));
    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {
            "name": name,
            "labels": { "component": "velero" }
        },
        "spec": {
            "group": "velero.io",
            "names": {
                "kind": "Thing",
                "listKind": "ThingList",
                "plural": plural,
                "singular": "thing"
            },
            "scope": "Namespaced",
            "versions": [{
                "name": "v1",
                "served": true,
                "storage": true,
                "schema": {
                    "openAPIV3Schema": {
                        "description": description,
                        "type": "object",
                        "x-kubernetes-preserve-unknown-fields": true
                    }
                }
            }]
        }
    })
}

fn stored_crd(name: &str, description: &str) -> CustomResourceDefinition {
    decode(&crd_manifest(name, description)).unwrap()
}

fn normalized(name: &str, description: &str) -> CustomResourceDefinition {
    let mut crd = stored_crd(name, description);
    normalize(&mut crd);
    crd
}

fn get(name: &str) -> StoreCall {
    StoreCall::Get(name.to_string())
}

fn create(name: &str) -> StoreCall {
    StoreCall::Create(name.to_string())
}

fn update(name: &str) -> StoreCall {
    StoreCall::Update(name.to_string())
}

fn is_internal_error(err: &Error) -> bool {
    matches!(err, Error::KubeError(kube::Error::Api(response)) if response.code == 500)
}

// ============================================================================
// Create / Update / No-op
// ============================================================================

#[tokio::test]
async fn missing_crd_is_created_with_normalized_spec() {
    let store = MemoryCrdStore::new();
    let manifests = vec![crd_manifest("foos.velero.io", "S1")];

    let summary = assert_ok!(install_crds(&store, &manifests).await);

    assert_eq!(summary.created(), vec!["foos.velero.io"]);
    assert_eq!(store.calls(), vec![get("foos.velero.io"), create("foos.velero.io")]);

    let stored = store.stored("foos.velero.io").unwrap();
    assert_eq!(stored.spec, normalized("foos.velero.io", "S1").spec);
    assert_eq!(
        stored.spec.conversion.unwrap().strategy,
        NONE_CONVERSION_STRATEGY
    );
}

#[tokio::test]
async fn converged_crd_is_left_untouched() {
    let store = MemoryCrdStore::new();
    store.insert(normalized("foos.velero.io", "S1"));
    let manifests = vec![crd_manifest("foos.velero.io", "S1")];

    let summary = assert_ok!(install_crds(&store, &manifests).await);

    assert_eq!(summary.unchanged(), vec!["foos.velero.io"]);
    assert_eq!(summary.writes(), 0);
    assert_eq!(store.calls(), vec![get("foos.velero.io")]);
}

#[tokio::test]
async fn server_defaulted_conversion_is_not_a_diff() {
    // Stored without conversion; the store fills it in the way the API server does
    let store = MemoryCrdStore::new();
    store.insert(stored_crd("foos.velero.io", "S1"));

    let outcome = assert_ok!(reconcile_crd(&store, stored_crd("foos.velero.io", "S1")).await);

    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn diverged_crd_is_updated() {
    let store = MemoryCrdStore::new();
    store.insert(normalized("foos.velero.io", "S1"));
    let manifests = vec![crd_manifest("foos.velero.io", "S2")];

    let summary = assert_ok!(install_crds(&store, &manifests).await);

    assert_eq!(summary.updated(), vec!["foos.velero.io"]);
    assert_eq!(store.calls(), vec![get("foos.velero.io"), update("foos.velero.io")]);
    assert_eq!(
        store.stored("foos.velero.io").unwrap().spec,
        normalized("foos.velero.io", "S2").spec
    );
}

#[tokio::test]
async fn update_preserves_stored_metadata() {
    let store = MemoryCrdStore::new();
    let mut existing = normalized("foos.velero.io", "S1");
    existing.metadata.labels = Some(BTreeMap::from([(
        "owner".to_string(),
        "someone-else".to_string(),
    )]));
    existing.metadata.annotations = Some(BTreeMap::from([(
        "note".to_string(),
        "keep me".to_string(),
    )]));
    store.insert(existing);
    let before = store.stored("foos.velero.io").unwrap();

    let outcome = assert_ok!(reconcile_crd(&store, stored_crd("foos.velero.io", "S2")).await);
    assert_eq!(outcome, Outcome::Updated);

    let after = store.stored("foos.velero.io").unwrap();
    assert_eq!(after.metadata.uid, before.metadata.uid);
    assert_eq!(after.metadata.labels, before.metadata.labels);
    assert_eq!(after.metadata.annotations, before.metadata.annotations);
    assert_ne!(after.metadata.resource_version, before.metadata.resource_version);
    assert_eq!(after.spec, normalized("foos.velero.io", "S2").spec);
}

#[tokio::test]
async fn empty_bundle_succeeds_without_calls() {
    let store = MemoryCrdStore::new();

    let summary = assert_ok!(install_crds(&store, &[]).await);

    assert!(summary.results.is_empty());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn mixed_bundle_reports_outcomes_in_order() {
    let store = MemoryCrdStore::new();
    store.insert(normalized("as.velero.io", "same"));
    store.insert(normalized("bs.velero.io", "old"));
    let manifests = vec![
        crd_manifest("as.velero.io", "same"),
        crd_manifest("bs.velero.io", "new"),
        crd_manifest("cs.velero.io", "fresh"),
    ];

    let summary = assert_ok!(install_crds(&store, &manifests).await);

    assert_eq!(
        summary.results,
        vec![
            ("as.velero.io".to_string(), Outcome::Unchanged),
            ("bs.velero.io".to_string(), Outcome::Updated),
            ("cs.velero.io".to_string(), Outcome::Created),
        ]
    );
    assert_eq!(summary.writes(), 2);
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn second_pass_makes_no_writes() {
    let store = MemoryCrdStore::new();
    store.insert(normalized("bs.velero.io", "old"));
    let manifests = vec![
        crd_manifest("as.velero.io", "a"),
        crd_manifest("bs.velero.io", "b"),
    ];

    assert_ok!(install_crds(&store, &manifests).await);
    store.clear_calls();

    let summary = assert_ok!(install_crds(&store, &manifests).await);

    assert_eq!(summary.unchanged().len(), 2);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn embedded_bundle_converges_and_is_idempotent() {
    let store = MemoryCrdStore::new();
    let bundle = velero_crd_installer::crd::Bundle::embedded().unwrap();

    let first = assert_ok!(install_crds(&store, bundle.manifests()).await);
    assert_eq!(first.created().len(), bundle.len());
    assert_eq!(store.len(), bundle.len());

    for manifest in bundle.manifests() {
        let mut desired = decode(manifest).unwrap();
        normalize(&mut desired);
        let name = desired.metadata.name.clone().unwrap();
        assert_eq!(store.stored(&name).unwrap().spec, desired.spec);
    }

    store.clear_calls();
    let second = assert_ok!(install_crds(&store, bundle.manifests()).await);
    assert_eq!(second.unchanged().len(), bundle.len());
    assert_eq!(store.writes(), 0);
}

// ============================================================================
// Fail-fast
// ============================================================================

#[tokio::test]
async fn read_error_stops_the_pass() {
    let store = MemoryCrdStore::new();
    store.fail(Operation::Get, "bs.velero.io", "etcdserver: request timed out");
    let manifests = vec![
        crd_manifest("as.velero.io", "a"),
        crd_manifest("bs.velero.io", "b"),
        crd_manifest("cs.velero.io", "c"),
    ];

    let err = assert_err!(install_crds(&store, &manifests).await);

    assert!(is_internal_error(&err), "unexpected error: {:?}", err);
    assert_eq!(
        store.calls(),
        vec![get("as.velero.io"), create("as.velero.io"), get("bs.velero.io")]
    );
    assert!(store.stored("as.velero.io").is_some());
    assert!(store.stored("cs.velero.io").is_none());
}

#[tokio::test]
async fn create_error_stops_the_pass() {
    let store = MemoryCrdStore::new();
    store.fail(Operation::Create, "as.velero.io", "admission webhook denied the request");
    let manifests = vec![
        crd_manifest("as.velero.io", "a"),
        crd_manifest("bs.velero.io", "b"),
    ];

    let err = assert_err!(install_crds(&store, &manifests).await);

    assert!(is_internal_error(&err));
    assert_eq!(store.calls(), vec![get("as.velero.io"), create("as.velero.io")]);
    assert!(store.is_empty());
}

#[tokio::test]
async fn update_error_stops_the_pass() {
    let store = MemoryCrdStore::new();
    store.insert(normalized("as.velero.io", "old"));
    store.fail(Operation::Update, "as.velero.io", "connection reset by peer");
    let manifests = vec![
        crd_manifest("as.velero.io", "new"),
        crd_manifest("bs.velero.io", "b"),
    ];

    let err = assert_err!(install_crds(&store, &manifests).await);

    assert!(is_internal_error(&err));
    assert_eq!(store.calls(), vec![get("as.velero.io"), update("as.velero.io")]);
    assert_eq!(
        store.stored("as.velero.io").unwrap().spec,
        normalized("as.velero.io", "old").spec
    );
}

#[tokio::test]
async fn undecodable_manifest_stops_the_pass() {
    let store = MemoryCrdStore::new();
    let manifests = vec![
        crd_manifest("as.velero.io", "a"),
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "not-a-crd" }
        }),
        crd_manifest("cs.velero.io", "c"),
    ];

    let err = assert_err!(install_crds(&store, &manifests).await);

    assert!(matches!(err, Error::DecodeError(_)), "unexpected error: {:?}", err);
    assert_eq!(store.calls(), vec![get("as.velero.io"), create("as.velero.io")]);
}

#[tokio::test]
async fn not_found_is_never_surfaced() {
    let store = MemoryCrdStore::new();

    let err = store.get("missing.velero.io").await.unwrap_err();
    assert!(err.is_not_found());

    let outcome = assert_ok!(reconcile_crd(&store, stored_crd("missing.velero.io", "x")).await);
    assert_eq!(outcome, Outcome::Created);
}

#[tokio::test]
async fn reconciler_works_through_a_trait_object() {
    let memory = MemoryCrdStore::new();
    let store: &dyn CrdStore = &memory;

    let summary = assert_ok!(install_crds(store, &[crd_manifest("as.velero.io", "a")]).await);

    assert_eq!(summary.created(), vec!["as.velero.io"]);
    assert_eq!(memory.len(), 1);
}
