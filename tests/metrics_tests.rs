//! Tests for metrics export

use serde_json::json;
use velero_crd_installer::metrics;
use velero_crd_installer::reconcilers::crds::install_crds;
use velero_crd_installer::store::MemoryCrdStore;

#[tokio::test]
async fn textfile_contains_pass_metrics() {
    let store = MemoryCrdStore::new();
    let manifest = json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": { "name": "schedules.velero.io" },
        "spec": {
            "group": "velero.io",
            "names": { "kind": "Schedule", "plural": "schedules" },
            "scope": "Namespaced",
            "versions": [{ "name": "v1", "served": true, "storage": true }]
        }
    });
    install_crds(&store, &[manifest]).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("velero_crds.prom");
    metrics::write_textfile(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("velero_crd_installer_crd_actions_total{action=\"created\"}"));
    assert!(text.contains("velero_crd_installer_pass_duration_seconds"));
    assert!(!dir.path().join("velero_crds.prom.tmp").exists());
}
