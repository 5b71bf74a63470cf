//! Reconciliation of desired Velero CRDs against the cluster

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::ResourceExt;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::crd::{decode, normalize, specs_equal};
use crate::metrics::{CRD_ACTIONS, PASS_DURATION, PASS_ERRORS};
use crate::store::CrdStore;
use crate::{Error, Result};

/// What reconciling a single CRD did to the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
        }
    }
}

/// Per-CRD outcomes of a completed pass, in processing order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstallSummary {
    pub results: Vec<(String, Outcome)>,
}

impl InstallSummary {
    pub fn created(&self) -> Vec<&str> {
        self.with_outcome(Outcome::Created)
    }

    pub fn updated(&self) -> Vec<&str> {
        self.with_outcome(Outcome::Updated)
    }

    pub fn unchanged(&self) -> Vec<&str> {
        self.with_outcome(Outcome::Unchanged)
    }

    /// Number of CRDs that needed a create or update
    pub fn writes(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| *outcome != Outcome::Unchanged)
            .count()
    }

    fn with_outcome(&self, outcome: Outcome) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, o)| *o == outcome)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Converge every manifest in order, stopping at the first error.
///
/// Manifests after a failing one are never read or written. Running the
/// pass again is safe: converged CRDs are left alone.
#[instrument(skip_all, fields(manifests = manifests.len()))]
pub async fn install_crds<S>(store: &S, manifests: &[Value]) -> Result<InstallSummary>
where
    S: CrdStore + ?Sized,
{
    let start = Instant::now();
    let result = apply_all(store, manifests).await;
    PASS_DURATION.observe(start.elapsed().as_secs_f64());

    match &result {
        Ok(summary) => info!(
            "Installed Velero CRDs in {:.2}s: {} created, {} updated, {} unchanged",
            start.elapsed().as_secs_f64(),
            summary.created().len(),
            summary.updated().len(),
            summary.unchanged().len()
        ),
        Err(e) => {
            PASS_ERRORS.inc();
            error!("Velero CRD installation failed: {}", e);
        }
    }

    result
}

async fn apply_all<S>(store: &S, manifests: &[Value]) -> Result<InstallSummary>
where
    S: CrdStore + ?Sized,
{
    let mut summary = InstallSummary::default();

    for manifest in manifests {
        let crd = decode(manifest)?;
        let name = crd.name_any();

        let outcome = reconcile_crd(store, crd).await?;
        CRD_ACTIONS.with_label_values(&[outcome.as_str()]).inc();
        summary.results.push((name, outcome));
    }

    Ok(summary)
}

/// Create, update or leave alone a single CRD so the stored spec matches `desired`
pub async fn reconcile_crd<S>(store: &S, mut desired: CustomResourceDefinition) -> Result<Outcome>
where
    S: CrdStore + ?Sized,
{
    normalize(&mut desired);
    let name = desired.name_any();

    let mut found = match store.get(&name).await {
        Ok(found) => found,
        Err(Error::NotFound(_)) => {
            info!(action = "creating", crd.name = %name, "Creating CRD");
            store.create(&desired).await?;
            return Ok(Outcome::Created);
        }
        Err(e) => return Err(e),
    };

    if specs_equal(&found.spec, &desired.spec) {
        debug!(crd.name = %name, "CRD is up to date");
        return Ok(Outcome::Unchanged);
    }

    info!(
        action = "updating",
        crd.name = %name,
        found_spec = %spec_json(&found.spec),
        desired_spec = %spec_json(&desired.spec),
        "Updating CRD"
    );

    // Keep the stored metadata so the replace carries its resourceVersion
    found.spec = desired.spec;
    store.update(&found).await?;

    Ok(Outcome::Updated)
}

/// JSON for the update log line, or the `Debug` form if serialization fails
fn spec_json<T: Serialize + Debug>(spec: &T) -> String {
    serde_json::to_string(spec).unwrap_or_else(|_| format!("{:?}", spec))
}
