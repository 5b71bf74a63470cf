//! Waiting for installed CRDs to be served

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, Client};
use std::time::Duration;
use tracing::info;

use crate::{Error, Result};

/// Wait, in order, for each named CRD to report `Established=True`.
///
/// `timeout` bounds each CRD separately.
pub async fn wait_for_established(client: Client, names: &[String], timeout: Duration) -> Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client);

    for name in names {
        info!("Waiting for CRD {} to become established", name);

        let established = await_condition(crds.clone(), name, conditions::is_crd_established());
        match tokio::time::timeout(timeout, established).await {
            Ok(Ok(_)) => info!("CRD {} is established", name),
            Ok(Err(e)) => return Err(Error::WaitError(format!("{}: {}", name, e))),
            Err(_) => return Err(Error::Timeout(name.clone())),
        }
    }

    Ok(())
}
