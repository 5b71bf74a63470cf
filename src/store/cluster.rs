//! Kubernetes API server backed CRD store

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use super::CrdStore;
use crate::{Error, Result};

/// CRD store backed by `apiextensions.k8s.io/v1` on a live cluster
#[derive(Clone)]
pub struct KubeCrdStore {
    api: Api<CustomResourceDefinition>,
    post_params: PostParams,
}

impl KubeCrdStore {
    /// Create a store. With `dry_run` the API server validates writes without persisting them.
    pub fn new(client: Client, field_manager: &str, dry_run: bool) -> Self {
        Self {
            api: Api::all(client),
            post_params: PostParams {
                dry_run,
                field_manager: Some(field_manager.to_string()),
            },
        }
    }
}

#[async_trait::async_trait]
impl CrdStore for KubeCrdStore {
    async fn get(&self, name: &str) -> Result<CustomResourceDefinition> {
        match self.api.get(name).await {
            Ok(crd) => Ok(crd),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                Err(Error::NotFound(name.to_string()))
            }
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn create(&self, crd: &CustomResourceDefinition) -> Result<()> {
        let created = self.api.create(&self.post_params, crd).await?;
        debug!(
            "Created CRD {} at resourceVersion {}",
            created.name_any(),
            created.resource_version().unwrap_or_default()
        );
        Ok(())
    }

    async fn update(&self, crd: &CustomResourceDefinition) -> Result<()> {
        let name = crd.name_any();
        let replaced = self.api.replace(&name, &self.post_params, crd).await?;
        debug!(
            "Replaced CRD {} at resourceVersion {}",
            name,
            replaced.resource_version().unwrap_or_default()
        );
        Ok(())
    }
}
