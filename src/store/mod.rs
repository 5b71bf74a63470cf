//! Access to the CustomResourceDefinitions held by the API server
//!
//! The reconciler only needs get/create/update by name, so it is written
//! against [`CrdStore`]. [`KubeCrdStore`] talks to a real cluster. With the
//! `test-util` feature, `MemoryCrdStore` keeps everything in process for tests.

mod cluster;
#[cfg(feature = "test-util")]
mod memory;

pub use cluster::KubeCrdStore;
#[cfg(feature = "test-util")]
pub use memory::{MemoryCrdStore, Operation, StoreCall};

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::Result;

/// Get/create/update of cluster-scoped CustomResourceDefinitions by name
#[async_trait::async_trait]
pub trait CrdStore: Send + Sync {
    /// Fetch a CRD. Absence is reported as [`crate::Error::NotFound`].
    async fn get(&self, name: &str) -> Result<CustomResourceDefinition>;

    /// Create a CRD that does not exist yet
    async fn create(&self, crd: &CustomResourceDefinition) -> Result<()>;

    /// Replace an existing CRD. `metadata.resourceVersion` must match the stored object.
    async fn update(&self, crd: &CustomResourceDefinition) -> Result<()>;
}
