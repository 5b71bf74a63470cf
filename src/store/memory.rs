//! In-memory CRD store for tests
//!
//! Behaves like the API server where the reconciler can observe it:
//! objects get a uid and resourceVersion on write, `spec.conversion`
//! is defaulted, duplicate creates and stale replaces are rejected
//! with 409. Every call is recorded in order.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceConversion, CustomResourceDefinition,
};
use kube::core::ErrorResponse;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::CrdStore;
use crate::crd::NONE_CONVERSION_STRATEGY;
use crate::{Error, Result};

/// A store operation, used to target injected failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Update,
}

/// A recorded call against the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreCall {
    Get(String),
    Create(String),
    Update(String),
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, CustomResourceDefinition>,
    calls: Vec<StoreCall>,
    failures: HashMap<(Operation, String), String>,
    revision: u64,
}

impl State {
    fn injected_failure(&self, operation: Operation, name: &str) -> Result<()> {
        match self.failures.get(&(operation, name.to_string())) {
            Some(message) => Err(api_error(500, "InternalError", message.clone())),
            None => Ok(()),
        }
    }

    /// Apply what the API server does on every successful write
    fn persist(&mut self, mut crd: CustomResourceDefinition) {
        self.revision += 1;
        if crd.metadata.uid.is_none() {
            crd.metadata.uid = Some(format!("00000000-0000-0000-0000-{:012}", self.revision));
        }
        crd.metadata.resource_version = Some(self.revision.to_string());
        if crd.spec.conversion.is_none() {
            crd.spec.conversion = Some(CustomResourceConversion {
                strategy: NONE_CONVERSION_STRATEGY.to_string(),
                webhook: None,
            });
        }
        self.objects.insert(crd.name_any(), crd);
    }
}

/// In-process [`CrdStore`]
#[derive(Clone, Default)]
pub struct MemoryCrdStore {
    state: Arc<Mutex<State>>,
}

impl MemoryCrdStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object as if something else had created it. Not recorded as a call.
    pub fn insert(&self, crd: CustomResourceDefinition) {
        self.state().persist(crd);
    }

    /// Make every `operation` on `name` fail with an internal server error
    pub fn fail(&self, operation: Operation, name: &str, message: &str) {
        self.state()
            .failures
            .insert((operation, name.to_string()), message.to_string());
    }

    /// Current stored object, bypassing call recording and injected failures
    pub fn stored(&self, name: &str) -> Option<CustomResourceDefinition> {
        self.state().objects.get(name).cloned()
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Number of create and update calls made so far
    pub fn writes(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| !matches!(call, StoreCall::Get(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().objects.is_empty()
    }
}

#[async_trait::async_trait]
impl CrdStore for MemoryCrdStore {
    async fn get(&self, name: &str) -> Result<CustomResourceDefinition> {
        let mut state = self.state();
        state.calls.push(StoreCall::Get(name.to_string()));
        state.injected_failure(Operation::Get, name)?;

        state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn create(&self, crd: &CustomResourceDefinition) -> Result<()> {
        let name = crd.name_any();
        let mut state = self.state();
        state.calls.push(StoreCall::Create(name.clone()));
        state.injected_failure(Operation::Create, &name)?;

        if state.objects.contains_key(&name) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("customresourcedefinitions.apiextensions.k8s.io \"{}\" already exists", name),
            ));
        }

        let mut crd = crd.clone();
        crd.metadata.uid = None;
        crd.metadata.resource_version = None;
        state.persist(crd);
        Ok(())
    }

    async fn update(&self, crd: &CustomResourceDefinition) -> Result<()> {
        let name = crd.name_any();
        let mut state = self.state();
        state.calls.push(StoreCall::Update(name.clone()));
        state.injected_failure(Operation::Update, &name)?;

        let current_version = match state.objects.get(&name) {
            Some(current) => current.metadata.resource_version.clone(),
            None => {
                return Err(api_error(
                    404,
                    "NotFound",
                    format!("customresourcedefinitions.apiextensions.k8s.io \"{}\" not found", name),
                ))
            }
        };

        if crd.metadata.resource_version != current_version {
            return Err(api_error(
                409,
                "Conflict",
                format!(
                    "Operation cannot be fulfilled on customresourcedefinitions.apiextensions.k8s.io \"{}\": the object has been modified",
                    name
                ),
            ));
        }

        state.persist(crd.clone());
        Ok(())
    }
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::KubeError(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}
