//! Velero CRD installer
//!
//! Makes sure the CustomResourceDefinitions the Velero backup subsystem
//! depends on exist in the cluster and match the vendored definitions.
//! Runs once per invocation; there is no watch loop.

pub mod config;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;
pub mod store;

pub use error::{Error, Result};
