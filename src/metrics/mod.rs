//! Prometheus metrics for the Velero CRD installer
//!
//! The installer runs once and exits, so metrics are exported to a file
//! for a textfile collector instead of being served over HTTP.

pub mod registry;

pub use registry::*;
