//! Prometheus metrics definitions and textfile export

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use tracing::info;

use crate::{Error, Result};

lazy_static::lazy_static! {
    /// CRDs processed, by outcome (created, updated, unchanged)
    pub static ref CRD_ACTIONS: CounterVec = register_counter_vec!(
        "velero_crd_installer_crd_actions_total",
        "Total number of CRDs processed by outcome",
        &["action"]
    ).unwrap();

    /// Installation pass duration histogram
    pub static ref PASS_DURATION: Histogram = register_histogram!(
        "velero_crd_installer_pass_duration_seconds",
        "Duration of CRD installation passes in seconds",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Installation passes that stopped on an error
    pub static ref PASS_ERRORS: Counter = register_counter!(
        "velero_crd_installer_pass_errors_total",
        "Total number of CRD installation passes that failed"
    ).unwrap();
}

/// Encode all registered metrics in the Prometheus text format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::IoError(std::io::Error::other(e)))?;

    String::from_utf8(buffer).map_err(|e| Error::IoError(std::io::Error::other(e)))
}

/// Write metrics for a node-exporter textfile collector.
///
/// The file is written next to `path` first and renamed into place so the
/// collector never reads a partial file.
pub fn write_textfile(path: &Path) -> Result<()> {
    let text = render()?;
    let staging = staging_path(path);

    std::fs::write(&staging, text)?;
    std::fs::rename(&staging, path)?;

    info!("Wrote metrics to {}", path.display());
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = OsString::from(path.as_os_str());
    staging.push(".tmp");
    PathBuf::from(staging)
}
