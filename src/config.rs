//! Installer configuration, read from environment variables

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Field manager recorded on CRDs written by the installer
pub const DEFAULT_FIELD_MANAGER: &str = "velero-crd-installer";

/// Default per-CRD wait for the `Established` condition
pub const DEFAULT_ESTABLISHED_TIMEOUT_SECS: u64 = 60;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Runtime configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// `CRD_BUNDLE_PATH`: bundle file to use instead of the embedded one
    pub bundle_path: Option<PathBuf>,
    /// `DRY_RUN`: ask the API server to validate writes without persisting them
    pub dry_run: bool,
    /// `FIELD_MANAGER`
    pub field_manager: String,
    /// `WAIT_ESTABLISHED`: wait for every CRD to be served after the pass
    pub wait_established: bool,
    /// `ESTABLISHED_TIMEOUT_SECS`
    pub established_timeout: Duration,
    /// `METRICS_TEXTFILE`: where to write Prometheus metrics on exit
    pub metrics_textfile: Option<PathBuf>,
    /// `LOG_FORMAT`: `json` or `text`
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_path: None,
            dry_run: false,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            wait_established: false,
            established_timeout: Duration::from_secs(DEFAULT_ESTABLISHED_TIMEOUT_SECS),
            metrics_textfile: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Config::default();

        config.bundle_path = get("CRD_BUNDLE_PATH").map(PathBuf::from);
        config.metrics_textfile = get("METRICS_TEXTFILE").map(PathBuf::from);

        if let Some(value) = get("DRY_RUN") {
            config.dry_run = parse_bool("DRY_RUN", &value)?;
        }
        if let Some(value) = get("FIELD_MANAGER") {
            config.field_manager = value;
        }
        if let Some(value) = get("WAIT_ESTABLISHED") {
            config.wait_established = parse_bool("WAIT_ESTABLISHED", &value)?;
        }
        if let Some(value) = get("ESTABLISHED_TIMEOUT_SECS") {
            let secs: u64 = value.parse().map_err(|_| {
                Error::ConfigError(format!(
                    "ESTABLISHED_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    value
                ))
            })?;
            if secs == 0 {
                return Err(Error::ConfigError(
                    "ESTABLISHED_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            config.established_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get("LOG_FORMAT") {
            config.log_format = match value.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => {
                    return Err(Error::ConfigError(format!(
                        "LOG_FORMAT must be one of: json, text (got '{}')",
                        value
                    )))
                }
            };
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}
