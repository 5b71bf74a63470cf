//! Error types for the Velero CRD installer

use thiserror::Error;

/// Result type for the installer
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the installer
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error, passed through as returned by the client
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    /// The requested CustomResourceDefinition does not exist
    #[error("CustomResourceDefinition not found: {0}")]
    NotFound(String),

    /// A desired manifest could not be turned into a CustomResourceDefinition
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A CustomResourceDefinition did not become established in time
    #[error("Timed out waiting for CustomResourceDefinition {0} to become established")]
    Timeout(String),

    /// Watching a CustomResourceDefinition for establishment failed
    #[error("Wait error: {0}")]
    WaitError(String),

    /// Local file I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the object is absent from the store
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
