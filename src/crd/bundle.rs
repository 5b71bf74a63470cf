//! Vendored bundle of Velero CustomResourceDefinition manifests

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::{Error, Result};

const EMBEDDED_BUNDLE: &str = include_str!("../../manifests/velero-crds.yaml");

/// An ordered collection of unstructured CRD manifests
#[derive(Clone, Debug)]
pub struct Bundle {
    source: String,
    text: String,
    manifests: Vec<Value>,
}

impl Bundle {
    /// The bundle compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::parse("embedded", EMBEDDED_BUNDLE)
    }

    /// Load a bundle from a multi-document YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(path.display().to_string(), &text)
    }

    /// Parse a multi-document YAML bundle, skipping empty documents
    pub fn parse(source: impl Into<String>, text: &str) -> Result<Self> {
        let source = source.into();
        let mut manifests = Vec::new();

        for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
            let value = Value::deserialize(document).map_err(|e| {
                Error::DecodeError(format!(
                    "{}: document {} is not valid YAML: {}",
                    source, index, e
                ))
            })?;

            if value.is_null() {
                continue;
            }
            manifests.push(value);
        }

        Ok(Self {
            source,
            text: text.to_string(),
            manifests,
        })
    }

    /// Where the bundle was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Manifests in bundle order
    pub fn manifests(&self) -> &[Value] {
        &self.manifests
    }

    /// Names of all manifests that declare one, in bundle order
    pub fn names(&self) -> Vec<String> {
        self.manifests
            .iter()
            .filter_map(super::manifest_name)
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Short SHA-256 of the bundle text, for identifying which bundle ran
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())[..16].to_string()
    }
}
