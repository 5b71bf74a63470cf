//! Typed view of desired CustomResourceDefinition manifests

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceConversion, CustomResourceDefinition, CustomResourceDefinitionSpec,
};
use serde_json::Value;

use crate::{Error, Result};

/// Conversion strategy the API server reports for CRDs without a conversion webhook
pub const NONE_CONVERSION_STRATEGY: &str = "None";

/// Decode an unstructured manifest into a CustomResourceDefinition
///
/// Fails when the document is not an `apiextensions.k8s.io/v1`
/// `CustomResourceDefinition` or carries no `metadata.name`.
pub fn decode(manifest: &Value) -> Result<CustomResourceDefinition> {
    let crd: CustomResourceDefinition = serde_json::from_value(manifest.clone()).map_err(|e| {
        Error::DecodeError(format!(
            "invalid CustomResourceDefinition manifest {}: {}",
            manifest_name(manifest).unwrap_or("<unnamed>"),
            e
        ))
    })?;

    match crd.metadata.name.as_deref() {
        Some(name) if !name.is_empty() => Ok(crd),
        _ => Err(Error::DecodeError(
            "CustomResourceDefinition manifest has no metadata.name".to_string(),
        )),
    }
}

/// Force the conversion strategy to `None`.
///
/// The API server fills in `spec.conversion` on read, so a desired spec
/// without it would never compare equal to the stored one.
pub fn normalize(crd: &mut CustomResourceDefinition) {
    crd.spec.conversion = Some(CustomResourceConversion {
        strategy: NONE_CONVERSION_STRATEGY.to_string(),
        webhook: None,
    });
}

/// Structural equality of two CRD specs
pub fn specs_equal(stored: &CustomResourceDefinitionSpec, desired: &CustomResourceDefinitionSpec) -> bool {
    stored == desired
}

/// `metadata.name` of an unstructured manifest, if present
pub fn manifest_name(manifest: &Value) -> Option<&str> {
    manifest
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}
