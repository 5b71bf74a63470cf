//! Desired CustomResourceDefinitions for the Velero backup subsystem

mod bundle;
mod decode;

pub use bundle::*;
pub use decode::*;

use crate::{Error, Result};

/// Render every manifest in the bundle as the normalized YAML that would be applied
pub fn render_bundle(bundle: &Bundle) -> Result<Vec<String>> {
    bundle
        .manifests()
        .iter()
        .map(|manifest| {
            let mut crd = decode(manifest)?;
            normalize(&mut crd);
            serde_yaml::to_string(&crd)
                .map_err(|e| Error::DecodeError(format!("failed to render CRD as YAML: {}", e)))
        })
        .collect()
}
