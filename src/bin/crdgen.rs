//! CRD YAML Generator
//!
//! Prints the Velero CRDs exactly as the installer would apply them,
//! after decoding and normalization. Reads the embedded bundle unless
//! `CRD_BUNDLE_PATH` names a bundle file, same as the installer.
//!
//! Usage:
//!   cargo run --bin crdgen > deploy/crds/velero.yaml
//!   CRD_BUNDLE_PATH=velero-v1.15-crds.yaml cargo run --bin crdgen

use velero_crd_installer::config::Config;
use velero_crd_installer::crd::{render_bundle, Bundle};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let bundle = match &config.bundle_path {
        Some(path) => Bundle::from_path(path)?,
        None => Bundle::embedded()?,
    };

    for crd in render_bundle(&bundle)? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
