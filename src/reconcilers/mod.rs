//! Installation logic for the Velero CRDs

pub mod crds;
pub mod established;
