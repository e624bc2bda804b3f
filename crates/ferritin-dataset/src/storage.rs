//! # Store Layout
//!
//! Key names used inside a feature store. Every entry lives under its own
//! top-level group:
//!
//! ```text
//! {entry}/nodes/{feature}                        node features, 1-D or 2-D
//! {entry}/nodes/position                         node coordinates [n, 3]
//! {entry}/edges/index                            half-edge pairs [e, 2]
//! {entry}/edges/{feature}                        edge features, 1-D or 2-D
//! {entry}/targets/{target}                       scalar targets
//! {entry}/clustering/{method}/depth_0|depth_1    cluster assignments
//! {entry}/grid_mapped_features/{feature}/value   voxel mapped features
//! ```

pub const NODES: &str = "nodes";
pub const POSITION: &str = "position";
pub const EDGES: &str = "edges";
pub const INDEX: &str = "index";
pub const TARGETS: &str = "targets";
pub const CLUSTERING: &str = "clustering";
pub const DEPTH_0: &str = "depth_0";
pub const DEPTH_1: &str = "depth_1";
pub const MAPPED_FEATURES: &str = "grid_mapped_features";
pub const FEATURE_VALUE: &str = "value";

/// Feature names starting with this marker are metafeatures and never assembled.
pub const METAFEATURE_MARKER: char = '_';

/// Prefix of the safetensors metadata keys that hold external links.
pub(crate) const LINK_PREFIX: &str = "external_link/";

// Well-known targets.
pub const IRMSD: &str = "irmsd";
pub const LRMSD: &str = "lrmsd";
pub const FNAT: &str = "fnat";
pub const DOCKQ: &str = "dockq";
pub const BINARY: &str = "binary";
pub const CAPRI: &str = "capri_class";

pub fn is_metafeature(name: &str) -> bool {
    name.starts_with(METAFEATURE_MARKER)
}

/// Names in a feature group that are structural rather than features.
pub(crate) fn is_reserved(group: &str, name: &str) -> bool {
    matches!((group, name), (NODES, POSITION) | (EDGES, INDEX))
}

pub(crate) fn key(parts: &[&str]) -> String {
    parts.join("/")
}
