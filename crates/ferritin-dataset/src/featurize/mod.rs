//! Node featurizers
//!
//! Annotate a [`MolecularGraph`](crate::graph::MolecularGraph) with per-residue
//! values computed by external structure tools, before the graph is written to
//! a store. Tool outputs are keyed by [`ResidueKey`].
pub mod exposure;
pub mod secondary_structure;

pub use exposure::{add_contact_residue_depth, add_half_sphere_exposure, add_residue_depth};
pub use secondary_structure::{DsspAssignment, SecondaryStructure};

use crate::error::{DatasetError, Result};
use crate::graph::{FeatureColumn, MolecularGraph, ResidueKey};

// Node feature names.
pub const SECSTRUCT: &str = "sec_struct";
pub const RES_DEPTH: &str = "res_depth";
pub const HSE: &str = "hse";

/// Build a column of `width` values per node, looked up by residue.
pub(crate) fn residue_column<F>(
    graph: &MolecularGraph,
    feature: &'static str,
    width: usize,
    mut lookup: F,
) -> Result<FeatureColumn>
where
    F: FnMut(&ResidueKey) -> Option<Vec<f32>>,
{
    let mut values = Vec::with_capacity(graph.num_nodes() * width);
    for residue in graph.nodes() {
        let row = lookup(residue).ok_or_else(|| DatasetError::MissingResidue {
            chain: residue.chain.clone(),
            residue: residue.residue,
            feature,
        })?;
        values.extend(row);
    }
    Ok(FeatureColumn::vectors(width, values))
}
