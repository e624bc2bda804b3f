//! Solvent exposure node features: residue depth and half-sphere exposure.
//!
//! Values come from an external structure toolkit, reformatted to a map keyed
//! by chain and residue number.
use super::{residue_column, HSE, RES_DEPTH};
use crate::error::Result;
use crate::graph::{FeatureColumn, MolecularGraph, ResidueKey};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Add the `res_depth` node feature. Every node residue needs a depth.
pub fn add_residue_depth(graph: &mut MolecularGraph, depths: &HashMap<ResidueKey, f64>) -> Result<()> {
    let column = residue_column(graph, RES_DEPTH, 1, |residue| {
        depths.get(residue).map(|depth| vec![*depth as f32])
    })?;
    graph.set_node_feature(RES_DEPTH, column);
    Ok(())
}

/// Add `res_depth` for the contact residues only; all other nodes get 0.
pub fn add_contact_residue_depth(
    graph: &mut MolecularGraph,
    depths: &HashMap<ResidueKey, f64>,
    contacts: &[ResidueKey],
) -> Result<()> {
    let contacts: HashSet<&ResidueKey> = contacts.iter().collect();
    let column = residue_column(graph, RES_DEPTH, 1, |residue| {
        if contacts.contains(residue) {
            depths.get(residue).map(|depth| vec![*depth as f32])
        } else {
            Some(vec![0.0])
        }
    })?;
    debug!(
        "residue depth set for {} contact residues of {}",
        contacts.len(),
        graph.id()
    );
    graph.set_node_feature(RES_DEPTH, column);
    Ok(())
}

/// Add the `hse` node feature: up count, down count and CA-CB angle.
///
/// Terminal residues have no exposure and are set to zero.
pub fn add_half_sphere_exposure(
    graph: &mut MolecularGraph,
    exposure: &HashMap<ResidueKey, [f64; 3]>,
) -> Result<()> {
    let mut missing = 0;
    let values = graph
        .nodes()
        .iter()
        .flat_map(|residue| match exposure.get(residue) {
            Some(hse) => hse.map(|value| value as f32),
            None => {
                missing += 1;
                [0.0; 3]
            }
        })
        .collect();
    if missing > 0 {
        debug!("{} residues of {} have no half sphere exposure", missing, graph.id());
    }
    graph.set_node_feature(HSE, FeatureColumn::vectors(3, values));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;

    fn chain(residues: &[i32]) -> MolecularGraph {
        let mut graph = MolecularGraph::new("1ATN");
        for &residue in residues {
            graph.add_node(ResidueKey::new("A", residue), [0.0; 3]);
        }
        graph
    }

    #[test]
    fn test_residue_depth() {
        let mut graph = chain(&[1, 2]);
        let mut depths = HashMap::from([(ResidueKey::new("A", 1), 1.5)]);
        let err = add_residue_depth(&mut graph, &depths).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MissingResidue { residue: 2, feature: RES_DEPTH, .. }
        ));

        depths.insert(ResidueKey::new("A", 2), 3.0);
        add_residue_depth(&mut graph, &depths).unwrap();
        assert_eq!(graph.node_feature(RES_DEPTH).unwrap().values(), &[1.5, 3.0]);
    }

    #[test]
    fn test_contact_residue_depth() {
        let mut graph = chain(&[1, 2, 3]);
        let depths = HashMap::from([(ResidueKey::new("A", 2), 4.0)]);
        add_contact_residue_depth(&mut graph, &depths, &[ResidueKey::new("A", 2)]).unwrap();
        assert_eq!(graph.node_feature(RES_DEPTH).unwrap().values(), &[0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_half_sphere_exposure() {
        let mut graph = chain(&[1, 2]);
        let exposure = HashMap::from([(ResidueKey::new("A", 2), [10.0, 20.0, 0.5])]);
        add_half_sphere_exposure(&mut graph, &exposure).unwrap();
        let column = graph.node_feature(HSE).unwrap();
        assert_eq!(column.width(), 3);
        assert_eq!(column.row(0), Some(&[0.0, 0.0, 0.0][..]));
        assert_eq!(column.row(1), Some(&[10.0, 20.0, 0.5][..]));
    }
}
