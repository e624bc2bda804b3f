//! Secondary structure from DSSP output.
//!
//! Reads the classic DSSP text format. The residue table starts after the line
//! beginning with `  #  RESIDUE`; every row is fixed width:
//!
//! ```text
//!   #  RESIDUE AA STRUCTURE BP1 BP2  ACC
//!     1    1 A M              0   0  132
//!     2    2 A K  >     -     0   0   88
//! ```
use super::{residue_column, SECSTRUCT};
use crate::error::{DatasetError, Result};
use crate::graph::{MolecularGraph, ResidueKey};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use strum::{Display, EnumCount, EnumIter};
use tracing::debug;

const TABLE_HEADER: &str = "  #  RESIDUE";
const CHAIN_BREAK: u8 = b'!';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum SecondaryStructure {
    Helix = 0,
    Strand = 1,
    Coil = 2,
}

impl SecondaryStructure {
    #[rustfmt::skip]
    pub fn from_dssp_code(code: char) -> Self {
        match code {
            'H' | 'G' | 'I' => SecondaryStructure::Helix,
            'E' | 'B'       => SecondaryStructure::Strand,
            _               => SecondaryStructure::Coil,
        }
    }

    pub fn to_index(&self) -> usize {
        *self as usize
    }

    pub fn one_hot(&self) -> [f32; SecondaryStructure::COUNT] {
        let mut encoded = [0.0; SecondaryStructure::COUNT];
        encoded[self.to_index()] = 1.0;
        encoded
    }
}

/// Secondary structure per residue, as assigned by DSSP.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DsspAssignment {
    residues: HashMap<ResidueKey, SecondaryStructure>,
}

impl DsspAssignment {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(BufReader::new(File::open(path)?))
    }

    pub fn parse(reader: impl BufRead) -> Result<Self> {
        let mut residues = HashMap::new();
        let mut in_table = false;
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if !in_table {
                in_table = line.starts_with(TABLE_HEADER);
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            let bytes = line.as_bytes();
            if bytes.len() < 17 {
                return Err(DatasetError::Dssp {
                    line: number + 1,
                    reason: format!("row is {} characters wide, expected at least 17", bytes.len()),
                });
            }
            if bytes[13] == CHAIN_BREAK {
                continue;
            }
            if !bytes[..17].is_ascii() {
                return Err(DatasetError::Dssp {
                    line: number + 1,
                    reason: "non-ASCII characters in the residue columns".to_string(),
                });
            }
            let field = String::from_utf8_lossy(&bytes[5..10]);
            let residue = field.trim().parse::<i32>().map_err(|err| DatasetError::Dssp {
                line: number + 1,
                reason: format!("residue number {field:?}: {err}"),
            })?;
            let chain = (bytes[11] as char).to_string();
            let structure = SecondaryStructure::from_dssp_code(bytes[16] as char);
            residues.insert(ResidueKey::new(chain, residue), structure);
        }
        debug!("read secondary structure for {} residues", residues.len());
        Ok(Self { residues })
    }

    pub fn get(&self, residue: &ResidueKey) -> Option<SecondaryStructure> {
        self.residues.get(residue).copied()
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Add the one-hot `sec_struct` node feature. Every node residue must be assigned.
    pub fn add_features(&self, graph: &mut MolecularGraph) -> Result<()> {
        let column = residue_column(graph, SECSTRUCT, SecondaryStructure::COUNT, |residue| {
            self.get(residue).map(|structure| structure.one_hot().to_vec())
        })?;
        graph.set_node_feature(SECSTRUCT, column);
        Ok(())
    }
}
