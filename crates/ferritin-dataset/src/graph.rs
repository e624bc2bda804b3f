//! Molecular graphs before they are written to a store.
//!
//! Featurizers in [`crate::featurize`] add columns to a [`MolecularGraph`];
//! [`StoreWriter::add_graph`] then lays it out under the keys of
//! [`crate::storage`].
use crate::error::{DatasetError, Result};
use crate::storage::{
    key, CLUSTERING, DEPTH_0, DEPTH_1, EDGES, FEATURE_VALUE, INDEX, MAPPED_FEATURES, NODES,
    POSITION, TARGETS,
};
use crate::store::StoreWriter;
use candle_core::{Device, Tensor};
use std::collections::BTreeMap;
use std::fmt;

/// Residue a node stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    pub chain: String,
    pub residue: i32,
}

impl ResidueKey {
    pub fn new(chain: impl Into<String>, residue: i32) -> Self {
        Self {
            chain: chain.into(),
            residue,
        }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.residue)
    }
}

/// Per-node or per-edge values, `width` values per row, rows stored back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    width: usize,
    values: Vec<f32>,
}

impl FeatureColumn {
    pub fn scalar(values: Vec<f32>) -> Self {
        Self { width: 1, values }
    }

    pub fn vectors(width: usize, values: Vec<f32>) -> Self {
        Self { width, values }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.values.get(index * self.width..(index + 1) * self.width)
    }

    fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    fn is_complete(&self, rows: usize) -> bool {
        self.width > 0 && self.values.len() == rows * self.width
    }

    /// Width 1 columns are stored flat, wider ones as `[rows, width]`.
    fn to_tensor(&self) -> Result<Tensor> {
        let rows = self.rows();
        let tensor = if self.width == 1 {
            Tensor::from_slice(&self.values, rows, &Device::Cpu)?
        } else {
            Tensor::from_slice(&self.values, (rows, self.width), &Device::Cpu)?
        };
        Ok(tensor)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ClusterAssignment {
    depth_0: Vec<i64>,
    depth_1: Vec<i64>,
}

/// A residue graph with its features, targets and optional extras.
#[derive(Debug, Clone)]
pub struct MolecularGraph {
    id: String,
    nodes: Vec<ResidueKey>,
    positions: Vec<[f32; 3]>,
    edges: Vec<(usize, usize)>,
    node_features: BTreeMap<String, FeatureColumn>,
    edge_features: BTreeMap<String, FeatureColumn>,
    targets: BTreeMap<String, f64>,
    clusterings: BTreeMap<String, ClusterAssignment>,
    grid_features: BTreeMap<String, Tensor>,
}

impl MolecularGraph {
    /// `id` becomes the entry name in the store.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nodes: Vec::new(),
            positions: Vec::new(),
            edges: Vec::new(),
            node_features: BTreeMap::new(),
            edge_features: BTreeMap::new(),
            targets: BTreeMap::new(),
            clusterings: BTreeMap::new(),
            grid_features: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a node and return its index.
    pub fn add_node(&mut self, residue: ResidueKey, position: [f32; 3]) -> usize {
        self.nodes.push(residue);
        self.positions.push(position);
        self.nodes.len() - 1
    }

    /// Add an undirected edge; each pair is stored once.
    pub fn add_edge(&mut self, source: usize, target: usize) -> Result<usize> {
        let num_nodes = self.nodes.len();
        if source >= num_nodes || target >= num_nodes {
            return Err(self.invalid(format!(
                "edge ({source}, {target}) refers to a node outside 0..{num_nodes}"
            )));
        }
        self.edges.push((source, target));
        Ok(self.edges.len() - 1)
    }

    pub fn set_node_feature(&mut self, name: impl Into<String>, column: FeatureColumn) {
        self.node_features.insert(name.into(), column);
    }

    pub fn set_edge_feature(&mut self, name: impl Into<String>, column: FeatureColumn) {
        self.edge_features.insert(name.into(), column);
    }

    pub fn set_target(&mut self, name: impl Into<String>, value: f64) {
        self.targets.insert(name.into(), value);
    }

    pub fn set_clustering(&mut self, method: impl Into<String>, depth_0: Vec<i64>, depth_1: Vec<i64>) {
        self.clusterings
            .insert(method.into(), ClusterAssignment { depth_0, depth_1 });
    }

    /// Store a feature already mapped onto a voxel grid.
    pub fn set_grid_feature(&mut self, name: impl Into<String>, grid: Tensor) {
        self.grid_features.insert(name.into(), grid);
    }

    pub fn nodes(&self) -> &[ResidueKey] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node_feature(&self, name: &str) -> Option<&FeatureColumn> {
        self.node_features.get(name)
    }

    pub fn edge_feature(&self, name: &str) -> Option<&FeatureColumn> {
        self.edge_features.get(name)
    }

    pub fn target(&self, name: &str) -> Option<f64> {
        self.targets.get(name).copied()
    }

    fn invalid(&self, reason: String) -> DatasetError {
        DatasetError::InvalidGraph {
            graph: self.id.clone(),
            reason,
        }
    }

    /// Check that every column and clustering matches the node and edge counts.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(self.invalid("graph has no nodes".to_string()));
        }
        for (name, column) in &self.node_features {
            if !column.is_complete(self.num_nodes()) {
                return Err(self.invalid(format!(
                    "node feature {name} holds {} values of width {}, expected {} rows",
                    column.values.len(),
                    column.width,
                    self.num_nodes()
                )));
            }
        }
        for (name, column) in &self.edge_features {
            if !column.is_complete(self.num_edges()) {
                return Err(self.invalid(format!(
                    "edge feature {name} holds {} values of width {}, expected {} rows",
                    column.values.len(),
                    column.width,
                    self.num_edges()
                )));
            }
        }
        for (method, assignment) in &self.clusterings {
            let depths = [(DEPTH_0, &assignment.depth_0), (DEPTH_1, &assignment.depth_1)];
            for (depth, labels) in depths {
                if labels.len() != self.num_nodes() {
                    return Err(self.invalid(format!(
                        "clustering {method} {depth} assigns {} nodes, expected {}",
                        labels.len(),
                        self.num_nodes()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Write every array of the graph into `writer` under the graph id.
    pub fn write_to(&self, writer: &mut StoreWriter) -> Result<()> {
        self.validate()?;
        let dev = Device::Cpu;
        let id = self.id.as_str();

        let positions: Vec<f32> = self.positions.iter().flatten().copied().collect();
        writer.insert(
            id,
            &key(&[NODES, POSITION]),
            Tensor::from_slice(&positions, (self.num_nodes(), 3), &dev)?,
        );
        for (name, column) in &self.node_features {
            writer.insert(id, &key(&[NODES, name.as_str()]), column.to_tensor()?);
        }

        if !self.edges.is_empty() {
            let index: Vec<i64> = self
                .edges
                .iter()
                .flat_map(|&(source, target)| [source as i64, target as i64])
                .collect();
            writer.insert(
                id,
                &key(&[EDGES, INDEX]),
                Tensor::from_slice(&index, (self.num_edges(), 2), &dev)?,
            );
            for (name, column) in &self.edge_features {
                writer.insert(id, &key(&[EDGES, name.as_str()]), column.to_tensor()?);
            }
        }

        for (name, value) in &self.targets {
            writer.insert(id, &key(&[TARGETS, name.as_str()]), Tensor::new(*value, &dev)?);
        }
        for (method, assignment) in &self.clusterings {
            writer.insert(
                id,
                &key(&[CLUSTERING, method.as_str(), DEPTH_0]),
                Tensor::new(assignment.depth_0.as_slice(), &dev)?,
            );
            writer.insert(
                id,
                &key(&[CLUSTERING, method.as_str(), DEPTH_1]),
                Tensor::new(assignment.depth_1.as_slice(), &dev)?,
            );
        }
        for (name, grid) in &self.grid_features {
            writer.insert(
                id,
                &key(&[MAPPED_FEATURES, name.as_str(), FEATURE_VALUE]),
                grid.to_device(&dev)?,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreFile;
    use candle_core::DType;

    fn triangle() -> MolecularGraph {
        let mut graph = MolecularGraph::new("1ATN-A");
        for (residue, x) in [(1, 0.0), (2, 3.8), (3, 7.6)] {
            graph.add_node(ResidueKey::new("A", residue), [x, 0.0, 0.0]);
        }
        graph.add_edge(0, 1).unwrap();
        graph.add_edge(1, 2).unwrap();
        graph.set_node_feature("bsa", FeatureColumn::scalar(vec![1.0, 2.0, 3.0]));
        graph.set_node_feature(
            "res_type",
            FeatureColumn::vectors(2, vec![1.0, 0.0, 0.0, 1.0, 1.0, 0.0]),
        );
        graph.set_edge_feature("dist", FeatureColumn::scalar(vec![3.8, 3.8]));
        graph.set_target("irmsd", 1.25);
        graph.set_clustering("mcl", vec![0, 0, 1], vec![0, 0, 0]);
        graph
    }

    #[test]
    fn test_write_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graphs.safetensors");
        let mut writer = StoreWriter::new();
        writer.add_graph(triangle()).unwrap();
        writer.write(&path).unwrap();

        let store = StoreFile::open(&path).unwrap();
        let entry = store.entry("1ATN-A").unwrap();
        assert_eq!(
            entry.keys(),
            vec![
                "clustering/mcl/depth_0",
                "clustering/mcl/depth_1",
                "edges/dist",
                "edges/index",
                "nodes/bsa",
                "nodes/position",
                "nodes/res_type",
                "targets/irmsd",
            ]
        );
        let index = entry.read("edges/index", &Device::Cpu).unwrap();
        assert_eq!(index.dtype(), DType::I64);
        assert_eq!(index.to_vec2::<i64>().unwrap(), vec![vec![0, 1], vec![1, 2]]);
        assert_eq!(entry.read("nodes/res_type", &Device::Cpu).unwrap().dims(), &[3, 2]);
        assert_eq!(entry.read("nodes/bsa", &Device::Cpu).unwrap().dims(), &[3]);
        assert_eq!(entry.read_scalar("targets/irmsd").unwrap(), 1.25);
    }

    #[test]
    fn test_validation() {
        let mut graph = triangle();
        assert!(graph.add_edge(0, 3).is_err());

        graph.set_node_feature("hse", FeatureColumn::vectors(3, vec![0.0; 6]));
        let err = graph.validate().unwrap_err();
        assert!(matches!(err, DatasetError::InvalidGraph { .. }));
        assert!(err.to_string().contains("hse"));

        let empty = MolecularGraph::new("empty");
        assert!(empty.write_to(&mut StoreWriter::new()).is_err());
    }

    #[test]
    fn test_clustering_depths_match_nodes() {
        let mut graph = triangle();
        assert!(graph.validate().is_ok());
        graph.set_clustering("mcl", vec![0, 0, 1], vec![0]);
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("mcl depth_1"));
        graph.set_clustering("mcl", vec![0, 1], vec![0, 0, 0]);
        assert!(graph.validate().unwrap_err().to_string().contains("depth_0"));
    }

    #[test]
    fn test_pre_transform() {
        let mut writer = StoreWriter::new().with_pre_transform(|mut graph| {
            graph.set_target("binary", 1.0);
            Ok(graph)
        });
        writer.add_graph(triangle()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graphs.safetensors");
        writer.write(&path).unwrap();
        let store = StoreFile::open(&path).unwrap();
        let entry = store.entry("1ATN-A").unwrap();
        assert_eq!(entry.children("targets"), vec!["binary", "irmsd"]);
    }

    #[test]
    fn test_feature_rows() {
        let column = FeatureColumn::vectors(3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(column.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(column.row(2), None);
    }
}
