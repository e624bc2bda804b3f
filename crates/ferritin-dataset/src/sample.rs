//! Samples handed out by the datasets.
use crate::error::Result;
use candle_core::Tensor;
use std::fmt;
use std::sync::Arc;

/// Two-level cluster assignment of the nodes.
#[derive(Debug, Clone)]
pub struct Clustering {
    pub depth_0: Tensor,
    pub depth_1: Tensor,
}

/// One graph: `x` is `[nodes, node_features]`, `edge_index` is `[2, 2 * half_edges]`,
/// `edge_attr` is `[2 * half_edges, edge_features]` and `pos` is `[nodes, 3]`.
#[derive(Debug, Clone)]
pub struct GraphSample {
    pub x: Tensor,
    pub edge_index: Tensor,
    pub edge_attr: Tensor,
    pub y: Option<Tensor>,
    pub pos: Tensor,
    pub clustering: Option<Clustering>,
    pub entry_names: Vec<String>,
}

impl GraphSample {
    pub fn num_nodes(&self) -> usize {
        self.x.dims().first().copied().unwrap_or(0)
    }

    /// Directed edge count, i.e. twice the stored half-edges.
    pub fn num_edges(&self) -> usize {
        self.edge_index.dims().get(1).copied().unwrap_or(0)
    }
}

/// One voxel grid: `x` is `[1, features, ...grid]`, `y` is `[1]`.
#[derive(Debug, Clone)]
pub struct GridSample {
    pub x: Tensor,
    pub y: Tensor,
    pub entry_names: Vec<String>,
}

/// Transform applied to every sample after it is assembled.
pub struct Transform<T>(Arc<dyn Fn(T) -> Result<T> + Send + Sync>);

impl<T> Transform<T> {
    pub fn new(transform: impl Fn(T) -> Result<T> + Send + Sync + 'static) -> Self {
        Self(Arc::new(transform))
    }

    pub fn apply(&self, sample: T) -> Result<T> {
        (self.0)(sample)
    }
}

impl<T> Clone for Transform<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Transform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform(..)")
    }
}
