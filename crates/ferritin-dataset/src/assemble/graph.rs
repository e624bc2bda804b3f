use super::{concat_features, read_target, transform_target};
use crate::error::{DatasetError, Result};
use crate::sample::{Clustering, GraphSample};
use crate::storage::{CLUSTERING, DEPTH_0, DEPTH_1, EDGES, INDEX, NODES, POSITION};
use crate::store::EntryGroup;
use crate::task::Task;
use candle_core::{DType, Device, Tensor};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Elementwise transform applied to edge attributes.
///
/// The default, `tanh(-x/2 + 2) + 1`, squashes distance-like values into `(0, 2)`.
#[derive(Clone)]
pub struct EdgeTransform(Arc<dyn Fn(&Tensor) -> candle_core::Result<Tensor> + Send + Sync>);

impl EdgeTransform {
    pub fn new(
        transform: impl Fn(&Tensor) -> candle_core::Result<Tensor> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(transform))
    }

    pub fn identity() -> Self {
        Self::new(|x| Ok(x.clone()))
    }

    pub fn apply(&self, x: &Tensor) -> Result<Tensor> {
        Ok((self.0)(x)?)
    }
}

impl Default for EdgeTransform {
    fn default() -> Self {
        Self::new(|x| x.affine(-0.5, 2.0)?.tanh()?.affine(1.0, 1.0))
    }
}

impl fmt::Debug for EdgeTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EdgeTransform(..)")
    }
}

/// Stack stored half-edges `[e, 2]` with their reversed pairs into a `[2, 2e]` index.
pub fn symmetrize_edge_index(index: &Tensor) -> Result<Tensor> {
    let (_, width) = index.dims2()?;
    if width != 2 {
        return Err(DatasetError::InvalidShape {
            key: format!("{EDGES}/{INDEX}"),
            shape: index.dims().to_vec(),
            expected: "[edges, 2]".to_string(),
        });
    }
    let source = index.narrow(1, 0, 1)?;
    let target = index.narrow(1, 1, 1)?;
    let reversed = Tensor::cat(&[&target, &source], 1)?;
    Ok(Tensor::cat(&[index, &reversed], 0)?.t()?.contiguous()?)
}

/// Assembles [`GraphSample`]s with a fixed feature layout.
#[derive(Debug, Clone)]
pub struct GraphAssembler {
    pub node_features: Vec<String>,
    pub edge_features: Vec<String>,
    pub edge_transform: EdgeTransform,
    pub target: Option<String>,
    pub task: Option<Task>,
    pub target_transform: bool,
    pub clustering_method: Option<String>,
    pub device: Device,
}

impl GraphAssembler {
    /// Assemble the sample for `entry`; `file` is the store the entry was indexed from.
    pub fn assemble(&self, file: &Path, entry: &EntryGroup<'_>) -> Result<GraphSample> {
        let pos = entry
            .read(&format!("{NODES}/{POSITION}"), &self.device)?
            .to_dtype(DType::F32)?;
        let num_nodes = pos.dims().first().copied().unwrap_or(0);

        let x = match concat_features(entry, NODES, &self.node_features, &self.device)? {
            Some(x) => x,
            None => Tensor::zeros((num_nodes, 0), DType::F32, &self.device)?,
        };

        // both (i, j) and (j, i) are needed
        let index_key = format!("{EDGES}/{INDEX}");
        let edge_index = if entry.contains(&index_key) {
            let index = entry.read(&index_key, &self.device)?.to_dtype(DType::I64)?;
            symmetrize_edge_index(&index)?
        } else {
            Tensor::zeros((2, 0), DType::I64, &self.device)?
        };
        let num_edges = edge_index.dim(1)?;

        let edge_attr = self
            .edge_attributes(entry)?
            .map_or_else(
                || Tensor::zeros((num_edges, 0), DType::F32, &self.device),
                Ok,
            )?;

        let y = match &self.target {
            Some(target) => {
                let mut value = read_target(entry, file, target)?;
                if self.target_transform {
                    value = transform_target(self.task, value)?;
                }
                Some(Tensor::new(&[value as f32], &self.device)?)
            }
            None => None,
        };

        Ok(GraphSample {
            x,
            edge_index,
            edge_attr,
            y,
            pos,
            clustering: self.clustering(entry)?,
            entry_names: vec![entry.name().to_string()],
        })
    }

    fn edge_attributes(&self, entry: &EntryGroup<'_>) -> Result<Option<Tensor>> {
        if self.edge_features.is_empty() || !entry.contains_group(EDGES) {
            return Ok(None);
        }
        let Some(attributes) = concat_features(entry, EDGES, &self.edge_features, &self.device)?
        else {
            return Ok(None);
        };
        // the reversed edges carry the same values
        let attributes = Tensor::cat(&[&attributes, &attributes], 0)?;
        Ok(Some(self.edge_transform.apply(&attributes)?))
    }

    fn clustering(&self, entry: &EntryGroup<'_>) -> Result<Option<Clustering>> {
        let Some(method) = &self.clustering_method else {
            debug!("no cluster method set");
            return Ok(None);
        };
        if !entry.contains_group(CLUSTERING) {
            warn!("no clustering group found in {}", entry.name());
            return Ok(None);
        }
        if !entry.children(CLUSTERING).contains(method) {
            warn!("no {}/{} detected in {}", CLUSTERING, method, entry.name());
            return Ok(None);
        }
        let depth_0 = format!("{CLUSTERING}/{method}/{DEPTH_0}");
        let depth_1 = format!("{CLUSTERING}/{method}/{DEPTH_1}");
        if !(entry.contains(&depth_0) && entry.contains(&depth_1)) {
            warn!("no clusters detected in {}", entry.name());
            return Ok(None);
        }
        Ok(Some(Clustering {
            depth_0: entry.read(&depth_0, &self.device)?.to_dtype(DType::I64)?,
            depth_1: entry.read(&depth_1, &self.device)?.to_dtype(DType::I64)?,
        }))
    }
}
