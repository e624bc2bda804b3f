use super::{default_true, lookup, one_or_many, Dataset};
use crate::assemble::{EdgeTransform, GraphAssembler};
use crate::error::{DatasetError, Result};
use crate::features::{resolve_selections, FeatureSelection};
use crate::filter::TargetFilter;
use crate::index::{check_store_files, IndexBuilder, IndexEntry};
use crate::sample::{GraphSample, Transform};
use crate::storage::{EDGES, NODES};
use crate::store::StoreFile;
use crate::task::{resolve_task, ClassLabel, ClassTable, Task};
use bon::Builder;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings of a [`GraphDataset`].
///
/// ```ignore
/// let config = GraphDatasetConfig::builder()
///     .store_files(vec!["1ATN_residue.safetensors".into()])
///     .target("irmsd")
///     .node_features(FeatureSelection::names(["res_type", "bsa"]))
///     .clustering_method("mcl")
///     .build();
/// let dataset = GraphDataset::new(config)?;
/// ```
#[derive(Builder, Deserialize, Debug, Clone)]
pub struct GraphDatasetConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub store_files: Vec<PathBuf>,
    /// Only keep these entries.
    pub subset: Option<Vec<String>>,
    #[builder(into)]
    pub target: Option<String>,
    /// Required for targets whose task cannot be inferred from the name.
    pub task: Option<Task>,
    #[builder(default)]
    #[serde(default)]
    pub node_features: FeatureSelection,
    #[builder(default)]
    #[serde(default)]
    pub edge_features: FeatureSelection,
    /// Cluster assignments to load, e.g. `mcl` or `louvain`.
    #[builder(into)]
    pub clustering_method: Option<String>,
    /// Classification labels, `[0, 1]` when unset.
    pub classes: Option<Vec<ClassLabel>>,
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub progress: bool,
    /// Apply `sigmoid(log(y))` to regression targets.
    #[builder(default)]
    #[serde(default)]
    pub target_transform: bool,
    pub target_filter: Option<TargetFilter>,
    /// Keep tensors on the CPU even when an accelerator is available.
    #[builder(default)]
    #[serde(default)]
    pub cpu: bool,
    #[builder(default)]
    #[serde(skip)]
    pub edge_features_transform: EdgeTransform,
    #[serde(skip)]
    pub transform: Option<Transform<GraphSample>>,
}

/// Graphs stored in one or more feature stores.
#[derive(Debug)]
pub struct GraphDataset {
    store_files: Vec<PathBuf>,
    index_entries: Vec<IndexEntry>,
    classes: Option<ClassTable>,
    assembler: GraphAssembler,
    transform: Option<Transform<GraphSample>>,
}

impl GraphDataset {
    pub fn new(config: GraphDatasetConfig) -> Result<Self> {
        let store_files = check_store_files(config.store_files);
        let (task, classes) =
            resolve_task(config.target.as_deref(), config.task, config.classes)?;

        let first = store_files.first().ok_or(DatasetError::NoStoreFiles)?;
        let mut resolved = resolve_selections(
            &StoreFile::open(first)?,
            &[
                (NODES, &config.node_features),
                (EDGES, &config.edge_features),
            ],
        )?;
        let edge_features = resolved.pop().unwrap_or_default();
        let node_features = resolved.pop().unwrap_or_default();

        let index_entries = IndexBuilder::new()
            .subset(config.subset.as_deref())
            .filter(config.target_filter.as_ref())
            .progress(config.progress)
            .build(&store_files);

        let assembler = GraphAssembler {
            node_features,
            edge_features,
            edge_transform: config.edge_features_transform,
            target: config.target,
            task,
            target_transform: config.target_transform,
            clustering_method: config.clustering_method,
            device: crate::device(config.cpu)?,
        };

        Ok(Self {
            store_files,
            index_entries,
            classes,
            assembler,
            transform: config.transform,
        })
    }

    /// Read and assemble one entry.
    pub fn load_one_graph(&self, file: &Path, entry_name: &str) -> Result<GraphSample> {
        let sample = {
            let store = StoreFile::open(file)?;
            let entry = store.entry(entry_name)?;
            self.assembler.assemble(file, &entry)?
        };
        match &self.transform {
            Some(transform) => transform.apply(sample),
            None => Ok(sample),
        }
    }

    pub fn store_files(&self) -> &[PathBuf] {
        &self.store_files
    }

    pub fn index_entries(&self) -> &[IndexEntry] {
        &self.index_entries
    }

    pub fn node_features(&self) -> &[String] {
        &self.assembler.node_features
    }

    pub fn edge_features(&self) -> &[String] {
        &self.assembler.edge_features
    }

    pub fn task(&self) -> Option<Task> {
        self.assembler.task
    }

    pub fn classes(&self) -> Option<&ClassTable> {
        self.classes.as_ref()
    }

    /// Dense index of a class label; only classification datasets have one.
    pub fn class_index(&self, label: &ClassLabel) -> Result<usize> {
        match &self.classes {
            Some(table) => table.index_of(label),
            None => Err(DatasetError::UnknownClass(label.to_string())),
        }
    }

    pub fn device(&self) -> &candle_core::Device {
        &self.assembler.device
    }
}

impl Dataset for GraphDataset {
    type Item = GraphSample;

    fn len(&self) -> usize {
        self.index_entries.len()
    }

    fn get(&self, index: usize) -> Result<GraphSample> {
        let IndexEntry { file, entry } = lookup(&self.index_entries, index)?;
        self.load_one_graph(file, entry)
    }
}
