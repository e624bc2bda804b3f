use super::{default_true, lookup, one_or_many, Dataset};
use crate::assemble::GridAssembler;
use crate::error::{DatasetError, Result};
use crate::features::{resolve_selections, FeatureSelection};
use crate::filter::TargetFilter;
use crate::index::{check_store_files, IndexBuilder, IndexEntry};
use crate::sample::{GridSample, Transform};
use crate::storage::MAPPED_FEATURES;
use crate::store::StoreFile;
use crate::task::{resolve_task, ClassLabel, ClassTable, Task};
use bon::Builder;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings of a [`GridDataset`]. Unlike graphs, grids always carry a target.
#[derive(Builder, Deserialize, Debug, Clone)]
pub struct GridDatasetConfig {
    #[serde(deserialize_with = "one_or_many")]
    pub store_files: Vec<PathBuf>,
    pub subset: Option<Vec<String>>,
    #[builder(into)]
    pub target: Option<String>,
    pub task: Option<Task>,
    #[builder(default)]
    #[serde(default)]
    pub features: FeatureSelection,
    pub classes: Option<Vec<ClassLabel>>,
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub progress: bool,
    #[builder(default)]
    #[serde(default)]
    pub target_transform: bool,
    pub target_filter: Option<TargetFilter>,
    #[builder(default)]
    #[serde(default)]
    pub cpu: bool,
    #[serde(skip)]
    pub transform: Option<Transform<GridSample>>,
}

/// Voxel grids stored in one or more feature stores.
#[derive(Debug)]
pub struct GridDataset {
    store_files: Vec<PathBuf>,
    index_entries: Vec<IndexEntry>,
    classes: Option<ClassTable>,
    assembler: GridAssembler,
    transform: Option<Transform<GridSample>>,
}

impl GridDataset {
    pub fn new(config: GridDatasetConfig) -> Result<Self> {
        let target = config.target.ok_or(DatasetError::GridTargetRequired)?;
        let store_files = check_store_files(config.store_files);
        let (task, classes) = resolve_task(Some(&target), config.task, config.classes)?;

        let first = store_files.first().ok_or(DatasetError::NoStoreFiles)?;
        let features = resolve_selections(
            &StoreFile::open(first)?,
            &[(MAPPED_FEATURES, &config.features)],
        )?
        .pop()
        .unwrap_or_default();
        if features.is_empty() {
            return Err(DatasetError::NoGridFeatures {
                file: first.clone(),
            });
        }

        let index_entries = IndexBuilder::new()
            .subset(config.subset.as_deref())
            .filter(config.target_filter.as_ref())
            .progress(config.progress)
            .build(&store_files);

        let assembler = GridAssembler {
            features,
            target,
            task,
            target_transform: config.target_transform,
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
    pub fn load_one_grid(&self, file: &Path, entry_name: &str) -> Result<GridSample> {
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

    pub fn features(&self) -> &[String] {
        &self.assembler.features
    }

    pub fn target(&self) -> &str {
        &self.assembler.target
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
}

impl Dataset for GridDataset {
    type Item = GridSample;

    fn len(&self) -> usize {
        self.index_entries.len()
    }

    fn get(&self, index: usize) -> Result<GridSample> {
        let IndexEntry { file, entry } = lookup(&self.index_entries, index)?;
        self.load_one_grid(file, entry)
    }
}
