//! Dataset Facades
//!
//! [`GraphDataset`] and [`GridDataset`] validate their stores once when they
//! are built and then serve samples by index. Construction runs, in order:
//!
//! 1. integrity check: unreadable or empty store files are dropped
//! 2. task and class table resolution
//! 3. feature availability check against the first remaining file
//! 4. index build, applying the subset and the target filter
//! 5. device selection
//!
//! Every `get` opens the store file again and assembles the sample from scratch.
mod graph;
mod grid;

pub use graph::{GraphDataset, GraphDatasetConfig};
pub use grid::{GridDataset, GridDatasetConfig};

use crate::error::{DatasetError, Result};
use crate::index::IndexEntry;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Random access collection of samples.
pub trait Dataset {
    type Item;

    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Result<Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> DatasetIter<'_, Self>
    where
        Self: Sized,
    {
        DatasetIter {
            dataset: self,
            next: 0,
        }
    }
}

/// Iterator over every sample of a [`Dataset`], in index order.
pub struct DatasetIter<'a, D> {
    dataset: &'a D,
    next: usize,
}

impl<D: Dataset> Iterator for DatasetIter<'_, D> {
    type Item = Result<D::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.dataset.len() {
            return None;
        }
        let item = self.dataset.get(self.next);
        self.next += 1;
        Some(item)
    }
}

pub(crate) fn lookup(entries: &[IndexEntry], index: usize) -> Result<&IndexEntry> {
    entries.get(index).ok_or(DatasetError::IndexOutOfRange {
        index,
        len: entries.len(),
    })
}

/// Accept either a single path or a list of paths.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(PathBuf),
        Many(Vec<PathBuf>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(path) => vec![path],
        OneOrMany::Many(paths) => paths,
    })
}

pub(crate) fn default_true() -> bool {
    true
}
