//! Entry Indexer
//!
//! Builds the flat `(file, entry)` list a dataset is addressed through. Files
//! are processed in the order given and entries in store order, or in subset
//! order when a subset is given.
use crate::error::Result;
use crate::filter::TargetFilter;
use crate::store::StoreFile;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Address of one entry in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub file: PathBuf,
    pub entry: String,
}

/// Drop store files that cannot be opened or hold no entries.
pub fn check_store_files(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    info!("checking dataset integrity...");
    paths
        .into_iter()
        .filter(|path| match StoreFile::open(path) {
            Ok(store) if store.is_empty() => {
                info!("    -> {} is empty", path.display());
                false
            }
            Ok(_) => true,
            Err(err) => {
                error!("{err}");
                info!("    -> {} is corrupted", path.display());
                false
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct IndexBuilder<'a> {
    subset: Option<&'a [String]>,
    filter: Option<&'a TargetFilter>,
    progress: bool,
}

impl<'a> IndexBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subset(mut self, subset: Option<&'a [String]>) -> Self {
        self.subset = subset;
        self
    }

    pub fn filter(mut self, filter: Option<&'a TargetFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Index every file. A file that fails part way is left out entirely.
    pub fn build(&self, files: &[PathBuf]) -> Vec<IndexEntry> {
        debug!("processing data set with store files: {:?}", files);
        let bar = if self.progress {
            let bar = ProgressBar::new(files.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(bar)
        } else {
            info!("   {:?} dataset", files);
            None
        };

        let mut entries = Vec::new();
        for file in files {
            if let Some(bar) = &bar {
                bar.set_message(
                    file.file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                );
            }
            match self.index_file(file) {
                Ok(found) => {
                    debug!("{} entries kept from {}", found.len(), file.display());
                    entries.extend(found);
                }
                Err(err) => error!("on {}: {}", file.display(), err),
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        if let Some(bar) = bar {
            bar.finish();
        }
        entries
    }

    fn index_file(&self, path: &Path) -> Result<Vec<IndexEntry>> {
        let store = StoreFile::open(path)?;
        let names: Vec<String> = match self.subset {
            None => store.entry_names(),
            Some(subset) => subset
                .iter()
                .filter(|name| store.contains(name))
                .cloned()
                .collect(),
        };

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let keep = match self.filter {
                Some(filter) => filter.keep(&store.entry(&name)?)?,
                None => true,
            };
            if keep {
                entries.push(IndexEntry {
                    file: path.to_path_buf(),
                    entry: name,
                });
            }
        }
        Ok(entries)
    }
}
