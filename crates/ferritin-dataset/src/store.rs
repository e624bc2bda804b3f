//! Feature Store
//!
//! Entries are stored in safetensors files whose tensor names are the
//! `/`-separated keys described in [`crate::storage`]. A [`StoreFile`] maps
//! the file once and reads individual arrays on demand; the header is parsed
//! a single time per open handle.
//!
//! External links are kept in the safetensors `__metadata__` map so that a
//! store can reference entries of another store without copying them.
use crate::error::{DatasetError, Result};
use crate::graph::MolecularGraph;
use crate::storage::LINK_PREFIX;
use candle_core::safetensors::Load;
use candle_core::{DType, Device, Tensor};
use memmap2::Mmap;
use safetensors::tensor::{Metadata, TensorView};
use safetensors::SafeTensors;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const MAX_LINK_HOPS: usize = 16;

/// A read handle on one store file.
pub struct StoreFile {
    path: PathBuf,
    buffer: Mmap,
    data_start: usize,
    metadata: Metadata,
    keys: BTreeSet<String>,
    links: BTreeMap<String, PathBuf>,
}

impl StoreFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        // SAFETY: stores are never modified once written.
        let buffer = unsafe { Mmap::map(&file)? };
        let (header_len, metadata) = SafeTensors::read_metadata(&buffer)?;
        let keys = metadata.tensors().into_keys().collect();
        let links = metadata
            .metadata()
            .as_ref()
            .map(|extra| {
                extra
                    .iter()
                    .filter_map(|(key, target)| {
                        key.strip_prefix(LINK_PREFIX)
                            .map(|entry| (entry.to_string(), PathBuf::from(target)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            path,
            buffer,
            data_start: 8 + header_len,
            metadata,
            keys,
            links,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in store order (lexicographic), linked entries included.
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: BTreeSet<&str> = self
            .keys
            .iter()
            .map(|key| key.split_once('/').map_or(key.as_str(), |(head, _)| head))
            .collect();
        names.extend(self.links.keys().map(String::as_str));
        names.into_iter().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.entry_names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.links.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        let prefix = format!("{entry}/");
        let stored = self.keys_with_prefix(&prefix).next().is_some();
        stored || self.links.contains_key(entry)
    }

    /// Open one entry. Linked entries are resolved by opening the file they point to.
    pub fn entry(&self, name: &str) -> Result<EntryGroup<'_>> {
        let Some(mut target) = self.links.get(name).cloned() else {
            if !self.contains(name) {
                return Err(DatasetError::EntryNotFound {
                    entry: name.to_string(),
                    file: self.path.clone(),
                });
            }
            return Ok(EntryGroup {
                name: name.to_string(),
                source: Source::Local(self),
            });
        };

        for _ in 0..MAX_LINK_HOPS {
            debug!("following link {} -> {}", name, target.display());
            let linked = StoreFile::open(&target)?;
            if let Some(next) = linked.links.get(name) {
                target = next.clone();
                continue;
            }
            if !linked.contains(name) {
                return Err(DatasetError::EntryNotFound {
                    entry: name.to_string(),
                    file: target,
                });
            }
            return Ok(EntryGroup {
                name: name.to_string(),
                source: Source::Linked(Box::new(linked)),
            });
        }
        Err(DatasetError::EntryNotFound {
            entry: name.to_string(),
            file: target,
        })
    }

    fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.keys
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |key| key.starts_with(prefix))
    }

    fn read_tensor(&self, key: &str, device: &Device) -> Result<Tensor> {
        let not_found = || DatasetError::KeyNotFound {
            key: key.to_string(),
            file: self.path.clone(),
        };
        let info = self.metadata.info(key).ok_or_else(not_found)?;
        let (start, end) = info.data_offsets;
        let data = self
            .buffer
            .get(self.data_start + start..self.data_start + end)
            .ok_or_else(not_found)?;
        let view = TensorView::new(info.dtype, info.shape.clone(), data)?;
        Ok(view.load(device)?)
    }
}

enum Source<'a> {
    Local(&'a StoreFile),
    Linked(Box<StoreFile>),
}

/// One entry of a store. Keys passed to its methods are relative to the entry,
/// e.g. `nodes/bsa`.
pub struct EntryGroup<'a> {
    name: String,
    source: Source<'a>,
}

impl EntryGroup<'_> {
    fn file(&self) -> &StoreFile {
        match &self.source {
            Source::Local(file) => file,
            Source::Linked(file) => file,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.source, Source::Linked(_))
    }

    /// All array keys of this entry.
    pub fn keys(&self) -> Vec<String> {
        let prefix = format!("{}/", self.name);
        self.file()
            .keys_with_prefix(&prefix)
            .map(|key| key[prefix.len()..].to_string())
            .collect()
    }

    /// Names directly below `group`, sorted.
    pub fn children(&self, group: &str) -> Vec<String> {
        let prefix = format!("{}/{}/", self.name, group);
        let names: BTreeSet<&str> = self
            .file()
            .keys_with_prefix(&prefix)
            .map(|key| {
                let rest = &key[prefix.len()..];
                rest.split_once('/').map_or(rest, |(head, _)| head)
            })
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.file().keys.contains(&format!("{}/{}", self.name, key))
    }

    pub fn contains_group(&self, group: &str) -> bool {
        let prefix = format!("{}/{}/", self.name, group);
        let found = self.file().keys_with_prefix(&prefix).next().is_some();
        found
    }

    pub fn read(&self, key: &str, device: &Device) -> Result<Tensor> {
        self.file()
            .read_tensor(&format!("{}/{}", self.name, key), device)
    }

    /// Read a single-element array as `f64`.
    pub fn read_scalar(&self, key: &str) -> Result<f64> {
        let values = self
            .read(key, &Device::Cpu)?
            .to_dtype(DType::F64)?
            .flatten_all()?
            .to_vec1::<f64>()?;
        match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(DatasetError::InvalidShape {
                key: format!("{}/{}", self.name, key),
                shape: vec![values.len()],
                expected: "a single value".to_string(),
            }),
        }
    }
}

pub type PreStoreTransform = Arc<dyn Fn(MolecularGraph) -> Result<MolecularGraph> + Send + Sync>;

/// Collects arrays and links in memory and writes them as one store file.
#[derive(Default)]
pub struct StoreWriter {
    tensors: BTreeMap<String, Tensor>,
    links: BTreeMap<String, String>,
    pre_transform: Option<PreStoreTransform>,
}

impl StoreWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform applied to every graph passed to [`StoreWriter::add_graph`] before it is stored.
    pub fn with_pre_transform(
        mut self,
        transform: impl Fn(MolecularGraph) -> Result<MolecularGraph> + Send + Sync + 'static,
    ) -> Self {
        self.pre_transform = Some(Arc::new(transform));
        self
    }

    pub fn insert(&mut self, entry: &str, key: &str, tensor: Tensor) {
        self.tensors.insert(format!("{entry}/{key}"), tensor);
    }

    pub fn insert_link(&mut self, entry: &str, source: &Path) {
        self.links
            .insert(entry.to_string(), source.to_string_lossy().into_owned());
    }

    pub fn add_graph(&mut self, graph: MolecularGraph) -> Result<()> {
        let graph = match &self.pre_transform {
            Some(transform) => transform(graph)?,
            None => graph,
        };
        graph.write_to(self)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let links: HashMap<String, String> = self
            .links
            .iter()
            .map(|(entry, source)| (format!("{LINK_PREFIX}{entry}"), source.clone()))
            .collect();
        let metadata = (!links.is_empty()).then_some(links);
        safetensors::tensor::serialize_to_file(
            self.tensors.iter().map(|(key, tensor)| (key.as_str(), tensor)),
            &metadata,
            path.as_ref(),
        )?;
        Ok(())
    }
}

/// Save entries of `source` into a new store at `destination`.
///
/// With `hardcopy` the arrays are copied; otherwise the new store only holds
/// external links back to `source`.
pub fn save_entries<S: AsRef<str>>(
    source: impl AsRef<Path>,
    entry_ids: &[S],
    destination: impl AsRef<Path>,
    hardcopy: bool,
) -> Result<()> {
    let source = source.as_ref();
    let store = StoreFile::open(source)?;
    let link_target = std::fs::canonicalize(source)?;
    let mut writer = StoreWriter::new();

    for id in entry_ids.iter().map(AsRef::as_ref) {
        let entry = store.entry(id)?;
        if hardcopy {
            for key in entry.keys() {
                writer.insert(id, &key, entry.read(&key, &Device::Cpu)?);
            }
        } else {
            writer.insert_link(id, &link_target);
        }
    }
    writer.write(destination)
}

/// Validate a JSON list of entry ids.
pub fn entry_ids_from_json(value: &serde_json::Value) -> Result<Vec<String>> {
    let invalid = || DatasetError::InvalidEntryIds(value.to_string());
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|id| id.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_store(dir: &Path) -> PathBuf {
        let mut writer = StoreWriter::new();
        let dev = Device::Cpu;
        writer.insert(
            "e1",
            "nodes/bsa",
            Tensor::new(&[1f32, 2., 3.], &dev).unwrap(),
        );
        writer.insert(
            "e1",
            "clustering/mcl/depth_0",
            Tensor::new(&[0i64, 0, 1], &dev).unwrap(),
        );
        writer.insert("e1", "targets/irmsd", Tensor::new(2.5f64, &dev).unwrap());
        writer.insert(
            "e2",
            "nodes/bsa",
            Tensor::new(&[4f32, 5.], &dev).unwrap(),
        );
        let path = dir.join("store.safetensors");
        writer.write(&path).unwrap();
        path
    }

    #[test]
    fn test_entry_listing_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreFile::open(write_store(dir.path())).unwrap();
        assert_eq!(store.entry_names(), vec!["e1", "e2"]);
        assert!(store.contains("e1"));
        assert!(!store.contains("e"));

        let entry = store.entry("e1").unwrap();
        assert_eq!(entry.children("nodes"), vec!["bsa"]);
        assert_eq!(entry.children("clustering"), vec!["mcl"]);
        assert!(entry.contains_group("targets"));
        assert!(!entry.contains_group("edges"));
        assert!(!entry.contains_group("node"));
        assert_eq!(entry.keys().len(), 3);
        assert_eq!(store.entry("e2").unwrap().keys(), vec!["nodes/bsa"]);
        assert_eq!(entry.read_scalar("targets/irmsd").unwrap(), 2.5);
        assert!(matches!(
            store.entry("missing"),
            Err(DatasetError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_read_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreFile::open(write_store(dir.path())).unwrap();
        let entry = store.entry("e2").unwrap();
        assert!(matches!(
            entry.read("nodes/hse", &Device::Cpu),
            Err(DatasetError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_links_resolve_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_store(dir.path());
        let linked = dir.path().join("linked.safetensors");
        save_entries(&source, &["e2"], &linked, false).unwrap();

        let store = StoreFile::open(&linked).unwrap();
        assert_eq!(store.entry_names(), vec!["e2"]);
        let entry = store.entry("e2").unwrap();
        assert!(entry.is_linked());
        let bsa = entry.read("nodes/bsa", &Device::Cpu).unwrap();
        assert_eq!(bsa.to_vec1::<f32>().unwrap(), vec![4., 5.]);
    }

    #[test]
    fn test_entry_ids_from_json() {
        assert_eq!(
            entry_ids_from_json(&json!(["e1", "e2"])).unwrap(),
            vec!["e1", "e2"]
        );
        assert!(matches!(
            entry_ids_from_json(&json!(["e1", 2])),
            Err(DatasetError::InvalidEntryIds(_))
        ));
        assert!(entry_ids_from_json(&json!("e1")).is_err());
    }

    #[test]
    fn test_corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.safetensors");
        std::fs::write(&path, b"definitely not a store").unwrap();
        assert!(StoreFile::open(&path).is_err());
    }
}
