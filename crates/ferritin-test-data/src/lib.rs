//! ferritin-test-data
//!
//! Feature store fixtures for testing the dataset loaders.
//!
//! Stores are built in memory from [`TestEntry`] descriptions and serialized
//! with the same `{entry}/{group}/{name}` tensor naming the loaders read. The
//! resulting `TestFile` creates a temporary file for programs to operate on.
use safetensors::tensor::TensorView;
use safetensors::Dtype;
use std::borrow::Cow;
use std::fs;
use tempfile::{Builder, NamedTempFile};

#[derive(Debug)]
/// Test File
///
/// Example usage:
///
/// ```ignore
/// // returns (filepath, _tempfile_handle).
/// // _handle ensures the tempfile remains in scope
/// use ferritin_test_data::TestFile;
/// let (store, _temp) = TestFile::graph_store_01().create_temp().unwrap();
/// ```
pub struct TestFile {
    filebinary: Cow<'static, [u8]>,
    suffix: &'static str,
}

struct RawArray {
    key: String,
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

/// One entry of a test store. Keys are relative to the entry.
///
/// ```ignore
/// let entry = TestEntry::new("1ATN_1w")
///     .position(&[[0.0, 0.0, 0.0], [3.8, 0.0, 0.0]])
///     .node_feature("bsa", &[10.0, 20.0])
///     .edges(&[[0, 1]])
///     .target("irmsd", 2.0);
/// ```
pub struct TestEntry {
    name: String,
    arrays: Vec<RawArray>,
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn i64_bytes(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

impl TestEntry {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            arrays: Vec::new(),
        }
    }

    fn array(mut self, key: String, dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Self {
        self.arrays.push(RawArray {
            key,
            dtype,
            shape,
            data,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-D node feature.
    pub fn node_feature(self, name: &str, values: &[f32]) -> Self {
        self.array(
            format!("nodes/{name}"),
            Dtype::F32,
            vec![values.len()],
            f32_bytes(values),
        )
    }

    /// 2-D node feature with `width` columns, values given row by row.
    pub fn node_feature_2d(self, name: &str, width: usize, values: &[f32]) -> Self {
        self.array(
            format!("nodes/{name}"),
            Dtype::F32,
            vec![values.len() / width, width],
            f32_bytes(values),
        )
    }

    pub fn position(self, positions: &[[f32; 3]]) -> Self {
        let flat: Vec<f32> = positions.iter().flatten().copied().collect();
        self.array(
            "nodes/position".to_string(),
            Dtype::F32,
            vec![positions.len(), 3],
            f32_bytes(&flat),
        )
    }

    /// Half-edges, each undirected pair once.
    pub fn edges(self, pairs: &[[i64; 2]]) -> Self {
        let flat: Vec<i64> = pairs.iter().flatten().copied().collect();
        self.array(
            "edges/index".to_string(),
            Dtype::I64,
            vec![pairs.len(), 2],
            i64_bytes(&flat),
        )
    }

    pub fn edge_feature(self, name: &str, values: &[f32]) -> Self {
        self.array(
            format!("edges/{name}"),
            Dtype::F32,
            vec![values.len()],
            f32_bytes(values),
        )
    }

    pub fn target(self, name: &str, value: f64) -> Self {
        self.array(
            format!("targets/{name}"),
            Dtype::F64,
            vec![],
            value.to_le_bytes().to_vec(),
        )
    }

    pub fn clustering(self, method: &str, depth_0: &[i64], depth_1: &[i64]) -> Self {
        self.array(
            format!("clustering/{method}/depth_0"),
            Dtype::I64,
            vec![depth_0.len()],
            i64_bytes(depth_0),
        )
        .array(
            format!("clustering/{method}/depth_1"),
            Dtype::I64,
            vec![depth_1.len()],
            i64_bytes(depth_1),
        )
    }

    /// Voxel mapped feature on a `shape` grid.
    pub fn grid_feature(self, name: &str, shape: [usize; 3], values: &[f32]) -> Self {
        self.array(
            format!("grid_mapped_features/{name}/value"),
            Dtype::F32,
            shape.to_vec(),
            f32_bytes(values),
        )
    }
}

/// A protein-protein interface graph with `n` residues in a chain, A/B alternating.
fn interface_graph(name: &str, n: usize, irmsd: f64, binary: f64) -> TestEntry {
    let positions: Vec<[f32; 3]> = (0..n).map(|i| [i as f32 * 3.8, 0.0, 0.0]).collect();
    let pairs: Vec<[i64; 2]> = (1..n as i64).map(|i| [i - 1, i]).collect();
    let bsa: Vec<f32> = (0..n).map(|i| 10.0 * (i + 1) as f32).collect();
    let res_type: Vec<f32> = (0..n)
        .flat_map(|i| {
            let mut row = [0.0; 3];
            row[i % 3] = 1.0;
            row
        })
        .collect();
    let chain: Vec<f32> = (0..n).map(|i| (i % 2) as f32).collect();
    let dist = vec![3.8; pairs.len()];
    let covalent = vec![1.0; pairs.len()];

    TestEntry::new(name)
        .position(&positions)
        .node_feature("bsa", &bsa)
        .node_feature_2d("res_type", 3, &res_type)
        .node_feature("_chain_id", &chain)
        .edges(&pairs)
        .edge_feature("dist", &dist)
        .edge_feature("covalent", &covalent)
        .target("irmsd", irmsd)
        .target("binary", binary)
        .target("capri_class", if binary > 0.0 { 1.0 } else { 4.0 })
}

impl TestFile {
    /// Serialize entries into a store file image.
    pub fn from_entries(entries: &[TestEntry]) -> Self {
        let views: Vec<(String, TensorView<'_>)> = entries
            .iter()
            .flat_map(|entry| {
                entry.arrays.iter().map(move |array| {
                    let view = TensorView::new(array.dtype, array.shape.clone(), &array.data)
                        .expect("array bytes match dtype and shape");
                    (format!("{}/{}", entry.name, array.key), view)
                })
            })
            .collect();
        let bytes = safetensors::tensor::serialize(
            views.iter().map(|(key, view)| (key.as_str(), view)),
            &None,
        )
        .expect("serializable test store");
        Self {
            filebinary: Cow::Owned(bytes),
            suffix: "safetensors",
        }
    }

    /// Three interface graphs `1ATN_1w`, `1ATN_2w`, `1ATN_3w` with 4, 3 and 5 residues.
    ///
    /// - node features: `bsa` (1-D), `res_type` (width 3), metafeature `_chain_id`
    /// - edge features: `dist`, `covalent`
    /// - targets: `irmsd` of 2, 8 and 14, `binary` of 1, 0, 0, `capri_class`
    /// - `mcl` clustering on the first two entries only
    pub fn graph_store_01() -> Self {
        Self::from_entries(&[
            interface_graph("1ATN_1w", 4, 2.0, 1.0).clustering("mcl", &[0, 0, 1, 1], &[0, 0, 0, 0]),
            interface_graph("1ATN_2w", 3, 8.0, 0.0).clustering("mcl", &[0, 1, 1], &[0, 0, 0]),
            interface_graph("1ATN_3w", 5, 14.0, 0.0),
        ])
    }

    /// Two graphs `1BRS_1w`, `1BRS_2w` with `irmsd` targets 1 and 20 and no `binary` target.
    pub fn graph_store_02() -> Self {
        let strip_binary = |entry: TestEntry| TestEntry {
            arrays: entry
                .arrays
                .into_iter()
                .filter(|array| array.key != "targets/binary")
                .collect(),
            ..entry
        };
        Self::from_entries(&[
            strip_binary(interface_graph("1BRS_1w", 3, 1.0, 1.0)),
            strip_binary(interface_graph("1BRS_2w", 4, 20.0, 0.0)),
        ])
    }

    /// Two grid entries `1ATN_1w`, `1ATN_2w` with `charge` and `vdw` on a 4x4x4 grid.
    pub fn grid_store_01() -> Self {
        let grid = |scale: f32| -> Vec<f32> { (0..64).map(|i| i as f32 * scale).collect() };
        Self::from_entries(&[
            TestEntry::new("1ATN_1w")
                .grid_feature("charge", [4, 4, 4], &grid(0.1))
                .grid_feature("vdw", [4, 4, 4], &grid(-0.2))
                .target("irmsd", 2.0)
                .target("binary", 1.0),
            TestEntry::new("1ATN_2w")
                .grid_feature("charge", [4, 4, 4], &grid(0.3))
                .grid_feature("vdw", [4, 4, 4], &grid(0.4))
                .target("irmsd", 8.0)
                .target("binary", 0.0),
        ])
    }

    /// A valid store without entries.
    pub fn empty_store() -> Self {
        Self::from_entries(&[])
    }

    /// Bytes that are not a store.
    pub fn corrupt_store() -> Self {
        Self {
            filebinary: Cow::Borrowed(b"\x08\x00\x00\x00\x00\x00\x00\x00not json"),
            suffix: "safetensors",
        }
    }

    pub fn create_temp(&self) -> std::io::Result<(String, NamedTempFile)> {
        let temp = Builder::new()
            .suffix(&format!(".{}", self.suffix))
            .tempfile()?;

        fs::write(&temp, &self.filebinary)?;
        let path = temp.path().to_string_lossy().into_owned();

        Ok((path, temp))
    }
}
