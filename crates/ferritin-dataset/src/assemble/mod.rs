//! Feature Assembly
//!
//! Turns one stored entry into the tensors of a sample. Both assemblers read
//! straight from an open [`EntryGroup`](crate::store::EntryGroup); nothing is
//! cached between calls.
mod graph;
mod grid;

pub use graph::{symmetrize_edge_index, EdgeTransform, GraphAssembler};
pub use grid::GridAssembler;

use crate::error::{DatasetError, Result};
use crate::storage::{is_metafeature, TARGETS};
use crate::store::EntryGroup;
use crate::task::Task;
use candle_core::{DType, Device, Tensor};
use std::path::Path;

/// Read the named features of `group` and concatenate them column-wise.
///
/// 1-D arrays become single columns. Metafeatures are skipped. Returns `None`
/// when nothing was read.
pub(crate) fn concat_features(
    entry: &EntryGroup<'_>,
    group: &str,
    names: &[String],
    device: &Device,
) -> Result<Option<Tensor>> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names.iter().filter(|name| !is_metafeature(name)) {
        let key = format!("{group}/{name}");
        let values = entry.read(&key, device)?.to_dtype(DType::F32)?;
        let values = match values.rank() {
            1 => values.unsqueeze(1)?,
            2 => values,
            _ => {
                return Err(DatasetError::InvalidShape {
                    key,
                    shape: values.dims().to_vec(),
                    expected: "a 1-D or 2-D array".to_string(),
                })
            }
        };
        columns.push(values);
    }
    if columns.is_empty() {
        return Ok(None);
    }
    Ok(Some(Tensor::cat(&columns, 1)?))
}

/// `sigmoid(log(value))`, only defined for regression targets.
pub fn transform_target(task: Option<Task>, value: f64) -> Result<f64> {
    match task {
        Some(Task::Regress) => Ok(1.0 / (1.0 + (-value.ln()).exp())),
        other => Err(DatasetError::TargetTransform {
            task: other.map_or_else(|| "none".to_string(), |task| task.to_string()),
        }),
    }
}

/// Read `targets/{target}` or fail naming the entry, the file and the targets it has.
pub(crate) fn read_target(entry: &EntryGroup<'_>, file: &Path, target: &str) -> Result<f64> {
    let key = format!("{TARGETS}/{target}");
    if !entry.contains(&key) {
        return Err(DatasetError::MissingTarget {
            target: target.to_string(),
            entry: entry.name().to_string(),
            file: file.to_path_buf(),
            available: entry.children(TARGETS),
        });
    }
    entry.read_scalar(&key)
}
