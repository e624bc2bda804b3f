use super::{read_target, transform_target};
use crate::error::Result;
use crate::sample::GridSample;
use crate::storage::{FEATURE_VALUE, MAPPED_FEATURES};
use crate::store::EntryGroup;
use crate::task::Task;
use candle_core::{DType, Device, Tensor};
use std::path::Path;

/// Assembles [`GridSample`]s from voxel mapped features.
#[derive(Debug, Clone)]
pub struct GridAssembler {
    pub features: Vec<String>,
    pub target: String,
    pub task: Option<Task>,
    pub target_transform: bool,
    pub device: Device,
}

impl GridAssembler {
    pub fn assemble(&self, file: &Path, entry: &EntryGroup<'_>) -> Result<GridSample> {
        let grids = self
            .features
            .iter()
            .map(|feature| {
                let key = format!("{MAPPED_FEATURES}/{feature}/{FEATURE_VALUE}");
                Ok(entry.read(&key, &self.device)?.to_dtype(DType::F32)?)
            })
            .collect::<Result<Vec<_>>>()?;
        let x = Tensor::stack(&grids, 0)?.unsqueeze(0)?;

        let mut value = read_target(entry, file, &self.target)?;
        if self.target_transform {
            value = transform_target(self.task, value)?;
        }
        let y = Tensor::new(&[value as f32], &self.device)?;

        Ok(GridSample {
            x,
            y,
            entry_names: vec![entry.name().to_string()],
        })
    }
}
