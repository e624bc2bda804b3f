//! Ferritin Dataset
//!
//! Dataset loaders that turn entries of a hierarchical feature store into
//! graph and voxel grid samples for model training.
//!
//! A store is a safetensors file whose tensor names follow the layout in
//! [`storage`]. [`GraphDataset`] and [`GridDataset`] index one or more stores,
//! filter entries on their targets and assemble samples on demand.
//!
pub mod assemble;
pub mod dataset;
pub mod error;
pub mod features;
pub mod featurize;
pub mod filter;
pub mod graph;
pub mod index;
pub mod sample;
pub mod storage;
pub mod store;
pub mod task;

pub use dataset::{Dataset, GraphDataset, GraphDatasetConfig, GridDataset, GridDatasetConfig};
pub use error::{DatasetError, Result};
pub use features::FeatureSelection;
pub use filter::TargetFilter;
pub use graph::{MolecularGraph, ResidueKey};
pub use index::IndexEntry;
pub use sample::{Clustering, GraphSample, GridSample, Transform};
pub use store::{save_entries, StoreFile, StoreWriter};
pub use task::{ClassLabel, Task};

use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;
use tracing::{debug, info};

/// Pick the device samples are assembled on: cuda, then metal, then the CPU.
pub fn device(cpu: bool) -> candle_core::Result<Device> {
    let device = if cpu {
        Device::Cpu
    } else if cuda_is_available() {
        Device::new_cuda(0)?
    } else if metal_is_available() {
        Device::new_metal(0)?
    } else {
        debug!("no accelerator compiled in, samples are assembled on the CPU");
        Device::Cpu
    };
    info!("assembling samples on {:?}", device);
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_device() {
        assert!(device(true).unwrap().is_cpu());
    }
}
