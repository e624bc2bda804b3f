use anyhow::Context;
use candle_core::Tensor;
use ferritin_dataset::{Dataset, GraphDataset, GraphDatasetConfig, GridDataset, GridDatasetConfig};
use std::fs;
use std::path::PathBuf;

fn shape(tensor: &Tensor) -> String {
    format!("{:?}", tensor.dims())
}

pub fn execute(config: PathBuf, index: usize, grid: bool) -> anyhow::Result<()> {
    let text = fs::read_to_string(&config)
        .with_context(|| format!("failed to read config {}", config.display()))?;

    if grid {
        let dataset = GridDataset::new(serde_json::from_str::<GridDatasetConfig>(&text)?)?;
        println!("entries: {}", dataset.len());
        let sample = dataset.get(index)?;
        println!("entry: {}", sample.entry_names.join(", "));
        println!("x: {}", shape(&sample.x));
        println!("y: {}", shape(&sample.y));
    } else {
        let dataset = GraphDataset::new(serde_json::from_str::<GraphDatasetConfig>(&text)?)?;
        println!("entries: {}", dataset.len());
        let sample = dataset.get(index)?;
        println!("entry: {}", sample.entry_names.join(", "));
        println!("x: {}", shape(&sample.x));
        println!("edge_index: {}", shape(&sample.edge_index));
        println!("edge_attr: {}", shape(&sample.edge_attr));
        println!("pos: {}", shape(&sample.pos));
        if let Some(y) = &sample.y {
            println!("y: {}", shape(y));
        }
        if let Some(clustering) = &sample.clustering {
            println!("clustering depth_0: {}", shape(&clustering.depth_0));
        }
    }
    Ok(())
}
