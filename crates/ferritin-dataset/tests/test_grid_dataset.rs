use approx::assert_relative_eq;
use ferritin_dataset::{
    Dataset, DatasetError, FeatureSelection, GridDataset, GridDatasetConfig, TargetFilter, Task,
};
use ferritin_test_data::TestFile;
use std::path::PathBuf;

fn dataset(config: GridDatasetConfig) -> GridDataset {
    GridDataset::new(config).unwrap()
}

#[test]
fn test_grid_sample_shapes() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let grids = dataset(
        GridDatasetConfig::builder()
            .store_files(vec![store.into()])
            .target("irmsd")
            .progress(false)
            .cpu(true)
            .build(),
    );
    assert_eq!(grids.len(), 2);
    assert_eq!(grids.features(), &["charge", "vdw"]);
    assert_eq!(grids.task(), Some(Task::Regress));

    let sample = grids.get(1).unwrap();
    assert_eq!(sample.x.dims(), &[1, 2, 4, 4, 4]);
    assert_eq!(sample.y.to_vec1::<f32>().unwrap(), vec![8.0]);
    assert_eq!(sample.entry_names, vec!["1ATN_2w"]);

    let values = sample.x.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert_relative_eq!(values[1], 0.3, epsilon = 1e-6);
    assert_relative_eq!(values[64 + 1], 0.4, epsilon = 1e-6);
}

#[test]
fn test_grid_feature_selection() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let grids = dataset(
        GridDatasetConfig::builder()
            .store_files(vec![PathBuf::from(&store)])
            .target("binary")
            .features(FeatureSelection::names(["vdw"]))
            .target_filter(TargetFilter::new().condition("irmsd", "< 5").unwrap())
            .progress(false)
            .cpu(true)
            .build(),
    );
    assert_eq!(grids.len(), 1);
    let sample = grids.get(0).unwrap();
    assert_eq!(sample.x.dims(), &[1, 1, 4, 4, 4]);
    assert_eq!(sample.y.to_vec1::<f32>().unwrap(), vec![1.0]);

    let err = GridDataset::new(
        GridDatasetConfig::builder()
            .store_files(vec![store.into()])
            .target("binary")
            .features(FeatureSelection::names(["electrostatic"]))
            .progress(false)
            .cpu(true)
            .build(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("charge, vdw"));
}

#[test]
fn test_grid_requires_target() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let err = GridDataset::new(
        GridDatasetConfig::builder()
            .store_files(vec![store.into()])
            .progress(false)
            .cpu(true)
            .build(),
    )
    .unwrap_err();
    assert!(matches!(err, DatasetError::GridTargetRequired));
}

#[test]
fn test_grid_target_transform() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let grids = dataset(
        GridDatasetConfig::builder()
            .store_files(vec![PathBuf::from(&store)])
            .target("irmsd")
            .target_transform(true)
            .progress(false)
            .cpu(true)
            .build(),
    );
    let y = grids.get(0).unwrap().y.to_vec1::<f32>().unwrap();
    assert_relative_eq!(y[0], 2.0 / 3.0, epsilon = 1e-6);

    let grids = dataset(
        GridDatasetConfig::builder()
            .store_files(vec![store.into()])
            .target("binary")
            .target_transform(true)
            .progress(false)
            .cpu(true)
            .build(),
    );
    assert!(matches!(
        grids.get(0),
        Err(DatasetError::TargetTransform { .. })
    ));
}

#[test]
fn test_grid_config_from_json() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let config: GridDatasetConfig = serde_json::from_value(serde_json::json!({
        "store_files": [store],
        "target": "irmsd",
        "features": "all",
        "subset": ["1ATN_2w"],
        "progress": false,
        "cpu": true
    }))
    .unwrap();
    let grids = dataset(config);
    assert_eq!(grids.len(), 1);
    assert_eq!(grids.iter().count(), 1);
}

#[test]
fn test_grid_without_features_is_rejected() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let err = GridDataset::new(
        GridDatasetConfig::builder()
            .store_files(vec![PathBuf::from(&store)])
            .target("irmsd")
            .features(FeatureSelection::none())
            .progress(false)
            .cpu(true)
            .build(),
    )
    .unwrap_err();
    assert!(matches!(err, DatasetError::NoGridFeatures { .. }));

    // graph entries carry no voxel mapped features
    let (graphs, _tmp) = TestFile::graph_store_01().create_temp().unwrap();
    let err = GridDataset::new(
        GridDatasetConfig::builder()
            .store_files(vec![graphs.into()])
            .target("irmsd")
            .progress(false)
            .cpu(true)
            .build(),
    )
    .unwrap_err();
    assert!(matches!(err, DatasetError::NoGridFeatures { .. }));
}
