use assert_cmd::Command;
use ferritin_dataset::StoreFile;
use ferritin_test_data::TestFile;
use std::fs;

#[test]
fn test_cli_inspect() {
    let (store, _tmp) = TestFile::graph_store_01().create_temp().unwrap();
    let mut cmd = Command::cargo_bin("ferritin-dataset").unwrap();
    cmd.arg("inspect").arg("--store").arg(&store);

    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("entries: 3"));
    assert!(stdout.contains("node features: [bsa, res_type]"));
    assert!(stdout.contains("edge features: [covalent, dist]"));
    assert!(stdout.contains("targets: [binary, capri_class, irmsd]"));
}

#[test]
fn test_cli_subset() {
    let (store, _tmp) = TestFile::graph_store_01().create_temp().unwrap();
    let out_folder = tempfile::tempdir().unwrap();
    let output = out_folder.path().join("subset.safetensors");

    let mut cmd = Command::cargo_bin("ferritin-dataset").unwrap();
    cmd.arg("subset")
        .arg("--source")
        .arg(&store)
        .arg("--ids")
        .arg("1ATN_3w,1ATN_1w")
        .arg("--output")
        .arg(&output)
        .arg("--hardcopy");
    cmd.assert().success();

    let subset = StoreFile::open(&output).unwrap();
    assert_eq!(subset.entry_names(), vec!["1ATN_1w", "1ATN_3w"]);
}

#[test]
fn test_cli_subset_ids_file() {
    let (store, _tmp) = TestFile::graph_store_01().create_temp().unwrap();
    let out_folder = tempfile::tempdir().unwrap();
    let ids_file = out_folder.path().join("ids.json");
    let output = out_folder.path().join("linked.safetensors");

    fs::write(&ids_file, r#"["1ATN_2w"]"#).unwrap();
    let mut cmd = Command::cargo_bin("ferritin-dataset").unwrap();
    cmd.arg("subset")
        .arg("--source")
        .arg(&store)
        .arg("--ids-file")
        .arg(&ids_file)
        .arg("--output")
        .arg(&output);
    cmd.assert().success();
    assert!(StoreFile::open(&output).unwrap().entry("1ATN_2w").unwrap().is_linked());

    fs::write(&ids_file, "[1, 2]").unwrap();
    let mut cmd = Command::cargo_bin("ferritin-dataset").unwrap();
    cmd.arg("subset")
        .arg("--source")
        .arg(&store)
        .arg("--ids-file")
        .arg(&ids_file)
        .arg("--output")
        .arg(&output);
    cmd.assert().failure();
}

#[test]
fn test_cli_sample() {
    let (store, _tmp) = TestFile::graph_store_01().create_temp().unwrap();
    let out_folder = tempfile::tempdir().unwrap();
    let config = out_folder.path().join("config.json");
    let body = serde_json::json!({
        "store_files": [store],
        "target": "irmsd",
        "clustering_method": "mcl",
        "progress": false,
        "cpu": true
    });
    fs::write(&config, body.to_string()).unwrap();

    let mut cmd = Command::cargo_bin("ferritin-dataset").unwrap();
    cmd.arg("sample").arg("--config").arg(&config).arg("--index").arg("2");
    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("entry: 1ATN_3w"));
    assert!(stdout.contains("x: [5, 4]"));
    assert!(stdout.contains("edge_index: [2, 8]"));
    assert!(!stdout.contains("clustering"));
}

#[test]
fn test_cli_sample_grid() {
    let (store, _tmp) = TestFile::grid_store_01().create_temp().unwrap();
    let out_folder = tempfile::tempdir().unwrap();
    let config = out_folder.path().join("config.json");
    let body = serde_json::json!({
        "store_files": store,
        "target": "binary",
        "progress": false,
        "cpu": true
    });
    fs::write(&config, body.to_string()).unwrap();

    let mut cmd = Command::cargo_bin("ferritin-dataset").unwrap();
    cmd.arg("sample").arg("--config").arg(&config).arg("--grid");
    let output = cmd.assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    assert!(stdout.contains("x: [1, 2, 4, 4, 4]"));
    assert!(stdout.contains("y: [1]"));
}
