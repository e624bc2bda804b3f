use anyhow::Context;
use ferritin_dataset::features::available_features;
use ferritin_dataset::storage::{EDGES, MAPPED_FEATURES, NODES, TARGETS};
use ferritin_dataset::StoreFile;
use itertools::Itertools;
use std::path::PathBuf;

pub fn execute(store: PathBuf) -> anyhow::Result<()> {
    let file = StoreFile::open(&store)
        .with_context(|| format!("failed to open store {}", store.display()))?;
    let entries = file.entry_names();
    println!("store: {}", store.display());
    println!("entries: {}", entries.len());

    let Some(first) = entries.first() else {
        return Ok(());
    };
    let entry = file.entry(first)?;
    println!("first entry: {}", first);
    for (label, group) in [
        ("node features", NODES),
        ("edge features", EDGES),
        ("grid features", MAPPED_FEATURES),
    ] {
        println!("{}: [{}]", label, available_features(&entry, group).iter().join(", "));
    }
    println!("targets: [{}]", entry.children(TARGETS).iter().join(", "));
    Ok(())
}
