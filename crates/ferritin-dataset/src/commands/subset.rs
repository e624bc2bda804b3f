use anyhow::Context;
use ferritin_dataset::save_entries;
use ferritin_dataset::store::entry_ids_from_json;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub fn execute(
    source: PathBuf,
    ids: Vec<String>,
    ids_file: Option<PathBuf>,
    output: PathBuf,
    hardcopy: bool,
) -> anyhow::Result<()> {
    let ids = match ids_file {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            entry_ids_from_json(&serde_json::from_str(&text)?)?
        }
        None => ids,
    };
    save_entries(&source, &ids, &output, hardcopy)?;
    info!(
        "{} {} entries of {} into {}",
        if hardcopy { "copied" } else { "linked" },
        ids.len(),
        source.display(),
        output.display()
    );
    Ok(())
}
