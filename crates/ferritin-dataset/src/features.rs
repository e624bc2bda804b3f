//! Feature selection and availability checks.
//!
//! Available features are read from the first entry of the first store file and
//! assumed identical for every other entry of the dataset.
use crate::error::{DatasetError, FeatureGap, Result};
use crate::storage::{is_metafeature, is_reserved};
use crate::store::{EntryGroup, StoreFile};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Either every available feature or an explicit, ordered list of names.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(try_from = "SelectionRepr")]
pub enum FeatureSelection {
    #[default]
    All,
    Names(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Null,
    Keyword(String),
    Names(Vec<String>),
}

impl TryFrom<SelectionRepr> for FeatureSelection {
    type Error = String;

    fn try_from(repr: SelectionRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            SelectionRepr::Null => Ok(FeatureSelection::none()),
            SelectionRepr::Keyword(keyword) if keyword == "all" => Ok(FeatureSelection::All),
            SelectionRepr::Keyword(other) => Err(format!(
                "expected \"all\" or a list of feature names, got \"{other}\""
            )),
            SelectionRepr::Names(names) => Ok(FeatureSelection::Names(names)),
        }
    }
}

impl FeatureSelection {
    pub fn names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        FeatureSelection::Names(names.into_iter().map(Into::into).collect())
    }

    /// Selects nothing; for edges this disables edge attributes.
    pub fn none() -> Self {
        FeatureSelection::Names(Vec::new())
    }

    /// Resolve against the available names, returning a gap for the names that are missing.
    pub fn resolve(
        &self,
        group: &'static str,
        available: &[String],
        file: &Path,
    ) -> std::result::Result<Vec<String>, FeatureGap> {
        match self {
            FeatureSelection::All => Ok(available.to_vec()),
            FeatureSelection::Names(names) => {
                let missing: Vec<String> = names
                    .iter()
                    .filter(|name| !available.contains(name))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    return Ok(names.clone());
                }
                for name in &missing {
                    info!(
                        "the {} feature {} was not found in the file {}",
                        group,
                        name,
                        file.display()
                    );
                }
                Err(FeatureGap {
                    group,
                    missing,
                    available: available.to_vec(),
                })
            }
        }
    }
}

/// Feature names stored under `group`, without metafeatures and structural arrays.
pub fn available_features(entry: &EntryGroup<'_>, group: &str) -> Vec<String> {
    entry
        .children(group)
        .into_iter()
        .filter(|name| !is_metafeature(name) && !is_reserved(group, name))
        .collect()
}

/// Resolve several selections against the first entry of `store`.
///
/// Every selection is checked before failing so the error lists all gaps at once.
pub fn resolve_selections(
    store: &StoreFile,
    selections: &[(&'static str, &FeatureSelection)],
) -> Result<Vec<Vec<String>>> {
    let first = store
        .entry_names()
        .into_iter()
        .next()
        .ok_or(DatasetError::NoStoreFiles)?;
    let entry = store.entry(&first)?;

    let mut resolved = Vec::with_capacity(selections.len());
    let mut gaps = Vec::new();
    for &(group, selection) in selections {
        let available = available_features(&entry, group);
        match selection.resolve(group, &available, store.path()) {
            Ok(names) => resolved.push(names),
            Err(gap) => gaps.push(gap),
        }
    }
    if !gaps.is_empty() {
        return Err(DatasetError::MissingFeatures {
            file: store.path().to_path_buf(),
            gaps,
        });
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_selection() {
        let available = vec!["bsa".to_string(), "res_type".to_string()];
        let file = Path::new("store.safetensors");
        assert_eq!(
            FeatureSelection::All.resolve("node", &available, file).unwrap(),
            available
        );
        assert_eq!(
            FeatureSelection::names(["res_type"])
                .resolve("node", &available, file)
                .unwrap(),
            vec!["res_type"]
        );
        let gap = FeatureSelection::names(["bsa", "nonexistent"])
            .resolve("node", &available, file)
            .unwrap_err();
        assert_eq!(gap.missing, vec!["nonexistent"]);
        assert_eq!(gap.available, available);
    }

    #[test]
    fn test_deserialize_selection() {
        let all: FeatureSelection = serde_json::from_value(json!("all")).unwrap();
        assert_eq!(all, FeatureSelection::All);
        let names: FeatureSelection = serde_json::from_value(json!(["bsa", "hse"])).unwrap();
        assert_eq!(names, FeatureSelection::names(["bsa", "hse"]));
        assert!(serde_json::from_value::<FeatureSelection>(json!("bsa")).is_err());
        let none: FeatureSelection = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(none, FeatureSelection::none());
    }
}
