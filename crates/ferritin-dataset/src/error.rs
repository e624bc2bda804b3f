//! Error type shared by the store, the indexer and the dataset facades.

use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Requested features one store group could not provide.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGap {
    pub group: &'static str,
    pub missing: Vec<String>,
    pub available: Vec<String>,
}

fn describe_gaps(gaps: &[FeatureGap]) -> String {
    gaps.iter()
        .map(|gap| {
            format!(
                "\n  missing {} features: [{}]; available {} features: [{}]",
                gap.group,
                gap.missing.iter().join(", "),
                gap.group,
                gap.available.iter().join(", ")
            )
        })
        .join("")
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("safetensors error: {0}")]
    SafeTensor(#[from] safetensors::SafeTensorError),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("no readable, non-empty store file was given")]
    NoStoreFiles,

    #[error(
        "not all features could be found in the file {}. \
         Probably the feature wasn't generated during the preprocessing step.{}",
        file.display(),
        describe_gaps(gaps)
    )]
    MissingFeatures { file: PathBuf, gaps: Vec<FeatureGap> },

    #[error("user target detected: {target} -> the task must be 'regress' or 'classif', currently set as {task:?}")]
    UnsupportedTask { target: String, task: Option<String> },

    #[error("unknown task '{0}', expected 'regress' or 'classif'")]
    UnknownTask(String),

    #[error("condition {condition} for target {target} is not supported, use a comparison string or null")]
    UnsupportedCondition { target: String, condition: String },

    #[error("invalid filter expression '{expression}': {reason}")]
    InvalidPredicate { expression: String, reason: String },

    #[error(
        "target {target} missing in entry {entry} in file {}, possible targets are [{}]",
        file.display(),
        available.iter().join(", ")
    )]
    MissingTarget {
        target: String,
        entry: String,
        file: PathBuf,
        available: Vec<String>,
    },

    #[error("task is set to {task}, set it to regress to transform the target with a sigmoid")]
    TargetTransform { task: String },

    #[error("grid datasets require a target")]
    GridTargetRequired,

    #[error("no grid features selected from {}", file.display())]
    NoGridFeatures { file: PathBuf },

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("entry {entry} not found in {}", file.display())]
    EntryNotFound { entry: String, file: PathBuf },

    #[error("key {key} not found in {}", file.display())]
    KeyNotFound { key: String, file: PathBuf },

    #[error("array {key} has shape {shape:?}, expected {expected}")]
    InvalidShape {
        key: String,
        shape: Vec<usize>,
        expected: String,
    },

    #[error("entry ids should be a list of strings, got {0}")]
    InvalidEntryIds(String),

    #[error("class label {0} is not part of the class table")]
    UnknownClass(String),

    #[error("invalid molecular graph {graph}: {reason}")]
    InvalidGraph { graph: String, reason: String },

    #[error("residue {chain}:{residue} has no {feature} value")]
    MissingResidue {
        chain: String,
        residue: i32,
        feature: &'static str,
    },

    #[error("could not parse DSSP output at line {line}: {reason}")]
    Dssp { line: usize, reason: String },
}
