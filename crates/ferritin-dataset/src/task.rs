//! Learning task and class table resolution.
use crate::error::{DatasetError, Result};
use crate::storage::{BINARY, CAPRI, DOCKQ, FNAT, IRMSD, LRMSD};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(try_from = "String")]
pub enum Task {
    Regress,
    Classif,
}

impl Task {
    /// Task implied by a well-known target name.
    pub fn infer(target: &str) -> Option<Task> {
        match target {
            IRMSD | LRMSD | FNAT | DOCKQ => Some(Task::Regress),
            BINARY | CAPRI => Some(Task::Classif),
            _ => None,
        }
    }

    pub fn parse(task: &str) -> Result<Task> {
        Task::from_str(task).map_err(|_| DatasetError::UnknownTask(task.to_string()))
    }
}

impl TryFrom<String> for Task {
    type Error = DatasetError;

    fn try_from(task: String) -> Result<Task> {
        Task::parse(&task)
    }
}

/// A classification label: integer class ids or named classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Int(i64),
    Text(String),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Int(value) => write!(f, "{value}"),
            ClassLabel::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ClassLabel {
    fn from(value: i64) -> Self {
        ClassLabel::Int(value)
    }
}

impl From<&str> for ClassLabel {
    fn from(value: &str) -> Self {
        ClassLabel::Text(value.to_string())
    }
}

/// Ordered class labels and their dense indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTable {
    classes: Vec<ClassLabel>,
    index: HashMap<ClassLabel, usize>,
}

impl ClassTable {
    pub fn new(classes: Vec<ClassLabel>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(index, class)| (class.clone(), index))
            .collect();
        Self { classes, index }
    }

    pub fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    pub fn index_of(&self, label: &ClassLabel) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| DatasetError::UnknownClass(label.to_string()))
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new(vec![ClassLabel::Int(0), ClassLabel::Int(1)])
    }
}

/// Reconcile the user supplied task with the one implied by the target.
///
/// The inferred task wins; a disagreeing user task only produces a warning.
/// Returns the resolved task and, for classification, the class table.
pub fn resolve_task(
    target: Option<&str>,
    task: Option<Task>,
    classes: Option<Vec<ClassLabel>>,
) -> Result<(Option<Task>, Option<ClassTable>)> {
    let resolved = target.and_then(Task::infer).or(task);

    if let Some(target) = target {
        if resolved.is_none() {
            return Err(DatasetError::UnsupportedTask {
                target: target.to_string(),
                task: task.map(|task| task.to_string()),
            });
        }
    }
    if let (Some(user), Some(resolved)) = (task, resolved) {
        if user != resolved {
            warn!(
                "target {:?} expects {}, but was set to task {} by user; {} will be used",
                target, resolved, user, resolved
            );
        }
    }

    let table = match (resolved, classes) {
        (Some(Task::Classif), Some(classes)) => Some(ClassTable::new(classes)),
        (Some(Task::Classif), None) => {
            let table = ClassTable::default();
            info!("target classes set up to: {:?}", table.classes());
            Some(table)
        }
        _ => None,
    };
    Ok((resolved, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_wins() {
        let (task, classes) = resolve_task(Some(IRMSD), Some(Task::Classif), None).unwrap();
        assert_eq!(task, Some(Task::Regress));
        assert!(classes.is_none());

        let (task, classes) = resolve_task(Some(BINARY), None, None).unwrap();
        assert_eq!(task, Some(Task::Classif));
        assert_eq!(classes.unwrap(), ClassTable::default());
    }

    #[test]
    fn test_custom_target_requires_task() {
        let err = resolve_task(Some("affinity"), None, None).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedTask { .. }));

        let (task, _) = resolve_task(Some("affinity"), Some(Task::Regress), None).unwrap();
        assert_eq!(task, Some(Task::Regress));

        // no target means no task is needed
        let (task, _) = resolve_task(None, None, None).unwrap();
        assert_eq!(task, None);
    }

    #[test]
    fn test_class_table() {
        let (_, classes) = resolve_task(
            Some("phenotype"),
            Some(Task::Classif),
            Some(vec!["benign".into(), "pathogenic".into()]),
        )
        .unwrap();
        let classes = classes.unwrap();
        assert_eq!(classes.index_of(&"pathogenic".into()).unwrap(), 1);
        assert!(classes.index_of(&ClassLabel::Int(0)).is_err());
    }

    #[test]
    fn test_task_strings() {
        assert_eq!(Task::parse("regress").unwrap(), Task::Regress);
        assert_eq!(Task::Classif.to_string(), "classif");
        assert!(matches!(Task::parse("regression"), Err(DatasetError::UnknownTask(_))));

        let task: Task = serde_json::from_str("\"classif\"").unwrap();
        assert_eq!(task, Task::Classif);
        let err = serde_json::from_str::<Task>("\"regression\"").unwrap_err();
        assert!(err.to_string().contains("unknown task 'regression'"));
    }
}
