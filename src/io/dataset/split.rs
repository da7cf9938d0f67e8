use std::ops::Range;

use serde_derive::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// Validation settings as they appear in an experiment file.
///
/// Either `val_trajectories` names a disjoint validation set, or
/// `validate_on_train_trajectory` carves the validation window out of the
/// training trajectories, sized by `val_ratio` or `number_of_folds`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    pub val_trajectories: Option<Vec<String>>,
    pub validate_on_train_trajectory: bool,
    pub val_ratio: f64,
    pub number_of_folds: Option<usize>,
    pub fold_index: usize,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            val_trajectories: None,
            validate_on_train_trajectory: false,
            val_ratio: 0.0,
            number_of_folds: None,
            fold_index: 0,
        }
    }
}

impl SplitParams {
    pub fn with_val_trajectories<I, S>(mut self, trajectories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.val_trajectories = Some(trajectories.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_val_ratio(mut self, ratio: f64, fold_index: usize) -> Self {
        self.validate_on_train_trajectory = true;
        self.val_ratio = ratio;
        self.fold_index = fold_index;
        self
    }

    pub fn with_folds(mut self, number_of_folds: usize, fold_index: usize) -> Self {
        self.validate_on_train_trajectory = true;
        self.number_of_folds = Some(number_of_folds);
        self.fold_index = fold_index;
        self
    }

    /// Checks the settings and turns them into a [`ValidationSplit`].
    pub fn resolve(&self) -> Result<ValidationSplit> {
        let has_ratio = self.val_ratio != 0.0 || self.number_of_folds.is_some();

        if self.validate_on_train_trajectory != has_ratio {
            return Err(EvalError::invalid_parameter(
                "Validation on train trajectories requires a validation ratio or a number of folds, and vice versa",
            ));
        }

        if !self.validate_on_train_trajectory {
            let trajectories = self.val_trajectories.clone().unwrap_or_default();
            if trajectories.is_empty() {
                return Err(EvalError::invalid_parameter(
                    "No validation trajectories given",
                ));
            }
            return Ok(ValidationSplit::Trajectories(trajectories));
        }

        if self.val_trajectories.is_some() {
            return Err(EvalError::invalid_parameter(
                "Validation trajectories can't be set when validating on train trajectories",
            ));
        }

        let split = match self.number_of_folds {
            Some(folds) => ValidationSplit::KFold {
                folds,
                fold_index: self.fold_index,
            },
            None => ValidationSplit::Ratio {
                ratio: self.val_ratio,
                fold_index: self.fold_index,
            },
        };
        split.validate()?;
        Ok(split)
    }
}

/// How the validation subset is chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationSplit {
    /// Disjoint validation trajectories, train keeps all its rows.
    Trajectories(Vec<String>),
    /// Window of `ceil(ratio * M)` rows of the train table.
    Ratio { ratio: f64, fold_index: usize },
    /// Fold `fold_index` of `folds` equal windows of the train table.
    KFold { folds: usize, fold_index: usize },
}

impl ValidationSplit {
    /// Whether validation rows are taken from the train trajectories.
    pub fn is_self_validation(&self) -> bool {
        !matches!(self, ValidationSplit::Trajectories(_))
    }

    /// Number of windows that tile the table.
    pub fn number_of_folds(&self) -> Option<usize> {
        match self {
            ValidationSplit::Trajectories(_) => None,
            ValidationSplit::KFold { folds, .. } => Some(*folds),
            ValidationSplit::Ratio { ratio, .. } => Some((1.0 / ratio - 1e-9).ceil() as usize),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ValidationSplit::Trajectories(trajectories) => {
                if trajectories.is_empty() {
                    return Err(EvalError::invalid_parameter("No validation trajectories given"));
                }
            }
            ValidationSplit::Ratio { ratio, .. } => {
                if !(*ratio > 0.0 && *ratio <= 1.0) {
                    return Err(EvalError::invalid_parameter(format!(
                        "Validation ratio must be in (0, 1], got {ratio}"
                    )));
                }
            }
            ValidationSplit::KFold { folds, .. } => {
                if *folds == 0 {
                    return Err(EvalError::invalid_parameter("Number of folds must be positive"));
                }
            }
        }

        if let (Some(folds), Some(fold_index)) = (self.number_of_folds(), self.fold_index()) {
            if fold_index >= folds {
                return Err(EvalError::invalid_parameter(format!(
                    "Fold index {fold_index} is out of range for {folds} folds"
                )));
            }
        }
        Ok(())
    }

    pub fn fold_index(&self) -> Option<usize> {
        match self {
            ValidationSplit::Trajectories(_) => None,
            ValidationSplit::Ratio { fold_index, .. } | ValidationSplit::KFold { fold_index, .. } => {
                Some(*fold_index)
            }
        }
    }

    /// Validation window over a table of `total` rows.
    ///
    /// The window size is rounded up so that all folds cover the table, the last
    /// fold being shorter by the remainder. Disjoint validation takes every row.
    pub fn fold_window(&self, total: usize) -> Result<Range<usize>> {
        self.validate()?;

        let (size, fold_index) = match self {
            ValidationSplit::Trajectories(_) => return Ok(0..total),
            ValidationSplit::Ratio { ratio, fold_index } => {
                ((ratio * total as f64).ceil() as usize, *fold_index)
            }
            ValidationSplit::KFold { folds, fold_index } => {
                ((total + folds - 1) / folds, *fold_index)
            }
        };

        let start = (fold_index * size).min(total);
        let end = (start + size).min(total);
        Ok(start..end)
    }
}
