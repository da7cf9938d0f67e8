use std::{ops::Range, path::Path};

use itertools::Itertools;

use crate::{
    error::{EvalError, Result},
    transform::{RelativePose, LABEL_COLUMNS},
};

/// One row of the working table: a frame pair and its relative pose label.
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectorySample {
    /// Row index in the assembled table.
    pub index: usize,
    pub trajectory_id: String,
    /// Position of the row within its trajectory.
    pub position: usize,
    /// Input paths relative to the dataset root, one per input column.
    pub inputs: Vec<String>,
    pub label: RelativePose,
}

/// Ordered rows of one or more trajectories.
///
/// `(trajectory_id, position)` is unique. Row order within a trajectory is the
/// frame order and is preserved by every operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataTable {
    input_columns: Vec<String>,
    rows: Vec<TrajectorySample>,
}

impl DataTable {
    pub fn new(input_columns: Vec<String>, rows: Vec<TrajectorySample>) -> Self {
        Self {
            input_columns,
            rows,
        }
    }

    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    pub fn rows(&self) -> &[TrajectorySample] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrajectorySample> + '_ {
        self.rows.iter()
    }

    /// Rows in `range` (by row order, not by index), keeping their indices.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            input_columns: self.input_columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Appends the rows of every table, in order, keeping their indices.
    pub fn concat<I: IntoIterator<Item = DataTable>>(tables: I) -> Self {
        let mut result = DataTable::default();
        for table in tables {
            if result.input_columns.is_empty() {
                result.input_columns = table.input_columns;
            }
            result.rows.extend(table.rows);
        }
        result
    }

    /// Assigns the contiguous index `0..len` in row order.
    pub fn reindexed(mut self) -> Self {
        for (index, row) in self.rows.iter_mut().enumerate() {
            row.index = index;
        }
        self
    }

    /// Every `step`-th row starting at the first one.
    pub fn sample_every(&self, step: usize) -> Result<Self> {
        if step == 0 {
            return Err(EvalError::invalid_parameter("Sampling step must be positive"));
        }
        Ok(Self {
            input_columns: self.input_columns.clone(),
            rows: self.rows.iter().step_by(step).cloned().collect(),
        })
    }

    /// Distinct trajectory ids in order of first appearance.
    pub fn trajectory_ids(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.trajectory_id.as_str())
            .unique()
            .collect()
    }

    /// Splits the table per trajectory, in order of first appearance.
    pub fn by_trajectory(&self) -> Vec<(String, DataTable)> {
        self.trajectory_ids()
            .into_iter()
            .map(|trajectory_id| {
                let rows = self
                    .rows
                    .iter()
                    .filter(|row| row.trajectory_id == trajectory_id)
                    .cloned()
                    .collect();
                (
                    trajectory_id.to_string(),
                    DataTable::new(self.input_columns.clone(), rows),
                )
            })
            .collect()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.rows.iter().map(|row| row.index).collect()
    }

    pub fn labels(&self) -> Vec<RelativePose> {
        self.rows.iter().map(|row| row.label).collect()
    }
}

fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.trim() == name)
        .ok_or_else(|| EvalError::invalid_parameter(format!("{path:?} has no column {name}")))
}

/// Reads the rows of one trajectory from `{dataset_root}/{trajectory_id}/{csv_name}`.
///
/// Input paths are prefixed with `{trajectory_id}/` and positions follow row order.
pub fn read_trajectory_table(
    dataset_root: &Path,
    trajectory_id: &str,
    csv_name: &str,
    input_columns: &[String],
) -> Result<DataTable> {
    let trajectory_dir = dataset_root.join(trajectory_id);
    if !trajectory_dir.is_dir() {
        return Err(EvalError::UnknownTrajectory(format!(
            "{trajectory_id} (no directory {trajectory_dir:?})"
        )));
    }

    let csv_path = trajectory_dir.join(csv_name);
    let mut reader = csv::Reader::from_path(&csv_path)?;
    let headers = reader.headers()?.clone();

    let input_indices = input_columns
        .iter()
        .map(|name| column_index(&headers, name, &csv_path))
        .collect::<Result<Vec<usize>>>()?;
    let label_indices = LABEL_COLUMNS
        .iter()
        .map(|name| column_index(&headers, name, &csv_path))
        .collect::<Result<Vec<usize>>>()?;

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record?;

        let inputs = input_indices
            .iter()
            .map(|i| format!("{trajectory_id}/{}", record.get(*i).unwrap_or_default().trim()))
            .collect();

        let mut label = [0.0; 6];
        for (value, i) in label.iter_mut().zip(label_indices.iter()) {
            let field = record.get(*i).unwrap_or_default().trim();
            *value = field.parse::<f64>().map_err(|_| {
                EvalError::Parser(format!(
                    "{csv_path:?} row {position}: invalid value '{field}' in column {}",
                    headers.get(*i).unwrap_or_default()
                ))
            })?;
        }

        rows.push(TrajectorySample {
            index: position,
            trajectory_id: trajectory_id.to_string(),
            position,
            inputs,
            label: RelativePose::from_array(label),
        });
    }

    Ok(DataTable::new(input_columns.to_vec(), rows))
}

/// Concatenates the tables of `trajectory_ids` and re-indexes them `0..M`.
///
/// Every trajectory may appear only once.
pub fn assemble(
    dataset_root: &Path,
    trajectory_ids: &[String],
    csv_name: &str,
    input_columns: &[String],
) -> Result<DataTable> {
    if trajectory_ids.is_empty() {
        return Err(EvalError::invalid_parameter("No trajectories to assemble"));
    }
    if let Some(duplicate) = trajectory_ids.iter().duplicates().next() {
        return Err(EvalError::invalid_parameter(format!(
            "Trajectory {duplicate} is listed more than once"
        )));
    }

    let tables = trajectory_ids
        .iter()
        .map(|trajectory_id| read_trajectory_table(dataset_root, trajectory_id, csv_name, input_columns))
        .collect::<Result<Vec<DataTable>>>()?;
    Ok(DataTable::concat(tables).reindexed())
}
