use std::collections::BTreeMap;

use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{EvalError, Result},
    trajectory::Trajectory,
    transform::Transform,
};

mod aggregate;
pub use aggregate::{aggregate_metrics, average_metrics, calculate_stat, MetricAggregator};

mod ate;
pub use ate::{absolute_trajectory_error, align_umeyama, Alignment, AlignmentResult, AteResult};

pub mod leaderboard;

mod rpe;
pub use rpe::{relative_pose_error, RpeIndices, RpeResult, KITTI_SEGMENT_LENGTHS};

/// Metric name to value, ordered by name.
pub type MetricRecord = BTreeMap<String, f64>;

pub const ATE: &str = "ATE";
pub const RPE_T: &str = "RPE_t";
pub const RPE_R: &str = "RPE_r";
pub const PATH_LENGTH: &str = "path_length";
pub const NUM_FRAMES: &str = "num_frames";
pub const SCALE: &str = "scale";

/// Metrics for comparing two transforms.
#[derive(Clone, Debug, Default)]
pub struct TransformMetrics {
    /// Angle between the two transforms in radians.
    pub angle: f64,
    /// Translation vector size between the two transforms.
    pub translation: f64,
}

impl TransformMetrics {
    /// Creates a new `TransformMetrics` from two transforms.
    pub fn new(lfs: &Transform, rhs: &Transform) -> Self {
        let diff = &lfs.inverse() * rhs;

        Self {
            angle: diff.angle(),
            translation: diff.translation().norm(),
        }
    }
}

/// What per-trajectory errors are divided by before averaging across trajectories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    /// Divide error metrics by the ground-truth path length.
    PathLength,
    /// Keep values as they are.
    Identity,
}

/// Options of [`calculate_metrics`].
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsParams {
    pub rpe_indices: RpeIndices,
    pub alignment: Alignment,
}

impl Default for MetricsParams {
    fn default() -> Self {
        Self {
            rpe_indices: RpeIndices::Full,
            alignment: Alignment::Rigid,
        }
    }
}

impl MetricsParams {
    pub fn with_rpe_indices(mut self, rpe_indices: RpeIndices) -> Self {
        self.rpe_indices = rpe_indices;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }
}

/// Computes the error record of `pred_trajectory` against `gt_trajectory`.
///
/// The record holds `ATE`, `RPE_t`, `RPE_r`, `path_length` and `num_frames`,
/// plus `scale` when aligning with [`Alignment::Similarity`]. `RPE_t` and
/// `RPE_r` are left out when no frame pair qualifies for the RPE preset, so
/// averages only cover trajectories that have them.
pub fn calculate_metrics(
    gt_trajectory: &Trajectory,
    pred_trajectory: &Trajectory,
    params: &MetricsParams,
) -> Result<MetricRecord> {
    if pred_trajectory.len() != gt_trajectory.len() {
        return Err(EvalError::invalid_parameter(format!(
            "Pred and GT trajectories have different lengths: {} != {}",
            pred_trajectory.len(),
            gt_trajectory.len()
        )));
    }
    if gt_trajectory.is_empty() {
        return Err(EvalError::invalid_parameter("Trajectories are empty"));
    }

    let ate = absolute_trajectory_error(gt_trajectory, pred_trajectory, params.alignment)?;
    let rpe = relative_pose_error(gt_trajectory, pred_trajectory, &params.rpe_indices);

    let mut record = MetricRecord::new();
    record.insert(ATE.to_string(), ate.rmse);
    if rpe.pairs > 0 {
        record.insert(RPE_T.to_string(), rpe.translation);
        record.insert(RPE_R.to_string(), rpe.rotation);
    } else {
        warn!(
            "No frame pair of a {} frames trajectory qualifies for RPE",
            gt_trajectory.len()
        );
    }
    record.insert(PATH_LENGTH.to_string(), gt_trajectory.path_length());
    record.insert(NUM_FRAMES.to_string(), gt_trajectory.len() as f64);
    if params.alignment == Alignment::Similarity {
        record.insert(SCALE.to_string(), ate.alignment.scale);
    }
    Ok(record)
}

/// Divides the error metrics of `record` by the normalizer.
///
/// A zero or missing path length leaves the record untouched.
pub fn normalize_metrics(record: &MetricRecord, normalizer: Normalizer) -> MetricRecord {
    let mut normalized = record.clone();
    if normalizer == Normalizer::Identity {
        return normalized;
    }

    let path_length = match record.get(PATH_LENGTH) {
        Some(path_length) if *path_length > 0.0 => *path_length,
        _ => return normalized,
    };

    for key in [ATE, RPE_T, RPE_R] {
        if let Some(value) = normalized.get_mut(key) {
            *value /= path_length;
        }
    }
    normalized
}
