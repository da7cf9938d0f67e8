use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::{error::EvalError, trajectory::Trajectory};

use super::TransformMetrics;

/// Segment lengths in meters used by the KITTI odometry benchmark.
pub const KITTI_SEGMENT_LENGTHS: [f64; 8] = [100.0, 200.0, 300.0, 400.0, 500.0, 600.0, 700.0, 800.0];

/// Frame step between the first frames of KITTI segments.
const KITTI_STEP_SIZE: usize = 10;

/// Which frame pairs the relative pose error is sampled on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpeIndices {
    /// Every offset `1..N`, every frame pair at that offset.
    Full,
    /// KITTI protocol: segments of fixed metric length, errors per meter.
    Kitti,
    /// Only the given frame offsets.
    Offsets(Vec<usize>),
}

impl Default for RpeIndices {
    fn default() -> Self {
        RpeIndices::Full
    }
}

impl FromStr for RpeIndices {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(RpeIndices::Full),
            "kitti" => Ok(RpeIndices::Kitti),
            _ => Err(EvalError::invalid_parameter(format!(
                "Invalid rpe_indices preset: {s}"
            ))),
        }
    }
}

impl RpeIndices {
    /// Normalizer that makes values of this preset comparable across trajectories.
    pub fn default_normalizer(&self) -> super::Normalizer {
        match self {
            RpeIndices::Kitti => super::Normalizer::Identity,
            _ => super::Normalizer::PathLength,
        }
    }
}

/// Root mean square relative pose errors of one trajectory pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RpeResult {
    /// Translation error RMS.
    pub translation: f64,
    /// Rotation error RMS in radians.
    pub rotation: f64,
    /// Number of frame pairs sampled.
    pub pairs: usize,
}

#[derive(Default)]
struct SquaredSum {
    translation: f64,
    rotation: f64,
    count: usize,
}

impl SquaredSum {
    fn add(&mut self, translation: f64, rotation: f64) {
        self.translation += translation * translation;
        self.rotation += rotation * rotation;
        self.count += 1;
    }

    fn rms(self) -> RpeResult {
        if self.count == 0 {
            return RpeResult::default();
        }
        let count = self.count as f64;
        RpeResult {
            translation: (self.translation / count).sqrt(),
            rotation: (self.rotation / count).sqrt(),
            pairs: self.count,
        }
    }
}

fn pair_error(gt: &Trajectory, pred: &Trajectory, first: usize, last: usize) -> Option<TransformMetrics> {
    let gt_relative = gt.get_relative_transform(first, last)?;
    let pred_relative = pred.get_relative_transform(first, last)?;
    Some(TransformMetrics::new(&gt_relative, &pred_relative))
}

fn offsets_error(gt: &Trajectory, pred: &Trajectory, offsets: impl Iterator<Item = usize>) -> RpeResult {
    let len = gt.len();
    let mut sum = SquaredSum::default();
    for offset in offsets.filter(|offset| *offset > 0 && *offset < len) {
        for first in 0..len - offset {
            if let Some(error) = pair_error(gt, pred, first, first + offset) {
                sum.add(error.translation, error.angle);
            }
        }
    }
    sum.rms()
}

fn kitti_error(gt: &Trajectory, pred: &Trajectory) -> RpeResult {
    let distances = gt.cumulative_distances();
    let mut sum = SquaredSum::default();

    for first in (0..gt.len()).step_by(KITTI_STEP_SIZE) {
        for segment_length in KITTI_SEGMENT_LENGTHS {
            let target = distances[first] + segment_length;
            let last = match distances[first..].iter().position(|d| *d > target) {
                Some(offset) => first + offset,
                None => continue,
            };

            if let Some(error) = pair_error(gt, pred, first, last) {
                sum.add(
                    error.translation / segment_length,
                    error.angle / segment_length,
                );
            }
        }
    }
    sum.rms()
}

/// Relative pose error between two trajectories of equal length.
///
/// Returns zeros with `pairs == 0` when no frame pair qualifies.
pub fn relative_pose_error(gt: &Trajectory, pred: &Trajectory, indices: &RpeIndices) -> RpeResult {
    let len = gt.len().min(pred.len());
    if len < 2 {
        return RpeResult::default();
    }

    match indices {
        RpeIndices::Full => offsets_error(gt, pred, 1..len),
        RpeIndices::Offsets(offsets) => offsets_error(gt, pred, offsets.iter().copied()),
        RpeIndices::Kitti => kitti_error(gt, pred),
    }
}
