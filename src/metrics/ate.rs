use nalgebra::{Matrix3, Vector3};
use serde_derive::{Deserialize, Serialize};

use crate::{
    error::{EvalError, Result},
    trajectory::Trajectory,
};

/// How the predicted trajectory is aligned to the ground truth before measuring ATE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Compare positions as they are.
    None,
    /// Best-fit rotation and translation.
    Rigid,
    /// Best-fit rotation, translation and uniform scale.
    Similarity,
}

/// Least-squares similarity `dst ~ scale * rotation * src + translation`.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentResult {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    pub scale: f64,
}

impl Default for AlignmentResult {
    fn default() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }
}

impl AlignmentResult {
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point * self.scale + self.translation
    }
}

/// Absolute trajectory error of one trajectory pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AteResult {
    /// Root mean square of per-frame position errors.
    pub rmse: f64,
    /// Per-frame position errors after alignment.
    pub errors: Vec<f64>,
    /// Alignment applied to the prediction.
    pub alignment: AlignmentResult,
}

/// Umeyama's closed form least-squares alignment of `src` onto `dst`.
///
/// # Arguments
///
/// * `src` - Points to be aligned.
/// * `dst` - Reference points, same length as `src`.
/// * `with_scale` - Also estimates a uniform scale.
pub fn align_umeyama(
    src: &[Vector3<f64>],
    dst: &[Vector3<f64>],
    with_scale: bool,
) -> Result<AlignmentResult> {
    if src.len() != dst.len() || src.is_empty() {
        return Err(EvalError::invalid_parameter(format!(
            "Alignment needs two non-empty point sets of equal size, got {} and {}",
            src.len(),
            dst.len()
        )));
    }

    let count = src.len() as f64;
    let src_mean = src.iter().sum::<Vector3<f64>>() / count;
    let dst_mean = dst.iter().sum::<Vector3<f64>>() / count;

    let mut covariance = Matrix3::zeros();
    let mut src_variance = 0.0;
    for (s, d) in src.iter().zip(dst.iter()) {
        let s = s - src_mean;
        let d = d - dst_mean;
        covariance += d * s.transpose();
        src_variance += s.norm_squared();
    }
    covariance /= count;
    src_variance /= count;

    let svd = covariance.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(EvalError::invalid_parameter("SVD of the alignment covariance failed")),
    };

    let mut sign = Matrix3::identity();
    if u.determinant() * v_t.determinant() < 0.0 {
        sign[(2, 2)] = -1.0;
    }
    let rotation = u * sign * v_t;

    let scale = if with_scale && src_variance > 0.0 {
        (Matrix3::from_diagonal(&svd.singular_values) * sign).trace() / src_variance
    } else {
        1.0
    };
    let translation = dst_mean - rotation * src_mean * scale;

    Ok(AlignmentResult {
        rotation,
        translation,
        scale,
    })
}

/// Per-frame position error of `pred` against `gt` after the requested alignment.
pub fn absolute_trajectory_error(
    gt: &Trajectory,
    pred: &Trajectory,
    alignment: Alignment,
) -> Result<AteResult> {
    let gt_positions = gt.positions();
    let pred_positions = pred.positions();

    let alignment = match alignment {
        Alignment::None => AlignmentResult::default(),
        Alignment::Rigid => align_umeyama(&pred_positions, &gt_positions, false)?,
        Alignment::Similarity => align_umeyama(&pred_positions, &gt_positions, true)?,
    };

    let errors = pred_positions
        .iter()
        .zip(gt_positions.iter())
        .map(|(pred, gt)| (alignment.apply(pred) - gt).norm())
        .collect::<Vec<f64>>();

    let rmse = if errors.is_empty() {
        0.0
    } else {
        (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt()
    };

    Ok(AteResult {
        rmse,
        errors,
        alignment,
    })
}
