use crate::{error::Result, io::dataset::Batch, transform::RelativePose};

/// Relative pose estimate for one frame pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub pose: RelativePose,
    /// Per-component uncertainty, in label column order.
    pub confidence: Option<[f64; 6]>,
}

impl Prediction {
    pub fn new(pose: RelativePose) -> Self {
        Self {
            pose,
            confidence: None,
        }
    }
}

impl From<RelativePose> for Prediction {
    fn from(pose: RelativePose) -> Self {
        Self::new(pose)
    }
}

/// Odometry model under evaluation: one prediction per batch row, in row order.
pub trait Predictor<A> {
    fn predict(&mut self, batch: &Batch<A>) -> Result<Vec<Prediction>>;
}

impl<A, F> Predictor<A> for F
where
    F: FnMut(&Batch<A>) -> Result<Vec<Prediction>>,
{
    fn predict(&mut self, batch: &Batch<A>) -> Result<Vec<Prediction>> {
        self(batch)
    }
}
