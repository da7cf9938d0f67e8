use crate::{
    error::{EvalError, Result},
    trajectory::Trajectory,
    transform::{compose, RelativePose, Transform},
};

/// Accumulates relative poses and builds a global trajectory.
#[derive(Clone, Debug)]
pub struct TrajectoryBuilder {
    trajectory: Trajectory,
}

impl Default for TrajectoryBuilder {
    /// Creates a new `TrajectoryBuilder`.
    /// It'll contain a single pose at the origin.
    fn default() -> Self {
        Self {
            trajectory: Trajectory {
                camera_to_world: vec![Transform::eye()],
            },
        }
    }
}

impl TrajectoryBuilder {
    /// Composes `relative` onto the last pose and appends the result.
    ///
    /// Fails without modifying the trajectory if the record has non-finite values.
    pub fn accumulate(&mut self, relative: &RelativePose) -> Result<()> {
        let position = self.trajectory.len() - 1;
        if !relative.is_finite() {
            return Err(EvalError::InvalidRecord {
                position,
                reason: format!("non-finite values {:?}", relative.to_array()),
            });
        }

        let next = compose(self.current_camera_to_world(), relative);
        if !next.is_finite() {
            return Err(EvalError::InvalidRecord {
                position,
                reason: "composition produced a non-finite pose".to_string(),
            });
        }
        self.trajectory.push(next);
        Ok(())
    }

    /// Creates the trajectory at its current state.
    pub fn build(self) -> Trajectory {
        self.trajectory
    }

    /// Returns the current camera pose in the world frame.
    pub fn current_camera_to_world(&self) -> &Transform {
        &self.trajectory.camera_to_world[self.trajectory.len() - 1]
    }
}

/// Composes ordered relative records into a global trajectory of `records.len() + 1`
/// poses, starting at the identity.
pub fn compose_trajectory(records: &[RelativePose]) -> Result<Trajectory> {
    let mut builder = TrajectoryBuilder::default();
    for record in records {
        builder.accumulate(record)?;
    }
    Ok(builder.build())
}
