use std::ops::Index;

use nalgebra::Vector3;

use crate::{
    error::Result,
    transform::{relative_between, RelativePose, Transform},
    trajectory_builder::compose_trajectory,
};

/// Global trajectory: one absolute pose per frame, all in the same world frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    /// Camera poses, transforms points from camera to world.
    pub camera_to_world: Vec<Transform>,
}

impl Trajectory {
    /// Adds a new pose to the trajectory.
    pub fn push(&mut self, camera_to_world: Transform) {
        self.camera_to_world.push(camera_to_world);
    }

    /// Returns the number of poses in the trajectory.
    pub fn len(&self) -> usize {
        self.camera_to_world.len()
    }

    /// Returns true if the trajectory is empty.
    pub fn is_empty(&self) -> bool {
        self.camera_to_world.is_empty()
    }

    /// Returns the relative transform between two poses.
    pub fn get_relative_transform(&self, from_index: usize, dest_index: usize) -> Option<Transform> {
        let from = self.camera_to_world.get(from_index)?;
        let dest = self.camera_to_world.get(dest_index)?;
        Some(&from.inverse() * dest)
    }

    /// Returns the iterator over poses.
    pub fn iter(&self) -> impl Iterator<Item = &Transform> + '_ {
        self.camera_to_world.iter()
    }

    /// Camera centers in world frame.
    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.camera_to_world.iter().map(|pose| pose.translation()).collect()
    }

    /// Distance travelled from the first frame up to each frame.
    pub fn cumulative_distances(&self) -> Vec<f64> {
        let mut distances = Vec::with_capacity(self.len());
        let mut total = 0.0;
        for (i, pose) in self.camera_to_world.iter().enumerate() {
            if i > 0 {
                total += (pose.translation() - self.camera_to_world[i - 1].translation()).norm();
            }
            distances.push(total);
        }
        distances
    }

    /// Total travelled distance.
    pub fn path_length(&self) -> f64 {
        self.cumulative_distances().last().copied().unwrap_or(0.0)
    }

    /// Creates a new trajectory with the poses transformed in such a way that the first pose is at origin.
    pub fn first_frame_at_origin(&self) -> Self {
        if self.camera_to_world.is_empty() {
            return self.clone();
        }

        let first_inv = self.camera_to_world[0].inverse();
        Self {
            camera_to_world: self
                .camera_to_world
                .iter()
                .map(|transform| &first_inv * transform)
                .collect::<Vec<Transform>>(),
        }
    }
}

impl FromIterator<Transform> for Trajectory {
    /// Use with the `collect::<Trajectory>` method.
    fn from_iter<T: IntoIterator<Item = Transform>>(iter: T) -> Self {
        Self {
            camera_to_world: iter.into_iter().collect(),
        }
    }
}

impl Index<usize> for Trajectory {
    type Output = Transform;
    /// Returns the pose at the given index.
    fn index(&self, index: usize) -> &Self::Output {
        &self.camera_to_world[index]
    }
}

/// Ordered relative pose records, record `i` takes frame `i` into frame `i + 1`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelativeTrajectory {
    pub records: Vec<RelativePose>,
}

impl RelativeTrajectory {
    pub fn new(records: Vec<RelativePose>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Relative motions between consecutive poses of `trajectory`.
    pub fn from_global(trajectory: &Trajectory) -> Self {
        Self {
            records: trajectory
                .camera_to_world
                .windows(2)
                .map(|pair| relative_between(&pair[0], &pair[1]))
                .collect(),
        }
    }

    /// Composes the records starting from the identity pose.
    pub fn to_global(&self) -> Result<Trajectory> {
        compose_trajectory(&self.records)
    }
}

impl FromIterator<RelativePose> for RelativeTrajectory {
    fn from_iter<T: IntoIterator<Item = RelativePose>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
