use std::{fs::File, io::BufWriter, path::Path};

use serde_derive::{Deserialize, Serialize};

use crate::{error::Result, trajectory::Trajectory};

/// Renders a predicted trajectory, optionally against its ground truth.
pub trait TrajectoryVisualizer {
    /// File extension of the rendered artifact.
    fn extension(&self) -> &str;

    fn visualize(
        &self,
        file_path: &Path,
        predicted: &Trajectory,
        ground_truth: Option<&Trajectory>,
        title: &str,
    ) -> Result<()>;
}

/// Plot-ready positions of a trajectory pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPlot {
    pub title: String,
    pub predicted: Vec<[f64; 3]>,
    pub ground_truth: Option<Vec<[f64; 3]>>,
}

fn to_points(trajectory: &Trajectory) -> Vec<[f64; 3]> {
    trajectory
        .positions()
        .iter()
        .map(|position| [position[0], position[1], position[2]])
        .collect()
}

/// Writes the positions to plot as JSON, leaving the rendering to an external tool.
///
/// Both trajectories are moved to start at the origin.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTrajectoryWriter;

impl TrajectoryVisualizer for JsonTrajectoryWriter {
    fn extension(&self) -> &str {
        "json"
    }

    fn visualize(
        &self,
        file_path: &Path,
        predicted: &Trajectory,
        ground_truth: Option<&Trajectory>,
        title: &str,
    ) -> Result<()> {
        let plot = TrajectoryPlot {
            title: title.to_string(),
            predicted: to_points(&predicted.first_frame_at_origin()),
            ground_truth: ground_truth.map(|gt| to_points(&gt.first_frame_at_origin())),
        };

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(file_path)?);
        serde_json::to_writer(&mut writer, &plot)?;
        std::io::Write::flush(&mut writer)?;
        Ok(())
    }
}
