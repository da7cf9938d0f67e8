//! Periodic evaluation of an odometry model while it trains.
//!
//! The training loop drives an [`Evaluator`] through the [`TrainingObserver`]
//! interface. Metrics go to an explicit [`MetricsSink`], predictions and
//! visualizations are written under the run directory.

use serde_derive::{Deserialize, Serialize};

use crate::{
    error::Result,
    io::dataset::ExperimentConfig,
    metrics::{Alignment, MetricRecord, MetricsParams, Normalizer, RpeIndices},
};

mod evaluator;
pub use evaluator::Evaluator;

mod predictor;
pub use predictor::{Prediction, Predictor};

mod sink;
pub use sink::{MetricsSink, NoopSink, RecordingSink, TracingSink};

mod visualization;
pub use visualization::{JsonTrajectoryWriter, TrajectoryPlot, TrajectoryVisualizer};

/// Losses reported by the training loop at the end of an epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpochLogs {
    pub loss: f64,
    pub val_loss: Option<f64>,
}

impl EpochLogs {
    pub fn new(loss: f64, val_loss: Option<f64>) -> Self {
        Self { loss, val_loss }
    }
}

/// Notifications a training loop sends to its observers.
pub trait TrainingObserver {
    /// Called after every epoch, `epoch` counting from 0. Returns the metrics of
    /// the epoch when an evaluation ran.
    fn on_epoch_end(&mut self, epoch: usize, logs: &EpochLogs) -> Result<Option<MetricRecord>>;

    /// Called once when training is over, with the losses of the last epoch.
    fn on_train_end(&mut self, logs: &EpochLogs) -> Result<MetricRecord>;
}

/// Parameters of an [`Evaluator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationParams {
    /// Evaluate every `period` epochs, every epoch when 0.
    pub period: usize,
    /// Write artifacts only when the validation loss improves.
    pub save_best_only: bool,
    /// Number of trajectories visualized per subset, all of them when not positive.
    pub max_to_visualize: i64,
    pub rpe_indices: RpeIndices,
    /// Defaults to the one of `rpe_indices`.
    pub normalizer: Option<Normalizer>,
    pub alignment: Alignment,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            period: 10,
            save_best_only: true,
            max_to_visualize: 5,
            rpe_indices: RpeIndices::Full,
            normalizer: None,
            alignment: Alignment::Rigid,
        }
    }
}

impl EvaluationParams {
    /// Defaults with the RPE preset of a known experiment.
    pub fn from_experiment(config: &ExperimentConfig) -> Self {
        Self::default().with_rpe_indices(config.rpe_indices.clone())
    }

    pub fn with_period(mut self, period: usize) -> Self {
        self.period = period;
        self
    }

    pub fn with_save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    pub fn with_max_to_visualize(mut self, max_to_visualize: i64) -> Self {
        self.max_to_visualize = max_to_visualize;
        self
    }

    pub fn with_rpe_indices(mut self, rpe_indices: RpeIndices) -> Self {
        self.rpe_indices = rpe_indices;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn normalizer(&self) -> Normalizer {
        self.normalizer
            .unwrap_or_else(|| self.rpe_indices.default_normalizer())
    }

    pub fn metrics_params(&self) -> MetricsParams {
        MetricsParams::default()
            .with_rpe_indices(self.rpe_indices.clone())
            .with_alignment(self.alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dataset::DatasetConfig;

    #[test]
    fn test_params_from_json() {
        let params: EvaluationParams =
            serde_json::from_str(r#"{"period": 1, "rpe_indices": "kitti", "alignment": "similarity"}"#)
                .unwrap();
        assert_eq!(params.period, 1);
        assert!(params.save_best_only);
        assert_eq!(params.max_to_visualize, 5);
        assert_eq!(params.normalizer(), Normalizer::Identity);
        assert_eq!(params.metrics_params().alignment, Alignment::Similarity);

        let params = params.with_normalizer(Normalizer::PathLength);
        assert_eq!(params.normalizer(), Normalizer::PathLength);
    }

    #[test]
    fn test_params_from_experiment() {
        let kitti = DatasetConfig::Kitti4x6.config(None).unwrap();
        let params = EvaluationParams::from_experiment(&kitti);
        assert_eq!(params.rpe_indices, RpeIndices::Kitti);
        assert_eq!(params.normalizer(), Normalizer::Identity);
        assert_eq!(params.metrics_params().rpe_indices, RpeIndices::Kitti);

        let tum = DatasetConfig::TumFr1.config(None).unwrap();
        let params = EvaluationParams::from_experiment(&tum);
        assert_eq!(params.rpe_indices, RpeIndices::Full);
        assert_eq!(params.normalizer(), Normalizer::PathLength);
    }
}
