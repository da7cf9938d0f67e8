use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::{debug, info};

use super::{
    EpochLogs, EvaluationParams, JsonTrajectoryWriter, MetricsSink, NoopSink, Prediction,
    Predictor, TrainingObserver, TrajectoryVisualizer,
};
use crate::{
    cache::Decoder,
    error::{EvalError, Result},
    io::{
        dataset::{BatchGenerator, DatasetAssembler, Subset},
        write_predictions,
    },
    metrics::{average_metrics, calculate_metrics, normalize_metrics, MetricRecord},
    trajectory_builder::compose_trajectory,
};

/// Identifier of the final test pass.
const TEST_PREDICTION_ID: &str = "test";

/// Evaluates a model on the subsets of a [`DatasetAssembler`] during training.
///
/// Every `period` epochs the train and validation subsets are predicted
/// trajectory by trajectory, composed into global trajectories and compared
/// against the ground truth. Prediction tables and visualizations are written
/// under `run_dir` when the validation loss improved, or on every evaluation
/// when `save_best_only` is off. The test subset is evaluated once, when
/// training ends.
pub struct Evaluator<'a, D: Decoder, P, S = NoopSink> {
    assembler: &'a DatasetAssembler<D>,
    predictor: P,
    sink: S,
    visualizer: Box<dyn TrajectoryVisualizer>,
    params: EvaluationParams,
    run_dir: Option<PathBuf>,
    epoch_counter: usize,
    best_loss: f64,
    finished: bool,
}

impl<'a, D, P> Evaluator<'a, D, P, NoopSink>
where
    D: Decoder,
    P: Predictor<D::Artifact>,
{
    pub fn new(assembler: &'a DatasetAssembler<D>, predictor: P, params: EvaluationParams) -> Self {
        Self {
            assembler,
            predictor,
            sink: NoopSink,
            visualizer: Box::new(JsonTrajectoryWriter),
            params,
            run_dir: None,
            epoch_counter: 0,
            best_loss: f64::INFINITY,
            finished: false,
        }
    }
}

/// Artifact file name of a trajectory, nested ids flattened.
fn artifact_name(trajectory_id: &str, extension: &str) -> String {
    format!("{}.{extension}", trajectory_id.replace('/', "_"))
}

impl<'a, D, P, S> Evaluator<'a, D, P, S>
where
    D: Decoder,
    P: Predictor<D::Artifact>,
    S: MetricsSink,
{
    pub fn with_sink<S2: MetricsSink>(self, sink: S2) -> Evaluator<'a, D, P, S2> {
        Evaluator {
            assembler: self.assembler,
            predictor: self.predictor,
            sink,
            visualizer: self.visualizer,
            params: self.params,
            run_dir: self.run_dir,
            epoch_counter: self.epoch_counter,
            best_loss: self.best_loss,
            finished: self.finished,
        }
    }

    pub fn with_visualizer(mut self, visualizer: Box<dyn TrajectoryVisualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Directory receiving the `predictions` and `visuals` artifacts.
    pub fn with_run_dir<T: AsRef<Path>>(mut self, run_dir: T) -> Self {
        self.run_dir = Some(run_dir.as_ref().to_path_buf());
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn params(&self) -> &EvaluationParams {
        &self.params
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Predicts every row of `generator`, in table order.
    fn predict(&mut self, generator: &BatchGenerator<D>) -> Result<Vec<Prediction>> {
        let mut predictions = Vec::with_capacity(generator.table().len());
        for batch in generator.iter() {
            let batch = batch?;
            let batch_predictions = self.predictor.predict(&batch)?;
            if batch_predictions.len() != batch.len() {
                return Err(EvalError::MalformedPrediction(format!(
                    "{} predictions for a batch of {}",
                    batch_predictions.len(),
                    batch.len()
                )));
            }
            predictions.extend(batch_predictions);
        }
        Ok(predictions)
    }

    /// Evaluates every trajectory of `subset` and averages their metrics.
    ///
    /// Returns metrics named `"{subset}_{metric}"`, nothing when the subset is
    /// not configured. Artifacts are written only when `save_artifacts` is set
    /// and a run directory is known.
    pub fn evaluate(
        &mut self,
        subset: Subset,
        prediction_id: &str,
        max_to_visualize: i64,
        save_artifacts: bool,
    ) -> Result<MetricRecord> {
        if self.assembler.subset(subset).is_none() {
            return Ok(MetricRecord::new());
        }

        let generators = self.assembler.trajectory_generators(subset)?;
        let max_to_visualize = if max_to_visualize > 0 {
            max_to_visualize as usize
        } else {
            generators.len()
        };
        let run_dir = if save_artifacts {
            self.run_dir.clone()
        } else {
            None
        };
        let metrics_params = self.params.metrics_params();
        let normalizer = self.params.normalizer();

        info!("Evaluate on {subset}: {} trajectories", generators.len());
        let mut records = Vec::with_capacity(generators.len());
        for (i, (trajectory_id, generator)) in generators.iter().enumerate() {
            let predictions = self.predict(generator)?;

            let gt_trajectory = compose_trajectory(&generator.table().labels())?;
            let predicted_trajectory = compose_trajectory(
                &predictions
                    .iter()
                    .map(|prediction| prediction.pose)
                    .collect::<Vec<_>>(),
            )?;

            let trajectory_metrics =
                calculate_metrics(&gt_trajectory, &predicted_trajectory, &metrics_params)?;
            let normalized = normalize_metrics(&trajectory_metrics, normalizer);
            debug!("{trajectory_id}: {:?}", normalized);

            if let Some(run_dir) = &run_dir {
                write_predictions(
                    run_dir
                        .join("predictions")
                        .join(prediction_id)
                        .join(subset.name())
                        .join(artifact_name(trajectory_id, "csv")),
                    &generator.table().indices(),
                    &predictions,
                )?;

                if i < max_to_visualize {
                    let title = format!(
                        "{}: {}",
                        trajectory_id.to_uppercase(),
                        normalized
                            .iter()
                            .map(|(name, value)| format!("{name}: {value:.6}"))
                            .join(", ")
                    );
                    self.visualizer.visualize(
                        &run_dir
                            .join("visuals")
                            .join(prediction_id)
                            .join(subset.name())
                            .join(artifact_name(trajectory_id, self.visualizer.extension())),
                        &predicted_trajectory,
                        Some(&gt_trajectory),
                        &title,
                    )?;
                }
            }

            records.push(normalized);
        }

        Ok(average_metrics(&records)
            .into_iter()
            .map(|(name, value)| (format!("{subset}_{name}"), value))
            .collect())
    }
}

impl<'a, D, P, S> TrainingObserver for Evaluator<'a, D, P, S>
where
    D: Decoder,
    P: Predictor<D::Artifact>,
    S: MetricsSink,
{
    fn on_epoch_end(&mut self, epoch: usize, logs: &EpochLogs) -> Result<Option<MetricRecord>> {
        let val_loss = logs.val_loss.unwrap_or(f64::INFINITY);
        let losses = [
            ("train_loss".to_string(), logs.loss),
            ("val_loss".to_string(), val_loss),
        ]
        .into_iter()
        .collect::<MetricRecord>();
        self.sink.log_metrics(&losses, Some(epoch));

        self.epoch_counter += 1;
        if self.params.period > 0 && self.epoch_counter < self.params.period {
            debug!("Epoch {epoch}: evaluation skipped");
            return Ok(None);
        }
        self.epoch_counter = 0;

        let improved = val_loss <= self.best_loss;
        self.best_loss = self.best_loss.min(val_loss);
        let save_artifacts = improved || !self.params.save_best_only;

        let prediction_id = format!("{:03}_train:{:.6}_val:{:.6}", epoch + 1, logs.loss, val_loss);
        let max_to_visualize = self.params.max_to_visualize;

        let mut metrics = self.evaluate(Subset::Train, &prediction_id, max_to_visualize, save_artifacts)?;
        metrics.extend(self.evaluate(Subset::Val, &prediction_id, max_to_visualize, save_artifacts)?);

        self.sink.log_metrics(&metrics, Some(epoch));
        if save_artifacts {
            if let Some(run_dir) = &self.run_dir {
                self.sink.log_artifacts(run_dir);
            }
        }
        Ok(Some(metrics))
    }

    fn on_train_end(&mut self, logs: &EpochLogs) -> Result<MetricRecord> {
        if self.finished {
            return Err(EvalError::invalid_parameter("The final evaluation already ran"));
        }
        self.finished = true;

        let metrics = self.evaluate(Subset::Test, TEST_PREDICTION_ID, -1, true)?;
        let mut logged = metrics.clone();
        logged.insert("final_train_loss".to_string(), logs.loss);
        if let Some(val_loss) = logs.val_loss {
            logged.insert("final_val_loss".to_string(), val_loss);
        }
        self.sink.log_metrics(&logged, None);
        if let Some(run_dir) = &self.run_dir {
            self.sink.log_artifacts(run_dir);
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        evaluation::RecordingSink,
        io::dataset::{AssemblerParams, Batch, SplitParams},
        metrics::{ATE, RPE_T},
        transform::RelativePose,
        unit_test::{sample_dataset, CountingDecoder, SampleDataset},
    };
    use rstest::rstest;

    fn assembler(sample_dataset: &SampleDataset) -> DatasetAssembler<CountingDecoder> {
        let params = AssemblerParams::new(sample_dataset.root())
            .with_train_trajectories(["seq_a"])
            .with_split(SplitParams::default().with_val_trajectories(["seq_b"]))
            .with_test_trajectories(["seq_a", "seq_b"])
            .with_batch_size(4);
        DatasetAssembler::with_decoder(params, CountingDecoder::default()).unwrap()
    }

    fn oracle(batch: &Batch<String>) -> Result<Vec<Prediction>> {
        Ok(batch.labels.iter().copied().map(Prediction::new).collect())
    }

    #[rstest]
    fn test_period_gate(sample_dataset: SampleDataset) {
        let assembler = assembler(&sample_dataset);
        let mut evaluator = Evaluator::new(&assembler, oracle, EvaluationParams::default().with_period(3))
            .with_sink(RecordingSink::default());

        assert!(evaluator.on_epoch_end(0, &EpochLogs::new(1.0, Some(1.0))).unwrap().is_none());
        assert!(evaluator.on_epoch_end(1, &EpochLogs::new(1.0, Some(1.0))).unwrap().is_none());
        let metrics = evaluator
            .on_epoch_end(2, &EpochLogs::new(1.0, Some(1.0)))
            .unwrap()
            .unwrap();
        assert!(evaluator.on_epoch_end(3, &EpochLogs::new(1.0, Some(1.0))).unwrap().is_none());

        assert!(metrics["train_ATE"].abs() < 1e-9);
        assert!(metrics["val_RPE_t"].abs() < 1e-9);
        assert!(metrics["val_RPE_r"].abs() < 1e-9);
        assert_eq!(metrics["val_num_frames"], 7.0);
        assert_eq!(evaluator.sink().last("val_loss"), Some(1.0));
    }

    #[rstest]
    fn test_artifacts_only_on_improvement(sample_dataset: SampleDataset) {
        let run_dir = tempfile::tempdir().unwrap();
        let assembler = assembler(&sample_dataset);
        let mut evaluator = Evaluator::new(&assembler, oracle, EvaluationParams::default().with_period(1))
            .with_run_dir(run_dir.path())
            .with_sink(RecordingSink::default());

        evaluator.on_epoch_end(0, &EpochLogs::new(2.0, Some(1.5))).unwrap();
        let first = run_dir.path().join("predictions/001_train:2.000000_val:1.500000");
        assert!(first.join("train/seq_a.csv").is_file());
        assert!(first.join("val/seq_b.csv").is_file());
        assert!(run_dir
            .path()
            .join("visuals/001_train:2.000000_val:1.500000/val/seq_b.json")
            .is_file());

        let metrics = evaluator.on_epoch_end(1, &EpochLogs::new(1.0, Some(3.0))).unwrap();
        assert!(metrics.is_some());
        assert!(!run_dir
            .path()
            .join("predictions/002_train:1.000000_val:3.000000")
            .exists());
        assert_eq!(evaluator.best_loss(), 1.5);
        assert_eq!(evaluator.sink().artifacts.len(), 1);
    }

    #[rstest]
    fn test_artifacts_every_evaluation_without_save_best_only(sample_dataset: SampleDataset) {
        let run_dir = tempfile::tempdir().unwrap();
        let assembler = assembler(&sample_dataset);
        let params = EvaluationParams::default()
            .with_period(1)
            .with_save_best_only(false);
        let mut evaluator = Evaluator::new(&assembler, oracle, params)
            .with_run_dir(run_dir.path())
            .with_sink(RecordingSink::default());

        evaluator.on_epoch_end(0, &EpochLogs::new(2.0, Some(1.5))).unwrap();
        evaluator.on_epoch_end(1, &EpochLogs::new(1.0, Some(3.0))).unwrap();

        let second = run_dir.path().join("predictions/002_train:1.000000_val:3.000000");
        assert!(second.join("train/seq_a.csv").is_file());
        assert!(second.join("val/seq_b.csv").is_file());
        assert!(run_dir
            .path()
            .join("visuals/002_train:1.000000_val:3.000000/val/seq_b.json")
            .is_file());
        assert_eq!(evaluator.best_loss(), 1.5);
        assert_eq!(evaluator.sink().artifacts.len(), 2);
    }

    #[rstest]
    fn test_final_evaluation(sample_dataset: SampleDataset) {
        let run_dir = tempfile::tempdir().unwrap();
        let assembler = assembler(&sample_dataset);
        let drift = |batch: &Batch<String>| -> Result<Vec<Prediction>> {
            Ok(batch
                .labels
                .iter()
                .map(|label| {
                    let mut pose = label.to_array();
                    pose[3] *= 1.1;
                    Prediction::new(RelativePose::from_array(pose))
                })
                .collect())
        };
        let params = EvaluationParams::default().with_max_to_visualize(1);
        let mut evaluator = Evaluator::new(&assembler, drift, params)
            .with_run_dir(run_dir.path())
            .with_sink(RecordingSink::default());

        let metrics = evaluator.on_train_end(&EpochLogs::new(0.5, Some(0.75))).unwrap();
        assert!(metrics[&format!("test_{ATE}")] > 0.0);
        assert!(metrics[&format!("test_{RPE_T}")] > 0.0);
        assert!(!metrics.contains_key("final_train_loss"));
        assert_eq!(evaluator.sink().last("final_train_loss"), Some(0.5));
        assert_eq!(evaluator.sink().last("final_val_loss"), Some(0.75));

        // the final pass visualizes every trajectory
        assert!(run_dir.path().join("visuals/test/test/seq_a.json").is_file());
        assert!(run_dir.path().join("visuals/test/test/seq_b.json").is_file());
        assert!(run_dir.path().join("predictions/test/test/seq_b.csv").is_file());

        assert!(evaluator.on_train_end(&EpochLogs::default()).is_err());
    }

    #[rstest]
    fn test_visualization_bound(sample_dataset: SampleDataset) {
        let run_dir = tempfile::tempdir().unwrap();
        let assembler = assembler(&sample_dataset);
        let mut evaluator = Evaluator::new(&assembler, oracle, EvaluationParams::default())
            .with_run_dir(run_dir.path());

        evaluator.evaluate(Subset::Test, "bounded", 1, true).unwrap();
        assert!(run_dir.path().join("visuals/bounded/test/seq_a.json").is_file());
        assert!(!run_dir.path().join("visuals/bounded/test/seq_b.json").exists());
        assert!(run_dir.path().join("predictions/bounded/test/seq_b.csv").is_file());
    }

    #[rstest]
    fn test_malformed_prediction_aborts(sample_dataset: SampleDataset) {
        let assembler = assembler(&sample_dataset);
        let short = |batch: &Batch<String>| -> Result<Vec<Prediction>> {
            Ok(vec![Prediction::new(RelativePose::zero()); batch.len() - 1])
        };
        let mut evaluator = Evaluator::new(&assembler, short, EvaluationParams::default().with_period(1));

        let result = evaluator.on_epoch_end(0, &EpochLogs::new(1.0, None));
        assert!(matches!(result, Err(EvalError::MalformedPrediction(_))));
    }

    #[rstest]
    fn test_non_finite_prediction_aborts(sample_dataset: SampleDataset) {
        let assembler = assembler(&sample_dataset);
        let broken = |batch: &Batch<String>| -> Result<Vec<Prediction>> {
            Ok(vec![
                Prediction::new(RelativePose::from_array([f64::NAN; 6]));
                batch.len()
            ])
        };
        let mut evaluator = Evaluator::new(&assembler, broken, EvaluationParams::default());

        let result = evaluator.evaluate(Subset::Val, "broken", 5, false);
        assert!(matches!(result, Err(EvalError::InvalidRecord { position: 0, .. })));
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("2/MH_01_easy", "csv"), "2_MH_01_easy.csv");
    }
}
