mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array3;
use odometry_eval::{
    error::Result,
    evaluation::{EpochLogs, EvaluationParams, Evaluator, Prediction, RecordingSink, TrainingObserver},
    io::{
        dataset::{AssemblerParams, Batch, DatasetAssembler, SplitParams},
        read_predictions,
    },
    metrics::{calculate_metrics, relative_pose_error, MetricsParams, RpeIndices, ATE},
    trajectory_builder::compose_trajectory,
    transform::RelativePose,
};

#[test]
fn test_three_frame_scenario() {
    let trajectory = compose_trajectory(&[
        RelativePose::from_array([0.0, 0.0, 0.0, 1.0, 0.0, 0.0]),
        RelativePose::from_array([0.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
    ])
    .unwrap();

    let positions = trajectory.positions();
    assert_eq!(positions.len(), 3);
    assert_abs_diff_eq!(positions[1], nalgebra::Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    assert_abs_diff_eq!(positions[2], nalgebra::Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);

    for indices in [RpeIndices::Offsets(vec![1]), RpeIndices::Full] {
        let rpe = relative_pose_error(&trajectory, &trajectory, &indices);
        assert_eq!(rpe.translation, 0.0);
        assert_eq!(rpe.rotation, 0.0);
    }

    let metrics = calculate_metrics(&trajectory, &trajectory, &MetricsParams::default()).unwrap();
    assert_abs_diff_eq!(metrics[ATE], 0.0, epsilon = 1e-9);
}

#[test]
fn test_training_run() {
    let dir = tempfile::tempdir().unwrap();
    let run_dir = tempfile::tempdir().unwrap();
    common::write_trajectory(dir.path(), "1/train_seq", &common::turning_labels(12));
    common::write_trajectory(dir.path(), "1/test_seq", &common::turning_labels(5));

    let params = AssemblerParams::new(dir.path())
        .with_train_trajectories(["1/train_seq"])
        .with_split(SplitParams::default().with_folds(4, 3))
        .with_test_trajectories(["1/test_seq"])
        .with_batch_size(5);
    let assembler = DatasetAssembler::new(params).unwrap();
    assert_eq!(assembler.val().indices(), vec![9, 10, 11]);

    // Predicts the labels, but twice too fast.
    let predictor = |batch: &Batch<Array3<f32>>| -> Result<Vec<Prediction>> {
        assert_eq!(batch.inputs.len(), 2);
        Ok(batch
            .labels
            .iter()
            .map(|label| {
                let mut pose = label.to_array();
                pose[3] *= 2.0;
                Prediction::new(RelativePose::from_array(pose))
            })
            .collect())
    };

    let mut evaluator = Evaluator::new(
        &assembler,
        predictor,
        EvaluationParams::default().with_period(2),
    )
    .with_run_dir(run_dir.path())
    .with_sink(RecordingSink::default());

    assert!(evaluator
        .on_epoch_end(0, &EpochLogs::new(0.9, Some(0.8)))
        .unwrap()
        .is_none());
    let metrics = evaluator
        .on_epoch_end(1, &EpochLogs::new(0.5, Some(0.4)))
        .unwrap()
        .unwrap();
    assert!(metrics["train_RPE_t"] > 0.0);
    assert!(metrics["val_ATE"] > 0.0);
    assert_eq!(metrics["train_num_frames"], 10.0);
    assert_eq!(metrics["val_num_frames"], 4.0);

    let predictions_path = run_dir
        .path()
        .join("predictions/002_train:0.500000_val:0.400000/val/1_train_seq.csv");
    let (indices, predictions) = read_predictions(predictions_path).unwrap();
    assert_eq!(indices, vec![9, 10, 11]);
    assert_eq!(predictions[0].pose.translation[0], 2.0);

    let test_metrics = evaluator.on_train_end(&EpochLogs::new(0.5, Some(0.4))).unwrap();
    assert!(test_metrics.keys().all(|name| name.starts_with("test_")));
    assert!(run_dir.path().join("visuals/test/test/1_test_seq.json").is_file());

    let sink = evaluator.sink();
    assert_eq!(sink.last("test_num_frames"), Some(6.0));
    assert_eq!(sink.artifacts.len(), 2);
}
