use std::path::{Path, PathBuf};

use tracing::info;

use crate::metrics::MetricRecord;

/// Destination of the metrics and artifacts produced during training.
pub trait MetricsSink {
    fn log_metrics(&mut self, metrics: &MetricRecord, step: Option<usize>);

    /// Publishes the artifacts written under `dir`.
    fn log_artifacts(&mut self, _dir: &Path) {}
}

/// Drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn log_metrics(&mut self, _metrics: &MetricRecord, _step: Option<usize>) {}
}

/// Emits every metric as a `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn log_metrics(&mut self, metrics: &MetricRecord, step: Option<usize>) {
        for (name, value) in metrics {
            match step {
                Some(step) => info!(step, "{name}: {value:.6}"),
                None => info!("{name}: {value:.6}"),
            }
        }
    }

    fn log_artifacts(&mut self, dir: &Path) {
        info!("Artifacts available at {:?}", dir);
    }
}

/// Keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub metrics: Vec<(Option<usize>, MetricRecord)>,
    pub artifacts: Vec<PathBuf>,
}

impl RecordingSink {
    /// Last value logged for `name`.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .rev()
            .find_map(|(_, metrics)| metrics.get(name).copied())
    }
}

impl MetricsSink for RecordingSink {
    fn log_metrics(&mut self, metrics: &MetricRecord, step: Option<usize>) {
        self.metrics.push((step, metrics.clone()));
    }

    fn log_artifacts(&mut self, dir: &Path) {
        self.artifacts.push(dir.to_path_buf());
    }
}
