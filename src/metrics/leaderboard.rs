//! Averaging of repeated runs ("bundles") into a single leaderboard entry.
//!
//! A run named `{bundle}_b_{n}` belongs to `bundle`. Only runs flagged
//! `successfully_finished` are averaged, and the result is published as
//! `{bundle}_avg`.

use std::collections::BTreeSet;

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{MetricAggregator, MetricRecord};
use crate::error::{EvalError, Result};

pub const SUCCESS_FLAG: &str = "successfully_finished";
const AVG_SUFFIX: &str = "_avg";

/// Metrics and identity of one finished or unfinished run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_name: String,
    pub model_name: Option<String>,
    pub metrics: MetricRecord,
}

impl RunRecord {
    pub fn is_finished(&self) -> bool {
        self.metrics.get(SUCCESS_FLAG).map_or(false, |flag| *flag != 0.0)
    }
}

/// Aggregate of a bundle of runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AveragedRun {
    pub run_name: String,
    pub model_name: String,
    pub num_of_runs: usize,
    pub metrics: MetricRecord,
}

/// Bundle a run belongs to: `"name_b_3"` gives `Some("name")`.
pub fn bundle_name(run_name: &str) -> Option<String> {
    let parts = run_name.split('_').collect::<Vec<&str>>();
    if parts.len() < 2 || parts[parts.len() - 2] != "b" {
        return None;
    }
    Some(parts[..parts.len() - 2].join("_"))
}

/// Averages bundles of runs with mean and std statistics.
#[derive(Clone, Debug)]
pub struct MetricAverager {
    aggregator: MetricAggregator,
}

impl Default for MetricAverager {
    fn default() -> Self {
        Self {
            aggregator: MetricAggregator::default()
                .with_ignore([SUCCESS_FLAG])
                .with_save_once(["num_of_parameters", "Number of parameters"]),
        }
    }
}

impl MetricAverager {
    pub fn new(aggregator: MetricAggregator) -> Self {
        Self { aggregator }
    }

    /// Distinct bundle names among `runs`.
    pub fn bundle_names(&self, runs: &[RunRecord]) -> BTreeSet<String> {
        runs.iter()
            .filter_map(|run| {
                let bundle = bundle_name(&run.run_name);
                if bundle.is_none() {
                    debug!("{} does not belong to any bundle", run.run_name);
                }
                bundle
            })
            .collect()
    }

    /// Averages the successfully finished runs of `bundle`.
    ///
    /// Fails with [`EvalError::NoData`] when the bundle has no finished run.
    pub fn average_bundle(&self, runs: &[RunRecord], bundle: &str) -> Result<AveragedRun> {
        let members = runs
            .iter()
            .filter(|run| bundle_name(&run.run_name).as_deref() == Some(bundle))
            .collect::<Vec<&RunRecord>>();

        let metrics = members
            .iter()
            .filter(|run| run.is_finished())
            .map(|run| run.metrics.clone())
            .collect::<Vec<MetricRecord>>();
        if metrics.is_empty() {
            return Err(EvalError::no_data(format!(
                "No successfully finished runs were found for {bundle}"
            )));
        }

        let model_name = members
            .iter()
            .find_map(|run| run.model_name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        let mut averaged = self.aggregator.mean(&metrics);
        averaged.extend(self.aggregator.std(&metrics));
        averaged.insert(SUCCESS_FLAG.to_string(), 1.0);

        Ok(AveragedRun {
            run_name: format!("{bundle}{AVG_SUFFIX}"),
            model_name,
            num_of_runs: metrics.len(),
            metrics: averaged,
        })
    }

    /// Averages every bundle that doesn't have an averaged run yet.
    pub fn average_all(&self, runs: &[RunRecord]) -> Result<Vec<AveragedRun>> {
        let run_names = runs
            .iter()
            .map(|run| run.run_name.as_str())
            .collect::<BTreeSet<&str>>();

        let averaged = self
            .bundle_names(runs)
            .into_iter()
            .filter(|bundle| !run_names.contains(format!("{bundle}{AVG_SUFFIX}").as_str()))
            .map(|bundle| self.average_bundle(runs, &bundle))
            .collect::<Result<Vec<AveragedRun>>>()?;
        info!("Averaged {} bundles", averaged.len());
        Ok(averaged)
    }
}
