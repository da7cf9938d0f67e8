use std::collections::{BTreeMap, BTreeSet};

use super::MetricRecord;

/// Collects the values of every metric name across `records`.
pub fn aggregate_metrics(records: &[MetricRecord]) -> BTreeMap<String, Vec<f64>> {
    let mut aggregated = BTreeMap::<String, Vec<f64>>::new();
    for record in records {
        for (key, value) in record {
            aggregated.entry(key.clone()).or_default().push(*value);
        }
    }
    aggregated
}

/// Applies `stat_fn` to every aggregated metric not in `ignore`, optionally suffixing the name.
pub fn calculate_stat<F>(
    aggregated: &BTreeMap<String, Vec<f64>>,
    stat_fn: F,
    ignore: &BTreeSet<String>,
    suffix: Option<&str>,
) -> MetricRecord
where
    F: Fn(&[f64]) -> f64,
{
    aggregated
        .iter()
        .filter(|(key, _)| !ignore.contains(*key))
        .map(|(key, values)| {
            let name = match suffix {
                Some(suffix) => format!("{key}_{suffix}"),
                None => key.clone(),
            };
            (name, stat_fn(values.as_slice()))
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    let mean = mean(values);
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Elementwise mean over per-trajectory records. No records give an empty record.
pub fn average_metrics(records: &[MetricRecord]) -> MetricRecord {
    MetricAggregator::default().mean(records)
}

/// Mean and standard deviation of metric records with excluded names.
#[derive(Clone, Debug, Default)]
pub struct MetricAggregator {
    /// Names left out of every statistic (e.g. completion flags).
    pub ignore: BTreeSet<String>,
    /// Names expected constant across records, left out of the deviation.
    pub save_once: BTreeSet<String>,
}

impl MetricAggregator {
    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_save_once<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.save_once = names.into_iter().map(Into::into).collect();
        self
    }

    /// Elementwise mean.
    pub fn mean(&self, records: &[MetricRecord]) -> MetricRecord {
        calculate_stat(&aggregate_metrics(records), mean, &self.ignore, None)
    }

    /// Elementwise population standard deviation, named `{metric}_std`.
    pub fn std(&self, records: &[MetricRecord]) -> MetricRecord {
        let ignore = self
            .ignore
            .union(&self.save_once)
            .cloned()
            .collect::<BTreeSet<String>>();
        calculate_stat(&aggregate_metrics(records), std_dev, &ignore, Some("std"))
    }
}
