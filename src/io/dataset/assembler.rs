use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_derive::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    assemble, BatchGenerator, DataTable, ExperimentConfig, SplitParams, Subset, ValidationSplit,
};
use crate::{
    cache::{Decoder, ImageDecoder, SampleCache},
    error::{EvalError, Result},
};

/// Parameters of a [`DatasetAssembler`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerParams {
    pub dataset_root: PathBuf,
    /// Name of the per-trajectory table file.
    pub csv_name: String,
    /// Columns holding input paths, relative to the trajectory directory.
    pub input_columns: Vec<String>,
    pub train_trajectories: Vec<String>,
    pub test_trajectories: Option<Vec<String>>,
    pub split: SplitParams,
    pub train_sampling_step: usize,
    pub val_sampling_step: usize,
    pub test_sampling_step: usize,
    pub batch_size: usize,
    /// Seed of the train batch shuffle.
    pub seed: u64,
    /// Persisted cache loaded at construction, an empty cache if unreadable.
    pub cache_file: Option<PathBuf>,
}

impl Default for AssemblerParams {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::new(),
            csv_name: "df.csv".to_string(),
            input_columns: vec!["path_to_rgb".to_string(), "path_to_rgb_next".to_string()],
            train_trajectories: Vec::new(),
            test_trajectories: None,
            split: SplitParams::default(),
            train_sampling_step: 1,
            val_sampling_step: 1,
            test_sampling_step: 1,
            batch_size: 128,
            seed: 42,
            cache_file: None,
        }
    }
}

fn to_strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl AssemblerParams {
    pub fn new<P: AsRef<Path>>(dataset_root: P) -> Self {
        Self {
            dataset_root: dataset_root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Trajectory lists of a known dataset configuration.
    pub fn from_experiment<P: AsRef<Path>>(dataset_root: P, config: &ExperimentConfig) -> Self {
        let mut params = Self::new(dataset_root).with_train_trajectories(config.train_trajectories.clone());
        params.split = SplitParams::default().with_val_trajectories(config.val_trajectories.clone());
        params.test_trajectories = config.test_trajectories.clone();
        params
    }

    pub fn with_csv_name<S: Into<String>>(mut self, csv_name: S) -> Self {
        self.csv_name = csv_name.into();
        self
    }

    pub fn with_input_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_columns = to_strings(columns);
        self
    }

    pub fn with_train_trajectories<I, S>(mut self, trajectories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.train_trajectories = to_strings(trajectories);
        self
    }

    pub fn with_test_trajectories<I, S>(mut self, trajectories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_trajectories = Some(to_strings(trajectories));
        self
    }

    pub fn with_split(mut self, split: SplitParams) -> Self {
        self.split = split;
        self
    }

    pub fn with_sampling_steps(mut self, train: usize, val: usize, test: usize) -> Self {
        self.train_sampling_step = train;
        self.val_sampling_step = val;
        self.test_sampling_step = test;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cache_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.cache_file = Some(path.as_ref().to_path_buf());
        self
    }
}

/// Builds the train, validation and test tables of an experiment and hands out
/// batch generators that share a single [`SampleCache`].
///
/// The validation split is applied first, then each subset is decimated by its
/// sampling step. The cache is fixed at construction: either shared by the
/// caller or loaded from `cache_file`.
pub struct DatasetAssembler<D: Decoder = ImageDecoder> {
    params: AssemblerParams,
    split: ValidationSplit,
    train: DataTable,
    val: DataTable,
    test: Option<DataTable>,
    decoder: Arc<D>,
    cache: Option<Arc<SampleCache<D::Artifact>>>,
}

impl DatasetAssembler<ImageDecoder> {
    /// Assembler decoding image inputs.
    pub fn new(params: AssemblerParams) -> Result<Self> {
        Self::with_decoder(params, ImageDecoder::default())
    }

    /// Assembler decoding image inputs at the target size of `config`.
    ///
    /// `params` usually comes from [`AssemblerParams::from_experiment`].
    pub fn from_experiment(params: AssemblerParams, config: &ExperimentConfig) -> Result<Self> {
        Self::with_decoder(params, ImageDecoder::with_target_size(config.target_size))
    }
}

impl<D: Decoder> DatasetAssembler<D> {
    /// Assembler caching decoded inputs in `params.cache_file`, when set.
    pub fn with_decoder(params: AssemblerParams, decoder: D) -> Result<Self> {
        let cache = params
            .cache_file
            .as_ref()
            .map(|path| Arc::new(SampleCache::from_path(path)));
        Self::build(params, decoder, cache)
    }

    /// Assembler sharing `cache` with its other owners. `params.cache_file` is
    /// not read.
    pub fn with_shared_cache(
        params: AssemblerParams,
        decoder: D,
        cache: Arc<SampleCache<D::Artifact>>,
    ) -> Result<Self> {
        Self::build(params, decoder, Some(cache))
    }

    fn build(
        params: AssemblerParams,
        decoder: D,
        cache: Option<Arc<SampleCache<D::Artifact>>>,
    ) -> Result<Self> {
        let split = params.split.resolve()?;
        if params.batch_size == 0 {
            return Err(EvalError::invalid_parameter("Batch size must be positive"));
        }
        if split.is_self_validation() && params.train_trajectories.is_empty() {
            return Err(EvalError::invalid_parameter(
                "Validation on train trajectories requires train trajectories",
            ));
        }

        let load = |trajectories: &[String]| {
            assemble(
                &params.dataset_root,
                trajectories,
                &params.csv_name,
                &params.input_columns,
            )
        };

        let mut train = if params.train_trajectories.is_empty() {
            DataTable::new(params.input_columns.clone(), Vec::new())
        } else {
            load(&params.train_trajectories)?
        };

        let val = match &split {
            ValidationSplit::Trajectories(trajectories) => load(trajectories)?,
            _ => {
                let window = split.fold_window(train.len())?;
                info!(
                    "fold #{}: validate on samples {} -- {} (out of {})",
                    split.fold_index().unwrap_or_default(),
                    window.start,
                    window.end,
                    train.len()
                );
                if window.is_empty() {
                    warn!("Validation window is empty for a table of {} samples", train.len());
                }

                let val = train.slice(window.clone());
                train = DataTable::concat([train.slice(0..window.start), train.slice(window.end..train.len())]);
                val
            }
        };

        let train = train.sample_every(params.train_sampling_step)?;
        let val = val.sample_every(params.val_sampling_step)?;
        let test = match &params.test_trajectories {
            Some(trajectories) if !trajectories.is_empty() => {
                Some(load(trajectories)?.sample_every(params.test_sampling_step)?)
            }
            _ => None,
        };

        info!(
            "Assembled {} train, {} validation and {} test samples",
            train.len(),
            val.len(),
            test.as_ref().map_or(0, DataTable::len)
        );

        Ok(Self {
            params,
            split,
            train,
            val,
            test,
            decoder: Arc::new(decoder),
            cache,
        })
    }

    pub fn params(&self) -> &AssemblerParams {
        &self.params
    }

    pub fn split(&self) -> &ValidationSplit {
        &self.split
    }

    pub fn cache(&self) -> Option<&Arc<SampleCache<D::Artifact>>> {
        self.cache.as_ref()
    }

    pub fn train(&self) -> &DataTable {
        &self.train
    }

    pub fn val(&self) -> &DataTable {
        &self.val
    }

    pub fn test(&self) -> Option<&DataTable> {
        self.test.as_ref()
    }

    pub fn subset(&self, subset: Subset) -> Option<&DataTable> {
        match subset {
            Subset::Train => Some(&self.train),
            Subset::Val => Some(&self.val),
            Subset::Test => self.test.as_ref(),
        }
    }

    fn make_generator(&self, table: DataTable) -> BatchGenerator<D> {
        BatchGenerator::new(
            table,
            &self.params.dataset_root,
            self.decoder.clone(),
            self.cache.clone(),
            self.params.batch_size,
        )
    }

    /// Shuffled generator over the train subset.
    pub fn train_generator(&self) -> BatchGenerator<D> {
        self.make_generator(self.train.clone())
            .shuffled(self.params.seed)
    }

    /// Generator visiting `subset` in table order.
    pub fn generator(&self, subset: Subset) -> Result<BatchGenerator<D>> {
        let table = self.subset(subset).ok_or_else(|| {
            EvalError::invalid_parameter(format!("No {subset} trajectories were configured"))
        })?;
        Ok(self.make_generator(table.clone()))
    }

    /// One ordered generator per trajectory of `subset`, in order of first appearance.
    pub fn trajectory_generators(&self, subset: Subset) -> Result<Vec<(String, BatchGenerator<D>)>> {
        let table = self.subset(subset).ok_or_else(|| {
            EvalError::invalid_parameter(format!("No {subset} trajectories were configured"))
        })?;
        Ok(table
            .by_trajectory()
            .into_iter()
            .map(|(trajectory_id, table)| (trajectory_id, self.make_generator(table)))
            .collect())
    }

    /// Decodes every input of every subset into the shared cache.
    pub fn warm_up_cache(&self) -> Result<()> {
        let cache = self
            .cache
            .as_ref()
            .ok_or_else(|| EvalError::invalid_parameter("No cache to warm up"))?;

        for subset in Subset::ALL {
            if let Ok(generator) = self.generator(subset) {
                info!("Warming up the cache with {} {subset} samples", generator.table().len());
                generator.warm_up()?;
            }
        }
        info!("Cache holds {} samples", cache.len());
        Ok(())
    }

    pub fn dump_cache<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.dump(path),
            None => Err(EvalError::invalid_parameter("No cache to dump")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit_test::{sample_dataset, CountingDecoder, SampleDataset};
    use rstest::rstest;

    #[rstest]
    fn test_disjoint_validation(sample_dataset: SampleDataset) {
        let params = AssemblerParams::new(sample_dataset.root())
            .with_train_trajectories(["seq_a"])
            .with_split(SplitParams::default().with_val_trajectories(["seq_b"]));
        let assembler = DatasetAssembler::with_decoder(params, CountingDecoder::default()).unwrap();

        assert_eq!(assembler.train().len(), 4);
        assert_eq!(assembler.val().len(), 6);
        assert_eq!(assembler.val().trajectory_ids(), vec!["seq_b"]);
        assert!(assembler.test().is_none());
        assert!(assembler.generator(Subset::Test).is_err());
    }

    #[rstest]
    fn test_fold_split(sample_dataset: SampleDataset) {
        let params = sample_dataset.params().with_split(SplitParams::default().with_folds(3, 1));
        let assembler = DatasetAssembler::with_decoder(params, CountingDecoder::default()).unwrap();

        assert_eq!(assembler.val().indices(), vec![4, 5, 6, 7]);
        assert_eq!(assembler.train().indices(), vec![0, 1, 2, 3, 8, 9]);
    }

    #[rstest]
    fn test_stride_after_split(sample_dataset: SampleDataset) {
        let params = sample_dataset
            .params()
            .with_split(SplitParams::default().with_val_ratio(0.5, 0))
            .with_sampling_steps(2, 3, 1);
        let assembler = DatasetAssembler::with_decoder(params, CountingDecoder::default()).unwrap();

        assert_eq!(assembler.val().indices(), vec![0, 3]);
        assert_eq!(assembler.train().indices(), vec![5, 7, 9]);
    }

    #[rstest]
    fn test_unknown_trajectory_is_fatal(sample_dataset: SampleDataset) {
        let params = sample_dataset
            .params()
            .with_split(SplitParams::default().with_val_trajectories(["missing"]));
        let result = DatasetAssembler::with_decoder(params, CountingDecoder::default());
        assert!(matches!(result, Err(err) if err.is_configuration()));
    }

    #[rstest]
    fn test_trajectory_generators(sample_dataset: SampleDataset) {
        let params = sample_dataset
            .params()
            .with_split(SplitParams::default().with_val_trajectories(["seq_b", "seq_a"]));
        let assembler = DatasetAssembler::with_decoder(params, CountingDecoder::default()).unwrap();

        let generators = assembler.trajectory_generators(Subset::Val).unwrap();
        assert_eq!(generators.len(), 2);
        assert_eq!(generators[0].0, "seq_b");
        assert_eq!(generators[0].1.len(), 2);
        assert_eq!(generators[1].1.table().len(), 4);
    }

    #[rstest]
    fn test_shared_cache_across_generators(sample_dataset: SampleDataset) {
        let params = sample_dataset
            .params()
            .with_split(SplitParams::default().with_folds(2, 0));
        let cache = Arc::new(SampleCache::new());
        let assembler =
            DatasetAssembler::with_shared_cache(params, CountingDecoder::default(), cache.clone()).unwrap();

        assembler.warm_up_cache().unwrap();
        // 5 frames in seq_a and 7 in seq_b.
        assert_eq!(cache.len(), 12);
        assert!(Arc::ptr_eq(assembler.cache().unwrap(), &cache));

        let generator = assembler.train_generator();
        generator.get(0).unwrap();
        assert_eq!(assembler.decoder.calls(), 12);
    }

    #[rstest]
    fn test_image_cache_roundtrip(sample_dataset: SampleDataset) {
        let cache_path = sample_dataset.root().join("cache.json");
        let params = sample_dataset
            .params()
            .with_train_trajectories(["seq_a"])
            .with_split(SplitParams::default().with_val_ratio(0.5, 1))
            .with_cache_file(&cache_path);

        let assembler = DatasetAssembler::new(params.clone()).unwrap();
        assert!(assembler.cache().unwrap().is_empty());

        let batch = assembler.generator(Subset::Val).unwrap().get(0).unwrap();
        assert_eq!(batch.inputs[0][0].shape(), &[3, 3, 4]);
        assembler.dump_cache(&cache_path).unwrap();

        let restored = DatasetAssembler::new(params).unwrap();
        let cache = restored.cache().unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(*cache.get("seq_a/rgb/2.png").unwrap(), *batch.inputs[0][0]);
    }

    #[rstest]
    fn test_from_experiment(sample_dataset: SampleDataset) {
        let config = ExperimentConfig {
            train_trajectories: vec!["seq_a".to_string()],
            val_trajectories: vec!["seq_b".to_string()],
            test_trajectories: None,
            exp_name: "sample".to_string(),
            target_size: (2, 2),
            rpe_indices: crate::metrics::RpeIndices::Full,
        };
        let params = AssemblerParams::from_experiment(sample_dataset.root(), &config)
            .with_input_columns(sample_dataset.input_columns.clone());
        let assembler = DatasetAssembler::from_experiment(params, &config).unwrap();

        assert_eq!(assembler.val().trajectory_ids(), vec!["seq_b"]);
        let batch = assembler.generator(Subset::Train).unwrap().get(0).unwrap();
        assert_eq!(batch.inputs[0][0].shape(), &[3, 2, 2]);
    }

    #[test]
    fn test_deserialize_params() {
        let params: AssemblerParams = serde_json::from_str(
            r#"{
                "dataset_root": "/data/zju",
                "train_trajectories": ["A0", "A3"],
                "split": {"val_trajectories": ["A1"]},
                "batch_size": 64
            }"#,
        )
        .unwrap();
        assert_eq!(params.csv_name, "df.csv");
        assert_eq!(params.batch_size, 64);
        assert_eq!(params.seed, 42);
        assert!(params.cache_file.is_none());
        assert_eq!(params.split.resolve().unwrap(), ValidationSplit::Trajectories(vec!["A1".to_string()]));
    }
}
