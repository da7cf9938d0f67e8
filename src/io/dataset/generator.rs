use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::DataTable;
use crate::{cache::Decoder, cache::SampleCache, error::Result, transform::RelativePose};

/// Materialized batch of samples.
#[derive(Clone, Debug)]
pub struct Batch<A> {
    /// Table indices of the rows, in batch order.
    pub indices: Vec<usize>,
    /// One vector per input column, each holding one artifact per row.
    pub inputs: Vec<Vec<Arc<A>>>,
    pub labels: Vec<RelativePose>,
}

impl<A> Batch<A> {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Splits a table into batches whose inputs are decoded through the shared cache.
pub struct BatchGenerator<D: Decoder> {
    table: DataTable,
    dataset_root: PathBuf,
    decoder: Arc<D>,
    cache: Option<Arc<SampleCache<D::Artifact>>>,
    batch_size: usize,
    order: Vec<usize>,
}

impl<D: Decoder> BatchGenerator<D> {
    /// Generator visiting the rows in table order.
    pub fn new(
        table: DataTable,
        dataset_root: &Path,
        decoder: Arc<D>,
        cache: Option<Arc<SampleCache<D::Artifact>>>,
        batch_size: usize,
    ) -> Self {
        let order = (0..table.len()).collect();
        Self {
            table,
            dataset_root: dataset_root.to_path_buf(),
            decoder,
            cache,
            batch_size: batch_size.max(1),
            order,
        }
    }

    /// Visits the rows in a random order fixed by `seed`.
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self
    }

    pub fn table(&self) -> &DataTable {
        &self.table
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        (self.order.len() + self.batch_size - 1) / self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every distinct decode key referenced by the table.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.table
            .iter()
            .flat_map(|row| row.inputs.iter().map(String::as_str))
    }

    fn load(&self, key: &str) -> Result<Arc<D::Artifact>> {
        let decode = |key: &str| self.decoder.decode(&self.dataset_root.join(key));
        match &self.cache {
            Some(cache) => cache.get_or_decode(key, decode),
            None => Ok(Arc::new(decode(key)?)),
        }
    }

    /// Batch number `index`, the last one holding the remainder.
    pub fn get(&self, index: usize) -> Result<Batch<D::Artifact>> {
        let start = (index * self.batch_size).min(self.order.len());
        let end = (start + self.batch_size).min(self.order.len());
        let rows = self.table.rows();

        let mut batch = Batch {
            indices: Vec::with_capacity(end - start),
            inputs: vec![Vec::with_capacity(end - start); self.table.input_columns().len()],
            labels: Vec::with_capacity(end - start),
        };

        for &position in &self.order[start..end] {
            let row = &rows[position];
            for (column, key) in batch.inputs.iter_mut().zip(row.inputs.iter()) {
                column.push(self.load(key)?);
            }
            batch.indices.push(row.index);
            batch.labels.push(row.label);
        }
        Ok(batch)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Batch<D::Artifact>>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }

    /// Decodes every input of the table into the cache.
    pub fn warm_up(&self) -> Result<()> {
        for key in self.keys() {
            self.load(key)?;
        }
        Ok(())
    }
}
