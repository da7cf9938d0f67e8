mod datasets;
pub(crate) use datasets::{sample_dataset, CountingDecoder, SampleDataset};
