//! Assembly of train, validation and test sample tables from per-trajectory
//! CSV files, with k-fold splitting, stride decimation and cached batches.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

mod assembler;
pub use assembler::{AssemblerParams, DatasetAssembler};

mod config;
pub use config::{DatasetConfig, ExperimentConfig};

mod generator;
pub use generator::{Batch, BatchGenerator};

mod split;
pub use split::{SplitParams, ValidationSplit};

mod table;
pub use table::{assemble, read_trajectory_table, DataTable, TrajectorySample};

/// Role of a table in an experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    Train,
    Val,
    Test,
}

impl Subset {
    pub const ALL: [Subset; 3] = [Subset::Train, Subset::Val, Subset::Test];

    pub fn name(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
            Subset::Test => "test",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
