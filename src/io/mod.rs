pub mod dataset;

mod predictions;
pub use predictions::{read_predictions, write_predictions, CONFIDENCE_SUFFIX};
