//! Evaluation of camera odometry estimators.
//!
//! Relative pose predictions are composed into global trajectories
//! ([`trajectory_builder`]), compared against the ground truth ([`metrics`]) and
//! aggregated over trajectories and runs. Samples come from per-trajectory CSV
//! tables assembled with deterministic k-fold splits ([`io::dataset`]), with
//! decoded inputs memoized in a shared [`cache::SampleCache`].

pub mod cache;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod metrics;
pub mod trajectory;
pub mod trajectory_builder;
pub mod transform;

pub use error::{EvalError, Result};

#[cfg(test)]
mod unit_test;
