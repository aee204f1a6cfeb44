//! Turning a prediction matrix into final per-read calls.
//!
//! - [`ThresholdEvaluator`]: bottom-up confidence scan, one label per read
//! - [`EnsembleCombiner`]: merges specialized species calls with a coarse
//!   classifier's lineage, and falls back between two coarse classifiers

pub mod ensemble;
pub mod threshold;

pub use ensemble::{EnsembleCombiner, EnsembleRule};
pub use threshold::{FinalCall, ThresholdEvaluator, DEFAULT_THRESHOLD};
