//! Scoring predicted lineages against a truth set.

pub mod metrics;

pub use metrics::{evaluate, rank_metrics, RankMetrics};
