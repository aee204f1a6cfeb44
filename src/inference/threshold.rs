use serde::Serialize;
use tracing::warn;

use crate::core::lineage::Lineage;
use crate::core::prediction::{MatrixRow, PredictionMatrix, RankCell};
use crate::core::types::{is_control_label, Rank, UNCLASSIFIED};
use crate::taxonomy::TaxonomyHierarchy;

/// Default confidence threshold
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// The label a read ends up with after the threshold scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalCall {
    pub index: usize,
    /// Rank of the accepted call, `None` when unclassified
    pub rank: Option<Rank>,
    pub label: String,
    pub score: Option<f64>,
}

impl FinalCall {
    fn unclassified(index: usize) -> Self {
        Self {
            index,
            rank: None,
            label: UNCLASSIFIED.to_string(),
            score: None,
        }
    }

    #[must_use]
    pub fn is_classified(&self) -> bool {
        self.rank.is_some()
    }

    /// Expand to a full lineage through the hierarchy
    #[must_use]
    pub fn lineage(&self, hierarchy: &TaxonomyHierarchy) -> Lineage {
        match self.rank {
            Some(rank) => hierarchy.expand(rank, &self.label),
            None => Lineage::unclassified(),
        }
    }
}

/// Picks, per read, the most specific call that clears the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdEvaluator {
    threshold: f64,
}

impl Default for ThresholdEvaluator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ThresholdEvaluator {
    /// Threshold is clamped into [0, 1]; NaN falls back to the default
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        if threshold.is_nan() {
            warn!("Threshold is NaN, using {DEFAULT_THRESHOLD}");
            return Self::default();
        }
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Scan species to phylum; the first call with a real label scoring at
    /// least the threshold wins. Not reached and missing cells are skipped.
    #[must_use]
    pub fn evaluate_row(&self, row: &MatrixRow) -> FinalCall {
        row.cells()
            .find_map(|(rank, cell)| match cell {
                RankCell::Call(call)
                    if !is_control_label(&call.label) && call.score >= self.threshold =>
                {
                    Some(FinalCall {
                        index: row.index,
                        rank: Some(rank),
                        label: call.label.clone(),
                        score: Some(call.score),
                    })
                }
                _ => None,
            })
            .unwrap_or_else(|| FinalCall::unclassified(row.index))
    }

    /// One final call per read, ascending by index
    #[must_use]
    pub fn evaluate(&self, matrix: &PredictionMatrix) -> Vec<FinalCall> {
        matrix
            .rows()
            .iter()
            .map(|row| self.evaluate_row(row))
            .collect()
    }
}
