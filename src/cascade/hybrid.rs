use super::engine::{Batch, CascadeEngine, CascadeError};
use super::routing::routable_column;
use crate::core::prediction::{PredictionMatrix, RankCell};
use crate::core::types::Rank;

/// Ranks predicted independently before the cascade takes over
const INDEPENDENT_RANKS: [Rank; 4] = [Rank::Phylum, Rank::Class, Rank::Order, Rank::Family];

/// Ranks predicted by routing on the previous call
const CASCADED_RANKS: [Rank; 2] = [Rank::Genus, Rank::Species];

impl CascadeEngine<'_> {
    /// Rank classifiers down to family, then genus from each read's family
    /// call and species from its genus call
    pub(super) fn run_hybrid(&self, batch: &Batch<'_>) -> Result<PredictionMatrix, CascadeError> {
        let mut matrix = batch.matrix();
        self.predict_ranks(&mut matrix, batch, &INDEPENDENT_RANKS)?;

        for rank in CASCADED_RANKS {
            matrix.fill_column(rank, &RankCell::NotReached);
        }

        // Prior calls travel between stages as an explicit accumulator
        let mut prior = routable_column(&matrix, Rank::Family);
        for rank in CASCADED_RANKS {
            prior = self.cascade_step(&mut matrix, batch, rank, prior)?;
        }

        Ok(matrix)
    }
}
