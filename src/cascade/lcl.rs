use super::engine::{Batch, CascadeEngine, CascadeError};
use crate::core::prediction::PredictionMatrix;
use crate::core::types::Rank;

impl CascadeEngine<'_> {
    /// Independent classifier per rank, keyed by rank name
    pub(super) fn run_lcl(&self, batch: &Batch<'_>) -> Result<PredictionMatrix, CascadeError> {
        let mut matrix = batch.matrix();
        let ranks: Vec<Rank> = Rank::top_down().collect();
        self.predict_ranks(&mut matrix, batch, &ranks)?;
        Ok(matrix)
    }
}
