use tracing::debug;

use super::engine::{Batch, CascadeEngine, CascadeError};
use super::routing::routable;
use crate::core::prediction::{PredictionMatrix, RankCell};
use crate::core::types::Rank;

impl CascadeEngine<'_> {
    /// Classifier per parent node, cascading phylum to species.
    ///
    /// Every rank below phylum starts as not reached; only reads routed to a
    /// classifier get a call (or a missing cell) there.
    pub(super) fn run_lcpn(&self, batch: &Batch<'_>) -> Result<PredictionMatrix, CascadeError> {
        let mut matrix = batch.matrix();
        for rank in Rank::top_down().skip(1) {
            matrix.fill_column(rank, &RankCell::NotReached);
        }

        let Some(root) = self.classifier(Rank::Phylum.as_str()) else {
            return Ok(matrix);
        };
        let entries = self.predict_bucket(&root, &batch.indexes, batch);
        let mut prior = routable(&entries);
        matrix.merge_column(Rank::Phylum, entries)?;

        for rank in Rank::top_down().skip(1) {
            if prior.is_empty() {
                debug!(%rank, "No reads left to route");
                break;
            }
            prior = self.cascade_step(&mut matrix, batch, rank, prior)?;
        }

        Ok(matrix)
    }
}
