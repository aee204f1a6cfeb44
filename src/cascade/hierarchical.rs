use rayon::prelude::*;
use tracing::debug;

use super::engine::{Batch, CascadeEngine, CascadeError};
use crate::core::prediction::{PredictionCell, PredictionMatrix, RankCell, RoutedPrediction};
use crate::core::types::{is_control_label, Rank, RANK_COUNT};
use crate::registry::classifier::{compare_cells, sort_distribution};
use crate::registry::ClassifierHandle;

/// Rescale scores to sum to one, best first.
///
/// Returns an empty list when there is nothing to rescale or the scores sum
/// to zero.
#[must_use]
pub fn renormalize(cells: Vec<PredictionCell>) -> Vec<PredictionCell> {
    let sum: f64 = cells.iter().map(|cell| cell.score).sum();
    if sum <= 0.0 || !sum.is_finite() {
        return Vec::new();
    }
    let mut cells: Vec<PredictionCell> = cells
        .into_iter()
        .map(|cell| PredictionCell::new(cell.label, cell.score / sum))
        .collect();
    sort_distribution(&mut cells);
    cells
}

impl CascadeEngine<'_> {
    /// Full distributions at every rank, each restricted to descendants of the
    /// arg-max one rank up and renormalized
    pub(super) fn run_hierarchical(
        &self,
        batch: &Batch<'_>,
    ) -> Result<PredictionMatrix, CascadeError> {
        let handles: Vec<(Rank, Option<ClassifierHandle>)> = Rank::top_down()
            .map(|rank| (rank, self.classifier(rank.as_str())))
            .collect();

        let rows: Vec<(usize, [RankCell; RANK_COUNT])> = batch
            .indexes
            .par_iter()
            .map(|&index| {
                let sequence = batch.sequences.get(&index).copied();
                (index, self.constrained_row(sequence, &handles))
            })
            .collect();

        let mut matrix = batch.matrix();
        for rank in Rank::ALL {
            let entries = rows
                .iter()
                .map(|(index, cells)| RoutedPrediction::new(*index, cells[rank.index()].clone()))
                .collect();
            matrix.merge_column(rank, entries)?;
        }
        Ok(matrix)
    }

    /// Walk phylum to species for one read, stopping at the first rank
    /// without a call
    fn constrained_row(
        &self,
        sequence: Option<&str>,
        handles: &[(Rank, Option<ClassifierHandle>)],
    ) -> [RankCell; RANK_COUNT] {
        let mut cells: [RankCell; RANK_COUNT] = std::array::from_fn(|_| RankCell::NotReached);
        let mut parent: Option<(Rank, String)> = None;

        for (rank, handle) in handles {
            let cell = self.constrained_call(*rank, handle.as_ref(), sequence, parent.as_ref());
            let next = cell.routable_label().map(|label| (*rank, label.to_string()));
            cells[rank.index()] = cell;
            match next {
                Some(call) => parent = Some(call),
                None => break,
            }
        }
        cells
    }

    fn constrained_call(
        &self,
        rank: Rank,
        handle: Option<&ClassifierHandle>,
        sequence: Option<&str>,
        parent: Option<&(Rank, String)>,
    ) -> RankCell {
        let (Some(handle), Some(sequence)) = (handle, sequence) else {
            return RankCell::Missing;
        };
        let distribution = match handle.predict_distribution(sequence) {
            Ok(distribution) => distribution,
            Err(err) => {
                debug!(%rank, error = %err, "Distribution failed");
                return RankCell::Missing;
            }
        };

        let best = match parent {
            None => distribution
                .into_iter()
                .filter(|cell| !is_control_label(&cell.label))
                .min_by(compare_cells),
            Some((parent_rank, parent_label)) => {
                let candidates: Vec<PredictionCell> = distribution
                    .into_iter()
                    .filter(|cell| {
                        self.hierarchy
                            .is_descendant(*parent_rank, parent_label, rank, &cell.label)
                    })
                    .collect();
                renormalize(candidates).into_iter().next()
            }
        };

        best.map_or(RankCell::Missing, RankCell::Call)
    }
}
