use std::collections::HashMap;

use tracing::{debug, info};

use super::engine::{Batch, CascadeEngine, CascadeError};
use super::routing::group_by_label;
use crate::core::prediction::{RankCell, RoutedRead, SpeciesCall};
use crate::core::read::ReadRecord;
use crate::core::types::{is_absent, is_control_label, OTHER};

/// Score given to reads no species classifier can see, just under the
/// default minimum
pub const NO_CLASSIFIER_SCORE: f64 = 0.49;

impl CascadeEngine<'_> {
    /// Species calls for reads bucketed by a coarse classifier's genus call.
    ///
    /// `coarse_genus` maps read id to genus. Reads with no usable genus call, or
    /// whose genus has no classifier, get `NA` with [`NO_CLASSIFIER_SCORE`];
    /// calls below the engine's minimum score become `NA`. Output is ordered by
    /// read index.
    ///
    /// # Errors
    ///
    /// Returns `CascadeError::DuplicateRead` if two reads share an index.
    pub fn refine_species(
        &self,
        reads: &[ReadRecord],
        coarse_genus: &HashMap<String, String>,
    ) -> Result<Vec<SpeciesCall>, CascadeError> {
        let batch = Batch::new(reads)?;

        let prior: Vec<RoutedRead> = reads
            .iter()
            .map(|read| RoutedRead {
                label: coarse_genus
                    .get(&read.id)
                    .filter(|genus| !is_absent(genus) && genus.as_str() != OTHER)
                    .cloned()
                    .unwrap_or_default(),
                index: read.index,
            })
            .collect();

        let mut results: Vec<(usize, String, f64)> = self.install(|| {
            let mut results = Vec::with_capacity(prior.len());
            for (genus, indexes) in group_by_label(prior) {
                let handle = if genus.is_empty() {
                    None
                } else {
                    self.classifier(&genus)
                };
                let Some(handle) = handle else {
                    debug!(genus = %genus, reads = indexes.len(), "No species classifier for bucket");
                    results.extend(
                        indexes
                            .into_iter()
                            .map(|index| (index, String::new(), NO_CLASSIFIER_SCORE)),
                    );
                    continue;
                };

                for prediction in self.predict_bucket(&handle, &indexes, &batch) {
                    let (label, score) = match prediction.cell {
                        RankCell::Call(call)
                            if call.score >= self.min_score && !is_control_label(&call.label) =>
                        {
                            (call.label, call.score)
                        }
                        RankCell::Call(call) => (String::new(), call.score),
                        RankCell::NotReached | RankCell::Missing => (String::new(), 0.0),
                    };
                    results.push((prediction.index, label, score));
                }
            }
            results
        });
        results.sort_by_key(|(index, _, _)| *index);

        let ids: HashMap<usize, &str> = reads.iter().map(|r| (r.index, r.id.as_str())).collect();
        let calls: Vec<SpeciesCall> = results
            .into_iter()
            .map(|(index, species, score)| {
                let read_id = ids.get(&index).copied().unwrap_or_default();
                if species.is_empty() {
                    SpeciesCall::unavailable(read_id, score)
                } else {
                    SpeciesCall::new(read_id, species, score)
                }
            })
            .collect();

        let called = calls.iter().filter(|c| !is_absent(&c.species)).count();
        info!(reads = calls.len(), called, "Refined species calls");
        Ok(calls)
    }
}
