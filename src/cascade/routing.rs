use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::engine::{Batch, CascadeEngine, CascadeError};
use crate::core::prediction::{PredictionMatrix, RankCell, RoutedPrediction, RoutedRead};
use crate::core::types::Rank;

/// Group reads by routing label. Buckets are visited in label order and keep
/// the reads' relative order.
#[must_use]
pub fn group_by_label(routed: Vec<RoutedRead>) -> BTreeMap<String, Vec<usize>> {
    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for read in routed {
        buckets.entry(read.label).or_default().push(read.index);
    }
    buckets
}

/// Stable sort on original index
pub fn restore_order(routed: &mut [RoutedRead]) {
    routed.sort_by_key(|read| read.index);
}

/// A node with a single child in the hierarchy should have a one-vs-rest
/// classifier, a node with several a multiclass one. Nodes the hierarchy does
/// not know have nothing to disagree with.
#[must_use]
pub fn shape_mismatch(children: usize, binary: bool) -> bool {
    children > 0 && (children == 1) != binary
}

/// Reads whose call can route them to a finer classifier
#[must_use]
pub fn routable(entries: &[RoutedPrediction]) -> Vec<RoutedRead> {
    let mut routed: Vec<RoutedRead> = entries
        .iter()
        .filter_map(|entry| {
            entry.cell.routable_label().map(|label| RoutedRead {
                label: label.to_string(),
                index: entry.index,
            })
        })
        .collect();
    restore_order(&mut routed);
    routed
}

/// Routing records taken from one matrix column
#[must_use]
pub fn routable_column(matrix: &PredictionMatrix, rank: Rank) -> Vec<RoutedRead> {
    matrix
        .rows()
        .iter()
        .filter_map(|row| {
            row.cell(rank).routable_label().map(|label| RoutedRead {
                label: label.to_string(),
                index: row.index,
            })
        })
        .collect()
}

impl CascadeEngine<'_> {
    /// One cascade level: route each read to the classifier named by its prior
    /// call, write the `rank` column, and return the reads that may continue.
    ///
    /// Reads whose bucket has no classifier become missing at `rank`. Reads not
    /// in `prior` keep whatever `rank` already holds.
    pub(super) fn cascade_step(
        &self,
        matrix: &mut PredictionMatrix,
        batch: &Batch<'_>,
        rank: Rank,
        prior: Vec<RoutedRead>,
    ) -> Result<Vec<RoutedRead>, CascadeError> {
        let parent_rank = rank.coarser().unwrap_or(rank);
        let mut entries: Vec<RoutedPrediction> = Vec::with_capacity(prior.len());

        for (label, indexes) in group_by_label(prior) {
            let Some(handle) = self.classifier(&label) else {
                entries.extend(
                    indexes
                        .into_iter()
                        .map(|index| RoutedPrediction::new(index, RankCell::Missing)),
                );
                continue;
            };

            let children = self.hierarchy.children(parent_rank, &label).len();
            let binary = handle.is_binary();
            if shape_mismatch(children, binary) {
                warn!(
                    %rank,
                    parent = %label,
                    children,
                    binary,
                    "Classifier shape does not match the hierarchy"
                );
            }
            debug!(%rank, parent = %label, reads = indexes.len(), binary, "Routing bucket");

            entries.extend(self.predict_bucket(&handle, &indexes, batch));
        }

        let next = routable(&entries);
        matrix.merge_column(rank, entries)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed(label: &str, index: usize) -> RoutedRead {
        RoutedRead {
            label: label.to_string(),
            index,
        }
    }

    #[test]
    fn test_group_by_label() {
        let buckets = group_by_label(vec![
            routed("b", 0),
            routed("a", 1),
            routed("b", 2),
            routed("a", 3),
        ]);

        let keys: Vec<&str> = buckets.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(buckets["a"], vec![1, 3]);
        assert_eq!(buckets["b"], vec![0, 2]);
    }

    #[test]
    fn test_restore_order_is_stable() {
        let mut reads = vec![routed("x", 2), routed("y", 0), routed("z", 1)];
        restore_order(&mut reads);

        let indexes: Vec<usize> = reads.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(reads[0].label, "y");
    }

    #[test]
    fn test_routable_drops_sentinels() {
        let entries = vec![
            RoutedPrediction::new(3, RankCell::call("Bacilli", 0.9)),
            RoutedPrediction::new(0, RankCell::call("different", 0.8)),
            RoutedPrediction::new(1, RankCell::Missing),
            RoutedPrediction::new(2, RankCell::call("Clostridia", 0.4)),
        ];

        assert_eq!(
            routable(&entries),
            vec![routed("Clostridia", 2), routed("Bacilli", 3)]
        );
    }

    #[test]
    fn test_shape_mismatch() {
        // One child: binary expected
        assert!(!shape_mismatch(1, true));
        assert!(shape_mismatch(1, false));
        // Several children: multiclass expected
        assert!(!shape_mismatch(3, false));
        assert!(shape_mismatch(3, true));
        // Unknown node
        assert!(!shape_mismatch(0, true));
        assert!(!shape_mismatch(0, false));
    }
}
