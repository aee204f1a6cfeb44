use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::core::lineage::ReadLineage;
use crate::core::types::{is_absent, Rank, UNCLASSIFIED};
use crate::utils::validation::normalize_for_comparison;

#[inline]
fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Agreement between predicted and true lineages at one rank
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankMetrics {
    pub rank: Rank,
    /// Reads with a usable truth label
    pub reads: usize,
    /// Distinct true taxa
    pub taxa: usize,
    pub accuracy: f64,
    /// Macro averages over the true taxa
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Multiclass Matthews correlation coefficient
    pub mcc: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct TaxonCounts {
    true_positive: usize,
    actual: usize,
    predicted: usize,
}

/// Metrics at every rank, species first.
///
/// Predictions are matched to truth rows by read id; a read the predictions
/// never mention counts as `unclassified`. Truth rows whose label at a rank is
/// absent are left out of that rank.
#[must_use]
pub fn evaluate(truth: &[ReadLineage], predictions: &[ReadLineage]) -> Vec<RankMetrics> {
    let predicted: HashMap<&str, &ReadLineage> = predictions
        .iter()
        .map(|row| (row.read_id.as_str(), row))
        .collect();

    Rank::ALL
        .iter()
        .map(|&rank| {
            let pairs: Vec<(String, String)> = truth
                .iter()
                .filter(|row| !is_absent(row.lineage.get(rank)))
                .map(|row| {
                    let call = predicted
                        .get(row.read_id.as_str())
                        .map_or(UNCLASSIFIED, |p| p.lineage.get(rank));
                    (
                        normalize_for_comparison(row.lineage.get(rank), rank),
                        normalize_for_comparison(call, rank),
                    )
                })
                .collect();
            rank_metrics(rank, &pairs)
        })
        .collect()
}

/// Metrics for `(truth, prediction)` label pairs at one rank
#[must_use]
pub fn rank_metrics(rank: Rank, pairs: &[(String, String)]) -> RankMetrics {
    let mut counts: BTreeMap<&str, TaxonCounts> = BTreeMap::new();
    let mut correct = 0;

    for (actual, predicted) in pairs {
        counts.entry(actual.as_str()).or_default().actual += 1;
        counts.entry(predicted.as_str()).or_default().predicted += 1;
        if actual == predicted {
            correct += 1;
            counts.entry(actual.as_str()).or_default().true_positive += 1;
        }
    }

    let true_taxa: BTreeSet<&str> = pairs.iter().map(|(actual, _)| actual.as_str()).collect();
    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for taxon in &true_taxa {
        let c = counts.get(taxon).copied().unwrap_or_default();
        let p = if c.true_positive == 0 {
            0.0
        } else {
            count_to_f64(c.true_positive) / count_to_f64(c.predicted)
        };
        let r = count_to_f64(c.true_positive) / count_to_f64(c.actual);
        precision += p;
        recall += r;
        if p + r > 0.0 {
            f1 += 2.0 * p * r / (p + r);
        }
    }

    let n = pairs.len();
    let taxa = true_taxa.len();
    let mean = |sum: f64| if taxa == 0 { 0.0 } else { sum / count_to_f64(taxa) };
    let metrics = RankMetrics {
        rank,
        reads: n,
        taxa,
        accuracy: if n == 0 {
            0.0
        } else {
            count_to_f64(correct) / count_to_f64(n)
        },
        precision: mean(precision),
        recall: mean(recall),
        f1: mean(f1),
        mcc: matthews(correct, n, counts.values()),
    };
    debug!(rank = %rank, reads = n, taxa, f1 = metrics.f1, "Scored rank");
    metrics
}

/// Gorodkin's multiclass MCC; zero when either marginal is degenerate
fn matthews<'a>(correct: usize, n: usize, counts: impl Iterator<Item = &'a TaxonCounts>) -> f64 {
    let n = count_to_f64(n);
    let (mut pt, mut pp, mut tt) = (0.0, 0.0, 0.0);
    for c in counts {
        let (t, p) = (count_to_f64(c.actual), count_to_f64(c.predicted));
        pt += p * t;
        pp += p * p;
        tt += t * t;
    }

    let denominator = ((n * n - pp) * (n * n - tt)).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (count_to_f64(correct) * n - pt) / denominator
}
