use std::collections::HashMap;

use tracing::info;

use crate::core::lineage::{Lineage, ReadLineage};
use crate::core::prediction::SpeciesCall;
use crate::core::types::{is_absent, Rank, UNCLASSIFIED};

/// Merges a specialized species call into a coarse classifier's lineage.
///
/// Per read, in priority order:
/// 1. coarse genus absent: species is `unclassified`
/// 2. specialized species absent: coarse species
/// 3. otherwise the specialized species
///
/// Every other rank comes from the coarse lineage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnsembleCombiner {
    min_score: Option<f64>,
}

/// Which rule decided a read's species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnsembleRule {
    NoCoarseGenus,
    CoarseSpecies,
    SpecializedSpecies,
}

impl EnsembleCombiner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat specialized calls scoring below `min_score` as absent
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    fn specialized_species<'c>(&self, call: Option<&'c SpeciesCall>) -> Option<&'c str> {
        call.filter(|c| !is_absent(&c.species))
            .filter(|c| self.min_score.map_or(true, |min| c.score >= min))
            .map(|c| c.species.as_str())
    }

    /// Combine one read
    #[must_use]
    pub fn combine(&self, coarse: &Lineage, specialized: Option<&SpeciesCall>) -> (Lineage, EnsembleRule) {
        let mut lineage = coarse.clone();

        if is_absent(coarse.get(Rank::Genus)) {
            lineage.set(Rank::Species, UNCLASSIFIED);
            return (lineage, EnsembleRule::NoCoarseGenus);
        }

        match self.specialized_species(specialized) {
            Some(species) => {
                lineage.set(Rank::Species, species);
                (lineage, EnsembleRule::SpecializedSpecies)
            }
            None => (lineage, EnsembleRule::CoarseSpecies),
        }
    }

    /// Combine every coarse row with the specialized call for the same read.
    ///
    /// Rows follow the coarse input; specialized calls for reads the coarse
    /// classifier never saw are ignored.
    #[must_use]
    pub fn combine_all(&self, coarse: &[ReadLineage], specialized: &[SpeciesCall]) -> Vec<ReadLineage> {
        let calls: HashMap<&str, &SpeciesCall> = specialized
            .iter()
            .map(|call| (call.read_id.as_str(), call))
            .collect();

        let mut counts: HashMap<EnsembleRule, usize> = HashMap::new();
        let rows: Vec<ReadLineage> = coarse
            .iter()
            .map(|row| {
                let (lineage, rule) = self.combine(&row.lineage, calls.get(row.read_id.as_str()).copied());
                *counts.entry(rule).or_default() += 1;
                ReadLineage::new(row.read_id.clone(), lineage)
            })
            .collect();

        info!(
            reads = rows.len(),
            specialized = counts.get(&EnsembleRule::SpecializedSpecies).copied().unwrap_or(0),
            coarse = counts.get(&EnsembleRule::CoarseSpecies).copied().unwrap_or(0),
            unclassified = counts.get(&EnsembleRule::NoCoarseGenus).copied().unwrap_or(0),
            "Combined species calls"
        );
        rows
    }

    /// Primary lineage, unless its species is absent and the secondary
    /// classifier has one
    #[must_use]
    pub fn fallback(primary: &Lineage, secondary: Option<&Lineage>) -> Lineage {
        match secondary {
            Some(secondary)
                if is_absent(primary.get(Rank::Species)) && !is_absent(secondary.get(Rank::Species)) =>
            {
                secondary.clone()
            }
            _ => primary.clone(),
        }
    }

    /// [`fallback`](Self::fallback) for every primary row, matched by read id
    #[must_use]
    pub fn fallback_all(primary: &[ReadLineage], secondary: &[ReadLineage]) -> Vec<ReadLineage> {
        let secondary: HashMap<&str, &Lineage> = secondary
            .iter()
            .map(|row| (row.read_id.as_str(), &row.lineage))
            .collect();

        primary
            .iter()
            .map(|row| {
                let lineage = Self::fallback(&row.lineage, secondary.get(row.read_id.as_str()).copied());
                ReadLineage::new(row.read_id.clone(), lineage)
            })
            .collect()
    }
}
