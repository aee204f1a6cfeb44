use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::types::{is_absent, Rank, OTHER, RANK_COUNT, UNCLASSIFIED};

/// One name per rank, species first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    names: [String; RANK_COUNT],
}

impl Lineage {
    /// A lineage with every rank set to `fill`
    #[must_use]
    pub fn filled(fill: &str) -> Self {
        Self {
            names: std::array::from_fn(|_| fill.to_string()),
        }
    }

    /// A lineage with every rank unclassified
    #[must_use]
    pub fn unclassified() -> Self {
        Self::filled(UNCLASSIFIED)
    }

    /// Lineage for a taxon the taxonomy database could not resolve
    #[must_use]
    pub fn other() -> Self {
        Self::filled(OTHER)
    }

    /// Build from names ordered species to phylum
    #[must_use]
    pub fn from_names(names: [String; RANK_COUNT]) -> Self {
        Self { names }
    }

    #[must_use]
    pub fn get(&self, rank: Rank) -> &str {
        &self.names[rank.index()]
    }

    pub fn set(&mut self, rank: Rank, name: impl Into<String>) {
        self.names[rank.index()] = name.into();
    }

    #[must_use]
    pub fn with(mut self, rank: Rank, name: impl Into<String>) -> Self {
        self.set(rank, name);
        self
    }

    /// Names ordered species to phylum
    #[must_use]
    pub fn names(&self) -> &[String; RANK_COUNT] {
        &self.names
    }

    /// The most specific rank carrying a usable name
    #[must_use]
    pub fn deepest_rank(&self) -> Option<Rank> {
        Rank::ALL.into_iter().find(|rank| {
            let name = self.get(*rank);
            !is_absent(name) && name != OTHER
        })
    }
}

/// The lineage assigned to one read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadLineage {
    pub read_id: String,
    pub lineage: Lineage,
}

impl ReadLineage {
    pub fn new(read_id: impl Into<String>, lineage: Lineage) -> Self {
        Self {
            read_id: read_id.into(),
            lineage,
        }
    }
}

/// Taxon name -> lineage, one entry per taxon
#[derive(Debug, Clone, Default)]
pub struct LineageTable {
    entries: HashMap<String, Lineage>,
    /// Insertion order, so iteration is reproducible
    order: Vec<String>,
}

impl LineageTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the lineage of `taxon`
    pub fn insert(&mut self, taxon: impl Into<String>, lineage: Lineage) {
        let taxon = taxon.into();
        if self.entries.insert(taxon.clone(), lineage).is_none() {
            self.order.push(taxon);
        }
    }

    #[must_use]
    pub fn get(&self, taxon: &str) -> Option<&Lineage> {
        self.entries.get(taxon)
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Lineage)> {
        self.order
            .iter()
            .filter_map(|taxon| self.entries.get(taxon).map(|l| (taxon.as_str(), l)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
