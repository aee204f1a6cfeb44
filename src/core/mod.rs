//! Core data types for hierarchical read classification.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Rank`]: The six taxonomic ranks, ordered species to phylum
//! - [`Lineage`] and [`LineageTable`]: One name per rank for a taxon
//! - [`ReadRecord`] and [`ReadBatch`]: K-merized reads with their original index
//! - [`PredictionMatrix`]: Per-read, per-rank classifier calls
//!
//! ## Sentinel Labels
//!
//! Several labels stand in for "no call" and are never treated as taxa:
//!
//! | Label | Meaning |
//! |-------|---------|
//! | `different` | Negative class of a binary one-vs-rest classifier |
//! | `na` | The cascade stopped above this rank |
//! | `NA` | No classifier, tool failure, or score below the minimum |
//! | `unclassified` | No rank qualified, or the lineage has no name at this rank |
//! | `other` | The taxonomy database could not resolve the taxon |

pub mod lineage;
pub mod prediction;
pub mod read;
pub mod types;

pub use lineage::{Lineage, LineageTable, ReadLineage};
pub use prediction::{PredictionCell, PredictionMatrix, RankCell, SpeciesCall};
pub use read::{ReadBatch, ReadRecord};
pub use types::{Rank, Topology};
