//! # taxa-cascade
//!
//! A library for assigning a species-to-phylum lineage to short sequencing
//! reads by combining per-rank classifiers.
//!
//! Single flat classifiers struggle with closely related species. `taxa-cascade`
//! instead runs a set of smaller classifiers, one per rank or one per taxonomy
//! node, and reconciles their calls with the taxonomy and with an independent
//! coarse classifier such as Kraken.
//!
//! ## Features
//!
//! - **Four topologies**: independent per rank (LCL), cascading per node (LCPN),
//!   a hybrid of the two, and LCL constrained by the hierarchy
//! - **Order preserving**: reads come back in input order however often they are regrouped
//! - **Threshold scan**: the most specific call that clears a confidence threshold wins
//! - **Ensembles**: specialized species calls merged into a coarse classifier's lineage
//! - **Alignment caller**: species from an external aligner, bucketed by genus
//! - **Evaluation**: per-rank macro F1 and Matthews correlation against a truth set
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use taxa_cascade::{ClassifierRegistry, CascadeEngine, ThresholdEvaluator, Topology};
//! use taxa_cascade::registry::store::DirectoryStore;
//! use taxa_cascade::parsing::reads::parse_reads_file;
//! use taxa_cascade::taxonomy::{load_taxonomy, TaxonomyHierarchy};
//!
//! let db = load_taxonomy(Path::new("lineages.tsv")).unwrap();
//! let hierarchy = TaxonomyHierarchy::build(&["Escherichia coli", "Bacillus subtilis"], db.as_ref());
//! let registry = ClassifierRegistry::new(DirectoryStore::open(Path::new("models")).unwrap());
//!
//! let batch = parse_reads_file(Path::new("reads.txt")).unwrap();
//! let engine = CascadeEngine::new(&hierarchy, &registry);
//! let matrix = engine.run(&batch.reads, Topology::Lcpn).unwrap();
//!
//! for call in ThresholdEvaluator::new(0.5).evaluate(&matrix) {
//!     println!("{}\t{}", call.index, call.label);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Ranks, lineages, reads and the prediction matrix
//! - [`taxonomy`]: Taxonomy databases and the lineage hierarchy
//! - [`registry`]: Classifier contract, model artifacts and the lazy registry
//! - [`cascade`]: The inference topologies
//! - [`inference`]: Threshold evaluation and ensembles
//! - [`align`]: Alignment-based species calls
//! - [`evaluation`]: Metrics against a truth set
//! - [`parsing`]: Readers and writers for reads, lineages and tool output
//! - [`cli`]: Command-line interface implementation

pub mod align;
pub mod cascade;
pub mod cli;
pub mod config;
pub mod core;
pub mod evaluation;
pub mod inference;
pub mod parsing;
pub mod registry;
pub mod taxonomy;
pub mod utils;

// Re-export commonly used types for convenience
pub use cascade::{CascadeEngine, CascadeError};
pub use config::CascadeConfig;
pub use core::lineage::{Lineage, ReadLineage};
pub use core::prediction::{PredictionCell, PredictionMatrix, RankCell, SpeciesCall};
pub use core::read::{ReadBatch, ReadRecord};
pub use core::types::*;
pub use inference::{EnsembleCombiner, FinalCall, ThresholdEvaluator};
pub use registry::{Classifier, ClassifierRegistry};
pub use taxonomy::TaxonomyHierarchy;
