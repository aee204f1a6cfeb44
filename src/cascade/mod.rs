//! Cascade inference over per-rank and per-node classifiers.
//!
//! Four topologies produce a [`PredictionMatrix`](crate::core::PredictionMatrix)
//! with one row per read and one column per rank:
//!
//! | Topology | Phylum … family | Genus, species |
//! |----------|-----------------|----------------|
//! | `lcl` | rank classifiers | rank classifiers |
//! | `lcpn` | routed on the parent call | routed on the parent call |
//! | `lcl-lcpn` | rank classifiers | routed on the parent call |
//! | `hierarchical-lcl` | distributions restricted to the parent's children | same |
//!
//! Routing groups reads by their previous call and sends each group to the
//! classifier stored under that call. Reads carry their original index through
//! every regrouping and are merged back with a stable sort, so the matrix is
//! always in input order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use taxa_cascade::cascade::CascadeEngine;
//! use taxa_cascade::core::{ReadBatch, Topology};
//! use taxa_cascade::registry::{ClassifierRegistry, DirectoryStore};
//! use taxa_cascade::taxonomy::{load_taxonomy, TaxonomyHierarchy};
//! use std::path::Path;
//!
//! let db = load_taxonomy(Path::new("taxdump")).unwrap();
//! let hierarchy = TaxonomyHierarchy::build(&["Escherichia coli"], db.as_ref());
//! let registry = ClassifierRegistry::new(DirectoryStore::open(Path::new("models")).unwrap());
//!
//! let batch = ReadBatch::from_sequences(&["AACG ACGT CGTT"]);
//! let engine = CascadeEngine::new(&hierarchy, &registry);
//! let matrix = engine.run(&batch.reads, Topology::Lcpn).unwrap();
//! assert_eq!(matrix.len(), 1);
//! ```

pub mod engine;
pub mod guided;
pub mod hierarchical;
mod hybrid;
mod lcl;
mod lcpn;
pub mod routing;

pub use engine::{CascadeEngine, CascadeError, DEFAULT_MIN_SCORE};
pub use guided::NO_CLASSIFIER_SCORE;
pub use hierarchical::renormalize;
