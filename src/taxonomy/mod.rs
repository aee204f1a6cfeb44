//! Taxonomy databases and the lineage hierarchy built from them.
//!
//! - [`TaxonomyDb`]: resolves a name or taxid to its ranked ancestors
//! - [`NcbiTaxonomy`]: NCBI taxdump (`nodes.dmp` + `names.dmp`)
//! - [`TsvTaxonomy`]: a lineage table, one taxon per row
//! - [`TaxonomyHierarchy`]: lineages for a taxon set with parent/child queries

pub mod db;
pub mod hierarchy;
pub mod ncbi;

pub use db::{load_taxonomy, TaxonomyDb, TaxonomyError, TsvTaxonomy};
pub use hierarchy::TaxonomyHierarchy;
pub use ncbi::NcbiTaxonomy;
