use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::types::{is_absent, Rank, OTHER};
use crate::parsing::tsv::ColumnMap;
use crate::parsing::{open_text, ParseError};

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Taxon not found: {0}")]
    UnknownTaxon(String),

    #[error("Taxid not found: {0}")]
    UnknownTaxid(u32),

    #[error("Invalid taxonomy database: {0}")]
    InvalidFormat(String),
}

impl From<ParseError> for TaxonomyError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io(e) => Self::Io(e),
            other => Self::InvalidFormat(other.to_string()),
        }
    }
}

/// Ancestor names of a taxon, ordered species to phylum, own rank included
pub type RankedNames = Vec<(Rank, String)>;

/// A taxonomy database that can name the ancestors of a taxon
///
/// Lookups may fail per name; callers decide how to degrade.
pub trait TaxonomyDb: Send + Sync {
    /// Resolve a scientific name
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError::UnknownTaxon` if the name is not in the database.
    fn resolve(&self, name: &str) -> Result<RankedNames, TaxonomyError>;

    /// Resolve a numeric taxon id
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError::UnknownTaxid` if the id is not in the database.
    fn resolve_taxid(&self, taxid: u32) -> Result<RankedNames, TaxonomyError>;
}

/// Taxonomy backed by a lineage table
///
/// Header: `taxon species genus family order class phylum`, with an optional
/// `taxid` column. Every internal node named in the table resolves too, to
/// its own rank and above.
#[derive(Debug, Default)]
pub struct TsvTaxonomy {
    by_name: HashMap<String, RankedNames>,
    by_taxid: HashMap<u32, RankedNames>,
}

impl TsvTaxonomy {
    /// Load from a file (plain or gzip)
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError::Io` or `TaxonomyError::InvalidFormat`.
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        Self::from_reader(open_text(path)?)
    }

    /// Load from any buffered reader
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError::Io` or `TaxonomyError::InvalidFormat`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, TaxonomyError> {
        let mut required = vec!["taxon"];
        required.extend(Rank::ALL.iter().map(|r| r.as_str()));

        let mut lines = reader.lines();
        let header = loop {
            match lines.next() {
                Some(line) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => {
                    return Err(TaxonomyError::InvalidFormat(
                        "Empty taxonomy table".to_string(),
                    ))
                }
            }
        };
        let columns = ColumnMap::from_header(&header, &required)?;

        let mut db = Self::default();
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let Some(taxon) = columns.get(&fields, "taxon").filter(|t| !t.is_empty()) else {
                continue;
            };

            let names: RankedNames = Rank::ALL
                .iter()
                .filter_map(|rank| {
                    columns
                        .get(&fields, rank.as_str())
                        .filter(|name| !is_absent(name) && *name != OTHER)
                        .map(|name| (*rank, name.to_string()))
                })
                .collect();

            // Internal nodes resolve to their own rank and above
            for (i, (_, name)) in names.iter().enumerate() {
                db.by_name
                    .entry(name.clone())
                    .or_insert_with(|| names[i..].to_vec());
            }
            db.by_name.insert(taxon.to_string(), names.clone());

            if let Some(taxid) = columns.get(&fields, "taxid").and_then(|t| t.parse().ok()) {
                db.by_taxid.insert(taxid, names);
            }
        }

        info!(
            taxa = db.by_name.len(),
            taxids = db.by_taxid.len(),
            "Loaded lineage table"
        );
        Ok(db)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TaxonomyDb for TsvTaxonomy {
    fn resolve(&self, name: &str) -> Result<RankedNames, TaxonomyError> {
        self.by_name
            .get(name.trim())
            .cloned()
            .ok_or_else(|| TaxonomyError::UnknownTaxon(name.to_string()))
    }

    fn resolve_taxid(&self, taxid: u32) -> Result<RankedNames, TaxonomyError> {
        self.by_taxid
            .get(&taxid)
            .cloned()
            .ok_or(TaxonomyError::UnknownTaxid(taxid))
    }
}

/// Open a taxonomy database: a directory is read as an NCBI taxdump,
/// anything else as a lineage table
///
/// # Errors
///
/// Returns `TaxonomyError::Io` or `TaxonomyError::InvalidFormat`.
pub fn load_taxonomy(path: &Path) -> Result<Box<dyn TaxonomyDb>, TaxonomyError> {
    if path.is_dir() {
        debug!(path = %path.display(), "Loading NCBI taxdump");
        Ok(Box::new(super::ncbi::NcbiTaxonomy::load_dir(path)?))
    } else {
        debug!(path = %path.display(), "Loading lineage table");
        Ok(Box::new(TsvTaxonomy::load(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "taxon\ttaxid\tspecies\tgenus\tfamily\torder\tclass\tphylum
Escherichia coli\t562\tEscherichia coli\tEscherichia\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Bacillus subtilis\t1423\tBacillus subtilis\tBacillus\tBacillaceae\tBacillales\tBacilli\tBacillota
Mystery bug\t\tunclassified\tunclassified\tMysteriaceae\tNA\tNA\tBacillota
";

    #[test]
    fn test_resolve_species() {
        let db = TsvTaxonomy::from_reader(TABLE.as_bytes()).unwrap();
        let names = db.resolve("Escherichia coli").unwrap();

        assert_eq!(names.len(), 6);
        assert_eq!(names[0], (Rank::Species, "Escherichia coli".to_string()));
        assert_eq!(names[5], (Rank::Phylum, "Pseudomonadota".to_string()));
    }

    #[test]
    fn test_resolve_internal_node() {
        let db = TsvTaxonomy::from_reader(TABLE.as_bytes()).unwrap();
        let names = db.resolve("Bacillaceae").unwrap();

        assert_eq!(names[0], (Rank::Family, "Bacillaceae".to_string()));
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_absent_ranks_are_dropped() {
        let db = TsvTaxonomy::from_reader(TABLE.as_bytes()).unwrap();
        let names = db.resolve("Mystery bug").unwrap();

        assert_eq!(
            names,
            vec![
                (Rank::Family, "Mysteriaceae".to_string()),
                (Rank::Phylum, "Bacillota".to_string())
            ]
        );
    }

    #[test]
    fn test_resolve_taxid() {
        let db = TsvTaxonomy::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(db.resolve_taxid(1423).unwrap()[1].1, "Bacillus");
        assert!(matches!(
            db.resolve_taxid(9606),
            Err(TaxonomyError::UnknownTaxid(9606))
        ));
        assert!(db.resolve("Homo sapiens").is_err());
    }
}
