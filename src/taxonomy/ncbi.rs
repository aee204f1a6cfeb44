//! NCBI taxdump reader (`nodes.dmp` + `names.dmp`).
//!
//! Only scientific names are indexed. Ranks outside the six tracked ranks
//! (superkingdom, subspecies, strain, ...) are walked through but not reported.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::db::{RankedNames, TaxonomyDb, TaxonomyError};
use crate::core::types::Rank;
use crate::parsing::open_text;

/// Upper bound on parent hops, guards against cycles in a corrupt dump
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone)]
struct Node {
    parent: u32,
    rank: Option<Rank>,
}

#[derive(Debug, Default)]
pub struct NcbiTaxonomy {
    nodes: HashMap<u32, Node>,
    names: HashMap<u32, String>,
    by_name: HashMap<String, u32>,
}

impl NcbiTaxonomy {
    /// Load `nodes.dmp` and `names.dmp` (optionally `.gz`) from a directory
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError::InvalidFormat` if either file is missing, or
    /// `TaxonomyError::Io` if reading fails.
    pub fn load_dir(dir: &Path) -> Result<Self, TaxonomyError> {
        let nodes = find_dump(dir, "nodes.dmp")?;
        let names = find_dump(dir, "names.dmp")?;
        let db = Self::from_readers(open_text(&nodes)?, open_text(&names)?)?;

        info!(
            nodes = db.nodes.len(),
            names = db.names.len(),
            "Loaded NCBI taxonomy"
        );
        Ok(db)
    }

    /// Build from `nodes.dmp` and `names.dmp` readers
    ///
    /// # Errors
    ///
    /// Returns `TaxonomyError::Io` if reading fails.
    pub fn from_readers<N: BufRead, M: BufRead>(
        nodes: N,
        names: M,
    ) -> Result<Self, TaxonomyError> {
        let mut db = Self::default();

        for line in nodes.lines() {
            let line = line?;
            let parts: Vec<&str> = line.split("\t|\t").collect();
            if parts.len() < 3 {
                continue;
            }
            if let (Ok(taxid), Ok(parent)) = (parts[0].trim().parse(), parts[1].trim().parse()) {
                let rank = Rank::from_ncbi(parts[2].trim_end_matches("\t|"));
                db.nodes.insert(taxid, Node { parent, rank });
            }
        }

        for line in names.lines() {
            let line = line?;
            let parts: Vec<&str> = line.split("\t|\t").collect();
            if parts.len() < 4 || parts[3].trim_end_matches("\t|") != "scientific name" {
                continue;
            }
            if let Ok(taxid) = parts[0].trim().parse::<u32>() {
                let name = parts[1].to_string();
                // Keep the lowest taxid when a name is shared
                db.by_name
                    .entry(name.clone())
                    .and_modify(|existing| *existing = (*existing).min(taxid))
                    .or_insert(taxid);
                db.names.insert(taxid, name);
            }
        }

        Ok(db)
    }

    /// Walk from `taxid` to the root, collecting tracked ranks
    fn lineage(&self, taxid: u32) -> Result<RankedNames, TaxonomyError> {
        if !self.nodes.contains_key(&taxid) {
            return Err(TaxonomyError::UnknownTaxid(taxid));
        }

        let mut names: RankedNames = Vec::new();
        let mut current = taxid;
        for _ in 0..MAX_DEPTH {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            if let (Some(rank), Some(name)) = (node.rank, self.names.get(&current)) {
                if !names.iter().any(|(r, _)| *r == rank) {
                    names.push((rank, name.clone()));
                }
            }
            if node.parent == current {
                break;
            }
            current = node.parent;
        }

        names.sort_by_key(|(rank, _)| *rank);
        Ok(names)
    }
}

impl TaxonomyDb for NcbiTaxonomy {
    fn resolve(&self, name: &str) -> Result<RankedNames, TaxonomyError> {
        let taxid = self
            .by_name
            .get(name.trim())
            .copied()
            .ok_or_else(|| TaxonomyError::UnknownTaxon(name.to_string()))?;
        self.lineage(taxid)
    }

    fn resolve_taxid(&self, taxid: u32) -> Result<RankedNames, TaxonomyError> {
        self.lineage(taxid)
    }
}

/// Locate `<name>` or `<name>.gz` inside a taxdump directory
fn find_dump(dir: &Path, name: &str) -> Result<PathBuf, TaxonomyError> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.is_file() {
        return Ok(gz);
    }
    warn!(dir = %dir.display(), file = name, "Taxdump file missing");
    Err(TaxonomyError::InvalidFormat(format!(
        "{name} not found in {}",
        dir.display()
    )))
}
