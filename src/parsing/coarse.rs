//! Coarse classifier output (Kraken-style) and its expansion to lineages.
//!
//! Each line is `status<TAB>read_id<TAB>taxid<TAB>...`, where status is `C`
//! (classified) or `U` (unclassified). The taxid column may also carry a name,
//! as in `Escherichia coli (taxid 562)`.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::lineage::{Lineage, ReadLineage};
use crate::core::types::NOT_AVAILABLE;
use crate::parsing::{open_text, ParseError};
use crate::taxonomy::TaxonomyDb;

/// One read's coarse call; `taxid` is `None` for unclassified reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoarseCall {
    pub read_id: String,
    pub taxid: Option<u32>,
}

/// Parsed coarse output plus the number of malformed lines
#[derive(Debug, Clone, Default)]
pub struct CoarseCalls {
    pub calls: Vec<CoarseCall>,
    pub skipped: usize,
}

/// Parse Kraken-style output from a file (plain, gzip, or `-`)
///
/// # Errors
///
/// Returns `ParseError::Io` if reading fails.
pub fn parse_coarse_file(path: &Path) -> Result<CoarseCalls, ParseError> {
    parse_coarse(open_text(path)?)
}

/// Parse Kraken-style output; malformed lines are skipped and counted
///
/// # Errors
///
/// Returns `ParseError::Io` if reading fails.
pub fn parse_coarse<R: BufRead>(reader: R) -> Result<CoarseCalls, ParseError> {
    let mut parsed = CoarseCalls::default();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_coarse_line(&line) {
            Some(call) => parsed.calls.push(call),
            None => {
                debug!(line = line_number + 1, "Skipping malformed coarse call");
                parsed.skipped += 1;
            }
        }
    }

    if parsed.skipped > 0 {
        warn!(skipped = parsed.skipped, "Skipped malformed coarse calls");
    }
    Ok(parsed)
}

fn parse_coarse_line(line: &str) -> Option<CoarseCall> {
    let mut fields = line.split('\t');
    let status = fields.next()?.trim();
    let read_id = fields.next()?.trim();
    let taxon = fields.next()?.trim();

    if read_id.is_empty() {
        return None;
    }

    let taxid = match status {
        "U" => None,
        "C" => match parse_taxid(taxon)? {
            0 => None,
            id => Some(id),
        },
        _ => return None,
    };

    Some(CoarseCall {
        read_id: read_id.to_string(),
        taxid,
    })
}

/// Accept `562` or `Escherichia coli (taxid 562)`
fn parse_taxid(field: &str) -> Option<u32> {
    if let Ok(id) = field.parse() {
        return Some(id);
    }
    let start = field.rfind("(taxid ")? + "(taxid ".len();
    field[start..].trim_end_matches(')').trim().parse().ok()
}

/// Expand coarse calls to full lineages, resolving each distinct taxid once.
///
/// Unclassified reads get `NA` everywhere, ranks the database does not report
/// are `NA`, and a taxid the database cannot resolve gives `other`.
pub fn expand_calls(calls: &[CoarseCall], db: &dyn TaxonomyDb) -> Vec<ReadLineage> {
    let mut cache: HashMap<u32, Lineage> = HashMap::new();
    let mut failed = 0usize;

    let rows: Vec<ReadLineage> = calls
        .iter()
        .map(|call| {
            let lineage = match call.taxid {
                None => Lineage::filled(NOT_AVAILABLE),
                Some(taxid) => cache
                    .entry(taxid)
                    .or_insert_with(|| match db.resolve_taxid(taxid) {
                        Ok(names) => {
                            let mut lineage = Lineage::filled(NOT_AVAILABLE);
                            for (rank, name) in names {
                                lineage.set(rank, name);
                            }
                            lineage
                        }
                        Err(err) => {
                            debug!(taxid, error = %err, "Could not expand taxid");
                            failed += 1;
                            Lineage::other()
                        }
                    })
                    .clone(),
            };
            ReadLineage::new(call.read_id.clone(), lineage)
        })
        .collect();

    if failed > 0 {
        warn!(taxids = failed, "Taxids missing from the taxonomy database");
    }
    info!(reads = calls.len(), taxids = cache.len(), "Expanded coarse calls");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Rank;
    use crate::taxonomy::TsvTaxonomy;

    const KRAKEN: &str = "C\tr1\t562\t150\t562:116
U\tr2\t0\t150\t0:116
C\tr3\tBacillus subtilis (taxid 1423)\t150\t1423:116
C\tr4\t0\t150\t0:116
X\tr5\t562\t150
C\tr6
C\tr7\t9606\t150\t9606:116
";

    const TABLE: &str = "taxon\ttaxid\tspecies\tgenus\tfamily\torder\tclass\tphylum
Escherichia coli\t562\tEscherichia coli\tEscherichia\tEnterobacteriaceae\tEnterobacterales\tGammaproteobacteria\tPseudomonadota
Bacillus subtilis\t1423\tBacillus subtilis\tBacillus\tBacillaceae\tBacillales\tBacilli\tBacillota
Bacillaceae\t186817\t\t\tBacillaceae\tBacillales\tBacilli\tBacillota
";

    #[test]
    fn test_parse_coarse() {
        let parsed = parse_coarse(KRAKEN.as_bytes()).unwrap();

        assert_eq!(parsed.calls.len(), 5);
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.calls[0].taxid, Some(562));
        assert_eq!(parsed.calls[1].taxid, None);
        assert_eq!(parsed.calls[2].taxid, Some(1423));
        assert_eq!(parsed.calls[3].taxid, None);
    }

    #[test]
    fn test_expand_calls() {
        let db = TsvTaxonomy::from_reader(TABLE.as_bytes()).unwrap();
        let mut calls = parse_coarse(KRAKEN.as_bytes()).unwrap().calls;
        calls.push(CoarseCall {
            read_id: "r8".to_string(),
            taxid: Some(186_817),
        });
        let rows = expand_calls(&calls, &db);

        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].lineage.get(Rank::Genus), "Escherichia");
        assert_eq!(rows[1].lineage, Lineage::filled("NA"));
        assert_eq!(rows[2].lineage.get(Rank::Phylum), "Bacillota");
        // Unknown taxid
        assert_eq!(rows[4].read_id, "r7");
        assert_eq!(rows[4].lineage, Lineage::other());
        // Family-level call leaves finer ranks NA
        assert_eq!(rows[5].lineage.get(Rank::Genus), "NA");
        assert_eq!(rows[5].lineage.get(Rank::Family), "Bacillaceae");
    }
}
