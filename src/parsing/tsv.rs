//! Tab-separated result tables.
//!
//! All tables start with a header line naming their columns. Columns are
//! located by name, so extra columns are ignored and column order is free.
//!
//! | Table | Columns |
//! |-------|---------|
//! | Lineages | `read_id species genus family order class phylum` |
//! | Species calls | `read_id species [score]` |
//! | Aligner calls | `read_id species alignment_score` |
//! | Prediction matrix | `read_id species … phylum` (write only) |

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;

use tracing::warn;

use crate::core::lineage::{Lineage, ReadLineage};
use crate::core::prediction::{PredictionMatrix, SpeciesCall};
use crate::core::read::ReadRecord;
use crate::core::types::{Rank, NOT_AVAILABLE};
use crate::parsing::{open_text, ParseError};
use crate::utils::validation::validate_score;

pub const READ_ID_COLUMN: &str = "read_id";

/// Classifier probability in [0, 1]
pub const SCORE_COLUMN: &str = "score";

/// Raw aligner score; not a probability, so never read back as `score`
pub const ALIGNMENT_SCORE_COLUMN: &str = "alignment_score";

/// Column name -> position, built from a header line
#[derive(Debug, Clone)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    /// Build from a header line, requiring every column in `required`
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidFormat` naming the first missing column.
    pub fn from_header(header: &str, required: &[&str]) -> Result<Self, ParseError> {
        let positions: HashMap<String, usize> = header
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();

        if let Some(missing) = required.iter().find(|c| !positions.contains_key(**c)) {
            return Err(ParseError::InvalidFormat(format!(
                "Missing required column '{missing}' in header"
            )));
        }

        Ok(Self { positions })
    }

    #[must_use]
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// The trimmed value of `column` in an already split row
    #[must_use]
    pub fn get<'a>(&self, fields: &[&'a str], column: &str) -> Option<&'a str> {
        self.position(column)
            .and_then(|i| fields.get(i))
            .map(|value| value.trim())
    }

    /// The lineage carried by a row; empty cells become `NA`
    #[must_use]
    pub fn lineage(&self, fields: &[&str]) -> Lineage {
        let mut lineage = Lineage::filled(NOT_AVAILABLE);
        for rank in Rank::ALL {
            if let Some(value) = self.get(fields, rank.as_str()).filter(|v| !v.is_empty()) {
                lineage.set(rank, value);
            }
        }
        lineage
    }
}

/// Header columns for a lineage table
#[must_use]
pub fn lineage_columns() -> Vec<&'static str> {
    std::iter::once(READ_ID_COLUMN)
        .chain(Rank::ALL.iter().map(|r| r.as_str()))
        .collect()
}

/// Iterate the non-blank lines of a table: the header, then split rows
fn read_table<R: BufRead>(
    reader: R,
    required: &[&str],
) -> Result<(ColumnMap, Vec<(usize, String)>), ParseError> {
    let mut lines = reader
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |l| !l.trim().is_empty()));

    let header = match lines.next() {
        Some((_, line)) => line?,
        None => return Err(ParseError::InvalidFormat("Empty table".to_string())),
    };
    let columns = ColumnMap::from_header(&header, required)?;

    let mut rows = Vec::new();
    for (number, line) in lines {
        rows.push((number + 1, line?));
    }
    Ok((columns, rows))
}

/// Parse a per-read lineage table
///
/// # Errors
///
/// Returns `ParseError::Io` on read failure or `ParseError::InvalidFormat` if
/// the header lacks a required column.
pub fn parse_lineages<R: BufRead>(reader: R) -> Result<Vec<ReadLineage>, ParseError> {
    let (columns, rows) = read_table(reader, &lineage_columns())?;

    let mut lineages = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (_, row) in &rows {
        let fields: Vec<&str> = row.split('\t').collect();
        match columns.get(&fields, READ_ID_COLUMN).filter(|id| !id.is_empty()) {
            Some(read_id) => lineages.push(ReadLineage::new(read_id, columns.lineage(&fields))),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped lineage rows without a read id");
    }
    Ok(lineages)
}

/// Parse a lineage table from a file
///
/// # Errors
///
/// See [`parse_lineages`].
pub fn parse_lineages_file(path: &Path) -> Result<Vec<ReadLineage>, ParseError> {
    parse_lineages(open_text(path)?)
}

/// Parse a species-call table; a missing score column means score 1.0
///
/// Scores must be probabilities. Rows with an unparsable or out-of-range
/// score are skipped and counted. An `alignment_score` column is ignored.
///
/// # Errors
///
/// Returns `ParseError::Io` on read failure or `ParseError::InvalidFormat` if
/// the header lacks `read_id` or `species`.
pub fn parse_species_calls<R: BufRead>(reader: R) -> Result<Vec<SpeciesCall>, ParseError> {
    let (columns, rows) = read_table(reader, &[READ_ID_COLUMN, "species"])?;

    let mut calls = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (line_number, row) in &rows {
        let fields: Vec<&str> = row.split('\t').collect();
        let read_id = columns.get(&fields, READ_ID_COLUMN).filter(|id| !id.is_empty());
        let species = columns.get(&fields, "species").unwrap_or_default();
        let score = match columns.position(SCORE_COLUMN) {
            Some(_) => columns
                .get(&fields, SCORE_COLUMN)
                .and_then(|s| s.parse::<f64>().ok())
                .and_then(|s| validate_score(s).ok()),
            None => Some(1.0),
        };

        match (read_id, score) {
            (Some(read_id), Some(score)) => {
                let species = if species.is_empty() {
                    NOT_AVAILABLE
                } else {
                    species
                };
                calls.push(SpeciesCall::new(read_id, species, score));
            }
            _ => {
                warn!(line = line_number, "Skipping malformed species call");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed species calls");
    }
    Ok(calls)
}

/// Parse a species-call table from a file
///
/// # Errors
///
/// See [`parse_species_calls`].
pub fn parse_species_calls_file(path: &Path) -> Result<Vec<SpeciesCall>, ParseError> {
    parse_species_calls(open_text(path)?)
}

/// Write a lineage table with header
///
/// # Errors
///
/// Returns an IO error if writing fails.
pub fn write_lineages<W: Write>(writer: &mut W, rows: &[ReadLineage]) -> std::io::Result<()> {
    writeln!(writer, "{}", lineage_columns().join("\t"))?;
    for row in rows {
        writeln!(writer, "{}\t{}", row.read_id, row.lineage.names().join("\t"))?;
    }
    Ok(())
}

/// Write a species-call table with header, naming the score column
/// [`SCORE_COLUMN`] or [`ALIGNMENT_SCORE_COLUMN`]
///
/// # Errors
///
/// Returns an IO error if writing fails.
pub fn write_species_calls<W: Write>(
    writer: &mut W,
    calls: &[SpeciesCall],
    score_column: &str,
) -> std::io::Result<()> {
    writeln!(writer, "{READ_ID_COLUMN}\tspecies\t{score_column}")?;
    for call in calls {
        writeln!(writer, "{}\t{}\t{}", call.read_id, call.species, call.score)?;
    }
    Ok(())
}

/// Write a prediction matrix, one row per read in original order
///
/// Reads absent from `reads` are written with their index as identifier.
///
/// # Errors
///
/// Returns an IO error if writing fails.
pub fn write_matrix<W: Write>(
    writer: &mut W,
    matrix: &PredictionMatrix,
    reads: &[ReadRecord],
) -> std::io::Result<()> {
    let ids: HashMap<usize, &str> = reads.iter().map(|r| (r.index, r.id.as_str())).collect();

    writeln!(writer, "{}", lineage_columns().join("\t"))?;
    for row in matrix.rows() {
        let id = ids
            .get(&row.index)
            .map_or_else(|| row.index.to_string(), |id| (*id).to_string());
        let cells: Vec<String> = row.cells().map(|(_, cell)| cell.render()).collect();
        writeln!(writer, "{id}\t{}", cells.join("\t"))?;
    }
    Ok(())
}
