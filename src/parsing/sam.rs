use std::io::BufRead;

use tracing::warn;

use crate::parsing::ParseError;
use crate::utils::validation::canonical_taxon;

/// Mandatory SAM columns before optional tags
const SAM_COLUMNS: usize = 11;

/// Segment unmapped
const FLAG_UNMAPPED: u16 = 0x4;

/// One mapped alignment against a species reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub read_id: String,
    pub species: String,
    /// Aligner score from the `AS:i` tag
    pub score: i64,
}

/// Alignment records plus the number of lines that could not be used
#[derive(Debug, Clone, Default)]
pub struct Alignments {
    pub records: Vec<AlignmentRecord>,
    pub skipped: usize,
}

/// Species named by a reference sequence name.
///
/// References are named `sequence<N>|<Species_name>`; a name without `|` is
/// taken whole.
#[must_use]
pub fn reference_species(reference: &str) -> String {
    let name = reference
        .split_once('|')
        .map_or(reference, |(_, species)| species);
    canonical_taxon(name)
}

/// Parse SAM text from an aligner.
///
/// Header lines are ignored, unmapped records are dropped, and records that are
/// truncated or carry no `AS:i` score are skipped and counted.
///
/// # Errors
///
/// Returns `ParseError::Io` if reading fails.
pub fn parse_alignments<R: BufRead>(reader: R) -> Result<Alignments, ParseError> {
    let mut alignments = Alignments::default();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('@') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < SAM_COLUMNS {
            alignments.skipped += 1;
            continue;
        }

        let flag: u16 = fields[1].parse().unwrap_or(FLAG_UNMAPPED);
        if flag & FLAG_UNMAPPED != 0 || fields[2] == "*" {
            continue;
        }

        let score = fields[SAM_COLUMNS..].iter().find_map(|tag| {
            tag.strip_prefix("AS:i:")
                .and_then(|value| value.parse::<i64>().ok())
        });

        match score {
            Some(score) => alignments.records.push(AlignmentRecord {
                read_id: fields[0].to_string(),
                species: reference_species(fields[2]),
                score,
            }),
            None => alignments.skipped += 1,
        }
    }

    if alignments.skipped > 0 {
        warn!(
            skipped = alignments.skipped,
            "Skipped alignment records without a usable score"
        );
    }
    Ok(alignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_species() {
        assert_eq!(reference_species("sequence12|Escherichia_coli"), "Escherichia coli");
        assert_eq!(reference_species("Bacillus_subtilis"), "Bacillus subtilis");
    }

    #[test]
    fn test_parse_alignments() {
        let sam = "@HD\tVN:1.6\n\
@SQ\tSN:sequence1|Escherichia_coli\tLN:5000\n\
r1\t0\tsequence1|Escherichia_coli\t10\t60\t100M\t*\t0\t0\tACGT\t*\tNM:i:0\tAS:i:100\n\
r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n\
r3\t0\tsequence2|Escherichia_fergusonii\t10\t60\t100M\t*\t0\t0\tACGT\t*\n\
r4\t0\tsequence2\n";

        let alignments = parse_alignments(sam.as_bytes()).unwrap();
        assert_eq!(alignments.records.len(), 1);
        assert_eq!(alignments.skipped, 2);
        assert_eq!(
            alignments.records[0],
            AlignmentRecord {
                read_id: "r1".to_string(),
                species: "Escherichia coli".to_string(),
                score: 100,
            }
        );
    }
}
