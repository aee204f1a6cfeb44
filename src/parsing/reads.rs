//! Parser for k-merized read files.
//!
//! One read per line, either `identifier<TAB>k-mers` or bare whitespace-joined
//! k-mers. Bare reads are named `read_<n>` after their index. Blank and
//! malformed lines are skipped and counted; indexes stay contiguous over the
//! accepted reads.

use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::core::read::{ReadBatch, ReadRecord};
use crate::parsing::{open_text, ParseError};
use crate::utils::validation::check_read_limit;

/// Parse a read file (plain, gzip, or `-` for stdin)
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::TooManyReads` if the read limit is exceeded.
pub fn parse_reads_file(path: &Path) -> Result<ReadBatch, ParseError> {
    parse_reads(open_text(path)?)
}

/// Parse reads from any buffered reader
///
/// # Errors
///
/// Returns `ParseError::Io` on read failure, or `ParseError::TooManyReads`
/// if the read limit is exceeded.
pub fn parse_reads<R: BufRead>(reader: R) -> Result<ReadBatch, ParseError> {
    let mut batch = ReadBatch::default();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let index = batch.reads.len();

        let Some((id, sequence)) = split_read_line(&line, index) else {
            debug!(line = line_number + 1, "Skipping empty or malformed read line");
            batch.skipped += 1;
            continue;
        };

        if check_read_limit(index).is_some() {
            return Err(ParseError::TooManyReads(index));
        }

        batch.reads.push(ReadRecord::new(index, id, sequence));
    }

    Ok(batch)
}

/// Split one line into identifier and k-mer text
fn split_read_line(line: &str, index: usize) -> Option<(String, String)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let (id, kmers) = match line.split_once('\t') {
        Some((id, kmers)) => (id.trim().to_string(), kmers),
        None => (format!("read_{index}"), line),
    };

    let kmers = kmers.split_whitespace().collect::<Vec<_>>().join(" ");
    if id.is_empty() || kmers.is_empty() {
        return None;
    }

    Some((id, kmers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_with_ids() {
        let text = "r1\tAAAT AATG\nr2\tCCCG  CCGT\n";
        let batch = parse_reads(text.as_bytes()).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.skipped, 0);
        assert_eq!(batch.reads[0].id, "r1");
        assert_eq!(batch.reads[1].sequence, "CCCG CCGT");
        assert_eq!(batch.reads[1].index, 1);
    }

    #[test]
    fn test_parse_reads_bare_kmers() {
        let text = "AAAT AATG\nCCCG CCGT\n";
        let batch = parse_reads(text.as_bytes()).unwrap();

        assert_eq!(batch.ids(), vec!["read_0", "read_1"]);
    }

    #[test]
    fn test_parse_reads_skips_malformed() {
        let text = "r1\tAAAT\n\n\t\nr2\t   \nr3\tGGGA\n";
        let batch = parse_reads(text.as_bytes()).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.skipped, 3);
        // Indexes are contiguous over accepted reads
        assert_eq!(batch.reads[1].id, "r3");
        assert_eq!(batch.reads[1].index, 1);
    }
}
