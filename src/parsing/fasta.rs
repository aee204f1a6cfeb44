//! FASTA reads for the alignment caller, read with noodles.
//!
//! Supports both uncompressed and gzip/bgzip compressed files.
//!
//! Supported extensions:
//! - `.fa`, `.fasta`, `.fna` (uncompressed)
//! - `.fa.gz`, `.fasta.gz`, `.fna.gz` (gzip compressed)
//! - `.fa.bgz`, `.fasta.bgz`, `.fna.bgz` (bgzip compressed)

use std::ffi::OsStr;
use std::io::{BufRead, Write};
use std::path::Path;

use noodles::fasta;

use crate::core::read::{ReadBatch, ReadRecord};
use crate::parsing::{open_text, ParseError};
use crate::utils::validation::check_read_limit;

/// Check if the path has a FASTA extension
pub fn is_fasta_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();

    // Check for gzipped FASTA
    if path_str.ends_with(".fa.gz")
        || path_str.ends_with(".fasta.gz")
        || path_str.ends_with(".fna.gz")
        || path_str.ends_with(".fa.bgz")
        || path_str.ends_with(".fasta.bgz")
        || path_str.ends_with(".fna.bgz")
    {
        return true;
    }

    // Check for uncompressed FASTA
    matches!(
        path.extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase)
            .as_deref(),
        Some("fa" | "fasta" | "fna")
    )
}

/// Parse FASTA reads, indexed in file order.
///
/// Records with an empty sequence are skipped and counted.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles` if
/// parsing fails, or `ParseError::TooManyReads` if the limit is exceeded.
pub fn parse_fasta_reads(path: &Path) -> Result<ReadBatch, ParseError> {
    let mut reader = fasta::io::Reader::new(open_text(path)?);
    parse_fasta_reader(&mut reader)
}

/// Parse from a noodles FASTA reader
fn parse_fasta_reader<R: BufRead>(reader: &mut fasta::io::Reader<R>) -> Result<ReadBatch, ParseError> {
    let mut batch = ReadBatch::default();

    for result in reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;

        let sequence = String::from_utf8_lossy(record.sequence().as_ref()).to_string();
        if sequence.is_empty() {
            batch.skipped += 1;
            continue;
        }

        // Check read limit for DOS protection
        let index = batch.reads.len();
        if check_read_limit(index).is_some() {
            return Err(ParseError::TooManyReads(index));
        }

        let name = String::from_utf8_lossy(record.name()).to_string();
        batch.reads.push(ReadRecord::new(index, name, sequence));
    }

    Ok(batch)
}

/// Write reads as single-line FASTA records
///
/// # Errors
///
/// Returns an IO error if writing fails.
pub fn write_fasta<'a, W: Write>(
    writer: &mut W,
    reads: impl IntoIterator<Item = &'a ReadRecord>,
) -> std::io::Result<()> {
    for read in reads {
        writeln!(writer, ">{}", read.id)?;
        writeln!(writer, "{}", read.sequence)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_is_fasta_file() {
        assert!(is_fasta_file(Path::new("reads.fa")));
        assert!(is_fasta_file(Path::new("reads.fasta.gz")));
        assert!(is_fasta_file(Path::new("/path/to/Reads.FNA")));

        assert!(!is_fasta_file(Path::new("reads.txt")));
        assert!(!is_fasta_file(Path::new("reads.sam")));
    }

    #[test]
    fn test_parse_fasta_reads() {
        let mut temp = NamedTempFile::with_suffix(".fa").unwrap();
        temp.write_all(b">r1 description\nACGTACGT\nACGT\n>r2\nGGGG\n")
            .unwrap();
        temp.flush().unwrap();

        let batch = parse_fasta_reads(temp.path()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.reads[0].id, "r1");
        assert_eq!(batch.reads[0].sequence, "ACGTACGTACGT");
        assert_eq!(batch.reads[1].index, 1);
    }

    #[test]
    fn test_write_fasta() {
        let reads = [ReadRecord::new(0, "r1", "ACGT"), ReadRecord::new(1, "r2", "GG")];
        let mut out = Vec::new();
        write_fasta(&mut out, &reads).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), ">r1\nACGT\n>r2\nGG\n");
    }
}
