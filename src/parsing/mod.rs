//! Parsers and writers for the files a classification run reads and produces.
//!
//! This module provides parsers for:
//!
//! - **K-merized reads**: one read per line, `id<TAB>k-mers` or bare k-mers
//! - **Coarse classifier output**: Kraken-style per-read taxid calls
//! - **Tabular results**: lineage, species-call and prediction-matrix TSV files
//! - **FASTA reads**: nucleotide reads for the alignment caller
//! - **SAM alignments**: best-hit extraction from aligner output
//!
//! Every text input may be gzip-compressed (`.gz` / `.bgz`), and `-` reads
//! from stdin.
//!
//! ## Example
//!
//! ```rust,no_run
//! use taxa_cascade::parsing::reads::parse_reads_file;
//! use std::path::Path;
//!
//! let batch = parse_reads_file(Path::new("reads.txt.gz")).unwrap();
//! println!("{} reads ({} skipped)", batch.len(), batch.skipped);
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;

pub mod coarse;
pub mod fasta;
pub mod reads;
pub mod sam;
pub mod tsv;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Too many reads: {0} exceeds maximum allowed")]
    TooManyReads(usize),
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
#[must_use]
pub fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Open a text input, decompressing gzip and mapping `-` to stdin
///
/// Every gzip member is read, so bgzip and concatenated files come back whole.
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>, std::io::Error> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }

    let file = File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};

    #[test]
    fn test_is_gzipped() {
        assert!(is_gzipped(Path::new("reads.txt.gz")));
        assert!(is_gzipped(Path::new("reads.TXT.BGZ")));
        assert!(!is_gzipped(Path::new("reads.txt")));
    }

    #[test]
    fn test_open_text_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.txt.gz");

        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"r1\tAAA CCC\n").unwrap();
        encoder.finish().unwrap();

        let mut text = String::new();
        open_text(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "r1\tAAA CCC\n");
    }

    #[test]
    fn test_open_text_reads_every_gzip_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.txt.bgz");

        // bgzip layout: independent members back to back
        let mut file = File::create(&path).unwrap();
        for block in [&b"r1\tAAA CCC\n"[..], &b"r2\tGGG TTT\n"[..]] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(block).unwrap();
            file.write_all(&encoder.finish().unwrap()).unwrap();
        }
        drop(file);

        let batch = reads::parse_reads_file(&path).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.reads[1].id, "r2");
        assert_eq!(batch.reads[1].sequence, "GGG TTT");
    }
}
