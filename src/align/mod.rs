//! Species calls from an external short-read aligner.
//!
//! Reads are bucketed by their coarse genus call. Each bucket is written to a
//! temporary FASTA and aligned against the genus' reference index by running
//! a configurable command; the SAM on stdout is reduced to one best hit per
//! read. Any failure for a bucket turns its reads into `NA` calls.

pub mod hits;
pub mod runner;

pub use hits::{best_hits, BestHit};
pub use runner::{AlignError, AlignerConfig, AlignerRunner};
