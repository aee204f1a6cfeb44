use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::hits::{best_hits, BestHit};
use crate::cascade::routing::group_by_label;
use crate::core::prediction::{RoutedRead, SpeciesCall};
use crate::core::read::ReadRecord;
use crate::core::types::{is_absent, OTHER};
use crate::parsing::fasta::write_fasta;
use crate::parsing::sam::parse_alignments;
use crate::parsing::ParseError;
use crate::utils::validation::{artifact_key, validate_key};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum AlignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid aligner command: {0}")]
    InvalidCommand(String),

    #[error("Aligner timed out after {0}s")]
    Timeout(u64),

    #[error("Aligner exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Could not parse aligner output: {0}")]
    Parse(#[from] ParseError),
}

/// External aligner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignerConfig {
    /// Command template; `{index}` and `{reads}` are replaced per bucket
    pub command: String,
    pub timeout_secs: u64,
    /// Appended to the genus key to name its index, e.g. `Escherichia.fa`
    pub index_suffix: String,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            command: "bwa mem -v 0 {index} {reads}".to_string(),
            timeout_secs: 600,
            index_suffix: ".fa".to_string(),
        }
    }
}

/// Calls species by aligning each genus bucket against that genus' references
#[derive(Debug, Clone)]
pub struct AlignerRunner {
    config: AlignerConfig,
    index_dir: PathBuf,
}

impl AlignerRunner {
    #[must_use]
    pub fn new(config: AlignerConfig, index_dir: &Path) -> Self {
        Self {
            config,
            index_dir: index_dir.to_path_buf(),
        }
    }

    /// Reference index for a genus
    #[must_use]
    pub fn index_path(&self, genus: &str) -> PathBuf {
        self.index_dir
            .join(format!("{}{}", artifact_key(genus), self.config.index_suffix))
    }

    /// Expand the command template
    ///
    /// # Errors
    ///
    /// Returns `AlignError::InvalidCommand` if the template is empty or never
    /// names `{reads}`.
    pub fn command_for(&self, index: &Path, reads: &Path) -> Result<Vec<String>, AlignError> {
        if !self.config.command.contains("{reads}") {
            return Err(AlignError::InvalidCommand(format!(
                "'{}' has no {{reads}} placeholder",
                self.config.command
            )));
        }

        let index = index.display().to_string();
        let reads = reads.display().to_string();
        let argv: Vec<String> = self
            .config
            .command
            .split_whitespace()
            .map(|token| token.replace("{index}", &index).replace("{reads}", &reads))
            .collect();

        if argv.is_empty() {
            return Err(AlignError::InvalidCommand("empty command".to_string()));
        }
        Ok(argv)
    }

    /// Align one bucket of reads against `index` and return best hits
    ///
    /// # Errors
    ///
    /// Returns an `AlignError` if the temp file cannot be written, the aligner
    /// fails or times out, or its output cannot be read.
    pub fn align_bucket(
        &self,
        index: &Path,
        reads: &[&ReadRecord],
    ) -> Result<HashMap<String, BestHit>, AlignError> {
        let mut fasta = tempfile::Builder::new()
            .prefix("taxa-cascade-")
            .suffix(".fa")
            .tempfile()?;
        write_fasta(&mut fasta, reads.iter().copied())?;
        fasta.flush()?;

        let argv = self.command_for(index, fasta.path())?;
        let output = run_with_timeout(&argv, Duration::from_secs(self.config.timeout_secs))?;
        let alignments = parse_alignments(output.as_slice())?;
        Ok(best_hits(&alignments.records))
    }

    /// Species call per read, bucketed by coarse genus.
    ///
    /// Reads without a genus call, without an index for their genus, in a
    /// bucket whose aligner failed, or without any alignment get `NA`.
    /// Scores are raw aligner scores. Output is ordered by read index.
    #[must_use]
    pub fn call_species(
        &self,
        reads: &[ReadRecord],
        coarse_genus: &HashMap<String, String>,
    ) -> Vec<SpeciesCall> {
        let by_index: HashMap<usize, &ReadRecord> = reads.iter().map(|r| (r.index, r)).collect();
        let prior: Vec<RoutedRead> = reads
            .iter()
            .map(|read| RoutedRead {
                label: coarse_genus
                    .get(&read.id)
                    .filter(|genus| !is_absent(genus) && genus.as_str() != OTHER)
                    .cloned()
                    .unwrap_or_default(),
                index: read.index,
            })
            .collect();
        let buckets: Vec<(String, Vec<usize>)> = group_by_label(prior).into_iter().collect();

        let mut calls: Vec<(usize, SpeciesCall)> = buckets
            .par_iter()
            .flat_map_iter(|(genus, indexes)| {
                let bucket: Vec<&ReadRecord> = indexes
                    .iter()
                    .filter_map(|index| by_index.get(index).copied())
                    .collect();
                bucket
                    .iter()
                    .map(|read| read.index)
                    .zip(self.call_bucket(genus, &bucket))
                    .collect::<Vec<_>>()
            })
            .collect();
        calls.sort_by_key(|(index, _)| *index);

        let called = calls.iter().filter(|(_, c)| !is_absent(&c.species)).count();
        info!(reads = calls.len(), called, buckets = buckets.len(), "Aligned reads");
        calls.into_iter().map(|(_, call)| call).collect()
    }

    /// Calls for one bucket, in bucket order
    fn call_bucket(&self, genus: &str, reads: &[&ReadRecord]) -> Vec<SpeciesCall> {
        let unavailable = || -> Vec<SpeciesCall> {
            reads
                .iter()
                .map(|read| SpeciesCall::unavailable(read.id.clone(), 0.0))
                .collect()
        };

        if genus.is_empty() || validate_key(&artifact_key(genus)).is_err() {
            return unavailable();
        }
        let index = self.index_path(genus);
        if !index.exists() {
            debug!(genus, index = %index.display(), "No reference index for genus");
            return unavailable();
        }

        let hits = match self.align_bucket(&index, reads) {
            Ok(hits) => hits,
            Err(err) => {
                warn!(genus, reads = reads.len(), error = %err, "Aligner failed for bucket");
                return unavailable();
            }
        };

        reads
            .iter()
            .map(|read| match hits.get(&read.id) {
                Some(hit) => SpeciesCall::new(read.id.clone(), hit.species.clone(), score_to_f64(hit.score)),
                None => SpeciesCall::unavailable(read.id.clone(), 0.0),
            })
            .collect()
    }
}

#[inline]
fn score_to_f64(score: i64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        score as f64
    }
}

/// Run `argv`, returning stdout; the process is killed once `timeout` passes
fn run_with_timeout(argv: &[String], timeout: Duration) -> Result<Vec<u8>, AlignError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| AlignError::InvalidCommand("empty command".to_string()))?;

    debug!(command = %argv.join(" "), "Running aligner");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes on their own threads so the child never blocks on a full pipe
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > timeout {
            child.kill().ok();
            child.wait().ok();
            return Err(AlignError::Timeout(timeout.as_secs()));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let stdout = collect(stdout)?;
    let stderr = collect(stderr)?;

    if !status.success() {
        return Err(AlignError::Failed {
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> std::thread::JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    })
}

fn collect(
    handle: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, AlignError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| std::io::Error::other("output reader panicked"))?
            .map_err(AlignError::from),
        None => Ok(Vec::new()),
    }
}
