//! Align command - species calls from an external aligner.
//!
//! Scores are raw `AS:i` alignment scores, written as `alignment_score` so a
//! later `ensemble` run does not hold them to its probability threshold.

use std::path::PathBuf;

use clap::Args;

use crate::align::AlignerRunner;
use crate::cli::refine::emit_species_calls;
use crate::cli::{genus_calls, OutputFormat};
use crate::config::CascadeConfig;
use crate::parsing;

#[derive(Args)]
pub struct AlignArgs {
    /// Reads as FASTA (plain or gzip)
    #[arg(required = true)]
    pub reads: PathBuf,

    /// Coarse classifier lineages (TSV with read_id and rank columns)
    #[arg(long, required = true)]
    pub coarse: PathBuf,

    /// Directory holding one reference index per genus
    #[arg(long, required = true)]
    pub index_dir: PathBuf,

    /// Aligner command template with {index} and {reads} placeholders
    /// (overrides the config file)
    #[arg(long)]
    pub command: Option<String>,

    /// Seconds before an aligner run is killed (overrides the config file)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file (stdout by default). Scores are raw alignment scores in an
    /// `alignment_score` column, not probabilities
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the align command
///
/// # Errors
///
/// Returns an error if inputs cannot be read or the config is invalid.
/// Aligner failures are not errors; the affected reads are called `NA`.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: AlignArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut config = CascadeConfig::load_or_default(args.config.as_deref())?;
    if let Some(command) = &args.command {
        config.aligner.command.clone_from(command);
    }
    if let Some(timeout) = args.timeout {
        config.aligner.timeout_secs = timeout;
    }
    config.validate()?;

    let batch = parsing::fasta::parse_fasta_reads(&args.reads)?;
    let coarse = parsing::tsv::parse_lineages_file(&args.coarse)?;
    if verbose {
        eprintln!(
            "Reads: {} ({} skipped), coarse calls: {}, aligner: {}",
            batch.len(),
            batch.skipped,
            coarse.len(),
            config.aligner.command
        );
    }

    let runner = AlignerRunner::new(config.aligner, &args.index_dir);
    let calls = runner.call_species(&batch.reads, &genus_calls(&coarse));
    emit_species_calls(
        &calls,
        "align",
        parsing::tsv::ALIGNMENT_SCORE_COLUMN,
        args.output.as_deref(),
        format,
    )
}
