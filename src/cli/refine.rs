//! Refine command - species calls from genus classifiers.
//!
//! Reads are bucketed by a coarse classifier's genus call and each bucket is
//! classified by that genus' species model.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::cascade::CascadeEngine;
use crate::cli::{create_output, genus_calls, write_report, OutputFormat};
use crate::config::CascadeConfig;
use crate::core::prediction::SpeciesCall;
use crate::core::types::is_absent;
use crate::parsing;
use crate::registry::store::DirectoryStore;
use crate::registry::ClassifierRegistry;
use crate::taxonomy::TaxonomyHierarchy;

#[derive(Args)]
pub struct RefineArgs {
    /// K-merized reads, one per line (`id<TAB>k-mers` or bare k-mers)
    #[arg(required = true)]
    pub reads: PathBuf,

    /// Coarse classifier lineages (TSV with read_id and rank columns)
    #[arg(long, required = true)]
    pub coarse: PathBuf,

    /// Directory of `<genus>_model.json` species classifiers
    #[arg(long, required = true)]
    pub models: PathBuf,

    /// Calls scoring below this become NA (overrides the config file)
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Worker threads (overrides the config file)
    #[arg(long)]
    pub threads: Option<usize>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file (stdout by default)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the refine command
///
/// # Errors
///
/// Returns an error if inputs cannot be read or the engine cannot start.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: RefineArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut config = CascadeConfig::load_or_default(args.config.as_deref())?;
    if let Some(min_score) = args.min_score {
        config.specialized_min_score = min_score;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    config.validate()?;

    let batch = parsing::reads::parse_reads_file(&args.reads)?;
    let coarse = parsing::tsv::parse_lineages_file(&args.coarse)?;
    if verbose {
        eprintln!(
            "Reads: {} ({} skipped), coarse calls: {}",
            batch.len(),
            batch.skipped,
            coarse.len()
        );
    }

    // Genus models are keyed by genus name; no hierarchy queries are needed
    let hierarchy = TaxonomyHierarchy::default();
    let registry = ClassifierRegistry::new(DirectoryStore::open(&args.models)?);
    let mut engine =
        CascadeEngine::new(&hierarchy, &registry).with_min_score(config.specialized_min_score);
    if let Some(threads) = config.threads {
        engine = engine.with_threads(threads)?;
    }

    let calls = engine.refine_species(&batch.reads, &genus_calls(&coarse))?;
    emit_species_calls(
        &calls,
        "refine",
        parsing::tsv::SCORE_COLUMN,
        args.output.as_deref(),
        format,
    )
}

/// Write species calls in the requested format; shared with the align command.
/// `score_column` names what the scores are in the TSV and JSON outputs.
pub(crate) fn emit_species_calls(
    calls: &[SpeciesCall],
    command: &str,
    score_column: &str,
    output: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let called = calls.iter().filter(|c| !is_absent(&c.species)).count();

    match format {
        OutputFormat::Text => {
            if output.is_some() {
                write_calls(output, calls, score_column)?;
            }
            println!("\nSpecies calls: {called} of {} reads", calls.len());
            println!("   NA: {}", calls.len() - called);
        }
        OutputFormat::Tsv => write_calls(output, calls, score_column)?,
        OutputFormat::Json => {
            write_report(
                output,
                command,
                serde_json::json!({
                    "summary": {
                        "reads": calls.len(),
                        "called": called,
                    },
                    "score_column": score_column,
                    "calls": calls,
                }),
            )?;
        }
    }
    Ok(())
}

fn write_calls(path: Option<&Path>, calls: &[SpeciesCall], score_column: &str) -> anyhow::Result<()> {
    let mut out = create_output(path)?;
    parsing::tsv::write_species_calls(&mut out, calls, score_column)?;
    out.flush()?;
    Ok(())
}
