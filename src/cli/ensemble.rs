//! Ensemble command - merge specialized species calls into coarse lineages.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use crate::cli::{create_output, lineage_json, species_counts, write_report, OutputFormat};
use crate::config::CascadeConfig;
use crate::inference::EnsembleCombiner;
use crate::parsing;

#[derive(Args)]
pub struct EnsembleArgs {
    /// Coarse classifier lineages (TSV with read_id and rank columns)
    #[arg(long, required = true)]
    pub coarse: PathBuf,

    /// Specialized species calls (TSV with read_id, species and optional score)
    #[arg(long)]
    pub specialized: Option<PathBuf>,

    /// A second coarse classifier's lineages, used where the first has no species
    #[arg(long)]
    pub fallback: Option<PathBuf>,

    /// Specialized calls scoring below this are ignored (overrides the config file)
    #[arg(long)]
    pub min_score: Option<f64>,

    /// JSON config file; its specialized_min_score applies when set
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file (stdout by default)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the ensemble command
///
/// # Errors
///
/// Returns an error if an input cannot be read, or if neither
/// `--specialized` nor `--fallback` is given.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: EnsembleArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if args.specialized.is_none() && args.fallback.is_none() {
        anyhow::bail!("Nothing to combine: give --specialized, --fallback, or both");
    }

    let mut coarse = parsing::tsv::parse_lineages_file(&args.coarse)?;
    if verbose {
        eprintln!("Coarse calls: {}", coarse.len());
    }

    if let Some(path) = &args.fallback {
        let secondary = parsing::tsv::parse_lineages_file(path)?;
        if verbose {
            eprintln!("Fallback calls: {}", secondary.len());
        }
        coarse = EnsembleCombiner::fallback_all(&coarse, &secondary);
    }

    let rows = match &args.specialized {
        Some(path) => {
            let calls = parsing::tsv::parse_species_calls_file(path)?;
            if verbose {
                eprintln!("Specialized calls: {}", calls.len());
            }

            let min_score = match (args.min_score, &args.config) {
                (Some(min_score), _) => Some(min_score),
                (None, Some(config)) => Some(CascadeConfig::load(config)?.specialized_min_score),
                (None, None) => None,
            };
            let combiner = min_score.map_or_else(EnsembleCombiner::new, |min| {
                EnsembleCombiner::new().with_min_score(min)
            });
            combiner.combine_all(&coarse, &calls)
        }
        None => coarse,
    };

    match format {
        OutputFormat::Text => {
            if let Some(path) = &args.output {
                let mut out = create_output(Some(path.as_path()))?;
                parsing::tsv::write_lineages(&mut out, &rows)?;
                out.flush()?;
            }
            println!("\nCombined {} reads", rows.len());
            println!("\n   Top species:");
            for (species, count) in species_counts(&rows).iter().take(10) {
                println!("      {species:<40} {count}");
            }
        }
        OutputFormat::Tsv => {
            let mut out = create_output(args.output.as_deref())?;
            parsing::tsv::write_lineages(&mut out, &rows)?;
            out.flush()?;
        }
        OutputFormat::Json => {
            let reads: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "read_id": row.read_id,
                        "lineage": lineage_json(&row.lineage),
                    })
                })
                .collect();
            write_report(
                args.output.as_deref(),
                "ensemble",
                serde_json::json!({
                    "summary": { "reads": rows.len() },
                    "reads": reads,
                }),
            )?;
        }
    }

    Ok(())
}
