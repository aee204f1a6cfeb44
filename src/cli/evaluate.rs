//! Evaluate command - per-rank metrics against a truth set.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;

use crate::cli::{create_output, write_report, OutputFormat};
use crate::evaluation::{evaluate, RankMetrics};
use crate::parsing;

#[derive(Args)]
pub struct EvaluateArgs {
    /// Predicted lineages (TSV with read_id and rank columns)
    #[arg(required = true)]
    pub predictions: PathBuf,

    /// True lineages, same layout
    #[arg(long, required = true)]
    pub truth: PathBuf,

    /// Output file for the TSV or JSON report (stdout by default)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the evaluate command
///
/// # Errors
///
/// Returns an error if either table cannot be read.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: EvaluateArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let predictions = parsing::tsv::parse_lineages_file(&args.predictions)?;
    let truth = parsing::tsv::parse_lineages_file(&args.truth)?;
    if verbose {
        eprintln!("Predictions: {}, truth: {}", predictions.len(), truth.len());
    }

    let metrics = evaluate(&truth, &predictions);

    match format {
        OutputFormat::Text => print_text(&metrics),
        OutputFormat::Tsv => write_tsv(args.output.as_deref(), &metrics)?,
        OutputFormat::Json => write_report(
            args.output.as_deref(),
            "evaluate",
            serde_json::json!({ "metrics": metrics }),
        )?,
    }

    Ok(())
}

fn print_text(metrics: &[RankMetrics]) {
    println!(
        "\n{:<10} {:>8} {:>6} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "rank", "reads", "taxa", "accuracy", "precision", "recall", "f1", "mcc"
    );
    for m in metrics {
        println!(
            "{:<10} {:>8} {:>6} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            m.rank.as_str(),
            m.reads,
            m.taxa,
            m.accuracy,
            m.precision,
            m.recall,
            m.f1,
            m.mcc
        );
    }
}

fn write_tsv(path: Option<&Path>, metrics: &[RankMetrics]) -> anyhow::Result<()> {
    let mut out = create_output(path)?;
    writeln!(out, "rank\treads\ttaxa\taccuracy\tprecision\trecall\tf1\tmcc")?;
    for m in metrics {
        writeln!(
            out,
            "{}\t{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}\t{:.4}",
            m.rank, m.reads, m.taxa, m.accuracy, m.precision, m.recall, m.f1, m.mcc
        )?;
    }
    out.flush()?;
    Ok(())
}
