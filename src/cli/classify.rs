//! Classify command - run a cascade topology and threshold the matrix.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use crate::cascade::CascadeEngine;
use crate::cli::{create_output, lineage_json, species_counts, write_report, OutputFormat};
use crate::config::CascadeConfig;
use crate::core::lineage::ReadLineage;
use crate::core::types::Topology;
use crate::inference::{FinalCall, ThresholdEvaluator};
use crate::parsing::{self, open_text};
use crate::registry::store::DirectoryStore;
use crate::registry::ClassifierRegistry;
use crate::taxonomy::{load_taxonomy, TaxonomyHierarchy};

#[derive(Args)]
pub struct ClassifyArgs {
    /// K-merized reads, one per line (`id<TAB>k-mers` or bare k-mers)
    /// Use '-' for stdin; gzip is detected from the extension
    #[arg(required = true)]
    pub reads: PathBuf,

    /// Taxonomy: a lineage TSV or an NCBI taxdump directory
    #[arg(long, required = true)]
    pub taxonomy: PathBuf,

    /// Taxa the classifiers were trained on, one per line
    #[arg(long, required = true)]
    pub taxa: PathBuf,

    /// Directory of `<key>_model.json` classifier artifacts
    #[arg(long, required = true)]
    pub models: PathBuf,

    /// Inference topology (overrides the config file)
    #[arg(long, value_enum)]
    pub topology: Option<Topology>,

    /// Confidence threshold for the final call (overrides the config file)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Worker threads (overrides the config file)
    #[arg(long)]
    pub threads: Option<usize>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Also write the raw prediction matrix to this file
    #[arg(long)]
    pub matrix: Option<PathBuf>,

    /// Output file (stdout by default)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the classify command
///
/// # Errors
///
/// Returns an error if inputs cannot be read or the engine cannot start.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: ClassifyArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let mut config = CascadeConfig::load_or_default(args.config.as_deref())?;
    if let Some(topology) = args.topology {
        config.topology = topology;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    config.validate()?;

    let batch = parsing::reads::parse_reads_file(&args.reads)?;
    if verbose {
        eprintln!("Reads: {} accepted, {} skipped", batch.len(), batch.skipped);
    }

    let db = load_taxonomy(&args.taxonomy)?;
    let taxa = read_taxa(&args.taxa)?;
    let hierarchy = TaxonomyHierarchy::build(&taxa, db.as_ref());
    let registry = ClassifierRegistry::new(DirectoryStore::open(&args.models)?);

    let mut engine = CascadeEngine::new(&hierarchy, &registry);
    if let Some(threads) = config.threads {
        engine = engine.with_threads(threads)?;
    }

    let matrix = engine.run(&batch.reads, config.topology)?;
    if let Some(path) = &args.matrix {
        let mut out = create_output(Some(path.as_path()))?;
        parsing::tsv::write_matrix(&mut out, &matrix, &batch.reads)?;
        out.flush()?;
    }

    let evaluator = ThresholdEvaluator::new(config.threshold);
    let calls = evaluator.evaluate(&matrix);
    let ids: HashMap<usize, &str> = batch.reads.iter().map(|r| (r.index, r.id.as_str())).collect();
    let rows: Vec<ReadLineage> = calls
        .iter()
        .map(|call| {
            let id = ids.get(&call.index).copied().unwrap_or_default();
            ReadLineage::new(id, call.lineage(&hierarchy))
        })
        .collect();

    let classified = calls.iter().filter(|c| c.is_classified()).count();
    info!(reads = rows.len(), classified, topology = %config.topology, "Classified reads");

    match format {
        OutputFormat::Text => {
            if let Some(path) = &args.output {
                write_rows(Some(path.as_path()), &rows)?;
            }
            print_text(&config, &calls, &rows, batch.skipped);
        }
        OutputFormat::Tsv => write_rows(args.output.as_deref(), &rows)?,
        OutputFormat::Json => {
            let reads: Vec<serde_json::Value> = calls
                .iter()
                .zip(&rows)
                .map(|(call, row)| {
                    serde_json::json!({
                        "read_id": row.read_id,
                        "rank": call.rank,
                        "label": call.label,
                        "score": call.score,
                        "lineage": lineage_json(&row.lineage),
                    })
                })
                .collect();
            write_report(
                args.output.as_deref(),
                "classify",
                serde_json::json!({
                    "topology": config.topology,
                    "threshold": evaluator.threshold(),
                    "summary": {
                        "reads": rows.len(),
                        "skipped": batch.skipped,
                        "classified": classified,
                    },
                    "reads": reads,
                }),
            )?;
        }
    }

    Ok(())
}

/// One taxon per line; blank lines and `#` comments are ignored
fn read_taxa(path: &Path) -> anyhow::Result<Vec<String>> {
    let mut taxa = Vec::new();
    for line in open_text(path)?.lines() {
        let line = line?;
        let taxon = line.trim();
        if !taxon.is_empty() && !taxon.starts_with('#') {
            taxa.push(taxon.to_string());
        }
    }
    Ok(taxa)
}

fn write_rows(path: Option<&Path>, rows: &[ReadLineage]) -> anyhow::Result<()> {
    let mut out = create_output(path)?;
    parsing::tsv::write_lineages(&mut out, rows)?;
    out.flush()?;
    Ok(())
}

fn print_text(config: &CascadeConfig, calls: &[FinalCall], rows: &[ReadLineage], skipped: usize) {
    let classified = calls.iter().filter(|c| c.is_classified()).count();

    println!("\nTopology: {} (threshold {})", config.topology, config.threshold);
    println!("   Reads: {} classified of {} ({skipped} skipped)", classified, rows.len());

    let mut by_rank: Vec<(String, usize)> = Vec::new();
    for call in calls {
        let rank = call
            .rank
            .map_or_else(|| "unclassified".to_string(), |r| r.to_string());
        match by_rank.iter_mut().find(|(name, _)| *name == rank) {
            Some((_, count)) => *count += 1,
            None => by_rank.push((rank, 1)),
        }
    }
    println!("\n   Calls by rank:");
    for (rank, count) in &by_rank {
        println!("      {rank:<14} {count}");
    }

    println!("\n   Top species:");
    for (species, count) in species_counts(rows).iter().take(10) {
        println!("      {species:<40} {count}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_taxa_skips_comments() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# trained taxa\nEscherichia coli\n\n  Bacillus subtilis  ").unwrap();
        file.flush().unwrap();

        let taxa = read_taxa(file.path()).unwrap();
        assert_eq!(taxa, vec!["Escherichia coli", "Bacillus subtilis"]);
    }
}
