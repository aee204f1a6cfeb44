//! Command-line interface for taxa-cascade.
//!
//! Available commands:
//!
//! - **classify**: Run a cascade topology over k-merized reads and threshold the result
//! - **refine**: Species calls from genus classifiers, guided by a coarse classifier
//! - **align**: Species calls from an external aligner, guided by a coarse classifier
//! - **expand**: Turn Kraken-style output into per-read lineages
//! - **ensemble**: Merge specialized species calls into a coarse classifier's lineages
//! - **evaluate**: Score predicted lineages against a truth set
//!
//! ## Usage
//!
//! ```text
//! # Classify with the per-node cascade
//! taxa-cascade classify reads.txt --taxonomy lineages.tsv --taxa taxa.txt \
//!     --models models/ --topology lcpn --output calls.tsv
//!
//! # Expand Kraken output through an NCBI taxdump
//! taxa-cascade expand kraken.out --taxonomy taxdump/ --format tsv > coarse.tsv
//!
//! # Refine species and merge with the coarse lineage
//! taxa-cascade refine reads.txt --coarse coarse.tsv --models models/ -o species.tsv
//! taxa-cascade ensemble --coarse coarse.tsv --specialized species.tsv -o final.tsv
//!
//! # Score against the truth
//! taxa-cascade evaluate final.tsv --truth truth.tsv --format json
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::{Parser, Subcommand};

use crate::core::lineage::{Lineage, ReadLineage};
use crate::core::types::Rank;

pub mod align;
pub mod classify;
pub mod ensemble;
pub mod evaluate;
pub mod expand;
pub mod refine;

#[derive(Parser)]
#[command(name = "taxa-cascade")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Hierarchical taxonomic classification of sequencing reads")]
#[command(
    long_about = "taxa-cascade assigns a species-to-phylum lineage to short reads by combining per-rank classifiers.\n\nIt provides:\n- Four cascade topologies (LCL, LCPN, LCL-LCPN, hierarchy-informed LCL)\n- A bottom-up confidence threshold for the final call\n- Species refinement guided by a coarse classifier, by model or by alignment\n- Ensembles of specialized and coarse calls, and per-rank evaluation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify reads with a cascade of per-rank classifiers
    Classify(classify::ClassifyArgs),

    /// Refine species calls with genus classifiers
    Refine(refine::RefineArgs),

    /// Call species by aligning reads against per-genus references
    Align(align::AlignArgs),

    /// Expand Kraken-style output into lineages
    Expand(expand::ExpandArgs),

    /// Merge specialized species calls with coarse lineages
    Ensemble(ensemble::EnsembleArgs),

    /// Score predicted lineages against a truth set
    Evaluate(evaluate::EvaluateArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Buffered writer for `path`, or stdout when none is given
pub(crate) fn create_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    })
}

/// Common fields of every JSON report
pub(crate) fn report_header(command: &str) -> serde_json::Map<String, serde_json::Value> {
    let mut header = serde_json::Map::new();
    header.insert("tool".to_string(), env!("CARGO_PKG_NAME").into());
    header.insert("version".to_string(), env!("CARGO_PKG_VERSION").into());
    header.insert("command".to_string(), command.into());
    header.insert(
        "generated_at".to_string(),
        chrono::Utc::now().to_rfc3339().into(),
    );
    header
}

/// Write a JSON report: the common header plus `body`'s fields
pub(crate) fn write_report(
    path: Option<&Path>,
    command: &str,
    body: serde_json::Value,
) -> anyhow::Result<()> {
    let mut report = report_header(command);
    if let serde_json::Value::Object(fields) = body {
        report.extend(fields);
    }

    let mut out = create_output(path)?;
    serde_json::to_writer_pretty(&mut out, &serde_json::Value::Object(report))?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Read id to genus call, from a coarse classifier's lineages
pub(crate) fn genus_calls(rows: &[ReadLineage]) -> HashMap<String, String> {
    rows.iter()
        .map(|row| (row.read_id.clone(), row.lineage.get(Rank::Genus).to_string()))
        .collect()
}

/// A lineage as a `{rank: name}` object
pub(crate) fn lineage_json(lineage: &Lineage) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> = Rank::ALL
        .iter()
        .map(|rank| (rank.as_str().to_string(), lineage.get(*rank).into()))
        .collect();
    serde_json::Value::Object(fields)
}

/// Count of rows per species label, most frequent first
pub(crate) fn species_counts(rows: &[ReadLineage]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.lineage.get(Rank::Species)).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
