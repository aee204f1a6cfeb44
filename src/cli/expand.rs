//! Expand command - Kraken-style coarse output to per-read lineages.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use crate::cli::{create_output, lineage_json, species_counts, write_report, OutputFormat};
use crate::parsing;
use crate::parsing::coarse::expand_calls;
use crate::taxonomy::load_taxonomy;

#[derive(Args)]
pub struct ExpandArgs {
    /// Kraken-style output (`C|U<TAB>read_id<TAB>taxid...`), '-' for stdin
    #[arg(required = true)]
    pub input: PathBuf,

    /// Taxonomy: an NCBI taxdump directory or a lineage TSV with a taxid column
    #[arg(long, required = true)]
    pub taxonomy: PathBuf,

    /// Output file (stdout by default)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the expand command
///
/// # Errors
///
/// Returns an error if the input or taxonomy cannot be read.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: ExpandArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let parsed = parsing::coarse::parse_coarse_file(&args.input)?;
    let db = load_taxonomy(&args.taxonomy)?;
    if verbose {
        eprintln!(
            "Coarse calls: {} ({} skipped)",
            parsed.calls.len(),
            parsed.skipped
        );
    }

    let rows = expand_calls(&parsed.calls, db.as_ref());
    let unclassified = parsed.calls.iter().filter(|c| c.taxid.is_none()).count();

    match format {
        OutputFormat::Text => {
            if let Some(path) = &args.output {
                let mut out = create_output(Some(path.as_path()))?;
                parsing::tsv::write_lineages(&mut out, &rows)?;
                out.flush()?;
            }
            println!(
                "\nExpanded {} reads ({unclassified} unclassified, {} skipped)",
                rows.len(),
                parsed.skipped
            );
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
                "expand",
                serde_json::json!({
                    "summary": {
                        "reads": rows.len(),
                        "unclassified": unclassified,
                        "skipped": parsed.skipped,
                    },
                    "reads": reads,
                }),
            )?;
        }
    }

    Ok(())
}
