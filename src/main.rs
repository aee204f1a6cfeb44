use clap::Parser;
use tracing_subscriber::EnvFilter;

use taxa_cascade::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("taxa_cascade=debug,info")
    } else {
        EnvFilter::new("taxa_cascade=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Classify(args) => {
            cli::classify::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Refine(args) => {
            cli::refine::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Align(args) => {
            cli::align::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Expand(args) => {
            cli::expand::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Ensemble(args) => {
            cli::ensemble::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Evaluate(args) => {
            cli::evaluate::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
