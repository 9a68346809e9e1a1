mod cli;

use clap::{Parser, Subcommand};
use tracing::{error, Level};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity of the program:
    /// -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write AlphaFold 3 input files and the launch script
    Inputs(cli::inputs::Args),

    /// Smooth the prey pLDDT values of predicted models
    Smooth(cli::smooth::Args),

    /// Collect ipTM, pTM and pLDDT of every model
    Metrics(cli::metrics::Args),

    /// Measure buried area and contacts per bait domain
    Binding(cli::binding::Args),

    /// Count clashes with a reference structure of the bait
    Clashes(cli::clashes::Args),

    /// Merge the per-run tables
    Merge(cli::merge::Args),

    /// Filter models and report the binding proteins
    Analyze(cli::analyze::Args),

    /// Run metrics, binding, clashes, merge and analyze in order
    Pipeline(cli::pipeline::Args),

    /// Compare two lists of proteins
    Overlap(cli::overlap::Args),
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Inputs(args) => cli::inputs::run(args),
        Commands::Smooth(args) => cli::smooth::run(args),
        Commands::Metrics(args) => cli::metrics::run(args),
        Commands::Binding(args) => cli::binding::run(args),
        Commands::Clashes(args) => cli::clashes::run(args),
        Commands::Merge(args) => cli::merge::run(args),
        Commands::Analyze(args) => cli::analyze::run(args),
        Commands::Pipeline(args) => cli::pipeline::run(args),
        Commands::Overlap(args) => cli::overlap::run(args),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
