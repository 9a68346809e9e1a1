use clap::Parser;
use pulldown::discovery::discover_models;
use pulldown::error::Result;
use pulldown::structure::smooth_plddt;
use pulldown::utils::run_with_threads;
use std::path::PathBuf;
use tracing::{info, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Model file, or an AlphaFold 3 run folder whose models are all smoothed
    #[arg(short, long)]
    input: PathBuf,

    /// Number of residues averaged around each prey residue
    #[arg(short, long)]
    window: usize,

    /// Only smooth the top-ranked models of each target
    #[arg(short = 'n', long = "models-per-target")]
    models_per_target: Option<usize>,

    /// Number of threads to use for parallel processing
    #[arg(short = 'j', long = "num-threads", default_value_t = 0)]
    num_threads: usize,
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");
    if args.input.is_dir() {
        let models = run_with_threads(args.num_threads, || {
            discover_models(&args.input, Some(args.window), args.models_per_target)
        })?;
        info!("{} smoothed models available", models.len());
    } else {
        let output_file = smooth_plddt(&args.input, args.window)?;
        println!("{}", output_file.display());
    }
    Ok(())
}
