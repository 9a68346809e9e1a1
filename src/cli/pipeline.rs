use super::ConfigArgs;
use clap::Parser;
use pulldown::error::Result;
use pulldown::utils::{run_with_threads, DataFrameFileType};
use tracing::{info, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    #[command(flatten)]
    common: ConfigArgs,

    /// Output file type of the accepted models table
    #[arg(short = 't', long = "file-type", default_value = "csv")]
    output_format: DataFrameFileType,

    /// Skip UniProt lookups in the final report
    #[arg(long)]
    offline: bool,
}

/// Metrics, binding domains, clashes, merge and analysis in order.
pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");
    let config = args.common.load()?;
    let pulldown = config.pulldown()?;

    run_with_threads(args.common.threads(&config), || -> Result<()> {
        info!("Collecting prediction metrics");
        super::metrics::compute(pulldown)?;
        info!("Calculating binding domains");
        super::binding::compute(pulldown)?;
        if pulldown.clash_settings().is_some() {
            info!("Calculating clashes");
            super::clashes::compute(pulldown)?;
        }
        info!("Merging tables");
        super::merge::compute(pulldown)?;
        info!("Analyzing results");
        super::analyze::compute(pulldown, args.output_format, args.offline)
    })
}
