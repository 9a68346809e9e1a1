use super::ConfigArgs;
use clap::Parser;
use pulldown::config::PulldownConfig;
use pulldown::error::Result;
use pulldown::metrics::process_run;
use pulldown::utils::run_with_threads;
use tracing::trace;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    #[command(flatten)]
    common: ConfigArgs,
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");
    let config = args.common.load()?;
    let pulldown = config.pulldown()?;
    run_with_threads(args.common.threads(&config), || compute(pulldown))
}

/// Confidence table of every run folder.
pub(crate) fn compute(config: &PulldownConfig) -> Result<()> {
    let layout = config.layout();
    for run in config.runs() {
        process_run(run, &layout.raw_results(&run.label()), config.models_per_target)?;
    }
    Ok(())
}
