use super::ConfigArgs;
use clap::Parser;
use pulldown::config::PulldownConfig;
use pulldown::error::Result;
use pulldown::merge::merge_superfolder;
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
    compute(config.pulldown()?)
}

pub(crate) fn compute(config: &PulldownConfig) -> Result<()> {
    let layout = config.layout();
    let with_clashes = config.clash_settings().is_some();
    for superfolder in &config.superfolders {
        merge_superfolder(
            superfolder,
            &layout,
            &config.domains,
            &config.min_contacts_thresholds,
            with_clashes,
        )?;
    }
    Ok(())
}
