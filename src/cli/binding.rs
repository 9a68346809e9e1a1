use super::ConfigArgs;
use clap::Parser;
use pulldown::binding::process_models;
use pulldown::chimerax::ChimeraX;
use pulldown::config::PulldownConfig;
use pulldown::discovery::discover_models;
use pulldown::error::Result;
use pulldown::utils::run_with_threads;
use tracing::{info, trace};

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

/// Buried area and contacts per bait domain for every run folder.
pub(crate) fn compute(config: &PulldownConfig) -> Result<()> {
    let tool = ChimeraX::new(&config.chimerax);
    let layout = config.layout();
    for run in config.runs() {
        let label = run.label();
        info!("Calculating binding domains for {label}");
        let models = discover_models(
            &run.folder,
            config.plddt_sliding_window,
            config.models_per_target,
        )?;
        process_models(
            &tool,
            &models,
            &config.domains,
            &config.min_contacts_thresholds,
            config.plddt_cutoff,
            &layout.binding_domain(&label),
        )?;
    }
    Ok(())
}
