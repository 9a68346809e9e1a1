use super::ConfigArgs;
use clap::Parser;
use pulldown::chimerax::ChimeraX;
use pulldown::clashes::process_models;
use pulldown::config::PulldownConfig;
use pulldown::discovery::discover_models;
use pulldown::error::{Result, ScreenError};
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
    if pulldown.clash_settings().is_none() {
        return Err(ScreenError::config(
            "clashes_model and max_clashes_threshold are required for the clash stage",
        ));
    }
    run_with_threads(args.common.threads(&config), || compute(pulldown))
}

/// Clashes with the reference structure for every run folder. Does nothing
/// without a configured reference.
pub(crate) fn compute(config: &PulldownConfig) -> Result<()> {
    let Some(settings) = config.clash_settings() else {
        return Ok(());
    };
    let tool = ChimeraX::new(&config.chimerax);
    let layout = config.layout();
    for run in config.runs() {
        let label = run.label();
        info!("Calculating clashes for {label}");
        let models = discover_models(
            &run.folder,
            config.plddt_sliding_window,
            config.models_per_target,
        )?;
        process_models(
            &tool,
            &models,
            &settings.reference,
            config.plddt_cutoff,
            &layout.clashes(&label),
        )?;
    }
    Ok(())
}
