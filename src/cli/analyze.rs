use super::ConfigArgs;
use clap::Parser;
use pulldown::config::PulldownConfig;
use pulldown::error::Result;
use pulldown::report::{analyze_superfolder, FilterSettings};
use pulldown::uniprot::{MetadataSource, Offline, UniProtClient};
use pulldown::utils::DataFrameFileType;
use tracing::{info, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    #[command(flatten)]
    common: ConfigArgs,

    /// Output file type of the accepted models table
    #[arg(short = 't', long = "file-type", default_value = "csv")]
    output_format: DataFrameFileType,

    /// Skip UniProt lookups; protein names and organisms are left empty
    #[arg(long)]
    offline: bool,
}

pub(crate) fn run(args: &Args) -> Result<()> {
    trace!("{args:?}");
    let config = args.common.load()?;
    compute(config.pulldown()?, args.output_format, args.offline)
}

pub(crate) fn compute(
    config: &PulldownConfig,
    file_type: DataFrameFileType,
    offline: bool,
) -> Result<()> {
    let source: Box<dyn MetadataSource> = if offline {
        Box::new(Offline)
    } else {
        Box::new(UniProtClient::new()?)
    };
    let layout = config.layout();
    let settings = FilterSettings::from_config(config);
    for superfolder in &config.superfolders {
        let outputs = analyze_superfolder(
            superfolder,
            &layout,
            &config.domains,
            &config.min_contacts_thresholds,
            &settings,
            source.as_ref(),
            file_type,
        )?;
        info!(
            "Report for {} saved to {}",
            superfolder.name,
            outputs.report.display()
        );
    }
    Ok(())
}
