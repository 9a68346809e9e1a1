use super::ConfigArgs;
use clap::Parser;
use pulldown::config::{Pipeline, PipelineConfig, PulldownConfig};
use pulldown::error::Result;
use pulldown::launch::{
    check_pair_template, generate_complex, generate_pulldown_run, load_template, resolve_records,
};
use pulldown::sequences::read_sequences;
use pulldown::uniprot::UniProtClient;
use std::path::Path;
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
    match &config.pipeline {
        Pipeline::Pulldown(pulldown) => pulldown_inputs(&config, pulldown),
        Pipeline::Complex(complex) => {
            let written = generate_complex(&config, complex)?;
            info!(
                "Wrote {} complex inputs to {}",
                written.len(),
                complex.output_folder.display()
            );
            Ok(())
        }
    }
}

fn pulldown_inputs(config: &PipelineConfig, pulldown: &PulldownConfig) -> Result<()> {
    let client = UniProtClient::new()?;
    let fetch = |id: &str, folder: &Path| client.download_fasta(id, folder);

    let bait_folder = pulldown
        .bait_filename
        .parent()
        .unwrap_or_else(|| Path::new("."));
    let bait_source = read_sequences(&pulldown.bait_filename, config.max_id_length)?;
    let baits = resolve_records(bait_source, bait_folder, config.max_id_length, &fetch)?;
    info!("Loaded {} bait sequence(s)", baits.len());

    let template = load_template(&config.template_file, config.number_of_seeds)?;
    check_pair_template(&template)?;

    for run in pulldown.runs() {
        generate_pulldown_run(config, &template, &baits, run, &fetch)?;
    }
    Ok(())
}
