pub(crate) mod analyze;
pub(crate) mod binding;
pub(crate) mod clashes;
pub(crate) mod inputs;
pub(crate) mod merge;
pub(crate) mod metrics;
pub(crate) mod overlap;
pub(crate) mod pipeline;
pub(crate) mod smooth;

use pulldown::config::PipelineConfig;
use pulldown::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// Arguments shared by every command that reads the pipeline configuration.
#[derive(clap::Args, Debug, Clone)]
pub(crate) struct ConfigArgs {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    pub(crate) config: PathBuf,

    /// Number of threads to use for parallel processing
    /// (defaults to `process_count` from the configuration)
    #[arg(short = 'j', long = "num-threads")]
    pub(crate) num_threads: Option<usize>,
}

impl ConfigArgs {
    pub(crate) fn load(&self) -> Result<PipelineConfig> {
        PipelineConfig::from_file(&self.config)
    }

    pub(crate) fn threads(&self, config: &PipelineConfig) -> usize {
        let n = self.num_threads.unwrap_or(config.process_count);
        debug!("Using {n} thread(s) (0 for all cores)");
        n
    }
}
