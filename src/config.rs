//! Pipeline configuration.
//!
//! A configuration file is TOML with a handful of shared keys and a
//! `[pipeline]` table whose `mode` selects one of the pipeline variants. Each
//! variant only carries the keys that make sense for it, so stages never have
//! to guess whether an optional setting applies to the current run.
//!
//! ```toml
//! number_of_seeds = 2
//! template_file = "inputs/alphafold3_input_template.json"
//!
//! [pipeline]
//! mode = "pulldown"
//! bait_filename = "inputs/bait_LRRK2_ROC_COR.fasta"
//! output_dir = "results"
//! plddt_sliding_window = 11
//!
//! [[pipeline.domains]]
//! name = "ROC"
//! residues = [1332, 1521]
//!
//! [[pipeline.superfolders]]
//! name = "GEF"
//! runs = [{ fasta = "inputs/GEF.fasta", folder = "GEF_SCREEN" }]
//! ```

use crate::error::{Result, ScreenError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Chain label of the fixed protein in every prediction.
pub const BAIT_CHAIN: &str = "BAIT";
/// Chain label of the screened candidate in every prediction.
pub const PREY_CHAIN: &str = "PREY";

fn default_max_combined_seq_length() -> usize {
    10000
}

fn default_process_count() -> usize {
    6
}

fn default_max_id_length() -> usize {
    40
}

fn default_database_folder() -> String {
    String::from("$HOME/public_databases")
}

fn default_model_weights_folder() -> String {
    String::from("$HOME/")
}

fn default_metric() -> ConfidenceMetric {
    ConfidenceMetric::IpTm
}

fn default_metric_threshold() -> f64 {
    0.4
}

fn default_min_contacts_thresholds() -> Vec<i64> {
    vec![1, 20, 80]
}

fn default_plddt_cutoff() -> f64 {
    40.0
}

fn default_chimerax() -> PathBuf {
    PathBuf::from("chimerax")
}

/// Root configuration, loaded once at startup and passed to every stage.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of AlphaFold 3 model seeds written into every input file
    pub number_of_seeds: usize,

    /// AlphaFold 3 input JSON used as the template for every job
    pub template_file: PathBuf,

    /// Jobs whose summed sequence length exceeds this are not generated
    #[serde(default = "default_max_combined_seq_length")]
    pub max_combined_seq_length: usize,

    /// Worker count for parallel stages (0 uses all cores)
    #[serde(default = "default_process_count")]
    pub process_count: usize,

    /// Sequence identifiers are truncated to this many characters
    #[serde(default = "default_max_id_length")]
    pub max_id_length: usize,

    /// Host folder with the AlphaFold 3 databases, mounted into the container
    #[serde(default = "default_database_folder")]
    pub database_folder: String,

    /// Host folder with the AlphaFold 3 weights, mounted into the container
    #[serde(default = "default_model_weights_folder")]
    pub model_weights_folder: String,

    pub pipeline: Pipeline,
}

/// The pipeline variants. Selected by `mode` in the `[pipeline]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Pipeline {
    /// One bait screened against many preys, followed by scoring and filtering
    Pulldown(PulldownConfig),
    /// Every combination of a protein set around a fixed core
    Complex(ComplexConfig),
}

/// Settings of the bait-vs-prey screen.
#[derive(Debug, Clone, Deserialize)]
pub struct PulldownConfig {
    /// FASTA (or accession list) with the bait sequence(s)
    pub bait_filename: PathBuf,

    /// Root folder for every table the downstream stages write
    pub output_dir: PathBuf,

    /// Groups of prediction runs that are reported together
    pub superfolders: Vec<Superfolder>,

    /// Partition of the bait chain into named domains
    pub domains: Vec<Domain>,

    /// Larger structure of the bait used to count clashes with the prey
    #[serde(default)]
    pub clashes_model: Option<PathBuf>,

    /// Maximum number of prey-reference clashes of an accepted model
    #[serde(default)]
    pub max_clashes_threshold: Option<i64>,

    /// Residue window for smoothing prey pLDDT values; unset keeps raw models
    #[serde(default)]
    pub plddt_sliding_window: Option<usize>,

    /// Number of top-ranked models per target; unset keeps all of them
    #[serde(default)]
    pub models_per_target: Option<usize>,

    #[serde(default = "default_metric")]
    pub prediction_threshold_metric: ConfidenceMetric,

    #[serde(default = "default_metric_threshold")]
    pub prediction_threshold_value: f64,

    /// Minimum domain contact counts for the combination columns
    #[serde(default = "default_min_contacts_thresholds")]
    pub min_contacts_thresholds: Vec<i64>,

    /// Prey atoms with a (smoothed) pLDDT below this are deleted before measuring
    #[serde(default = "default_plddt_cutoff")]
    pub plddt_cutoff: f64,

    /// ChimeraX executable
    #[serde(default = "default_chimerax")]
    pub chimerax: PathBuf,
}

/// Settings of the complex-combination run.
#[derive(Debug, Clone, Deserialize)]
pub struct ComplexConfig {
    pub input_fasta: PathBuf,
    pub output_folder: PathBuf,

    /// Proteins present in every generated complex
    pub fixed_proteins: Vec<String>,

    /// Extra complexes to predict on top of the generated combinations
    #[serde(default)]
    pub custom_predictions: Vec<Vec<String>>,
}

/// A named set of run folders whose results are merged into one report.
#[derive(Debug, Clone, Deserialize)]
pub struct Superfolder {
    pub name: String,
    pub runs: Vec<RunFolder>,
}

/// One prediction run: the prey FASTA it was generated from and the folder
/// AlphaFold 3 wrote its targets into.
#[derive(Debug, Clone, Deserialize)]
pub struct RunFolder {
    pub fasta: PathBuf,
    pub folder: PathBuf,
}

impl RunFolder {
    /// Short name of the run, used as the prefix of every table it produces.
    pub fn label(&self) -> String {
        run_label(&self.folder)
    }
}

/// Named inclusive residue range of the bait chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Domain {
    pub name: String,
    pub residues: [usize; 2],
}

impl Domain {
    pub fn new(name: &str, start: usize, end: usize) -> Self {
        Self {
            name: name.to_string(),
            residues: [start, end],
        }
    }

    pub fn start(&self) -> usize {
        self.residues[0]
    }

    pub fn end(&self) -> usize {
        self.residues[1]
    }

    pub fn area_column(&self) -> String {
        format!("{}_area", self.name)
    }

    pub fn contacts_column(&self) -> String {
        format!("{}_contacts", self.name)
    }
}

/// Confidence score used to rank and accept models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ConfidenceMetric {
    #[serde(rename = "ipTM")]
    IpTm,
    #[serde(rename = "pTM")]
    PTm,
    #[serde(rename = "pLDDT")]
    PLddt,
}

impl ConfidenceMetric {
    /// Column holding this metric in the raw results table.
    pub fn column(&self) -> &'static str {
        match self {
            ConfidenceMetric::IpTm => "ipTM",
            ConfidenceMetric::PTm => "pTM",
            ConfidenceMetric::PLddt => "pLDDT",
        }
    }
}

impl std::fmt::Display for ConfidenceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// Reference structure and bound for the clash stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ClashSettings {
    pub reference: PathBuf,
    pub max_between: i64,
}

impl PipelineConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_seeds == 0 {
            return Err(ScreenError::config("number_of_seeds must be at least 1"));
        }
        if self.max_id_length == 0 {
            return Err(ScreenError::config("max_id_length must be at least 1"));
        }
        match &self.pipeline {
            Pipeline::Pulldown(p) => p.validate(),
            Pipeline::Complex(c) => c.validate(self.max_id_length),
        }
    }

    /// The pulldown settings, or a configuration error for other modes.
    pub fn pulldown(&self) -> Result<&PulldownConfig> {
        match &self.pipeline {
            Pipeline::Pulldown(p) => Ok(p),
            Pipeline::Complex(_) => Err(ScreenError::config(
                "this command is only available for `mode = \"pulldown\"` configurations",
            )),
        }
    }
}

impl PulldownConfig {
    fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(ScreenError::config("at least one bait domain is required"));
        }
        let mut names = HashSet::new();
        for domain in &self.domains {
            if domain.name.is_empty() {
                return Err(ScreenError::config("domain names must not be empty"));
            }
            if !names.insert(domain.name.as_str()) {
                return Err(ScreenError::config(format!(
                    "domain '{}' is defined more than once",
                    domain.name
                )));
            }
            if domain.start() > domain.end() {
                return Err(ScreenError::config(format!(
                    "domain '{}' starts after it ends ({}-{})",
                    domain.name,
                    domain.start(),
                    domain.end()
                )));
            }
        }

        if self.superfolders.is_empty() {
            return Err(ScreenError::config("at least one superfolder is required"));
        }
        let mut labels = HashSet::new();
        for superfolder in &self.superfolders {
            if superfolder.runs.is_empty() {
                return Err(ScreenError::config(format!(
                    "superfolder '{}' has no runs",
                    superfolder.name
                )));
            }
            for run in &superfolder.runs {
                if !labels.insert(run.label()) {
                    return Err(ScreenError::config(format!(
                        "run folder '{}' is listed more than once",
                        run.folder.display()
                    )));
                }
            }
        }

        if self.plddt_sliding_window == Some(0) {
            return Err(ScreenError::config("plddt_sliding_window must be at least 1"));
        }
        if self.models_per_target == Some(0) {
            return Err(ScreenError::config("models_per_target must be at least 1"));
        }
        if self.min_contacts_thresholds.is_empty() {
            return Err(ScreenError::config(
                "min_contacts_thresholds must list at least one threshold",
            ));
        }
        if !self.prediction_threshold_value.is_finite() {
            return Err(ScreenError::config(
                "prediction_threshold_value must be a finite number",
            ));
        }
        if self.clashes_model.is_some() != self.max_clashes_threshold.is_some() {
            return Err(ScreenError::config(
                "clashes_model and max_clashes_threshold must be set together",
            ));
        }
        Ok(())
    }

    /// Clash stage settings, present only when a reference model is configured.
    pub fn clash_settings(&self) -> Option<ClashSettings> {
        match (&self.clashes_model, self.max_clashes_threshold) {
            (Some(reference), Some(max_between)) => Some(ClashSettings {
                reference: reference.clone(),
                max_between,
            }),
            _ => None,
        }
    }

    pub fn domain_names(&self) -> Vec<String> {
        self.domains.iter().map(|d| d.name.clone()).collect()
    }

    /// All run folders, in configuration order.
    pub fn runs(&self) -> impl Iterator<Item = &RunFolder> {
        self.superfolders.iter().flat_map(|s| s.runs.iter())
    }

    /// File name layout of every table under `output_dir`.
    pub fn layout(&self) -> OutputLayout {
        OutputLayout {
            root: self.output_dir.clone(),
            window: self.plddt_sliding_window,
        }
    }
}

impl ComplexConfig {
    fn validate(&self, max_id_length: usize) -> Result<()> {
        let fixed = self.truncated_fixed_proteins(max_id_length);
        if fixed.is_empty() {
            return Err(ScreenError::config("at least one fixed protein is required"));
        }
        let unique: HashSet<&String> = fixed.iter().collect();
        if unique.len() != fixed.len() {
            return Err(ScreenError::config(format!(
                "fixed_proteins contains duplicate entries after truncation to {max_id_length} characters"
            )));
        }
        Ok(())
    }

    /// Fixed protein identifiers as they appear in a parsed FASTA file.
    pub fn truncated_fixed_proteins(&self, max_id_length: usize) -> Vec<String> {
        self.fixed_proteins
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| p.chars().take(max_id_length).collect())
            .collect()
    }
}

/// Short name of a run folder (its last path component).
pub fn run_label(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| folder.to_string_lossy().to_string())
}

/// Where each stage reads and writes its tables.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub window: Option<usize>,
}

impl OutputLayout {
    /// Suffix that ties a table to the smoothing window it was computed with.
    pub fn window_label(&self) -> String {
        match self.window {
            Some(w) => format!("plddt_window_{w}"),
            None => String::from("raw"),
        }
    }

    pub fn raw_results(&self, run: &str) -> PathBuf {
        self.root
            .join("output_raw_results")
            .join(format!("{run}_results.csv"))
    }

    pub fn binding_domain(&self, run: &str) -> PathBuf {
        self.root
            .join("output_binding_domain")
            .join(format!("{run}_binding_domain_{}.csv", self.window_label()))
    }

    pub fn clashes(&self, run: &str) -> PathBuf {
        self.root
            .join("output_all_clashes")
            .join(format!("{run}_clashes_{}.csv", self.window_label()))
    }

    /// Merged table of a run folder or of a whole superfolder.
    pub fn merged(&self, name: &str) -> PathBuf {
        self.root
            .join("output_merged_results")
            .join(format!("{name}_merged_{}.csv", self.window_label()))
    }

    /// Accepted models of a superfolder, without extension.
    pub fn analysis(&self, superfolder: &str) -> PathBuf {
        self.root
            .join("output_analyze_results")
            .join(format!("{superfolder}_analysis_{}", self.window_label()))
    }

    pub fn filtered_report(&self, superfolder: &str) -> PathBuf {
        self.root
            .join("output_analyze_results")
            .join(format!("{superfolder}_filtered_{}.tsv", self.window_label()))
    }

    pub fn combination_counts(&self, superfolder: &str) -> PathBuf {
        self.root.join("output_analyze_results").join(format!(
            "{superfolder}_combination_counts_{}.csv",
            self.window_label()
        ))
    }
}
