//! Steric clashes between a prey and a larger reference structure of the bait.
//!
//! The model is superposed onto the reference on the bait chain, the model's
//! own bait is deleted, and clashes are counted three times: in the model
//! alone, in model and reference together, and in the reference alone. What
//! remains after subtracting the two self-clash counts is the number of prey
//! atoms that collide with the reference.

use crate::chimerax::{parse_count, StructureTool};
use crate::config::{BAIT_CHAIN, PREY_CHAIN};
use crate::error::{RecordFailure, RecordOutcome, Result};
use crate::utils::{par_map_ordered, write_df_to_file, DataFrameFileType};
use polars::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

static CLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"STATUS:\n(No|\d+) clash(?:es)?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClashCounts {
    pub input_only: i64,
    pub reference_only: i64,
    pub both: i64,
    pub between: i64,
}

impl ClashCounts {
    pub fn new(input_only: i64, reference_only: i64, both: i64) -> Self {
        Self {
            input_only,
            reference_only,
            both,
            between: both - input_only - reference_only,
        }
    }
}

pub fn clash_script(model: &Path, reference: &Path, plddt_cutoff: f64) -> String {
    format!(
        "open {model}
delete #1/{PREY_CHAIN} @@bfactor<{plddt_cutoff}
clashes ignoreHiddenModels true
open {reference}
match #1 to #2
select #1/{BAIT_CHAIN}
delete atoms sel
delete bonds sel
clashes ignoreHiddenModels true
hide #1 models
clashes ignoreHiddenModels true
exit
",
        model = model.display(),
        reference = reference.display(),
    )
}

/// Read the three clash counts, reported in the order model, both, reference.
pub fn parse_clash_output(stdout: &str) -> RecordOutcome<ClashCounts> {
    let counts: Vec<i64> = CLASHES
        .captures_iter(stdout)
        .filter_map(|caps| parse_count(&caps[1]))
        .collect();
    match counts[..] {
        [input_only, both, reference_only] => {
            Ok(ClashCounts::new(input_only, reference_only, both))
        }
        _ => Err(RecordFailure::new(format!(
            "expected 3 clash counts, found {}",
            counts.len()
        ))),
    }
}

pub fn measure_clashes(
    tool: &dyn StructureTool,
    model: &Path,
    reference: &Path,
    plddt_cutoff: f64,
) -> RecordOutcome<ClashCounts> {
    let output = tool.run_script(&clash_script(model, reference, plddt_cutoff))?;
    match parse_clash_output(&output.stdout) {
        Ok(counts) => {
            debug!(
                "Clashes between {} and {}: {}",
                model.display(),
                reference.display(),
                counts.between
            );
            Ok(counts)
        }
        Err(failure) => {
            error!(
                "Clash calculation failed for {} and {} ({failure}):\n{}",
                model.display(),
                reference.display(),
                output.transcript()
            );
            Err(failure)
        }
    }
}

/// Clash table with nulls for models that could not be measured.
pub fn clash_frame(models: &[PathBuf], outcomes: &[RecordOutcome<ClashCounts>]) -> Result<DataFrame> {
    let count = |f: fn(&ClashCounts) -> i64| -> Vec<Option<i64>> {
        outcomes.iter().map(|o| o.as_ref().ok().map(f)).collect()
    };
    let df = df!(
        "model" => models.iter().map(|m| m.to_string_lossy().to_string()).collect::<Vec<_>>(),
        "input clashes" => count(|c| c.input_only),
        "reference clashes" => count(|c| c.reference_only),
        "both clashes" => count(|c| c.both),
        "between clashes" => count(|c| c.between),
    )?;
    Ok(df)
}

/// Measure every model against `reference` and save the clash table.
pub fn process_models(
    tool: &dyn StructureTool,
    models: &[PathBuf],
    reference: &Path,
    plddt_cutoff: f64,
    output_file: &Path,
) -> Result<PathBuf> {
    let outcomes = par_map_ordered(models, |model| {
        measure_clashes(tool, model, reference, plddt_cutoff)
    });
    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed > 0 {
        warn!("{failed} of {} models could not be checked for clashes", models.len());
    }

    let mut df = clash_frame(models, &outcomes)?;
    let written = write_df_to_file(&mut df, output_file, DataFrameFileType::Csv)?;
    info!("Saved clashes of {} models to {}", models.len(), written.display());
    Ok(written)
}
