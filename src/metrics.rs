//! Confidence scores of every selected replica of a run folder.
//!
//! AlphaFold 3 writes two JSON files next to each model: per-atom values in
//! `*_confidences.json` and per-prediction scalars in
//! `*_summary_confidences.json`. Both are reduced to one table row per replica.

use crate::config::{RunFolder, BAIT_CHAIN, PREY_CHAIN};
use crate::discovery::{find_replica_model, ranked_replicas, ReplicaId};
use crate::error::{RecordFailure, RecordOutcome, Result};
use crate::utils::{find_file, list_subdirectories, par_map_ordered, write_df_to_file, DataFrameFileType};
use polars::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct Confidences {
    atom_plddts: Vec<f64>,
    #[serde(default)]
    atom_chain_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SummaryConfidences {
    iptm: Option<f64>,
    ptm: Option<f64>,
}

/// Mean pLDDT of the whole model and of each labelled chain, scaled to 0-1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlddtSummary {
    pub overall: f64,
    pub bait: Option<f64>,
    pub prey: Option<f64>,
}

/// Scores of one replica.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaMetrics {
    pub model: PathBuf,
    pub target: String,
    pub replica: ReplicaId,
    pub uniprot_link: String,
    pub iptm: Option<f64>,
    pub ptm: Option<f64>,
    pub plddt: PlddtSummary,
}

/// UniProt accession encoded in a target folder name.
///
/// Folder names start with the accession (`Q5S007_LRRK2_bait`), except for
/// FASTA-style headers where a two-letter database tag comes first
/// (`sp_Q5S007_...`).
pub fn uniprot_id_from_target(target: &str) -> String {
    let mut tokens = target.split('_');
    let first = tokens.next().unwrap_or_default();
    if first.chars().count() == 2 {
        if let Some(second) = tokens.next() {
            return second.to_string();
        }
    }
    first.to_string()
}

pub fn uniprot_link(uniprot_id: &str) -> String {
    format!("https://www.uniprot.org/uniprotkb/{uniprot_id}/entry")
}

/// Reduce per-atom pLDDT values to the overall and per-chain means.
///
/// When chain labels are given they must cover every atom, and the bait and
/// prey chains together must account for all atoms.
pub fn summarize_plddts(
    plddts: &[f64],
    chain_ids: Option<&[String]>,
) -> RecordOutcome<PlddtSummary> {
    if plddts.is_empty() {
        return Err(RecordFailure::new("confidences contain no atom pLDDT values"));
    }
    let overall = mean(plddts.iter().copied()) / 100.0;
    let Some(chain_ids) = chain_ids else {
        return Ok(PlddtSummary {
            overall,
            bait: None,
            prey: None,
        });
    };

    if chain_ids.len() != plddts.len() {
        return Err(RecordFailure::new(format!(
            "{} atom pLDDT values but {} atom chain ids",
            plddts.len(),
            chain_ids.len()
        )));
    }
    let chain_values = |chain: &str| -> Vec<f64> {
        plddts
            .iter()
            .zip(chain_ids)
            .filter(|(_, id)| id.as_str() == chain)
            .map(|(v, _)| *v)
            .collect()
    };
    let bait = chain_values(BAIT_CHAIN);
    let prey = chain_values(PREY_CHAIN);
    if bait.len() + prey.len() != plddts.len() {
        return Err(RecordFailure::new(format!(
            "{BAIT_CHAIN} ({}) and {PREY_CHAIN} ({}) atoms do not add up to {} atoms",
            bait.len(),
            prey.len(),
            plddts.len()
        )));
    }

    let chain_mean = |values: Vec<f64>| {
        if values.is_empty() {
            None
        } else {
            Some(mean(values.into_iter()) / 100.0)
        }
    };
    Ok(PlddtSummary {
        overall,
        bait: chain_mean(bait),
        prey: chain_mean(prey),
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    sum / count as f64
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> RecordOutcome<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RecordFailure::new(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| RecordFailure::new(format!("cannot parse {}: {e}", path.display())))
}

fn require_file(dir: &Path, pattern: &str, matches: impl Fn(&str) -> bool) -> RecordOutcome<PathBuf> {
    find_file(dir, matches)
        .map_err(|e| RecordFailure::new(format!("cannot list {}: {e}", dir.display())))?
        .ok_or_else(|| RecordFailure::new(format!("no {pattern} in {}", dir.display())))
}

/// Scores of one replica folder.
pub fn replica_metrics(target_dir: &Path, replica: ReplicaId) -> RecordOutcome<ReplicaMetrics> {
    let replica_dir = target_dir.join(replica.folder_name());
    if !replica_dir.is_dir() {
        return Err(RecordFailure::new(format!(
            "missing replica folder {}",
            replica_dir.display()
        )));
    }

    let model = find_replica_model(&replica_dir)
        .map_err(|e| RecordFailure::new(e.to_string()))?
        .ok_or_else(|| RecordFailure::new(format!("no model.cif in {}", replica_dir.display())))?;
    let confidences_file = require_file(&replica_dir, "confidences.json", |name| {
        name.ends_with("confidences.json") && !name.ends_with("summary_confidences.json")
    })?;
    let summary_file = require_file(&replica_dir, "summary_confidences.json", |name| {
        name.ends_with("summary_confidences.json")
    })?;

    let confidences: Confidences = read_json(&confidences_file)?;
    let summary: SummaryConfidences = read_json(&summary_file)?;
    let plddt = summarize_plddts(
        &confidences.atom_plddts,
        confidences.atom_chain_ids.as_deref(),
    )?;

    let target = target_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(ReplicaMetrics {
        model,
        uniprot_link: uniprot_link(&uniprot_id_from_target(&target)),
        target,
        replica,
        iptm: summary.iptm,
        ptm: summary.ptm,
        plddt,
    })
}

/// Scores of the selected replicas of one target; unusable replicas are
/// skipped with a warning.
pub fn target_metrics(target_dir: &Path, limit: Option<usize>) -> Result<Vec<ReplicaMetrics>> {
    let mut records = Vec::new();
    for replica in ranked_replicas(target_dir, limit)? {
        match replica_metrics(target_dir, replica) {
            Ok(record) => records.push(record),
            Err(failure) => warn!(
                "Skipping {} in {}: {failure}",
                replica.folder_name(),
                target_dir.display()
            ),
        }
    }
    Ok(records)
}

/// Scores of every target in a run folder, sorted by target, seed and sample.
pub fn collect_run_metrics(run_folder: &Path, limit: Option<usize>) -> Result<Vec<ReplicaMetrics>> {
    let targets = list_subdirectories(run_folder)?;
    let per_target = par_map_ordered(&targets, |target| target_metrics(target, limit));

    let mut records = Vec::new();
    for (target, result) in targets.iter().zip(per_target) {
        match result {
            Ok(target_records) => records.extend(target_records),
            Err(e) => warn!("Skipping target folder {}: {e}", target.display()),
        }
    }
    records.sort_by(|a, b| {
        a.target
            .cmp(&b.target)
            .then_with(|| a.replica.cmp(&b.replica))
    });
    Ok(records)
}

/// Build the raw results table of the run labelled `run`.
pub fn metrics_frame(run: &str, records: &[ReplicaMetrics]) -> Result<DataFrame> {
    let df = df!(
        "model" => records.iter().map(|r| r.model.to_string_lossy().to_string()).collect::<Vec<_>>(),
        "run" => vec![run.to_string(); records.len()],
        "target" => records.iter().map(|r| r.target.clone()).collect::<Vec<_>>(),
        "seed" => records.iter().map(|r| r.replica.seed).collect::<Vec<_>>(),
        "sample" => records.iter().map(|r| r.replica.sample).collect::<Vec<_>>(),
        "uniprot link" => records.iter().map(|r| r.uniprot_link.clone()).collect::<Vec<_>>(),
        "ipTM" => records.iter().map(|r| r.iptm).collect::<Vec<_>>(),
        "pTM" => records.iter().map(|r| r.ptm).collect::<Vec<_>>(),
        "pLDDT" => records.iter().map(|r| r.plddt.overall).collect::<Vec<_>>(),
        "pLDDT_BAIT" => records.iter().map(|r| r.plddt.bait).collect::<Vec<_>>(),
        "pLDDT_PREY" => records.iter().map(|r| r.plddt.prey).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

/// Extract and save the raw results table of one run folder.
pub fn process_run(run: &RunFolder, output_file: &Path, limit: Option<usize>) -> Result<PathBuf> {
    info!("Processing {}", run.folder.display());
    let records = collect_run_metrics(&run.folder, limit)?;
    let mut df = metrics_frame(&run.label(), &records)?;
    debug!("Raw results for {}:\n{df}", run.label());
    let written = write_df_to_file(&mut df, output_file, DataFrameFileType::Csv)?;
    info!(
        "Saved scores of {} replicas to {}",
        df.height(),
        written.display()
    );
    Ok(written)
}
