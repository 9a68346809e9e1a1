//! Locating predicted models in an AlphaFold 3 output folder.
//!
//! A run folder holds one subfolder per target. Each target has a
//! `<name>_ranking_scores.csv` table and one `seed-<seed>_sample-<sample>`
//! folder per replica containing the replica's `model.cif`.

use crate::error::{Result, ScreenError};
use crate::structure::resolve_model;
use crate::utils::{cast_columns, find_file, list_subdirectories, par_map_ordered, read_csv};
use polars::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static REPLICA_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"seed-(\d+)_sample-(\d+)").unwrap());

/// One seed/sample replica of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId {
    pub seed: i64,
    pub sample: i64,
}

impl ReplicaId {
    pub fn new(seed: i64, sample: i64) -> Self {
        Self { seed, sample }
    }

    /// Parse a `seed-<n>_sample-<m>` folder name.
    pub fn from_folder_name(name: &str) -> Option<Self> {
        let caps = REPLICA_FOLDER.captures(name)?;
        Some(Self::new(caps[1].parse().ok()?, caps[2].parse().ok()?))
    }

    pub fn folder_name(&self) -> String {
        format!("seed-{}_sample-{}", self.seed, self.sample)
    }
}

/// Whether a file name is a raw AlphaFold model (not a smoothed copy).
pub fn is_raw_model_file(name: &str) -> bool {
    name.ends_with("model.cif")
}

/// The raw model file of a replica folder, if there is one.
pub fn find_replica_model(replica_dir: &Path) -> Result<Option<PathBuf>> {
    find_file(replica_dir, is_raw_model_file)
}

/// Replicas of a target ordered by descending `ranking_score`, truncated to
/// `limit` entries when one is given.
pub fn ranked_replicas(target_dir: &Path, limit: Option<usize>) -> Result<Vec<ReplicaId>> {
    let ranking_file = find_file(target_dir, |name| name.ends_with("_ranking_scores.csv"))?
        .ok_or_else(|| ScreenError::MissingArtifact {
            dir: target_dir.to_path_buf(),
            pattern: String::from("*_ranking_scores.csv"),
        })?;

    let ranking = cast_columns(
        read_csv(&ranking_file)?,
        &[
            (String::from("seed"), DataType::Int64),
            (String::from("sample"), DataType::Int64),
            (String::from("ranking_score"), DataType::Float64),
        ],
    )?
    .sort(
        ["ranking_score"],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_maintain_order(true),
    )?;

    let seeds = ranking.column("seed")?.i64()?;
    let samples = ranking.column("sample")?.i64()?;
    let replicas = seeds
        .into_iter()
        .zip(samples.into_iter())
        .filter_map(|(seed, sample)| Some(ReplicaId::new(seed?, sample?)))
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    Ok(replicas)
}

/// Selected models of one target, passed through the smoothing cache.
///
/// Replicas whose folder or model file is missing, or whose smoothing fails,
/// are skipped with a warning.
pub fn process_target_folder(
    target_dir: &Path,
    window: Option<usize>,
    limit: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let mut model_files = Vec::new();
    for replica in ranked_replicas(target_dir, limit)? {
        let replica_dir = target_dir.join(replica.folder_name());
        if !replica_dir.is_dir() {
            warn!("Missing replica folder {}", replica_dir.display());
            continue;
        }
        let Some(model_file) = find_replica_model(&replica_dir)? else {
            warn!("No model.cif in {}", replica_dir.display());
            continue;
        };
        match resolve_model(&model_file, window) {
            Ok(path) => model_files.push(path),
            Err(e) => warn!("Skipping {}: {e}", model_file.display()),
        }
    }
    debug!(
        "Selected {} models from {}",
        model_files.len(),
        target_dir.display()
    );
    Ok(model_files)
}

/// All selected models of a run folder, target by target.
///
/// Targets are processed in parallel on the current rayon pool. The result
/// keeps target folders in name order and replicas in ranking order. Target
/// folders that are not valid AlphaFold outputs are skipped with a warning.
pub fn discover_models(
    run_folder: &Path,
    window: Option<usize>,
    limit: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let targets = list_subdirectories(run_folder)?;
    let per_target = par_map_ordered(&targets, |target| {
        process_target_folder(target, window, limit)
    });

    let mut model_files = Vec::new();
    for (target, models) in targets.iter().zip(per_target) {
        match models {
            Ok(models) => model_files.extend(models),
            Err(e) => warn!("Skipping target folder {}: {e}", target.display()),
        }
    }
    info!(
        "Found {} model files in {}",
        model_files.len(),
        run_folder.display()
    );
    Ok(model_files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::structure::derived_path;

    /// Write a fake target folder with the given `(seed, sample, score)` rows.
    pub(crate) fn write_target(run: &Path, name: &str, rows: &[(i64, i64, f64)]) -> PathBuf {
        let target = run.join(name);
        std::fs::create_dir_all(&target).unwrap();
        let mut csv = String::from("seed,sample,ranking_score\n");
        for (seed, sample, score) in rows {
            csv.push_str(&format!("{seed},{sample},{score}\n"));
            let replica = target.join(ReplicaId::new(*seed, *sample).folder_name());
            std::fs::create_dir_all(&replica).unwrap();
            std::fs::write(replica.join("model.cif"), "").unwrap();
        }
        std::fs::write(target.join(format!("{name}_ranking_scores.csv")), csv).unwrap();
        target
    }

    #[test]
    fn parses_replica_folders() {
        assert_eq!(
            ReplicaId::from_folder_name("seed-12_sample-3"),
            Some(ReplicaId::new(12, 3))
        );
        assert_eq!(ReplicaId::new(1, 0).folder_name(), "seed-1_sample-0");
        assert!(ReplicaId::from_folder_name("ranking_scores.csv").is_none());
    }

    #[test]
    fn ranks_replicas_by_score() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(
            dir.path(),
            "q5s007_bait",
            &[(1, 0, 0.5), (1, 1, 0.9), (2, 0, 0.7)],
        );
        assert_eq!(
            ranked_replicas(&target, None).unwrap(),
            vec![
                ReplicaId::new(1, 1),
                ReplicaId::new(2, 0),
                ReplicaId::new(1, 0)
            ]
        );
        assert_eq!(ranked_replicas(&target, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn skips_malformed_targets_and_replicas() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_target(dir.path(), "b_target", &[(1, 0, 0.2), (1, 1, 0.8)]);
        // No ranking table at all
        std::fs::create_dir_all(dir.path().join("a_broken")).unwrap();
        // Ranked replica without its folder
        let partial = write_target(dir.path(), "c_partial", &[(3, 0, 0.4)]);
        std::fs::remove_dir_all(partial.join("seed-3_sample-0")).unwrap();

        let models = run_discovery(dir.path(), None, None);
        assert_eq!(
            models,
            vec![
                good.join("seed-1_sample-1").join("model.cif"),
                good.join("seed-1_sample-0").join("model.cif"),
            ]
        );
    }

    #[test]
    fn resolves_through_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_target(dir.path(), "t", &[(1, 0, 0.2)]);
        let raw = target.join("seed-1_sample-0").join("model.cif");
        std::fs::write(derived_path(&raw, 11), "cached").unwrap();

        let models = run_discovery(dir.path(), Some(11), Some(5));
        assert_eq!(models, vec![derived_path(&raw, 11)]);

        // The smoothed copy must not be mistaken for a raw model
        assert_eq!(
            find_replica_model(&target.join("seed-1_sample-0")).unwrap(),
            Some(raw)
        );
    }

    fn run_discovery(run: &Path, window: Option<usize>, limit: Option<usize>) -> Vec<PathBuf> {
        crate::utils::run_with_threads(2, || discover_models(run, window, limit)).unwrap()
    }
}
