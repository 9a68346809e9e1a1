//! Smoothed-pLDDT copies of predicted models.
//!
//! AlphaFold writes per-atom pLDDT into the B-factor column. Downstream
//! measurements delete prey atoms below a confidence cutoff, which works better
//! on a residue-level moving average than on raw per-atom values. The smoothed
//! model is written next to the raw one as
//! `<stem>_plddt_window_<window>.<ext>` and that file name is the cache key:
//! once it exists it is returned as-is and never recomputed.

use crate::chains::ChainExt;
use crate::config::PREY_CHAIN;
use crate::error::{Result, ScreenError};
use crate::utils::{load_model, save_model};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the smoothed copy of `raw` for a given window.
pub fn derived_path(raw: &Path, window: usize) -> PathBuf {
    let stem = raw
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match raw.extension() {
        Some(ext) => format!("{stem}_plddt_window_{window}.{}", ext.to_string_lossy()),
        None => format!("{stem}_plddt_window_{window}"),
    };
    raw.with_file_name(file_name)
}

/// Centered moving average with a window that shrinks at both ends.
///
/// Residue `i` averages `values[i - window/2 ..= i + window/2]`, clipped to the
/// valid range; there is no padding and no wraparound.
pub fn sliding_window_mean(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(values.len());
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Return the smoothed copy of `raw`, creating it on first use.
///
/// Only the prey chain is modified. The new file is written to a temporary
/// name in the same folder and renamed into place, so a reader never sees a
/// partially written model even when two workers race on the same key.
pub fn smooth_plddt(raw: &Path, window: usize) -> Result<PathBuf> {
    if window == 0 {
        return Err(ScreenError::config("pLDDT smoothing window must be at least 1"));
    }

    let output_file = derived_path(raw, window);
    if output_file.exists() {
        debug!("Reusing smoothed model {}", output_file.display());
        return Ok(output_file);
    }

    let mut pdb = load_model(raw)?;
    let mut found_chain = false;
    for model in pdb.models_mut() {
        for chain in model.chains_mut() {
            if chain.id() != PREY_CHAIN {
                continue;
            }
            found_chain = true;
            let smoothed = sliding_window_mean(&chain.residue_b_factors(), window);
            chain
                .set_residue_b_factors(&smoothed)
                .map_err(|e| ScreenError::structure(raw, e))?;
        }
    }
    if !found_chain {
        warn!(
            "No chain {PREY_CHAIN} in {}; writing the model unchanged",
            raw.display()
        );
    }

    let parent = output_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let suffix = match raw.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    };
    let staging = tempfile::Builder::new()
        .prefix(".plddt_window_")
        .suffix(&suffix)
        .tempfile_in(parent)?;
    save_model(&pdb, staging.path())?;
    staging.persist(&output_file).map_err(|e| e.error)?;

    info!(
        "Writing structure with new pLDDT scores to {}",
        output_file.display()
    );
    Ok(output_file)
}

/// Resolve a raw model through the cache, or keep it when smoothing is off.
pub fn resolve_model(raw: &Path, window: Option<usize>) -> Result<PathBuf> {
    match window {
        Some(w) => smooth_plddt(raw, w),
        None => Ok(raw.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdbtbx::*;

    fn fixture_copy(dir: &Path) -> PathBuf {
        let root = env!("CARGO_MANIFEST_DIR");
        let source = format!("{}/{}", root, "test-data/mini_model.cif");
        let target = dir.join("mini_model.cif");
        std::fs::copy(source, &target).unwrap();
        target
    }

    fn chain_b_factors(pdb: &PDB, chain_id: &str) -> Vec<f64> {
        pdb.chains()
            .find(|c| c.id() == chain_id)
            .unwrap()
            .residue_b_factors()
    }

    #[test]
    fn window_of_one_is_identity() {
        let values = vec![70.0, 55.5, 91.0, 12.0];
        assert_eq!(sliding_window_mean(&values, 1), values);
    }

    #[test]
    fn wide_window_is_global_mean() {
        let values = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        for window in [9, 10, 25] {
            assert!(sliding_window_mean(&values, window)
                .iter()
                .all(|v| (v - 30.0).abs() < 1e-9));
        }
    }

    #[test]
    fn window_shrinks_at_boundaries() {
        let smoothed = sliding_window_mean(&[10.0, 20.0, 60.0], 3);
        assert_eq!(smoothed, vec![15.0, 30.0, 40.0]);

        // Even windows reach the same number of residues on both sides
        assert_eq!(sliding_window_mean(&[10.0, 20.0, 60.0], 2), smoothed);
        assert!(sliding_window_mean(&[], 11).is_empty());
    }

    #[test]
    fn derived_names_keep_the_extension() {
        assert_eq!(
            derived_path(Path::new("run/T1/seed-1_sample-0/model.cif"), 11),
            PathBuf::from("run/T1/seed-1_sample-0/model_plddt_window_11.cif")
        );
        assert_eq!(
            derived_path(Path::new("ref.pdb"), 3),
            PathBuf::from("ref_plddt_window_3.pdb")
        );
    }

    #[test]
    fn existing_derived_file_is_returned_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("model.cif");
        std::fs::write(&raw, "not a structure").unwrap();
        let cached = derived_path(&raw, 11);
        std::fs::write(&cached, "cached").unwrap();
        let modified = std::fs::metadata(&cached).unwrap().modified().unwrap();

        let first = smooth_plddt(&raw, 11).unwrap();
        let second = smooth_plddt(&raw, 11).unwrap();
        assert_eq!(first, cached);
        assert_eq!(second, cached);
        assert_eq!(std::fs::read_to_string(&cached).unwrap(), "cached");
        assert_eq!(
            std::fs::metadata(&cached).unwrap().modified().unwrap(),
            modified
        );
    }

    #[test]
    fn smooths_only_the_prey_chain() {
        let dir = tempfile::tempdir().unwrap();
        let raw = fixture_copy(dir.path());

        let derived = smooth_plddt(&raw, 3).unwrap();
        assert_eq!(derived, dir.path().join("mini_model_plddt_window_3.cif"));

        let original = load_model(&raw).unwrap();
        let smoothed = load_model(&derived).unwrap();
        assert_eq!(chain_b_factors(&original, "PREY"), vec![10.0, 20.0, 60.0]);
        let prey = chain_b_factors(&smoothed, "PREY");
        for (value, expected) in prey.iter().zip([15.0, 30.0, 40.0]) {
            assert!((value - expected).abs() < 1e-2, "{prey:?}");
        }
        assert_eq!(
            chain_b_factors(&smoothed, "BAIT"),
            chain_b_factors(&original, "BAIT")
        );

        // Every atom of a residue carries the residue value
        let first_residue = smoothed
            .chains()
            .find(|c| c.id() == "PREY")
            .unwrap()
            .residues()
            .next()
            .unwrap();
        assert!(first_residue
            .atoms()
            .all(|a| (a.b_factor() - 15.0).abs() < 1e-2));

        // Second call is a cache hit
        let modified = std::fs::metadata(&derived).unwrap().modified().unwrap();
        assert_eq!(smooth_plddt(&raw, 3).unwrap(), derived);
        assert_eq!(
            std::fs::metadata(&derived).unwrap().modified().unwrap(),
            modified
        );
    }

    #[test]
    fn zero_window_is_rejected() {
        assert!(matches!(
            smooth_plddt(Path::new("model.cif"), 0),
            Err(ScreenError::Config(_))
        ));
    }
}
