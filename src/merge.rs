//! Joining the per-run tables into one row per model.

use crate::combinations::combination_columns;
use crate::config::{Domain, OutputLayout, Superfolder};
use crate::error::{Result, ScreenError};
use crate::structure::derived_path;
use crate::utils::{cast_columns, read_csv, write_df_to_file, DataFrameFileType};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Confidence columns of the raw results table.
pub const CONFIDENCE_COLUMNS: [&str; 5] = ["ipTM", "pTM", "pLDDT", "pLDDT_BAIT", "pLDDT_PREY"];

/// Clash columns of the clash table.
pub const CLASH_COLUMNS: [&str; 4] = [
    "input clashes",
    "reference clashes",
    "both clashes",
    "between clashes",
];

/// Fixed dtypes of every numeric column a merged table can hold.
pub fn numeric_schema(domains: &[Domain], thresholds: &[i64]) -> Vec<(String, DataType)> {
    let mut casts: Vec<(String, DataType)> = vec![
        (String::from("seed"), DataType::Int64),
        (String::from("sample"), DataType::Int64),
    ];
    casts.extend(
        CONFIDENCE_COLUMNS
            .iter()
            .map(|c| (c.to_string(), DataType::Float64)),
    );
    casts.extend(domains.iter().map(|d| (d.area_column(), DataType::Float64)));
    casts.extend(domains.iter().map(|d| (d.contacts_column(), DataType::Int64)));
    casts.extend(
        thresholds
            .iter()
            .flat_map(|t| combination_columns(domains, *t))
            .map(|c| (c, DataType::Int64)),
    );
    casts.extend(CLASH_COLUMNS.iter().map(|c| (c.to_string(), DataType::Int64)));
    casts
}

/// Point every `model` entry at its smoothed copy.
pub fn rewrite_model_paths(df: DataFrame, window: usize) -> Result<DataFrame> {
    let derived: Vec<Option<String>> = df
        .column("model")?
        .str()?
        .into_iter()
        .map(|model| {
            model.map(|m| {
                derived_path(Path::new(m), window)
                    .to_string_lossy()
                    .to_string()
            })
        })
        .collect();
    let mut df = df;
    df.with_column(Column::new("model".into(), derived))?;
    Ok(df)
}

fn check_height(context: &str, expected: usize, df: &DataFrame) -> Result<()> {
    if df.height() != expected {
        return Err(ScreenError::cardinality(context, expected, df.height()));
    }
    Ok(())
}

fn check_unique_models(context: &str, df: &DataFrame) -> Result<()> {
    let unique = df
        .column("model")?
        .as_materialized_series()
        .n_unique()?;
    if unique != df.height() {
        return Err(ScreenError::cardinality(context, df.height(), unique));
    }
    Ok(())
}

/// Inner-join the metrics, binding and (optional) clash tables on `model`.
///
/// Every table must describe exactly the models of the metrics table, so the
/// join may neither drop nor duplicate rows. Model keys are unique within each
/// table; with equal heights an inner join of the full height then implies
/// identical key sets.
pub fn merge_tables(
    metrics: DataFrame,
    binding: DataFrame,
    clashes: Option<DataFrame>,
) -> Result<DataFrame> {
    let expected = metrics.height();
    check_unique_models("unique models in the metrics table", &metrics)?;
    check_unique_models("unique models in the binding table", &binding)?;
    if let Some(clashes) = &clashes {
        check_unique_models("unique models in the clash table", clashes)?;
    }
    check_height("comparing the binding table to the metrics table", expected, &binding)?;
    if let Some(clashes) = &clashes {
        check_height("comparing the clash table to the metrics table", expected, clashes)?;
    }

    let mut merged = metrics.lazy().join(
        binding.lazy(),
        [col("model")],
        [col("model")],
        JoinArgs::new(JoinType::Inner),
    );
    if let Some(clashes) = clashes {
        merged = merged.join(
            clashes.lazy(),
            [col("model")],
            [col("model")],
            JoinArgs::new(JoinType::Inner),
        );
    }
    let merged = merged.collect()?;
    check_height("joining on model", expected, &merged)?;
    Ok(merged)
}

/// Source tables of one run folder.
#[derive(Debug, Clone)]
pub struct RunTables {
    pub metrics: PathBuf,
    pub binding: PathBuf,
    pub clashes: Option<PathBuf>,
}

impl RunTables {
    pub fn locate(layout: &OutputLayout, run: &str, with_clashes: bool) -> Self {
        Self {
            metrics: layout.raw_results(run),
            binding: layout.binding_domain(run),
            clashes: with_clashes.then(|| layout.clashes(run)),
        }
    }
}

/// Read and merge the tables of one run.
pub fn merge_run(
    tables: &RunTables,
    window: Option<usize>,
    schema: &[(String, DataType)],
) -> Result<DataFrame> {
    let load = |path: &Path| -> Result<DataFrame> {
        debug!("Reading {}", path.display());
        cast_columns(read_csv(path)?, schema)
    };

    let mut metrics = load(&tables.metrics)?;
    if let Some(w) = window {
        metrics = rewrite_model_paths(metrics, w)?;
    }
    let binding = load(&tables.binding)?;
    let clashes = match &tables.clashes {
        Some(path) => Some(load(path)?),
        None => None,
    };
    merge_tables(metrics, binding, clashes)
}

/// Merge every run of a superfolder, saving each run's table and their
/// concatenation.
pub fn merge_superfolder(
    superfolder: &Superfolder,
    layout: &OutputLayout,
    domains: &[Domain],
    thresholds: &[i64],
    with_clashes: bool,
) -> Result<PathBuf> {
    info!("Processing {}", superfolder.name);
    if !with_clashes {
        info!("No clash reference configured; merging predictions and binding domains only");
    }
    let schema = numeric_schema(domains, thresholds);

    let mut frames = Vec::with_capacity(superfolder.runs.len());
    for run in &superfolder.runs {
        let label = run.label();
        let tables = RunTables::locate(layout, &label, with_clashes);
        let mut merged = merge_run(&tables, layout.window, &schema)?;
        let written = write_df_to_file(&mut merged, &layout.merged(&label), DataFrameFileType::Csv)?;
        info!("Merged {} models of {label} into {}", merged.height(), written.display());
        frames.push(merged.lazy());
    }

    let mut combined = concat(frames, UnionArgs::default())?.collect()?;
    let written = write_df_to_file(
        &mut combined,
        &layout.merged(&superfolder.name),
        DataFrameFileType::Csv,
    )?;
    info!(
        "Saved {} models of {} to {}",
        combined.height(),
        superfolder.name,
        written.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunFolder;

    fn metrics() -> DataFrame {
        df!(
            "model" => ["t/s1/model.cif", "t/s2/model.cif", "u/s1/model.cif"],
            "target" => ["t", "t", "u"],
            "ipTM" => [0.2, 0.5, 0.7],
        )
        .unwrap()
    }

    fn binding(models: &[&str]) -> DataFrame {
        let n = models.len();
        df!(
            "model" => models,
            "ROC_contacts" => (0..n as i64).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    fn clashes(models: &[&str]) -> DataFrame {
        df!(
            "model" => models,
            "between clashes" => vec![Some(3i64); models.len()],
        )
        .unwrap()
    }

    const MODELS: [&str; 3] = ["t/s1/model.cif", "t/s2/model.cif", "u/s1/model.cif"];

    #[test]
    fn join_keeps_every_model() {
        let merged = merge_tables(metrics(), binding(&MODELS), Some(clashes(&MODELS))).unwrap();
        assert_eq!(merged.height(), 3);
        assert_eq!(merged.width(), 5);
    }

    #[test]
    fn missing_rows_are_fatal() {
        let err = merge_tables(metrics(), binding(&MODELS[..2]), None).unwrap_err();
        assert!(
            matches!(err, ScreenError::Cardinality { expected: 3, found: 2, .. }),
            "{err}"
        );

        let err = merge_tables(metrics(), binding(&MODELS), Some(clashes(&MODELS[1..]))).unwrap_err();
        assert!(matches!(err, ScreenError::Cardinality { .. }), "{err}");
    }

    #[test]
    fn mismatched_keys_are_fatal() {
        let renamed = ["t/s1/model.cif", "t/s2/model.cif", "u/s1/model_plddt_window_3.cif"];
        let err = merge_tables(metrics(), binding(&renamed), None).unwrap_err();
        assert!(
            matches!(err, ScreenError::Cardinality { expected: 3, found: 2, .. }),
            "{err}"
        );
    }

    #[test]
    fn duplicated_keys_are_fatal() {
        let duplicated = ["t/s1/model.cif", "t/s1/model.cif", "u/s1/model.cif"];
        let err = merge_tables(metrics(), binding(&duplicated), None).unwrap_err();
        assert!(
            matches!(err, ScreenError::Cardinality { expected: 3, found: 2, .. }),
            "{err}"
        );

        let err = merge_tables(metrics(), binding(&MODELS), Some(clashes(&duplicated))).unwrap_err();
        assert!(matches!(err, ScreenError::Cardinality { .. }), "{err}");
    }

    #[test]
    fn model_paths_follow_the_window() {
        let df = rewrite_model_paths(metrics(), 11).unwrap();
        let models = df.column("model").unwrap().str().unwrap();
        assert_eq!(models.get(0), Some("t/s1/model_plddt_window_11.cif"));
    }

    #[test]
    fn superfolder_table_concatenates_runs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout {
            root: dir.path().to_path_buf(),
            window: Some(3),
        };
        let domains = vec![Domain::new("ROC", 1, 10)];
        let mut runs = Vec::new();
        for (label, rows) in [("RUN_A", 2usize), ("RUN_B", 1)] {
            let raw: Vec<String> = (0..rows).map(|i| format!("{label}/t{i}/model.cif")).collect();
            let derived: Vec<String> = (0..rows)
                .map(|i| format!("{label}/t{i}/model_plddt_window_3.cif"))
                .collect();
            let mut m = df!(
                "model" => raw,
                "ipTM" => vec![None::<f64>; rows],
            )
            .unwrap();
            let b = df!(
                "model" => derived,
                "ROC_area" => vec![None::<f64>; rows],
                "ROC_contacts" => vec![Some(2i64); rows],
            )
            .unwrap();
            let mut b =
                crate::combinations::add_combination_columns(b, &domains, &[1]).unwrap();
            write_df_to_file(&mut m, &layout.raw_results(label), DataFrameFileType::Csv).unwrap();
            write_df_to_file(&mut b, &layout.binding_domain(label), DataFrameFileType::Csv)
                .unwrap();
            runs.push(RunFolder {
                fasta: PathBuf::from(format!("{label}.fasta")),
                folder: PathBuf::from(label),
            });
        }
        let superfolder = Superfolder {
            name: String::from("GEF"),
            runs,
        };

        let written = merge_superfolder(&superfolder, &layout, &domains, &[1], false).unwrap();
        assert_eq!(written, layout.merged("GEF"));
        let combined = read_csv(&written).unwrap();
        assert_eq!(combined.height(), 3);
        assert!(layout.merged("RUN_A").exists());
        assert_eq!(
            combined.column("ROC_MIN_1").unwrap().i64().unwrap().get(2),
            Some(1)
        );
    }
}
