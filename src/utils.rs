use crate::error::{Result, ScreenError};
use pdbtbx::*;
use polars::prelude::*;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Open an atomic data file with [`pdbtbx::ReadOptions`], logging parser warnings.
///
/// Nothing is removed from the structure, so it can be written back unchanged
/// apart from the fields a caller modifies.
pub fn load_model(input_file: &Path) -> Result<PDB> {
    let path_str = input_file
        .to_str()
        .ok_or_else(|| ScreenError::structure(input_file, "path is not valid UTF-8"))?;

    let (pdb, pdb_warnings) = pdbtbx::ReadOptions::default()
        .set_level(pdbtbx::StrictnessLevel::Loose)
        .read(path_str)
        .map_err(|errors| ScreenError::structure(input_file, join_pdb_errors(&errors)))?;

    log_pdb_errors(&pdb_warnings);
    Ok(pdb)
}

/// Save a structure; the format follows the file extension.
pub fn save_model(pdb: &PDB, output_file: &Path) -> Result<()> {
    let path_str = output_file
        .to_str()
        .ok_or_else(|| ScreenError::structure(output_file, "path is not valid UTF-8"))?;
    pdbtbx::save(pdb, path_str, pdbtbx::StrictnessLevel::Loose)
        .map_err(|errors| ScreenError::structure(output_file, join_pdb_errors(&errors)))
}

fn log_pdb_errors(errors: &[PDBError]) {
    errors.iter().for_each(|e| match e.level() {
        pdbtbx::ErrorLevel::BreakingError => error!("{e}"),
        pdbtbx::ErrorLevel::InvalidatingError => error!("{e}"),
        _ => warn!("{e}"),
    });
}

fn join_pdb_errors(errors: &[PDBError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Run `f` inside a dedicated rayon pool with `num_threads` workers (0 for all cores).
pub fn run_with_threads<T, F>(num_threads: usize, f: F) -> T
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
    {
        Ok(pool) => pool.install(f),
        Err(e) => {
            warn!("Failed to build a thread pool ({e}); using the global pool");
            f()
        }
    }
}

/// Map `f` over `units` in parallel and return the results in submission order.
///
/// Every unit is tagged with its index before it is handed to the pool and the
/// results are sorted back by that index, so the order guarantee does not
/// depend on how the pool schedules work.
pub fn par_map_ordered<U, R, F>(units: &[U], f: F) -> Vec<R>
where
    U: Sync,
    R: Send,
    F: Fn(&U) -> R + Sync + Send,
{
    let mut indexed: Vec<(usize, R)> = units
        .par_iter()
        .enumerate()
        .map(|(i, unit)| (i, f(unit)))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}

/// Immediate subdirectories of `folder`, sorted by name.
pub fn list_subdirectories(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// First file in `dir` (by name) whose name satisfies `matches`.
pub fn find_file(dir: &Path, matches: impl Fn(&str) -> bool) -> Result<Option<PathBuf>> {
    let mut found: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_match = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(&matches);
        if path.is_file() && is_match {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.into_iter().next())
}

/// Read a CSV file with a header row.
pub fn read_csv(file_path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Cast the listed columns, when present, to fixed dtypes.
///
/// CSV schema inference turns an all-empty column into strings, which would
/// break joins and concatenation with tables where the column has values.
pub fn cast_columns(df: DataFrame, casts: &[(String, DataType)]) -> Result<DataFrame> {
    let present: Vec<Expr> = casts
        .iter()
        .filter(|(name, _)| df.get_column_index(name).is_some())
        .map(|(name, dtype)| col(name.as_str()).cast(dtype.clone()))
        .collect();
    if present.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(present).collect()?)
}

/// Write a DataFrame to `file_path`, creating parent folders. The extension is
/// replaced by the one matching `file_type`.
pub fn write_df_to_file(
    df: &mut DataFrame,
    file_path: &Path,
    file_type: DataFrameFileType,
) -> Result<PathBuf> {
    let output_file = file_path.with_extension(file_type.to_string());
    if let Some(parent) = output_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(&output_file)?;
    match file_type {
        DataFrameFileType::Csv => {
            CsvWriter::new(&mut file).finish(df)?;
        }
        DataFrameFileType::Tsv => {
            CsvWriter::new(&mut file).with_separator(b'\t').finish(df)?;
        }
        DataFrameFileType::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
        DataFrameFileType::Json => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(df)?;
        }
        DataFrameFileType::NDJson => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::JsonLines)
                .finish(df)?;
        }
    }
    Ok(output_file)
}

/// File format for writing DataFrames.
#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum DataFrameFileType {
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Parquet columnar storage
    Parquet,
    /// Standard JSON
    Json,
    /// Newline-delimited JSON
    NDJson,
}

impl std::fmt::Display for DataFrameFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataFrameFileType::Csv => write!(f, "csv"),
            DataFrameFileType::Tsv => write!(f, "tsv"),
            DataFrameFileType::Parquet => write!(f, "parquet"),
            DataFrameFileType::Json => write!(f, "json"),
            DataFrameFileType::NDJson => write!(f, "ndjson"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_results_follow_submission() {
        let units: Vec<u64> = (0..200).collect();
        let results = run_with_threads(4, || {
            par_map_ordered(&units, |u| {
                // Uneven work so completion order differs from submission order
                std::thread::sleep(std::time::Duration::from_micros((200 - u) * 10));
                u * 2
            })
        });
        assert_eq!(results, units.iter().map(|u| u * 2).collect::<Vec<_>>());
    }

    #[test]
    fn csv_round_trip_keeps_column_types() {
        let dir = tempfile::tempdir().unwrap();
        let mut df = df!(
            "model" => ["a.cif", "b.cif"],
            "ROC_contacts" => [Some(3i64), None],
        )
        .unwrap();
        let written =
            write_df_to_file(&mut df, &dir.path().join("t.txt"), DataFrameFileType::Csv).unwrap();
        assert_eq!(written.extension().unwrap(), "csv");

        let read = cast_columns(
            read_csv(&written).unwrap(),
            &[
                (String::from("ROC_contacts"), DataType::Int64),
                (String::from("absent"), DataType::Float64),
            ],
        )
        .unwrap();
        assert_eq!(read.height(), 2);
        assert_eq!(read.column("ROC_contacts").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn find_file_picks_first_match_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_model.cif"), "").unwrap();
        std::fs::write(dir.path().join("a_model.cif"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let found = find_file(dir.path(), |name| name.ends_with("model.cif")).unwrap();
        assert_eq!(found.unwrap(), dir.path().join("a_model.cif"));
        assert!(find_file(dir.path(), |name| name.ends_with(".json"))
            .unwrap()
            .is_none());
    }
}
