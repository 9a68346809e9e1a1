//! Shortlisting candidate interactors from the merged tables.
//!
//! Every superfolder is reduced to the accepted models (sorted by the
//! confidence metric), a per-protein TSV with UniProt metadata, and a count of
//! how often each domain combination occurs among all and accepted models.

use crate::combinations::{combination_column, domain_combinations};
use crate::config::{ConfidenceMetric, Domain, OutputLayout, PulldownConfig, Superfolder};
use crate::error::Result;
use crate::merge::numeric_schema;
use crate::uniprot::{id_from_link, MetadataSource};
use crate::utils::{cast_columns, read_csv, write_df_to_file, DataFrameFileType};
use itertools::Itertools;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

pub const HIGHEST_BINDING_DOMAIN: &str = "highest binding domain";

/// Acceptance rule for models.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub metric: ConfidenceMetric,
    pub threshold: f64,
    /// Upper bound on `between clashes`; when set, every replica is
    /// considered instead of only the best one per target
    pub max_between_clashes: Option<i64>,
}

impl FilterSettings {
    pub fn from_config(config: &PulldownConfig) -> Self {
        Self {
            metric: config.prediction_threshold_metric,
            threshold: config.prediction_threshold_value,
            max_between_clashes: config.clash_settings().map(|c| c.max_between),
        }
    }
}

/// Name of the domain with the most contacts in each row. Ties go to the
/// domain listed first; rows without any contact count get null.
pub fn add_highest_binding_domain(df: DataFrame, domains: &[Domain]) -> Result<DataFrame> {
    let contacts: Vec<Vec<Option<i64>>> = domains
        .iter()
        .map(|d| Ok(df.column(&d.contacts_column())?.i64()?.into_iter().collect()))
        .collect::<Result<_>>()?;

    let highest: Vec<Option<String>> = (0..df.height())
        .map(|row| {
            let mut best: Option<(usize, i64)> = None;
            for (i, column) in contacts.iter().enumerate() {
                if let Some(value) = column[row] {
                    if best.map_or(true, |(_, b)| value > b) {
                        best = Some((i, value));
                    }
                }
            }
            best.map(|(i, _)| domains[i].name.clone())
        })
        .collect();

    let mut df = df;
    df.with_column(Column::new(HIGHEST_BINDING_DOMAIN.into(), highest))?;
    Ok(df)
}

/// Row index of the best replica of every target of every run, in order of
/// first appearance. The first row wins ties; rows without a metric value are
/// never chosen.
pub fn best_replica_rows(df: &DataFrame, metric: ConfidenceMetric) -> Result<Vec<usize>> {
    let runs = df.column("run")?.str()?;
    let targets = df.column("target")?.str()?;
    let values = df.column(metric.column())?.f64()?;

    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut best: HashMap<(&str, &str), (usize, f64)> = HashMap::new();
    let rows = runs.into_iter().zip(targets.into_iter()).zip(values.into_iter());
    for (row, ((run, target), value)) in rows.enumerate() {
        let (Some(run), Some(target), Some(value)) = (run, target, value) else {
            continue;
        };
        let key = (run, target);
        match best.get(&key) {
            Some((_, current)) if *current >= value => {}
            Some(_) => {
                best.insert(key, (row, value));
            }
            None => {
                order.push(key);
                best.insert(key, (row, value));
            }
        }
    }
    Ok(order.into_iter().map(|key| best[&key].0).collect())
}

/// Accepted models, sorted by the metric in descending order.
///
/// With a clash bound, every replica whose metric reaches the threshold and
/// whose `between clashes` stays within the bound is accepted. Without one,
/// only the best replica of each target is considered.
pub fn select_accepted(df: &DataFrame, settings: &FilterSettings) -> Result<DataFrame> {
    let values = df.column(settings.metric.column())?.f64()?;
    let passes = |row: usize| values.get(row).is_some_and(|v| v >= settings.threshold);

    let rows: Vec<usize> = match settings.max_between_clashes {
        Some(bound) => {
            let between = df.column("between clashes")?.i64()?;
            (0..df.height())
                .filter(|&row| passes(row) && between.get(row).is_some_and(|c| c <= bound))
                .collect()
        }
        None => best_replica_rows(df, settings.metric)?
            .into_iter()
            .filter(|&row| passes(row))
            .collect(),
    };

    let indices = IdxCa::from_vec("idx".into(), rows.into_iter().map(|r| r as IdxSize).collect());
    let accepted = df.take(&indices)?.sort(
        [settings.metric.column()],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_maintain_order(true),
    )?;
    Ok(accepted)
}

/// How often each domain combination is flagged, among all and among
/// accepted models.
pub fn combination_counts(
    all: &DataFrame,
    accepted: &DataFrame,
    domains: &[Domain],
    thresholds: &[i64],
) -> Result<DataFrame> {
    let flag_sum = |df: &DataFrame, column: &str| -> Result<i64> {
        Ok(df.column(column)?.i64()?.sum().unwrap_or(0))
    };

    let mut names = Vec::new();
    let mut threshold_column = Vec::new();
    let mut all_counts = Vec::new();
    let mut accepted_counts = Vec::new();
    for &threshold in thresholds {
        for combination in domain_combinations(domains) {
            let column = combination_column(&combination, threshold);
            names.push(combination.iter().map(|d| d.name.as_str()).join("_"));
            threshold_column.push(threshold);
            all_counts.push(flag_sum(all, &column)?);
            accepted_counts.push(flag_sum(accepted, &column)?);
        }
    }

    let df = df!(
        "combination" => names,
        "threshold" => threshold_column,
        "all" => all_counts,
        "accepted" => accepted_counts,
    )?;
    Ok(df)
}

/// One line per accepted protein: link, name, organism and number of
/// accepted models. Proteins keep the order in which they first appear.
pub fn protein_report(accepted: &DataFrame, source: &dyn MetadataSource) -> Result<DataFrame> {
    let links: Vec<&str> = accepted
        .column("uniprot link")?
        .str()?
        .into_iter()
        .flatten()
        .collect();
    let hits = links.iter().copied().counts();

    let mut uniprot = Vec::new();
    let mut protein = Vec::new();
    let mut organism = Vec::new();
    let mut hit_counts = Vec::new();
    for link in links.iter().copied().unique() {
        let metadata = source.lookup(id_from_link(link)).unwrap_or_default();
        info!(
            "{link}: {} ({}), {} accepted models",
            metadata.full_name, metadata.organism, hits[link]
        );
        uniprot.push(link.to_string());
        // Unknown fields stay empty in the report
        protein.push(Some(metadata.full_name).filter(|s| !s.is_empty()));
        organism.push(Some(metadata.organism).filter(|s| !s.is_empty()));
        hit_counts.push(hits[link] as i64);
    }

    let df = df!(
        "uniprot" => uniprot,
        "protein" => protein,
        "organism" => organism,
        "hits" => hit_counts,
    )?;
    Ok(df)
}

/// Files written for one superfolder.
#[derive(Debug, Clone)]
pub struct AnalysisOutputs {
    pub accepted: PathBuf,
    pub report: PathBuf,
    pub combination_counts: PathBuf,
}

/// Filter and report one superfolder from its runs' merged tables.
pub fn analyze_superfolder(
    superfolder: &Superfolder,
    layout: &OutputLayout,
    domains: &[Domain],
    thresholds: &[i64],
    settings: &FilterSettings,
    source: &dyn MetadataSource,
    file_type: DataFrameFileType,
) -> Result<AnalysisOutputs> {
    info!("Processing {}", superfolder.name);
    let schema = numeric_schema(domains, thresholds);
    let frames = superfolder
        .runs
        .iter()
        .map(|run| {
            let path = layout.merged(&run.label());
            debug!("Reading {}", path.display());
            Ok(cast_columns(read_csv(&path)?, &schema)?.lazy())
        })
        .collect::<Result<Vec<_>>>()?;
    let merged = concat(frames, UnionArgs::default())?.collect()?;
    let merged = add_highest_binding_domain(merged, domains)?;

    if settings.max_between_clashes.is_none() {
        info!("No clash bound configured; filtering the best model of each target by {}", settings.metric);
    }
    let mut accepted = select_accepted(&merged, settings)?;
    let accepted_file = write_df_to_file(&mut accepted, &layout.analysis(&superfolder.name), file_type)?;
    info!("Filtered predictions saved to {}", accepted_file.display());

    let mut counts = combination_counts(&merged, &accepted, domains, thresholds)?;
    debug!("Domain combination counts for {}:\n{counts}", superfolder.name);
    let counts_file = write_df_to_file(
        &mut counts,
        &layout.combination_counts(&superfolder.name),
        DataFrameFileType::Csv,
    )?;

    let mut report = protein_report(&accepted, source)?;
    info!(
        "Filtered predictions for {}: {} models out of {} models; {} unique proteins",
        superfolder.name,
        accepted.height(),
        merged.height(),
        report.height()
    );
    let report_file = write_df_to_file(
        &mut report,
        &layout.filtered_report(&superfolder.name),
        DataFrameFileType::Tsv,
    )?;

    Ok(AnalysisOutputs {
        accepted: accepted_file,
        report: report_file,
        combination_counts: counts_file,
    })
}
