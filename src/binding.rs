//! Which bait domains a prey touches.
//!
//! For every model ChimeraX measures the buried surface area between the prey
//! and each bait domain, and counts inter-chain contacts by inclusion-exclusion:
//! contacts inside the prey, inside the domain, and inside the union of both
//! are counted separately, and the difference is what crosses the interface.

use crate::chimerax::{parse_count, StructureTool};
use crate::combinations::add_combination_columns;
use crate::config::{Domain, BAIT_CHAIN, PREY_CHAIN};
use crate::error::{RecordFailure, RecordOutcome, Result};
use crate::utils::{par_map_ordered, write_df_to_file, DataFrameFileType};
use polars::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

static BURIED_AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"INFO:\nBuried area between /PREY and /BAIT:(\d+)-(\d+) = ([\d\.\-e]+)").unwrap()
});
static CONTACTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"INFO:\n(No|\d+) contacts?").unwrap());
static NOTHING_SELECTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Executing: sel(?:ect)? #1/PREY\nINFO:\nNothing selected").unwrap()
});

/// Buried area and inter-chain contacts per domain, in domain order.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingStats {
    pub areas: Vec<f64>,
    pub contacts: Vec<i64>,
}

impl BindingStats {
    /// Every value zero, for a prey with no atom above the confidence cutoff.
    pub fn zeros(domain_count: usize) -> Self {
        Self {
            areas: vec![0.0; domain_count],
            contacts: vec![0; domain_count],
        }
    }
}

/// ChimeraX commands measuring every domain of one model.
pub fn binding_script(model: &Path, domains: &[Domain], plddt_cutoff: f64) -> String {
    let mut script = format!(
        "open {model}
delete #1/{PREY_CHAIN} @@bfactor<{plddt_cutoff}
sel #1/{PREY_CHAIN}
contacts sel restrict both
~sel
",
        model = model.display(),
    );
    for domain in domains {
        let (start, end) = (domain.start(), domain.end());
        script.push_str(&format!(
            "measure buriedarea /{PREY_CHAIN} withAtoms2 /{BAIT_CHAIN}:{start}-{end}
sel #1/{BAIT_CHAIN}:{start}-{end}
contacts sel restrict both
sel add #1/{PREY_CHAIN}
contacts sel restrict both
~sel
"
        ));
    }
    script.push_str("exit\n");
    script
}

/// Extract per-domain statistics from the ChimeraX log of [`binding_script`].
pub fn parse_binding_output(stdout: &str, domains: &[Domain]) -> RecordOutcome<BindingStats> {
    if NOTHING_SELECTED.is_match(stdout) {
        return Ok(BindingStats::zeros(domains.len()));
    }

    let areas: Vec<(usize, usize, f64)> = BURIED_AREA
        .captures_iter(stdout)
        .filter_map(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)))
        .collect();
    if areas.len() != domains.len() {
        return Err(RecordFailure::new(format!(
            "expected {} buried area results, found {}",
            domains.len(),
            areas.len()
        )));
    }
    if let Some((domain, (start, end, _))) = domains
        .iter()
        .zip(&areas)
        .find(|(d, (start, end, _))| d.start() != *start || d.end() != *end)
    {
        return Err(RecordFailure::new(format!(
            "buried area for {start}-{end} reported where domain {} was expected",
            domain.name
        )));
    }

    let counts: Vec<i64> = CONTACTS
        .captures_iter(stdout)
        .filter_map(|caps| parse_count(&caps[1]))
        .collect();
    let expected = 1 + 2 * domains.len();
    if counts.len() != expected {
        return Err(RecordFailure::new(format!(
            "expected {expected} contact counts, found {}",
            counts.len()
        )));
    }

    let prey_total = counts[0];
    let contacts = counts[1..]
        .chunks(2)
        .map(|pair| pair[1] - pair[0] - prey_total)
        .collect();
    Ok(BindingStats {
        areas: areas.into_iter().map(|(_, _, area)| area).collect(),
        contacts,
    })
}

/// Measure one model; tool errors and unexpected output are logged with the
/// full transcript and returned as a failure.
pub fn measure_binding(
    tool: &dyn StructureTool,
    model: &Path,
    domains: &[Domain],
    plddt_cutoff: f64,
) -> RecordOutcome<BindingStats> {
    let output = tool.run_script(&binding_script(model, domains, plddt_cutoff))?;
    match parse_binding_output(&output.stdout, domains) {
        Ok(stats) => {
            debug!("{}: {:?}", model.display(), stats);
            Ok(stats)
        }
        Err(failure) => {
            error!(
                "Failed to calculate buried area or contacts for {} ({failure}):\n{}",
                model.display(),
                output.transcript()
            );
            Err(failure)
        }
    }
}

/// Measure every model on the current rayon pool; results follow `models`.
pub fn measure_models(
    tool: &dyn StructureTool,
    models: &[PathBuf],
    domains: &[Domain],
    plddt_cutoff: f64,
) -> Vec<RecordOutcome<BindingStats>> {
    par_map_ordered(models, |model| {
        measure_binding(tool, model, domains, plddt_cutoff)
    })
}

/// Binding table: `model`, one area column and one contacts column per
/// domain. Failed models keep their row with nulls.
pub fn binding_frame(
    models: &[PathBuf],
    outcomes: &[RecordOutcome<BindingStats>],
    domains: &[Domain],
) -> Result<DataFrame> {
    let mut columns = vec![Column::new(
        "model".into(),
        models
            .iter()
            .map(|m| m.to_string_lossy().to_string())
            .collect::<Vec<_>>(),
    )];
    for (i, domain) in domains.iter().enumerate() {
        let areas: Vec<Option<f64>> = outcomes
            .iter()
            .map(|o| o.as_ref().ok().map(|s| s.areas[i]))
            .collect();
        columns.push(Column::new(domain.area_column().into(), areas));
    }
    for (i, domain) in domains.iter().enumerate() {
        let contacts: Vec<Option<i64>> = outcomes
            .iter()
            .map(|o| o.as_ref().ok().map(|s| s.contacts[i]))
            .collect();
        columns.push(Column::new(domain.contacts_column().into(), contacts));
    }
    Ok(DataFrame::new(columns)?)
}

/// Measure a list of models and save the binding table with its domain
/// combination columns.
pub fn process_models(
    tool: &dyn StructureTool,
    models: &[PathBuf],
    domains: &[Domain],
    thresholds: &[i64],
    plddt_cutoff: f64,
    output_file: &Path,
) -> Result<PathBuf> {
    let outcomes = measure_models(tool, models, domains, plddt_cutoff);
    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed > 0 {
        warn!("{failed} of {} models could not be measured", models.len());
    }

    let df = binding_frame(models, &outcomes, domains)?;
    let mut df = add_combination_columns(df, domains, thresholds)?;
    let written = write_df_to_file(&mut df, output_file, DataFrameFileType::Csv)?;
    info!("Saved binding domains of {} models to {}", models.len(), written.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chimerax::tests::CannedTool;

    fn domains() -> Vec<Domain> {
        vec![Domain::new("ROC", 1335, 1510), Domain::new("COR", 1511, 1878)]
    }

    const TRANSCRIPT: &str = "\
Executing: sel #1/PREY
INFO:
812 atoms, 820 bonds, 101 residues, 1 model selected
INFO:
8 contacts
Executing: measure buriedarea /PREY withAtoms2 /BAIT:1335-1510
INFO:
Buried area between /PREY and /BAIT:1335-1510 = 612.5
INFO:
3 contacts
INFO:
15 contacts
Executing: measure buriedarea /PREY withAtoms2 /BAIT:1511-1878
INFO:
Buried area between /PREY and /BAIT:1511-1878 = 0
INFO:
No contacts
INFO:
8 contacts
";

    #[test]
    fn script_measures_every_domain() {
        let script = binding_script(Path::new("run/model.cif"), &domains(), 40.0);
        assert!(script.starts_with("open run/model.cif\ndelete #1/PREY @@bfactor<40\n"));
        assert!(script.contains("measure buriedarea /PREY withAtoms2 /BAIT:1511-1878\n"));
        assert_eq!(script.matches("contacts sel restrict both").count(), 5);
        assert!(script.ends_with("exit\n"));
    }

    #[test]
    fn contacts_by_inclusion_exclusion() {
        let stats = parse_binding_output(TRANSCRIPT, &domains()).unwrap();
        // 15 - 3 - 8 and 8 - 0 - 8
        assert_eq!(stats.contacts, vec![4, 0]);
        assert_eq!(stats.areas, vec![612.5, 0.0]);
    }

    #[test]
    fn empty_prey_is_all_zero() {
        let transcript = "Executing: sel #1/PREY\nINFO:\nNothing selected\nINFO:\nNo contacts\n";
        assert_eq!(
            parse_binding_output(transcript, &domains()).unwrap(),
            BindingStats::zeros(2)
        );
    }

    #[test]
    fn missing_lines_are_a_failure() {
        let truncated = TRANSCRIPT.replace("INFO:\n15 contacts\n", "");
        let failure = parse_binding_output(&truncated, &domains()).unwrap_err();
        assert!(failure.reason.contains("contact counts"), "{failure}");

        let shifted = TRANSCRIPT.replace("/BAIT:1511-1878 =", "/BAIT:1-2 =");
        assert!(parse_binding_output(&shifted, &domains()).is_err());
    }

    #[test]
    fn failed_models_keep_their_row() {
        let models = vec![PathBuf::from("a.cif"), PathBuf::from("b.cif")];
        let outcomes = vec![
            Ok(BindingStats {
                areas: vec![612.5, 0.0],
                contacts: vec![4, 0],
            }),
            Err(RecordFailure::new("unexpected output")),
        ];
        let df = binding_frame(&models, &outcomes, &domains()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names_str(),
            vec!["model", "ROC_area", "COR_area", "ROC_contacts", "COR_contacts"]
        );
        let contacts = df.column("ROC_contacts").unwrap().i64().unwrap();
        assert_eq!(contacts.get(0), Some(4));
        assert_eq!(contacts.get(1), None);
    }

    #[test]
    fn writes_table_with_combinations() {
        let dir = tempfile::tempdir().unwrap();
        let tool = CannedTool::new(TRANSCRIPT);
        let models = vec![PathBuf::from("x/model.cif"), PathBuf::from("y/model.cif")];
        let output = dir.path().join("run_binding_domain_raw.csv");

        let written = crate::utils::run_with_threads(2, || {
            process_models(&tool, &models, &domains(), &[1, 5], 40.0, &output)
        })
        .unwrap();
        assert_eq!(tool.scripts.lock().unwrap().len(), 2);

        let df = crate::utils::read_csv(&written).unwrap();
        assert_eq!(df.height(), 2);
        let roc = df.column("ROC_MIN_1").unwrap().i64().unwrap();
        assert_eq!(roc.get(0), Some(1));
        assert_eq!(df.column("ROC_MIN_5").unwrap().i64().unwrap().get(0), Some(0));
    }
}
