//! AlphaFold 3 job generation.
//!
//! Jobs are AlphaFold 3 input JSON files derived from a template, written into
//! the folder AlphaFold 3 will later fill with results, plus a shell script
//! with the `docker run` command that processes the whole folder.

use crate::config::{ComplexConfig, PipelineConfig, RunFolder, BAIT_CHAIN, PREY_CHAIN};
use crate::error::{Result, ScreenError};
use crate::sequences::{clean_complex_id, read_sequences, SequenceRecord, SequenceSource};
use itertools::Itertools;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Read the template and set `modelSeeds` to `0..number_of_seeds`.
pub fn load_template(path: &Path, number_of_seeds: usize) -> Result<Value> {
    let mut template: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    if !template.is_object() {
        return Err(ScreenError::config(format!(
            "template {} is not a JSON object",
            path.display()
        )));
    }
    template["modelSeeds"] = json!((0..number_of_seeds).collect::<Vec<_>>());
    Ok(template)
}

/// A pair template must list the prey first and the bait second.
pub fn check_pair_template(template: &Value) -> Result<()> {
    for (index, chain) in [(0, PREY_CHAIN), (1, BAIT_CHAIN)] {
        let id = template["sequences"][index]["protein"]["id"].as_str();
        if id != Some(chain) {
            return Err(ScreenError::config(format!(
                "template sequence {index} must have id {chain}, found {}",
                id.unwrap_or("nothing")
            )));
        }
    }
    Ok(())
}

/// Input of one prey/bait pair.
pub fn pair_input(template: &Value, prey: &SequenceRecord, bait: &SequenceRecord) -> Value {
    let mut input = template.clone();
    input["name"] = json!(format!("{}_{}", prey.id, bait.id));
    input["sequences"][0]["protein"]["sequence"] = json!(prey.sequence);
    input["sequences"][1]["protein"]["sequence"] = json!(bait.sequence);
    input
}

fn write_json(value: &Value, path: &Path) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Write `<prey>_<bait>_input.json` for every pair within the length limit.
pub fn write_pair_inputs(
    template: &Value,
    preys: &[SequenceRecord],
    baits: &[SequenceRecord],
    max_combined_seq_length: usize,
    folder: &Path,
) -> Result<Vec<PathBuf>> {
    check_pair_template(template)?;
    std::fs::create_dir_all(folder)?;

    let mut written = Vec::new();
    for (prey, bait) in preys.iter().cartesian_product(baits) {
        let name = format!("{}_{}", prey.id, bait.id);
        let length = prey.sequence.len() + bait.sequence.len();
        if length > max_combined_seq_length {
            info!("Skipping {name} due to length {length}");
            continue;
        }
        let path = folder.join(format!("{name}_input.json"));
        write_json(&pair_input(template, prey, bait), &path)?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Every complex to predict: the fixed proteins together with each
/// combination of the remaining proteins (including none of them), by
/// increasing size, followed by custom complexes not generated already.
pub fn complex_combinations(
    ids: &[String],
    fixed: &[String],
    custom: &[Vec<String>],
) -> Result<Vec<Vec<String>>> {
    if let Some(missing) = fixed.iter().find(|f| !ids.contains(*f)) {
        return Err(ScreenError::config(format!(
            "fixed protein '{missing}' is not present in the input FASTA file"
        )));
    }
    let unfixed: Vec<&String> = ids.iter().filter(|id| !fixed.contains(*id)).collect();

    // Size 0 keeps the fixed set alone, even when no other protein is left
    let mut combinations: Vec<Vec<String>> = (0..=unfixed.len())
        .flat_map(|size| unfixed.iter().copied().combinations(size))
        .map(|combo| fixed.iter().chain(combo).cloned().collect())
        .collect();
    info!(
        "Generated {} combinations of protein complexes; from {} unfixed proteins and {} fixed proteins",
        combinations.len(),
        unfixed.len(),
        fixed.len()
    );

    for prediction in custom {
        if let Some(unknown) = prediction.iter().find(|p| !ids.contains(*p)) {
            return Err(ScreenError::config(format!(
                "custom prediction protein '{unknown}' is not present in the input FASTA file"
            )));
        }
        if combinations.contains(prediction) {
            debug!("Custom prediction {} is already generated", prediction.join("_"));
        } else {
            combinations.push(prediction.clone());
        }
    }
    Ok(combinations)
}

/// Write `<length>_<name>.fasta` and `<length>_<name>_input.json` for every
/// complex within the length limit.
pub fn write_complex_inputs(
    template: &Value,
    records: &[SequenceRecord],
    combinations: &[Vec<String>],
    max_combined_seq_length: usize,
    max_id_length: usize,
    folder: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(folder)?;
    let by_id: HashMap<&str, &SequenceRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut written = Vec::new();
    for combo in combinations {
        let members: Vec<&SequenceRecord> = combo
            .iter()
            .map(|id| {
                by_id.get(id.as_str()).copied().ok_or_else(|| {
                    ScreenError::config(format!("unknown protein '{id}' in complex"))
                })
            })
            .collect::<Result<_>>()?;
        let name = combo.join("_");
        let length: usize = members.iter().map(|r| r.sequence.len()).sum();
        if length > max_combined_seq_length {
            info!(
                "Skipping combination {name}: total sequence length {length} exceeds {max_combined_seq_length}"
            );
            continue;
        }

        let fasta = members
            .iter()
            .map(|r| format!(">{}\n{}", r.id, r.sequence))
            .join("\n");
        std::fs::write(folder.join(format!("{length}_{name}.fasta")), fasta)?;

        let mut input = template.clone();
        input["name"] = json!(name);
        input["sequences"] = members
            .iter()
            .map(|r| {
                json!({
                    "protein": {
                        "id": clean_complex_id(&r.id, max_id_length),
                        "sequence": r.sequence,
                    }
                })
            })
            .collect();
        let path = folder.join(format!("{length}_{name}_input.json"));
        write_json(&input, &path)?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// `docker run` command processing every input JSON of `folder`.
pub fn docker_command(folder: &Path, config: &PipelineConfig) -> Result<String> {
    std::fs::create_dir_all(folder)?;
    let absolute = std::fs::canonicalize(folder)?;
    let mount = folder
        .to_string_lossy()
        .trim_matches('/')
        .replace(' ', "_");
    let name = mount.replace('/', "_");
    Ok(format!(
        "docker run -it --detach \\
    --name af3_run_{name} \\
    --volume {abs}:/root/af_input/{mount} \\
    --volume {abs}:/root/af_output/{mount} \\
    --volume {weights}:/root/models \\
    --volume {databases}:/root/public_databases \\
    --gpus all \\
    alphafold3 \\
    python run_alphafold.py \\
    --input_dir=/root/af_input/{mount} \\
    --model_dir=/root/models \\
    --output_dir=/root/af_output/{mount}
",
        abs = absolute.display(),
        weights = config.model_weights_folder,
        databases = config.database_folder,
    ))
}

/// Write the launch script; it is never executed from here.
pub fn write_launch_script(script: &Path, folder: &Path, config: &PipelineConfig) -> Result<PathBuf> {
    let command = docker_command(folder, config)?;
    std::fs::write(script, command)?;
    info!("Wrote launch script {}", script.display());
    Ok(script.to_path_buf())
}

/// Sequence records of a source, downloading accession lists into `folder`.
///
/// `fetch` returns the path of the FASTA file of one accession.
pub fn resolve_records(
    source: SequenceSource,
    folder: &Path,
    max_id_length: usize,
    fetch: &dyn Fn(&str, &Path) -> Result<PathBuf>,
) -> Result<Vec<SequenceRecord>> {
    if source.accessions.is_empty() {
        return Ok(source.records);
    }
    let mut records = Vec::with_capacity(source.accessions.len());
    for accession in &source.accessions {
        let fasta = fetch(accession, folder)?;
        let downloaded = read_sequences(&fasta, max_id_length)?;
        match downloaded.records.into_iter().next() {
            Some(record) => records.push(SequenceRecord::new(accession.clone(), record.sequence)),
            None => warn!("No sequence in {}; skipping {accession}", fasta.display()),
        }
    }
    Ok(records)
}

/// Pair inputs and launch script of one pulldown run.
pub fn generate_pulldown_run(
    config: &PipelineConfig,
    template: &Value,
    baits: &[SequenceRecord],
    run: &RunFolder,
    fetch: &dyn Fn(&str, &Path) -> Result<PathBuf>,
) -> Result<Vec<PathBuf>> {
    info!("Generating inputs for {}", run.folder.display());
    let source = read_sequences(&run.fasta, config.max_id_length)?;
    let preys = resolve_records(source, &run.folder, config.max_id_length, fetch)?;
    let written = write_pair_inputs(
        template,
        &preys,
        baits,
        config.max_combined_seq_length,
        &run.folder,
    )?;

    let script = run
        .folder
        .with_file_name(format!("{}_RUN.sh", run.label()));
    write_launch_script(&script, &run.folder, config)?;
    info!(
        "Wrote {} inputs for {} preys and {} baits",
        written.len(),
        preys.len(),
        baits.len()
    );
    Ok(written)
}

/// Complex inputs and launch script.
pub fn generate_complex(config: &PipelineConfig, complex: &ComplexConfig) -> Result<Vec<PathBuf>> {
    let source = read_sequences(&complex.input_fasta, config.max_id_length)?;
    if source.records.is_empty() {
        return Err(ScreenError::config(format!(
            "{} must contain FASTA records",
            complex.input_fasta.display()
        )));
    }
    let ids: Vec<String> = source.records.iter().map(|r| r.id.clone()).collect();
    let fixed = complex.truncated_fixed_proteins(config.max_id_length);
    let combinations = complex_combinations(&ids, &fixed, &complex.custom_predictions)?;

    let template = load_template(&config.template_file, config.number_of_seeds)?;
    let written = write_complex_inputs(
        &template,
        &source.records,
        &combinations,
        config.max_combined_seq_length,
        config.max_id_length,
        &complex.output_folder,
    )?;
    write_launch_script(
        &complex.output_folder.join("run_alphafold3.sh"),
        &complex.output_folder,
        config,
    )?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Value {
        let path = format!(
            "{}/test-data/alphafold3_input_template.json",
            env!("CARGO_MANIFEST_DIR")
        );
        load_template(Path::new(&path), 2).unwrap()
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn template_gets_seeds() {
        let template = template();
        assert_eq!(template["modelSeeds"], json!([0, 1]));
        check_pair_template(&template).unwrap();

        let mut swapped = template.clone();
        swapped["sequences"][0]["protein"]["id"] = json!("BAIT");
        assert!(matches!(
            check_pair_template(&swapped),
            Err(ScreenError::Config(_))
        ));
    }

    #[test]
    fn pair_inputs_respect_the_length_limit() {
        let dir = tempfile::tempdir().unwrap();
        let preys = vec![
            SequenceRecord::new("A", "MKV"),
            SequenceRecord::new("B", "MKVLL"),
        ];
        let baits = vec![SequenceRecord::new("LRRK2", "PLLP")];
        let written = write_pair_inputs(&template(), &preys, &baits, 8, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("A_LRRK2_input.json")]);

        let input: Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(input["name"], "A_LRRK2");
        assert_eq!(input["sequences"][0]["protein"]["sequence"], "MKV");
        assert_eq!(input["sequences"][1]["protein"]["sequence"], "PLLP");
        assert_eq!(input["modelSeeds"], json!([0, 1]));
    }

    #[test]
    fn complexes_always_include_the_fixed_set() {
        let all = ids(&["KinA", "A", "B"]);
        let combos = complex_combinations(&all, &ids(&["KinA"]), &[]).unwrap();
        assert_eq!(
            combos,
            vec![
                ids(&["KinA"]),
                ids(&["KinA", "A"]),
                ids(&["KinA", "B"]),
                ids(&["KinA", "A", "B"]),
            ]
        );

        let custom = vec![ids(&["A", "B"]), ids(&["KinA", "A"])];
        let combos = complex_combinations(&all, &ids(&["KinA"]), &custom).unwrap();
        assert_eq!(combos.len(), 5);
        assert_eq!(combos[4], ids(&["A", "B"]));
    }

    #[test]
    fn fully_fixed_set_is_a_single_complex() {
        let all = ids(&["KinA", "A"]);
        let combos = complex_combinations(&all, &all, &[]).unwrap();
        assert_eq!(combos, vec![ids(&["KinA", "A"])]);
    }

    #[test]
    fn unknown_fixed_protein_is_a_config_error() {
        let err = complex_combinations(&ids(&["A"]), &ids(&["KinA"]), &[]).unwrap_err();
        assert!(matches!(err, ScreenError::Config(_)), "{err}");
    }

    #[test]
    fn complex_inputs_use_clean_ids() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            SequenceRecord::new("PxdA_1", "MKV"),
            SequenceRecord::new("KinA", "LLPP"),
        ];
        let combos = vec![ids(&["PxdA_1", "KinA"])];
        let written =
            write_complex_inputs(&template(), &records, &combos, 100, 40, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("7_PxdA_1_KinA_input.json")]);

        let input: Value =
            serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(input["sequences"][0]["protein"]["id"], "PXDA_ONE");
        assert_eq!(input["sequences"].as_array().unwrap().len(), 2);
        let fasta = std::fs::read_to_string(dir.path().join("7_PxdA_1_KinA.fasta")).unwrap();
        assert_eq!(fasta, ">PxdA_1\nMKV\n>KinA\nLLPP");
    }

    #[test]
    fn accession_lists_are_fetched() {
        let dir = tempfile::tempdir().unwrap();
        let fetch = |id: &str, folder: &Path| -> Result<PathBuf> {
            let path = folder.join(format!("{id}.fasta"));
            std::fs::write(&path, format!(">sp|{id}|TEST\nMKV\nLLP\n"))?;
            Ok(path)
        };
        let source = SequenceSource {
            accessions: ids(&["P62258"]),
            records: Vec::new(),
        };
        let records = resolve_records(source, dir.path(), 40, &fetch).unwrap();
        assert_eq!(records, vec![SequenceRecord::new("P62258", "MKVLLP")]);
    }

    #[test]
    fn launch_script_mounts_the_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::PipelineConfig::from_toml(
            r#"
number_of_seeds = 1
template_file = "t.json"
database_folder = "/data/af3"

[pipeline]
mode = "complex"
input_fasta = "in.fasta"
output_folder = "out"
fixed_proteins = ["KinA"]
"#,
        )
        .unwrap();
        let folder = dir.path().join("GEF_SCREEN");
        let script = write_launch_script(&dir.path().join("GEF_SCREEN_RUN.sh"), &folder, &config)
            .unwrap();
        let command = std::fs::read_to_string(script).unwrap();
        assert!(command.starts_with("docker run"));
        assert!(command.contains("--gpus all"));
        assert!(command.contains("--volume /data/af3:/root/public_databases"));
        assert!(folder.is_dir());
    }
}
