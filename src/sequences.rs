//! Sequence extraction from FASTA files and UniProt accession lists.
//!
//! Input files come in two shapes: FASTA records, or one UniProt accession per
//! line (whose sequences still have to be downloaded). The first non-empty
//! line decides the shape for the whole file.

use crate::error::{Result, ScreenError};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// A named sequence parsed from a FASTA record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

impl SequenceRecord {
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }
}

/// Contents of a sequence input file.
///
/// Exactly one of the two lists is filled for a non-empty file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSource {
    /// UniProt accessions, when the file is a plain list
    pub accessions: Vec<String>,
    /// Parsed records, when the file is FASTA
    pub records: Vec<SequenceRecord>,
}

/// Read a FASTA file or accession list from disk.
pub fn read_sequences(path: &Path, max_id_length: usize) -> Result<SequenceSource> {
    let content = std::fs::read_to_string(path)?;
    parse_sequences(&content, max_id_length).map_err(|message| ScreenError::Fasta {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse FASTA text or an accession list.
///
/// FASTA identifiers are the header text truncated to `max_id_length`
/// characters with every non-word character replaced by `_`.
pub fn parse_sequences(
    content: &str,
    max_id_length: usize,
) -> std::result::Result<SequenceSource, String> {
    let lines: Vec<&str> = content
        .lines()
        .map(|line| line.trim_end())
        .filter(|line| !line.trim().is_empty())
        .collect();

    let is_fasta = lines.first().is_some_and(|line| line.starts_with('>'));
    if !is_fasta {
        return Ok(SequenceSource {
            accessions: lines.iter().map(|line| line.trim().to_string()).collect(),
            records: Vec::new(),
        });
    }

    let mut records: Vec<SequenceRecord> = Vec::new();
    let mut seen = HashSet::new();
    let mut id = String::new();
    let mut running_sequence = String::new();

    let mut flush = |id: &str, sequence: &mut String| -> std::result::Result<(), String> {
        if sequence.is_empty() {
            return Ok(());
        }
        if id.is_empty() {
            return Err(String::from("found sequence data without a header"));
        }
        if !seen.insert(id.to_string()) {
            return Err(format!("duplicate sequence identifier '{id}'"));
        }
        debug!("Found sequence {id}");
        records.push(SequenceRecord::new(id, std::mem::take(sequence)));
        Ok(())
    };

    for line in lines {
        if let Some(header) = line.strip_prefix('>') {
            flush(&id, &mut running_sequence)?;
            id = sanitize_id(header, max_id_length);
        } else {
            running_sequence.push_str(line.trim());
        }
    }
    flush(&id, &mut running_sequence)?;

    Ok(SequenceSource {
        accessions: Vec::new(),
        records,
    })
}

/// Truncate a FASTA header and replace non-word characters with `_`.
pub fn sanitize_id(header: &str, max_id_length: usize) -> String {
    let truncated: String = header.chars().take(max_id_length).collect();
    NON_WORD.replace_all(&truncated, "_").to_string()
}

/// Identifier used for chains of a multi-protein complex job.
///
/// AlphaFold 3 chain ids must be upper-case letters, so digits are spelled out
/// (`PxdA_2` becomes `PXDA_TWO`).
pub fn clean_complex_id(id: &str, max_id_length: usize) -> String {
    const DIGIT_WORDS: [&str; 10] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    ];
    let cleaned = NON_WORD.replace_all(id, "_");
    let spelled = DIGITS.replace_all(&cleaned, |caps: &regex::Captures| {
        caps[0]
            .chars()
            .filter_map(|d| d.to_digit(10))
            .map(|d| DIGIT_WORDS[d as usize])
            .collect::<String>()
    });
    spelled
        .chars()
        .take(max_id_length)
        .collect::<String>()
        .to_uppercase()
}
