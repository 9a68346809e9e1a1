//! UniProt REST access: entry metadata for reports and FASTA downloads for
//! accession-list inputs.

use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const UNIPROT_REST: &str = "https://rest.uniprot.org/uniprotkb";

/// Descriptive fields of a UniProt entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProteinMetadata {
    pub id: String,
    pub full_name: String,
    pub organism: String,
}

/// Source of protein metadata keyed by UniProt accession.
pub trait MetadataSource {
    /// `None` when the entry cannot be retrieved.
    fn lookup(&self, uniprot_id: &str) -> Option<ProteinMetadata>;
}

/// Metadata source that never finds anything, for offline reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl MetadataSource for Offline {
    fn lookup(&self, _uniprot_id: &str) -> Option<ProteinMetadata> {
        None
    }
}

/// Blocking client for the UniProt REST API.
pub struct UniProtClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl UniProtClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("pulldown/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: String::from(UNIPROT_REST),
        })
    }

    fn fetch_entry(&self, uniprot_id: &str) -> reqwest::Result<Value> {
        self.client
            .get(format!("{}/{uniprot_id}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?
            .error_for_status()?
            .json()
    }

    /// Download `<id>.fasta` into `folder` unless it is already there.
    pub fn download_fasta(&self, uniprot_id: &str, folder: &Path) -> Result<PathBuf> {
        let output_file = folder.join(format!("{uniprot_id}.fasta"));
        if output_file.exists() {
            debug!("{} already downloaded", output_file.display());
            return Ok(output_file);
        }
        let fasta = self
            .client
            .get(format!("{}/{uniprot_id}.fasta", self.base_url))
            .send()?
            .error_for_status()?
            .text()?;
        std::fs::create_dir_all(folder)?;
        std::fs::write(&output_file, fasta)?;
        info!("Downloaded {}", output_file.display());
        Ok(output_file)
    }
}

impl MetadataSource for UniProtClient {
    fn lookup(&self, uniprot_id: &str) -> Option<ProteinMetadata> {
        match self.fetch_entry(uniprot_id) {
            Ok(entry) => parse_entry(&entry),
            Err(e) => {
                warn!("UniProt lookup for {uniprot_id} failed: {e}");
                None
            }
        }
    }
}

/// Pick the report fields out of a UniProtKB JSON entry.
///
/// The recommended name is preferred; unreviewed entries only carry a
/// submitted name.
pub fn parse_entry(entry: &Value) -> Option<ProteinMetadata> {
    let id = entry["uniProtkbId"].as_str()?.to_string();
    let description = &entry["proteinDescription"];
    let full_name = description["recommendedName"]["fullName"]["value"]
        .as_str()
        .filter(|name| !name.is_empty())
        .or_else(|| description["submissionNames"][0]["fullName"]["value"].as_str())
        .unwrap_or_default()
        .to_string();
    let organism = entry["organism"]["scientificName"].as_str()?.to_string();
    Some(ProteinMetadata {
        id,
        full_name,
        organism,
    })
}

/// Accession at the end of a `https://www.uniprot.org/uniprotkb/<id>/entry` link.
pub fn id_from_link(link: &str) -> &str {
    link.trim_end_matches('/')
        .trim_end_matches("/entry")
        .rsplit('/')
        .next()
        .unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reviewed_entries_use_the_recommended_name() {
        let entry = json!({
            "uniProtkbId": "LRRK2_HUMAN",
            "proteinDescription": {
                "recommendedName": { "fullName": { "value": "Leucine-rich repeat serine/threonine-protein kinase 2" } }
            },
            "organism": { "scientificName": "Homo sapiens" }
        });
        let metadata = parse_entry(&entry).unwrap();
        assert_eq!(metadata.id, "LRRK2_HUMAN");
        assert!(metadata.full_name.starts_with("Leucine-rich"));
        assert_eq!(metadata.organism, "Homo sapiens");
    }

    #[test]
    fn unreviewed_entries_fall_back_to_submitted_names() {
        let entry = json!({
            "uniProtkbId": "A0A024R161_HUMAN",
            "proteinDescription": {
                "submissionNames": [{ "fullName": { "value": "DnaJ homolog" } }]
            },
            "organism": { "scientificName": "Homo sapiens" }
        });
        assert_eq!(parse_entry(&entry).unwrap().full_name, "DnaJ homolog");

        let bare = json!({
            "uniProtkbId": "X_HUMAN",
            "organism": { "scientificName": "Homo sapiens" }
        });
        assert_eq!(parse_entry(&bare).unwrap().full_name, "");
    }

    #[test]
    fn accession_from_link() {
        assert_eq!(
            id_from_link("https://www.uniprot.org/uniprotkb/Q5S007/entry"),
            "Q5S007"
        );
    }
}
