//! Genome metadata handling.
//!
//! Loads the NCBI `datasets`-style genome metadata table (tab-separated)
//! and applies the inclusion criteria used throughout the validation
//! workflow: human host, complete assembly, known collection date.

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// NCBI taxonomic ID for Homo sapiens.
pub const HUMAN_HOST_TAXID: u32 = 9606;

/// Completeness value a genome must carry to enter the analysis.
/// Matched exactly, case-sensitive.
pub const COMPLETE: &str = "COMPLETE";

/// One row of the genome metadata table.
///
/// Stages never mutate records in place; each stage of the pipeline
/// produces a new derived table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeRecord {
    /// Unique sequence accession.
    pub accession: String,
    /// Virus Taxonomic ID.
    pub taxid: u32,
    /// Host Taxonomic ID.
    pub host_taxid: u32,
    /// Isolate Collection date; `None` when the cell is empty.
    pub collection_date: Option<String>,
    /// Release date; `None` when the cell is empty.
    pub release_date: Option<String>,
    pub completeness: String,
}

/// Finds a required column in the header row by exact name.
pub(crate) fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("Input table missing '{}' column", name))
}

/// Turns an empty or absent field into `None`.
fn non_empty(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Loads the genome metadata table.
///
/// The table is tab-separated with a header row; columns are located by
/// name so their order does not matter. Unparseable taxonomic IDs abort
/// the load.
pub fn load_genome_records<P: AsRef<Path>>(path: P) -> Result<Vec<GenomeRecord>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to open metadata table {}", path.display()))?;

    let headers = rdr.headers()?.clone();
    let acc_col = column_index(&headers, "Accession")?;
    let taxid_col = column_index(&headers, "Virus Taxonomic ID")?;
    let host_col = column_index(&headers, "Host Taxonomic ID")?;
    let collection_col = column_index(&headers, "Isolate Collection date")?;
    let release_col = column_index(&headers, "Release date")?;
    let completeness_col = column_index(&headers, "Completeness")?;

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let accession = record.get(acc_col).unwrap_or("").trim().to_string();
        if accession.is_empty() {
            warn!("Skipping metadata row with empty accession.");
            continue;
        }
        let taxid: u32 = record
            .get(taxid_col)
            .unwrap_or("")
            .trim()
            .parse()
            .with_context(|| format!("Unparseable Virus Taxonomic ID for '{}'", accession))?;
        let host_taxid: u32 = record
            .get(host_col)
            .unwrap_or("")
            .trim()
            .parse()
            .with_context(|| format!("Unparseable Host Taxonomic ID for '{}'", accession))?;

        records.push(GenomeRecord {
            accession,
            taxid,
            host_taxid,
            collection_date: non_empty(record.get(collection_col)),
            release_date: non_empty(record.get(release_col)),
            completeness: record.get(completeness_col).unwrap_or("").trim().to_string(),
        });
    }

    info!(
        "Loaded {} genome records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Restricts the metadata to records meeting the inclusion criteria:
/// human host, non-missing collection date, complete assembly.
///
/// Returns a new table; an empty result is not an error.
pub fn filter_data(records: &[GenomeRecord]) -> Vec<GenomeRecord> {
    let kept: Vec<GenomeRecord> = records
        .iter()
        .filter(|r| r.host_taxid == HUMAN_HOST_TAXID)
        .filter(|r| r.collection_date.is_some())
        .filter(|r| r.completeness == COMPLETE)
        .cloned()
        .collect();

    info!(
        "Metadata filter kept {} of {} records",
        kept.len(),
        records.len()
    );
    kept
}
