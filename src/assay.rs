//! Assay hit assessment.
//!
//! Cross-references genome metadata against the accession set hit by a
//! simulate_PCR run, and derives collection/release years from the
//! `datasets`-style date strings.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::metadata::{column_index, GenomeRecord};

/// Retrieves the year from a `datasets` file date element.
///
/// ex. "2000-01-09T00:00:00Z" -> 2000
///
/// Missing or unparseable dates propagate as `None` rather than an
/// error.
pub fn date_year(date: Option<&str>) -> Option<i32> {
    date?.split('-').next()?.trim().parse().ok()
}

/// A metadata record tagged with its assay outcome.
///
/// `collection_year`/`release_year` are `None` exactly when the source
/// date was missing or unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedRecord {
    pub accession: String,
    /// Virus Taxonomic ID.
    pub taxid: u32,
    pub collection_year: Option<i32>,
    pub release_year: Option<i32>,
    /// Whether the accession appeared in the assay's hit set.
    pub hit: bool,
}

/// Loads the set of accessions hit by a simulate_PCR run.
///
/// The result table is tab-separated with a `Full_Hit_ID` column whose
/// values look like `"<accession> <free text>"`; the accession is the
/// substring before the first space. Duplicates collapse into one entry.
pub fn load_hit_accessions<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let path = path.as_ref();
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to open PCR result table {}", path.display()))?;

    let headers = rdr.headers()?.clone();
    let hit_col = column_index(&headers, "Full_Hit_ID")?;

    let mut accessions = HashSet::new();
    for result in rdr.records() {
        let record = result?;
        let accession = record
            .get(hit_col)
            .unwrap_or("")
            .split(' ')
            .next()
            .unwrap_or("");
        if !accession.is_empty() {
            accessions.insert(accession.to_string());
        }
    }

    info!(
        "Loaded {} distinct hit accessions from {}",
        accessions.len(),
        path.display()
    );
    Ok(accessions)
}

/// Tags every metadata record with whether its accession was hit by the
/// assay, and derives collection/release years.
///
/// Hit-set accessions that never appear in the metadata are silently
/// ignored; they simply contribute no row here. Input columns other
/// than accession and virus taxid are dropped.
pub fn assess_data(
    records: &[GenomeRecord],
    hit_accessions: &HashSet<String>,
) -> Vec<AssessedRecord> {
    records
        .iter()
        .map(|r| AssessedRecord {
            accession: r.accession.clone(),
            taxid: r.taxid,
            collection_year: date_year(r.collection_date.as_deref()),
            release_year: date_year(r.release_date.as_deref()),
            hit: hit_accessions.contains(&r.accession),
        })
        .collect()
}
