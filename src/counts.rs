//! Hit/total count tables and taxonomic collapsing.
//!
//! Counts are first grouped per virus taxid, then summed up to coarser
//! reporting groups through an externally supplied collapse mapping.

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::assay::AssessedRecord;
use crate::metadata::column_index;

/// Hit/total counts for a single virus taxid. `hits <= total` always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonCounts {
    pub taxid: u32,
    pub hits: u64,
    pub total: u64,
}

/// Summarizes total and hit data by virus taxid.
///
/// Every taxid present in the input appears exactly once, in ascending
/// taxid order.
pub fn count_data(records: &[AssessedRecord]) -> Vec<TaxonCounts> {
    let mut counts: BTreeMap<u32, (u64, u64)> = BTreeMap::new();
    for r in records {
        let entry = counts.entry(r.taxid).or_insert((0, 0));
        if r.hit {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    counts
        .into_iter()
        .map(|(taxid, (hits, total))| TaxonCounts { taxid, hits, total })
        .collect()
}

/// The reporting group a taxid collapses into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseGroup {
    pub name: String,
    pub taxid: u32,
}

/// Many-to-one mapping from virus taxid to a coarser reporting group.
///
/// Passed explicitly into every function that needs it; there is no
/// process-wide taxonomy state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollapseMap {
    groups: HashMap<u32, CollapseGroup>,
}

impl CollapseMap {
    pub fn new() -> Self {
        CollapseMap {
            groups: HashMap::new(),
        }
    }

    pub fn insert(&mut self, taxid: u32, name: &str, group_taxid: u32) {
        self.groups.insert(
            taxid,
            CollapseGroup {
                name: name.to_string(),
                taxid: group_taxid,
            },
        );
    }

    pub fn get(&self, taxid: u32) -> Option<&CollapseGroup> {
        self.groups.get(&taxid)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Loads the mapping from a tab-separated table with columns
    /// `Virus Taxonomic ID`, `Collapse Name`, `Collapse TaxId`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .with_context(|| format!("Failed to open collapse mapping {}", path.display()))?;

        let headers = rdr.headers()?.clone();
        let taxid_col = column_index(&headers, "Virus Taxonomic ID")?;
        let name_col = column_index(&headers, "Collapse Name")?;
        let group_col = column_index(&headers, "Collapse TaxId")?;

        let mut map = CollapseMap::new();
        for result in rdr.records() {
            let record = result?;
            let taxid: u32 = record
                .get(taxid_col)
                .unwrap_or("")
                .trim()
                .parse()
                .context("Unparseable Virus Taxonomic ID in collapse mapping")?;
            let group_taxid: u32 = record
                .get(group_col)
                .unwrap_or("")
                .trim()
                .parse()
                .context("Unparseable Collapse TaxId in collapse mapping")?;
            let name = record.get(name_col).unwrap_or("").trim();
            map.insert(taxid, name, group_taxid);
        }

        info!(
            "Loaded collapse mapping for {} taxids from {}",
            map.len(),
            path.display()
        );
        Ok(map)
    }
}

/// Hit/total counts for one reporting group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    /// Virus Group.
    pub group: String,
    /// TaxID of the group.
    pub taxid: u32,
    pub hits: u64,
    pub total: u64,
}

/// Sums per-taxid counts up to their reporting groups.
///
/// Taxids with no collapse entry drop out of the grouped sums. Output
/// is sorted by (group name, group taxid).
pub fn collapse_data(counts: &[TaxonCounts], map: &CollapseMap) -> Vec<GroupCounts> {
    let mut grouped: BTreeMap<(String, u32), (u64, u64)> = BTreeMap::new();
    let mut dropped = 0usize;

    for c in counts {
        let group = match map.get(c.taxid) {
            Some(g) => g,
            None => {
                dropped += 1;
                continue;
            }
        };
        let entry = grouped
            .entry((group.name.clone(), group.taxid))
            .or_insert((0, 0));
        entry.0 += c.hits;
        entry.1 += c.total;
    }

    if dropped > 0 {
        warn!("{} taxid(s) had no collapse entry and were dropped", dropped);
    }

    grouped
        .into_iter()
        .map(|((group, taxid), (hits, total))| GroupCounts {
            group,
            taxid,
            hits,
            total,
        })
        .collect()
}

/// Collapsed hit/total counts for a single assay.
pub fn summarize_assay(assessed: &[AssessedRecord], map: &CollapseMap) -> Vec<GroupCounts> {
    collapse_data(&count_data(assessed), map)
}

/// Wide per-group summary across several assays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssaySummary {
    pub assay_names: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

/// One merged row of the multi-assay summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Virus Group.
    pub group: String,
    /// TaxID of the group.
    pub taxid: u32,
    /// One entry per assay, in `assay_names` order; `None` where the
    /// group never appeared in that assay's collapsed counts. No fill
    /// is applied.
    pub hits: Vec<Option<u64>>,
    pub total: u64,
}

/// Merges per-assay collapsed counts into one wide table.
///
/// The merge is an outer join on (group, taxid, total); rows from later
/// assays that do not line up on all three keys become rows of their
/// own, so a group whose Total differs across assays shows up more than
/// once. Assay tables and names are positionally paired and must be the
/// same length.
pub fn summarize_assays(
    assays: &[Vec<AssessedRecord>],
    assay_names: &[String],
    map: &CollapseMap,
) -> Result<AssaySummary> {
    if assays.len() != assay_names.len() {
        return Err(anyhow!(
            "Got {} assay tables but {} assay names",
            assays.len(),
            assay_names.len()
        ));
    }

    let n = assays.len();
    let mut merged: IndexMap<(String, u32, u64), Vec<Option<u64>>> = IndexMap::new();
    for (i, assessed) in assays.iter().enumerate() {
        for gc in summarize_assay(assessed, map) {
            let row = merged
                .entry((gc.group, gc.taxid, gc.total))
                .or_insert_with(|| vec![None; n]);
            row[i] = Some(gc.hits);
        }
    }

    let rows = merged
        .into_iter()
        .map(|((group, taxid, total), hits)| SummaryRow {
            group,
            taxid,
            hits,
            total,
        })
        .collect();

    Ok(AssaySummary {
        assay_names: assay_names.to_vec(),
        rows,
    })
}
