//! Input/Output operations module.
//!
//! Reading of the tab-separated input tables lives next to the types
//! that consume them; this module holds the FASTA sub-module and the
//! writers for the derived summary tables.

pub mod fasta;

use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::aggregate::{YearCounts, YearMatrix, YearSeries, YEAR_COUNT_COLUMNS};
use crate::counts::AssaySummary;

fn tsv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output table {}", path.display()))?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(BufWriter::new(file)))
}

/// Formats a matrix cell: empty for NaN (missing), no decimal point for
/// integral values.
fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Writes the wide multi-assay summary as TSV.
///
/// Column order: Virus Group, TaxID, one Hits column per assay in input
/// order, Total. Missing hits cells are written empty.
pub fn write_assay_summary(summary: &AssaySummary, path: &Path) -> Result<()> {
    let mut writer = tsv_writer(path)?;

    let mut header = vec!["Virus Group".to_string(), "TaxID".to_string()];
    header.extend(summary.assay_names.iter().map(|n| format!("{} Hits", n)));
    header.push("Total".to_string());
    writer.write_record(&header)?;

    for row in &summary.rows {
        let mut record = vec![row.group.clone(), row.taxid.to_string()];
        record.extend(
            row.hits
                .iter()
                .map(|h| h.map_or(String::new(), |v| v.to_string())),
        );
        record.push(row.total.to_string());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!(
        "Wrote summary of {} group row(s) to {}",
        summary.rows.len(),
        path.display()
    );
    Ok(())
}

/// Writes a group-by-year matrix (totals or ratios) as TSV, indexed by
/// Virus Group with bare year column labels.
pub fn write_year_matrix(matrix: &YearMatrix, path: &Path) -> Result<()> {
    let mut writer = tsv_writer(path)?;

    let mut header = vec!["Virus Group".to_string()];
    header.extend(matrix.years.iter().map(|y| y.to_string()));
    writer.write_record(&header)?;

    for (row, (group, _taxid)) in matrix.groups.iter().enumerate() {
        let mut record = vec![group.clone()];
        record.extend(matrix.values.row(row).iter().map(|&v| format_cell(v)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes one separated Total/Hit series (collection or release years)
/// as TSV.
pub fn write_year_series(series: &YearSeries, path: &Path) -> Result<()> {
    let mut writer = tsv_writer(path)?;

    writer.write_record([series.index_label.as_str(), "Total", "Hit"])?;
    for (row, year) in series.years.iter().enumerate() {
        writer.write_record([
            year.to_string(),
            format_cell(series.total[row]),
            format_cell(series.hit[row]),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes the year-indexed tally table as TSV.
pub fn write_year_counts(counts: &YearCounts, path: &Path) -> Result<()> {
    let mut writer = tsv_writer(path)?;

    let mut header = vec!["Year".to_string()];
    header.extend(YEAR_COUNT_COLUMNS.iter().map(|c| c.to_string()));
    writer.write_record(&header)?;

    for (row, year) in counts.years.iter().enumerate() {
        let mut record = vec![year.to_string()];
        record.extend(counts.values.row(row).iter().map(|&v| format_cell(v)));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
