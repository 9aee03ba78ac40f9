//! Command-line interface.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

use crate::aggregate::{
    aggregate_counts, calc_totals_ratios, count_years, make_cumulative, separate_year_types,
};
use crate::assay::{assess_data, load_hit_accessions};
use crate::counts::{summarize_assays, CollapseMap};
use crate::io;
use crate::io::fasta::{pull_sequences, read_headers, write_fasta};
use crate::metadata::{filter_data, load_genome_records};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract FASTA records whose header is on an allow-list
    Pullseq {
        /// fasta file
        #[arg(short, long)]
        fasta: PathBuf,

        /// output file
        #[arg(short, long = "output_fasta")]
        output_fasta: PathBuf,

        /// headers of entries to include; without it nothing is written
        #[arg(short = 'i', long = "headers_include")]
        headers_include: Option<PathBuf>,
    },

    /// Summarize hit counts per virus group across one or more assays
    Summarize {
        /// Genome metadata table (tab-separated)
        #[arg(short, long)]
        metadata: PathBuf,

        /// simulate_PCR result table, one per assay
        #[arg(short, long, required = true, num_args = 1..)]
        pcr: Vec<PathBuf>,

        /// Assay name per result table, in the same order
        #[arg(short = 'n', long, required = true, num_args = 1..)]
        assay_names: Vec<String>,

        /// Taxonomy collapse mapping table
        #[arg(short, long)]
        collapse: PathBuf,

        /// Output TSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Cumulative per-group totals and hit ratios over target years
    Aggregate {
        /// Genome metadata table (tab-separated)
        #[arg(short, long)]
        metadata: PathBuf,

        /// simulate_PCR result table
        #[arg(short, long)]
        pcr: PathBuf,

        /// Taxonomy collapse mapping table
        #[arg(short, long)]
        collapse: PathBuf,

        /// Target years, ascending
        #[arg(short, long, required = true, num_args = 1..)]
        years: Vec<i32>,

        /// Output TSV for the cumulative totals
        #[arg(long)]
        totals_out: PathBuf,

        /// Output TSV for the cumulative hit ratios
        #[arg(long)]
        ratios_out: PathBuf,
    },

    /// Per-year collection/release tallies for time-series plotting
    Timeplot {
        /// Genome metadata table (tab-separated)
        #[arg(short, long)]
        metadata: PathBuf,

        /// simulate_PCR result table
        #[arg(short, long)]
        pcr: PathBuf,

        /// Output TSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Write running cumulative sums instead of raw tallies
        #[arg(long)]
        cumulative: bool,

        /// Also write the collection-year Total/Hit series here
        #[arg(long)]
        collection_out: Option<PathBuf>,

        /// Also write the release-year Total/Hit series here
        #[arg(long)]
        release_out: Option<PathBuf>,
    },
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Pullseq {
            fasta,
            output_fasta,
            headers_include,
        } => {
            let headers_path = match headers_include {
                Some(path) => path,
                None => {
                    warn!("No header list supplied; nothing to do.");
                    return Ok(());
                }
            };

            let wanted = read_headers(&headers_path)?;
            let filtered = pull_sequences(&fasta, wanted)?;
            let written = write_fasta(filtered, &output_fasta)?;
            info!("Wrote {} record(s) to {}", written, output_fasta.display());
        }

        Commands::Summarize {
            metadata,
            pcr,
            assay_names,
            collapse,
            output,
        } => {
            let records = filter_data(&load_genome_records(&metadata)?);
            let collapse_map = CollapseMap::from_path(&collapse)?;
            if collapse_map.is_empty() {
                warn!("Collapse mapping is empty; every taxid will be dropped.");
            }

            let mut assays = Vec::with_capacity(pcr.len());
            for path in &pcr {
                let hits = load_hit_accessions(path)?;
                assays.push(assess_data(&records, &hits));
            }

            let summary = summarize_assays(&assays, &assay_names, &collapse_map)?;
            io::write_assay_summary(&summary, &output)?;
        }

        Commands::Aggregate {
            metadata,
            pcr,
            collapse,
            years,
            totals_out,
            ratios_out,
        } => {
            let records = filter_data(&load_genome_records(&metadata)?);
            let hits = load_hit_accessions(&pcr)?;
            let assessed = assess_data(&records, &hits);
            let collapse_map = CollapseMap::from_path(&collapse)?;

            let aggregated = aggregate_counts(&assessed, &years, &collapse_map);
            let (totals, ratios) = calc_totals_ratios(&aggregated);
            io::write_year_matrix(&totals, &totals_out)?;
            io::write_year_matrix(&ratios, &ratios_out)?;
            info!(
                "Wrote totals to {} and ratios to {}",
                totals_out.display(),
                ratios_out.display()
            );
        }

        Commands::Timeplot {
            metadata,
            pcr,
            output,
            cumulative,
            collection_out,
            release_out,
        } => {
            let records = filter_data(&load_genome_records(&metadata)?);
            let hits = load_hit_accessions(&pcr)?;
            let assessed = assess_data(&records, &hits);

            let mut counts = count_years(&assessed);
            if cumulative {
                counts = make_cumulative(&counts);
            }
            io::write_year_counts(&counts, &output)?;
            info!("Wrote year tallies to {}", output.display());

            if collection_out.is_some() || release_out.is_some() {
                let (collection, release) = separate_year_types(&counts);
                if let Some(path) = collection_out {
                    io::write_year_series(&collection, &path)?;
                }
                if let Some(path) = release_out {
                    io::write_year_series(&release, &path)?;
                }
            }
        }
    }

    Ok(())
}
