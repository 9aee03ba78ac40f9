//! Entry point for the PCR assay validation toolkit.
//!
//! Two independent utilities share this binary:
//! 1. `pullseq` filters a FASTA file down to an allow-list of headers.
//! 2. The `summarize`, `aggregate`, and `timeplot` commands
//!    cross-reference simulate_PCR hit results against a genome
//!    metadata table to build the per-group hit/miss tables consumed
//!    by heatmap and time-series plots.

mod aggregate;
mod assay;
mod cli;
mod counts;
mod io;
mod metadata;

use anyhow::Result;
use clap::Parser;

use cli::{run_cli, Cli};

fn main() -> Result<()> {
    // Initialize logging (e.g., RUST_LOG=info)
    env_logger::init();

    // Parse command line arguments
    let cli = Cli::parse();

    // Run CLI
    run_cli(cli)
}
