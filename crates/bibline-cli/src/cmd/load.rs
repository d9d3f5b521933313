//! Load subcommand - upsert emitted tables into a DuckDB database

use std::path::PathBuf;

use anyhow::Result;
use bibline_core::{OutputFormat, fmt_num};
use bibline_load::{LoadConfig, LoadSummary};
use clap::Args;
use comfy_table::Cell;

use super::styled_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Directory holding the table files of a normalize run
    #[arg(short, long)]
    pub tables: Option<PathBuf>,

    /// DuckDB database file (created when missing)
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Format of the table files (parquet, csv)
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// DuckDB memory limit (e.g. "8GB")
    #[arg(long)]
    pub memory_limit: Option<String>,
}

impl LoadArgs {
    pub fn to_config(&self, config: &Config) -> LoadConfig {
        LoadConfig {
            tables_dir: self
                .tables
                .clone()
                .unwrap_or_else(|| config.output.dir.clone()),
            database: self
                .database
                .clone()
                .unwrap_or_else(|| config.load.database_path()),
            format: self.format.unwrap_or(config.output.format),
            memory_limit: self
                .memory_limit
                .clone()
                .or_else(|| config.load.memory_limit.clone()),
        }
    }
}

pub fn run(args: LoadArgs, config: &Config) -> Result<()> {
    let load_config = args.to_config(config);
    log::info!(
        "Loading {} tables from {} into {}",
        load_config.format,
        load_config.tables_dir.display(),
        load_config.database.display()
    );

    let summary = bibline_load::run(&load_config)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &LoadSummary) {
    let mut table = styled_table(&["Table", "Staged", "Replaced", "Total"]);
    for t in &summary.tables {
        if t.skipped() {
            table.add_row(vec![
                Cell::new(t.table.name()),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("skipped"),
            ]);
            continue;
        }
        table.add_row(vec![
            Cell::new(t.table.name()),
            Cell::new(fmt_num(t.staged as usize)),
            Cell::new(fmt_num(t.replaced as usize)),
            Cell::new(fmt_num(t.total as usize)),
        ]);
    }
    eprintln!("\n{table}");
}
