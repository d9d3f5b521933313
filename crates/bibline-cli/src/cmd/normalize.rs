//! Normalize subcommand - decompose work records into the nine tables

use std::path::PathBuf;

use anyhow::Result;
use bibline_core::{OutputFormat, SharedProgress, SinkOptions, fmt_num};
use bibline_normalize::{RunSummary, SourceKind};
use clap::Args;
use comfy_table::Cell;

use super::styled_table;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Input files, directories or glob patterns (.jsonl, .json, optionally .gz)
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Raw record schema (openalex, scopus)
    #[arg(short, long)]
    pub source: Option<SourceKind>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (parquet, csv)
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Rows per output file
    #[arg(long)]
    pub max_rows: Option<usize>,

    /// Number of files decomposed in parallel
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Zstd compression level (1-22)
    #[arg(short, long)]
    pub zstd_level: Option<i32>,
}

impl NormalizeArgs {
    /// Merge flags over the file configuration
    pub fn to_config(&self, config: &Config) -> bibline_normalize::Config {
        bibline_normalize::Config {
            inputs: self.inputs.clone(),
            output_dir: self
                .output
                .clone()
                .unwrap_or_else(|| config.output.dir.clone()),
            source: self.source.unwrap_or(config.normalize.source),
            sink: SinkOptions {
                format: self.format.unwrap_or(config.output.format),
                max_rows_per_file: self.max_rows.unwrap_or(config.output.max_rows_per_file),
                zstd_level: self.zstd_level.unwrap_or(config.output.compression_level),
            },
            workers: self.workers.unwrap_or(config.normalize.workers),
        }
    }
}

pub fn run(args: NormalizeArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let normalize_config = args.to_config(config);
    log::info!("Normalizing {} input(s)", normalize_config.inputs.len());
    log::info!("  Source: {}", normalize_config.source);
    log::info!("  Output: {}", normalize_config.output_dir.display());
    log::info!("  Format: {}", normalize_config.sink.format);

    let summary = bibline_normalize::run(&normalize_config, progress)?;
    print_summary(&summary);
    Ok(())
}

/// Per-table row counts, then record totals, on stderr
fn print_summary(summary: &RunSummary) {
    let mut table = styled_table(&["Table", "Rows", "Files"]);
    for written in &summary.tables {
        table.add_row(vec![
            Cell::new(written.table.name()),
            Cell::new(fmt_num(written.output.rows)),
            Cell::new(written.output.files.len()),
        ]);
    }
    eprintln!("\n{table}");

    let report = &summary.report;
    let mut totals = styled_table(&["Records", "Count"]);
    totals.add_row(vec!["Seen".to_string(), fmt_num(report.records_seen)]);
    totals.add_row(vec!["Accepted".to_string(), fmt_num(report.records_accepted)]);
    totals.add_row(vec!["Skipped".to_string(), fmt_num(report.records_skipped())]);
    totals.add_row(vec![
        "Sub-structures skipped".to_string(),
        fmt_num(report.substructures_skipped()),
    ]);
    totals.add_row(vec![
        "Elapsed".to_string(),
        format!("{:.1}s", summary.elapsed.as_secs_f64()),
    ]);
    eprintln!("{totals}");
}
