//! bibline - normalize bibliographic work records into relational tables
//!
//! Decomposes OpenAlex or Scopus work records (JSON lines or JSON documents)
//! into nine Parquet/CSV tables and upserts them into DuckDB.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "bibline")]
#[command(about = "Normalize bibliographic work records into relational tables")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./bibline.toml or ~/.config/bibline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Decompose work records into the nine output tables
    Normalize(cmd::normalize::NormalizeArgs),
    /// Upsert emitted tables into a DuckDB database
    Load(cmd::load::LoadArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(bibline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    bibline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Normalize(args) => cmd::normalize::run(args, &config, &progress),
        Command::Load(args) => cmd::load::run(args, &config),
        Command::Config => {
            let mut table = cmd::styled_table(&["Setting", "Value"]);

            table.add_row(vec![
                "Output directory",
                &config.output.dir.display().to_string(),
            ]);
            table.add_row(vec!["Output format", &config.output.format.to_string()]);
            table.add_row(vec![
                "Rows per file",
                &config.output.max_rows_per_file.to_string(),
            ]);
            table.add_row(vec![
                "Compression level",
                &config.output.compression_level.to_string(),
            ]);
            table.add_row(vec!["Source", config.normalize.source.name()]);
            table.add_row(vec!["Workers", &config.normalize.workers.to_string()]);
            table.add_row(vec![
                "Database",
                &config.load.database_path().display().to_string(),
            ]);
            table.add_row(vec![
                "Memory limit",
                config.load.memory_limit.as_deref().unwrap_or("DuckDB default"),
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}
