//! bibline-load: upsert emitted tables into DuckDB
//!
//! Reads the `{table}_NNNN.{parquet,csv}` shards of a normalize run and merges
//! them into a DuckDB database, replacing existing rows with equal keys.

mod config;
mod sql;

pub use config::LoadConfig;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bibline_core::{fmt_num, table_files};
use bibline_normalize::Table;
use duckdb::Connection;

/// Outcome for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoad {
    pub table: Table,
    /// Shard files read
    pub files: usize,
    /// Rows read from the shards
    pub staged: u64,
    /// Existing rows replaced by a staged row with the same key
    pub replaced: u64,
    /// Rows in the target table after the load
    pub total: u64,
}

impl TableLoad {
    pub fn skipped(&self) -> bool {
        self.files == 0
    }
}

/// Summary statistics from one load.
#[derive(Debug)]
pub struct LoadSummary {
    pub database: PathBuf,
    pub tables: Vec<TableLoad>,
    pub elapsed: Duration,
}

impl LoadSummary {
    pub fn staged_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.staged).sum()
    }

    pub fn table(&self, table: Table) -> Option<&TableLoad> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn log(&self) {
        log::info!("=== Load Summary ===");
        log::info!("Database: {}", self.database.display());
        for t in &self.tables {
            if t.skipped() {
                continue;
            }
            log::info!(
                "  {}: {} staged, {} replaced, {} total",
                t.table,
                fmt_num(t.staged as usize),
                fmt_num(t.replaced as usize),
                fmt_num(t.total as usize)
            );
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

/// Run the load.
pub fn run(config: &LoadConfig) -> Result<LoadSummary> {
    let start = Instant::now();
    if !config.tables_dir.is_dir() {
        anyhow::bail!("Tables directory not found: {}", config.tables_dir.display());
    }
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut conn = Connection::open(&config.database)
        .with_context(|| format!("Failed to open DuckDB at {}", config.database.display()))?;
    if let Some(limit) = &config.memory_limit {
        conn.execute_batch(&format!("SET memory_limit = '{limit}'"))
            .context("Failed to configure DuckDB")?;
    }

    let mut tables = Vec::with_capacity(Table::ALL.len());
    for (i, table) in Table::ALL.into_iter().enumerate() {
        let files = table_files(&config.tables_dir, table.name(), config.format)
            .with_context(|| format!("Failed to list {table} shards"))?;
        if files.is_empty() {
            log::info!(
                "Table {}/{}: {table} has no {} shards, skipping",
                i + 1,
                Table::ALL.len(),
                config.format
            );
            tables.push(TableLoad {
                table,
                files: 0,
                staged: 0,
                replaced: 0,
                total: 0,
            });
            continue;
        }
        log::info!(
            "Table {}/{}: loading {table} from {} file(s)",
            i + 1,
            Table::ALL.len(),
            files.len()
        );
        let load = load_table(&mut conn, table, &files, config)
            .with_context(|| format!("Failed to load {table}"))?;
        tables.push(load);
    }

    let summary = LoadSummary {
        database: config.database.clone(),
        tables,
        elapsed: start.elapsed(),
    };
    summary.log();
    Ok(summary)
}

/// Stage, delete-matching and insert one table inside a single transaction.
fn load_table(
    conn: &mut Connection,
    table: Table,
    files: &[PathBuf],
    config: &LoadConfig,
) -> Result<TableLoad> {
    let tx = conn.transaction().context("Failed to begin transaction")?;

    tx.execute_batch(&sql::create_table(table))
        .context("Failed to create table")?;
    tx.execute_batch(&sql::stage_files(table, files, config.format))
        .context("Failed to stage shard files")?;
    let staged = count(&tx, &sql::stage_name(table))?;

    let replaced = tx
        .execute(&sql::delete_matching(table), [])
        .context("Failed to delete matching rows")?;
    tx.execute_batch(&sql::insert_staged(table))
        .context("Failed to insert staged rows")?;
    tx.execute_batch(&sql::drop_stage(table))
        .context("Failed to drop staging table")?;
    let total = count(&tx, table.name())?;

    tx.commit().context("Failed to commit")?;
    log::debug!("{table}: {staged} staged, {replaced} replaced, {total} total");

    Ok(TableLoad {
        table,
        files: files.len(),
        staged,
        replaced: replaced as u64,
        total,
    })
}

fn count(conn: &Connection, relation: &str) -> Result<u64> {
    let n = conn
        .query_row(&sql::count_rows(relation), [], |row| row.get::<_, i64>(0))
        .with_context(|| format!("Failed to count {relation}"))?;
    Ok(n as u64)
}
