use std::path::PathBuf;

use bibline_core::OutputFormat;

/// Configuration for loading emitted tables into DuckDB.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Directory holding the `{table}_NNNN.{ext}` shards of one normalize run
    pub tables_dir: PathBuf,
    /// DuckDB database file, created when missing
    pub database: PathBuf,
    /// Shard format to pick up from `tables_dir`
    pub format: OutputFormat,
    /// DuckDB memory limit (e.g. "8GB"); DuckDB's default when `None`
    pub memory_limit: Option<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            tables_dir: PathBuf::from("output"),
            database: PathBuf::from("bibline.duckdb"),
            format: OutputFormat::Parquet,
            memory_limit: None,
        }
    }
}
