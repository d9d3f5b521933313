//! Normalization run configuration

use std::path::PathBuf;

use bibline_core::SinkOptions;

use crate::source::SourceKind;

/// Runtime configuration for one normalization run
#[derive(Debug, Clone)]
pub struct Config {
    /// Input files, directories or glob patterns
    pub inputs: Vec<String>,
    /// Directory receiving the nine table outputs
    pub output_dir: PathBuf,
    /// Raw schema of the input records
    pub source: SourceKind,
    /// Output format and sharding
    pub sink: SinkOptions,
    /// Files decomposed concurrently; 1 streams everything through one decomposer
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output_dir: PathBuf::from("output"),
            source: SourceKind::default(),
            sink: SinkOptions::default(),
            workers: default_workers(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.inputs.is_empty() {
            anyhow::bail!("No inputs given");
        }
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.sink.max_rows_per_file == 0 {
            anyhow::bail!("max_rows_per_file must be at least 1");
        }
        Ok(())
    }
}

/// One worker per available core
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
