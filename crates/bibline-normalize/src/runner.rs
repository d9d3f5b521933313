//! Pipeline orchestration: input files → decomposition → table files

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use bibline_core::{ProgressContext, cleanup_tmp_files, expand_inputs, fmt_num};
use rayon::prelude::*;

use crate::config::Config;
use crate::decompose::{Decomposer, Decomposition, merge_in_order};
use crate::error::BatchError;
use crate::input::{FileStats, RawRecord, read_records};
use crate::output::{WrittenTable, write_tables};
use crate::report::DecomposeReport;

/// Run one normalization batch
pub fn run(config: &Config, progress: &ProgressContext) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    config.validate()?;

    let files = expand_inputs(&config.inputs).context("Failed to expand inputs")?;
    if files.is_empty() {
        anyhow::bail!("No input files matched {:?}", config.inputs);
    }
    cleanup_tmp_files(&config.output_dir)?;

    let workers = config.workers.min(files.len());
    log::info!(
        "Normalizing {} file(s) as {} with {} worker(s)",
        files.len(),
        config.source,
        workers
    );

    let source = config.source.source();
    let (decomposition, bytes) = if workers <= 1 {
        let mut decomposer = Decomposer::new(source);
        let mut bytes = 0;
        for path in &files {
            bytes += feed_file(&mut decomposer, path, progress)?.bytes;
        }
        (decomposer.finish(), bytes)
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("Failed to build worker pool")?;
        let parts: Vec<(Decomposition, FileStats)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let mut decomposer = Decomposer::new(source);
                    let stats = feed_file(&mut decomposer, path, progress)?;
                    Ok::<_, BatchError>((decomposer.finish(), stats))
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        let bytes = parts.iter().map(|(_, s)| s.bytes).sum();
        (merge_in_order(parts.into_iter().map(|(d, _)| d)), bytes)
    };

    let stage = progress.stage_line("write");
    stage.set_message(format!(
        "{} rows to {}",
        fmt_num(decomposition.tables.total_rows()),
        config.output_dir.display()
    ));
    let tables = write_tables(&decomposition.tables, &config.output_dir, config.sink)?;
    stage.finish_and_clear();

    let summary = RunSummary {
        files: files.len(),
        bytes,
        fingerprint: decomposition.tables.fingerprint(),
        report: decomposition.report,
        tables,
        elapsed: start.elapsed(),
    };
    summary.log();
    Ok(summary)
}

/// Stream one file's records into `decomposer`
fn feed_file(
    decomposer: &mut Decomposer<'_>,
    path: &Path,
    progress: &ProgressContext,
) -> Result<FileStats, BatchError> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let pb = progress.file_bar(&name);
    let result = read_records(path, &pb, |raw| match raw {
        RawRecord::Record(record) => {
            let _ = decomposer.push(&record);
        }
        RawRecord::Unparseable { line, message } => {
            log::debug!("{}:{line}: {message}", path.display());
            decomposer.skip_unparseable();
        }
    });
    pb.finish_and_clear();

    let stats = result?;
    log::debug!(
        "{name}: {} records, {} unparseable",
        fmt_num(stats.records),
        fmt_num(stats.unparseable)
    );
    Ok(stats)
}

/// Summary of a normalization run
#[derive(Debug)]
pub struct RunSummary {
    pub files: usize,
    /// Bytes read from disk (compressed size for `.gz`)
    pub bytes: u64,
    pub report: DecomposeReport,
    pub tables: Vec<WrittenTable>,
    /// blake3 over all nine tables; equal across runs on equal input
    pub fingerprint: String,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn empty() -> Self {
        Self {
            files: 0,
            bytes: 0,
            report: DecomposeReport::default(),
            tables: Vec::new(),
            fingerprint: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.output.rows).sum()
    }

    pub fn total_files_written(&self) -> usize {
        self.tables.iter().map(|t| t.output.files.len()).sum()
    }

    pub fn log(&self) {
        log::info!("=== Normalize Summary ===");
        log::info!(
            "Input: {} file(s), {:.1} MiB",
            self.files,
            self.bytes as f64 / (1024.0 * 1024.0)
        );
        self.report.log();
        log::info!(
            "Output: {} rows in {} file(s)",
            fmt_num(self.total_rows()),
            self.total_files_written()
        );
        if !self.fingerprint.is_empty() {
            log::info!("Fingerprint: {}", self.fingerprint);
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        let secs = self.elapsed.as_secs_f64();
        if self.report.records_seen > 0 && secs > 0.0 {
            log::info!(
                "Throughput: {:.0} records/sec",
                self.report.records_seen as f64 / secs
            );
        }
    }
}
