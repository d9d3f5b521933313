//! Table sink: sharded Parquet / CSV files with atomic tmp→rename

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

/// Default shard size, in rows
pub const DEFAULT_MAX_ROWS_PER_FILE: usize = 5000;

/// File format of emitted tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Parquet,
    Csv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
        }
    }

    pub const ALL: [OutputFormat; 2] = [Self::Parquet, Self::Csv];
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown output format '{other}' (expected parquet or csv)")),
        }
    }
}

/// Options shared by every table written in one run
#[derive(Debug, Clone, Copy)]
pub struct SinkOptions {
    pub format: OutputFormat,
    pub max_rows_per_file: usize,
    pub zstd_level: i32,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Parquet,
            max_rows_per_file: DEFAULT_MAX_ROWS_PER_FILE,
            zstd_level: 3,
        }
    }
}

enum ShardWriter {
    Parquet(ArrowWriter<File>),
    Csv(arrow::csv::Writer<BufWriter<File>>),
}

struct OpenShard {
    writer: ShardWriter,
    tmp_path: PathBuf,
    final_path: PathBuf,
    rows: usize,
}

impl OpenShard {
    fn create(
        table: &str,
        shard_idx: usize,
        output_dir: &Path,
        schema: &Arc<Schema>,
        opts: &SinkOptions,
    ) -> io::Result<Self> {
        let filename = format!("{table}_{shard_idx:04}.{}", opts.format.extension());
        let final_path = output_dir.join(&filename);
        let tmp_path = output_dir.join(format!("{filename}.tmp"));

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        let writer = match opts.format {
            OutputFormat::Parquet => {
                let level = ZstdLevel::try_new(opts.zstd_level)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                let props = WriterProperties::builder()
                    .set_compression(Compression::ZSTD(level))
                    .build();
                let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
                    .map_err(io::Error::other)?;
                ShardWriter::Parquet(writer)
            }
            OutputFormat::Csv => {
                let writer = arrow::csv::WriterBuilder::new()
                    .with_header(true)
                    .build(BufWriter::new(file));
                ShardWriter::Csv(writer)
            }
        };

        Ok(Self {
            writer,
            tmp_path,
            final_path,
            rows: 0,
        })
    }

    fn write(&mut self, batch: &RecordBatch) -> io::Result<()> {
        self.rows += batch.num_rows();
        match &mut self.writer {
            ShardWriter::Parquet(w) => w.write(batch).map_err(io::Error::other),
            ShardWriter::Csv(w) => w.write(batch).map_err(io::Error::other),
        }
    }

    fn finalize(self) -> io::Result<PathBuf> {
        match self.writer {
            ShardWriter::Parquet(w) => {
                w.close().map_err(io::Error::other)?;
            }
            ShardWriter::Csv(w) => {
                let mut inner = w.into_inner();
                io::Write::flush(&mut inner)?;
            }
        }
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(self.final_path)
    }
}

/// Files and rows written for one table
#[derive(Debug, Clone, Default)]
pub struct TableOutput {
    pub files: Vec<PathBuf>,
    pub rows: usize,
}

/// Writes one table as numbered shards of at most `max_rows_per_file` rows.
///
/// Batches are sliced across shard boundaries, so shard sizes depend only on
/// the row sequence and never on how the caller batched it. A table that
/// receives no rows produces no file.
pub struct TableSink {
    table: String,
    output_dir: PathBuf,
    schema: Arc<Schema>,
    opts: SinkOptions,
    current: Option<OpenShard>,
    next_shard: usize,
    output: TableOutput,
}

impl fmt::Debug for TableSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSink")
            .field("table", &self.table)
            .field("format", &self.opts.format)
            .field("rows", &self.output.rows)
            .finish_non_exhaustive()
    }
}

impl TableSink {
    /// Create a sink, removing shards a previous run left for this table
    pub fn new(
        table: &str,
        output_dir: &Path,
        schema: Arc<Schema>,
        opts: SinkOptions,
    ) -> io::Result<Self> {
        if opts.max_rows_per_file == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_rows_per_file must be at least 1",
            ));
        }
        fs::create_dir_all(output_dir)?;
        clear_table_outputs(output_dir, table)?;
        Ok(Self {
            table: table.to_string(),
            output_dir: output_dir.to_path_buf(),
            schema,
            opts,
            current: None,
            next_shard: 0,
            output: TableOutput::default(),
        })
    }

    /// Write a record batch, rolling over to a new shard when full
    pub fn write_batch(&mut self, batch: &RecordBatch) -> io::Result<()> {
        let mut offset = 0;
        while offset < batch.num_rows() {
            let mut shard = match self.current.take() {
                Some(shard) => shard,
                None => {
                    let shard = OpenShard::create(
                        &self.table,
                        self.next_shard,
                        &self.output_dir,
                        &self.schema,
                        &self.opts,
                    )?;
                    self.next_shard += 1;
                    shard
                }
            };
            let room = self.opts.max_rows_per_file - shard.rows;
            let take = room.min(batch.num_rows() - offset);
            shard.write(&batch.slice(offset, take))?;
            offset += take;
            self.output.rows += take;

            if shard.rows >= self.opts.max_rows_per_file {
                self.output.files.push(shard.finalize()?);
            } else {
                self.current = Some(shard);
            }
        }
        Ok(())
    }

    /// Close the open shard (if any) and return what was written
    pub fn finish(mut self) -> io::Result<TableOutput> {
        if let Some(shard) = self.current.take() {
            self.output.files.push(shard.finalize()?);
        }
        Ok(self.output)
    }
}

/// Shard files of `table` in `dir` for the given format, sorted by shard index
pub fn table_files(dir: &Path, table: &str, format: OutputFormat) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(idx) = shard_index(&path, table, Some(format)) {
            files.push((idx, path));
        }
    }
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Remove every shard of `table` (any format) from `dir`
pub fn clear_table_outputs(dir: &Path, table: &str) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if shard_index(&path, table, None).is_some() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    if removed > 0 {
        log::debug!("Removed {removed} old shard(s) of {table}");
    }
    Ok(removed)
}

/// Index of a `{table}_N.{ext}` shard; `N` is zero-padded to at least four digits
fn shard_index(path: &Path, table: &str, format: Option<OutputFormat>) -> Option<usize> {
    let name = path.file_name().and_then(|n| n.to_str())?;
    let rest = name.strip_prefix(table)?.strip_prefix('_')?;
    let (digits, ext) = rest.split_once('.')?;
    let ext_ok = match format {
        Some(f) => ext == f.extension(),
        None => OutputFormat::ALL.iter().any(|f| ext == f.extension()),
    };
    if !ext_ok || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Remove stale .tmp files in the output directory
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
