//! Record input: JSON-lines and JSON files, optionally gzip-compressed

use std::io::{BufRead, Read};
use std::path::Path;
use std::sync::atomic::Ordering;

use bibline_core::{fmt_num, inner_extension, open_reader, upgrade_to_bar};
use indicatif::ProgressBar;
use serde_json::Value;

use crate::error::BatchError;

/// Initial capacity for the per-line read buffer
const LINE_BUF_CAPACITY: usize = 16 * 1024;

/// Progress update interval (every N records)
const UPDATE_INTERVAL: usize = 1_000;

/// Layout of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One record per line (`.jsonl`, `.ndjson`)
    JsonLines,
    /// One document: a record, a list of records or a page envelope (`.json`)
    Json,
}

impl InputFormat {
    /// From the extension under any `.gz`; unknown extensions are read as lines
    pub fn detect(path: &Path) -> Self {
        match inner_extension(path).as_deref() {
            Some("json") => Self::Json,
            _ => Self::JsonLines,
        }
    }
}

/// One item read from an input file
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Record(Value),
    /// A line that is not JSON
    Unparseable { line: usize, message: String },
}

/// Counters for one input file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    pub records: usize,
    pub unparseable: usize,
    pub bytes: u64,
}

/// Stream the records of `path` into `on_record`, in file order.
///
/// JSON-lines are parsed one line at a time; blank lines are ignored. A
/// `.json` document is parsed whole and unwrapped from a known envelope.
pub fn read_records(
    path: &Path,
    pb: &ProgressBar,
    mut on_record: impl FnMut(RawRecord),
) -> Result<FileStats, BatchError> {
    let io_err = |source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    };
    let (mut reader, counter, total_bytes) = open_reader(path).map_err(io_err)?;
    upgrade_to_bar(pb, total_bytes);

    let mut stats = FileStats::default();
    match InputFormat::detect(path) {
        InputFormat::JsonLines => {
            let mut buf = String::with_capacity(LINE_BUF_CAPACITY);
            let mut line_no = 0usize;
            loop {
                buf.clear();
                if reader.read_line(&mut buf).map_err(io_err)? == 0 {
                    break;
                }
                line_no += 1;
                let line = buf.trim();
                if line.is_empty() {
                    continue;
                }
                match sonic_rs::from_str::<Value>(line) {
                    Ok(record) => {
                        stats.records += 1;
                        on_record(RawRecord::Record(record));
                    }
                    Err(e) => {
                        stats.unparseable += 1;
                        on_record(RawRecord::Unparseable {
                            line: line_no,
                            message: e.to_string(),
                        });
                    }
                }
                if (stats.records + stats.unparseable).is_multiple_of(UPDATE_INTERVAL) {
                    pb.set_position(counter.load(Ordering::Relaxed));
                    pb.set_message(format!("{} records", fmt_num(stats.records)));
                }
            }
        }
        InputFormat::Json => {
            let mut text = String::new();
            reader.read_to_string(&mut text).map_err(io_err)?;
            let document: Value =
                sonic_rs::from_str(&text).map_err(|e| BatchError::Json {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            for record in unwrap_document(path, document)? {
                stats.records += 1;
                on_record(RawRecord::Record(record));
            }
        }
    }

    stats.bytes = counter.load(Ordering::Relaxed);
    pb.set_position(stats.bytes);
    Ok(stats)
}

/// Read a whole file into memory
pub fn load_records(path: &Path) -> Result<(Vec<RawRecord>, FileStats), BatchError> {
    let mut records = Vec::new();
    let stats = read_records(path, &ProgressBar::hidden(), |r| records.push(r))?;
    Ok((records, stats))
}

/// Records of a `.json` document.
///
/// Accepts a top-level list, an OpenAlex list page (`{"results": [...]}`),
/// a Scopus search page (`{"search-results": {"entry": [...]}}`) or a single
/// record object. Anything else cannot be iterated.
pub fn unwrap_document(path: &Path, document: Value) -> Result<Vec<Value>, BatchError> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(_)) = map.get("results") {
                if let Some(Value::Array(items)) = map.remove("results") {
                    return Ok(items);
                }
            }
            if let Some(entries) = map
                .get_mut("search-results")
                .and_then(|r| r.get_mut("entry"))
                .and_then(Value::as_array_mut)
            {
                return Ok(std::mem::take(entries));
            }
            Ok(vec![Value::Object(map)])
        }
        other => Err(BatchError::NotIterable {
            path: path.to_path_buf(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
