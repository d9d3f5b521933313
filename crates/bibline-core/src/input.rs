//! Local input files: gzip-aware buffered readers and glob expansion.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::MultiGzDecoder;

/// Buffer size for input readers (256KB)
const READ_BUF_SIZE: usize = 256 * 1024;

/// Shared byte counter for progress tracking
pub type ByteCounter = Arc<AtomicU64>;

/// Buffered reader over a (possibly gzipped) local file
pub type InputReader = Box<dyn BufRead + Send>;

/// Reader wrapper that counts compressed bytes read from disk
pub struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Whether a path names a gzip file (`.gz` extension, case-insensitive)
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Extension of the file with any trailing `.gz` removed, lower-cased.
///
/// `works.jsonl.gz` → `jsonl`, `page.JSON` → `json`
pub fn inner_extension(path: &Path) -> Option<String> {
    let path = if is_gzip(path) {
        Path::new(path.file_stem()?)
    } else {
        path
    };
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Open a local file, transparently decompressing `.gz`.
///
/// Returns (reader, byte_counter, file_size)
pub fn open_reader(path: &Path) -> io::Result<(InputReader, ByteCounter, u64)> {
    let file = File::open(path)?;
    let total_bytes = file.metadata()?.len();
    let counter: ByteCounter = Arc::new(AtomicU64::new(0));
    let counting = CountingReader {
        inner: file,
        counter: counter.clone(),
    };
    let reader: InputReader = if is_gzip(path) {
        Box::new(BufReader::with_capacity(
            READ_BUF_SIZE,
            MultiGzDecoder::new(counting),
        ))
    } else {
        Box::new(BufReader::with_capacity(READ_BUF_SIZE, counting))
    };
    Ok((reader, counter, total_bytes))
}

/// Expand input arguments into a sorted, de-duplicated list of files.
///
/// Each argument may be a file, a directory (all regular files inside, one
/// level deep) or a glob pattern. Sorting keeps iteration order reproducible
/// across runs and platforms.
pub fn expand_inputs<S: AsRef<str>>(patterns: &[S]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let entry_path = entry?.path();
                if entry_path.is_file() && !is_tmp(&entry_path) {
                    files.push(entry_path);
                }
            }
            continue;
        }
        let matches = glob::glob(pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let before = files.len();
        for entry in matches {
            let entry_path = entry.map_err(|e| io::Error::other(e.to_string()))?;
            if entry_path.is_file() {
                files.push(entry_path);
            }
        }
        if files.len() == before {
            log::warn!("No input files match {pattern}");
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_tmp(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
}
