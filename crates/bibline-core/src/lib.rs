//! Bibline Core - shared plumbing for the bibliometric normalization pipeline
//!
//! Logging, progress reporting, the row `Accumulator` trait, the sharded
//! Parquet/CSV table sink and local input handling.

pub mod accumulator;
pub mod input;
pub mod logging;
pub mod progress;
pub mod sink;

// Re-exports for convenience
pub use accumulator::{Accumulator, DEFAULT_BATCH_SIZE, collect_batches};
pub use input::{ByteCounter, InputReader, expand_inputs, inner_extension, is_gzip, open_reader};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num, upgrade_to_bar};
pub use sink::{
    DEFAULT_MAX_ROWS_PER_FILE, OutputFormat, SinkOptions, TableOutput, TableSink,
    cleanup_tmp_files, clear_table_outputs, table_files,
};
