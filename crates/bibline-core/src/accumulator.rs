//! Row accumulator trait shared by all output tables

use arrow::array::RecordBatch;
use arrow::error::ArrowError;

/// Default batch size for flushing accumulated rows into a `RecordBatch`.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Column-wise buffer that turns typed rows into Arrow `RecordBatch`es.
///
/// Each output table has one implementation holding a `Vec` per column.
/// Rows are pushed in the order they should appear in the output.
pub trait Accumulator {
    type Row;

    /// Push a row into the accumulator
    fn push(&mut self, row: Self::Row);

    /// Number of rows currently buffered
    fn len(&self) -> usize;

    /// Check if buffer is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full and should be flushed
    fn is_full(&self) -> bool {
        self.len() >= DEFAULT_BATCH_SIZE
    }

    /// Take buffered rows as a RecordBatch, resetting internal state
    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError>;
}

/// Drain `rows` through `acc`, yielding one `RecordBatch` per full buffer.
///
/// Always yields at least one batch so that empty tables still carry a schema.
pub fn collect_batches<A, I>(acc: &mut A, rows: I) -> Result<Vec<RecordBatch>, ArrowError>
where
    A: Accumulator,
    I: IntoIterator<Item = A::Row>,
{
    let mut batches = Vec::new();
    for row in rows {
        acc.push(row);
        if acc.is_full() {
            batches.push(acc.take_batch()?);
        }
    }
    if !acc.is_empty() || batches.is_empty() {
        batches.push(acc.take_batch()?);
    }
    Ok(batches)
}
