use std::sync::Arc;

use arrow::array::{Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use bibline_core::{OutputFormat, SinkOptions, TableSink};

fn synthetic_batch(n: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("doi", DataType::Utf8, false),
        Field::new("year", DataType::Int64, false),
    ]));
    let dois = StringArray::from(
        (0..n)
            .map(|i| format!("10.1000/bench.{i}"))
            .collect::<Vec<_>>(),
    );
    let years = Int64Array::from((0..n as i64).map(|i| 2000 + i % 25).collect::<Vec<_>>());
    RecordBatch::try_new(schema, vec![Arc::new(dois), Arc::new(years)]).unwrap()
}

#[divan::bench(args = [OutputFormat::Parquet, OutputFormat::Csv])]
fn write_sharded(bencher: divan::Bencher, format: OutputFormat) {
    let batch = synthetic_batch(20_000);
    let dir = tempfile::tempdir().unwrap();
    let opts = SinkOptions {
        format,
        ..SinkOptions::default()
    };
    bencher.bench(|| {
        let mut sink = TableSink::new("bench", dir.path(), batch.schema(), opts).unwrap();
        sink.write_batch(&batch).unwrap();
        sink.finish().unwrap();
    });
}

fn main() {
    divan::main();
}
