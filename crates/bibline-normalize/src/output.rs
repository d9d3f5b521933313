//! Write a [`TableSet`] as sharded table files

use std::path::Path;

use anyhow::{Context, Result};
use bibline_core::{SinkOptions, TableOutput, TableSink};
use rayon::prelude::*;

use crate::schema::Table;
use crate::tables::TableSet;

/// Files and rows written for one table
#[derive(Debug, Clone)]
pub struct WrittenTable {
    pub table: Table,
    pub output: TableOutput,
}

/// Write all nine tables into `output_dir`, one table per rayon task.
///
/// Results are in [`Table::ALL`] order. Each table replaces the shards a
/// previous run left for it; an empty table leaves no files.
pub fn write_tables(
    tables: &TableSet,
    output_dir: &Path,
    opts: SinkOptions,
) -> Result<Vec<WrittenTable>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    Table::ALL
        .par_iter()
        .map(|&table| write_table(tables, table, output_dir, opts))
        .collect()
}

fn write_table(
    tables: &TableSet,
    table: Table,
    output_dir: &Path,
    opts: SinkOptions,
) -> Result<WrittenTable> {
    let batches = tables
        .record_batches(table)
        .with_context(|| format!("Failed to build {table} batches"))?;
    let mut sink = TableSink::new(table.name(), output_dir, table.schema().clone(), opts)
        .with_context(|| format!("Failed to open {table} sink"))?;
    for batch in &batches {
        sink.write_batch(batch)
            .with_context(|| format!("Failed to write {table}"))?;
    }
    let output = sink
        .finish()
        .with_context(|| format!("Failed to finalize {table}"))?;
    log::debug!(
        "{table}: {} rows in {} file(s)",
        output.rows,
        output.files.len()
    );
    Ok(WrittenTable { table, output })
}

#[cfg(test)]
mod tests {
    use bibline_core::{OutputFormat, table_files};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::decompose::decompose;
    use crate::source::OpenAlex;

    fn tables() -> TableSet {
        let batch: Vec<_> = (0..7)
            .map(|i| {
                json!({
                    "doi": format!("10.1/{i}"),
                    "title": format!("t{i}"),
                    "authorships": [{"author": {"id": format!("A{i}")}}]
                })
            })
            .collect();
        decompose(&batch, &OpenAlex).tables
    }

    #[test]
    fn writes_every_non_empty_table() {
        let dir = TempDir::new().unwrap();
        let opts = SinkOptions {
            max_rows_per_file: 3,
            ..Default::default()
        };
        let written = write_tables(&tables(), dir.path(), opts).unwrap();
        assert_eq!(written.len(), Table::ALL.len());

        let pubs = &written[0];
        assert_eq!(pubs.table, Table::Publications);
        assert_eq!(pubs.output.rows, 7);
        assert_eq!(pubs.output.files.len(), 3);

        let funding = written
            .iter()
            .find(|w| w.table == Table::PublicationFunding)
            .unwrap();
        assert_eq!(funding.output.rows, 0);
        assert!(
            table_files(dir.path(), "publication_funding", OutputFormat::Parquet)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn csv_rewrite_replaces_previous_shards() {
        let dir = TempDir::new().unwrap();
        let opts = SinkOptions {
            format: OutputFormat::Csv,
            max_rows_per_file: 2,
            ..Default::default()
        };
        write_tables(&tables(), dir.path(), opts).unwrap();
        assert_eq!(
            table_files(dir.path(), "authors", OutputFormat::Csv).unwrap().len(),
            4
        );

        let opts = SinkOptions {
            max_rows_per_file: 100,
            ..opts
        };
        write_tables(&tables(), dir.path(), opts).unwrap();
        let files = table_files(dir.path(), "authors", OutputFormat::Csv).unwrap();
        assert_eq!(files.len(), 1);
        let text = std::fs::read_to_string(&files[0]).unwrap();
        assert!(text.starts_with("author_id,display_name,orcid"));
        assert_eq!(text.lines().count(), 8);
    }
}
