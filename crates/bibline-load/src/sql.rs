//! SQL generation for the table loader.
//!
//! Strategy per table:
//! - `CREATE TABLE IF NOT EXISTS` from the Arrow schema (no PRIMARY KEY: key
//!   columns such as `author_position` and `award_id` may be null)
//! - stage the shard files into a temp table with explicit column types
//! - delete target rows whose key matches a staged row (`IS NOT DISTINCT FROM`)
//! - insert the staged rows

use std::path::{Path, PathBuf};

use arrow::datatypes::{DataType, Schema};
use bibline_core::OutputFormat;
use bibline_normalize::Table;

/// DuckDB column type for an emitted Arrow type.
pub fn duckdb_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        DataType::Date32 => "DATE",
        DataType::Timestamp(_, _) => "TIMESTAMP",
        _ => "VARCHAR",
    }
}

fn column_names(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Staging temp table name for `table`.
pub fn stage_name(table: Table) -> String {
    format!("stage_{}", table.name())
}

/// DDL for the target table.
pub fn create_table(table: Table) -> String {
    let columns: Vec<String> = table
        .schema()
        .fields()
        .iter()
        .map(|f| {
            let not_null = if f.is_nullable() { "" } else { " NOT NULL" };
            format!("{} {}{not_null}", f.name(), duckdb_type(f.data_type()))
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name(),
        columns.join(", ")
    )
}

/// Quoted list literal of file paths: `['a.parquet', 'b.parquet']`
fn file_list(files: &[PathBuf]) -> String {
    let quoted: Vec<String> = files.iter().map(|p| quote(p)).collect();
    format!("[{}]", quoted.join(", "))
}

fn quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

/// Create (or replace) the staging temp table over `files`.
///
/// Parquet columns are cast to the target types; CSV is read without type
/// sniffing, with the column types spelled out.
pub fn stage_files(table: Table, files: &[PathBuf], format: OutputFormat) -> String {
    let schema = table.schema();
    let source = match format {
        OutputFormat::Parquet => {
            let casts: Vec<String> = schema
                .fields()
                .iter()
                .map(|f| {
                    format!(
                        "CAST({name} AS {ty}) AS {name}",
                        name = f.name(),
                        ty = duckdb_type(f.data_type())
                    )
                })
                .collect();
            format!(
                "SELECT {} FROM read_parquet({})",
                casts.join(", "),
                file_list(files)
            )
        }
        OutputFormat::Csv => {
            let types: Vec<String> = schema
                .fields()
                .iter()
                .map(|f| format!("'{}': '{}'", f.name(), duckdb_type(f.data_type())))
                .collect();
            format!(
                "SELECT {} FROM read_csv({}, header = true, auto_detect = false, columns = {{{}}})",
                column_names(schema),
                file_list(files),
                types.join(", ")
            )
        }
    };
    format!(
        "CREATE OR REPLACE TEMP TABLE {} AS {source}",
        stage_name(table)
    )
}

/// Delete target rows whose composite key appears in the staging table.
pub fn delete_matching(table: Table) -> String {
    let on: Vec<String> = table
        .key_columns()
        .iter()
        .map(|k| format!("t.{k} IS NOT DISTINCT FROM s.{k}"))
        .collect();
    format!(
        "DELETE FROM {name} AS t WHERE EXISTS (SELECT 1 FROM {stage} AS s WHERE {on})",
        name = table.name(),
        stage = stage_name(table),
        on = on.join(" AND ")
    )
}

/// Insert every staged row into the target table.
pub fn insert_staged(table: Table) -> String {
    let columns = column_names(table.schema());
    format!(
        "INSERT INTO {name} ({columns}) SELECT {columns} FROM {stage}",
        name = table.name(),
        stage = stage_name(table)
    )
}

pub fn count_rows(relation: &str) -> String {
    format!("SELECT count(*) FROM {relation}")
}

pub fn drop_stage(table: Table) -> String {
    format!("DROP TABLE IF EXISTS {}", stage_name(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_follows_arrow_schema() {
        let ddl = create_table(Table::PublicationCitationCounts);
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS publication_citation_counts \
             (doi VARCHAR NOT NULL, year INTEGER NOT NULL, cited_by_count BIGINT NOT NULL)"
        );
        let pubs = create_table(Table::Publications);
        assert!(pubs.contains("doi VARCHAR NOT NULL"));
        assert!(pubs.contains("publication_date DATE"));
        assert!(pubs.contains("updated_date TIMESTAMP"));
        assert!(pubs.contains("is_retracted BOOLEAN"));
        assert!(!pubs.contains("PRIMARY KEY"));
    }

    #[test]
    fn delete_matches_null_key_parts() {
        let sql = delete_matching(Table::PublicationFunding);
        assert!(sql.contains("t.doi IS NOT DISTINCT FROM s.doi"));
        assert!(sql.contains("t.funder_id IS NOT DISTINCT FROM s.funder_id"));
        assert!(sql.contains("t.award_id IS NOT DISTINCT FROM s.award_id"));
        assert!(sql.contains("FROM stage_publication_funding AS s"));
    }

    #[test]
    fn staging_lists_files_and_types() {
        let files = vec![
            PathBuf::from("/tmp/funders_0000.csv"),
            PathBuf::from("/tmp/o'brien/funders_0001.csv"),
        ];
        let csv = stage_files(Table::Funders, &files, OutputFormat::Csv);
        assert!(csv.starts_with("CREATE OR REPLACE TEMP TABLE stage_funders AS SELECT funder_id, display_name"));
        assert!(csv.contains("['/tmp/funders_0000.csv', '/tmp/o''brien/funders_0001.csv']"));
        assert!(csv.contains("columns = {'funder_id': 'VARCHAR', 'display_name': 'VARCHAR'}"));

        let parquet = stage_files(Table::Funders, &files[..1], OutputFormat::Parquet);
        assert!(parquet.contains("CAST(funder_id AS VARCHAR) AS funder_id"));
        assert!(parquet.contains("read_parquet(['/tmp/funders_0000.csv'])"));
    }

    #[test]
    fn insert_names_columns() {
        assert_eq!(
            insert_staged(Table::Funders),
            "INSERT INTO funders (funder_id, display_name) \
             SELECT funder_id, display_name FROM stage_funders"
        );
    }
}
