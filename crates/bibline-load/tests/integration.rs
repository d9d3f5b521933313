use std::path::{Path, PathBuf};

use bibline_core::{OutputFormat, SinkOptions};
use bibline_load::{LoadConfig, run};
use bibline_normalize::output::write_tables;
use bibline_normalize::{SourceKind, Table, decompose};
use duckdb::Connection;
use serde_json::{Value, json};
use tempfile::TempDir;

fn first_batch() -> Vec<Value> {
    vec![
        json!({
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.1/A",
            "title": "Original",
            "publication_date": "2021-03-04",
            "updated_date": "2024-01-02T03:04:05.678",
            "authorships": [{
                "author_position": "first",
                "author": {"id": "https://openalex.org/A1", "display_name": "Ada"},
                "institutions": [{"id": "https://openalex.org/I1", "display_name": "Inst", "country_code": "GB"}],
                "raw_affiliation_strings": ["Inst, London"]
            }],
            "grants": [
                {"funder": "https://openalex.org/F1", "funder_display_name": "Fund"},
                {"funder": "https://openalex.org/F1", "award_id": "G-1"}
            ],
            "counts_by_year": [{"year": 2023, "cited_by_count": 3}]
        }),
        json!({"doi": "10.1/b", "title": "Second"}),
    ]
}

fn second_batch() -> Vec<Value> {
    vec![
        json!({
            "doi": "10.1/a",
            "title": "Revised",
            "grants": [{"funder": "https://openalex.org/F1"}],
            "counts_by_year": [{"year": 2023, "cited_by_count": 5}]
        }),
        json!({"doi": "10.1/c", "title": "Third"}),
    ]
}

/// Normalize `records` into `dir` and return it
fn emit(dir: &Path, records: &[Value], format: OutputFormat) -> PathBuf {
    let tables = decompose(records, SourceKind::OpenAlex.source()).tables;
    let opts = SinkOptions {
        format,
        max_rows_per_file: 1,
        ..Default::default()
    };
    write_tables(&tables, dir, opts).unwrap();
    dir.to_path_buf()
}

fn config(tables_dir: PathBuf, database: PathBuf, format: OutputFormat) -> LoadConfig {
    LoadConfig {
        tables_dir,
        database,
        format,
        memory_limit: None,
    }
}

fn scalar<T: duckdb::types::FromSql>(db: &Path, sql: &str) -> T {
    let conn = Connection::open(db).unwrap();
    conn.query_row(sql, [], |row| row.get::<_, T>(0)).unwrap()
}

#[test]
fn load_creates_tables_from_parquet() {
    let tmp = TempDir::new().unwrap();
    let tables_dir = emit(&tmp.path().join("t1"), &first_batch(), OutputFormat::Parquet);
    let db = tmp.path().join("db").join("bib.duckdb");

    let summary = run(&config(tables_dir, db.clone(), OutputFormat::Parquet)).unwrap();
    assert_eq!(summary.tables.len(), Table::ALL.len());

    let pubs = summary.table(Table::Publications).unwrap();
    assert_eq!(pubs.files, 2);
    assert_eq!(pubs.staged, 2);
    assert_eq!(pubs.total, 2);
    assert_eq!(pubs.replaced, 0);
    assert_eq!(summary.table(Table::PublicationFunding).unwrap().total, 2);

    assert_eq!(
        scalar::<String>(&db, "SELECT title FROM publications WHERE doi = '10.1/a'"),
        "Original"
    );
    assert_eq!(
        scalar::<String>(
            &db,
            "SELECT CAST(publication_date AS VARCHAR) FROM publications WHERE doi = '10.1/a'"
        ),
        "2021-03-04"
    );
    assert_eq!(
        scalar::<String>(&db, "SELECT typeof(updated_date) FROM publications LIMIT 1"),
        "TIMESTAMP"
    );
    assert_eq!(
        scalar::<i32>(&db, "SELECT year FROM publication_citation_counts"),
        2023
    );
    assert_eq!(
        scalar::<String>(&db, "SELECT raw_affiliation_string FROM authorship_institutions"),
        "Inst, London"
    );
}

#[test]
fn reload_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let tables_dir = emit(&tmp.path().join("t1"), &first_batch(), OutputFormat::Parquet);
    let db = tmp.path().join("bib.duckdb");
    let cfg = config(tables_dir, db.clone(), OutputFormat::Parquet);

    let first = run(&cfg).unwrap();
    let second = run(&cfg).unwrap();
    for (a, b) in first.tables.iter().zip(&second.tables) {
        assert_eq!(a.total, b.total, "{}", a.table);
        assert_eq!(b.replaced, b.staged, "{}", a.table);
    }
    // the null award is matched, not duplicated
    assert_eq!(
        scalar::<i64>(&db, "SELECT count(*) FROM publication_funding WHERE award_id IS NULL"),
        1
    );
}

#[test]
fn later_batch_wins_on_equal_keys() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("bib.duckdb");
    let t1 = emit(&tmp.path().join("t1"), &first_batch(), OutputFormat::Parquet);
    let t2 = emit(&tmp.path().join("t2"), &second_batch(), OutputFormat::Parquet);

    run(&config(t1, db.clone(), OutputFormat::Parquet)).unwrap();
    let summary = run(&config(t2, db.clone(), OutputFormat::Parquet)).unwrap();

    let pubs = summary.table(Table::Publications).unwrap();
    assert_eq!((pubs.staged, pubs.replaced, pubs.total), (2, 1, 3));
    assert_eq!(
        scalar::<String>(&db, "SELECT title FROM publications WHERE doi = '10.1/a'"),
        "Revised"
    );
    assert_eq!(
        scalar::<i64>(
            &db,
            "SELECT cited_by_count FROM publication_citation_counts WHERE doi = '10.1/a' AND year = 2023"
        ),
        5
    );
    // (10.1/a, F1, NULL) replaced, (10.1/a, F1, G-1) kept
    assert_eq!(scalar::<i64>(&db, "SELECT count(*) FROM publication_funding"), 2);

    // tables without shards in the second batch are untouched
    let authors = summary.table(Table::Authors).unwrap();
    assert!(authors.skipped());
    assert_eq!(scalar::<i64>(&db, "SELECT count(*) FROM authors"), 1);
}

#[test]
fn load_reads_csv_shards() {
    let tmp = TempDir::new().unwrap();
    let tables_dir = emit(&tmp.path().join("csv"), &first_batch(), OutputFormat::Csv);
    let db = tmp.path().join("bib.duckdb");

    let summary = run(&config(tables_dir, db.clone(), OutputFormat::Csv)).unwrap();
    assert_eq!(summary.staged_rows(), summary.tables.iter().map(|t| t.total).sum::<u64>());
    assert_eq!(
        scalar::<String>(&db, "SELECT author_position FROM publication_authorships"),
        "first"
    );
    assert_eq!(
        scalar::<String>(
            &db,
            "SELECT CAST(publication_date AS VARCHAR) FROM publications WHERE doi = '10.1/a'"
        ),
        "2021-03-04"
    );
}

#[test]
fn missing_tables_dir_fails() {
    let tmp = TempDir::new().unwrap();
    let cfg = config(
        tmp.path().join("nope"),
        tmp.path().join("bib.duckdb"),
        OutputFormat::Parquet,
    );
    assert!(run(&cfg).is_err());
}
