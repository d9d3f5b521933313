//! Relational Decomposer: raw work records to the nine-table [`TableSet`]
//!
//! Records are consumed one at a time, so a batch never has to be resident
//! in memory. Per record:
//!
//! 1. Resolve and normalize the DOI; without one the record is skipped.
//! 2. Extract the publication attributes and store the row (last wins).
//! 3. Register authors and institutions (first wins) and emit authorship,
//!    authorship-institution and authorship-country rows.
//! 4. Register funders and emit funding rows.
//! 5. Emit one citation-count row per complete (year, count) pair.
//!
//! A malformed list costs only its own rows; the rest of the record, and
//! the rest of the batch, proceed.

use rayon::prelude::*;
use serde_json::Value;

use crate::doi::normalize_doi;
use crate::error::{RecordSkip, Substructure};
use crate::extract::extract;
use crate::report::DecomposeReport;
use crate::schema::ATTRIBUTE_COLUMNS;
use crate::source::WorkSource;
use crate::tables::{
    AuthorshipCountryRow, AuthorshipInstitutionRow, AuthorshipRow, CitationCountRow,
    FetchStatus, FundingRow, PublicationRow, TableSet,
};

/// Tables and completeness report of a decomposed batch
#[derive(Debug, Clone, Default)]
pub struct Decomposition {
    pub tables: TableSet,
    pub report: DecomposeReport,
}

impl Decomposition {
    /// Fold in the result of records that come later in input order.
    ///
    /// Entities and junction rows keep the earlier observation; publications
    /// take the later one; report counters add up.
    pub fn merge(&mut self, later: Decomposition) {
        self.tables.merge(later.tables);
        self.report.absorb(&later.report);
        self.report.row_counts = self.tables.row_counts();
    }
}

/// Incremental decomposer for one batch
pub struct Decomposer<'s> {
    source: &'s dyn WorkSource,
    tables: TableSet,
    report: DecomposeReport,
}

impl<'s> Decomposer<'s> {
    pub fn new(source: &'s dyn WorkSource) -> Self {
        Self {
            source,
            tables: TableSet::new(),
            report: DecomposeReport::default(),
        }
    }

    pub fn source(&self) -> &'s dyn WorkSource {
        self.source
    }

    pub fn report(&self) -> &DecomposeReport {
        &self.report
    }

    /// Decompose one record. Returns the skip reason when the record
    /// contributed nothing.
    pub fn push(&mut self, record: &Value) -> Result<(), RecordSkip> {
        self.report.records_seen += 1;
        match self.decompose_record(record) {
            Ok(()) => {
                self.report.records_accepted += 1;
                Ok(())
            }
            Err(reason) => {
                self.report.skip_record(reason);
                log::debug!(
                    "Skipping {} record #{}: {reason}",
                    self.source.name(),
                    self.report.records_seen
                );
                Err(reason)
            }
        }
    }

    /// Decompose a chunk of records in order
    pub fn push_all<'v, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'v Value>,
    {
        for record in records {
            let _ = self.push(record);
        }
    }

    /// Count an input line that could not be parsed as a record
    pub fn skip_unparseable(&mut self) {
        self.report.records_seen += 1;
        self.report.skip_record(RecordSkip::Unparseable);
    }

    pub fn finish(self) -> Decomposition {
        let mut report = self.report;
        report.row_counts = self.tables.row_counts();
        Decomposition {
            tables: self.tables,
            report,
        }
    }

    fn decompose_record(&mut self, record: &Value) -> Result<(), RecordSkip> {
        if !record.is_object() {
            return Err(RecordSkip::NotAnObject);
        }
        let doi = resolve_doi(record, self.source.doi_path())?;

        let mut attributes = extract(record, self.source.fields(), ATTRIBUTE_COLUMNS);
        self.source.summarize(record, &mut attributes);
        self.tables.publications.insert_last(PublicationRow {
            doi: doi.clone(),
            attributes,
            fetch_status: fetch_status(record),
        });

        self.add_authorships(&doi, record);
        self.add_grants(&doi, record);
        self.add_citation_counts(&doi, record);
        Ok(())
    }

    fn add_authorships(&mut self, doi: &str, record: &Value) {
        let authorships = self.source.authorships(record);
        self.note_list(Substructure::Authorships, authorships.malformed, authorships.skipped_items);
        for kind in self.source.malformed_lists(record) {
            self.note_list(kind, true, 0);
        }

        for entry in authorships.rows {
            for kind in &entry.malformed {
                self.note_list(*kind, true, 0);
            }
            self.report.skipped_items += entry.skipped_items;

            let author_id = entry.author.author_id.clone();
            self.tables.authors.register(entry.author);
            self.tables.authorships.insert_first(AuthorshipRow {
                doi: doi.to_string(),
                author_id: author_id.clone(),
                author_position: entry.position,
                is_corresponding: entry.is_corresponding,
                raw_author_name: entry.raw_author_name,
            });

            for affiliation in entry.institutions {
                let institution_id = affiliation.institution.institution_id.clone();
                self.tables.institutions.register(affiliation.institution);
                self.tables
                    .authorship_institutions
                    .insert_first(AuthorshipInstitutionRow {
                        doi: doi.to_string(),
                        author_id: author_id.clone(),
                        institution_id,
                        raw_affiliation_string: affiliation.raw_affiliation_string,
                    });
            }
            for country_code in entry.countries {
                self.tables
                    .authorship_countries
                    .insert_first(AuthorshipCountryRow {
                        doi: doi.to_string(),
                        author_id: author_id.clone(),
                        country_code,
                    });
            }
        }
    }

    fn add_grants(&mut self, doi: &str, record: &Value) {
        let grants = self.source.grants(record);
        self.note_list(Substructure::Grants, grants.malformed, grants.skipped_items);

        for grant in grants.rows {
            let funder_id = grant.funder.funder_id.clone();
            self.tables.funders.register(grant.funder);
            self.tables.funding.insert_first(FundingRow {
                doi: doi.to_string(),
                funder_id,
                award_id: grant.award_id,
            });
        }
    }

    fn add_citation_counts(&mut self, doi: &str, record: &Value) {
        let counts = self.source.counts_by_year(record);
        self.note_list(Substructure::CountsByYear, counts.malformed, counts.skipped_items);

        for count in counts.rows {
            self.tables.citation_counts.insert_first(CitationCountRow {
                doi: doi.to_string(),
                year: count.year,
                cited_by_count: count.cited_by_count,
            });
        }
    }

    fn note_list(&mut self, kind: Substructure, malformed: bool, skipped_items: usize) {
        if malformed {
            log::debug!(
                "Record #{}: {kind}, contributing no rows",
                self.report.records_seen
            );
            self.report.skip_substructure(kind);
        }
        self.report.skipped_items += skipped_items;
    }
}

/// Normalized DOI of a record, or why there is none
fn resolve_doi(record: &Value, path: &[&str]) -> Result<String, RecordSkip> {
    match crate::extract::lookup(record, path) {
        None => Err(RecordSkip::MissingDoi),
        Some(Value::String(raw)) if raw.trim().is_empty() => Err(RecordSkip::MissingDoi),
        Some(Value::String(raw)) => normalize_doi(raw).ok_or(RecordSkip::InvalidDoi),
        Some(_) => Err(RecordSkip::InvalidDoi),
    }
}

/// Fetch outcome annotation (`fetch_status` / `fetch_error`); absent means success
fn fetch_status(record: &Value) -> FetchStatus {
    let reason = || {
        record
            .get("fetch_error")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    match record.get("fetch_status").and_then(Value::as_str).map(str::trim) {
        Some(s) if s.eq_ignore_ascii_case("not_found") || s.eq_ignore_ascii_case("not-found") => {
            FetchStatus::NotFound
        }
        Some(s) if s.eq_ignore_ascii_case("error") => FetchStatus::Error(reason()),
        _ => FetchStatus::Success,
    }
}

/// Decompose a fully materialized batch sequentially
pub fn decompose<'v, I>(records: I, source: &dyn WorkSource) -> Decomposition
where
    I: IntoIterator<Item = &'v Value>,
{
    let mut decomposer = Decomposer::new(source);
    decomposer.push_all(records);
    decomposer.finish()
}

/// Decompose chunks on the rayon pool and merge them in chunk order.
///
/// The result equals [`decompose`] over the concatenated chunks.
pub fn decompose_parallel(chunks: &[Vec<Value>], source: &dyn WorkSource) -> Decomposition {
    let parts: Vec<Decomposition> = chunks
        .par_iter()
        .map(|chunk| decompose(chunk, source))
        .collect();
    merge_in_order(parts)
}

/// Merge partial decompositions, earliest first
pub fn merge_in_order(parts: impl IntoIterator<Item = Decomposition>) -> Decomposition {
    let mut parts = parts.into_iter();
    let Some(mut acc) = parts.next() else {
        return Decomposition::default();
    };
    for later in parts {
        acc.merge(later);
    }
    acc.report.row_counts = acc.tables.row_counts();
    acc
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::hash::Hash;

    use serde_json::json;

    use super::*;
    use crate::doi::is_valid_bare_doi;
    use crate::schema::Table;
    use crate::source::{OpenAlex, Scopus};
    use crate::tables::Keyed;

    fn record(doi: Option<&str>, title: &str) -> Value {
        let mut r = json!({
            "id": "https://openalex.org/W1",
            "title": title,
            "authorships": [],
        });
        if let Some(doi) = doi {
            r["doi"] = json!(doi);
        }
        r
    }

    fn scenario() -> Vec<Value> {
        vec![
            json!({
                "doi": "https://doi.org/10.1/ABC",
                "title": "Original Title",
                "authorships": [
                    {
                        "author_position": "first",
                        "author": {"id": "https://openalex.org/X", "display_name": "Xavier"},
                        "institutions": [{"id": "https://openalex.org/I1", "display_name": "Inst One"}]
                    },
                    {
                        "author_position": "last",
                        "author": {"id": "https://openalex.org/Y", "display_name": "Yolanda"},
                        "institutions": []
                    }
                ]
            }),
            json!({"title": "No DOI here"}),
            json!({
                "doi": "10.1/abc",
                "title": "Revised Title",
                "grants": [
                    {"funder": "https://openalex.org/F1", "funder_display_name": "Funder One", "award_id": "G-99"}
                ]
            }),
        ]
    }

    fn assert_unique<R: Keyed>(rows: &[R])
    where
        R::Key: Hash + Eq,
    {
        let keys: HashSet<_> = rows.iter().map(Keyed::key).collect();
        assert_eq!(keys.len(), rows.len());
    }

    #[test]
    fn three_record_scenario() {
        let out = decompose(&scenario(), &OpenAlex);
        let t = &out.tables;

        let pubs = t.publications();
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].doi, "10.1/abc");
        assert_eq!(pubs[0].title(), Some("Revised Title"));

        let authors: Vec<_> = t.authors().into_iter().map(|a| a.author_id).collect();
        assert_eq!(authors, vec!["X", "Y"]);

        let affs = t.authorship_institutions();
        assert_eq!(affs.len(), 1);
        assert_eq!((affs[0].author_id.as_str(), affs[0].institution_id.as_str()), ("X", "I1"));

        let funding = t.funding();
        assert_eq!(funding.len(), 1);
        assert_eq!(funding[0].doi, "10.1/abc");
        assert_eq!(funding[0].funder_id, "F1");
        assert_eq!(funding[0].award_id.as_deref(), Some("G-99"));

        assert_eq!(out.report.records_skipped(), 1);
        assert_eq!(out.report.record_skips_for(RecordSkip::MissingDoi), 1);
        assert_eq!(out.report.records_accepted, 2);
        assert_eq!(out.report.row_count(Table::Publications), 1);
        assert_eq!(out.report.row_count(Table::Authors), 2);
    }

    #[test]
    fn authorships_not_a_list_degrades_gracefully() {
        let batch = vec![json!({
            "doi": "10.5/x",
            "title": "Still here",
            "authorships": "not-a-list",
            "counts_by_year": [{"year": 2024, "cited_by_count": 3}]
        })];
        let out = decompose(&batch, &OpenAlex);
        assert_eq!(out.tables.publications().len(), 1);
        assert!(out.tables.authorships().is_empty());
        assert_eq!(out.tables.citation_counts().len(), 1);
        assert_eq!(out.report.substructures_skipped(), 1);
        assert_eq!(out.report.substructure_skips_for(Substructure::Authorships), 1);
        assert_eq!(out.report.records_skipped(), 0);
    }

    #[test]
    fn first_observation_wins_for_authors() {
        let author = |name: &str| {
            json!([{"author": {"id": "https://openalex.org/A123", "display_name": name}}])
        };
        let batch = vec![
            json!({"doi": "10.1/one", "authorships": author("Ada Lovelace")}),
            json!({"doi": "10.1/two", "authorships": author("ADA LOVELACE")}),
        ];
        let out = decompose(&batch, &OpenAlex);
        let authors = out.tables.authors();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(out.tables.authorships().len(), 2);
    }

    #[test]
    fn last_observation_wins_for_publications() {
        let batch = vec![
            record(Some("10.9/dup"), "First"),
            record(Some("https://doi.org/10.9/DUP"), "Second"),
        ];
        let out = decompose(&batch, &OpenAlex);
        let pubs = out.tables.publications();
        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].title(), Some("Second"));
    }

    #[test]
    fn invalid_and_non_object_records_are_skipped() {
        let batch = vec![
            record(Some("not-a-doi"), "bad"),
            record(Some("   "), "blank"),
            json!({"doi": 42}),
            json!("a string"),
            json!(null),
            record(Some("doi:10.2/ok"), "good"),
        ];
        let out = decompose(&batch, &OpenAlex);
        assert_eq!(out.tables.publications().len(), 1);
        assert_eq!(out.report.record_skips_for(RecordSkip::InvalidDoi), 2);
        assert_eq!(out.report.record_skips_for(RecordSkip::MissingDoi), 1);
        assert_eq!(out.report.record_skips_for(RecordSkip::NotAnObject), 2);
        for row in out.tables.publications() {
            assert!(is_valid_bare_doi(&row.doi));
        }
    }

    #[test]
    fn push_reports_skip_reason() {
        let mut decomposer = Decomposer::new(&OpenAlex);
        assert_eq!(decomposer.push(&json!({})), Err(RecordSkip::MissingDoi));
        assert_eq!(decomposer.push(&record(Some("10.1/a"), "t")), Ok(()));
        decomposer.skip_unparseable();
        let out = decomposer.finish();
        assert_eq!(out.report.records_seen, 3);
        assert_eq!(out.report.record_skips_for(RecordSkip::Unparseable), 1);
    }

    #[test]
    fn fetch_status_annotation() {
        let batch = vec![
            json!({"doi": "10.1/a"}),
            json!({"doi": "10.1/b", "fetch_status": "not_found"}),
            json!({"doi": "10.1/c", "fetch_status": "error", "fetch_error": "HTTP 500"}),
        ];
        let out = decompose(&batch, &OpenAlex);
        let statuses: Vec<String> = out
            .tables
            .publications()
            .iter()
            .map(|p| p.fetch_status.to_string())
            .collect();
        assert_eq!(statuses, vec!["success", "not-found", "error: HTTP 500"]);
    }

    #[test]
    fn keys_are_unique_and_null_award_is_distinct() {
        let batch = vec![json!({
            "doi": "10.1/k",
            "authorships": [
                {"author": {"id": "A1"}, "author_position": "first", "countries": ["US", "US"],
                 "institutions": [{"id": "I1", "country_code": "US"}, {"id": "I1"}]},
                {"author": {"id": "A1"}, "author_position": "first"},
                {"author": {"id": "A1"}}
            ],
            "grants": [
                {"funder": "F1", "award_id": "G1"},
                {"funder": "F1", "award_id": "G1"},
                {"funder": "F1"}
            ],
            "counts_by_year": [
                {"year": 2020, "cited_by_count": 1},
                {"year": 2020, "cited_by_count": 9}
            ]
        })];
        let t = decompose(&batch, &OpenAlex).tables;

        assert_unique(&t.publications());
        assert_unique(&t.authorships());
        assert_unique(&t.authorship_institutions());
        assert_unique(&t.authorship_countries());
        assert_unique(&t.funding());
        assert_unique(&t.citation_counts());

        // (doi, A1, first) and (doi, A1, null)
        assert_eq!(t.authorships().len(), 2);
        assert_eq!(t.authorship_countries().len(), 1);
        assert_eq!(t.funding().len(), 2);
        // first observation of (doi, year)
        assert_eq!(t.citation_counts()[0].cited_by_count, 1);
    }

    #[test]
    fn determinism_across_runs_and_order() {
        let mut batch = scenario();
        batch.push(json!({"doi": "10.3/z", "authorships": [
            {"author": {"id": "B2"}, "institutions": [{"id": "I9", "country_code": "DE"}]}
        ]}));
        let a = decompose(&batch, &OpenAlex).tables.fingerprint();
        let b = decompose(&batch, &OpenAlex).tables.fingerprint();
        assert_eq!(a, b);

        // Reordering records with distinct keys does not change the output
        let mut reordered = batch.clone();
        reordered.swap(1, 3);
        assert_eq!(decompose(&reordered, &OpenAlex).tables.fingerprint(), a);
    }

    #[test]
    fn parallel_equals_sequential() {
        let mut batch = Vec::new();
        for i in 0..40 {
            batch.push(json!({
                "doi": format!("10.7/{}", i % 25),
                "title": format!("title {i}"),
                "authorships": [
                    {"author": {"id": format!("A{}", i % 7), "display_name": format!("name {i}")},
                     "author_position": "first",
                     "institutions": [{"id": format!("I{}", i % 3), "display_name": format!("inst {i}")}]}
                ],
                "grants": [{"funder": format!("F{}", i % 4), "funder_display_name": format!("f {i}")}]
            }));
            if i % 9 == 0 {
                batch.push(json!({"title": "no doi"}));
            }
        }
        let sequential = decompose(&batch, &OpenAlex);
        let chunks: Vec<Vec<Value>> = batch.chunks(6).map(<[Value]>::to_vec).collect();
        let parallel = decompose_parallel(&chunks, &OpenAlex);

        assert_eq!(parallel.tables.fingerprint(), sequential.tables.fingerprint());
        assert_eq!(parallel.report, sequential.report);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let out = merge_in_order(Vec::new());
        assert_eq!(out.tables.total_rows(), 0);
        assert_eq!(out.report.records_seen, 0);
    }

    #[test]
    fn scopus_entries_decompose() {
        let batch = vec![json!({
            "prism:doi": "10.1016/J.X.2020.1",
            "eid": "2-s2.0-1",
            "dc:title": "Scopus work",
            "citedby-count": "5",
            "affiliation": [{"afid": "600", "affilname": "Uni", "affiliation-country": "United Kingdom"}],
            "author": [{"@seq": "1", "authid": "57", "authname": "Doe J.", "afid": [{"$": "600"}]}]
        })];
        let t = decompose(&batch, &Scopus).tables;
        assert_eq!(t.publications()[0].doi, "10.1016/j.x.2020.1");
        assert_eq!(t.authors()[0].author_id, "57");
        assert_eq!(t.institutions()[0].display_name.as_deref(), Some("Uni"));
        assert_eq!(t.authorship_countries()[0].country_code, "GB");
        assert!(t.funding().is_empty());
    }

    #[test]
    fn scopus_affiliation_object_counts_once_per_record() {
        let batch = vec![
            json!({
                "prism:doi": "10.1/a",
                "affiliation": {"afid": "600", "affilname": "Uni"},
                "author": [
                    {"authid": "1", "afid": [{"$": "600"}]},
                    {"authid": "2", "afid": [{"$": "600"}]},
                    {"authid": "3", "afid": [{"$": "600"}]}
                ]
            }),
            json!({
                "prism:doi": "10.1/b",
                "affiliation": "Uni",
                "author": [{"authid": "4"}]
            }),
        ];
        let out = decompose(&batch, &Scopus);
        assert_eq!(out.report.substructure_skips_for(Substructure::Institutions), 2);
        assert_eq!(out.tables.authors().len(), 4);
        assert_eq!(out.tables.authorship_institutions().len(), 3);
    }
}
