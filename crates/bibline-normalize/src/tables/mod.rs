//! The output `TableSet`: nine key-deduplicated tables and their Arrow form

pub mod entity;
pub mod junction;
pub mod publication;

use std::fmt::Debug;
use std::hash::Hash;

use arrow::array::RecordBatch;
use arrow::error::ArrowError;
use bibline_core::collect_batches;
use rustc_hash::FxHashMap;

use crate::registry::EntityRegistry;
use crate::schema::Table;

pub use entity::{
    AuthorAccumulator, AuthorRow, FunderAccumulator, FunderRow, InstitutionAccumulator,
    InstitutionRow,
};
pub use junction::{
    AuthorshipAccumulator, AuthorshipCountryAccumulator, AuthorshipCountryRow,
    AuthorshipInstitutionAccumulator, AuthorshipInstitutionRow, AuthorshipRow,
    CitationCountAccumulator, CitationCountRow, FundingAccumulator, FundingRow,
};
pub use publication::{FetchStatus, PublicationAccumulator, PublicationRow};

/// A row with a composite primary key
pub trait Keyed {
    type Key: Ord + Hash + Clone + Debug;

    fn key(&self) -> Self::Key;
}

/// Rows unique on their key, with the policy chosen per insert
#[derive(Debug, Clone)]
pub struct KeyedRows<R: Keyed> {
    rows: Vec<R>,
    index: FxHashMap<R::Key, usize>,
}

impl<R: Keyed> Default for KeyedRows<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<R: Keyed> KeyedRows<R> {
    /// Keep an existing row with the same key. Returns true if inserted.
    pub fn insert_first(&mut self, row: R) -> bool {
        let key = row.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.rows.len());
        self.rows.push(row);
        true
    }

    /// Replace an existing row with the same key. Returns true if the key is new.
    pub fn insert_last(&mut self, row: R) -> bool {
        let key = row.key();
        match self.index.get(&key) {
            Some(&idx) => {
                self.rows[idx] = row;
                false
            }
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push(row);
                true
            }
        }
    }

    pub fn merge_first(&mut self, later: KeyedRows<R>) {
        for row in later.rows {
            self.insert_first(row);
        }
    }

    pub fn merge_last(&mut self, later: KeyedRows<R>) {
        for row in later.rows {
            self.insert_last(row);
        }
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.index.get(key).map(|&idx| &self.rows[idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in canonical (key) order
    pub fn sorted(&self) -> Vec<R>
    where
        R: Clone,
    {
        let mut keyed: Vec<(R::Key, &R)> = self.rows.iter().map(|r| (r.key(), r)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, r)| r.clone()).collect()
    }
}

/// The nine normalized tables produced from one batch of records.
///
/// Publications are last-wins on DOI; authors, institutions and funders are
/// first-wins registries; junction tables keep the first row per key.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub(crate) publications: KeyedRows<PublicationRow>,
    pub(crate) authors: EntityRegistry<AuthorRow>,
    pub(crate) institutions: EntityRegistry<InstitutionRow>,
    pub(crate) funders: EntityRegistry<FunderRow>,
    pub(crate) authorships: KeyedRows<AuthorshipRow>,
    pub(crate) authorship_institutions: KeyedRows<AuthorshipInstitutionRow>,
    pub(crate) authorship_countries: KeyedRows<AuthorshipCountryRow>,
    pub(crate) funding: KeyedRows<FundingRow>,
    pub(crate) citation_counts: KeyedRows<CitationCountRow>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publications(&self) -> Vec<PublicationRow> {
        self.publications.sorted()
    }

    pub fn authors(&self) -> Vec<AuthorRow> {
        self.authors.export()
    }

    pub fn institutions(&self) -> Vec<InstitutionRow> {
        self.institutions.export()
    }

    pub fn funders(&self) -> Vec<FunderRow> {
        self.funders.export()
    }

    pub fn authorships(&self) -> Vec<AuthorshipRow> {
        self.authorships.sorted()
    }

    pub fn authorship_institutions(&self) -> Vec<AuthorshipInstitutionRow> {
        self.authorship_institutions.sorted()
    }

    pub fn authorship_countries(&self) -> Vec<AuthorshipCountryRow> {
        self.authorship_countries.sorted()
    }

    pub fn funding(&self) -> Vec<FundingRow> {
        self.funding.sorted()
    }

    pub fn citation_counts(&self) -> Vec<CitationCountRow> {
        self.citation_counts.sorted()
    }

    pub fn row_count(&self, table: Table) -> usize {
        match table {
            Table::Publications => self.publications.len(),
            Table::Authors => self.authors.len(),
            Table::Institutions => self.institutions.len(),
            Table::Funders => self.funders.len(),
            Table::PublicationAuthorships => self.authorships.len(),
            Table::AuthorshipInstitutions => self.authorship_institutions.len(),
            Table::AuthorshipCountries => self.authorship_countries.len(),
            Table::PublicationFunding => self.funding.len(),
            Table::PublicationCitationCounts => self.citation_counts.len(),
        }
    }

    /// (table, rows) for all nine tables in output order
    pub fn row_counts(&self) -> Vec<(Table, usize)> {
        Table::ALL
            .into_iter()
            .map(|t| (t, self.row_count(t)))
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        Table::ALL.into_iter().map(|t| self.row_count(t)).sum()
    }

    /// Fold in tables built from records that come later in input order
    pub fn merge(&mut self, later: TableSet) {
        self.publications.merge_last(later.publications);
        self.authors.merge(later.authors);
        self.institutions.merge(later.institutions);
        self.funders.merge(later.funders);
        self.authorships.merge_first(later.authorships);
        self.authorship_institutions
            .merge_first(later.authorship_institutions);
        self.authorship_countries.merge_first(later.authorship_countries);
        self.funding.merge_first(later.funding);
        self.citation_counts.merge_first(later.citation_counts);
    }

    /// One table as Arrow batches, rows in canonical key order.
    /// An empty table yields a single empty batch carrying the schema.
    pub fn record_batches(&self, table: Table) -> Result<Vec<RecordBatch>, ArrowError> {
        match table {
            Table::Publications => {
                collect_batches(&mut PublicationAccumulator::new(), self.publications())
            }
            Table::Authors => collect_batches(&mut AuthorAccumulator::new(), self.authors()),
            Table::Institutions => {
                collect_batches(&mut InstitutionAccumulator::new(), self.institutions())
            }
            Table::Funders => collect_batches(&mut FunderAccumulator::new(), self.funders()),
            Table::PublicationAuthorships => {
                collect_batches(&mut AuthorshipAccumulator::new(), self.authorships())
            }
            Table::AuthorshipInstitutions => collect_batches(
                &mut AuthorshipInstitutionAccumulator::new(),
                self.authorship_institutions(),
            ),
            Table::AuthorshipCountries => collect_batches(
                &mut AuthorshipCountryAccumulator::new(),
                self.authorship_countries(),
            ),
            Table::PublicationFunding => {
                collect_batches(&mut FundingAccumulator::new(), self.funding())
            }
            Table::PublicationCitationCounts => {
                collect_batches(&mut CitationCountAccumulator::new(), self.citation_counts())
            }
        }
    }

    /// blake3 digest of all nine tables in canonical order (hex).
    ///
    /// Equal fingerprints mean byte-identical table contents.
    pub fn fingerprint(&self) -> String {
        fn feed<R: Debug>(hasher: &mut blake3::Hasher, table: Table, rows: &[R]) {
            hasher.update(table.name().as_bytes());
            hasher.update(&(rows.len() as u64).to_le_bytes());
            for row in rows {
                hasher.update(format!("{row:?}\n").as_bytes());
            }
        }

        let mut hasher = blake3::Hasher::new();
        feed(&mut hasher, Table::Publications, &self.publications());
        feed(&mut hasher, Table::Authors, &self.authors());
        feed(&mut hasher, Table::Institutions, &self.institutions());
        feed(&mut hasher, Table::Funders, &self.funders());
        feed(&mut hasher, Table::PublicationAuthorships, &self.authorships());
        feed(
            &mut hasher,
            Table::AuthorshipInstitutions,
            &self.authorship_institutions(),
        );
        feed(
            &mut hasher,
            Table::AuthorshipCountries,
            &self.authorship_countries(),
        );
        feed(&mut hasher, Table::PublicationFunding, &self.funding());
        feed(
            &mut hasher,
            Table::PublicationCitationCounts,
            &self.citation_counts(),
        );
        hasher.finalize().to_hex().to_string()
    }
}
