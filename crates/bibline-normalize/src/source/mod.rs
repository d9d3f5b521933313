//! Pluggable per-source field mappings
//!
//! A [`WorkSource`] knows one raw record schema. It maps publication
//! attributes declaratively ([`FieldSpec`] list), fills the flattened summary
//! columns, and turns the record's lists into source-neutral entries that the
//! decomposer registers and links.

pub mod openalex;
pub mod scopus;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Substructure;
use crate::extract::{FieldSpec, FlatAttributes, Scalar};
use crate::flatten::Flattened;
use crate::tables::{AuthorRow, FunderRow, InstitutionRow};

pub use openalex::OpenAlex;
pub use scopus::Scopus;

/// One authorship of a record, ready for registration
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorshipEntry {
    pub author: AuthorRow,
    pub position: Option<String>,
    pub is_corresponding: Option<bool>,
    pub raw_author_name: Option<String>,
    pub institutions: Vec<AffiliationEntry>,
    /// Sorted, unique
    pub countries: Vec<String>,
    /// Nested lists of this authorship that were not lists
    pub malformed: Vec<Substructure>,
    /// Nested list items dropped for lacking an id
    pub skipped_items: usize,
}

/// An institution of one authorship, with the raw text it was listed under
#[derive(Debug, Clone, PartialEq)]
pub struct AffiliationEntry {
    pub institution: InstitutionRow,
    pub raw_affiliation_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrantEntry {
    pub funder: FunderRow,
    pub award_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearCount {
    pub year: i32,
    pub cited_by_count: i64,
}

/// Field-path mapping for one raw record schema
pub trait WorkSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Path of the raw DOI string
    fn doi_path(&self) -> &'static [&'static str];

    /// Declarative publication attribute mapping
    fn fields(&self) -> &'static [FieldSpec];

    /// Fill the flattened summary columns and any derived attributes
    fn summarize(&self, record: &Value, attrs: &mut FlatAttributes);

    fn authorships(&self, record: &Value) -> Flattened<AuthorshipEntry>;

    /// Record-level lists feeding the authorships that are present but not lists
    fn malformed_lists(&self, _record: &Value) -> Vec<Substructure> {
        Vec::new()
    }

    fn grants(&self, _record: &Value) -> Flattened<GrantEntry> {
        Flattened::default()
    }

    fn counts_by_year(&self, _record: &Value) -> Flattened<YearCount> {
        Flattened::default()
    }
}

/// Built-in sources, selectable by name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceKind {
    #[default]
    OpenAlex,
    Scopus,
}

static OPENALEX: OpenAlex = OpenAlex;
static SCOPUS: Scopus = Scopus;

impl SourceKind {
    pub fn source(self) -> &'static dyn WorkSource {
        match self {
            Self::OpenAlex => &OPENALEX,
            Self::Scopus => &SCOPUS,
        }
    }

    pub fn name(self) -> &'static str {
        self.source().name()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openalex" => Ok(Self::OpenAlex),
            "scopus" => Ok(Self::Scopus),
            other => Err(format!("unknown source '{other}' (expected openalex or scopus)")),
        }
    }
}

/// Trimmed, non-empty owned string
pub(crate) fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Store a flattened summary; an empty summary stays null
pub(crate) fn set_summary(attrs: &mut FlatAttributes, column: &str, joined: String) {
    if !joined.is_empty() {
        attrs.set(column, Scalar::Str(joined));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::validate_specs;
    use crate::schema::ATTRIBUTE_COLUMNS;

    #[test]
    fn source_kind_parses() {
        assert_eq!("OpenAlex".parse::<SourceKind>().unwrap(), SourceKind::OpenAlex);
        assert_eq!("scopus".parse::<SourceKind>().unwrap(), SourceKind::Scopus);
        assert!("crossref".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::default().to_string(), "openalex");
    }

    #[test]
    fn every_source_maps_into_canonical_columns() {
        for kind in [SourceKind::OpenAlex, SourceKind::Scopus] {
            let problems = validate_specs(kind.source().fields(), ATTRIBUTE_COLUMNS);
            assert!(problems.is_empty(), "{kind}: {problems:?}");
        }
    }

    #[test]
    fn non_empty_trims() {
        assert_eq!(non_empty(Some("  x ")), Some("x".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
