//! Arrow schema definitions for the nine output tables
//!
//! Each table has a schema function returning a static `Arc<Schema>`. Column
//! order is fixed: the loader and CSV consumers address columns positionally.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

use crate::extract::{ColumnDef, ScalarType};

/// Publication attribute columns, between `doi` and `fetch_status`.
///
/// Every source maps into this layout; columns a source does not know stay null.
pub static ATTRIBUTE_COLUMNS: &[ColumnDef] = &[
    // Identifiers
    ColumnDef::new("work_id", ScalarType::Str), // e.g., "W2741809807" or "2-s2.0-85000000000"
    ColumnDef::new("raw_doi", ScalarType::Str),
    // Metadata
    ColumnDef::new("title", ScalarType::Str),
    ColumnDef::new("display_name", ScalarType::Str),
    ColumnDef::new("publication_year", ScalarType::Int),
    ColumnDef::new("publication_date", ScalarType::Date),
    ColumnDef::new("language", ScalarType::Str),
    ColumnDef::new("type", ScalarType::Str),
    // Metrics
    ColumnDef::new("cited_by_count", ScalarType::Int),
    ColumnDef::new("fwci", ScalarType::Float),
    ColumnDef::new("is_retracted", ScalarType::Bool),
    // Timestamps
    ColumnDef::new("updated_date", ScalarType::Timestamp),
    ColumnDef::new("created_date", ScalarType::Date),
    // Primary location
    ColumnDef::new("primary_location_is_oa", ScalarType::Bool),
    ColumnDef::new("landing_page_url", ScalarType::Str),
    ColumnDef::new("source_id", ScalarType::Str),
    ColumnDef::new("source_name", ScalarType::Str),
    ColumnDef::new("source_issn_l", ScalarType::Str),
    ColumnDef::new("source_is_oa", ScalarType::Bool),
    ColumnDef::new("source_is_indexed_in_scopus", ScalarType::Bool),
    ColumnDef::new("source_host_org_name", ScalarType::Str),
    ColumnDef::new("source_host_org_lineage_names", ScalarType::Str), // JSON array text
    ColumnDef::new("source_type", ScalarType::Str),
    // Biblio
    ColumnDef::new("biblio_volume", ScalarType::Str),
    ColumnDef::new("biblio_issue", ScalarType::Str),
    ColumnDef::new("biblio_first_page", ScalarType::Str),
    ColumnDef::new("biblio_last_page", ScalarType::Str),
    // Primary topic
    ColumnDef::new("primary_topic_id", ScalarType::Str),
    ColumnDef::new("primary_topic_name", ScalarType::Str),
    ColumnDef::new("primary_topic_score", ScalarType::Float),
    ColumnDef::new("primary_topic_subfield_name", ScalarType::Str),
    ColumnDef::new("primary_topic_field_name", ScalarType::Str),
    ColumnDef::new("primary_topic_domain_name", ScalarType::Str),
    // Citation normalized percentile / cited-by percentile year
    ColumnDef::new("cnp_value", ScalarType::Float),
    ColumnDef::new("cnp_is_top_1_percent", ScalarType::Bool),
    ColumnDef::new("cnp_is_top_10_percent", ScalarType::Bool),
    ColumnDef::new("cbpy_min", ScalarType::Int),
    ColumnDef::new("cbpy_max", ScalarType::Int),
    ColumnDef::new("open_access_status", ScalarType::Str),
    // Flattened summaries ("; "-joined, sorted, unique)
    ColumnDef::new("author_names", ScalarType::Str),
    ColumnDef::new("author_orcids", ScalarType::Str),
    ColumnDef::new("institution_names", ScalarType::Str),
    ColumnDef::new("institution_countries", ScalarType::Str),
    ColumnDef::new("corresponding_author_ids", ScalarType::Str),
    ColumnDef::new("topic_names", ScalarType::Str),
    ColumnDef::new("concept_names_level0", ScalarType::Str),
    ColumnDef::new("keyword_names", ScalarType::Str),
    ColumnDef::new("funder_names", ScalarType::Str),
    ColumnDef::new("award_ids", ScalarType::Str),
    ColumnDef::new("sdg_names", ScalarType::Str),
];

/// Arrow type of a scalar attribute column
pub fn data_type(ty: ScalarType) -> DataType {
    match ty {
        ScalarType::Str => DataType::Utf8,
        ScalarType::Int => DataType::Int64,
        ScalarType::Float => DataType::Float64,
        ScalarType::Bool => DataType::Boolean,
        ScalarType::Date => DataType::Date32,
        ScalarType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
    }
}

/// The fixed set of output tables, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Publications,
    Authors,
    Institutions,
    Funders,
    PublicationAuthorships,
    AuthorshipInstitutions,
    AuthorshipCountries,
    PublicationFunding,
    PublicationCitationCounts,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Self::Publications,
        Self::Authors,
        Self::Institutions,
        Self::Funders,
        Self::PublicationAuthorships,
        Self::AuthorshipInstitutions,
        Self::AuthorshipCountries,
        Self::PublicationFunding,
        Self::PublicationCitationCounts,
    ];

    /// File / SQL table name
    pub fn name(self) -> &'static str {
        match self {
            Self::Publications => "publications",
            Self::Authors => "authors",
            Self::Institutions => "institutions",
            Self::Funders => "funders",
            Self::PublicationAuthorships => "publication_authorships",
            Self::AuthorshipInstitutions => "authorship_institutions",
            Self::AuthorshipCountries => "authorship_countries",
            Self::PublicationFunding => "publication_funding",
            Self::PublicationCitationCounts => "publication_citation_counts",
        }
    }

    /// Primary-key columns
    pub fn key_columns(self) -> &'static [&'static str] {
        match self {
            Self::Publications => &["doi"],
            Self::Authors => &["author_id"],
            Self::Institutions => &["institution_id"],
            Self::Funders => &["funder_id"],
            Self::PublicationAuthorships => &["doi", "author_id", "author_position"],
            Self::AuthorshipInstitutions => &["doi", "author_id", "institution_id"],
            Self::AuthorshipCountries => &["doi", "author_id", "country_code"],
            Self::PublicationFunding => &["doi", "funder_id", "award_id"],
            Self::PublicationCitationCounts => &["doi", "year"],
        }
    }

    pub fn schema(self) -> &'static Arc<Schema> {
        match self {
            Self::Publications => publications(),
            Self::Authors => authors(),
            Self::Institutions => institutions(),
            Self::Funders => funders(),
            Self::PublicationAuthorships => publication_authorships(),
            Self::AuthorshipInstitutions => authorship_institutions(),
            Self::AuthorshipCountries => authorship_countries(),
            Self::PublicationFunding => publication_funding(),
            Self::PublicationCitationCounts => publication_citation_counts(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown table: {s}"))
    }
}

/// publications: one row per normalized DOI
pub fn publications() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        let mut fields = Vec::with_capacity(ATTRIBUTE_COLUMNS.len() + 2);
        fields.push(Field::new("doi", DataType::Utf8, false)); // bare, lower-case
        fields.extend(
            ATTRIBUTE_COLUMNS
                .iter()
                .map(|c| Field::new(c.name, data_type(c.ty), true)),
        );
        // success | not-found | error: <reason>
        fields.push(Field::new("fetch_status", DataType::Utf8, false));
        Arc::new(Schema::new(fields))
    });
    &SCHEMA
}

/// authors: first-observed attributes per author id
pub fn authors() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("author_id", DataType::Utf8, false), // e.g., "A5023888391"
            Field::new("display_name", DataType::Utf8, true),
            Field::new("orcid", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// institutions: first-observed attributes per institution id
pub fn institutions() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("institution_id", DataType::Utf8, false), // e.g., "I27837315"
            Field::new("display_name", DataType::Utf8, true),
            Field::new("ror", DataType::Utf8, true),
            Field::new("country_code", DataType::Utf8, true), // ISO 3166-1 alpha-2
            Field::new("institution_type", DataType::Utf8, true), // education, company, ...
        ]))
    });
    &SCHEMA
}

/// funders: first-observed attributes per funder id
pub fn funders() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("funder_id", DataType::Utf8, false), // e.g., "F4320332161"
            Field::new("display_name", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// publication_authorships: (doi, author, position)
pub fn publication_authorships() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("doi", DataType::Utf8, false),
            Field::new("author_id", DataType::Utf8, false),
            Field::new("author_position", DataType::Utf8, true), // first, middle, last
            Field::new("is_corresponding", DataType::Boolean, true),
            Field::new("raw_author_name", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// authorship_institutions: (doi, author, institution) with raw affiliation text
pub fn authorship_institutions() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("doi", DataType::Utf8, false),
            Field::new("author_id", DataType::Utf8, false),
            Field::new("institution_id", DataType::Utf8, false),
            Field::new("raw_affiliation_string", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// authorship_countries: (doi, author, country)
pub fn authorship_countries() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("doi", DataType::Utf8, false),
            Field::new("author_id", DataType::Utf8, false),
            Field::new("country_code", DataType::Utf8, false),
        ]))
    });
    &SCHEMA
}

/// publication_funding: (doi, funder, award); award may be null
pub fn publication_funding() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("doi", DataType::Utf8, false),
            Field::new("funder_id", DataType::Utf8, false),
            Field::new("award_id", DataType::Utf8, true),
        ]))
    });
    &SCHEMA
}

/// publication_citation_counts: citations accrued per (doi, year)
pub fn publication_citation_counts() -> &'static Arc<Schema> {
    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("doi", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("cited_by_count", DataType::Int64, false),
        ]))
    });
    &SCHEMA
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publications_column_order() {
        let schema = publications();
        let names: Vec<_> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names.first(), Some(&"doi"));
        assert_eq!(names.last(), Some(&"fetch_status"));
        assert_eq!(names[1..4], ["work_id", "raw_doi", "title"]);
        assert_eq!(names.len(), ATTRIBUTE_COLUMNS.len() + 2);
    }

    #[test]
    fn publications_types_follow_columns() {
        let schema = publications();
        assert_eq!(
            schema.field_with_name("updated_date").unwrap().data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, None)
        );
        assert_eq!(
            schema.field_with_name("created_date").unwrap().data_type(),
            &DataType::Date32
        );
        assert_eq!(
            schema.field_with_name("cited_by_count").unwrap().data_type(),
            &DataType::Int64
        );
    }

    #[test]
    fn attribute_names_unique() {
        let mut names: Vec<_> = ATTRIBUTE_COLUMNS.iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ATTRIBUTE_COLUMNS.len());
    }

    #[test]
    fn key_columns_exist_in_schema() {
        for table in Table::ALL {
            let schema = table.schema();
            for key in table.key_columns() {
                assert!(
                    schema.field_with_name(key).is_ok(),
                    "{table}: missing key column {key}"
                );
            }
        }
    }

    #[test]
    fn table_names_round_trip() {
        for table in Table::ALL {
            assert_eq!(table.name().parse::<Table>().unwrap(), table);
        }
        assert!("works".parse::<Table>().is_err());
    }

    #[test]
    fn junction_tables_lead_with_doi() {
        for table in &Table::ALL[4..] {
            assert_eq!(table.schema().field(0).name(), "doi");
        }
    }
}
