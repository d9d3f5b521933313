//! Junction rows tying publications to authors, institutions, countries,
//! funders and yearly citation counts

use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use bibline_core::Accumulator;

use super::Keyed;
use crate::schema;

// === Row structs ===

/// Key: (doi, author_id, author_position)
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorshipRow {
    pub doi: String,
    pub author_id: String,
    pub author_position: Option<String>,
    pub is_corresponding: Option<bool>,
    pub raw_author_name: Option<String>,
}

impl Keyed for AuthorshipRow {
    type Key = (String, String, Option<String>);

    fn key(&self) -> Self::Key {
        (
            self.doi.clone(),
            self.author_id.clone(),
            self.author_position.clone(),
        )
    }
}

/// Key: (doi, author_id, institution_id)
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorshipInstitutionRow {
    pub doi: String,
    pub author_id: String,
    pub institution_id: String,
    pub raw_affiliation_string: Option<String>,
}

impl Keyed for AuthorshipInstitutionRow {
    type Key = (String, String, String);

    fn key(&self) -> Self::Key {
        (
            self.doi.clone(),
            self.author_id.clone(),
            self.institution_id.clone(),
        )
    }
}

/// Key: the whole row
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorshipCountryRow {
    pub doi: String,
    pub author_id: String,
    pub country_code: String,
}

impl Keyed for AuthorshipCountryRow {
    type Key = (String, String, String);

    fn key(&self) -> Self::Key {
        (
            self.doi.clone(),
            self.author_id.clone(),
            self.country_code.clone(),
        )
    }
}

/// Key: the whole row; a null award is a distinct key value
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRow {
    pub doi: String,
    pub funder_id: String,
    pub award_id: Option<String>,
}

impl Keyed for FundingRow {
    type Key = (String, String, Option<String>);

    fn key(&self) -> Self::Key {
        (
            self.doi.clone(),
            self.funder_id.clone(),
            self.award_id.clone(),
        )
    }
}

/// Key: (doi, year)
#[derive(Debug, Clone, PartialEq)]
pub struct CitationCountRow {
    pub doi: String,
    pub year: i32,
    pub cited_by_count: i64,
}

impl Keyed for CitationCountRow {
    type Key = (String, i32);

    fn key(&self) -> Self::Key {
        (self.doi.clone(), self.year)
    }
}

// === Accumulators ===

/// Accumulator for PublicationAuthorships rows
pub struct AuthorshipAccumulator {
    schema: Arc<Schema>,
    doi: Vec<String>,
    author_id: Vec<String>,
    author_position: Vec<Option<String>>,
    is_corresponding: Vec<Option<bool>>,
    raw_author_name: Vec<Option<String>>,
}

impl AuthorshipAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::publication_authorships().clone(),
            doi: Vec::new(),
            author_id: Vec::new(),
            author_position: Vec::new(),
            is_corresponding: Vec::new(),
            raw_author_name: Vec::new(),
        }
    }
}

impl Default for AuthorshipAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for AuthorshipAccumulator {
    type Row = AuthorshipRow;

    fn push(&mut self, row: AuthorshipRow) {
        self.doi.push(row.doi);
        self.author_id.push(row.author_id);
        self.author_position.push(row.author_position);
        self.is_corresponding.push(row.is_corresponding);
        self.raw_author_name.push(row.raw_author_name);
    }

    fn len(&self) -> usize {
        self.doi.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.doi))),
            Arc::new(StringArray::from(std::mem::take(&mut self.author_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.author_position))),
            Arc::new(BooleanArray::from(std::mem::take(
                &mut self.is_corresponding,
            ))),
            Arc::new(StringArray::from(std::mem::take(&mut self.raw_author_name))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Accumulator for AuthorshipInstitutions rows
pub struct AuthorshipInstitutionAccumulator {
    schema: Arc<Schema>,
    doi: Vec<String>,
    author_id: Vec<String>,
    institution_id: Vec<String>,
    raw_affiliation_string: Vec<Option<String>>,
}

impl AuthorshipInstitutionAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::authorship_institutions().clone(),
            doi: Vec::new(),
            author_id: Vec::new(),
            institution_id: Vec::new(),
            raw_affiliation_string: Vec::new(),
        }
    }
}

impl Default for AuthorshipInstitutionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for AuthorshipInstitutionAccumulator {
    type Row = AuthorshipInstitutionRow;

    fn push(&mut self, row: AuthorshipInstitutionRow) {
        self.doi.push(row.doi);
        self.author_id.push(row.author_id);
        self.institution_id.push(row.institution_id);
        self.raw_affiliation_string.push(row.raw_affiliation_string);
    }

    fn len(&self) -> usize {
        self.doi.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.doi))),
            Arc::new(StringArray::from(std::mem::take(&mut self.author_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.institution_id))),
            Arc::new(StringArray::from(std::mem::take(
                &mut self.raw_affiliation_string,
            ))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Accumulator for AuthorshipCountries rows
pub struct AuthorshipCountryAccumulator {
    schema: Arc<Schema>,
    doi: Vec<String>,
    author_id: Vec<String>,
    country_code: Vec<String>,
}

impl AuthorshipCountryAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::authorship_countries().clone(),
            doi: Vec::new(),
            author_id: Vec::new(),
            country_code: Vec::new(),
        }
    }
}

impl Default for AuthorshipCountryAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for AuthorshipCountryAccumulator {
    type Row = AuthorshipCountryRow;

    fn push(&mut self, row: AuthorshipCountryRow) {
        self.doi.push(row.doi);
        self.author_id.push(row.author_id);
        self.country_code.push(row.country_code);
    }

    fn len(&self) -> usize {
        self.doi.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.doi))),
            Arc::new(StringArray::from(std::mem::take(&mut self.author_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.country_code))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Accumulator for PublicationFunding rows
pub struct FundingAccumulator {
    schema: Arc<Schema>,
    doi: Vec<String>,
    funder_id: Vec<String>,
    award_id: Vec<Option<String>>,
}

impl FundingAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::publication_funding().clone(),
            doi: Vec::new(),
            funder_id: Vec::new(),
            award_id: Vec::new(),
        }
    }
}

impl Default for FundingAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for FundingAccumulator {
    type Row = FundingRow;

    fn push(&mut self, row: FundingRow) {
        self.doi.push(row.doi);
        self.funder_id.push(row.funder_id);
        self.award_id.push(row.award_id);
    }

    fn len(&self) -> usize {
        self.doi.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.doi))),
            Arc::new(StringArray::from(std::mem::take(&mut self.funder_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.award_id))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Accumulator for PublicationCitationCounts rows
pub struct CitationCountAccumulator {
    schema: Arc<Schema>,
    doi: Vec<String>,
    year: Vec<i32>,
    cited_by_count: Vec<i64>,
}

impl CitationCountAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::publication_citation_counts().clone(),
            doi: Vec::new(),
            year: Vec::new(),
            cited_by_count: Vec::new(),
        }
    }
}

impl Default for CitationCountAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for CitationCountAccumulator {
    type Row = CitationCountRow;

    fn push(&mut self, row: CitationCountRow) {
        self.doi.push(row.doi);
        self.year.push(row.year);
        self.cited_by_count.push(row.cited_by_count);
    }

    fn len(&self) -> usize {
        self.doi.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.doi))),
            Arc::new(Int32Array::from(std::mem::take(&mut self.year))),
            Arc::new(Int64Array::from(std::mem::take(&mut self.cited_by_count))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_award_is_part_of_key() {
        let with = FundingRow {
            doi: "10.1/a".into(),
            funder_id: "F1".into(),
            award_id: Some("G-1".into()),
        };
        let without = FundingRow {
            award_id: None,
            ..with.clone()
        };
        assert_ne!(with.key(), without.key());
        assert!(without.key() < with.key());
    }

    #[test]
    fn authorship_accumulator_keeps_null_position() {
        let mut acc = AuthorshipAccumulator::new();
        acc.push(AuthorshipRow {
            doi: "10.1/a".into(),
            author_id: "A1".into(),
            author_position: None,
            is_corresponding: Some(true),
            raw_author_name: Some("J. Doe".into()),
        });
        let batch = acc.take_batch().unwrap();
        assert!(batch.column(2).is_null(0));
        let flags = batch
            .column(3)
            .as_any()
            .downcast_ref::<BooleanArray>()
            .unwrap();
        assert!(flags.value(0));
    }

    #[test]
    fn citation_count_accumulator_types() {
        let mut acc = CitationCountAccumulator::new();
        acc.push(CitationCountRow {
            doi: "10.1/a".into(),
            year: 2023,
            cited_by_count: 12,
        });
        let batch = acc.take_batch().unwrap();
        let years = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(years.value(0), 2023);
    }
}
