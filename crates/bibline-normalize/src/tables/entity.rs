//! Entity rows (authors, institutions, funders) and their accumulators

use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use bibline_core::Accumulator;

use crate::registry::Entity;
use crate::schema;

// === Row structs ===

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRow {
    pub author_id: String,
    pub display_name: Option<String>,
    pub orcid: Option<String>,
}

impl Entity for AuthorRow {
    fn id(&self) -> &str {
        &self.author_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstitutionRow {
    pub institution_id: String,
    pub display_name: Option<String>,
    pub ror: Option<String>,
    pub country_code: Option<String>,
    pub institution_type: Option<String>,
}

impl Entity for InstitutionRow {
    fn id(&self) -> &str {
        &self.institution_id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunderRow {
    pub funder_id: String,
    pub display_name: Option<String>,
}

impl Entity for FunderRow {
    fn id(&self) -> &str {
        &self.funder_id
    }
}

// === Accumulators ===

/// Accumulator for Author rows
pub struct AuthorAccumulator {
    schema: Arc<Schema>,
    author_id: Vec<String>,
    display_name: Vec<Option<String>>,
    orcid: Vec<Option<String>>,
}

impl AuthorAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::authors().clone(),
            author_id: Vec::new(),
            display_name: Vec::new(),
            orcid: Vec::new(),
        }
    }
}

impl Default for AuthorAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for AuthorAccumulator {
    type Row = AuthorRow;

    fn push(&mut self, row: AuthorRow) {
        self.author_id.push(row.author_id);
        self.display_name.push(row.display_name);
        self.orcid.push(row.orcid);
    }

    fn len(&self) -> usize {
        self.author_id.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.author_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.display_name))),
            Arc::new(StringArray::from(std::mem::take(&mut self.orcid))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Accumulator for Institution rows
pub struct InstitutionAccumulator {
    schema: Arc<Schema>,
    institution_id: Vec<String>,
    display_name: Vec<Option<String>>,
    ror: Vec<Option<String>>,
    country_code: Vec<Option<String>>,
    institution_type: Vec<Option<String>>,
}

impl InstitutionAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::institutions().clone(),
            institution_id: Vec::new(),
            display_name: Vec::new(),
            ror: Vec::new(),
            country_code: Vec::new(),
            institution_type: Vec::new(),
        }
    }
}

impl Default for InstitutionAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for InstitutionAccumulator {
    type Row = InstitutionRow;

    fn push(&mut self, row: InstitutionRow) {
        self.institution_id.push(row.institution_id);
        self.display_name.push(row.display_name);
        self.ror.push(row.ror);
        self.country_code.push(row.country_code);
        self.institution_type.push(row.institution_type);
    }

    fn len(&self) -> usize {
        self.institution_id.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.institution_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.display_name))),
            Arc::new(StringArray::from(std::mem::take(&mut self.ror))),
            Arc::new(StringArray::from(std::mem::take(&mut self.country_code))),
            Arc::new(StringArray::from(std::mem::take(
                &mut self.institution_type,
            ))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Accumulator for Funder rows
pub struct FunderAccumulator {
    schema: Arc<Schema>,
    funder_id: Vec<String>,
    display_name: Vec<Option<String>>,
}

impl FunderAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::funders().clone(),
            funder_id: Vec::new(),
            display_name: Vec::new(),
        }
    }
}

impl Default for FunderAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for FunderAccumulator {
    type Row = FunderRow;

    fn push(&mut self, row: FunderRow) {
        self.funder_id.push(row.funder_id);
        self.display_name.push(row.display_name);
    }

    fn len(&self) -> usize {
        self.funder_id.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(std::mem::take(&mut self.funder_id))),
            Arc::new(StringArray::from(std::mem::take(&mut self.display_name))),
        ];
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}
