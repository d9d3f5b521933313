//! Publications rows and their accumulator

use std::fmt;
use std::sync::Arc;

use arrow::array::*;
use arrow::datatypes::{Date32Type, Schema};
use arrow::error::ArrowError;
use bibline_core::Accumulator;

use super::Keyed;
use crate::extract::{FlatAttributes, Scalar, ScalarType};
use crate::schema::{self, ATTRIBUTE_COLUMNS};

/// Outcome of fetching a record, as annotated by the fetch stage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Success,
    NotFound,
    Error(String),
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::NotFound => f.write_str("not-found"),
            Self::Error(reason) if reason.is_empty() => f.write_str("error"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

/// One publication, keyed by normalized DOI
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationRow {
    pub doi: String,
    pub attributes: FlatAttributes,
    pub fetch_status: FetchStatus,
}

impl PublicationRow {
    pub fn title(&self) -> Option<&str> {
        self.attributes.get("title").and_then(Scalar::as_str)
    }
}

impl Keyed for PublicationRow {
    type Key = String;

    fn key(&self) -> String {
        self.doi.clone()
    }
}

/// Accumulator for Publications rows
pub struct PublicationAccumulator {
    schema: Arc<Schema>,
    doi: Vec<String>,
    /// Column-major attribute values, aligned with `ATTRIBUTE_COLUMNS`
    attributes: Vec<Vec<Scalar>>,
    fetch_status: Vec<String>,
}

impl PublicationAccumulator {
    pub fn new() -> Self {
        Self {
            schema: schema::publications().clone(),
            doi: Vec::new(),
            attributes: vec![Vec::new(); ATTRIBUTE_COLUMNS.len()],
            fetch_status: Vec::new(),
        }
    }
}

impl Default for PublicationAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator for PublicationAccumulator {
    type Row = PublicationRow;

    fn push(&mut self, row: PublicationRow) {
        self.doi.push(row.doi);
        for (column, value) in self.attributes.iter_mut().zip(row.attributes.into_values()) {
            column.push(value);
        }
        self.fetch_status.push(row.fetch_status.to_string());
    }

    fn len(&self) -> usize {
        self.doi.len()
    }

    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(ATTRIBUTE_COLUMNS.len() + 2);
        arrays.push(Arc::new(StringArray::from(std::mem::take(&mut self.doi))));
        for (def, column) in ATTRIBUTE_COLUMNS.iter().zip(self.attributes.iter_mut()) {
            arrays.push(scalar_array(def.ty, std::mem::take(column)));
        }
        arrays.push(Arc::new(StringArray::from(std::mem::take(
            &mut self.fetch_status,
        ))));
        RecordBatch::try_new(self.schema.clone(), arrays)
    }
}

/// Build one typed Arrow column; values of another type become null
fn scalar_array(ty: ScalarType, values: Vec<Scalar>) -> ArrayRef {
    match ty {
        ScalarType::Str => Arc::new(
            values
                .iter()
                .map(Scalar::as_str)
                .collect::<StringArray>(),
        ),
        ScalarType::Int => Arc::new(values.iter().map(Scalar::as_int).collect::<Int64Array>()),
        ScalarType::Float => Arc::new(
            values
                .iter()
                .map(Scalar::as_float)
                .collect::<Float64Array>(),
        ),
        ScalarType::Bool => Arc::new(
            values
                .iter()
                .map(Scalar::as_bool)
                .collect::<BooleanArray>(),
        ),
        ScalarType::Date => Arc::new(
            values
                .iter()
                .map(|v| v.as_date().map(Date32Type::from_naive_date))
                .collect::<Date32Array>(),
        ),
        ScalarType::Timestamp => Arc::new(
            values
                .iter()
                .map(|v| v.as_timestamp().map(|ts| ts.and_utc().timestamp_micros()))
                .collect::<TimestampMicrosecondArray>(),
        ),
    }
}
