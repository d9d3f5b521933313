//! Error taxonomy for normalization
//!
//! Only [`BatchError`] is ever returned as `Err`. [`RecordSkip`] and
//! [`Substructure`] describe recoverable problems; the decomposer counts them
//! in its report and carries on with the next record or sub-structure.

use std::fmt;
use std::path::PathBuf;

use arrow::error::ArrowError;

/// A condition that makes the whole batch unusable
#[derive(Debug)]
pub enum BatchError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Input is neither a record, a list of records nor a known page envelope
    NotIterable { path: PathBuf, found: &'static str },
    /// A `.json` document that does not parse at all
    Json { path: PathBuf, message: String },
    Arrow(ArrowError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: IO: {source}", path.display()),
            Self::NotIterable { path, found } => write!(
                f,
                "{}: expected a record or a list of records, found {found}",
                path.display()
            ),
            Self::Json { path, message } => write!(f, "{}: invalid JSON: {message}", path.display()),
            Self::Arrow(e) => write!(f, "Arrow: {e}"),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Arrow(e) => Some(e),
            Self::NotIterable { .. } | Self::Json { .. } => None,
        }
    }
}

impl From<ArrowError> for BatchError {
    fn from(e: ArrowError) -> Self {
        Self::Arrow(e)
    }
}

/// Why a whole record contributed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordSkip {
    NotAnObject,
    MissingDoi,
    InvalidDoi,
    /// A JSON-lines line that is not JSON
    Unparseable,
}

impl RecordSkip {
    pub const ALL: [RecordSkip; 4] = [
        Self::NotAnObject,
        Self::MissingDoi,
        Self::InvalidDoi,
        Self::Unparseable,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::NotAnObject => "not an object",
            Self::MissingDoi => "missing DOI",
            Self::InvalidDoi => "invalid DOI",
            Self::Unparseable => "unparseable",
        }
    }
}

impl fmt::Display for RecordSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::error::Error for RecordSkip {}

/// A nested structure of an accepted record that was not usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Substructure {
    Authorships,
    Institutions,
    Countries,
    Affiliations,
    Grants,
    CountsByYear,
}

impl Substructure {
    pub const ALL: [Substructure; 6] = [
        Self::Authorships,
        Self::Institutions,
        Self::Countries,
        Self::Affiliations,
        Self::Grants,
        Self::CountsByYear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Authorships => "authorships",
            Self::Institutions => "institutions",
            Self::Countries => "countries",
            Self::Affiliations => "affiliations",
            Self::Grants => "grants",
            Self::CountsByYear => "counts_by_year",
        }
    }
}

impl fmt::Display for Substructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {}", self.label())
    }
}

impl std::error::Error for Substructure {}
