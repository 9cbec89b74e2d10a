//! Error types for the data-loader crate.
//!
//! Two families live here:
//! - `DataLoadError` covers everything that can go wrong while reading and
//!   validating the persisted model, mappings and tables. All of these are
//!   fatal at startup.
//! - `LookupError` covers runtime lookups against already-loaded stores.

use crate::types::EntityKind;
use thiserror::Error;

/// Errors that can occur during data loading and parsing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A cell could not be converted to its column's type
    #[error("Invalid {field} '{value}' at line {line} in {file}")]
    InvalidValue {
        file: String,
        line: usize,
        field: String,
        value: String,
    },

    /// The CSV reader rejected a table
    #[error("CSV error at line {line} in {file}: {source}")]
    Csv {
        file: String,
        line: usize,
        #[source]
        source: csv::Error,
    },

    /// Expected number of fields in a line doesn't match actual
    #[error("Expected {expected} fields but found {found} in line {line}")]
    FieldCountMismatch {
        expected: usize,
        found: usize,
        line: usize,
    },

    /// An identifier table is not a bijection onto `[0, count)`
    #[error("Malformed {kind} mapping: {reason}")]
    MalformedMapping { kind: EntityKind, reason: String },

    /// Factor matrices or bias vectors are structurally inconsistent
    #[error("Malformed model: {0}")]
    MalformedModel(String),

    /// A serialized mapping table could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failed lookups against loaded stores.
///
/// `UnknownIdentifier` is an expected condition (new users, stale ids).
/// `IndexOutOfRange` means an identifier map and the model disagree about
/// their sizes, which is a defect rather than a data problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Unknown {kind} identifier: {id}")]
    UnknownIdentifier { kind: EntityKind, id: u32 },

    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: EntityKind,
        index: usize,
        len: usize,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
