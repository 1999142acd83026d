use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LasError {
    #[error("Unknown format identifier: {id:?}")]
    UnknownFormat { id: String },

    #[error("Big endian storage is not supported.")]
    UnsupportedEndianess,

    #[error("Field {name} must have at least one element (got {count}).")]
    InvalidFieldArity { name: String, count: usize },

    /// The schema built for a point format does not match the size table.
    /// (This indicates a bug in the field lists, not a bad input file.)
    #[error("Record length of {format} is {actual} bytes, expected {expected} bytes.")]
    SchemaSizeMismatch {
        format: String,
        expected: usize,
        actual: usize,
    },

    #[error("Truncated record: expected {expected} bytes, got {actual}.")]
    TruncatedRecord { expected: usize, actual: usize },

    #[error("Unknown field: {name}")]
    UnknownField { name: String },

    #[error("No byte string or value list supplied for the record.")]
    MissingSource,

    #[error("The record was not decoded from bytes.")]
    NotDecoded,

    #[error("Cannot pack record, missing value for {field}.")]
    IncompleteRecord { field: String },

    #[error("Field {name} can not be overwritten in a record read from a file.")]
    ImmutableField { name: String },

    #[error("Point index {index} is out of bounds (the file has {count} points).")]
    PointIndexOutOfBounds { index: u64, count: u64 },

    #[error("Unknown point data format: {0}")]
    UnknownPointFormat(u8),

    #[error("Invalid value for field {field}: expected {expected}")]
    ValueMismatch { field: String, expected: String },

    #[error("Bad LAS file: file signature is {found:?}, expected \"LASF\"")]
    BadSignature { found: String },

    #[error("Setting the {property} is not implemented.")]
    NotImplemented { property: &'static str },

    #[error("I/O Error")]
    Io(#[from] IoError),
}

/// Wrapper around std::io::Error,
/// that allows it to be "cloned" by putting it inside of an Arc.
#[derive(Debug, Clone)]
pub struct IoError(pub Arc<std::io::Error>);

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<std::io::Error> for IoError {
    fn from(value: std::io::Error) -> Self {
        Self(Arc::new(value))
    }
}

impl From<std::io::Error> for LasError {
    fn from(value: std::io::Error) -> Self {
        LasError::Io(value.into())
    }
}

pub type Result<T, E = LasError> = std::result::Result<T, E>;
