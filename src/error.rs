//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, decoder, schema, descriptor and header errors, and
//! provides semantic variants for open-time validation, index construction and
//! cached lazy-aggregate failures.
use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] crate::io::DecodeError),

    #[error("Schema error: {0}")]
    Schema(#[from] crate::io::SchemaError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] crate::io::DescriptorError),

    #[error("Header error: {0}")]
    Header(#[from] crate::io::HeaderError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No binary schema registered for format {format}")]
    UnknownFormat { format: String },

    #[error("No band descriptor table registered for format {format}")]
    MissingDescriptors { format: String },

    #[error("Unsupported product type {file_type} (format {format})")]
    UnsupportedProduct { file_type: String, format: String },

    #[error("Grid point id {id} of record {record} is outside the valid range")]
    InvalidGridPointId { id: u64, record: usize },

    #[error("{name} computation failed: {source}")]
    Aggregate {
        name: &'static str,
        #[source]
        source: Arc<Error>,
    },

    #[error("Unknown band `{band}` for format {format}")]
    UnknownBand { band: String, format: String },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Processing error: {0}")]
    Processing(String),
}
