use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReconError {
    #[error("invalid project id: {0}")]
    InvalidProject(String),

    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("missing config file xena-recon.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("GDC request failed: {0}")]
    GdcHttp(String),

    #[error("GDC returned status {status}: {message}")]
    GdcStatus { status: u16, message: String },

    #[error("GDC data download failed: {0}")]
    FetchHttp(String),

    #[error("GDC data endpoint returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("malformed repository record: {0}")]
    MalformedRecord(String),

    #[error(
        "sample sets disagree: {} sample(s) only in the repository, {} only in the reference matrix",
        only_repository.len(),
        only_reference.len()
    )]
    SampleSetMismatch {
        only_repository: Vec<String>,
        only_reference: Vec<String>,
    },

    #[error("row count mismatch: {context} has {left} rows, expected {right}")]
    RowCountMismatch {
        context: String,
        left: usize,
        right: usize,
    },

    #[error("row keys diverge between replicate files: {0}")]
    RowKeyMismatch(String),

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("reference matrix not found at {0}")]
    MatrixNotFound(PathBuf),

    #[error("delimited file error: {0}")]
    Csv(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
