//! Error taxonomy for context construction and validation.
//!
//! Every fatal class accumulates into the run context's error list and is
//! rendered as one report before the process exits. The naming-convention
//! warning is advisory only and never appears here; see [`crate::naming`].

use std::io;
use thiserror::Error;

/// Errors raised while building or validating a run context.
#[derive(Error, Debug)]
pub enum ContextError {
    /// A flag that requires a value was the last token on the line.
    #[error("{flag} option given, but no {expected} specified")]
    MissingValue {
        flag: &'static str,
        expected: &'static str,
    },

    /// A flag value was present but failed validation.
    #[error("{0}")]
    MalformedValue(String),

    /// A token survived every dispatch layer without being consumed.
    #[error("Unrecognized parameter: {0}")]
    UnrecognizedFlag(String),

    /// No input files were declared before `open_files`.
    #[error("No input file given. Exiting.")]
    MissingInput,

    /// A declared input file could not be opened or classified.
    #[error("Could not open file {path}: {source}")]
    FileOpen { path: String, source: io::Error },

    /// Column-aggregation configuration is invalid for this tool or schema.
    #[error("Invalid column operation setup: {0}")]
    ColumnOps(String),

    /// A merge-on-read file produced records out of sort order.
    #[error("File {path} is not sorted: {message}")]
    UnsortedInput { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, ContextError>;
