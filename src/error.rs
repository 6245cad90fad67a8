use std::{
    io,
    path::PathBuf,
};

use thiserror::Error;

/// Result type of the library stages.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors, typed by cause so a caller can report a specific diagnostic.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing section in {file}: {anchor:?} not found")]
    MissingSection {
        file: &'static str,
        anchor: String,
    },

    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot read {path:?}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,
}


impl Error {
    pub fn missing(file: &'static str, anchor: impl Into<String>) -> Self {
        Self::MissingSection { file, anchor: anchor.into() }
    }

    pub fn mismatch(what: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch { what: what.into(), expected, found }
    }
}
