//! Crate-wide error type.
//!
//! Every fallible operation in the library returns [`Result`]; errors
//! propagate unmodified to the CLI entry point, which prints the message
//! and exits with status 1. Soft conditions (missing package document,
//! missing ISBN, cover not found) are not errors and are logged instead.

use std::path::PathBuf;
use thiserror::Error;

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, EpubError>;

#[derive(Error, Debug)]
pub enum EpubError {
    /// A required file or directory does not exist.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Input that should be a zip archive or XML document is not.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// XML parse or serialization failure.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Network failure during a cover fetch.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Filesystem read/write/delete failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A zip entry name or XML fragment is not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
