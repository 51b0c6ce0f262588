//! EPUB-specific processing on top of the generic zip layer.
//!
//! - [`archive`]: extract an EPUB into a working directory, repack one
//! - [`dom`]: owned XML tree used by the sanitizer and manifest editor
//! - [`sanitize`]: strip classes, inline styles, stylesheets and bare spans
//! - [`opf`]: package document lookup, ISBN/cover extraction, manifest edits
//! - [`entities`]: decode numeric character references to literal Unicode
//! - [`cover`]: fetch a cover image by ISBN from Open Library
//! - [`pipeline`]: the end-to-end `process` orchestration

pub mod archive;
pub mod cover;
pub mod dom;
pub mod entities;
pub mod opf;
pub mod pipeline;
pub mod sanitize;

use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::Result;

/// Recursively collect files whose names end with one of the given
/// extensions, in a deterministic (sorted) order.
pub(crate) fn find_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if extensions.iter().any(|ext| name.ends_with(ext)) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// File extensions treated as markup by the sanitizer and entity decoder.
pub(crate) const MARKUP_EXTENSIONS: &[&str] = &[".html", ".xhtml", ".htm"];
