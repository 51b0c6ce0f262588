//! End-to-end processing of a single EPUB file.
//!
//! Sequence: extract the archive into its working directory, optionally
//! fetch a cover by ISBN, sanitize markup and drop stylesheets, repack to
//! `<name>.cleaned.epub`, then delete the working directory. One working
//! directory per archive base name; concurrent runs against the same
//! archive are unsupported.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;

use super::cover::{CoverFetcher, CoverStatus};
use super::dom::XmlDocument;
use super::{archive, opf, sanitize};

/// Run the full pipeline on one EPUB. Returns the cleaned archive path.
pub async fn process_epub(epub_path: &Path, fetch_cover: bool) -> Result<PathBuf> {
    info!("extracting archive");
    let working_dir = archive::extract_archive(epub_path)?;

    if fetch_cover {
        fetch_cover_into(&working_dir).await?;
    }

    info!("cleaning markup and stylesheets");
    sanitize::clean_directory(&working_dir)?;

    let output_path = cleaned_output_path(epub_path);
    info!("repacking archive");
    archive::pack_epub(&working_dir, &output_path)?;

    info!("removing working directory");
    std::fs::remove_dir_all(&working_dir)?;

    info!("processing complete: {}", output_path.display());
    Ok(output_path)
}

/// Overwrite the declared cover image with one fetched by ISBN.
///
/// Every missing prerequisite (package document, ISBN, cover declaration)
/// is a logged skip; only transport and filesystem failures are errors.
async fn fetch_cover_into(working_dir: &Path) -> Result<()> {
    let Some(opf_path) = opf::locate_package_document(working_dir) else {
        warn!("package document not found, skipping cover fetch");
        return Ok(());
    };

    let doc = XmlDocument::parse(&std::fs::read(&opf_path)?)?;

    let Some(isbn) = opf::extract_isbn(&doc) else {
        warn!("no ISBN in package metadata, skipping cover fetch");
        return Ok(());
    };
    let opf_dir = opf_path.parent().unwrap_or(working_dir);
    let Some(cover_path) = opf::extract_cover_path(&doc, opf_dir) else {
        warn!("no cover declared in package metadata, skipping cover fetch");
        return Ok(());
    };

    match CoverFetcher::new().fetch(&isbn, &cover_path).await? {
        CoverStatus::Found => {}
        CoverStatus::NotFound => {
            info!("no cover available for ISBN {isbn}, keeping the existing image");
        }
    }
    Ok(())
}

/// Output path: the input with its extension replaced by `.cleaned.epub`.
fn cleaned_output_path(epub_path: &Path) -> PathBuf {
    let stem = epub_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    epub_path.with_file_name(format!("{stem}.cleaned.epub"))
}
