//! Extracting an EPUB into a working directory and repacking one.
//!
//! Extraction always targets `extracted/<archive-base-name>/` relative to
//! the current directory. Repacking honors the EPUB container format:
//! `mimetype` is the first entry and stored uncompressed, the `META-INF`
//! subtree follows, and everything else is deflated. Readers may reject
//! archives that violate this ordering, so it is never left to
//! filesystem traversal order.

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::error::{EpubError, Result};
use crate::io::LocalFileReader;
use crate::zip::{CompressionMethod, ZipReader, ZipWriter};

/// Extract every entry of `epub_path` into `extracted/<base-name>/`,
/// overwriting files already there. Returns the working directory.
pub fn extract_archive(epub_path: &Path) -> Result<PathBuf> {
    let reader = LocalFileReader::new(epub_path)?;

    let base_name = epub_path
        .file_stem()
        .ok_or_else(|| EpubError::NotFound(epub_path.to_path_buf()))?;
    let output_dir = Path::new("extracted").join(base_name);
    std::fs::create_dir_all(&output_dir)?;

    let zip = ZipReader::new(reader);
    for entry in zip.list_entries()? {
        if entry.is_directory {
            continue;
        }
        // Entry names that would escape the working directory are invalid.
        if Path::new(&entry.file_name)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir | std::path::Component::RootDir))
        {
            return Err(EpubError::Malformed(format!(
                "unsafe entry path: {}",
                entry.file_name
            )));
        }
        zip.extract_entry(&entry, &output_dir.join(&entry.file_name))?;
    }

    info!(
        "extracted {} to {}",
        epub_path.display(),
        output_dir.display()
    );
    Ok(output_dir)
}

/// Repack `source_dir` into a zip archive at `output_path`.
///
/// Entry order is deterministic: `mimetype` (stored) if present, then the
/// `META-INF` subtree, then all remaining files, each group sorted.
pub fn pack_epub(source_dir: &Path, output_path: &Path) -> Result<()> {
    if !source_dir.exists() {
        return Err(EpubError::NotFound(source_dir.to_path_buf()));
    }
    if output_path.exists() {
        std::fs::remove_file(output_path)?;
    }

    let file = std::fs::File::create(output_path)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));

    let mimetype_path = source_dir.join("mimetype");
    if mimetype_path.is_file() {
        let data = std::fs::read(&mimetype_path)?;
        writer.add_entry("mimetype", &data, CompressionMethod::Stored)?;
    }

    let meta_inf = source_dir.join("META-INF");
    if meta_inf.is_dir() {
        for path in sorted_files(&meta_inf)? {
            add_file(&mut writer, source_dir, &path)?;
        }
    }

    for path in sorted_files(source_dir)? {
        if path == mimetype_path || path.starts_with(&meta_inf) {
            continue;
        }
        add_file(&mut writer, source_dir, &path)?;
    }

    writer.finish()?;
    info!("created EPUB: {}", output_path.display());
    Ok(())
}

fn add_file<W: std::io::Write>(
    writer: &mut ZipWriter<W>,
    source_dir: &Path,
    path: &Path,
) -> Result<()> {
    let data = std::fs::read(path)?;
    writer.add_entry(&entry_name(source_dir, path)?, &data, CompressionMethod::Deflate)
}

/// Archive entry name: relative to the source directory, forward slashes.
fn entry_name(source_dir: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(source_dir)
        .map_err(|_| EpubError::Malformed(format!("path outside source dir: {}", path.display())))?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn sorted_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_epub_has_stored_mimetype_first() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book");
        std::fs::create_dir_all(src.join("META-INF")).unwrap();
        std::fs::create_dir_all(src.join("OEBPS")).unwrap();
        std::fs::write(src.join("mimetype"), "application/epub+zip").unwrap();
        std::fs::write(src.join("META-INF/container.xml"), "<container/>").unwrap();
        std::fs::write(src.join("OEBPS/chapter1.xhtml"), "<html/>").unwrap();

        let out = dir.path().join("book.epub");
        pack_epub(&src, &out).unwrap();

        let reader = ZipReader::new(LocalFileReader::new(&out).unwrap());
        let entries = reader.list_entries().unwrap();
        assert_eq!(entries[0].file_name, "mimetype");
        assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
        assert_eq!(entries[1].file_name, "META-INF/container.xml");
        assert_eq!(
            reader.read_entry(&entries[0]).unwrap(),
            b"application/epub+zip"
        );
    }

    #[test]
    fn missing_archive_is_not_found() {
        let err = extract_archive(Path::new("no-such-book.epub")).unwrap_err();
        assert!(matches!(err, EpubError::NotFound(_)));
    }

    #[test]
    fn round_trip_preserves_content() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("book");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("mimetype"), "application/epub+zip").unwrap();
        let body = "<html><body><p>chapter text</p></body></html>".repeat(20);
        std::fs::write(src.join("chapter1.xhtml"), &body).unwrap();

        let out = dir.path().join("book.epub");
        pack_epub(&src, &out).unwrap();

        let reader = ZipReader::new(LocalFileReader::new(&out).unwrap());
        let entries = reader.list_entries().unwrap();
        let chapter = entries
            .iter()
            .find(|e| e.file_name == "chapter1.xhtml")
            .unwrap();
        assert_eq!(reader.read_entry(chapter).unwrap(), body.as_bytes());
    }
}
