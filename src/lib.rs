//! # epubstrip
//!
//! Strips formatting artifacts from EPUB archives: `class` attributes,
//! inline `style` attributes, linked stylesheets, and empty `span`
//! wrappers, while preserving document structure and text. Optionally
//! decodes numeric character references to literal Unicode and fetches a
//! cover image by ISBN from Open Library.
//!
//! The zip layer is self-contained: archives are read and written
//! directly (local file headers, central directory, EOCD) with no
//! external process, so the EPUB requirement that `mimetype` come first
//! and uncompressed is guaranteed by construction.
//!
//! ## Example
//!
//! ```no_run
//! use epubstrip::epub::pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Extract, sanitize and repack; yields book.cleaned.epub
//!     let cleaned = pipeline::process_epub("book.epub".as_ref(), false).await?;
//!     println!("wrote {}", cleaned.display());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod epub;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::{Cli, Command};
pub use error::{EpubError, Result};
pub use io::{LocalFileReader, ReadAt};
pub use zip::{CompressionMethod, ZipFileEntry, ZipReader, ZipWriter};
