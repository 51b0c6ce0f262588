//! ZIP archive parsing, extraction and writing.
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The reader starts from the EOCD at the end of the file, then reads the
//! Central Directory, which allows listing files without scanning the
//! whole archive. The writer emits the same structures in forward order,
//! with entry order fully controlled by the caller (the EPUB container
//! format requires `mimetype` to be the first entry, stored uncompressed).
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading archives > 4GB
//! - STORED (no compression) and DEFLATE methods
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - Writing is plain 32-bit zip only

mod reader;
mod structures;
mod writer;

pub use reader::ZipReader;
pub use structures::*;
pub use writer::ZipWriter;
