use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "epubstrip")]
#[command(version)]
#[command(about = "Strip formatting artifacts from EPUB archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  epubstrip extract book.epub              unpack into extracted/book/\n  \
  epubstrip clean extracted/book           strip classes, styles and stylesheets in place\n  \
  epubstrip process book.epub              produce book.cleaned.epub\n  \
  epubstrip process book.epub --fetch-cover   also replace the cover via Open Library")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract an EPUB archive into extracted/<base-name>/
    Extract {
        /// Path to the EPUB file
        #[arg(value_name = "EPUB")]
        archive: PathBuf,
    },

    /// Strip classes, inline styles and stylesheets from an extracted directory
    Clean {
        /// Directory containing extracted EPUB contents
        #[arg(value_name = "DIR")]
        directory: PathBuf,
    },

    /// Decode numeric character references to literal Unicode
    DecodeEntities {
        /// Directory containing extracted EPUB contents
        #[arg(value_name = "DIR")]
        directory: PathBuf,
    },

    /// Full pipeline: extract, clean, repack to <base-name>.cleaned.epub
    Process {
        /// Path to the EPUB file
        #[arg(value_name = "EPUB")]
        archive: PathBuf,

        /// Fetch a cover image from Open Library by ISBN
        #[arg(long)]
        fetch_cover: bool,
    },
}
