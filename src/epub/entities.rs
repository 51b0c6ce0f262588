//! Numeric character reference decoding.
//!
//! Rewrites `&#xH;` and `&#N;` references in markup files to the literal
//! Unicode character. The XML-required named entities (`&amp;`, `&lt;`,
//! `&gt;`, `&quot;`, `&apos;`) are never numeric references, so the
//! patterns here cannot touch them.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

use crate::error::{EpubError, Result};

// The hex pattern must run on its own: a decimal-only pattern would stop
// at the `x` marker and misread the reference.
static HEX_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#x([0-9a-fA-F]+);").unwrap());
static DEC_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#([0-9]+);").unwrap());

/// Decode every numeric character reference in `content`.
///
/// References whose numeric value overflows or does not name a valid
/// Unicode scalar (surrogates, > 0x10FFFF) are passed through verbatim.
pub fn decode_numeric_entities(content: &str) -> Cow<'_, str> {
    let hex_pass = HEX_REF.replace_all(content, |caps: &Captures| {
        decode_code_point(&caps[1], 16).unwrap_or_else(|| caps[0].to_string())
    });

    let decimal = |caps: &Captures| -> String {
        decode_code_point(&caps[1], 10).unwrap_or_else(|| caps[0].to_string())
    };

    match hex_pass {
        Cow::Borrowed(s) => DEC_REF.replace_all(s, decimal),
        Cow::Owned(s) => Cow::Owned(DEC_REF.replace_all(&s, decimal).into_owned()),
    }
}

fn decode_code_point(digits: &str, radix: u32) -> Option<String> {
    u32::from_str_radix(digits, radix)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
}

/// Decode numeric references in every markup file under `dir`.
///
/// A file is rewritten only when decoding actually changed it, so
/// untouched files keep their timestamps.
pub fn decode_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(EpubError::NotFound(dir.to_path_buf()));
    }

    let markup_files = super::find_files(dir, super::MARKUP_EXTENSIONS)?;
    info!("found {} markup files", markup_files.len());

    let mut changed = 0usize;
    for path in &markup_files {
        let content = std::fs::read_to_string(path)?;
        if let Cow::Owned(decoded) = decode_numeric_entities(&content) {
            if decoded != content {
                std::fs::write(path, decoded)?;
                info!("decoded: {}", path.display());
                changed += 1;
            }
        }
    }

    info!("decoded entities in {changed} file(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex_and_decimal_references() {
        assert_eq!(decode_numeric_entities("&#x61;&#98;"), "ab");
        assert_eq!(decode_numeric_entities("caf&#xe9; &#233;"), "café é");
    }

    #[test]
    fn leaves_xml_named_entities_alone() {
        let input = "&amp; &lt; &gt; &quot; &apos;";
        assert_eq!(decode_numeric_entities(input), input);
    }

    #[test]
    fn is_identity_without_references() {
        let input = "<p>plain text, no references</p>";
        assert!(matches!(decode_numeric_entities(input), Cow::Borrowed(_)));
    }

    #[test]
    fn idempotent_on_decoded_output() {
        let once = decode_numeric_entities("&#x2014;x&#8212;").into_owned();
        assert_eq!(decode_numeric_entities(&once), once);
    }

    #[test]
    fn malformed_references_pass_through() {
        // Surrogate, out of range, and overflowing values keep their raw text.
        assert_eq!(decode_numeric_entities("&#xD800;"), "&#xD800;");
        assert_eq!(decode_numeric_entities("&#1114112;"), "&#1114112;");
        assert_eq!(decode_numeric_entities("&#99999999999999999999;"), "&#99999999999999999999;");
    }

    #[test]
    fn rewrites_only_changed_files() {
        let dir = tempfile::tempdir().unwrap();
        let changed = dir.path().join("a.xhtml");
        let untouched = dir.path().join("b.xhtml");
        std::fs::write(&changed, "<p>&#x61;</p>").unwrap();
        std::fs::write(&untouched, "<p>plain</p>").unwrap();

        decode_directory(dir.path()).unwrap();

        assert_eq!(std::fs::read_to_string(&changed).unwrap(), "<p>a</p>");
        assert_eq!(std::fs::read_to_string(&untouched).unwrap(), "<p>plain</p>");
    }
}
