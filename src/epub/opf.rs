//! Package metadata document (`content.opf`) handling.
//!
//! Locates the package document through `META-INF/container.xml` with a
//! fallback probe of conventional locations, extracts the ISBN and the
//! declared cover image path from it, and removes manifest items that
//! reference deleted stylesheet files.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use tracing::info;

use crate::error::Result;

use super::dom::{Element, XmlDocument, XmlNode};

/// Conventional package document locations probed when the container
/// descriptor is absent or unreadable.
const FALLBACK_OPF_PATHS: &[&str] = &["content.opf", "OEBPS/content.opf", "OPS/content.opf"];

/// ISBN-10 or ISBN-13 (978/979 prefix), after hyphen/whitespace stripping.
static ISBN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(97[89])?\d{9}[\dX]$").unwrap());

/// Find the package metadata document inside an extracted archive.
///
/// Tries the `rootfile` pointer in `META-INF/container.xml` first; a
/// missing or unparsable descriptor falls back to probing conventional
/// locations. Returns `None` when nothing resolves.
pub fn locate_package_document(dir: &Path) -> Option<PathBuf> {
    let container = dir.join("META-INF").join("container.xml");
    if let Some(full_path) = read_rootfile_path(&container) {
        let opf_path = dir.join(full_path);
        if opf_path.exists() {
            return Some(opf_path);
        }
    }

    FALLBACK_OPF_PATHS
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.exists())
}

fn read_rootfile_path(container: &Path) -> Option<String> {
    let content = std::fs::read(container).ok()?;
    let doc = XmlDocument::parse(&content).ok()?;

    let mut full_path = None;
    for_each_element(doc.root()?, &mut |el| {
        if full_path.is_none() && el.local_name() == "rootfile" {
            full_path = el.attr("full-path").map(str::to_string);
        }
    });
    full_path
}

/// Normalize an ISBN candidate: strip hyphens and whitespace, uppercase.
pub fn normalize_isbn(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Extract a valid ISBN from the package document's identifiers.
///
/// Identifiers whose scheme attribute is `isbn` (case-insensitive) are
/// preferred; the first candidate matching the canonical ISBN-10/13
/// pattern wins.
pub fn extract_isbn(doc: &XmlDocument) -> Option<String> {
    let root = doc.root()?;

    let mut candidates: Vec<(bool, String)> = Vec::new();
    for_each_element(root, &mut |el| {
        if el.local_name() == "identifier" {
            let is_isbn_scheme = el
                .attr_local("scheme")
                .is_some_and(|s| s.eq_ignore_ascii_case("isbn"));
            candidates.push((is_isbn_scheme, el.text()));
        }
    });

    // Stable sort: isbn-scheme identifiers first, document order otherwise.
    candidates.sort_by_key(|(is_isbn, _)| !*is_isbn);

    candidates
        .into_iter()
        .map(|(_, text)| normalize_isbn(&text))
        .find(|isbn| ISBN_PATTERN.is_match(isbn))
}

/// Resolve the declared cover image path from the package document.
///
/// Follows `meta[name="cover"]` to a manifest item id; falls back to a
/// manifest item with id `cover` or `properties="cover-image"`.
pub fn extract_cover_path(doc: &XmlDocument, opf_dir: &Path) -> Option<PathBuf> {
    let root = doc.root()?;

    let mut cover_id = None;
    for_each_element(root, &mut |el| {
        if cover_id.is_none()
            && el.local_name() == "meta"
            && el.attr("name") == Some("cover")
        {
            cover_id = el.attr("content").map(str::to_string);
        }
    });

    let mut href = None;
    if let Some(id) = &cover_id {
        for_each_element(root, &mut |el| {
            if href.is_none() && el.local_name() == "item" && el.attr("id") == Some(id.as_str()) {
                href = el.attr("href").map(str::to_string);
            }
        });
    }

    // Fallback: a manifest item conventionally named or flagged as cover.
    if href.is_none() {
        for_each_element(root, &mut |el| {
            if href.is_none()
                && el.local_name() == "item"
                && (el.attr("id") == Some("cover")
                    || el.attr("properties") == Some("cover-image"))
            {
                href = el.attr("href").map(str::to_string);
            }
        });
    }

    href.map(|h| opf_dir.join(h))
}

/// Remove manifest items referencing the given CSS files.
///
/// A missing package document is a logged notice, not an error. Must run
/// before the CSS files are deleted from disk.
pub fn remove_manifest_items(dir: &Path, css_files: &[PathBuf]) -> Result<()> {
    let Some(opf_path) = locate_package_document(dir) else {
        info!("package document not found, skipping manifest cleanup");
        return Ok(());
    };
    let opf_dir = opf_path.parent().unwrap_or(dir).to_path_buf();

    let content = std::fs::read(&opf_path)?;
    let mut doc = XmlDocument::parse(&content)?;

    for css_file in css_files {
        let relative = relative_to(&opf_dir, css_file);
        let native = relative.to_string_lossy().to_string();
        let normalized = native.replace('\\', "/");

        if let Some(root) = doc.root_mut() {
            remove_items_with_href(root, &[&normalized, &native]);
        }
    }

    std::fs::write(&opf_path, doc.to_xml_string()?)?;
    info!("updated {}", opf_path.display());
    Ok(())
}

fn remove_items_with_href(el: &mut Element, hrefs: &[&str]) {
    el.children.retain(|child| match child {
        XmlNode::Element(c) if c.local_name() == "item" => {
            !c.attr("href").is_some_and(|href| hrefs.contains(&href))
        }
        _ => true,
    });

    for child in &mut el.children {
        if let XmlNode::Element(c) = child {
            remove_items_with_href(c, hrefs);
        }
    }
}

fn for_each_element<'a>(el: &'a Element, f: &mut impl FnMut(&'a Element)) {
    f(el);
    for child in &el.children {
        if let XmlNode::Element(c) = child {
            for_each_element(c, f);
        }
    }
}

/// Path of `target` relative to the directory `base`.
///
/// Both paths come from walking the same working directory, so a plain
/// component comparison is enough (no symlink resolution).
fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base_components: Vec<Component> = base.components().collect();
    let target_components: Vec<Component> = target.components().collect();

    let common = base_components
        .iter()
        .zip(&target_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_components.len() {
        relative.push("..");
    }
    for component in &target_components[common..] {
        relative.push(component);
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = concat!(
        r#"<?xml version="1.0"?>"#,
        r#"<package xmlns="http://www.idpf.org/2007/opf" xmlns:opf="http://www.idpf.org/2007/opf">"#,
        "<metadata>",
        r#"<dc:identifier opf:scheme="ISBN">0-19-853453-1</dc:identifier>"#,
        "<dc:identifier>random-text</dc:identifier>",
        r#"<meta name="cover" content="cover-img"/>"#,
        "</metadata>",
        "<manifest>",
        r#"<item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>"#,
        r#"<item id="css" href="style.css" media-type="text/css"/>"#,
        r#"<item id="ch1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>"#,
        "</manifest>",
        "</package>",
    );

    #[test]
    fn extracts_isbn_preferring_scheme() {
        let doc = XmlDocument::parse(OPF.as_bytes()).unwrap();
        assert_eq!(extract_isbn(&doc).as_deref(), Some("0198534531"));
    }

    #[test]
    fn scheme_preference_beats_document_order() {
        let opf = concat!(
            "<package><metadata>",
            "<dc:identifier>9780306406157</dc:identifier>",
            r#"<dc:identifier opf:scheme="isbn">0-19-853453-1</dc:identifier>"#,
            "</metadata></package>",
        );
        let doc = XmlDocument::parse(opf.as_bytes()).unwrap();
        assert_eq!(extract_isbn(&doc).as_deref(), Some("0198534531"));
    }

    #[test]
    fn no_valid_isbn_yields_none() {
        let opf = "<package><metadata><dc:identifier>urn:uuid:1234</dc:identifier></metadata></package>";
        let doc = XmlDocument::parse(opf.as_bytes()).unwrap();
        assert_eq!(extract_isbn(&doc), None);
    }

    #[test]
    fn cover_path_follows_meta_reference() {
        let doc = XmlDocument::parse(OPF.as_bytes()).unwrap();
        let path = extract_cover_path(&doc, Path::new("extracted/book/OEBPS")).unwrap();
        assert_eq!(path, Path::new("extracted/book/OEBPS/images/cover.jpg"));
    }

    #[test]
    fn cover_path_falls_back_to_cover_image_property() {
        let opf = concat!(
            "<package><manifest>",
            r#"<item id="img1" properties="cover-image" href="cover.png"/>"#,
            "</manifest></package>",
        );
        let doc = XmlDocument::parse(opf.as_bytes()).unwrap();
        let path = extract_cover_path(&doc, Path::new("d")).unwrap();
        assert_eq!(path, Path::new("d/cover.png"));
    }

    #[test]
    fn locates_package_document_via_container() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("META-INF")).unwrap();
        std::fs::create_dir_all(dir.path().join("OEBPS")).unwrap();
        std::fs::write(
            dir.path().join("META-INF/container.xml"),
            r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("OEBPS/content.opf"), OPF).unwrap();

        let found = locate_package_document(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("OEBPS/content.opf"));
    }

    #[test]
    fn falls_back_to_conventional_locations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("content.opf"), OPF).unwrap();

        let found = locate_package_document(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("content.opf"));
    }

    #[test]
    fn removes_manifest_items_for_deleted_css() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("content.opf"), OPF).unwrap();
        let css = dir.path().join("style.css");
        std::fs::write(&css, "p { color: red }").unwrap();

        remove_manifest_items(dir.path(), &[css]).unwrap();

        let rewritten = std::fs::read_to_string(dir.path().join("content.opf")).unwrap();
        assert!(!rewritten.contains("style.css"));
        assert!(rewritten.contains("chapter1.xhtml"));
        assert!(rewritten.contains("images/cover.jpg"));
    }

    #[test]
    fn missing_package_document_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("style.css");
        std::fs::write(&css, "x").unwrap();
        assert!(remove_manifest_items(dir.path(), &[css]).is_ok());
    }

    #[test]
    fn relative_path_crosses_directories() {
        assert_eq!(
            relative_to(Path::new("work/OEBPS"), Path::new("work/styles/main.css")),
            Path::new("../styles/main.css")
        );
        assert_eq!(
            relative_to(Path::new("work"), Path::new("work/style.css")),
            Path::new("style.css")
        );
    }
}
