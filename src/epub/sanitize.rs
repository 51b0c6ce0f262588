//! Markup sanitization: strip formatting artifacts from XHTML trees.
//!
//! Four rewrites over the parsed tree: drop `class` attributes, drop
//! `style` attributes, drop stylesheet `link` elements, and splice the
//! children of attribute-less `span` wrappers into their parent until
//! none remain. The span collapse terminates because every splice
//! strictly reduces the element count.

use std::path::Path;
use tracing::info;

use crate::error::{EpubError, Result};

use super::dom::{Element, XmlDocument, XmlNode};
use super::opf;

/// Apply all sanitization rewrites to a parsed document in place.
pub fn sanitize_document(doc: &mut XmlDocument) {
    for node in &mut doc.nodes {
        if let XmlNode::Element(el) = node {
            strip_formatting(el);
            while collapse_bare_spans(el) {}
        }
    }
}

/// Remove `class`/`style` attributes and stylesheet links, recursively.
fn strip_formatting(el: &mut Element) {
    el.remove_attr("class");
    el.remove_attr("style");

    el.children.retain(|child| match child {
        XmlNode::Element(c) => !is_stylesheet_link(c),
        _ => true,
    });

    for child in &mut el.children {
        if let XmlNode::Element(c) = child {
            strip_formatting(c);
        }
    }
}

fn is_stylesheet_link(el: &Element) -> bool {
    if el.local_name() != "link" {
        return false;
    }
    // rel comparison is exact and case-sensitive, per the source markup.
    el.attr("rel") == Some("stylesheet")
        || el.attr("href").is_some_and(|href| href.ends_with(".css"))
}

/// Splice children of attribute-less `span` elements into their parent.
///
/// Returns true if anything changed. Spliced-in children are re-examined
/// at the same position, so nested bare spans collapse too.
fn collapse_bare_spans(el: &mut Element) -> bool {
    let mut changed = false;
    let mut i = 0;

    while i < el.children.len() {
        let is_bare_span = matches!(
            &el.children[i],
            XmlNode::Element(c) if c.local_name() == "span" && c.attrs.is_empty()
        );

        if is_bare_span {
            if let XmlNode::Element(span) = el.children.remove(i) {
                el.children.splice(i..i, span.children);
            }
            changed = true;
            continue;
        }

        if let XmlNode::Element(child) = &mut el.children[i] {
            changed |= collapse_bare_spans(child);
        }
        i += 1;
    }

    changed
}

/// Sanitize one markup file in place.
pub fn sanitize_file(path: &Path) -> Result<()> {
    let content = std::fs::read(path)?;
    let mut doc = XmlDocument::parse(&content)?;

    sanitize_document(&mut doc);

    std::fs::write(path, doc.to_xml_string()?)?;
    info!("cleaned: {}", path.display());
    Ok(())
}

/// Clean an extracted EPUB directory: sanitize every markup file, drop
/// deleted stylesheets from the package manifest, then delete the
/// stylesheet files themselves.
pub fn clean_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(EpubError::NotFound(dir.to_path_buf()));
    }

    let markup_files = super::find_files(dir, super::MARKUP_EXTENSIONS)?;
    info!("found {} markup files", markup_files.len());

    for path in &markup_files {
        sanitize_file(path)?;
    }

    let css_files = super::find_files(dir, &[".css"])?;
    info!("found {} CSS files to delete", css_files.len());

    // Manifest references are removed before the files go away; the
    // relative-path computation happens against their original location.
    if !css_files.is_empty() {
        opf::remove_manifest_items(dir, &css_files)?;
    }

    for path in &css_files {
        std::fs::remove_file(path)?;
        info!("deleted: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize_str(input: &str) -> String {
        let mut doc = XmlDocument::parse(input.as_bytes()).unwrap();
        sanitize_document(&mut doc);
        doc.to_xml_string().unwrap()
    }

    #[test]
    fn removes_class_and_style_everywhere() {
        let output = sanitize_str(
            r#"<html class="a"><body style="x"><p class="b" style="y" id="keep">text</p></body></html>"#,
        );
        assert!(!output.contains("class="));
        assert!(!output.contains("style="));
        assert!(output.contains(r#"id="keep""#));
    }

    #[test]
    fn removes_stylesheet_links_keeps_others() {
        let output = sanitize_str(concat!(
            "<html><head>",
            r#"<link rel="stylesheet" href="style.css"/>"#,
            r#"<link href="other.css"/>"#,
            r#"<link rel="icon" href="favicon.png"/>"#,
            "</head><body/></html>",
        ));
        assert!(!output.contains(".css"));
        assert!(output.contains(r#"<link rel="icon" href="favicon.png"/>"#));
    }

    #[test]
    fn collapses_nested_bare_spans_preserving_text_order() {
        let output = sanitize_str("<p>a<span>b<span>c</span>d</span>e</p>");
        assert_eq!(output, "<p>abcde</p>");
    }

    #[test]
    fn keeps_spans_with_other_attributes() {
        let output = sanitize_str(r#"<p><span id="s1">kept</span></p>"#);
        assert_eq!(output, r#"<p><span id="s1">kept</span></p>"#);
    }

    #[test]
    fn span_bare_after_class_removal_is_collapsed() {
        let output = sanitize_str(r#"<p><span class="only">x</span></p>"#);
        assert_eq!(output, "<p>x</p>");
    }

    #[test]
    fn empty_bare_span_disappears() {
        let output = sanitize_str("<p>a<span/>b</p>");
        assert_eq!(output, "<p>ab</p>");
    }

    #[test]
    fn clean_directory_missing_dir_is_not_found() {
        let err = clean_directory(Path::new("no/such/dir")).unwrap_err();
        assert!(matches!(err, EpubError::NotFound(_)));
    }
}
