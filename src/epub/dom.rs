//! Explicit XML tree for markup rewriting.
//!
//! The sanitizer and manifest editor need to remove attributes and splice
//! child nodes, so documents are parsed into an owned tree, rewritten, and
//! serialized back out. Text and attribute values are kept in their raw
//! escaped form and written back verbatim: named entities such as `&nbsp;`
//! that are not part of core XML survive a parse/serialize round trip
//! untouched. The one exception is a literal `"` inside an attribute value
//! (legal in single-quoted source), which must become `&quot;` because the
//! serializer always double-quotes.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use std::borrow::Cow;
use std::io::Cursor;

use crate::error::{EpubError, Result};

/// One node of a parsed XML document.
///
/// Text, comment, CDATA and processing-instruction payloads hold the raw
/// bytes as they appeared in the source (entities still escaped).
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
    Comment(String),
    CData(String),
    ProcessingInstruction(String),
    DocType(String),
}

/// An element with its qualified name, ordered attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Tag name without any namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Value of the first attribute with the given name, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of the first attribute whose local name (prefix stripped)
    /// matches, e.g. `scheme` matching `opf:scheme`.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| match k.rsplit_once(':') {
                Some((_, l)) => l == local,
                None => k == local,
            })
            .map(|(_, v)| v.as_str())
    }

    /// Remove every attribute with the given name. Returns true if any
    /// was removed.
    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        self.attrs.len() != before
    }

    /// Concatenated raw text of this element's direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// The XML declaration, kept so rewritten files start the way they did.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDecl {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// A whole parsed document: optional declaration plus top-level nodes
/// (doctype, comments, exactly one root element for well-formed input).
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub decl: Option<XmlDecl>,
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse a document in strict XML mode.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        let mut buf = Vec::new();

        let mut doc = XmlDocument {
            decl: None,
            nodes: Vec::new(),
        };
        // Open elements; the last entry is the innermost.
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(e) => {
                    let version = String::from_utf8(e.version()?.to_vec())?;
                    let encoding = match e.encoding() {
                        Some(enc) => Some(String::from_utf8(enc?.to_vec())?),
                        None => None,
                    };
                    let standalone = match e.standalone() {
                        Some(st) => Some(String::from_utf8(st?.to_vec())?),
                        None => None,
                    };
                    doc.decl = Some(XmlDecl {
                        version,
                        encoding,
                        standalone,
                    });
                }
                Event::Start(e) => {
                    stack.push(element_from_tag(&e)?);
                }
                Event::Empty(e) => {
                    let element = element_from_tag(&e)?;
                    push_node(&mut doc, &mut stack, XmlNode::Element(element));
                }
                Event::End(_) => {
                    // The reader verifies that end tags match, so popping
                    // the innermost open element is sound.
                    let element = stack.pop().ok_or_else(|| {
                        EpubError::Malformed("unexpected closing tag".into())
                    })?;
                    push_node(&mut doc, &mut stack, XmlNode::Element(element));
                }
                Event::Text(e) => {
                    push_node(&mut doc, &mut stack, XmlNode::Text(raw_string(&e)?));
                }
                Event::CData(e) => {
                    let text = String::from_utf8(e.to_vec())?;
                    push_node(&mut doc, &mut stack, XmlNode::CData(text));
                }
                Event::Comment(e) => {
                    push_node(&mut doc, &mut stack, XmlNode::Comment(raw_string(&e)?));
                }
                Event::DocType(e) => {
                    push_node(&mut doc, &mut stack, XmlNode::DocType(raw_string(&e)?));
                }
                Event::PI(e) => {
                    push_node(
                        &mut doc,
                        &mut stack,
                        XmlNode::ProcessingInstruction(raw_string(&e)?),
                    );
                }
                Event::Eof => break,
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(EpubError::Malformed("unclosed element".into()));
        }

        Ok(doc)
    }

    /// Serialize the tree back to XML text.
    ///
    /// Elements without children are written self-closing, which is the
    /// normal form for XHTML served to EPUB readers.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        if let Some(decl) = &self.decl {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))?;
        }

        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }

        let bytes = writer.into_inner().into_inner();
        Ok(String::from_utf8(bytes)?)
    }

    /// The root element, if the document has one.
    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// Mutable access to the root element.
    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }
}

fn raw_string(text: &BytesText) -> Result<String> {
    Ok(String::from_utf8(text.to_vec())?)
}

fn element_from_tag(tag: &BytesStart) -> Result<Element> {
    let name = String::from_utf8(tag.name().as_ref().to_vec())?;
    let mut element = Element::new(name);

    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        // Keep the raw escaped value; it is written back verbatim.
        let value = String::from_utf8(attr.value.to_vec())?;
        element.attrs.push((key, value));
    }

    Ok(element)
}

fn push_node(doc: &mut XmlDocument, stack: &mut Vec<Element>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => doc.nodes.push(node),
    }
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &XmlNode) -> Result<()> {
    match node {
        XmlNode::Element(el) => {
            let mut tag = BytesStart::new(el.name.as_str());
            for (key, value) in &el.attrs {
                // Values are stored raw; bypass the writer's escaping.
                // A single-quoted source attribute may carry a literal `"`,
                // which would break the double quotes the writer emits.
                let value: Cow<[u8]> = if value.contains('"') {
                    Cow::Owned(value.replace('"', "&quot;").into_bytes())
                } else {
                    Cow::Borrowed(value.as_bytes())
                };
                tag.push_attribute(Attribute {
                    key: QName(key.as_bytes()),
                    value,
                });
            }

            if el.children.is_empty() {
                writer.write_event(Event::Empty(tag))?;
            } else {
                writer.write_event(Event::Start(tag))?;
                for child in &el.children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
            }
        }
        XmlNode::Text(text) => {
            writer.write_event(Event::Text(BytesText::from_escaped(text.as_str())))?;
        }
        XmlNode::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
        }
        XmlNode::CData(text) => {
            writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
        }
        XmlNode::ProcessingInstruction(text) => {
            writer.write_event(Event::PI(BytesText::from_escaped(text.as_str())))?;
        }
        XmlNode::DocType(text) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(text.as_str())))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_with_attributes() {
        let doc = XmlDocument::parse(
            br#"<html><body class="main"><p>Hello <b>world</b></p></body></html>"#,
        )
        .unwrap();

        let html = doc.root().unwrap();
        assert_eq!(html.name, "html");
        let XmlNode::Element(body) = &html.children[0] else {
            panic!("expected element");
        };
        assert_eq!(body.attr("class"), Some("main"));
        let XmlNode::Element(p) = &body.children[0] else {
            panic!("expected element");
        };
        assert_eq!(p.text(), "Hello ");
    }

    #[test]
    fn round_trips_declaration_and_doctype() {
        let input = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!DOCTYPE html>\n<html><head><title>t</title></head><body><p>x</p></body></html>";
        let doc = XmlDocument::parse(input.as_bytes()).unwrap();
        let output = doc.to_xml_string().unwrap();

        assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(output.contains("<!DOCTYPE html>"));
        assert!(output.contains("<title>t</title>"));
    }

    #[test]
    fn preserves_named_entities_verbatim() {
        let input = "<p>Tom &amp; Jerry&nbsp;&#233;</p>";
        let doc = XmlDocument::parse(input.as_bytes()).unwrap();
        assert_eq!(doc.to_xml_string().unwrap(), input);
    }

    #[test]
    fn preserves_attribute_order_and_raw_values() {
        let input = r#"<a href="x.html" title="Tom &amp; Jerry" id="l1"/>"#;
        let doc = XmlDocument::parse(input.as_bytes()).unwrap();
        assert_eq!(doc.to_xml_string().unwrap(), input);
    }

    #[test]
    fn single_quoted_attribute_with_double_quote_stays_well_formed() {
        let doc = XmlDocument::parse(br#"<p title='He said "hi"'>x</p>"#).unwrap();
        let output = doc.to_xml_string().unwrap();

        assert_eq!(output, r#"<p title="He said &quot;hi&quot;">x</p>"#);

        // The serialized form must parse again and keep the value.
        let reparsed = XmlDocument::parse(output.as_bytes()).unwrap();
        assert_eq!(
            reparsed.root().unwrap().attr("title"),
            Some("He said &quot;hi&quot;")
        );
    }

    #[test]
    fn childless_element_serializes_self_closing() {
        let doc = XmlDocument::parse(b"<div><br/></div>").unwrap();
        assert_eq!(doc.to_xml_string().unwrap(), "<div><br/></div>");
    }

    #[test]
    fn rejects_mismatched_tags() {
        assert!(XmlDocument::parse(b"<a><b></a></b>").is_err());
    }

    #[test]
    fn local_name_strips_prefix() {
        let doc = XmlDocument::parse(br#"<dc:identifier opf:scheme="ISBN">x</dc:identifier>"#)
            .unwrap();
        let el = doc.root().unwrap();
        assert_eq!(el.local_name(), "identifier");
        assert_eq!(el.attr_local("scheme"), Some("ISBN"));
    }
}
