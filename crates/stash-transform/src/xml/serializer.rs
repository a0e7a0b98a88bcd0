//! Writes a [`Document`] back to XML.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};

use super::tree::{Document, NodeId, NodeKind};
use crate::error::XmlError;

/// Serialize a [`Document`] to XML.
///
/// Whitespace is written exactly as it is stored in the tree; top-level
/// nodes (declaration, DOCTYPE, root element, comments) are separated by
/// newlines.
pub struct XmlSerializer;

impl XmlSerializer {
    /// Create a new serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Write the whole document to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn serialize<W: Write>(&self, document: &Document, out: W) -> Result<(), XmlError> {
        let mut writer = Writer::new(out);
        for &id in document.top_level() {
            write_node(&mut writer, document, id)?;
            writer.get_mut().write_all(b"\n")?;
        }
        writer.get_mut().flush()?;
        Ok(())
    }

    /// Serialize the whole document into a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the serialized bytes are not valid UTF-8.
    pub fn serialize_to_string(&self, document: &Document) -> Result<String, XmlError> {
        let mut out = Vec::new();
        self.serialize(document, &mut out)?;
        into_string(out)
    }
}

impl Default for XmlSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn into_string(bytes: Vec<u8>) -> Result<String, XmlError> {
    String::from_utf8(bytes).map_err(|e| XmlError::Malformed(format!("invalid UTF-8 output: {e}")))
}

/// Serialize a single node recursively.
fn write_node<W: Write>(
    writer: &mut Writer<W>,
    document: &Document,
    id: NodeId,
) -> Result<(), XmlError> {
    match document.kind(id) {
        NodeKind::Element(element) => {
            let mut start = BytesStart::new(element.name.as_str());
            for attr in &element.attributes {
                start.push_attribute((attr.name.as_str(), attr.value.as_str()));
            }

            let children = document.children(id);
            if children.is_empty() {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for &child in children {
                    write_node(writer, document, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
            }
        }
        NodeKind::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
        NodeKind::CData(text) => writer.write_event(Event::CData(BytesCData::new(text)))?,
        NodeKind::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
        }
        NodeKind::ProcessingInstruction(content) => {
            writer.write_event(Event::PI(BytesPI::new(content.as_str())))?;
        }
        NodeKind::Declaration(decl) => {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))?;
        }
        NodeKind::DocType(content) => {
            writer.write_event(Event::DocType(BytesText::from_escaped(content.as_str())))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::xml::parser::XmlParser;
    use crate::xml::tree::{Attribute, Element};

    fn roundtrip(xml: &str) -> String {
        let doc = XmlParser::new().parse_str(xml).unwrap();
        XmlSerializer::new().serialize_to_string(&doc).unwrap()
    }

    #[test]
    fn test_serialize_simple_element() {
        assert_eq!(
            roundtrip("<config><port>80</port></config>"),
            "<config><port>80</port></config>\n"
        );
    }

    #[test]
    fn test_serialize_self_closing() {
        assert_eq!(roundtrip("<root><a></a><b/></root>"), "<root><a/><b/></root>\n");
    }

    #[test]
    fn test_serialize_keeps_whitespace_and_prolog() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- settings -->\n<root>\n  <a x=\"1\"/>\n</root>\n";
        assert_eq!(roundtrip(xml), xml);
    }

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let mut doc = Document::with_root(Element {
            name: "p".to_owned(),
            attributes: vec![Attribute::new("title", "\"quoted\" & more")],
        });
        doc.set_text_content(doc.root(), "a < b & c");

        let xml = XmlSerializer::new().serialize_to_string(&doc).unwrap();

        assert!(xml.contains("a &lt; b &amp; c"), "{xml}");
        assert!(xml.contains("&quot;quoted&quot; &amp; more"), "{xml}");
        assert_eq!(roundtrip(&xml), xml);
    }

    #[test]
    fn test_serialize_cdata_and_doctype() {
        let xml = "<!DOCTYPE root>\n<root><![CDATA[<raw> & stuff]]></root>\n";
        assert_eq!(roundtrip(xml), xml);
    }
}
