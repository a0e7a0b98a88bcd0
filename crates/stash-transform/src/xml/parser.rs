//! XML reader building a [`Document`] tree.
//!
//! Entities are never loaded from outside the input. References resolve to
//! the five predefined entities, numeric character references, or general
//! entities declared with a quoted literal in the DOCTYPE internal subset.
//! `SYSTEM` and `PUBLIC` entities are recorded but a reference to one makes
//! the document malformed, and external DTDs are never fetched. Replacement
//! text is inserted as character data; markup inside it is not parsed.
//!
//! DOCTYPE content is kept verbatim for serialization.

#![allow(clippy::unused_self)] // Unit struct methods have &self for API consistency

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::reader::Reader;

use super::tree::{Attribute, Declaration, Document, Element, NodeId, NodeKind};
use crate::error::XmlError;

/// Deepest chain of entities referencing other entities.
const MAX_ENTITY_DEPTH: usize = 8;

/// Largest replacement text a single reference may expand to.
const MAX_ENTITY_EXPANSION: usize = 1 << 20;

/// Name of the synthetic root wrapped around content fragments.
pub const FRAGMENT_WRAPPER: &str = "wrapper";

/// Parse XML into a [`Document`].
pub struct XmlParser;

impl XmlParser {
    /// Create a new parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse a complete document from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not well-formed XML.
    pub fn parse<R: BufRead>(&self, input: R) -> Result<Document, XmlError> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut builder = TreeBuilder::default();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let element = self.decode_element(&reader, &e)?;
                    builder.open(element)?;
                }
                Event::Empty(e) => {
                    let element = self.decode_element(&reader, &e)?;
                    builder.open(element)?;
                    builder.close()?;
                }
                Event::End(_) => builder.close()?,
                Event::Text(e) => {
                    let text = reader.decoder().decode(&e)?;
                    builder.text(&text)?;
                }
                Event::GeneralRef(e) => {
                    let entity = reader.decoder().decode(&e)?;
                    let text = builder.entities.resolve(&entity)?;
                    builder.text(&text)?;
                }
                Event::CData(e) => {
                    let text = reader.decoder().decode(&e)?.into_owned();
                    builder.leaf(NodeKind::CData(text));
                }
                Event::Comment(e) => {
                    let text = reader.decoder().decode(&e)?.into_owned();
                    builder.leaf(NodeKind::Comment(text));
                }
                Event::PI(e) => {
                    let content = reader.decoder().decode(&e)?.into_owned();
                    builder.leaf(NodeKind::ProcessingInstruction(content));
                }
                Event::Decl(e) => {
                    let declaration = self.decode_declaration(&reader, &e)?;
                    builder.prolog(NodeKind::Declaration(declaration))?;
                }
                Event::DocType(e) => {
                    let content = reader.decoder().decode(&e)?.into_owned();
                    builder.entities.declare(&content);
                    builder.prolog(NodeKind::DocType(content))?;
                }
                Event::Eof => break,
            }
            buf.clear();
        }

        builder.finish()
    }

    /// Parse a complete document held in a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not well-formed XML.
    pub fn parse_str(&self, xml: &str) -> Result<Document, XmlError> {
        self.parse(xml.as_bytes())
    }

    /// Parse a content fragment (any number of sibling nodes).
    ///
    /// The fragment is wrapped in a synthetic root element, whose children are
    /// the fragment's top-level nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the wrapped fragment is not well-formed XML.
    pub fn parse_fragment(&self, fragment: &str) -> Result<Document, XmlError> {
        let wrapped = format!("<{FRAGMENT_WRAPPER}>{fragment}</{FRAGMENT_WRAPPER}>");
        self.parse_str(&wrapped)
    }

    fn decode_element<R>(&self, reader: &Reader<R>, e: &BytesStart) -> Result<Element, XmlError> {
        let name = reader.decoder().decode(e.name().as_ref())?.into_owned();

        let mut attributes: Vec<Attribute> = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = reader.decoder().decode(attr.key.as_ref())?.into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push(Attribute::new(key, value));
        }

        Ok(Element { name, attributes })
    }

    fn decode_declaration<R>(
        &self,
        reader: &Reader<R>,
        e: &BytesDecl,
    ) -> Result<Declaration, XmlError> {
        let version = reader.decoder().decode(&e.version()?)?.into_owned();
        let encoding = match e.encoding() {
            Some(value) => Some(reader.decoder().decode(&value?)?.into_owned()),
            None => None,
        };
        let standalone = match e.standalone() {
            Some(value) => Some(reader.decoder().decode(&value?)?.into_owned()),
            None => None,
        };
        Ok(Declaration {
            version,
            encoding,
            standalone,
        })
    }
}

impl Default for XmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental document construction from reader events.
#[derive(Default)]
struct TreeBuilder {
    entities: Entities,
    prolog: Vec<NodeKind>,
    document: Option<Document>,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn open(&mut self, element: Element) -> Result<(), XmlError> {
        let parent = self.open.last().copied();
        let id = if let Some(document) = self.document.as_mut() {
            let Some(parent) = parent else {
                return Err(XmlError::Malformed(format!(
                    "unexpected element <{}> after the root element",
                    element.name
                )));
            };
            let id = document.create_node(NodeKind::Element(element));
            document.append_child(parent, id);
            id
        } else {
            let document = Document::with_prolog(std::mem::take(&mut self.prolog), element);
            let root = document.root();
            self.document = Some(document);
            root
        };
        self.open.push(id);
        Ok(())
    }

    fn close(&mut self) -> Result<(), XmlError> {
        self.open
            .pop()
            .map(|_| ())
            .ok_or_else(|| XmlError::Malformed("unexpected end tag".to_owned()))
    }

    fn text(&mut self, text: &str) -> Result<(), XmlError> {
        match (&mut self.document, self.open.last()) {
            (Some(document), Some(&parent)) => {
                document.append_text(parent, text);
                Ok(())
            }
            _ if text.trim().is_empty() => Ok(()),
            _ => Err(XmlError::Malformed(
                "text content outside the root element".to_owned(),
            )),
        }
    }

    fn leaf(&mut self, kind: NodeKind) {
        match (&mut self.document, self.open.last()) {
            (Some(document), Some(&parent)) => {
                let id = document.create_node(kind);
                document.append_child(parent, id);
            }
            (Some(document), None) => {
                document.push_top_level(kind);
            }
            (None, _) => self.prolog.push(kind),
        }
    }

    fn prolog(&mut self, kind: NodeKind) -> Result<(), XmlError> {
        if self.document.is_some() {
            return Err(XmlError::Malformed(format!(
                "{} after the root element",
                kind.node_name()
            )));
        }
        self.prolog.push(kind);
        Ok(())
    }

    fn finish(self) -> Result<Document, XmlError> {
        let document = self
            .document
            .ok_or_else(|| XmlError::Malformed("no root element".to_owned()))?;
        if let Some(&unclosed) = self.open.last() {
            return Err(XmlError::Malformed(format!(
                "unclosed element <{}>",
                document.node_name(unclosed)
            )));
        }
        Ok(document)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EntityDecl {
    /// Replacement text from a quoted literal.
    Internal(String),
    /// `SYSTEM` or `PUBLIC` entity.
    External,
}

/// General entities declared in the DOCTYPE internal subset.
#[derive(Debug, Default)]
struct Entities {
    declared: HashMap<String, EntityDecl>,
}

impl Entities {
    /// Record every `<!ENTITY name ...>` in DOCTYPE content.
    ///
    /// Parameter entities are skipped. The first declaration of a name binds.
    fn declare(&mut self, doctype: &str) {
        const KEYWORD: &str = "<!ENTITY";

        let mut rest = doctype;
        while let Some(start) = rest.find(KEYWORD) {
            rest = rest[start + KEYWORD.len()..].trim_start();
            if rest.starts_with('%') {
                continue;
            }
            let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let name = &rest[..name_end];
            rest = rest[name_end..].trim_start();

            let decl = match rest.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let literal = &rest[1..];
                    let Some(end) = literal.find(quote) else {
                        break;
                    };
                    rest = &literal[end + 1..];
                    EntityDecl::Internal(literal[..end].to_owned())
                }
                _ => EntityDecl::External,
            };
            tracing::trace!(entity = name, ?decl, "Declared entity");
            self.declared.entry(name.to_owned()).or_insert(decl);
        }
    }

    /// Replacement text for `&name;`.
    fn resolve(&self, name: &str) -> Result<String, XmlError> {
        self.expand(name, 0)
    }

    fn expand(&self, name: &str, depth: usize) -> Result<String, XmlError> {
        if let Some(c) = predefined(name) {
            return Ok(c.to_string());
        }
        let text = match self.declared.get(name) {
            Some(EntityDecl::Internal(text)) => text,
            Some(EntityDecl::External) => {
                return Err(XmlError::Malformed(format!(
                    "external entity &{name}; is not loaded"
                )));
            }
            None => {
                return Err(XmlError::Malformed(format!("undeclared entity &{name};")));
            }
        };
        if depth >= MAX_ENTITY_DEPTH {
            return Err(XmlError::Malformed(format!(
                "entity &{name}; nests too deeply"
            )));
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text.as_str();
        while let Some(start) = rest.find('&') {
            out.push_str(&rest[..start]);
            let reference = &rest[start + 1..];
            let end = reference.find(';').ok_or_else(|| {
                XmlError::Malformed(format!("unterminated reference in entity &{name};"))
            })?;
            out.push_str(&self.expand(&reference[..end], depth + 1)?);
            if out.len() > MAX_ENTITY_EXPANSION {
                return Err(XmlError::Malformed(format!(
                    "entity &{name}; expands beyond {MAX_ENTITY_EXPANSION} bytes"
                )));
            }
            rest = &reference[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// Predefined entity or numeric character reference.
fn predefined(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        s => s.strip_prefix('#').and_then(|code| {
            let code = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
        }),
    }
}
