//! Locator keys: resolve an XPath 1.0 expression to at most one node.
//!
//! [`PathLocator`] compiles keys with `sxd-xpath` and evaluates them over a
//! mirror of the document built with `sxd-document`. The first selected node
//! in document order is mapped back to a [`Target`] in the arena tree. The
//! mirror covers the root element and everything below it, so prolog and
//! epilog nodes are never selected.
//!
//! Names keep their prefix as written. A prefix declared anywhere in the
//! document with `xmlns:p` is bound for the whole key, so `/p:config` matches
//! `<p:config xmlns:p="urn:x">`. Unprefixed names never carry a namespace,
//! even under a default `xmlns`.

use std::collections::{BTreeMap, HashMap};

use sxd_document::{Package, QName, dom};
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value};

use super::tree::{Document, NodeId, NodeKind};
use crate::error::LocatorError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Node selected by a locator key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Element, text, CDATA, comment or processing instruction node.
    Node(NodeId),
    /// Attribute `name` of `element`.
    Attribute {
        /// Element carrying the attribute.
        element: NodeId,
        /// Attribute name as written.
        name: String,
    },
}

/// Resolve locator keys against a loaded document.
pub trait Locator {
    /// First node in document order matching `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not a valid expression for this locator
    /// or does not select nodes.
    fn find_first(&self, document: &Document, key: &str) -> Result<Option<Target>, LocatorError>;
}

/// XPath 1.0 locator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocator;

impl Locator for PathLocator {
    fn find_first(&self, document: &Document, key: &str) -> Result<Option<Target>, LocatorError> {
        let xpath = Factory::new()
            .build(key)
            .map_err(|e| LocatorError::InvalidExpression {
                expression: key.to_owned(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| LocatorError::InvalidExpression {
                expression: key.to_owned(),
                reason: "empty expression".to_owned(),
            })?;

        let namespaces = prefix_bindings(document);
        let package = Package::new();
        let mirrored = package.as_document();
        let mirror = Mirror::build(&mirrored, document, &namespaces);

        let mut context = Context::new();
        for (prefix, uri) in &namespaces {
            context.set_namespace(prefix, uri);
        }

        let value = xpath
            .evaluate(&context, mirrored.root())
            .map_err(|e| LocatorError::Evaluation {
                expression: key.to_owned(),
                reason: e.to_string(),
            })?;

        match value {
            Value::Nodeset(nodes) => nodes
                .document_order_first()
                .map(|node| mirror.target(key, node))
                .transpose(),
            Value::Boolean(_) => Err(unsupported(key, "a boolean")),
            Value::Number(_) => Err(unsupported(key, "a number")),
            Value::String(_) => Err(unsupported(key, "a string")),
        }
    }
}

fn unsupported(key: &str, found: &str) -> LocatorError {
    LocatorError::UnsupportedResult {
        expression: key.to_owned(),
        found: found.to_owned(),
    }
}

/// `sxd-document` copy of the root element subtree, with the arena target
/// of every mirrored node.
struct Mirror<'d> {
    targets: HashMap<Node<'d>, Target>,
}

impl<'d> Mirror<'d> {
    fn build(
        mirrored: &dom::Document<'d>,
        document: &Document,
        namespaces: &BTreeMap<String, String>,
    ) -> Self {
        let mut mirror = Self {
            targets: HashMap::new(),
        };
        let root = mirror.element(mirrored, document, document.root(), namespaces);
        mirrored.root().append_child(root);
        mirror
    }

    fn element(
        &mut self,
        mirrored: &dom::Document<'d>,
        document: &Document,
        id: NodeId,
        namespaces: &BTreeMap<String, String>,
    ) -> dom::Element<'d> {
        let element = mirrored.create_element(qualified(document.node_name(id), namespaces));
        self.targets.insert(Node::Element(element), Target::Node(id));

        for attr in document.attributes(id) {
            let attribute =
                element.set_attribute_value(qualified(&attr.name, namespaces), &attr.value);
            self.targets.insert(
                Node::Attribute(attribute),
                Target::Attribute {
                    element: id,
                    name: attr.name.clone(),
                },
            );
        }

        for &child in document.children(id) {
            let node = match document.kind(child) {
                NodeKind::Element(_) => {
                    let nested = self.element(mirrored, document, child, namespaces);
                    element.append_child(nested);
                    continue;
                }
                NodeKind::Text(text) | NodeKind::CData(text) => {
                    let text = mirrored.create_text(text);
                    element.append_child(text);
                    Node::Text(text)
                }
                NodeKind::Comment(text) => {
                    let comment = mirrored.create_comment(text);
                    element.append_child(comment);
                    Node::Comment(comment)
                }
                NodeKind::ProcessingInstruction(content) => {
                    let (target, data) = match content.split_once(char::is_whitespace) {
                        Some((target, data)) => (target, Some(data.trim_start())),
                        None => (content.as_str(), None),
                    };
                    let pi = mirrored.create_processing_instruction(target, data);
                    element.append_child(pi);
                    Node::ProcessingInstruction(pi)
                }
                NodeKind::Declaration(_) | NodeKind::DocType(_) => continue,
            };
            self.targets.insert(node, Target::Node(child));
        }

        element
    }

    fn target(&self, key: &str, node: Node<'d>) -> Result<Target, LocatorError> {
        match node {
            Node::Root(_) => Err(unsupported(key, "the document node")),
            Node::Namespace(_) => Err(unsupported(key, "a namespace node")),
            other => self
                .targets
                .get(&other)
                .cloned()
                .ok_or_else(|| unsupported(key, "a node outside the document")),
        }
    }
}

/// Every `xmlns:prefix` declaration in the document, first one winning,
/// plus the predeclared `xml` prefix.
fn prefix_bindings(document: &Document) -> BTreeMap<String, String> {
    let mut namespaces = BTreeMap::from([("xml".to_owned(), XML_NAMESPACE.to_owned())]);
    let mut stack = vec![document.root()];
    while let Some(id) = stack.pop() {
        for attr in document.attributes(id) {
            if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                namespaces
                    .entry(prefix.to_owned())
                    .or_insert_with(|| attr.value.clone());
            }
        }
        stack.extend(document.children(id).iter().rev().copied());
    }
    namespaces
}

fn qualified<'a>(name: &'a str, namespaces: &'a BTreeMap<String, String>) -> QName<'a> {
    name.split_once(':')
        .and_then(|(prefix, local)| {
            namespaces
                .get(prefix)
                .map(|uri| QName::with_namespace_uri(Some(uri.as_str()), local))
        })
        .unwrap_or_else(|| QName::new(name))
}
