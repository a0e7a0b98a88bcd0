//! Arena-backed XML document tree.

/// Handle to a node inside one [`Document`].
///
/// Ids are only meaningful for the document that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified attribute name (prefix kept as written).
    pub name: String,
    /// Unescaped attribute value.
    pub value: String,
}

impl Attribute {
    /// Create an attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Element name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified element name (prefix kept as written).
    pub name: String,
    /// Attributes in document order. Names are unique.
    pub attributes: Vec<Attribute>,
}

/// XML declaration (`<?xml version="1.0" ...?>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// `version` pseudo-attribute.
    pub version: String,
    /// `encoding` pseudo-attribute, if present.
    pub encoding: Option<String>,
    /// `standalone` pseudo-attribute, if present.
    pub standalone: Option<String>,
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with children.
    Element(Element),
    /// Character data (unescaped).
    Text(String),
    /// CDATA section content.
    CData(String),
    /// Comment content.
    Comment(String),
    /// Processing instruction content (`target data`).
    ProcessingInstruction(String),
    /// XML declaration; only found before the root element.
    Declaration(Declaration),
    /// Raw DOCTYPE content; never interpreted.
    DocType(String),
}

impl NodeKind {
    /// DOM-style node name: the element name, or `#text`, `#comment`, etc.
    #[must_use]
    pub fn node_name(&self) -> &str {
        match self {
            Self::Element(element) => &element.name,
            Self::Text(_) => "#text",
            Self::CData(_) => "#cdata-section",
            Self::Comment(_) => "#comment",
            Self::ProcessingInstruction(_) => "#processing-instruction",
            Self::Declaration(_) => "#declaration",
            Self::DocType(_) => "#doctype",
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// XML document: a root element plus the prolog and epilog around it.
///
/// Nodes live in an arena and are addressed by [`NodeId`]. Detached nodes stay
/// in the arena but are no longer reachable from the root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    top_level: Vec<NodeId>,
    root: NodeId,
}

impl Document {
    /// Create a document with an empty root element.
    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        Self::with_root(Element {
            name: root_name.into(),
            attributes: Vec::new(),
        })
    }

    /// Create a document whose root element is `root`.
    #[must_use]
    pub fn with_root(root: Element) -> Self {
        Self::with_prolog(Vec::new(), root)
    }

    /// Create a document with prolog nodes placed before the root element.
    pub(crate) fn with_prolog(prolog: Vec<NodeKind>, root: Element) -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            top_level: Vec::new(),
            root: NodeId(0),
        };
        for kind in prolog {
            document.push_top_level(kind);
        }
        document.root = document.push_top_level(NodeKind::Element(root));
        document
    }

    /// Root element.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Prolog, root element and epilog nodes in document order.
    #[must_use]
    pub fn top_level(&self) -> &[NodeId] {
        &self.top_level
    }

    /// Node payload.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    /// Element payload, if the node is an element.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.data(id).kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// DOM-style node name.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> &str {
        self.data(id).kind.node_name()
    }

    /// Parent node; `None` for top-level and detached nodes.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// Child nodes in document order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    /// Attributes of an element; empty for other node kinds.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id)
            .map_or(&[][..], |element| element.attributes.as_slice())
    }

    /// Concatenated text and CDATA of the node and all its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    /// DOM `textContent` assignment.
    ///
    /// An element loses every child and gains a single text node holding
    /// `text` (none when `text` is empty). Text, CDATA and comment nodes take
    /// `text` as their content; a processing instruction keeps its target and
    /// takes `text` as its data. Prolog nodes are left unchanged.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        match &mut self.data_mut(id).kind {
            NodeKind::Element(_) => {}
            NodeKind::Text(content) | NodeKind::CData(content) | NodeKind::Comment(content) => {
                text.clone_into(content);
                return;
            }
            NodeKind::ProcessingInstruction(content) => {
                let target = content.split_whitespace().next().unwrap_or_default();
                *content = if text.is_empty() {
                    target.to_owned()
                } else {
                    format!("{target} {text}")
                };
                return;
            }
            NodeKind::Declaration(_) | NodeKind::DocType(_) => return,
        }

        let old_children = std::mem::take(&mut self.data_mut(id).children);
        for child in old_children {
            self.data_mut(child).parent = None;
        }
        if !text.is_empty() {
            let text_node = self.alloc(NodeKind::Text(text.to_owned()));
            self.append_child(id, text_node);
        }
    }

    /// Set an attribute on an element, replacing any value it already has.
    ///
    /// New attributes go last. Does nothing for other node kinds.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let NodeKind::Element(element) = &mut self.data_mut(id).kind else {
            return;
        };
        match element.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => value.clone_into(&mut attr.value),
            None => element.attributes.push(Attribute::new(name, value)),
        }
    }

    /// Remove an attribute from an element, returning whether it was present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let NodeKind::Element(element) = &mut self.data_mut(id).kind else {
            return false;
        };
        let before = element.attributes.len();
        element.attributes.retain(|attr| attr.name != name);
        element.attributes.len() != before
    }

    /// Create a detached node.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.alloc(kind)
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A child that is still attached elsewhere is detached first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.push(child);
    }

    /// Detach a node from its parent, returning the former parent.
    ///
    /// Returns `None` without changing anything when the node has no parent,
    /// which is always the case for the root element.
    pub fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.data_mut(id).parent.take()?;
        self.data_mut(parent).children.retain(|&child| child != id);
        Some(parent)
    }

    /// Deep-copy `source_id` from `source` into this document.
    ///
    /// The copy is detached; attach it with [`Document::append_child`].
    pub fn import(&mut self, source: &Document, source_id: NodeId) -> NodeId {
        let copy = self.alloc(source.kind(source_id).clone());
        for &child in source.children(source_id) {
            let child_copy = self.import(source, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Append text to `parent`, merging with a trailing text node.
    pub(crate) fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.data(parent).children.last()
            && let NodeKind::Text(existing) = &mut self.data_mut(last).kind
        {
            existing.push_str(text);
            return;
        }
        let node = self.alloc(NodeKind::Text(text.to_owned()));
        self.append_child(parent, node);
    }

    pub(crate) fn push_top_level(&mut self, kind: NodeKind) -> NodeId {
        let id = self.alloc(kind);
        self.top_level.push(id);
        id
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.data(id).kind {
            NodeKind::Text(text) | NodeKind::CData(text) => out.push_str(text),
            NodeKind::Element(_) => {
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
            _ => {}
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }
}
