//! Node handles over a shared document
//!
//! A [`Node`] is a cheap handle: a shared reference to the owning
//! [`Document`] plus an anchor describing where the element is, or where it
//! would be. Reads never create anything. Writes materialize the element
//! (and every missing ancestor) first.

use crate::attribute::Attribute;
use crate::context::ServerContext;
use crate::document::{Document, NodeId};
use crate::error::{Error, Result};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

pub(crate) type DocRef = Rc<RefCell<Document>>;

/// Attribute carrying the language of a multilingual element
pub const XML_LANG: &str = "xml:lang";
/// Namespace prefix of multilingual property elements
pub const I18N_PREFIX: &str = "i18n";
/// Namespace of multilingual property elements
pub const I18N_NAMESPACE: &str = "http://www.aras.com/I18N";

/// How a lazily resolved element is recognized among its siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementMatch {
    pub name: String,
    pub lang: Option<String>,
}

impl ElementMatch {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            lang: None,
        }
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        doc.name(id) == self.name
            && match &self.lang {
                Some(lang) => doc.attribute(id, XML_LANG) == Some(lang.as_str()),
                None => true,
            }
    }
}

#[derive(Clone)]
enum Anchor {
    /// An element already in the arena
    Bound(NodeId),
    /// The document's primary element, created on first write
    Root(String),
    /// A child of another node, found or created on demand
    Child(Rc<(Node, ElementMatch)>),
}

/// Handle to an element that may or may not exist yet
#[derive(Clone)]
pub struct Node {
    doc: DocRef,
    anchor: Anchor,
}

impl Node {
    pub(crate) fn bound(doc: DocRef, id: NodeId) -> Self {
        Self {
            doc,
            anchor: Anchor::Bound(id),
        }
    }

    /// Root of `doc`; does not exist until written to if the document is empty
    pub(crate) fn root_of(doc: DocRef, name: &str) -> Self {
        Self {
            doc,
            anchor: Anchor::Root(name.to_string()),
        }
    }

    /// A non-existent element in a fresh, empty document
    pub fn detached(name: &str) -> Self {
        Self::root_of(Rc::new(RefCell::new(Document::new())), name)
    }

    /// Wrap a whole document, anchored at its root element
    pub fn from_document(doc: Document) -> Self {
        let name = doc.root().map(|r| doc.name(r).to_string()).unwrap_or_default();
        Self::root_of(Rc::new(RefCell::new(doc)), &name)
    }

    pub(crate) fn lazy_child(&self, matcher: ElementMatch) -> Node {
        Node {
            doc: Rc::clone(&self.doc),
            anchor: Anchor::Child(Rc::new((self.clone(), matcher))),
        }
    }

    pub(crate) fn doc(&self) -> Ref<'_, Document> {
        self.doc.borrow()
    }

    pub(crate) fn doc_mut(&self) -> RefMut<'_, Document> {
        self.doc.borrow_mut()
    }

    pub(crate) fn doc_ref(&self) -> &DocRef {
        &self.doc
    }

    pub(crate) fn same_document(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.doc, &other.doc)
    }

    /// Context of the owning document
    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(self.doc().context())
    }

    pub(crate) fn resolve_in(&self, doc: &Document) -> Option<NodeId> {
        match &self.anchor {
            Anchor::Bound(id) => doc.is_live(*id).then_some(*id),
            Anchor::Root(_) => doc.primary(),
            Anchor::Child(link) => {
                let (parent, matcher) = link.as_ref();
                let parent_id = parent.resolve_in(doc)?;
                doc.find_child(parent_id, |d, c| matcher.matches(d, c))
            }
        }
    }

    /// Arena id of the element, if it exists
    pub(crate) fn id(&self) -> Option<NodeId> {
        self.resolve_in(&self.doc())
    }

    pub(crate) fn materialize_in(&self, doc: &mut Document) -> Result<NodeId> {
        match &self.anchor {
            Anchor::Bound(id) => {
                if doc.is_live(*id) {
                    Ok(*id)
                } else {
                    Err(Error::invalid_operation("element was removed from its document"))
                }
            }
            Anchor::Root(name) => match doc.primary() {
                Some(root) => Ok(root),
                None => {
                    let root = doc.create_element(name);
                    doc.set_root(root);
                    Ok(root)
                }
            },
            Anchor::Child(link) => {
                let (parent, matcher) = link.as_ref();
                let parent_id = parent.materialize_in(doc)?;
                if let Some(found) = doc.find_child(parent_id, |d, c| matcher.matches(d, c)) {
                    return Ok(found);
                }
                let id = doc.create_element(&matcher.name);
                if let Some(lang) = &matcher.lang {
                    doc.set_attribute(id, XML_LANG, lang);
                    if matcher.name.starts_with(&format!("{}:", I18N_PREFIX)) {
                        doc.set_attribute(id, &format!("xmlns:{}", I18N_PREFIX), I18N_NAMESPACE);
                    }
                }
                doc.append(parent_id, id);
                Ok(id)
            }
        }
    }

    /// Create the element (and any missing ancestors) if absent
    pub fn materialize(&self) -> Result<NodeId> {
        let mut doc = self.doc_mut();
        self.materialize_in(&mut doc)
    }

    pub fn exists(&self) -> bool {
        self.id().is_some()
    }

    /// Element name; for a missing element, the name it would be created with
    pub fn name(&self) -> String {
        let doc = self.doc();
        match self.resolve_in(&doc) {
            Some(id) => doc.name(id).to_string(),
            None => match &self.anchor {
                Anchor::Bound(id) => doc.name(*id).to_string(),
                Anchor::Root(name) => name.clone(),
                Anchor::Child(link) => link.1.name.clone(),
            },
        }
    }

    /// Parent element, if this element exists and is not the root
    pub fn parent(&self) -> Option<Node> {
        let doc = self.doc();
        let id = self.resolve_in(&doc)?;
        let parent = doc.parent(id)?;
        Some(Node::bound(Rc::clone(&self.doc), parent))
    }

    pub fn attribute(&self, name: &str) -> Attribute {
        Attribute::new(self.clone(), name)
    }

    /// All attributes in document order; empty for a missing element
    pub fn attributes(&self) -> Vec<(String, String)> {
        let doc = self.doc();
        self.resolve_in(&doc)
            .map(|id| doc.attributes(id).to_vec())
            .unwrap_or_default()
    }

    /// Lazy handle to the first child element with this name
    pub fn element(&self, name: &str) -> Node {
        self.lazy_child(ElementMatch::named(name))
    }

    /// Existing child elements in order
    pub fn elements(&self) -> Vec<Node> {
        let doc = self.doc();
        match self.resolve_in(&doc) {
            Some(id) => doc
                .children(id)
                .iter()
                .map(|&c| Node::bound(Rc::clone(&self.doc), c))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Own text content, `None` when the element is missing
    pub fn text(&self) -> Option<String> {
        let doc = self.doc();
        self.resolve_in(&doc).map(|id| doc.text(id).to_string())
    }

    /// Write the element's text; `None` removes the element
    pub fn set_text(&self, text: Option<&str>) -> Result<()> {
        match text {
            Some(text) => {
                let mut doc = self.doc_mut();
                let id = self.materialize_in(&mut doc)?;
                doc.set_text(id, text);
                Ok(())
            }
            None => {
                self.remove();
                Ok(())
            }
        }
    }

    /// Append a new child element, always creating it
    pub fn add_element(&self, name: &str) -> Result<Node> {
        let mut doc = self.doc_mut();
        let parent = self.materialize_in(&mut doc)?;
        let id = doc.create_element(name);
        doc.append(parent, id);
        Ok(Node::bound(Rc::clone(&self.doc), id))
    }

    /// Detach the element from its tree. No-op when it does not exist.
    pub fn remove(&self) {
        let mut doc = self.doc_mut();
        if let Some(id) = self.resolve_in(&doc) {
            doc.remove(id);
        }
    }

    /// Serialize the element verbatim; empty when it does not exist
    pub fn to_aml(&self) -> String {
        let doc = self.doc();
        self.resolve_in(&doc)
            .map(|id| doc.serialize(id))
            .unwrap_or_default()
    }

    /// Whether two handles resolve to the same element of the same document
    pub fn is_same_node(&self, other: &Node) -> bool {
        if !self.same_document(other) {
            return false;
        }
        let doc = self.doc();
        match (self.resolve_in(&doc), other.resolve_in(&doc)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name())
            .field("exists", &self.exists())
            .finish()
    }
}

/// Behavior shared by every node-backed handle
pub trait Element {
    fn node(&self) -> &Node;

    fn exists(&self) -> bool {
        self.node().exists()
    }

    fn name(&self) -> String {
        self.node().name()
    }

    fn attribute(&self, name: &str) -> Attribute {
        self.node().attribute(name)
    }

    fn remove(&self) {
        self.node().remove()
    }

    fn to_aml(&self) -> String {
        self.node().to_aml()
    }
}

impl Element for Node {
    fn node(&self) -> &Node {
        self
    }
}
