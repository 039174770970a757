//! Arena-backed markup document
//!
//! All elements of a document live in one arena and refer to each other by
//! [`NodeId`]. Handles elsewhere in the crate hold an id plus a shared
//! reference to the document; the document alone owns the tree.

use crate::context::ServerContext;
use crate::error::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;

/// Index of an element in a [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct ElementData {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    removed: bool,
}

impl ElementData {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            removed: false,
        }
    }
}

/// Owned copy of an element subtree, used to move content between documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }
}

/// A markup document: an element arena plus the session context used to
/// read and write neutral values inside it.
///
/// Removed elements stay in the arena, marked dead, until the document is
/// dropped.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<ElementData>,
    root: Option<NodeId>,
    /// The element the document was built around; stays put when the root
    /// is later wrapped in a container
    primary: Option<NodeId>,
    context: Arc<ServerContext>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document using the process-wide default context
    pub fn new() -> Self {
        Self::with_context(ServerContext::default_context())
    }

    pub fn with_context(context: Arc<ServerContext>) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            primary: None,
            context,
        }
    }

    /// Parse markup into a new document
    pub fn parse(xml: &str) -> Result<Self> {
        Self::parse_with_context(xml, ServerContext::default_context())
    }

    pub fn parse_with_context(xml: &str, context: Arc<ServerContext>) -> Result<Self> {
        let mut doc = Self::with_context(context);
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let id = doc.open_element(&start, stack.last().copied())?;
                    stack.push(id);
                }
                Ok(Event::Empty(start)) => {
                    doc.open_element(&start, stack.last().copied())?;
                }
                Ok(Event::End(_)) => {
                    if let Some(id) = stack.pop() {
                        let data = &mut doc.nodes[id.0];
                        if !data.children.is_empty() && data.text.trim().is_empty() {
                            data.text.clear();
                        }
                    }
                }
                Ok(Event::Text(text)) => {
                    if let Some(&id) = stack.last() {
                        let value = text.unescape().map_err(|e| Error::XmlParse(e.to_string()))?;
                        doc.nodes[id.0].text.push_str(&value);
                    }
                }
                Ok(Event::CData(data)) => {
                    if let Some(&id) = stack.last() {
                        let bytes = data.into_inner();
                        doc.nodes[id.0].text.push_str(&String::from_utf8_lossy(&bytes));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::XmlParse(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::XmlParse("unexpected end of input".to_string()));
        }
        if doc.root.is_none() {
            return Err(Error::XmlParse("document has no root element".to_string()));
        }
        Ok(doc)
    }

    fn open_element(&mut self, start: &BytesStart<'_>, parent: Option<NodeId>) -> Result<NodeId> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let id = self.create_element(&name);
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::XmlParse(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::XmlParse(e.to_string()))?
                .into_owned();
            self.nodes[id.0].attributes.push((key, value));
        }
        match parent {
            Some(parent) => self.append(parent, id),
            None if self.root.is_none() => {
                self.root = Some(id);
                self.primary = Some(id);
            }
            None => return Err(Error::XmlParse("multiple root elements".to_string())),
        }
        Ok(id)
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn set_context(&mut self, context: Arc<ServerContext>) {
        self.context = context;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root.filter(|id| !self.nodes[id.0].removed)
    }

    /// Element the document was built around. Equal to the root unless the
    /// root was wrapped.
    pub fn primary(&self) -> Option<NodeId> {
        match self.primary {
            Some(id) => (!self.nodes[id.0].removed).then_some(id),
            None => self.root(),
        }
    }

    /// Replace the root element. The previous root, if any, is left detached.
    pub fn set_root(&mut self, id: NodeId) {
        self.detach(id);
        self.root = Some(id);
        self.primary = Some(id);
    }

    /// Re-home the current root beneath a new container element, which
    /// becomes the root. The primary element is unchanged.
    pub fn wrap_root(&mut self, name: &str) -> Result<NodeId> {
        let old = self
            .root()
            .ok_or_else(|| Error::invalid_operation("cannot wrap an empty document"))?;
        let primary = self.primary;
        let wrapper = self.create_element(name);
        self.detach(old);
        self.append(wrapper, old);
        self.root = Some(wrapper);
        self.primary = primary.or(Some(old));
        Ok(wrapper)
    }

    /// Create a detached element in the arena
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ElementData::new(name));
        id
    }

    /// Whether the element is still part of this document's tree
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| !n.removed)
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Name without any namespace prefix
    pub fn local_name(&self, id: NodeId) -> &str {
        local_name(self.name(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// First child element matching a predicate
    pub fn find_child<F>(&self, id: NodeId, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&Document, NodeId) -> bool,
    {
        self.children(id).iter().copied().find(|&c| pred(self, c))
    }

    pub fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.find_child(id, |doc, c| doc.name(c) == name)
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id.0].text = text.to_string();
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0]
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        &self.nodes[id.0].attributes
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let attrs = &mut self.nodes[id.0].attributes;
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    /// Remove an attribute, returning whether it was present
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> bool {
        let attrs = &mut self.nodes[id.0].attributes;
        let before = attrs.len();
        attrs.retain(|(n, _)| n != name);
        attrs.len() != before
    }

    /// Append `child` as the last child of `parent`, detaching it first
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[child.0].removed = false;
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` directly after `sibling` under the sibling's parent
    pub fn insert_after(&mut self, sibling: NodeId, child: NodeId) -> Result<()> {
        let parent = self
            .parent(sibling)
            .ok_or_else(|| Error::invalid_operation("cannot insert next to a root element"))?;
        self.detach(child);
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == sibling)
            .map_or(self.nodes[parent.0].children.len(), |p| p + 1);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[child.0].removed = false;
        self.nodes[parent.0].children.insert(pos, child);
        Ok(())
    }

    /// Unlink an element from its parent, keeping it alive in the arena
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
    }

    /// Detach an element and mark its whole subtree as removed
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            self.nodes[next.0].removed = true;
            stack.extend(self.nodes[next.0].children.iter().copied());
        }
    }

    /// Remove every child element of `id`
    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.remove(child);
        }
    }

    /// `id` and all its descendants in document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    /// First element in document order whose local name matches
    pub fn find_descendant(&self, local: &str) -> Option<NodeId> {
        let root = self.root()?;
        self.descendants(root)
            .into_iter()
            .find(|&id| self.local_name(id) == local)
    }

    /// Copy a subtree out of the arena
    pub fn extract(&self, id: NodeId) -> Fragment {
        let data = &self.nodes[id.0];
        Fragment {
            name: data.name.clone(),
            attributes: data.attributes.clone(),
            text: data.text.clone(),
            children: data.children.iter().map(|&c| self.extract(c)).collect(),
        }
    }

    /// Instantiate a fragment as a new detached subtree
    pub fn insert_fragment(&mut self, fragment: &Fragment) -> NodeId {
        let id = self.create_element(&fragment.name);
        self.nodes[id.0].attributes = fragment.attributes.clone();
        self.nodes[id.0].text = fragment.text.clone();
        for child in &fragment.children {
            let child_id = self.insert_fragment(child);
            self.append(id, child_id);
        }
        id
    }

    /// Build a standalone document whose root is a copy of the fragment
    pub fn from_fragment(fragment: &Fragment, context: Arc<ServerContext>) -> Self {
        let mut doc = Self::with_context(context);
        let root = doc.insert_fragment(fragment);
        doc.set_root(root);
        doc
    }

    /// Serialize an element and its subtree
    pub fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_element(id, &mut out);
        out
    }

    /// Serialize the whole document (empty when it has no root)
    pub fn to_xml(&self) -> String {
        self.root().map(|r| self.serialize(r)).unwrap_or_default()
    }

    fn write_element(&self, id: NodeId, out: &mut String) {
        let data = &self.nodes[id.0];
        out.push('<');
        out.push_str(&data.name);
        for (name, value) in &data.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if data.text.is_empty() && data.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        out.push_str(&escape(data.text.as_str()));
        for &child in &data.children {
            self.write_element(child, out);
        }
        out.push_str("</");
        out.push_str(&data.name);
        out.push('>');
    }
}

/// Escape text for inclusion in markup
pub fn escape_text(text: &str) -> String {
    escape(text).into_owned()
}

/// Strip a namespace prefix from a qualified name
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
