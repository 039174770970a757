//! Items: business-object records

use crate::context::ServerContext;
use crate::document::{Document, Fragment};
use crate::error::{Error, Result};
use crate::logical::{Logical, LogicalKind};
use crate::node::{Element, Node};
use crate::property::{self, Property, CONDITION_ATTR};
use crate::relationships::Relationships;
use crate::result::ItemResult;
use crate::value::{new_id, substitute_params, PropertyValue};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub const ITEM_TAG: &str = "Item";
pub const RELATIONSHIPS_TAG: &str = "Relationships";
/// Container synthesized around a bare item when siblings are added
pub const AML_TAG: &str = "AML";

/// Action that creates a new record
pub const ADD_ACTION: &str = "add";

/// A record node: type, id, action, properties and relationships
#[derive(Debug, Clone)]
pub struct Item {
    node: Node,
}

impl Element for Item {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Item {
    pub(crate) fn from_node(node: Node) -> Self {
        Self { node }
    }

    /// Start a new top-level item. An `add` action also receives a fresh id.
    pub fn new(type_name: Option<&str>, action: Option<&str>) -> Self {
        Self::new_with_context(ServerContext::default_context(), type_name, action)
    }

    pub fn new_with_context(context: Arc<ServerContext>, type_name: Option<&str>, action: Option<&str>) -> Self {
        let mut fragment = Fragment::new(ITEM_TAG);
        if let Some(type_name) = type_name {
            fragment.set_attribute("type", type_name);
        }
        if let Some(action) = action {
            fragment.set_attribute("action", action);
            if action == ADD_ACTION {
                fragment.set_attribute("id", &new_id());
            }
        }
        Self::from_fragment(&fragment, context)
    }

    /// A handle that does not exist. Writing to it creates a fresh item.
    pub fn null() -> Self {
        Self::from_node(Node::detached(ITEM_TAG))
    }

    /// Wrap a document whose root is an item
    pub fn from_document(doc: Document) -> Self {
        Self::from_node(Node::root_of(Rc::new(RefCell::new(doc)), ITEM_TAG))
    }

    pub(crate) fn from_fragment(fragment: &Fragment, context: Arc<ServerContext>) -> Self {
        Self::from_document(Document::from_fragment(fragment, context))
    }

    /// Parse markup holding exactly one item
    pub fn from_aml(aml: &str) -> Result<Self> {
        ItemResult::from_aml(aml)?.assert_item(None)
    }

    /// Parse markup after substituting `@0`, `@1`, ... with escaped values
    pub fn from_aml_with(aml: &str, params: &[PropertyValue]) -> Result<Self> {
        let context = ServerContext::default_context();
        Self::from_aml(&substitute_params(aml, params, &context)?)
    }

    pub fn type_name(&self) -> String {
        self.node.attribute("type").as_string("")
    }

    pub fn set_type(&self, type_name: &str) -> Result<()> {
        self.node.attribute("type").set(Some(type_name))
    }

    /// The item's id: the `id` attribute, else an `id` property compared
    /// with the default equality condition
    pub fn id(&self) -> Option<String> {
        if let Some(id) = self.node.attribute("id").value() {
            return Some(id);
        }
        let prop = self.property("id");
        match prop.condition().as_deref() {
            None | Some("eq") => prop.neutral_value().filter(|v| !v.is_empty()),
            Some(_) => None,
        }
    }

    pub fn set_id(&self, id: Option<&str>) -> Result<()> {
        self.node.attribute("id").set(id)
    }

    pub fn action(&self) -> Option<String> {
        self.node.attribute("action").value()
    }

    pub fn set_action(&self, action: Option<&str>) -> Result<()> {
        self.node.attribute("action").set(action)
    }

    pub fn property(&self, name: &str) -> Property {
        property::lookup(&self.node, name, None)
    }

    pub fn property_lang(&self, name: &str, lang: &str) -> Property {
        property::lookup(&self.node, name, Some(lang))
    }

    /// Existing properties, excluding relationships and logical groups
    pub fn properties(&self) -> Vec<Property> {
        self.node
            .elements()
            .into_iter()
            .filter(|n| {
                let name = n.name();
                name != RELATIONSHIPS_TAG && LogicalKind::from_tag(&name).is_none()
            })
            .map(Property::from_node)
            .collect()
    }

    pub fn relationships(&self) -> Relationships {
        Relationships::new(self.clone(), None)
    }

    /// Relationships of a single type. Filtering happens on read.
    pub fn relationships_of(&self, type_name: &str) -> Relationships {
        Relationships::new(self.clone(), Some(type_name.to_string()))
    }

    /// Append a new `and`/`or`/`not` group, creating the item if needed
    pub fn add_logical(&self, kind: LogicalKind) -> Result<Logical> {
        Ok(Logical::from_node(self.node.add_element(kind.tag())?))
    }

    pub fn logicals(&self) -> Vec<Logical> {
        self.node
            .elements()
            .into_iter()
            .filter(|n| LogicalKind::from_tag(&n.name()).is_some())
            .map(Logical::from_node)
            .collect()
    }

    pub fn source_id(&self) -> Option<String> {
        self.property("source_id").value()
    }

    /// Item referenced by the `related_id` property
    pub fn related_item(&self) -> Item {
        self.property("related_id").as_item()
    }

    pub fn keyed_name(&self) -> Option<String> {
        self.property("keyed_name")
            .value()
            .or_else(|| self.property("id").keyed_name())
    }

    pub(crate) fn fragment(&self) -> Option<Fragment> {
        let doc = self.node.doc();
        self.node.resolve_in(&doc).map(|id| doc.extract(id))
    }

    /// Copy the item into a new document with a fresh id and an `add`
    /// action. Relationships are dropped, or kept with fresh ids and `add`
    /// actions one level deep.
    pub fn clone_as_new(&self, with_relationships: bool) -> Item {
        let Some(mut fragment) = self.fragment() else {
            return Item::null();
        };
        renew(&mut fragment);
        if with_relationships {
            for rels in fragment.children.iter_mut().filter(|c| c.name == RELATIONSHIPS_TAG) {
                for rel in rels.children.iter_mut().filter(|c| c.name == ITEM_TAG) {
                    renew(rel);
                }
            }
        } else {
            fragment.children.retain(|c| c.name != RELATIONSHIPS_TAG);
        }
        tracing::debug!(type_name = %self.type_name(), with_relationships, "cloned item");
        Item::from_fragment(&fragment, self.node.context())
    }

    /// Append a copy of `other` after this item's sibling run. A bare item
    /// is first wrapped in a container so it can have siblings.
    pub fn add_sibling(&self, other: &Item) -> Result<Item> {
        let fragment = other
            .fragment()
            .ok_or_else(|| Error::invalid_operation("cannot add a missing item"))?;
        let mut doc = self.node.doc_mut();
        let id = self.node.materialize_in(&mut doc)?;
        if doc.parent(id).is_none() {
            doc.wrap_root(AML_TAG)?;
        }
        let parent = doc
            .parent(id)
            .ok_or_else(|| Error::invalid_operation("item has no container"))?;
        let last = doc
            .children(parent)
            .iter()
            .rev()
            .copied()
            .find(|&c| doc.local_name(c) == ITEM_TAG)
            .unwrap_or(id);
        let added = doc.insert_fragment(&fragment);
        doc.insert_after(last, added)?;
        Ok(Item::from_node(Node::bound(self.node.doc_ref().clone(), added)))
    }

    /// Whether both handles point at the same element
    pub fn is_same_item(&self, other: &Item) -> bool {
        self.node.is_same_node(&other.node)
    }
}

fn renew(fragment: &mut Fragment) {
    let id = new_id();
    fragment.set_attribute("id", &id);
    fragment.set_attribute("action", ADD_ACTION);
    if let Some(prop) = fragment.children.iter_mut().find(|c| c.name == "id") {
        prop.text = id;
        prop.attributes.retain(|(n, _)| n != CONDITION_ATTR);
    }
}
