//! Relationship collections under an item

use crate::document::Fragment;
use crate::error::{Error, Result};
use crate::item::{Item, AML_TAG, ITEM_TAG, RELATIONSHIPS_TAG};
use crate::node::{Element, Node};
use crate::result::ItemResult;

/// Content accepted by [`Relationships::add`]
#[derive(Debug, Clone)]
pub enum RelationshipContent {
    Item(Item),
    Many(Vec<RelationshipContent>),
    /// Raw markup holding one or more items
    Markup(String),
    /// Plain text; never valid as a relationship
    Scalar(String),
}

impl From<Item> for RelationshipContent {
    fn from(value: Item) -> Self {
        RelationshipContent::Item(value)
    }
}

impl From<&Item> for RelationshipContent {
    fn from(value: &Item) -> Self {
        RelationshipContent::Item(value.clone())
    }
}

impl From<Vec<Item>> for RelationshipContent {
    fn from(value: Vec<Item>) -> Self {
        RelationshipContent::Many(value.into_iter().map(RelationshipContent::Item).collect())
    }
}

impl From<Vec<RelationshipContent>> for RelationshipContent {
    fn from(value: Vec<RelationshipContent>) -> Self {
        RelationshipContent::Many(value)
    }
}

/// Ordered view over the items in an item's `Relationships` container,
/// optionally narrowed to one type
#[derive(Debug, Clone)]
pub struct Relationships {
    owner: Item,
    type_filter: Option<String>,
}

impl Relationships {
    pub(crate) fn new(owner: Item, type_filter: Option<String>) -> Self {
        Self { owner, type_filter }
    }

    fn container(&self) -> Node {
        self.owner.node().element(RELATIONSHIPS_TAG)
    }

    pub fn type_filter(&self) -> Option<&str> {
        self.type_filter.as_deref()
    }

    /// Whether the container element exists
    pub fn exists(&self) -> bool {
        self.container().exists()
    }

    pub fn items(&self) -> Vec<Item> {
        self.container()
            .elements()
            .into_iter()
            .filter(|n| n.name() == ITEM_TAG)
            .map(Item::from_node)
            .filter(|item| match &self.type_filter {
                Some(t) => item.type_name() == *t,
                None => true,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Import items into the container, creating it on first use. Returns
    /// handles to the imported copies.
    pub fn add<C: Into<RelationshipContent>>(&self, content: C) -> Result<Vec<Item>> {
        let mut fragments = Vec::new();
        collect_fragments(content.into(), &mut fragments)?;

        let container = self.container();
        let mut doc = container.doc_mut();
        let parent = container.materialize_in(&mut doc)?;
        let mut added = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            let id = doc.insert_fragment(fragment);
            doc.append(parent, id);
            added.push(Item::from_node(Node::bound(container.doc_ref().clone(), id)));
        }
        Ok(added)
    }

    /// Detach the first relationship that is `item` or has its id.
    /// Returns whether anything was removed.
    pub fn remove(&self, item: &Item) -> bool {
        let id = item.id();
        let found = self.items().into_iter().find(|rel| {
            rel.is_same_item(item) || (id.is_some() && rel.id() == id)
        });
        match found {
            Some(rel) => {
                rel.remove();
                true
            }
            None => false,
        }
    }
}

/// Parse relationship markup. A run of sibling items without a common
/// container is read inside a synthesized one.
fn parse_markup(aml: &str) -> Result<ItemResult> {
    match ItemResult::from_aml(aml) {
        Err(Error::XmlParse(first)) => ItemResult::from_aml(&format!("<{0}>{1}</{0}>", AML_TAG, aml))
            .map_err(|_| Error::XmlParse(first)),
        other => other,
    }
}

fn collect_fragments(content: RelationshipContent, out: &mut Vec<Fragment>) -> Result<()> {
    match content {
        RelationshipContent::Item(item) => {
            let fragment = item
                .fragment()
                .ok_or_else(|| Error::invalid_operation("cannot add a missing item as a relationship"))?;
            out.push(fragment);
        }
        RelationshipContent::Many(parts) => {
            for part in parts {
                collect_fragments(part, out)?;
            }
        }
        RelationshipContent::Markup(aml) => {
            for item in parse_markup(&aml)?.assert_items()? {
                collect_fragments(RelationshipContent::Item(item), out)?;
            }
        }
        RelationshipContent::Scalar(text) => {
            return Err(Error::unsupported(format!(
                "relationships only hold items, not '{}'",
                text
            )))
        }
    }
    Ok(())
}
