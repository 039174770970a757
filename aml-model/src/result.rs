//! Response envelopes: items, scalars and faults
//!
//! An [`ItemResult`] wraps the document returned for a request. Nothing is
//! thrown on construction; faults surface only when a caller asserts
//! success.

use crate::context::ServerContext;
use crate::document::{Document, Fragment, NodeId};
use crate::error::{Error, FaultInfo, Result};
use crate::item::{Item, AML_TAG, ITEM_TAG};
use crate::node::{Element, Node};
use std::sync::Arc;

pub const RESULT_TAG: &str = "Result";
pub const FAULT_TAG: &str = "Fault";
pub const MESSAGE_TAG: &str = "Message";
pub const BODY_TAG: &str = "Body";
pub const SOAP_ENVELOPE: &str = "SOAP-ENV:Envelope";
pub const SOAP_BODY: &str = "SOAP-ENV:Body";
pub const SOAP_FAULT: &str = "SOAP-ENV:Fault";
pub const SOAP_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

const FAULT_CODE: &str = "faultcode";
const FAULT_STRING: &str = "faultstring";
const FAULT_DETAIL: &str = "detail";
const FAULT_ACTOR: &str = "faultactor";

/// Handle to a fault envelope. Every field reads as an empty string when
/// absent.
#[derive(Debug, Clone)]
pub struct Fault {
    node: Node,
}

impl Element for Fault {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Fault {
    fn field(&self, name: &str) -> String {
        self.node.element(name).text().unwrap_or_default()
    }

    fn set_field(&self, name: &str, value: &str) -> Result<()> {
        self.node.element(name).set_text(Some(value))
    }

    pub fn code(&self) -> String {
        self.field(FAULT_CODE)
    }

    pub fn set_code(&self, code: &str) -> Result<()> {
        self.set_field(FAULT_CODE, code)
    }

    pub fn message(&self) -> String {
        self.field(FAULT_STRING)
    }

    pub fn set_message(&self, message: &str) -> Result<()> {
        self.set_field(FAULT_STRING, message)
    }

    /// Detail text; falls back to the first nested detail element
    pub fn detail(&self) -> String {
        let detail = self.node.element(FAULT_DETAIL);
        match detail.text() {
            Some(text) if !text.is_empty() => text,
            Some(_) => detail
                .elements()
                .first()
                .and_then(Node::text)
                .unwrap_or_default(),
            None => String::new(),
        }
    }

    pub fn set_detail(&self, detail: &str) -> Result<()> {
        self.set_field(FAULT_DETAIL, detail)
    }

    pub fn source(&self) -> String {
        self.field(FAULT_ACTOR)
    }

    pub fn set_source(&self, source: &str) -> Result<()> {
        self.set_field(FAULT_ACTOR, source)
    }

    /// The distinguished "no items found" fault
    pub fn is_no_items(&self) -> bool {
        self.code() == FaultInfo::NO_ITEMS_CODE
    }

    pub fn info(&self) -> FaultInfo {
        FaultInfo {
            code: self.code(),
            message: self.message(),
            detail: self.detail(),
            source: self.source(),
        }
    }
}

/// How many items a response holds, or the fault it carries
#[derive(Debug, Clone)]
pub enum Cardinality {
    Empty,
    One(Item),
    Many(Vec<Item>),
    Fault(Fault),
}

/// A response document
#[derive(Debug, Clone)]
pub struct ItemResult {
    node: Node,
}

impl Element for ItemResult {
    fn node(&self) -> &Node {
        &self.node
    }

    fn to_aml(&self) -> String {
        self.node.doc().to_xml()
    }
}

impl ItemResult {
    pub fn from_document(doc: Document) -> Self {
        Self {
            node: Node::from_document(doc),
        }
    }

    pub fn from_aml(aml: &str) -> Result<Self> {
        Ok(Self::from_document(Document::parse(aml)?))
    }

    pub fn from_aml_with_context(aml: &str, context: Arc<ServerContext>) -> Result<Self> {
        Ok(Self::from_document(Document::parse_with_context(aml, context)?))
    }

    /// Collect copies of items under a new `Result` element
    pub fn from_items<I: IntoIterator<Item = Item>>(items: I) -> Self {
        let mut context = None;
        let mut root = Fragment::new(RESULT_TAG);
        for item in items {
            if let Some(fragment) = item.fragment() {
                context.get_or_insert_with(|| item.node().context());
                root.children.push(fragment);
            }
        }
        let context = context.unwrap_or_else(ServerContext::default_context);
        Self::from_document(Document::from_fragment(&root, context))
    }

    /// A scalar result
    pub fn from_value(value: &str) -> Self {
        let mut root = Fragment::new(RESULT_TAG);
        root.text = value.to_string();
        Self::from_document(Document::from_fragment(&root, ServerContext::default_context()))
    }

    /// A fault envelope with the given code and message
    pub fn from_fault(code: &str, message: &str) -> Self {
        let field = |name: &str, text: &str| {
            let mut f = Fragment::new(name);
            f.text = text.to_string();
            f
        };
        let mut fault = Fragment::new(SOAP_FAULT);
        fault.children.push(field(FAULT_CODE, code));
        fault.children.push(field(FAULT_STRING, message));
        let mut body = Fragment::new(SOAP_BODY);
        body.children.push(fault);
        let mut envelope = Fragment::new(SOAP_ENVELOPE);
        envelope.set_attribute("xmlns:SOAP-ENV", SOAP_NAMESPACE);
        envelope.children.push(body);
        Self::from_document(Document::from_fragment(&envelope, ServerContext::default_context()))
    }

    pub fn no_items_found(type_name: &str) -> Self {
        Self::from_fault(
            FaultInfo::NO_ITEMS_CODE,
            &format!("No items of type {} found.", type_name),
        )
    }

    /// The fault envelope, if the response carries one anywhere
    pub fn exception(&self) -> Option<Fault> {
        let id = self.node.doc().find_descendant(FAULT_TAG)?;
        Some(Fault {
            node: Node::bound(self.node.doc_ref().clone(), id),
        })
    }

    pub fn is_error(&self) -> bool {
        self.exception().is_some()
    }

    /// True only for the "no items found" fault
    pub fn is_empty(&self) -> bool {
        self.exception().is_some_and(|f| f.is_no_items())
    }

    /// Resolve the outermost run of sibling items
    pub fn cardinality(&self) -> Cardinality {
        if let Some(fault) = self.exception() {
            return Cardinality::Fault(fault);
        }
        let ids: Vec<NodeId> = {
            let doc = self.node.doc();
            match doc.find_descendant(ITEM_TAG) {
                None => Vec::new(),
                Some(first) => match doc.parent(first) {
                    None => vec![first],
                    Some(parent) => doc
                        .children(parent)
                        .iter()
                        .copied()
                        .filter(|&c| doc.local_name(c) == ITEM_TAG)
                        .collect(),
                },
            }
        };
        tracing::debug!(count = ids.len(), "resolved item cardinality");
        let mut items: Vec<Item> = ids
            .into_iter()
            .map(|id| Item::from_node(Node::bound(self.node.doc_ref().clone(), id)))
            .collect();
        match items.len() {
            0 => Cardinality::Empty,
            1 => items.pop().map_or(Cardinality::Empty, Cardinality::One),
            _ => Cardinality::Many(items),
        }
    }

    /// Items in the response; empty for faults
    pub fn items(&self) -> Vec<Item> {
        match self.cardinality() {
            Cardinality::One(item) => vec![item],
            Cardinality::Many(items) => items,
            Cardinality::Empty | Cardinality::Fault(_) => Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.items().len()
    }

    /// Text of a scalar result: a `Result` element with no child elements
    pub fn value(&self) -> Option<String> {
        if self.is_error() {
            return None;
        }
        let doc = self.node.doc();
        let id = doc.find_descendant(RESULT_TAG)?;
        doc.children(id).is_empty().then(|| doc.text(id).to_string())
    }

    /// Exactly one item, optionally of an expected type
    pub fn assert_item(&self, expected_type: Option<&str>) -> Result<Item> {
        match self.cardinality() {
            Cardinality::Fault(fault) => Err(Error::from_fault(fault.info(), expected_type)),
            Cardinality::Empty => Err(Error::NoItemsFound {
                type_name: expected_type.map(str::to_string),
                message: "No items found.".to_string(),
            }),
            Cardinality::Many(items) => Err(Error::invalid_operation(format!(
                "multiple items found ({})",
                items.len()
            ))),
            Cardinality::One(item) => match expected_type {
                Some(expected) if item.type_name() != expected => Err(Error::invalid_operation(format!(
                    "expected an item of type '{}' but found '{}'",
                    expected,
                    item.type_name()
                ))),
                _ => Ok(item),
            },
        }
    }

    /// All items; the "no items found" fault yields an empty list
    pub fn assert_items(&self) -> Result<Vec<Item>> {
        match self.cardinality() {
            Cardinality::Fault(fault) if fault.is_no_items() => Ok(Vec::new()),
            Cardinality::Fault(fault) => Err(Error::Fault(fault.info())),
            Cardinality::Empty => Ok(Vec::new()),
            Cardinality::One(item) => Ok(vec![item]),
            Cardinality::Many(items) => Ok(items),
        }
    }

    pub fn assert_no_error(&self, ignore_no_items_found: bool) -> Result<()> {
        match self.exception() {
            None => Ok(()),
            Some(fault) if fault.is_no_items() && ignore_no_items_found => Ok(()),
            Some(fault) => Err(Error::from_fault(fault.info(), None)),
        }
    }

    /// Informational message sent along with the response
    pub fn message(&self) -> Option<Node> {
        let id = self.node.doc().find_descendant(MESSAGE_TAG)?;
        Some(Node::bound(self.node.doc_ref().clone(), id))
    }

    /// Attach an informational message after the result or fault,
    /// wrapping the document in an envelope when it has none
    pub fn set_message(&self, text: &str) -> Result<Node> {
        let mut doc = self.node.doc_mut();
        let body = match doc.find_descendant(BODY_TAG) {
            Some(body) => body,
            None => {
                let body = doc.wrap_root(SOAP_BODY)?;
                let envelope = doc.wrap_root(SOAP_ENVELOPE)?;
                doc.set_attribute(envelope, "xmlns:SOAP-ENV", SOAP_NAMESPACE);
                body
            }
        };
        let message = match doc.child_named(body, MESSAGE_TAG) {
            Some(message) => message,
            None => {
                let message = doc.create_element(MESSAGE_TAG);
                doc.append(body, message);
                message
            }
        };
        doc.set_text(message, text);
        Ok(Node::bound(self.node.doc_ref().clone(), message))
    }
}

/// Serialize items for the wire. A single item is written verbatim; a set
/// sharing one container is written as that container; anything else is
/// wrapped in a new `Result` element.
pub fn items_to_aml(items: &[Item]) -> String {
    match items {
        [] => format!("<{} />", RESULT_TAG),
        [one] => one.to_aml(),
        [first, rest @ ..] => {
            if let Some(parent) = first.node().parent() {
                let parent_name = parent.name();
                let siblings: Vec<Node> = parent
                    .elements()
                    .into_iter()
                    .filter(|n| n.name() == ITEM_TAG)
                    .collect();
                let shared = (parent_name == RESULT_TAG || parent_name == AML_TAG)
                    && siblings.len() == items.len()
                    && rest
                        .iter()
                        .all(|i| i.node().parent().is_some_and(|p| p.is_same_node(&parent)));
                if shared {
                    return parent.to_aml();
                }
            }
            let mut out = format!("<{}>", RESULT_TAG);
            for item in items {
                out.push_str(&item.to_aml());
            }
            out.push_str(&format!("</{}>", RESULT_TAG));
            out
        }
    }
}
