//! Boolean grouping of query criteria

use crate::error::Result;
use crate::node::{Element, Node};
use crate::property::{self, Property};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKind {
    And,
    Or,
    Not,
}

impl LogicalKind {
    pub fn tag(&self) -> &'static str {
        match self {
            LogicalKind::And => "and",
            LogicalKind::Or => "or",
            LogicalKind::Not => "not",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "and" => Some(LogicalKind::And),
            "or" => Some(LogicalKind::Or),
            "not" => Some(LogicalKind::Not),
            _ => None,
        }
    }
}

/// An `and`/`or`/`not` element. Only properties and nested groups live
/// inside it; it never has relationships.
#[derive(Debug, Clone)]
pub struct Logical {
    node: Node,
}

impl Element for Logical {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Logical {
    pub(crate) fn from_node(node: Node) -> Self {
        Self { node }
    }

    pub fn kind(&self) -> Option<LogicalKind> {
        LogicalKind::from_tag(&self.node.name())
    }

    pub fn property(&self, name: &str) -> Property {
        property::lookup(&self.node, name, None)
    }

    pub fn property_lang(&self, name: &str, lang: &str) -> Property {
        property::lookup(&self.node, name, Some(lang))
    }

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
}
