//! Lazily materialized attributes

use crate::error::Result;
use crate::node::Node;
use crate::value::parse_boolean;

/// Name/value pair on a node. Always obtainable, even when neither the
/// attribute nor its owner exists yet.
#[derive(Debug, Clone)]
pub struct Attribute {
    owner: Node,
    name: String,
}

impl Attribute {
    pub(crate) fn new(owner: Node, name: &str) -> Self {
        Self {
            owner,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Node {
        &self.owner
    }

    pub fn exists(&self) -> bool {
        self.value().is_some()
    }

    pub fn value(&self) -> Option<String> {
        let doc = self.owner.doc();
        let id = self.owner.resolve_in(&doc)?;
        doc.attribute(id, &self.name).map(str::to_string)
    }

    pub fn as_string(&self, default: &str) -> String {
        self.value().unwrap_or_else(|| default.to_string())
    }

    pub fn as_boolean(&self, default: bool) -> Result<bool> {
        match self.value() {
            Some(text) => parse_boolean(&text),
            None => Ok(default),
        }
    }

    /// Write the value, creating the owner if needed. `None` removes the
    /// attribute.
    pub fn set(&self, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                let mut doc = self.owner.doc_mut();
                let id = self.owner.materialize_in(&mut doc)?;
                doc.set_attribute(id, &self.name, value);
                Ok(())
            }
            None => {
                self.remove();
                Ok(())
            }
        }
    }

    /// Remove the attribute. No-op when it does not exist.
    pub fn remove(&self) {
        let mut doc = self.owner.doc_mut();
        if let Some(id) = self.owner.resolve_in(&doc) {
            doc.remove_attribute(id, &self.name);
        }
    }
}
