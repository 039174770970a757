//! Typed properties of items

use crate::document::{local_name, Fragment};
use crate::error::{Error, Result};
use crate::item::{Item, ITEM_TAG};
use crate::node::{Element, ElementMatch, Node, I18N_PREFIX};
use crate::value::{parse_boolean, parse_guid, parse_number, PropertyValue};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use uuid::Uuid;

/// Marker attribute for an explicit null value
pub const IS_NULL_ATTR: &str = "is_null";
/// Attribute overriding the text as the neutral value
pub const NEUTRAL_VALUE_ATTR: &str = "neutral_value";
/// Comparison condition used in queries
pub const CONDITION_ATTR: &str = "condition";
pub const KEYED_NAME_ATTR: &str = "keyed_name";
pub const TYPE_ATTR: &str = "type";
/// Serialized form of a date range written next to a `between` condition
pub const DATE_RANGE_ATTR: &str = "origDateRange";
/// Prefix of property text pointing at a vault file
pub const VAULT_PICTURE_PREFIX: &str = "vault:///?fileId=";
/// Item type of vault files
pub const FILE_TYPE: &str = "File";

/// A named value or item reference on an item
#[derive(Debug, Clone)]
pub struct Property {
    node: Node,
}

/// Find a property of `owner`.
///
/// Without a language, or with the session's own language, the plain
/// element `name` is used. Any other language selects the
/// namespace-qualified `i18n:name` element carrying that `xml:lang`.
pub(crate) fn lookup(owner: &Node, name: &str, lang: Option<&str>) -> Property {
    let matcher = match lang {
        Some(lang) if !owner.context().is_session_language(lang) => ElementMatch {
            name: format!("{}:{}", I18N_PREFIX, name),
            lang: Some(lang.to_string()),
        },
        _ => ElementMatch::named(name),
    };
    Property {
        node: owner.lazy_child(matcher),
    }
}

impl Element for Property {
    fn node(&self) -> &Node {
        &self.node
    }
}

impl Property {
    pub(crate) fn from_node(node: Node) -> Self {
        Self { node }
    }

    /// Property name without any language prefix
    pub fn local_name(&self) -> String {
        local_name(&self.node.name()).to_string()
    }

    pub fn is_null(&self) -> bool {
        self.node
            .attribute(IS_NULL_ATTR)
            .value()
            .is_some_and(|v| parse_boolean(&v).unwrap_or(false))
    }

    pub fn condition(&self) -> Option<String> {
        self.node.attribute(CONDITION_ATTR).value()
    }

    pub fn set_condition(&self, condition: Option<&str>) -> Result<()> {
        self.node.attribute(CONDITION_ATTR).set(condition)
    }

    pub fn keyed_name(&self) -> Option<String> {
        self.node.attribute(KEYED_NAME_ATTR).value()
    }

    /// Item type named by the `type` attribute of a reference property
    pub fn type_name(&self) -> Option<String> {
        self.node.attribute(TYPE_ATTR).value()
    }

    fn nested_item(&self) -> Option<Item> {
        let doc = self.node.doc();
        let id = self.node.resolve_in(&doc)?;
        let child = doc.find_child(id, |d, c| d.local_name(c) == ITEM_TAG)?;
        Some(Item::from_node(Node::bound(self.node.doc_ref().clone(), child)))
    }

    /// Locale-independent value used as the source of every coercion
    pub fn neutral_value(&self) -> Option<String> {
        if !self.node.exists() || self.is_null() {
            return None;
        }
        if let Some(value) = self.node.attribute(NEUTRAL_VALUE_ATTR).value() {
            return Some(value);
        }
        if let Some(item) = self.nested_item() {
            return item.id();
        }
        self.node.text()
    }

    /// Value as written: the text, or the id of an inline item. `None` when
    /// missing or null.
    pub fn value(&self) -> Option<String> {
        if !self.node.exists() || self.is_null() {
            return None;
        }
        match self.nested_item() {
            Some(item) => item.id(),
            None => self.node.text(),
        }
    }

    pub fn as_string(&self, default: &str) -> String {
        self.value().unwrap_or_else(|| default.to_string())
    }

    fn coerce<T, F>(&self, parse: F) -> Result<Option<T>>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        match self.neutral_value() {
            Some(text) if !text.trim().is_empty() => parse(&text).map(Some),
            _ => Ok(None),
        }
    }

    pub fn as_boolean(&self) -> Result<Option<bool>> {
        self.coerce(parse_boolean)
    }

    pub fn as_boolean_or(&self, default: bool) -> Result<bool> {
        Ok(self.as_boolean()?.unwrap_or(default))
    }

    pub fn as_int(&self) -> Result<Option<i32>> {
        self.coerce(|t| parse_number(t, "32-bit integer"))
    }

    pub fn as_long(&self) -> Result<Option<i64>> {
        self.coerce(|t| parse_number(t, "64-bit integer"))
    }

    pub fn as_double(&self) -> Result<Option<f64>> {
        self.coerce(|t| parse_number(t, "double"))
    }

    /// Wall-clock time in the session zone
    pub fn as_date_time(&self) -> Result<Option<NaiveDateTime>> {
        let context = self.node.context();
        self.coerce(|t| context.parse_date_time(t))
    }

    pub fn as_date_time_utc(&self) -> Result<Option<DateTime<Utc>>> {
        let context = self.node.context();
        self.coerce(|t| context.to_utc(context.parse_date_time(t)?))
    }

    pub fn as_date_time_offset(&self) -> Result<Option<DateTime<FixedOffset>>> {
        let context = self.node.context();
        self.coerce(|t| context.localize(context.parse_date_time(t)?))
    }

    pub fn as_guid(&self) -> Result<Option<Uuid>> {
        self.coerce(|t| parse_guid(t).ok_or_else(|| Error::type_conversion(format!("'{}' is not a GUID", t))))
    }

    /// Resolve the property to an item.
    ///
    /// An inline item is returned as-is and shares this document. A GUID
    /// with a `type` attribute, or a vault picture link, yields a small
    /// freestanding item. Anything else gives a non-existent item.
    pub fn as_item(&self) -> Item {
        if self.is_null() {
            return Item::null();
        }
        if let Some(item) = self.nested_item() {
            return item;
        }

        let Some(text) = self.node.text() else {
            return Item::null();
        };
        let text = text.trim();

        if let (Some(_), Some(type_name)) = (parse_guid(text), self.type_name()) {
            let mut fragment = Fragment::new(ITEM_TAG);
            fragment.set_attribute(TYPE_ATTR, &type_name);
            fragment.set_attribute("id", text);
            if let Some(keyed_name) = self.keyed_name() {
                let mut id = Fragment::new("id");
                id.set_attribute(KEYED_NAME_ATTR, &keyed_name);
                id.set_attribute(TYPE_ATTR, &type_name);
                id.text = text.to_string();
                let mut label = Fragment::new(KEYED_NAME_ATTR);
                label.text = keyed_name;
                fragment.children.push(id);
                fragment.children.push(label);
            }
            return Item::from_fragment(&fragment, self.node.context());
        }

        if let Some(file_id) = text.strip_prefix(VAULT_PICTURE_PREFIX) {
            let mut fragment = Fragment::new(ITEM_TAG);
            fragment.set_attribute(TYPE_ATTR, FILE_TYPE);
            fragment.set_attribute("id", file_id);
            return Item::from_fragment(&fragment, self.node.context());
        }

        Item::null()
    }

    /// Write a value, creating the property if needed.
    ///
    /// A null value sets the null marker rather than removing the element.
    /// Ranges set a `between` condition.
    pub fn set<V: Into<PropertyValue>>(&self, value: V) -> Result<()> {
        let value = value.into();
        let context = self.node.context();

        match value {
            PropertyValue::Null => {
                let mut doc = self.node.doc_mut();
                let id = self.node.materialize_in(&mut doc)?;
                doc.clear_children(id);
                doc.set_text(id, "");
                doc.remove_attribute(id, NEUTRAL_VALUE_ATTR);
                doc.set_attribute(id, IS_NULL_ATTR, "1");
                Ok(())
            }
            PropertyValue::Item(item) => {
                let fragment = item
                    .fragment()
                    .ok_or_else(|| Error::invalid_operation("cannot assign a missing item to a property"))?;
                let mut doc = self.node.doc_mut();
                let id = self.node.materialize_in(&mut doc)?;
                doc.clear_children(id);
                doc.set_text(id, "");
                doc.remove_attribute(id, IS_NULL_ATTR);
                doc.remove_attribute(id, NEUTRAL_VALUE_ATTR);
                let child = doc.insert_fragment(&fragment);
                doc.append(id, child);
                Ok(())
            }
            PropertyValue::Range(start, end) => {
                let bound = |v: &PropertyValue| {
                    v.to_neutral(&context)
                        .ok_or_else(|| Error::argument("range bounds must be scalar values"))
                };
                let (lo, hi) = (bound(&start)?, bound(&end)?);
                let mut doc = self.node.doc_mut();
                let id = self.node.materialize_in(&mut doc)?;
                doc.clear_children(id);
                doc.remove_attribute(id, IS_NULL_ATTR);
                doc.remove_attribute(id, NEUTRAL_VALUE_ATTR);
                doc.set_text(id, &format!("{} and {}", lo, hi));
                doc.set_attribute(id, CONDITION_ATTR, "between");
                if start.is_date() || end.is_date() {
                    doc.set_attribute(id, DATE_RANGE_ATTR, &format!("{}|{}", lo, hi));
                }
                Ok(())
            }
            scalar => {
                let text = scalar.to_neutral(&context).unwrap_or_default();
                let mut doc = self.node.doc_mut();
                let id = self.node.materialize_in(&mut doc)?;
                doc.clear_children(id);
                doc.remove_attribute(id, IS_NULL_ATTR);
                doc.remove_attribute(id, NEUTRAL_VALUE_ATTR);
                doc.set_text(id, &text);
                Ok(())
            }
        }
    }

    pub fn set_null(&self) -> Result<()> {
        self.set(PropertyValue::Null)
    }
}
