//! Values written to properties and their neutral text forms

use crate::context::ServerContext;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::node::Element;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;
use std::str::FromStr;
use uuid::Uuid;

static PARAM_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\d+)").expect("valid parameter pattern"));

/// A value that can be written to a property
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Null,
    Text(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    /// Wall-clock time in the session zone
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
    DateTimeOffset(DateTime<FixedOffset>),
    Guid(Uuid),
    Item(Item),
    Range(Box<PropertyValue>, Box<PropertyValue>),
}

impl PropertyValue {
    pub fn range<A, B>(start: A, end: B) -> Self
    where
        A: Into<PropertyValue>,
        B: Into<PropertyValue>,
    {
        PropertyValue::Range(Box::new(start.into()), Box::new(end.into()))
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self,
            PropertyValue::DateTime(_) | PropertyValue::DateTimeUtc(_) | PropertyValue::DateTimeOffset(_)
        )
    }

    /// Neutral text of a scalar value. Null, items and ranges have none.
    pub fn to_neutral(&self, context: &ServerContext) -> Option<String> {
        match self {
            PropertyValue::Null | PropertyValue::Item(_) | PropertyValue::Range(..) => None,
            PropertyValue::Text(s) => Some(s.clone()),
            PropertyValue::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
            PropertyValue::Integer(i) => Some(i.to_string()),
            PropertyValue::Double(d) => Some(d.to_string()),
            PropertyValue::DateTime(dt) => Some(context.format_local(*dt)),
            PropertyValue::DateTimeUtc(dt) => Some(context.format_instant(dt)),
            PropertyValue::DateTimeOffset(dt) => Some(context.format_instant(dt)),
            PropertyValue::Guid(g) => Some(format_guid(g)),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value.into())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<NaiveDateTime> for PropertyValue {
    fn from(value: NaiveDateTime) -> Self {
        PropertyValue::DateTime(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::DateTimeUtc(value)
    }
}

impl From<DateTime<FixedOffset>> for PropertyValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        PropertyValue::DateTimeOffset(value)
    }
}

impl From<Uuid> for PropertyValue {
    fn from(value: Uuid) -> Self {
        PropertyValue::Guid(value)
    }
}

impl From<Item> for PropertyValue {
    fn from(value: Item) -> Self {
        PropertyValue::Item(value)
    }
}

impl From<&Item> for PropertyValue {
    fn from(value: &Item) -> Self {
        PropertyValue::Item(value.clone())
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropertyValue::Null, Into::into)
    }
}

/// Generate a fresh item id: 32 upper-case hex digits
pub fn new_id() -> String {
    format_guid(&Uuid::new_v4())
}

pub fn format_guid(guid: &Uuid) -> String {
    guid.simple().to_string().to_uppercase()
}

/// Parse a GUID in either the bare 32-digit or the hyphenated form
pub fn parse_guid(text: &str) -> Option<Uuid> {
    Uuid::parse_str(text.trim()).ok()
}

pub fn parse_boolean(text: &str) -> Result<bool> {
    let text = text.trim();
    if text == "1" || text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text == "0" || text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::type_conversion(format!("'{}' is not a boolean", text)))
    }
}

/// Replace positional `@N` placeholders in markup with parameter values.
///
/// Scalars are written in neutral form and escaped; items are inlined as
/// markup; null becomes empty text.
pub fn substitute_params(aml: &str, params: &[PropertyValue], context: &ServerContext) -> Result<String> {
    let mut out = String::with_capacity(aml.len());
    let mut last = 0;
    for caps in PARAM_PATTERN.captures_iter(aml) {
        let whole = caps.get(0).ok_or_else(|| Error::argument("malformed parameter placeholder"))?;
        let index: usize = parse_number(&caps[1], "parameter index")?;
        let param = params
            .get(index)
            .ok_or_else(|| Error::argument(format!("no value supplied for parameter @{}", index)))?;
        out.push_str(&aml[last..whole.start()]);
        match param {
            PropertyValue::Null => {}
            PropertyValue::Item(item) => out.push_str(&item.to_aml()),
            PropertyValue::Range(..) => {
                return Err(Error::argument(format!("parameter @{} cannot be a range", index)))
            }
            scalar => {
                let text = scalar.to_neutral(context).unwrap_or_default();
                out.push_str(&escape(text.as_str()));
            }
        }
        last = whole.end();
    }
    out.push_str(&aml[last..]);
    Ok(out)
}

pub(crate) fn parse_number<T: FromStr>(text: &str, what: &str) -> Result<T> {
    text.trim()
        .parse::<T>()
        .map_err(|_| Error::type_conversion(format!("'{}' is not a valid {}", text.trim(), what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_accept_both_spellings() {
        assert!(parse_boolean("1").unwrap());
        assert!(parse_boolean("True").unwrap());
        assert!(!parse_boolean(" 0 ").unwrap());
        assert!(parse_boolean("yes").is_err());
    }

    #[test]
    fn guids_are_bare_upper_hex() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert!(parse_guid(&id).is_some());
        assert!(parse_guid("3F2504E0-4F89-11D3-9A0C-0305E82C3301").is_some());
        assert!(parse_guid("not a guid").is_none());
    }

    #[test]
    fn params_are_escaped_and_indexed() {
        let ctx = ServerContext::default();
        let params = [PropertyValue::from("a<b"), PropertyValue::from(true)];
        let aml = substitute_params("<Item><name>@0</name><flag>@1</flag></Item>", &params, &ctx).unwrap();
        assert_eq!(aml, "<Item><name>a&lt;b</name><flag>1</flag></Item>");
        assert!(substitute_params("<x>@2</x>", &params, &ctx).is_err());
    }

    #[test]
    fn utc_values_are_written_in_session_zone() {
        let ctx = ServerContext::new("en", "en-US", "+01:00");
        let instant = DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let text = PropertyValue::from(instant).to_neutral(&ctx).unwrap();
        assert_eq!(text, "2024-05-01T09:30:00");
    }
}
