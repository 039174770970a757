//! Dynamic host object model
//!
//! The legacy host is an object of unknown type. Everything the adapter knows
//! about it is discovered at runtime through this narrow reflective surface.

use crate::error::{HostError, Result};
use std::fmt::{self, Debug};
use std::rc::Rc;

/// Kind of a host member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Plain data field
    Field,
    /// Property with a getter (and maybe a setter)
    Property,
    /// Callable method
    Method,
    /// Indexer taking a single string key
    Indexer,
}

/// Visibility of a host member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

/// Description of a single member exposed by a host object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
}

impl Member {
    pub fn new<S: Into<String>>(name: S, kind: MemberKind, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility,
        }
    }

    pub fn public<S: Into<String>>(name: S, kind: MemberKind) -> Self {
        Self::new(name, kind, Visibility::Public)
    }

    pub fn private<S: Into<String>>(name: S, kind: MemberKind) -> Self {
        Self::new(name, kind, Visibility::Private)
    }
}

/// A value read from or passed to the host
#[derive(Clone, Default)]
pub enum HostValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    Object(Rc<dyn HostObject>),
}

impl HostValue {
    /// Name of the value kind, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Str(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Text form of a scalar value. Objects and bytes have none.
    pub fn as_text(&self) -> Option<String> {
        match self {
            HostValue::Bool(b) => Some(b.to_string()),
            HostValue::Int(i) => Some(i.to_string()),
            HostValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn into_text(self) -> Result<String> {
        let found = self.kind_name();
        self.as_text().ok_or(HostError::TypeMismatch {
            expected: "string",
            found,
        })
    }

    pub fn into_object(self) -> Result<Rc<dyn HostObject>> {
        match self {
            HostValue::Object(obj) => Ok(obj),
            other => Err(HostError::TypeMismatch {
                expected: "object",
                found: other.kind_name(),
            }),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            HostValue::Bytes(bytes) => Ok(bytes),
            HostValue::Str(s) => Ok(s.into_bytes()),
            other => Err(HostError::TypeMismatch {
                expected: "bytes",
                found: other.kind_name(),
            }),
        }
    }
}

impl Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("Null"),
            HostValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            HostValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            HostValue::Str(s) => f.debug_tuple("Str").field(s).finish(),
            HostValue::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            HostValue::Object(o) => f.debug_tuple("Object").field(&o.type_name()).finish(),
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Str(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Str(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

/// Trait for host objects reachable only through runtime inspection.
///
/// Implementations describe their members and answer reads, calls and
/// indexer accesses by member name. No compile-time contract exists between
/// the adapter and the host beyond this trait.
pub trait HostObject {
    /// Runtime type name of the object
    fn type_name(&self) -> &str;

    /// All members the object exposes, public and private
    fn members(&self) -> Vec<Member>;

    /// Read a field or property by name
    fn get(&self, member: &str) -> Result<HostValue>;

    /// Invoke a method by name
    fn call(&self, method: &str, args: &[HostValue]) -> Result<HostValue>;

    /// Read through an indexer member
    fn index_get(&self, indexer: &str, key: &str) -> Result<HostValue> {
        let _ = key;
        Err(HostError::missing_member(format!(
            "{} has no indexer {}",
            self.type_name(),
            indexer
        )))
    }

    /// Write through an indexer member
    fn index_set(&self, indexer: &str, key: &str, value: HostValue) -> Result<()> {
        let _ = (key, value);
        Err(HostError::missing_member(format!(
            "{} has no indexer {}",
            self.type_name(),
            indexer
        )))
    }

    /// Find a member by exact name
    fn member(&self, name: &str) -> Option<Member> {
        self.members().into_iter().find(|m| m.name == name)
    }

    /// First member of the given kind, if any
    fn first_member_of(&self, kind: MemberKind) -> Option<Member> {
        self.members().into_iter().find(|m| m.kind == kind)
    }
}
