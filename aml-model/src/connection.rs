//! The request/response boundary consumed by the model

use crate::context::ServerContext;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::node::Element;
use crate::result::ItemResult;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

static VERSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?").expect("valid version pattern")
});
static SERVICE_PACK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSP\s*(\d+)").expect("valid service pack pattern"));

/// Named server operation a command is sent to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapAction {
    ApplyItem,
    ApplyAml,
    ApplySql,
    ApplyMethod,
    GetNextSequence,
    Custom(String),
}

impl SoapAction {
    pub fn as_str(&self) -> &str {
        match self {
            SoapAction::ApplyItem => "ApplyItem",
            SoapAction::ApplyAml => "ApplyAML",
            SoapAction::ApplySql => "ApplySQL",
            SoapAction::ApplyMethod => "ApplyMethod",
            SoapAction::GetNextSequence => "GetNextSequence",
            SoapAction::Custom(name) => name,
        }
    }
}

impl fmt::Display for SoapAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markup bound for the server together with its action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    action: SoapAction,
    aml: String,
}

impl Command {
    pub fn new<S: Into<String>>(aml: S) -> Self {
        Self {
            action: SoapAction::ApplyItem,
            aml: aml.into(),
        }
    }

    pub fn with_action(mut self, action: SoapAction) -> Self {
        self.action = action;
        self
    }

    pub fn action(&self) -> &SoapAction {
        &self.action
    }

    pub fn aml(&self) -> &str {
        &self.aml
    }
}

impl From<&Item> for Command {
    fn from(item: &Item) -> Self {
        Command::new(item.to_aml())
    }
}

impl From<Item> for Command {
    fn from(item: Item) -> Self {
        Command::from(&item)
    }
}

impl From<&str> for Command {
    fn from(aml: &str) -> Self {
        Command::new(aml).with_action(SoapAction::ApplyAml)
    }
}

impl From<String> for Command {
    fn from(aml: String) -> Self {
        Command::new(aml).with_action(SoapAction::ApplyAml)
    }
}

/// Reported server version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
    pub service_pack: Option<u32>,
}

impl ServerVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            ..Self::default()
        }
    }

    /// Parse free-form version text such as `11.0 SP12`, `12.0.0.1234`
    /// or `Release 14`
    pub fn parse(text: &str) -> Result<Self> {
        let caps = VERSION_PATTERN
            .captures(text)
            .ok_or_else(|| Error::type_conversion(format!("'{}' is not a server version", text)))?;
        let part = |i: usize| -> Result<u32> {
            match caps.get(i) {
                Some(m) => m
                    .as_str()
                    .parse()
                    .map_err(|_| Error::type_conversion(format!("version component '{}' is too large", m.as_str()))),
                None => Ok(0),
            }
        };
        let service_pack = match SERVICE_PACK_PATTERN.captures(text) {
            Some(sp) => Some(
                sp[1]
                    .parse()
                    .map_err(|_| Error::type_conversion(format!("bad service pack in '{}'", text)))?,
            ),
            None => None,
        };
        Ok(Self {
            major: part(1)?,
            minor: part(2)?,
            build: part(3)?,
            revision: part(4)?,
            service_pack,
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.build != 0 || self.revision != 0 {
            write!(f, ".{}.{}", self.build, self.revision)?;
        }
        if let Some(sp) = self.service_pack {
            write!(f, " SP{}", sp)?;
        }
        Ok(())
    }
}

/// Transport exchanging commands for response documents. Cancellation and
/// timeouts belong to the implementation.
#[async_trait(?Send)]
pub trait Connection {
    /// Send a command and wait for the response document
    fn process(&self, command: &Command) -> Result<Document>;

    /// Send a command without blocking the caller
    async fn process_async(&self, command: &Command) -> Result<Document> {
        self.process(command)
    }

    /// Next value of a server-side sequence
    fn next_sequence(&self, name: &str) -> Result<String>;

    fn user_id(&self) -> Result<String>;

    fn database(&self) -> Result<String>;

    fn version(&self) -> Result<ServerVersion>;

    /// Formatting context of the session
    fn context(&self) -> Result<Arc<ServerContext>> {
        Ok(ServerContext::default_context())
    }
}

/// Request helpers available on every connection
#[async_trait(?Send)]
pub trait ConnectionExt: Connection {
    /// Send a command; faults are held in the result until asserted
    fn apply<C: Into<Command>>(&self, command: C) -> Result<ItemResult> {
        let command = command.into();
        tracing::debug!(action = %command.action(), "applying command");
        let mut doc = self.process(&command)?;
        doc.set_context(self.context()?);
        Ok(ItemResult::from_document(doc))
    }

    async fn apply_async(&self, command: &Command) -> Result<ItemResult> {
        tracing::debug!(action = %command.action(), "applying command asynchronously");
        let mut doc = self.process_async(command).await?;
        doc.set_context(self.context()?);
        Ok(ItemResult::from_document(doc))
    }

    fn get_item_by_id(&self, type_name: &str, id: &str) -> Result<Item> {
        require("type", Some(type_name))?;
        require("id", Some(id))?;
        let query = Item::new_with_context(self.context()?, Some(type_name), Some("get"));
        query.set_id(Some(id))?;
        self.apply(&query)?.assert_item(Some(type_name))
    }

    /// Lock an item for editing by the current user
    fn lock(&self, item: &Item) -> Result<Item> {
        self.apply(&identity_request(self, item, "lock")?)?.assert_item(None)
    }

    fn unlock(&self, item: &Item) -> Result<Item> {
        self.apply(&identity_request(self, item, "unlock")?)?.assert_item(None)
    }

    /// Move an item to a new lifecycle state
    fn promote(&self, item: &Item, state: &str, comments: Option<&str>) -> Result<ItemResult> {
        require("state", Some(state))?;
        let request = identity_request(self, item, "promoteItem")?;
        request.property("state").set(state)?;
        if let Some(comments) = comments {
            request.property("comments").set(comments)?;
        }
        let result = self.apply(&request)?;
        result.assert_no_error(false)?;
        Ok(result)
    }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}

fn require(what: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(Error::argument(format!("an item {} is required", what))),
    }
}

fn identity_request<C: Connection + ?Sized>(conn: &C, item: &Item, action: &str) -> Result<Item> {
    let type_name = item.type_name();
    let id = item.id();
    require("type", Some(&type_name))?;
    require("id", id.as_deref())?;
    let request = Item::new_with_context(conn.context()?, Some(&type_name), Some(action));
    request.set_id(id.as_deref())?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_parse_from_release_strings() {
        let v = ServerVersion::parse("11.0 SP12").unwrap();
        assert_eq!((v.major, v.minor, v.service_pack), (11, 0, Some(12)));

        let v = ServerVersion::parse("12.0.0.1234").unwrap();
        assert_eq!((v.major, v.build, v.revision), (12, 0, 1234));

        assert_eq!(ServerVersion::parse("Release 14").unwrap().major, 14);
        assert!(ServerVersion::parse("unknown").is_err());
    }

    #[test]
    fn commands_pick_an_action_from_their_source() {
        let item = Item::new(Some("Part"), Some("get"));
        assert_eq!(Command::from(&item).action(), &SoapAction::ApplyItem);
        assert_eq!(Command::from("<AML />").action().as_str(), "ApplyAML");
    }
}
