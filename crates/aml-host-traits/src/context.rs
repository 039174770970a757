//! Host capability interface

use crate::cache::{CacheKind, HostCache};
use crate::error::Result;
use crate::object::HostValue;
use serde::{Deserialize, Serialize};

/// Localization context of the host session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSession {
    pub language_code: String,
    pub locale: String,
    pub time_zone: String,
}

/// Identity facts resolved from the host once per adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIdentity {
    pub database: String,
    pub user_id: String,
    /// Raw server version text as reported by the host
    pub version: String,
    pub session: HostSession,
}

/// A granted identity, held until it is revoked
#[derive(Debug, Clone)]
pub struct Grant {
    pub identity: String,
    pub handle: HostValue,
}

/// A file handed to the host's vault surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFile {
    pub id: String,
    pub name: String,
    pub content: Vec<u8>,
}

/// Trait for host connections the AML model can run against.
///
/// This is the only contract between the adapter and the host. Concrete
/// implementations translate it into whatever the host object actually
/// offers; the adapter never inspects the host directly.
pub trait HostContext {
    /// Resolve database, user, version and session context
    fn resolve_identity(&self) -> Result<HostIdentity>;

    /// Cache store of the given kind, or `None` when the host has no call
    /// context to host it
    fn cache(&self, kind: CacheKind) -> Result<Option<Box<dyn HostCache>>>;

    /// Grant an identity through the host's global security surface
    fn grant(&self, identity: &str) -> Result<Grant>;

    /// Revoke a previously granted identity
    fn revoke(&self, grant: &Grant) -> Result<()>;

    /// Invoke a SOAP-style action with a markup body, returning the raw
    /// response markup
    fn apply_soap(&self, action: &str, body: &str) -> Result<String>;

    /// Store a file in the vault, optionally inside a transaction
    fn store_file(&self, file: &HostFile, transaction: Option<&str>) -> Result<()>;

    /// Fetch a file's content from the vault
    fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>>;
}
