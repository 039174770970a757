//! Key-value cache stores exposed by the host

use crate::error::Result;
use crate::object::HostValue;
use std::fmt;

/// Cache scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Application,
    Session,
    Request,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Application, CacheKind::Session, CacheKind::Request];

    /// Name of the host sub-object hosting this cache
    pub fn host_member(&self) -> &'static str {
        match self {
            CacheKind::Application => "Application",
            CacheKind::Session => "Session",
            CacheKind::Request => "Request",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_member())
    }
}

/// Uniform get/set handle over a host cache.
///
/// No locking is added or removed; concurrency is whatever the host gives.
pub trait HostCache {
    fn get(&self, key: &str) -> Result<Option<HostValue>>;

    fn set(&self, key: &str, value: HostValue) -> Result<()>;
}
