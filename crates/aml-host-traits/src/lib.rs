//! Capability interface over legacy host connections.
//!
//! This crate defines the narrow traits a legacy host must be translated
//! into before the AML model can run against it.

pub mod cache;
pub mod context;
pub mod error;
pub mod object;

pub use cache::{CacheKind, HostCache};
pub use context::{Grant, HostContext, HostFile, HostIdentity, HostSession};
pub use error::{HostError, Result};
pub use object::{HostObject, HostValue, Member, MemberKind, Visibility};
