//! Legacy host adapter for the AML model
//!
//! Runs [`aml_model`] against a host connection whose type is only known at
//! runtime. [`ReflectedHost`] translates the host object into the
//! [`HostContext`](aml_host_traits::HostContext) capability interface;
//! [`LegacyConnection`] builds a model [`Connection`](aml_model::Connection)
//! on top of it.

pub mod connection;
pub mod escalate;
pub mod options;
pub mod probe;

// Re-export main types
pub use connection::{ConnectionState, LegacyConnection};
pub use escalate::Escalation;
pub use options::AdapterOptions;
pub use probe::ReflectedHost;
