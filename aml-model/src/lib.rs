//! aml-model: client-side record model for the AML business-object protocol
//!
//! Responses and requests are held in an arena [`Document`]. Handles such as
//! [`Item`], [`Property`] and [`Attribute`] always exist as values; whether
//! the element behind them is present is reported by `exists()`. Writing
//! through a handle to a missing element creates it under its nearest
//! existing ancestor.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aml_model::{ItemResult, Element};
//!
//! let result = ItemResult::from_aml("<Result><Item type=\"Part\" id=\"1\"/></Result>")?;
//! let part = result.assert_item(Some("Part"))?;
//! part.property("name").set("Bolt")?;
//! println!("{}", part.to_aml());
//! ```

pub mod attribute;
pub mod connection;
pub mod context;
pub mod credentials;
pub mod document;
pub mod error;
pub mod item;
pub mod logical;
pub mod node;
pub mod property;
pub mod relationships;
pub mod result;
pub mod value;
pub mod vault;

// Re-export core types
pub use attribute::Attribute;
pub use context::ServerContext;
pub use document::{Document, Fragment, NodeId};
pub use error::{Error, FaultInfo, Result};
pub use item::Item;
pub use logical::{Logical, LogicalKind};
pub use node::{Element, Node};
pub use property::Property;
pub use relationships::{RelationshipContent, Relationships};
pub use result::{items_to_aml, Cardinality, Fault, ItemResult};
pub use value::{new_id, PropertyValue};

// Re-export the request boundary
pub use connection::{Command, Connection, ConnectionExt, ServerVersion, SoapAction};
pub use credentials::{Credentials, Password};
pub use vault::{DownloadCommand, UploadCommand, UploadFile, UploadStrategy, VaultConnection};
