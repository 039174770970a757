//! Error types for the AML model

use std::fmt;
use thiserror::Error;

/// Snapshot of a server fault's text fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultInfo {
    pub code: String,
    pub message: String,
    pub detail: String,
    pub source: String,
}

impl FaultInfo {
    /// Code used by the server to report that no items matched
    pub const NO_ITEMS_CODE: &'static str = "0";

    pub fn new<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn is_no_items(&self) -> bool {
        self.code == Self::NO_ITEMS_CODE
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Server fault: {0}")]
    Fault(FaultInfo),

    #[error("No items found: {message}")]
    NoItemsFound {
        type_name: Option<String>,
        message: String,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Unsupported credential: {0}")]
    UnsupportedCredential(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("Host adapter error: {0}")]
    Adapter(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        Error::InvalidOperation(msg.into())
    }

    pub fn argument<S: Into<String>>(msg: S) -> Self {
        Error::Argument(msg.into())
    }

    pub fn type_conversion<S: Into<String>>(msg: S) -> Self {
        Error::TypeConversion(msg.into())
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    pub fn adapter<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Adapter(Box::new(err))
    }

    /// Build the error a caller sees when asserting on a fault
    pub fn from_fault(fault: FaultInfo, type_name: Option<&str>) -> Self {
        if fault.is_no_items() {
            Error::NoItemsFound {
                type_name: type_name.map(str::to_string),
                message: fault.message,
            }
        } else {
            Error::Fault(fault)
        }
    }

    pub fn is_no_items_found(&self) -> bool {
        matches!(self, Error::NoItemsFound { .. })
    }

    /// Fault fields, when this error came from the server
    pub fn fault(&self) -> Option<&FaultInfo> {
        match self {
            Error::Fault(info) => Some(info),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
