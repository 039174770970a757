//! Error types for host operations

/// Result type for host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Unified error type for all host interactions
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host object does not expose any of the expected members
    #[error("Host member not found: {0}")]
    MissingMember(String),

    /// The host object's shape does not match any known accessor pattern
    #[error("Host reflection error: {0}")]
    Reflection(String),

    /// Invoking a host method failed
    #[error("Host invocation error: {0}")]
    Invocation(String),

    /// A host member returned a value of an unexpected kind
    #[error("Host type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl HostError {
    /// Create a new missing-member error
    pub fn missing_member<S: Into<String>>(msg: S) -> Self {
        HostError::MissingMember(msg.into())
    }

    /// Create a new reflection error
    pub fn reflection<S: Into<String>>(msg: S) -> Self {
        HostError::Reflection(msg.into())
    }

    /// Create a new invocation error
    pub fn invocation<S: Into<String>>(msg: S) -> Self {
        HostError::Invocation(msg.into())
    }
}
