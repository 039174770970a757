//! Login credentials

use std::fmt;

/// Password in the form the caller holds it
#[derive(Clone, PartialEq, Eq)]
pub enum Password {
    Plain(String),
    /// Lower-case hex MD5 digest, as the server stores it
    Md5Hash(String),
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Password::Plain(_) => f.write_str("Plain(***)"),
            Password::Md5Hash(_) => f.write_str("Md5Hash(***)"),
        }
    }
}

/// Ways of authenticating against a database
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Explicit {
        database: String,
        username: String,
        password: Password,
    },
    /// Reuse the identity already established by the host
    Anonymous { database: String },
    Windows { database: String },
    Token { database: String, token: String },
}

impl Credentials {
    pub fn database(&self) -> &str {
        match self {
            Credentials::Explicit { database, .. }
            | Credentials::Anonymous { database }
            | Credentials::Windows { database }
            | Credentials::Token { database, .. } => database,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Explicit { .. } => "explicit",
            Credentials::Anonymous { .. } => "anonymous",
            Credentials::Windows { .. } => "windows",
            Credentials::Token { .. } => "token",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Explicit {
                database,
                username,
                password,
            } => f
                .debug_struct("Explicit")
                .field("database", database)
                .field("username", username)
                .field("password", password)
                .finish(),
            Credentials::Anonymous { database } => {
                f.debug_struct("Anonymous").field("database", database).finish()
            }
            Credentials::Windows { database } => {
                f.debug_struct("Windows").field("database", database).finish()
            }
            Credentials::Token { database, .. } => f
                .debug_struct("Token")
                .field("database", database)
                .field("token", &"***")
                .finish(),
        }
    }
}
