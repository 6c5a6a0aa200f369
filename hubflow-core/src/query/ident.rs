//! Validated SQL-style identifiers for schema and table names.
//!
//! Table and schema names are caller-overridable, so nothing reaches the
//! store as a raw string. An `Identifier` is lowercase ASCII, starts with a
//! letter or underscore and is at most 63 bytes long (the PostgreSQL limit).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest identifier accepted, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier '{0}' is longer than {MAX_IDENTIFIER_LEN} bytes")]
    TooLong(String),

    #[error("identifier '{0}' must start with a lowercase letter or underscore")]
    BadStart(String),

    #[error("identifier '{ident}' contains illegal character {ch:?}")]
    IllegalChar { ident: String, ch: char },
}

/// A schema or table name that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(IdentifierError::TooLong(raw.to_string()));
        }

        let mut chars = raw.chars();
        let Some(first) = chars.next() else {
            return Err(IdentifierError::Empty);
        };
        if !(first.is_ascii_lowercase() || first == '_') {
            return Err(IdentifierError::BadStart(raw.to_string()));
        }
        if let Some(ch) = chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')) {
            return Err(IdentifierError::IllegalChar {
                ident: raw.to_string(),
                ch,
            });
        }

        Ok(Self(raw.to_string()))
    }

    /// Wrap a built-in name. Only used for compile-time defaults.
    pub(crate) fn known(name: &'static str) -> Self {
        debug_assert!(Self::parse(name).is_ok(), "invalid built-in identifier {name}");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
