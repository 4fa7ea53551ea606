//! validated account and group names.
//!
//! account names follow the portable unix login rules: lowercase letters,
//! digits, `_`, `.` and `-`, starting with a letter or `_`.
//! group names are stricter: no `-`, since the os group carrying a role is
//! spelled `<prefix><name>-<suffix>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// maximum length of an account name.
pub const MAX_ACCOUNT_NAME_LEN: usize = 32;

/// maximum length of a group name, leaving room for prefix and role suffix.
pub const MAX_GROUP_NAME_LEN: usize = 24;

/// error type for name validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// name cannot be empty.
    #[error("name cannot be empty")]
    Empty,
    /// name exceeds maximum length.
    #[error("name too long ({0} chars, max {1})")]
    TooLong(usize, usize),
    /// name contains a character outside the allowed set.
    #[error("name contains invalid character {0:?}")]
    InvalidCharacter(char),
    /// name does not start with a letter or underscore.
    #[error("name must start with a lowercase letter or an underscore")]
    InvalidStart,
}

/// a validated local account name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    /// create a new account name, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, NameError> {
        let s = s.into();
        validate(&s, MAX_ACCOUNT_NAME_LEN, true)?;
        Ok(Self(s))
    }

    /// get the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the name and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// a validated bastion group name, without the os prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// create a new group name, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, NameError> {
        let s = s.into();
        validate(&s, MAX_GROUP_NAME_LEN, false)?;
        Ok(Self(s))
    }

    /// get the name string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// consume the name and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn validate(s: &str, max_len: usize, allow_hyphen: bool) -> Result<(), NameError> {
    if s.is_empty() {
        return Err(NameError::Empty);
    }
    if s.len() > max_len {
        return Err(NameError::TooLong(s.len(), max_len));
    }
    if let Some(c) = s.chars().find(|&c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.' || (allow_hyphen && c == '-'))
    }) {
        return Err(NameError::InvalidCharacter(c));
    }
    match s.chars().next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => Ok(()),
        _ => Err(NameError::InvalidStart),
    }
}

macro_rules! name_impls {
    ($ty:ident) => {
        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $ty {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $ty {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $ty {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(s).map_err(serde::de::Error::custom)
            }
        }
    };
}

name_impls!(AccountName);
name_impls!(GroupName);
