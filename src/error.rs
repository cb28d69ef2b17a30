//! Error types for rsettings library

use std::fmt;
use thiserror::Error;

/// Result type alias for rsettings operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rsettings library
#[derive(Error, Debug)]
pub enum Error {
    // -------------------------------------------------------------------------
    // Settings Errors
    // -------------------------------------------------------------------------
    #[error("`{key}` is not an allowed setting key")]
    KeyInvalid { key: String },

    #[error("Validation failed: {0}")]
    Invalid(ValidationErrors),

    #[error("setting for `{0}` not found")]
    SettingNotFound(String),

    #[error("Type mismatch for {key}: {reason}")]
    TypeMismatch { key: String, reason: String },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Failed to encode value with {codec} codec: {reason}")]
    Encode { codec: &'static str, reason: String },

    #[error("Failed to decode stored value with {codec} codec: {reason}")]
    Decode { codec: &'static str, reason: String },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate setting `{key}` in table '{table}'")]
    UniqueViolation { table: String, key: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this is a "not found" type error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SettingNotFound(_))
    }

    /// Check if this error was caused by a key outside the allow-list
    #[must_use]
    pub fn is_key_invalid(&self) -> bool {
        matches!(self, Error::KeyInvalid { .. })
    }

    /// Validation violations carried by [`Error::Invalid`], if any
    #[must_use]
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Error::Invalid(errors) => Some(errors.as_slice()),
            _ => None,
        }
    }
}

// =============================================================================
// Validation Violations
// =============================================================================

/// A single failed validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Setting key the rule was evaluated for
    pub key: String,
    /// Short rule name (e.g. `inclusion`, `uniqueness`, `range`)
    pub rule: String,
    /// Human readable message
    pub message: String,
}

impl Violation {
    pub fn new(key: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ordered collection of every violation found for one write or one batch.
///
/// Never truncated: a record failing three rules carries three entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.violations.extend(other.violations);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Violation] {
        &self.violations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    /// Messages in the order the violations were recorded
    #[must_use]
    pub fn messages(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.message.as_str()).collect()
    }

    /// Violations recorded for one key
    pub fn for_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.key == key)
    }

    /// `Ok(())` when empty, otherwise [`Error::Invalid`]
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid(self))
        }
    }
}

impl From<Vec<Violation>> for ValidationErrors {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
