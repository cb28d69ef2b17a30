//! Persisted settings records and owner scoping

use crate::codec::ValueCodec;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use time::OffsetDateTime;

/// Backend-assigned record identity
pub type RecordId = i64;

/// An entity settings can be scoped to.
///
/// Implement this for your domain objects. The pair (`owner_type`, `owner_id`)
/// must be stable for the lifetime of the entity.
///
/// # Example
///
/// ```
/// use rsettings::Owner;
///
/// struct User {
///     id: u64,
/// }
///
/// impl Owner for User {
///     fn owner_type(&self) -> String {
///         "User".into()
///     }
///
///     fn owner_id(&self) -> String {
///         self.id.to_string()
///     }
/// }
/// ```
pub trait Owner {
    /// Type tag, e.g. `"User"` or `"Account"`
    fn owner_type(&self) -> String;

    /// Stable identity within `owner_type`
    fn owner_id(&self) -> String;
}

/// Reference to the owner of a scoped record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }

    pub fn of<O: Owner + ?Sized>(owner: &O) -> Self {
        Self::new(owner.owner_type(), owner.owner_id())
    }
}

impl Owner for OwnerRef {
    fn owner_type(&self) -> String {
        self.owner_type.clone()
    }

    fn owner_id(&self) -> String {
        self.owner_id.clone()
    }
}

/// Which records an operation sees.
///
/// The owner type and id travel together, so a half-populated owner reference
/// cannot be expressed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Records with no owner
    #[default]
    Global,
    /// Records owned by one entity
    Owned(OwnerRef),
}

impl Scope {
    #[must_use]
    pub fn owner(&self) -> Option<&OwnerRef> {
        match self {
            Scope::Global => None,
            Scope::Owned(owner) => Some(owner),
        }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// Column values as stored: both `None` for the global scope
    #[must_use]
    pub fn columns(&self) -> (Option<&str>, Option<&str>) {
        match self {
            Scope::Global => (None, None),
            Scope::Owned(owner) => (Some(&owner.owner_type), Some(&owner.owner_id)),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Owned(owner) => write!(f, "{}#{}", owner.owner_type, owner.owner_id),
        }
    }
}

/// One stored setting
#[derive(Debug, Clone, PartialEq)]
pub struct SettingRecord {
    /// `None` until the backend has inserted the record
    pub id: Option<RecordId>,
    /// Settings table the record belongs to
    pub table: String,
    pub key: String,
    /// Serialized value; `None` or empty means absent
    pub value: Option<String>,
    pub scope: Scope,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl SettingRecord {
    /// New, not yet persisted record
    pub fn new(table: impl Into<String>, key: impl Into<String>, scope: Scope) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: None,
            table: table.into(),
            key: key.into(),
            value: None,
            scope,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Decoded value; absent or empty text yields `None`
    pub fn decode_value(&self, codec: &dyn ValueCodec) -> Result<Option<Value>> {
        match self.value.as_deref() {
            Some(text) => codec.decode(text),
            None => Ok(None),
        }
    }

    /// Encode and assign a new value, bumping `updated_at`
    pub fn assign_value(&mut self, codec: &dyn ValueCodec, value: &Value) -> Result<()> {
        self.value = Some(codec.encode(value)?);
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}
