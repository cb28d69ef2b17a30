//! Storage backend trait and implementations
//!
//! A backend persists [`SettingRecord`]s and provides the two guarantees the
//! store relies on:
//!
//! - **Uniqueness**: at most one record per (table, scope, key). A conflicting
//!   insert must fail with [`Error::UniqueViolation`](crate::Error::UniqueViolation),
//!   including for the global scope.
//! - **Transactions**: [`StorageBackend::transaction`] runs a closure against a
//!   [`RecordStore`] that is exclusive to it. Writes made through that store
//!   are committed together or rolled back together; other users of the same
//!   backend wait until the transaction ends and never join it.
//!
//! Bundled backends:
//!
//! - [`MemoryBackend`] - process-local, for tests and prototypes
//! - [`SqliteBackend`] - `SQLite` via `rusqlite` (requires `sqlite` feature)

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use crate::error::{Error, Result};
use crate::record::{RecordId, Scope, SettingRecord};
use std::sync::Arc;

/// Record-level operations
///
/// Implemented by every backend and by the transaction handle a backend hands
/// to [`StorageBackend::transaction`].
pub trait RecordStore {
    /// Find the record for `key` in `scope`
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Result<Option<SettingRecord>>;

    /// All records of `table` in `scope`, oldest first
    fn list(&self, table: &str, scope: &Scope) -> Result<Vec<SettingRecord>>;

    /// Insert a new record and return it with its assigned id
    ///
    /// # Errors
    ///
    /// [`Error::UniqueViolation`](crate::Error::UniqueViolation) if a record
    /// with the same table, scope and key already exists.
    fn insert(&self, record: &SettingRecord) -> Result<SettingRecord>;

    /// Overwrite the stored record with the same id
    fn update(&self, record: &SettingRecord) -> Result<()>;

    /// Delete by id, returning whether a record was removed
    fn delete(&self, id: RecordId) -> Result<bool>;
}

/// Trait for storage backend implementations
pub trait StorageBackend: RecordStore + Send + Sync {
    /// Backend name for logs (e.g., "memory", "sqlite")
    fn name(&self) -> &'static str;

    /// Run `work` inside a transaction
    ///
    /// `work` receives a [`RecordStore`] bound to the transaction. The
    /// transaction commits when `work` returns `Ok` and rolls back otherwise.
    /// Other callers of this backend block until it ends, so calling back
    /// into the same backend from inside `work` deadlocks.
    fn transaction(&self, work: &mut dyn FnMut(&dyn RecordStore) -> Result<()>) -> Result<()>;
}

impl<R: RecordStore + ?Sized> RecordStore for Arc<R> {
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Result<Option<SettingRecord>> {
        (**self).find(table, scope, key)
    }

    fn list(&self, table: &str, scope: &Scope) -> Result<Vec<SettingRecord>> {
        (**self).list(table, scope)
    }

    fn insert(&self, record: &SettingRecord) -> Result<SettingRecord> {
        (**self).insert(record)
    }

    fn update(&self, record: &SettingRecord) -> Result<()> {
        (**self).update(record)
    }

    fn delete(&self, id: RecordId) -> Result<bool> {
        (**self).delete(id)
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn transaction(&self, work: &mut dyn FnMut(&dyn RecordStore) -> Result<()>) -> Result<()> {
        (**self).transaction(work)
    }
}

/// Run `f` inside a transaction on `backend` and return its value
///
/// Typed wrapper over [`StorageBackend::transaction`].
pub fn transaction<B, T, F>(backend: &B, f: F) -> Result<T>
where
    B: StorageBackend + ?Sized,
    F: FnOnce(&dyn RecordStore) -> Result<T>,
{
    let mut f = Some(f);
    let mut output = None;

    backend.transaction(&mut |records| {
        let f = f
            .take()
            .ok_or_else(|| Error::Transaction("transaction body invoked twice".into()))?;
        output = Some(f(records)?);
        Ok(())
    })?;

    output.ok_or_else(|| Error::Transaction("transaction committed without running".into()))
}

// =============================================================================
// Tests
// =============================================================================
