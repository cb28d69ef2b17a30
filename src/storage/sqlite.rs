//! `SQLite` storage backend (requires `sqlite` feature)
//!
//! All settings tables share one physical table, discriminated by
//! `table_name`. Uniqueness is enforced by an expression index that maps a
//! NULL owner to a BLOB sentinel: `SQLite` treats NULLs as distinct in unique
//! indexes, so without it two global records for the same key could coexist.

use super::{RecordStore, StorageBackend};
use crate::error::{Error, Result};
use crate::record::{OwnerRef, RecordId, Scope, SettingRecord};
use crate::sync::MutexExt;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Default busy timeout for contended database files
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name  TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT,
    owner_type  TEXT,
    owner_id    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    CHECK ((owner_type IS NULL) = (owner_id IS NULL))
);
CREATE UNIQUE INDEX IF NOT EXISTS settings_scope_key_unique
    ON settings (table_name, IFNULL(owner_type, X'00'), IFNULL(owner_id, X'00'), key);
";

const SELECT_COLUMNS: &str =
    "SELECT id, table_name, key, value, owner_type, owner_id, created_at, updated_at FROM settings";

/// Row as read from the database, before timestamp and scope conversion
struct RawRow {
    id: RecordId,
    table: String,
    key: String,
    value: Option<String>,
    owner_type: Option<String>,
    owner_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        table: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
        owner_type: row.get(4)?,
        owner_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl TryFrom<RawRow> for SettingRecord {
    type Error = Error;

    fn try_from(row: RawRow) -> Result<Self> {
        let scope = match (row.owner_type, row.owner_id) {
            (None, None) => Scope::Global,
            (Some(owner_type), Some(owner_id)) => Scope::Owned(OwnerRef::new(owner_type, owner_id)),
            _ => {
                return Err(Error::Storage(format!(
                    "record {} has a half-populated owner reference",
                    row.id
                )));
            }
        };

        Ok(SettingRecord {
            id: Some(row.id),
            table: row.table,
            key: row.key,
            value: row.value,
            scope,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

fn parse_timestamp(text: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|e| Error::Storage(format!("invalid timestamp '{text}': {e}")))
}

fn format_timestamp(at: OffsetDateTime) -> Result<String> {
    at.format(&Rfc3339)
        .map_err(|e| Error::Storage(format!("cannot format timestamp: {e}")))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn map_write_error(err: rusqlite::Error, record: &SettingRecord) -> Error {
    if is_unique_violation(&err) {
        Error::UniqueViolation {
            table: record.table.clone(),
            key: record.key.clone(),
        }
    } else {
        Error::Sqlite(err)
    }
}

/// Record operations on a borrowed connection
///
/// Used both for autocommit statements and inside an open transaction.
struct Session<'c> {
    conn: &'c Connection,
}

impl RecordStore for Session<'_> {
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Result<Option<SettingRecord>> {
        let (owner_type, owner_id) = scope.columns();
        let row = self
            .conn
            .query_row(
                &format!(
                    "{SELECT_COLUMNS} WHERE table_name = ?1 AND key = ?2 AND owner_type IS ?3 AND owner_id IS ?4"
                ),
                params![table, key, owner_type, owner_id],
                map_row,
            )
            .optional()?;

        row.map(SettingRecord::try_from).transpose()
    }

    fn list(&self, table: &str, scope: &Scope) -> Result<Vec<SettingRecord>> {
        let (owner_type, owner_id) = scope.columns();
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE table_name = ?1 AND owner_type IS ?2 AND owner_id IS ?3 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![table, owner_type, owner_id], map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(SettingRecord::try_from).collect()
    }

    fn insert(&self, record: &SettingRecord) -> Result<SettingRecord> {
        let (owner_type, owner_id) = record.scope.columns();
        let created_at = format_timestamp(record.created_at)?;
        let updated_at = format_timestamp(record.updated_at)?;

        self.conn
            .execute(
                "INSERT INTO settings (table_name, key, value, owner_type, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.table,
                    record.key,
                    record.value,
                    owner_type,
                    owner_id,
                    created_at,
                    updated_at
                ],
            )
            .map_err(|e| map_write_error(e, record))?;

        let mut stored = record.clone();
        stored.id = Some(self.conn.last_insert_rowid());
        Ok(stored)
    }

    fn update(&self, record: &SettingRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| Error::Storage("cannot update a record that was never inserted".into()))?;
        let (owner_type, owner_id) = record.scope.columns();
        let updated_at = format_timestamp(record.updated_at)?;

        let changed = self
            .conn
            .execute(
                "UPDATE settings
                 SET table_name = ?1, key = ?2, value = ?3, owner_type = ?4, owner_id = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    record.table,
                    record.key,
                    record.value,
                    owner_type,
                    owner_id,
                    updated_at,
                    id
                ],
            )
            .map_err(|e| map_write_error(e, record))?;

        if changed == 0 {
            return Err(Error::Storage(format!("record {id} no longer exists")));
        }
        Ok(())
    }

    fn delete(&self, id: RecordId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM settings WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}

/// `SQLite` storage backend
///
/// One value wraps one connection. A transaction keeps the connection locked
/// from `BEGIN IMMEDIATE` to `COMMIT`, so other users of the same value wait
/// for it. Separate values on the same file are separate connections and
/// wait on `SQLite`'s own write lock (bounded by the busy timeout).
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a database file and ensure the settings table exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        log::info!("Opened SQLite settings database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection and ensure the settings table exists
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordStore for SqliteBackend {
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Result<Option<SettingRecord>> {
        let conn = self.conn.lock_recovered();
        Session { conn: &conn }.find(table, scope, key)
    }

    fn list(&self, table: &str, scope: &Scope) -> Result<Vec<SettingRecord>> {
        let conn = self.conn.lock_recovered();
        Session { conn: &conn }.list(table, scope)
    }

    fn insert(&self, record: &SettingRecord) -> Result<SettingRecord> {
        let conn = self.conn.lock_recovered();
        Session { conn: &conn }.insert(record)
    }

    fn update(&self, record: &SettingRecord) -> Result<()> {
        let conn = self.conn.lock_recovered();
        Session { conn: &conn }.update(record)
    }

    fn delete(&self, id: RecordId) -> Result<bool> {
        let conn = self.conn.lock_recovered();
        Session { conn: &conn }.delete(id)
    }
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn transaction(&self, work: &mut dyn FnMut(&dyn RecordStore) -> Result<()>) -> Result<()> {
        let mut conn = self.conn.lock_recovered();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        log::debug!("[sqlite] transaction started");

        let result = work(&Session { conn: &tx });
        match result {
            Ok(()) => {
                tx.commit()?;
                log::debug!("[sqlite] transaction committed");
                Ok(())
            }
            Err(err) => {
                tx.rollback().inspect_err(|rollback_err| {
                    log::error!("[sqlite] rollback after `{err}` failed: {rollback_err}");
                })?;
                log::debug!("[sqlite] transaction rolled back");
                Err(err)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, scope: Scope) -> SettingRecord {
        let mut record = SettingRecord::new("site", key, scope);
        record.value = Some("1".into());
        record
    }

    #[test]
    fn test_roundtrip_record() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let owner = Scope::Owned(OwnerRef::new("User", "42"));

        let inserted = backend.insert(&record("a", owner.clone())).unwrap();
        let found = backend.find("site", &owner, "a").unwrap().unwrap();

        assert_eq!(found.id, inserted.id);
        assert_eq!(found.scope, owner);
        assert_eq!(found.value.as_deref(), Some("1"));
        assert_eq!(found.created_at.unix_timestamp(), inserted.created_at.unix_timestamp());
    }

    #[test]
    fn test_global_duplicates_rejected() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.insert(&record("a", Scope::Global)).unwrap();

        let err = backend.insert(&record("a", Scope::Global)).unwrap_err();
        assert!(matches!(err, Error::UniqueViolation { .. }), "got {err:?}");
    }

    #[test]
    fn test_global_and_owned_do_not_collide() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.insert(&record("a", Scope::Global)).unwrap();
        backend
            .insert(&record("a", Scope::Owned(OwnerRef::new("User", "1"))))
            .unwrap();
        backend
            .insert(&record("a", Scope::Owned(OwnerRef::new("Team", "1"))))
            .unwrap();

        assert_eq!(backend.list("site", &Scope::Global).unwrap().len(), 1);
    }

    #[test]
    fn test_rollback() {
        let backend = SqliteBackend::open_in_memory().unwrap();

        let result = backend.transaction(&mut |records| {
            records.insert(&record("a", Scope::Global))?;
            assert!(records.find("site", &Scope::Global, "a")?.is_some());
            Err(Error::Storage("abort".into()))
        });

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(backend.find("site", &Scope::Global, "a").unwrap().is_none());
    }

    #[test]
    fn test_commit() {
        let backend = SqliteBackend::open_in_memory().unwrap();

        backend
            .transaction(&mut |records| records.insert(&record("a", Scope::Global)).map(|_| ()))
            .unwrap();

        assert_eq!(backend.list("site", &Scope::Global).unwrap().len(), 1);
    }

    #[test]
    fn test_unique_violation_inside_transaction() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.insert(&record("a", Scope::Global)).unwrap();

        let result =
            backend.transaction(&mut |records| records.insert(&record("a", Scope::Global)).map(|_| ()));

        assert!(matches!(result, Err(Error::UniqueViolation { .. })));
    }

    #[test]
    fn test_update_missing_record() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let mut ghost = record("a", Scope::Global);
        ghost.id = Some(99);

        assert!(matches!(backend.update(&ghost), Err(Error::Storage(_))));
    }
}
