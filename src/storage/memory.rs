//! In-memory storage backend for testing

use super::{RecordStore, StorageBackend};
use crate::error::{Error, Result};
use crate::record::{RecordId, Scope, SettingRecord};
use crate::sync::RwLockExt;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

type UniqueKey = (String, Scope, String);

fn unique_key(record: &SettingRecord) -> UniqueKey {
    (record.table.clone(), record.scope.clone(), record.key.clone())
}

fn lookup_key(table: &str, scope: &Scope, key: &str) -> UniqueKey {
    (table.to_string(), scope.clone(), key.to_string())
}

/// Undo entry for one write made inside a transaction
enum Undo {
    Inserted(RecordId),
    Updated(SettingRecord),
    Deleted(SettingRecord),
}

struct Database {
    next_id: RecordId,
    rows: BTreeMap<RecordId, SettingRecord>,
    /// (table, scope, key) -> id; enforces uniqueness, `Scope::Global` included
    unique: HashMap<UniqueKey, RecordId>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
            unique: HashMap::new(),
        }
    }
}

impl Database {
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Option<SettingRecord> {
        self.unique
            .get(&lookup_key(table, scope, key))
            .and_then(|id| self.rows.get(id))
            .cloned()
    }

    fn list(&self, table: &str, scope: &Scope) -> Vec<SettingRecord> {
        self.rows
            .values()
            .filter(|r| r.table == table && r.scope == *scope)
            .cloned()
            .collect()
    }

    fn insert(&mut self, record: &SettingRecord) -> Result<SettingRecord> {
        let slot = unique_key(record);
        if self.unique.contains_key(&slot) {
            return Err(Error::UniqueViolation {
                table: record.table.clone(),
                key: record.key.clone(),
            });
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut stored = record.clone();
        stored.id = Some(id);
        self.unique.insert(slot, id);
        self.rows.insert(id, stored.clone());
        Ok(stored)
    }

    /// Overwrite a row, returning its previous state
    fn update(&mut self, record: &SettingRecord) -> Result<SettingRecord> {
        let id = record
            .id
            .ok_or_else(|| Error::Storage("cannot update a record that was never inserted".into()))?;
        let previous = self
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("record {id} no longer exists")))?;

        let old_slot = unique_key(&previous);
        let new_slot = unique_key(record);
        if old_slot != new_slot {
            if self.unique.contains_key(&new_slot) {
                return Err(Error::UniqueViolation {
                    table: record.table.clone(),
                    key: record.key.clone(),
                });
            }
            self.unique.remove(&old_slot);
            self.unique.insert(new_slot, id);
        }
        self.rows.insert(id, record.clone());
        Ok(previous)
    }

    fn remove(&mut self, id: RecordId) -> Option<SettingRecord> {
        let record = self.rows.remove(&id)?;
        self.unique.remove(&unique_key(&record));
        Some(record)
    }

    fn restore(&mut self, record: SettingRecord) -> Result<()> {
        let id = record
            .id
            .ok_or_else(|| Error::Transaction(format!("cannot restore unsaved `{}`", record.key)))?;
        let slot = unique_key(&record);
        if let Some(other) = self.unique.get(&slot).filter(|other| **other != id) {
            return Err(Error::Transaction(format!(
                "cannot restore `{}` ({}): slot taken by record {other}",
                record.key, record.scope
            )));
        }
        self.unique.insert(slot, id);
        self.rows.insert(id, record);
        Ok(())
    }

    /// Apply undo entries newest first
    ///
    /// Every entry is attempted; the failures are reported together.
    fn undo(&mut self, entries: Vec<Undo>) -> Result<()> {
        let mut failures = Vec::new();
        for undo in entries.into_iter().rev() {
            let restored = match undo {
                Undo::Inserted(id) => {
                    self.remove(id);
                    Ok(())
                }
                Undo::Updated(previous) => {
                    if let Some(id) = previous.id {
                        self.remove(id);
                    }
                    self.restore(previous)
                }
                Undo::Deleted(previous) => self.restore(previous),
            };
            if let Err(e) = restored {
                failures.push(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Transaction(format!(
                "rollback incomplete: {}",
                failures.join("; ")
            )))
        }
    }
}

/// Transaction handle holding the database write lock
///
/// Writes are journaled. Dropping the session without committing undoes
/// them, so a panic inside a transaction leaves no partial batch behind.
struct MemorySession<'a> {
    db: RefCell<&'a mut Database>,
    journal: RefCell<Vec<Undo>>,
}

impl<'a> MemorySession<'a> {
    fn new(db: &'a mut Database) -> Self {
        Self {
            db: RefCell::new(db),
            journal: RefCell::new(Vec::new()),
        }
    }

    fn commit(mut self) {
        self.journal.get_mut().clear();
    }

    fn rollback(mut self) -> Result<()> {
        let entries = std::mem::take(self.journal.get_mut());
        self.db.get_mut().undo(entries)
    }
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        let entries = std::mem::take(self.journal.get_mut());
        if entries.is_empty() {
            return;
        }
        if let Err(e) = self.db.get_mut().undo(entries) {
            log::error!("[memory] abandoned transaction: {e}");
        }
    }
}

impl RecordStore for MemorySession<'_> {
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Result<Option<SettingRecord>> {
        Ok(self.db.borrow().find(table, scope, key))
    }

    fn list(&self, table: &str, scope: &Scope) -> Result<Vec<SettingRecord>> {
        Ok(self.db.borrow().list(table, scope))
    }

    fn insert(&self, record: &SettingRecord) -> Result<SettingRecord> {
        let stored = self.db.borrow_mut().insert(record)?;
        if let Some(id) = stored.id {
            self.journal.borrow_mut().push(Undo::Inserted(id));
        }
        Ok(stored)
    }

    fn update(&self, record: &SettingRecord) -> Result<()> {
        let previous = self.db.borrow_mut().update(record)?;
        self.journal.borrow_mut().push(Undo::Updated(previous));
        Ok(())
    }

    fn delete(&self, id: RecordId) -> Result<bool> {
        let removed = self.db.borrow_mut().remove(id);
        match removed {
            Some(previous) => {
                self.journal.borrow_mut().push(Undo::Deleted(previous));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory storage (not persisted)
///
/// Clones share one database. A transaction holds the database write lock
/// until it commits or rolls back, so every other clone waits for it: reads
/// never see uncommitted writes and no outside write can join a batch.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    db: Arc<RwLock<Database>>,
}

impl MemoryBackend {
    /// Create a new, empty database
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all tables and scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.read_recovered().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryBackend {
    fn find(&self, table: &str, scope: &Scope, key: &str) -> Result<Option<SettingRecord>> {
        Ok(self.db.read_recovered().find(table, scope, key))
    }

    fn list(&self, table: &str, scope: &Scope) -> Result<Vec<SettingRecord>> {
        Ok(self.db.read_recovered().list(table, scope))
    }

    fn insert(&self, record: &SettingRecord) -> Result<SettingRecord> {
        self.db.write_recovered().insert(record)
    }

    fn update(&self, record: &SettingRecord) -> Result<()> {
        self.db.write_recovered().update(record).map(|_| ())
    }

    fn delete(&self, id: RecordId) -> Result<bool> {
        Ok(self.db.write_recovered().remove(id).is_some())
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn transaction(&self, work: &mut dyn FnMut(&dyn RecordStore) -> Result<()>) -> Result<()> {
        let mut db = self.db.write_recovered();
        let session = MemorySession::new(&mut db);
        log::debug!("[memory] transaction started");

        let result = work(&session);
        match result {
            Ok(()) => {
                session.commit();
                log::debug!("[memory] transaction committed");
                Ok(())
            }
            Err(err) => {
                session.rollback().inspect_err(|rollback_err| {
                    log::error!("[memory] rollback after `{err}` failed: {rollback_err}");
                })?;
                log::debug!("[memory] transaction rolled back");
                Err(err)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
