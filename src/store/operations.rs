use super::{Settings, SettingsStore};
use crate::error::{Error, Result, ValidationErrors};
use crate::record::SettingRecord;
use crate::storage::{RecordStore, StorageBackend, transaction};
use crate::validation::{inclusion_violation, uniqueness_violation};
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

impl<B: StorageBackend> SettingsStore<B> {
    /// Get the value of `key` in this store's scope.
    ///
    /// Returns the stored value when a record exists, otherwise the key's
    /// default (`None` when no default is declared). A stored `null` is
    /// `Some(Value::Null)`; a record whose value was never populated is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `key` is rejected by the key policy ([`Error::KeyInvalid`])
    /// - Storage read fails
    /// - The stored text cannot be decoded
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_allowed(key)?;

        match self.backend.find(self.table(), &self.scope, key)? {
            Some(record) => {
                debug!("[{}] {key} read from {} record", self.table(), self.scope);
                record.decode_value(self.config.codec())
            }
            None => Ok(self.config.defaults().default_for(key)),
        }
    }

    /// Get a setting and deserialize it into `T`.
    ///
    /// An absent value deserializes from `null`, so `Option<T>` targets read
    /// missing settings as `None`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus [`Error::TypeMismatch`] when the value
    /// does not fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| Error::TypeMismatch {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Raw stored record for `key` in this scope, if any
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyInvalid`] for rejected keys or a storage error.
    pub fn record(&self, key: &str) -> Result<Option<SettingRecord>> {
        self.ensure_allowed(key)?;
        self.backend.find(self.table(), &self.scope, key)
    }

    /// Store `value` under `key` in this scope and return it.
    ///
    /// Creates the record on first write and updates it in place afterwards.
    /// The record is validated before it is persisted; every failed rule is
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `key` is rejected by the key policy ([`Error::KeyInvalid`])
    /// - Validation fails ([`Error::Invalid`] carrying every violation)
    /// - The value cannot be encoded, or storage fails
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<Value> {
        self.write(&*self.backend, key, value.into())
    }

    /// Serialize `value` and store it under `key`
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set), plus [`Error::Encode`] when `value` cannot
    /// be represented.
    pub fn set_as<T: Serialize>(&self, key: &str, value: T) -> Result<T> {
        let json = serde_json::to_value(&value).map_err(|e| Error::Encode {
            codec: "json",
            reason: e.to_string(),
        })?;
        self.set(key, json)?;
        Ok(value)
    }

    /// Set several keys atomically.
    ///
    /// Every pair is attempted inside one transaction. Rejected keys and
    /// validation failures are collected into a single [`Error::Invalid`];
    /// if anything failed the transaction is rolled back and no pair is
    /// persisted. On success returns [`get_all`](Self::get_all) as seen by
    /// the committed transaction.
    ///
    /// The transaction is exclusive: concurrent `set` and `set_many` calls on
    /// the same backend wait for it instead of joining it. Validators run
    /// inside it and must not call back into a store on the same backend.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any pair is rejected or invalid ([`Error::Invalid`] with all violations)
    /// - Storage or codec fails (returned as is, after rolling back)
    pub fn set_many<I, K, V>(&self, pairs: I) -> Result<Settings>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let pairs: Vec<(K, Value)> = pairs.into_iter().map(|(k, v)| (k, v.into())).collect();

        transaction(&*self.backend, |records| {
            let mut errors = ValidationErrors::new();

            for (key, value) in pairs {
                let key = key.as_ref();
                match self.write(records, key, value) {
                    Ok(_) => {}
                    Err(Error::KeyInvalid { key }) => errors.push(inclusion_violation(&key)),
                    Err(Error::Invalid(violations)) => errors.extend(violations),
                    Err(e) => return Err(e),
                }
            }

            if !errors.is_empty() {
                warn!(
                    "[{}] batch for {} rolled back: {errors}",
                    self.table(),
                    self.scope
                );
                return Err(Error::Invalid(errors));
            }

            self.resolve_all(records)
        })
    }

    /// Every default overlaid with every stored value in this scope.
    ///
    /// Stored values win over defaults; a record without a value appears as
    /// `null`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or a stored value cannot be decoded.
    pub fn get_all(&self) -> Result<Settings> {
        self.resolve_all(&*self.backend)
    }

    /// Validate and persist one value through `records`
    fn write<R: RecordStore + ?Sized>(&self, records: &R, key: &str, value: Value) -> Result<Value> {
        self.ensure_allowed(key)?;

        let mut record = match records.find(self.table(), &self.scope, key)? {
            Some(record) => record,
            None => SettingRecord::new(self.table(), key, self.scope.clone()),
        };
        record.assign_value(self.config.codec(), &value)?;

        self.config
            .rules()
            .validate(&record, Some(&value), self.config.policy(), records)?
            .into_result()?;

        if record.is_persisted() {
            records.update(&record)?;
            debug!("[{}] {key} updated for {}", self.table(), self.scope);
        } else {
            match records.insert(&record) {
                Ok(_) => debug!("[{}] {key} created for {}", self.table(), self.scope),
                Err(Error::UniqueViolation { .. }) => {
                    // Another writer created the record after our lookup
                    warn!(
                        "[{}] {key} for {} was created concurrently",
                        self.table(),
                        self.scope
                    );
                    return Err(Error::Invalid(vec![uniqueness_violation(key)].into()));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(value)
    }

    fn resolve_all<R: RecordStore + ?Sized>(&self, records: &R) -> Result<Settings> {
        let mut settings = self.config.defaults().all();

        for record in records.list(self.table(), &self.scope)? {
            let value = record
                .decode_value(self.config.codec())?
                .unwrap_or(Value::Null);
            settings.insert(record.key, value);
        }

        Ok(settings)
    }

    /// Delete the record for `key` in this scope.
    ///
    /// Afterwards [`get`](Self::get) falls back to the default again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SettingNotFound`] if no record exists, or a storage error.
    pub fn destroy(&self, key: &str) -> Result<()> {
        let removed = match self.backend.find(self.table(), &self.scope, key)? {
            Some(SettingRecord { id: Some(id), .. }) => self.backend.delete(id)?,
            _ => false,
        };

        if !removed {
            return Err(Error::SettingNotFound(key.to_string()));
        }

        debug!("[{}] {key} destroyed for {}", self.table(), self.scope);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
