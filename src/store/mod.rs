//! Settings store: the public face of one settings table
//!
//! A [`SettingsStore`] couples an immutable [`SettingsConfig`], a storage
//! backend and a [`Scope`]. Stores are cheap to clone; clones share the
//! configuration and the backend.

mod operations;

use crate::config::{SettingsConfig, SettingsSchema};
use crate::error::{Error, Result};
use crate::record::{Owner, OwnerRef, Scope};
use crate::storage::{MemoryBackend, StorageBackend};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolved settings of one scope: defaults overlaid with stored values
pub type Settings = BTreeMap<String, Value>;

/// Key/value settings store bound to one table and one scope
///
/// # Example
///
/// ```rust
/// use rsettings::{MemoryBackend, OwnerRef, SettingsConfig, SettingsStore};
/// use serde_json::json;
///
/// let config = SettingsConfig::builder("site_settings")
///     .allow_keys(["theme", "per_page"])
///     .default("theme", "light")
///     .build()?;
/// let store = SettingsStore::new(config, MemoryBackend::new());
///
/// assert_eq!(store.get("theme")?, Some(json!("light")));
/// store.set("theme", "dark")?;
/// assert_eq!(store.get("theme")?, Some(json!("dark")));
///
/// // Owner-scoped settings do not see global records
/// let alice = store.for_owner(&OwnerRef::new("User", "1"));
/// assert_eq!(alice.get("theme")?, Some(json!("light")));
/// # Ok::<(), rsettings::Error>(())
/// ```
pub struct SettingsStore<B: StorageBackend = MemoryBackend> {
    pub(crate) config: Arc<SettingsConfig>,
    pub(crate) backend: Arc<B>,
    pub(crate) scope: Scope,
}

impl<B: StorageBackend> Clone for SettingsStore<B> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            backend: Arc::clone(&self.backend),
            scope: self.scope.clone(),
        }
    }
}

impl<B: StorageBackend> std::fmt::Debug for SettingsStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("table", &self.config.table())
            .field("backend", &self.backend.name())
            .field("scope", &self.scope)
            .finish()
    }
}

impl<B: StorageBackend> SettingsStore<B> {
    /// Global store for the table described by `config`
    pub fn new(config: SettingsConfig, backend: B) -> Self {
        Self::with_shared(Arc::new(config), Arc::new(backend))
    }

    /// Global store over an already shared configuration and backend
    pub fn with_shared(config: Arc<SettingsConfig>, backend: Arc<B>) -> Self {
        info!(
            "Settings store for table '{}' on {} backend",
            config.table(),
            backend.name()
        );
        Self {
            config,
            backend,
            scope: Scope::Global,
        }
    }

    /// Global store for a table declared with [`SettingsSchema`]
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the schema's configuration is invalid.
    pub fn from_schema<S: SettingsSchema>(backend: B) -> Result<Self> {
        Ok(Self::new(S::config()?, backend))
    }

    /// A store bound to `owner`, sharing this store's table and backend
    ///
    /// Reads and writes through the returned store only see records owned by
    /// `owner`. Binding replaces any previous owner.
    #[must_use]
    pub fn for_owner<O: Owner + ?Sized>(&self, owner: &O) -> Self {
        self.with_scope(Scope::Owned(OwnerRef::of(owner)))
    }

    /// The unbound (global) store for the same table and backend
    #[must_use]
    pub fn global(&self) -> Self {
        self.with_scope(Scope::Global)
    }

    fn with_scope(&self, scope: Scope) -> Self {
        Self {
            config: Arc::clone(&self.config),
            backend: Arc::clone(&self.backend),
            scope,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SettingsConfig {
        &self.config
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether the table's key policy accepts `key`
    #[must_use]
    pub fn is_key_allowed(&self, key: &str) -> bool {
        self.config.policy().is_allowed(key)
    }

    pub(crate) fn ensure_allowed(&self, key: &str) -> Result<()> {
        if self.is_key_allowed(key) {
            Ok(())
        } else {
            Err(Error::KeyInvalid {
                key: key.to_string(),
            })
        }
    }

    pub(crate) fn table(&self) -> &str {
        self.config.table()
    }
}
