//! # rsettings - key/value settings tables
//!
//! A small library for storing application settings as key/value records in a
//! relational table, with allow-listed keys, defaults, per-owner scoping and
//! validation.
//!
//! ## Features
//!
//! - **Allow-lists**: Restrict a table to declared keys; reads and writes of other keys fail
//! - **Defaults**: Static or computed fallbacks for keys with no stored record
//! - **Owner Scoping**: Bind a store to one owner entity (e.g., a user) to get per-owner settings
//! - **Validation**: Inclusion and uniqueness checks plus per-key rules, with every failure reported
//! - **Atomic Batches**: `set_many` writes several keys in one transaction or none at all
//! - **Backends**: In-memory for tests, `SQLite` via `rusqlite` (`sqlite` feature, default)
//! - **Codecs**: JSON by default, YAML with the `yaml` feature
//! - **Typed Accessors**: `#[derive(SettingsSchema)]` with the `derive` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use rsettings::{MemoryBackend, Rule, SettingsConfig, SettingsStore};
//! use serde_json::json;
//!
//! # fn main() -> rsettings::Result<()> {
//! let config = SettingsConfig::builder("site_settings")
//!     .allow_keys(["title", "per_page"])
//!     .default("per_page", 20)
//!     .rule("per_page", Rule::range(Some(1.0), Some(100.0)))
//!     .build()?;
//!
//! let store = SettingsStore::new(config, MemoryBackend::new());
//!
//! store.set("title", "My Site")?;
//! assert_eq!(store.get("title")?, Some(json!("My Site")));
//! assert_eq!(store.get("per_page")?, Some(json!(20)));
//!
//! // Unknown keys are rejected
//! assert!(store.set("colour", "red").unwrap_err().is_key_invalid());
//!
//! // Several keys at once: all or nothing
//! let err = store.set_many([("title", json!("New")), ("per_page", json!(0))]).unwrap_err();
//! assert_eq!(err.violations().map(|v| v.len()), Some(1));
//! assert_eq!(store.get("title")?, Some(json!("My Site")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Owner Scoping
//!
//! ```rust
//! use rsettings::{MemoryBackend, Owner, SettingsConfig, SettingsStore};
//! use serde_json::json;
//!
//! struct User {
//!     id: u64,
//! }
//!
//! impl Owner for User {
//!     fn owner_type(&self) -> String {
//!         "User".into()
//!     }
//!
//!     fn owner_id(&self) -> String {
//!         self.id.to_string()
//!     }
//! }
//!
//! # fn main() -> rsettings::Result<()> {
//! let config = SettingsConfig::builder("preferences")
//!     .default("theme", "light")
//!     .build()?;
//! let store = SettingsStore::new(config, MemoryBackend::new());
//!
//! let alice = store.for_owner(&User { id: 1 });
//! alice.set("theme", "dark")?;
//!
//! assert_eq!(alice.get("theme")?, Some(json!("dark")));
//! assert_eq!(store.for_owner(&User { id: 2 }).get("theme")?, Some(json!("light")));
//! # Ok(())
//! # }
//! ```
//!
//! ## `SQLite`
//!
//! ```rust,no_run
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> rsettings::Result<()> {
//! use rsettings::{SettingsConfig, SettingsStore, SqliteBackend};
//!
//! let backend = SqliteBackend::open("settings.db")?;
//! let store = SettingsStore::new(SettingsConfig::builder("site_settings").build()?, backend);
//! store.set("maintenance", true)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```

// Core modules
pub mod codec;
mod error;
pub mod record;
pub mod storage;
mod store;
mod sync;
pub mod validation;

// Grouped modules
pub mod config;

// Re-exports from core
pub use codec::{JsonCodec, ValueCodec};
#[cfg(feature = "yaml")]
pub use codec::YamlCodec;
pub use error::{Error, Result, ValidationErrors, Violation};
pub use record::{Owner, OwnerRef, RecordId, Scope, SettingRecord};
pub use storage::{MemoryBackend, RecordStore, StorageBackend};
#[cfg(feature = "sqlite")]
pub use storage::SqliteBackend;
pub use store::{Settings, SettingsStore};
pub use validation::{Rule, ValidationRules};

// Re-exports from config
pub use config::{
    DefaultRegistry, DefaultValue, KeyPolicy, SettingsConfig, SettingsConfigBuilder,
    SettingsSchema,
};

// Derive macro re-export (requires `derive` feature)
/// Derive macro for auto-generating `SettingsSchema` implementations and
/// typed accessors.
///
/// # Example
///
/// ```rust,ignore
/// use rsettings::{DeriveSettingsSchema, MemoryBackend, SettingsStore};
///
/// #[derive(Default, DeriveSettingsSchema)]
/// #[settings(table = "site_settings")]
/// struct SiteSettings {
///     #[setting(min = 1, max = 100)]
///     per_page: u32,
/// }
///
/// let store = SettingsStore::from_schema::<SiteSettings>(MemoryBackend::new())?;
/// store.set_per_page(50)?;
/// assert_eq!(store.per_page()?, 50);
/// ```
#[cfg(feature = "derive")]
pub use rsettings_derive::SettingsSchema as DeriveSettingsSchema;
