//! Common test utilities for rsettings integration tests
//!
//! Provides shared table configurations, owners, and store fixtures for every
//! bundled backend.

#![allow(dead_code)]

use rsettings::{
    MemoryBackend, Owner, Rule, SettingsConfig, SettingsStore, StorageBackend,
};
use serde_json::json;
use std::sync::Once;

// =============================================================================
// Table Configurations
// =============================================================================

pub const SITE_TABLE: &str = "site_settings";

/// A closed table covering defaults, computed defaults and several rules
pub fn site_config() -> SettingsConfig {
    SettingsConfig::builder(SITE_TABLE)
        .allow_keys(["theme", "per_page", "title", "tags", "launch", "extra"])
        .default("theme", "light")
        .default("per_page", 20)
        .default_with("launch", || json!({"stage": "beta", "year": 2024}))
        .rule("per_page", Rule::range(Some(1.0), Some(100.0)))
        .rule("title", Rule::length(Some(3), Some(40)))
        .pattern("title", "^[A-Z]")
        .validate("title", "not_reserved", |value| match value.as_str() {
            Some("Admin") => Err("title is reserved".to_string()),
            _ => Ok(()),
        })
        .rule("theme", Rule::one_of(["light", "dark", "system"]))
        .build()
        .expect("site config is valid")
}

/// A table without an allow-list
pub fn open_config() -> SettingsConfig {
    SettingsConfig::builder("scratch")
        .default("greeting", "hello")
        .build()
        .expect("open config is valid")
}

// =============================================================================
// Owners
// =============================================================================

pub struct User(pub u64);

impl Owner for User {
    fn owner_type(&self) -> String {
        "User".into()
    }

    fn owner_id(&self) -> String {
        self.0.to_string()
    }
}

pub struct Team(pub u64);

impl Owner for Team {
    fn owner_type(&self) -> String {
        "Team".into()
    }

    fn owner_id(&self) -> String {
        self.0.to_string()
    }
}

// =============================================================================
// Store Fixtures
// =============================================================================

static LOGGING: Once = Once::new();

/// Route library logs to the test output (`RUST_LOG=debug` to see them)
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn memory_store(config: SettingsConfig) -> SettingsStore<MemoryBackend> {
    init_logging();
    SettingsStore::new(config, MemoryBackend::new())
}

#[cfg(feature = "sqlite")]
pub fn sqlite_store(config: SettingsConfig) -> SettingsStore<rsettings::SqliteBackend> {
    init_logging();
    let backend = rsettings::SqliteBackend::open_in_memory().expect("in-memory sqlite");
    SettingsStore::new(config, backend)
}

/// Number of records stored for a store's table and scope
pub fn record_count<B: StorageBackend>(store: &SettingsStore<B>) -> usize {
    store
        .backend()
        .list(store.config().table(), store.scope())
        .expect("list records")
        .len()
}

/// Generate one `#[test]` per bundled backend for each generic test body.
///
/// Each listed function must have the signature
/// `fn name<B: StorageBackend>(store_for: impl Fn(SettingsConfig) -> SettingsStore<B>)`.
#[allow(unused_macros)]
macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod memory {
            $(
                #[test]
                fn $name() {
                    super::$name(crate::common::memory_store);
                }
            )*
        }

        #[cfg(feature = "sqlite")]
        mod sqlite {
            $(
                #[test]
                fn $name() {
                    super::$name(crate::common::sqlite_store);
                }
            )*
        }
    };
}
