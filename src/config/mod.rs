//! Core configuration types and traits
//!
//! This module contains the per-table configuration of a settings store:
//! - `KeyPolicy` - Which keys a table accepts
//! - `DefaultRegistry` - Fallback values for keys with no stored record
//! - `SettingsConfig` - Immutable bundle of policy, defaults, rules and codec
//! - `SettingsSchema` - Trait for declaring a table on a type

mod defaults;
mod policy;
mod schema;
mod types;

pub use defaults::{DefaultFn, DefaultRegistry, DefaultValue};
pub use policy::KeyPolicy;
pub use schema::SettingsSchema;
pub use types::{SettingsConfig, SettingsConfigBuilder};
