//! Declarative settings tables

use super::types::{SettingsConfig, SettingsConfigBuilder};
use crate::error::Result;

/// Trait for types that describe a settings table
///
/// Usually derived with `#[derive(SettingsSchema)]` (requires the `derive`
/// feature), which turns struct fields into allowed keys, their `Default`
/// values into defaults, and `#[setting(...)]` attributes into rules.
///
/// # Example
///
/// ```rust
/// use rsettings::{Rule, SettingsConfigBuilder, SettingsSchema};
///
/// struct Mailer;
///
/// impl SettingsSchema for Mailer {
///     fn table_name() -> &'static str {
///         "mailer"
///     }
///
///     fn configure(builder: SettingsConfigBuilder) -> SettingsConfigBuilder {
///         builder
///             .allow_keys(["host", "port"])
///             .default("port", 587)
///             .rule("host", Rule::required())
///     }
/// }
///
/// let config = Mailer::config().unwrap();
/// assert_eq!(config.table(), "mailer");
/// ```
pub trait SettingsSchema {
    /// Name of the logical settings table
    fn table_name() -> &'static str;

    /// Declare keys, defaults and rules on a builder for [`table_name`](Self::table_name)
    fn configure(builder: SettingsConfigBuilder) -> SettingsConfigBuilder;

    /// Build the table configuration
    fn config() -> Result<SettingsConfig> {
        Self::configure(SettingsConfig::builder(Self::table_name())).build()
    }
}
