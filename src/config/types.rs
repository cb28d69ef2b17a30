//! Settings table configuration and its builder

use super::defaults::{DefaultRegistry, DefaultValue};
use super::policy::KeyPolicy;
use crate::codec::{JsonCodec, ValueCodec};
use crate::error::{Error, Result};
use crate::validation::{Rule, ValidationRules};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Immutable configuration of one logical settings table
///
/// Built once with [`SettingsConfig::builder`] and shared (behind an `Arc`) by
/// every store operating on the table. There is no way to change it after
/// [`SettingsConfigBuilder::build`].
pub struct SettingsConfig {
    table: String,
    policy: KeyPolicy,
    defaults: DefaultRegistry,
    rules: ValidationRules,
    codec: Arc<dyn ValueCodec>,
}

impl SettingsConfig {
    /// Create a new builder for the table named `table`
    ///
    /// # Example
    /// ```rust
    /// use rsettings::{Rule, SettingsConfig};
    /// use serde_json::json;
    ///
    /// let config = SettingsConfig::builder("site_settings")
    ///     .allow_keys(["theme", "max_upload_mb"])
    ///     .default("theme", "light")
    ///     .rule("max_upload_mb", Rule::range(Some(1.0), Some(512.0)))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.defaults().default_for("theme"), Some(json!("light")));
    /// ```
    pub fn builder(table: impl Into<String>) -> SettingsConfigBuilder {
        SettingsConfigBuilder::new(table)
    }

    /// Name of the logical settings table
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    #[must_use]
    pub fn defaults(&self) -> &DefaultRegistry {
        &self.defaults
    }

    #[must_use]
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    #[must_use]
    pub fn codec(&self) -> &dyn ValueCodec {
        self.codec.as_ref()
    }
}

impl fmt::Debug for SettingsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsConfig")
            .field("table", &self.table)
            .field("policy", &self.policy)
            .field("defaults", &self.defaults)
            .field("rules", &self.rules)
            .field("codec", &self.codec.name())
            .finish()
    }
}

/// Builder for creating `SettingsConfig` with a fluent API
///
/// Mistakes (bad regex, unserializable default) are remembered and reported
/// together by [`build`](Self::build), so the chain never has to be broken up.
#[derive(Clone)]
pub struct SettingsConfigBuilder {
    table: String,
    policy: KeyPolicy,
    defaults: DefaultRegistry,
    /// Defaults given as stored text, decoded with the final codec in `build`
    serialized_defaults: Vec<(String, String)>,
    rules: ValidationRules,
    codec: Arc<dyn ValueCodec>,
    errors: Vec<String>,
}

impl fmt::Debug for SettingsConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsConfigBuilder")
            .field("table", &self.table)
            .field("policy", &self.policy)
            .field("defaults", &self.defaults)
            .field("serialized_defaults", &self.serialized_defaults)
            .field("rules", &self.rules)
            .field("codec", &self.codec.name())
            .field("errors", &self.errors)
            .finish()
    }
}

impl SettingsConfigBuilder {
    /// Create a new builder for `table` with an open key policy and the JSON codec
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            policy: KeyPolicy::open(),
            defaults: DefaultRegistry::new(),
            serialized_defaults: Vec::new(),
            rules: ValidationRules::new(),
            codec: Arc::new(JsonCodec::new()),
            errors: Vec::new(),
        }
    }

    /// Restrict the table to the given keys
    ///
    /// Can be called repeatedly; the allow-list is the union of all calls.
    pub fn allow_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            self.policy.insert(key);
        }
        self
    }

    pub fn allow_key(mut self, key: impl Into<String>) -> Self {
        self.policy.insert(key);
        self
    }

    /// Static default for `key`
    pub fn default<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => self.defaults.insert(key, DefaultValue::Static(value)),
            Err(e) => self
                .errors
                .push(format!("default for `{key}` cannot be serialized: {e}")),
        }
        self
    }

    /// Default computed on every lookup
    ///
    /// # Example
    /// ```rust
    /// use rsettings::SettingsConfig;
    /// use serde_json::json;
    ///
    /// let config = SettingsConfig::builder("jobs")
    ///     .default_with("worker_count", || json!(std::thread::available_parallelism().map_or(1, |n| n.get())))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(config.defaults().default_for("worker_count").is_some());
    /// ```
    pub fn default_with<F>(mut self, key: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.defaults
            .insert(key, DefaultValue::Computed(Arc::new(compute)));
        self
    }

    /// Static default given in the codec's stored text form
    ///
    /// Decoded with the table's codec when [`build`](Self::build) runs, so it
    /// may precede a call to [`codec`](Self::codec). Empty text is rejected.
    pub fn default_serialized(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.serialized_defaults.push((key.into(), text.into()));
        self
    }

    /// Attach a validation rule to `key`
    pub fn rule(mut self, key: impl Into<String>, rule: Rule) -> Self {
        self.rules.add(key, rule);
        self
    }

    /// Attach a regex rule to `key`; an invalid pattern is reported by `build`
    pub fn pattern(mut self, key: impl Into<String>, pattern: &str) -> Self {
        let key = key.into();
        match Rule::pattern(pattern) {
            Ok(rule) => self.rules.add(key, rule),
            Err(e) => self.errors.push(format!("rule for `{key}`: {e}")),
        }
        self
    }

    /// Attach a custom check to `key`
    ///
    /// # Example
    /// ```rust
    /// use rsettings::SettingsConfig;
    ///
    /// let config = SettingsConfig::builder("site_settings")
    ///     .validate("admin_email", "email", |value| match value.as_str() {
    ///         Some(s) if !s.contains('@') => Err(format!("{s} is not an email address")),
    ///         _ => Ok(()),
    ///     })
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.rules().rules_for("admin_email").len(), 1);
    /// ```
    pub fn validate<F>(self, key: impl Into<String>, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.rule(key, Rule::custom(name, check))
    }

    /// Use a different value codec (default: JSON)
    pub fn codec(mut self, codec: impl ValueCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Build the `SettingsConfig`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing every problem found: an empty table
    /// name, defaults or rules declared for keys outside a non-empty
    /// allow-list, invalid patterns, unserializable defaults, and rules with
    /// inverted bounds.
    pub fn build(self) -> Result<SettingsConfig> {
        let Self {
            table,
            policy,
            mut defaults,
            serialized_defaults,
            rules,
            codec,
            mut errors,
        } = self;

        if table.trim().is_empty() {
            errors.push("table name cannot be empty".to_string());
        }

        for (key, text) in serialized_defaults {
            match codec.decode(&text) {
                Ok(Some(value)) => defaults.insert(key, DefaultValue::Static(value)),
                Ok(None) => errors.push(format!("default for `{key}` is empty")),
                Err(e) => errors.push(format!("default for `{key}`: {e}")),
            }
        }

        for key in defaults.keys().filter(|key| !policy.is_allowed(key)) {
            errors.push(format!("default declared for `{key}`, which is not an allowed key"));
        }

        for key in rules.keys() {
            if !policy.is_allowed(key) {
                errors.push(format!("rule declared for `{key}`, which is not an allowed key"));
            }
            for rule in rules.rules_for(key) {
                if let Err(reason) = rule.validate_definition() {
                    errors.push(format!("{} rule for `{key}`: {reason}", rule.name()));
                }
            }
        }

        if !errors.is_empty() {
            return Err(Error::Config(errors.join("; ")));
        }

        log::debug!(
            "Configured settings table '{table}' ({} allowed keys, {} defaults, codec {})",
            if policy.is_open() {
                "any".to_string()
            } else {
                policy.keys().count().to_string()
            },
            defaults.keys().count(),
            codec.name()
        );

        Ok(SettingsConfig {
            table,
            policy,
            defaults,
            rules,
            codec,
        })
    }
}
