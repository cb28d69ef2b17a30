//! Per-key default values

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Type alias for a computed default
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Where a key's fallback value comes from
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value
    Static(Value),
    /// Computed on every lookup
    Computed(DefaultFn),
}

impl DefaultValue {
    /// Resolve to a concrete value
    #[must_use]
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Computed(compute) => compute(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(Fn)"),
        }
    }
}

/// Default values used when no record exists in the current scope
#[derive(Debug, Clone, Default)]
pub struct DefaultRegistry {
    entries: BTreeMap<String, DefaultValue>,
}

impl DefaultRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, default: DefaultValue) {
        self.entries.insert(key.into(), default);
    }

    /// Fallback value for `key`, if one was declared
    #[must_use]
    pub fn default_for(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(DefaultValue::resolve)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Every declared default, resolved
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .map(|(key, default)| (key.clone(), default.resolve()))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_static_default() {
        let mut registry = DefaultRegistry::new();
        registry.insert("a", DefaultValue::Static(json!(1)));

        assert_eq!(registry.default_for("a"), Some(json!(1)));
        assert_eq!(registry.default_for("b"), None);
    }

    #[test]
    fn test_computed_default_runs_each_lookup() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);

        let mut registry = DefaultRegistry::new();
        registry.insert(
            "tick",
            DefaultValue::Computed(Arc::new(move || json!(seen.fetch_add(1, Ordering::SeqCst)))),
        );

        assert_eq!(registry.default_for("tick"), Some(json!(0)));
        assert_eq!(registry.default_for("tick"), Some(json!(1)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_all_resolves_everything() {
        let mut registry = DefaultRegistry::new();
        registry.insert("a", DefaultValue::Static(json!("x")));
        registry.insert("b", DefaultValue::Computed(Arc::new(|| json!([1, 2]))));

        let all = registry.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all["a"], json!("x"));
        assert_eq!(all["b"], json!([1, 2]));
    }
}
