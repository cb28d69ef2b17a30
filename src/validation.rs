//! Validation rules evaluated before a record is persisted
//!
//! Every write runs, in order:
//!
//! 1. the inclusion check (key must pass the table's [`KeyPolicy`]),
//! 2. the uniqueness check (no other record with the same scope and key),
//! 3. the rules attached to the record's key.
//!
//! All failures are collected into one [`ValidationErrors`]; nothing stops at
//! the first failure.

use crate::config::KeyPolicy;
use crate::error::{Error, Result, ValidationErrors, Violation};
use crate::record::SettingRecord;
use crate::storage::RecordStore;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Type alias for a custom check
///
/// Returns `Err(message)` to reject the value.
pub type CheckFn = Arc<dyn Fn(&Value) -> std::result::Result<(), String> + Send + Sync>;

/// A validation rule attached to one key
///
/// Built-in rules other than [`Rule::Required`] accept an absent or `null`
/// value; combine them with `Required` to reject it.
#[derive(Clone)]
pub enum Rule {
    /// Value must be present: not absent, `null`, `""`, `[]` or `{}`
    Required,
    /// Value must equal one of the listed values
    OneOf(Vec<Value>),
    /// String value must match the regex
    Pattern(Regex),
    /// Character count of a string, or item count of an array
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Numeric bounds, inclusive
    Range { min: Option<f64>, max: Option<f64> },
    /// Caller supplied check
    Custom { name: String, check: CheckFn },
}

impl Rule {
    #[must_use]
    pub fn required() -> Self {
        Rule::Required
    }

    pub fn one_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Rule::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Regex rule
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `pattern` is not a valid regex.
    pub fn pattern(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::Config("Pattern cannot be empty string".into()));
        }
        Regex::new(pattern)
            .map(Rule::Pattern)
            .map_err(|e| Error::Config(format!("Invalid regex pattern '{pattern}': {e}")))
    }

    #[must_use]
    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Rule::Length { min, max }
    }

    #[must_use]
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Rule::Range { min, max }
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Rule::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Short rule name used in [`Violation::rule`]
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Rule::Required => "required",
            Rule::OneOf(_) => "one_of",
            Rule::Pattern(_) => "pattern",
            Rule::Length { .. } => "length",
            Rule::Range { .. } => "range",
            Rule::Custom { name, .. } => name,
        }
    }

    /// Check the rule's own parameters
    pub(crate) fn validate_definition(&self) -> std::result::Result<(), String> {
        match self {
            Rule::Length {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(format!("min ({min}) cannot be greater than max ({max})")),
            Rule::Range {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(format!("min ({min}) cannot be greater than max ({max})")),
            Rule::OneOf(values) if values.is_empty() => {
                Err("one_of needs at least one value".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Evaluate against a value (`None` = absent)
    pub fn check(&self, key: &str, value: Option<&Value>) -> std::result::Result<(), String> {
        let value = match value {
            None | Some(Value::Null) => {
                return match self {
                    Rule::Required => Err(format!("{key} can't be blank")),
                    Rule::Custom { check, .. } => check(&Value::Null),
                    _ => Ok(()),
                };
            }
            Some(value) => value,
        };

        match self {
            Rule::Required => {
                let blank = match value {
                    Value::String(s) => s.trim().is_empty(),
                    Value::Array(items) => items.is_empty(),
                    Value::Object(map) => map.is_empty(),
                    _ => false,
                };
                if blank {
                    return Err(format!("{key} can't be blank"));
                }
            }
            Rule::OneOf(values) => {
                if !values.contains(value) {
                    return Err(format!("{key} is not included in the list"));
                }
            }
            Rule::Pattern(regex) => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("{key} must be a string"))?;
                if !regex.is_match(text) {
                    return Err(format!("{key} does not match pattern: {}", regex.as_str()));
                }
            }
            Rule::Length { min, max } => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(items) => items.len(),
                    _ => return Err(format!("{key} must be a string or a list")),
                };
                if let Some(min) = min {
                    if len < *min {
                        return Err(format!("{key} is too short (minimum is {min})"));
                    }
                }
                if let Some(max) = max {
                    if len > *max {
                        return Err(format!("{key} is too long (maximum is {max})"));
                    }
                }
            }
            Rule::Range { min, max } => {
                let num = value
                    .as_f64()
                    .ok_or_else(|| format!("{key} must be a number"))?;
                if let Some(min) = min {
                    if num < *min {
                        return Err(format!("{key} must be at least {min}"));
                    }
                }
                if let Some(max) = max {
                    if num > *max {
                        return Err(format!("{key} must be at most {max}"));
                    }
                }
            }
            Rule::Custom { check, .. } => check(value)?,
        }
        Ok(())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("Required"),
            Rule::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Rule::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Rule::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Rule::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Rule::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

/// Per-key rule sets of one settings table
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    rules: BTreeMap<String, Vec<Rule>>,
}

impl ValidationRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, key: impl Into<String>, rule: Rule) {
        self.rules.entry(key.into()).or_default().push(rule);
    }

    /// Rules attached to `key`, in declaration order
    #[must_use]
    pub fn rules_for(&self, key: &str) -> &[Rule] {
        self.rules.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Run only the rules attached to `key`
    #[must_use]
    pub fn check_value(&self, key: &str, value: Option<&Value>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for rule in self.rules_for(key) {
            if let Err(message) = rule.check(key, value) {
                errors.push(Violation::new(key, rule.name(), message));
            }
        }
        errors
    }

    /// Full pre-persist validation of `record`
    ///
    /// `value` is the decoded value being written. Returns the collected
    /// violations; storage failures during the uniqueness lookup are returned
    /// as errors.
    pub fn validate<R: RecordStore + ?Sized>(
        &self,
        record: &SettingRecord,
        value: Option<&Value>,
        policy: &KeyPolicy,
        records: &R,
    ) -> Result<ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let key = record.key.as_str();

        if !policy.is_allowed(key) {
            errors.push(inclusion_violation(key));
        }

        if let Some(existing) = records.find(&record.table, &record.scope, key)? {
            if existing.id != record.id {
                errors.push(uniqueness_violation(key));
            }
        }

        errors.extend(self.check_value(key, value));
        Ok(errors)
    }
}

pub(crate) fn inclusion_violation(key: &str) -> Violation {
    Violation::new(key, "inclusion", format!("`{key}` is an unallowed setting"))
}

pub(crate) fn uniqueness_violation(key: &str) -> Violation {
    Violation::new(key, "uniqueness", format!("`{key}` has already been taken"))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Scope;
    use crate::storage::{MemoryBackend, RecordStore};
    use serde_json::json;

    #[test]
    fn test_required() {
        let rule = Rule::required();
        assert!(rule.check("a", None).is_err());
        assert!(rule.check("a", Some(&Value::Null)).is_err());
        assert!(rule.check("a", Some(&json!("  "))).is_err());
        assert!(rule.check("a", Some(&json!([]))).is_err());
        assert!(rule.check("a", Some(&json!(false))).is_ok());
        assert!(rule.check("a", Some(&json!(0))).is_ok());
        assert!(rule.check("a", Some(&json!("x"))).is_ok());
    }

    #[test]
    fn test_range() {
        let rule = Rule::range(Some(1.0), Some(65535.0));
        assert!(rule.check("port", Some(&json!(8080))).is_ok());
        assert_eq!(
            rule.check("port", Some(&json!(0))).unwrap_err(),
            "port must be at least 1"
        );
        assert!(rule.check("port", Some(&json!(70000))).is_err());
        assert!(rule.check("port", Some(&json!("8080"))).is_err());
        assert!(rule.check("port", None).is_ok());
    }

    #[test]
    fn test_pattern() {
        let rule = Rule::pattern(r"^#[0-9a-f]{6}$").unwrap();
        assert!(rule.check("color", Some(&json!("#00ff00"))).is_ok());
        assert!(rule.check("color", Some(&json!("green"))).is_err());
        assert!(rule.check("color", Some(&json!(3))).is_err());

        assert!(Rule::pattern("(").is_err());
        assert!(Rule::pattern("").is_err());
    }

    #[test]
    fn test_length_counts_chars_and_items() {
        let rule = Rule::length(Some(2), Some(3));
        assert!(rule.check("k", Some(&json!("üü"))).is_ok());
        assert!(rule.check("k", Some(&json!("ü"))).is_err());
        assert!(rule.check("k", Some(&json!([1, 2, 3, 4]))).is_err());
        assert!(rule.check("k", Some(&json!({"a": 1}))).is_err());
    }

    #[test]
    fn test_one_of() {
        let rule = Rule::one_of(["light", "dark"]);
        assert!(rule.check("theme", Some(&json!("dark"))).is_ok());
        assert!(rule.check("theme", Some(&json!("blue"))).is_err());
    }

    #[test]
    fn test_rule_definition_checks() {
        assert!(Rule::range(Some(10.0), Some(1.0)).validate_definition().is_err());
        assert!(Rule::length(Some(5), Some(1)).validate_definition().is_err());
        assert!(Rule::one_of(Vec::<Value>::new()).validate_definition().is_err());
        assert!(Rule::range(Some(1.0), None).validate_definition().is_ok());
    }

    #[test]
    fn test_rules_only_fire_for_their_key() {
        let mut rules = ValidationRules::new();
        rules.add("a", Rule::custom("never", |_| Err("a rejected".into())));

        assert_eq!(rules.check_value("a", Some(&json!(1))).len(), 1);
        assert!(rules.check_value("b", Some(&json!(1))).is_empty());
    }

    #[test]
    fn test_all_failures_are_collected() {
        let mut rules = ValidationRules::new();
        rules.add("name", Rule::length(Some(5), None));
        rules.add("name", Rule::pattern("^[A-Z]").unwrap());
        rules.add("name", Rule::custom("not_admin", |v| {
            if v == "adm" {
                Err("name is reserved".into())
            } else {
                Ok(())
            }
        }));

        let errors = rules.check_value("name", Some(&json!("adm")));
        let names: Vec<_> = errors.iter().map(|v| v.rule.as_str()).collect();
        assert_eq!(names, vec!["length", "pattern", "not_admin"]);
    }

    #[test]
    fn test_validate_structural_checks() {
        let backend = MemoryBackend::new();
        let policy = KeyPolicy::with_keys(["a"]);
        let rules = ValidationRules::new();

        let mut existing = SettingRecord::new("t", "a", Scope::Global);
        existing.value = Some("1".into());
        backend.insert(&existing).unwrap();

        // Unknown key and a duplicate of an existing record
        let outsider = SettingRecord::new("t", "z", Scope::Global);
        let errors = rules.validate(&outsider, None, &policy, &backend).unwrap();
        assert_eq!(errors.messages(), vec!["`z` is an unallowed setting"]);

        let duplicate = SettingRecord::new("t", "a", Scope::Global);
        let errors = rules.validate(&duplicate, None, &policy, &backend).unwrap();
        assert_eq!(errors.messages(), vec!["`a` has already been taken"]);

        // The stored record itself is not a conflict with itself
        let stored = backend.find("t", &Scope::Global, "a").unwrap().unwrap();
        let errors = rules.validate(&stored, None, &policy, &backend).unwrap();
        assert!(errors.is_empty());
    }
}
