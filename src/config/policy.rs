//! Key allow-list policy

use std::collections::BTreeSet;

/// Decides which keys a settings table accepts.
///
/// An empty allow-list is an open policy (every key is accepted). Once at
/// least one key is declared the policy is closed and only declared keys pass.
/// The same check gates reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPolicy {
    allowed: BTreeSet<String>,
}

impl KeyPolicy {
    /// Open policy accepting every key
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Policy accepting exactly the given keys (open if `keys` is empty)
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            allowed: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>) {
        self.allowed.insert(key.into());
    }

    /// Whether `key` may be read or written
    #[must_use]
    pub fn is_allowed(&self, key: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(key)
    }

    /// True when no allow-list was declared
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Declared keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_policy_allows_everything() {
        let policy = KeyPolicy::open();
        assert!(policy.is_open());
        assert!(policy.is_allowed("anything"));
        assert!(policy.is_allowed(""));
    }

    #[test]
    fn test_closed_policy() {
        let policy = KeyPolicy::with_keys(["a", "b"]);
        assert!(!policy.is_open());
        assert!(policy.is_allowed("a"));
        assert!(policy.is_allowed("b"));
        assert!(!policy.is_allowed("c"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let policy = KeyPolicy::with_keys(["Theme"]);
        assert!(policy.is_allowed("Theme"));
        assert!(!policy.is_allowed("theme"));
    }

    #[test]
    fn test_empty_iterator_is_open() {
        let policy = KeyPolicy::with_keys(Vec::<String>::new());
        assert!(policy.is_open());
    }
}
