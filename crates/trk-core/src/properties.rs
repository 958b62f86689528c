//! Named string attributes attached to an event or to the identity itself.

use std::collections::BTreeMap;

/// A mapping from property name to an optional string value.
///
/// Keys are unique and the last write wins. Absent values are kept so callers
/// can pass partially filled maps through unchanged, but they are skipped when
/// the bag is rendered into a request, as are empty keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    entries: BTreeMap<String, Option<String>>,
}

impl PropertyBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), Some(value.into()));
        self
    }

    /// Sets `key` to an optional value. `None` is stored but never encoded.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<String>) -> &mut Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Builds a bag from pairs whose values may be absent.
    pub fn from_optional<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<String>)>,
    {
        let mut bag = Self::new();
        for (key, value) in pairs {
            bag.insert_opt(key, value);
        }
        bag
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Copies every entry of `other` into this bag; `other` wins on collision.
    pub fn extend_from(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Returns the value stored for `key`, if present and not absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Option::as_deref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries that would be encoded: non-empty key, present value.
    pub fn valid_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(key, value)| {
            let value = value.as_deref()?;
            (!key.is_empty()).then_some((key.as_str(), value))
        })
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyBag
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (key, value) in iter {
            bag.insert(key, value);
        }
        bag
    }
}

impl<K, V> Extend<(K, V)> for PropertyBag
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let mut bag = PropertyBag::new();
        bag.insert("plan", "free").insert("plan", "pro");
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get("plan"), Some("pro"));
    }

    #[test]
    fn valid_entries_skip_absent_values_and_empty_keys() {
        let bag = PropertyBag::from_optional([
            ("a", Some("1".to_string())),
            ("b", None),
            ("", Some("orphan".to_string())),
        ]);

        assert_eq!(bag.len(), 3);
        let valid: Vec<_> = bag.valid_entries().collect();
        assert_eq!(valid, vec![("a", "1")]);
    }

    #[test]
    fn extend_from_prefers_other() {
        let mut base = PropertyBag::new().with("systemName", "linux").with("k", "old");
        let extra = PropertyBag::new().with("k", "new");
        base.extend_from(&extra);
        assert_eq!(base.get("k"), Some("new"));
        assert_eq!(base.get("systemName"), Some("linux"));
    }

    #[test]
    fn collects_from_string_pairs() {
        let bag: PropertyBag = vec![("x", "1"), ("y", "2")].into_iter().collect();
        assert_eq!(bag.get("x"), Some("1"));
        assert_eq!(bag.get("y"), Some("2"));
    }
}
