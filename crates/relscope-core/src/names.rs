//! Case-insensitive name keyed map.
//!
//! Catalog identifiers are compared without regard to case: `orders`,
//! `Orders` and `ORDERS` name the same table. Keys are upper-cased on insert
//! and on lookup, so the map never depends on a locale-aware collation.

use std::collections::BTreeMap;
use std::collections::btree_map;

/// Upper-case `name` for use as a map key.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.to_uppercase()
}

/// A map keyed by names compared without regard to case.
///
/// Iteration order is the order of the normalized (upper-cased) keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseInsensitiveMap<V> {
    inner: BTreeMap<String, V>,
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }
}

impl<V> CaseInsensitiveMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, returning the value previously stored
    /// under any casing of the same key.
    pub fn insert(&mut self, key: &str, value: V) -> Option<V> {
        self.inner.insert(normalize(key), value)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.inner.get(&normalize(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.inner.get_mut(&normalize(key))
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(&normalize(key))
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.inner.remove(&normalize(key))
    }

    /// Entry for `key`, normalized.
    pub fn entry(&mut self, key: &str) -> btree_map::Entry<'_, String, V> {
        self.inner.entry(normalize(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn values(&self) -> btree_map::Values<'_, String, V> {
        self.inner.values()
    }

    pub fn values_mut(&mut self) -> btree_map::ValuesMut<'_, String, V> {
        self.inner.values_mut()
    }

    /// Iterate `(normalized key, value)` pairs.
    pub fn iter(&self) -> btree_map::Iter<'_, String, V> {
        self.inner.iter()
    }

    /// Consume the map, yielding values in normalized key order.
    pub fn into_values(self) -> btree_map::IntoValues<String, V> {
        self.inner.into_values()
    }
}

impl<'a, V> IntoIterator for &'a CaseInsensitiveMap<V> {
    type Item = (&'a String, &'a V);
    type IntoIter = btree_map::Iter<'a, String, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut map = CaseInsensitiveMap::new();
        map.insert("LineItems", 1);

        assert_eq!(map.get("lineitems"), Some(&1));
        assert_eq!(map.get("LINEITEMS"), Some(&1));
        assert!(map.contains_key("lineItems"));
    }

    #[test]
    fn differently_cased_keys_collide() {
        let mut map = CaseInsensitiveMap::new();
        assert_eq!(map.insert("orders", 1), None);
        assert_eq!(map.insert("ORDERS", 2), Some(1));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove("Orders"), Some(2));
        assert!(map.is_empty());
    }

    #[test]
    fn iterates_in_normalized_key_order() {
        let mut map = CaseInsensitiveMap::new();
        map.insert("orders", 2);
        map.insert("Customers", 1);

        let keys: Vec<_> = map.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["CUSTOMERS", "ORDERS"]);

        let mut total = 0;
        for (_, value) in &map {
            total += value;
        }
        assert_eq!(total, 3);
    }
}
