//! # Ordered event payload.
//!
//! [`Payload`] is a small insertion-ordered `key → value` map of strings attached to
//! an [`Event`](super::Event). Order is preserved so that `service.0`, `service.1`, ...
//! read back in the order they were requested.

use std::sync::Arc;

use crate::error::PayloadError;

/// Insertion-ordered string map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    entries: Vec<(Arc<str>, Arc<str>)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`.
    ///
    /// Fails on an empty key or when `key` is already present; the payload is left
    /// unchanged in both cases.
    pub fn store(
        &mut self,
        key: impl Into<Arc<str>>,
        value: impl Into<Arc<str>>,
    ) -> Result<(), PayloadError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(PayloadError::EmptyKey);
        }
        if self.get(&key).is_some() {
            return Err(PayloadError::DuplicateKey(key.to_string()));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_ref())
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    /// Values whose key starts with `prefix`, in insertion order.
    pub fn values_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.iter()
            .filter(move |(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_keeps_insertion_order() {
        let mut p = Payload::new();
        for i in [2, 10, 1] {
            p.store(format!("service.{i}"), i.to_string()).unwrap();
        }
        let keys: Vec<_> = p.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["service.2", "service.10", "service.1"]);
    }

    #[test]
    fn store_rejects_empty_and_duplicate_keys() {
        let mut p = Payload::new();
        assert_eq!(p.store(" ", "x"), Err(PayloadError::EmptyKey));
        p.store("a", "1").unwrap();
        assert_eq!(p.store("a", "2"), Err(PayloadError::DuplicateKey("a".into())));
        assert_eq!(p.get("a"), Some("1"));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn values_with_prefix_filters() {
        let mut p = Payload::new();
        p.store("service.0", "a").unwrap();
        p.store("err", "boom").unwrap();
        p.store("service.1", "b").unwrap();
        let values: Vec<_> = p.values_with_prefix("service.").collect();
        assert_eq!(values, vec!["a", "b"]);
    }
}
