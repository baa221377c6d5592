use {
    crate::{Id, Value},
    std::collections::BTreeMap,
};

/// Keys owned by a single node.
///
/// Presence of a key is tracked separately from its value: a key may be
/// stored without a value (`None`).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyStore {
    entries: BTreeMap<Id, Option<Value>>,
}

impl KeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a key.
    ///
    /// Returns the previous entry, if any.
    pub fn insert(&mut self, key: Id, value: Option<Value>) -> Option<Option<Value>> {
        self.entries.insert(key, value)
    }

    /// Entry stored under `key`: `None` when absent, `Some(None)` when present
    /// without a value.
    pub fn get(&self, key: Id) -> Option<Option<Value>> {
        self.entries.get(&key).copied()
    }

    /// Whether `key` is stored, with or without a value.
    pub fn contains(&self, key: Id) -> bool {
        self.entries.contains_key(&key)
    }

    /// Removes a key, returning its entry if it was present.
    pub fn remove(&mut self, key: Id) -> Option<Option<Value>> {
        self.entries.remove(&key)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored keys, in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = Id> + '_ {
        self.entries.keys().copied()
    }

    /// Removes and returns every entry.
    pub fn drain(&mut self) -> BTreeMap<Id, Option<Value>> {
        std::mem::take(&mut self.entries)
    }

    /// Copy of the whole store.
    pub fn snapshot(&self) -> BTreeMap<Id, Option<Value>> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_is_independent_of_value() {
        let mut store = KeyStore::new();
        assert!(store.is_empty());

        assert_eq!(store.insert(3, None), None);
        assert!(store.contains(3));
        assert_eq!(store.get(3), Some(None));
        assert_eq!(store.get(4), None);

        // Overwrite semantics.
        assert_eq!(store.insert(3, Some(7)), Some(None));
        assert_eq!(store.get(3), Some(Some(7)));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(3), Some(Some(7)));
        assert_eq!(store.remove(3), None);
    }

    #[test]
    fn drain_empties_store() {
        let mut store = KeyStore::new();
        store.insert(200, Some(1));
        store.insert(5, None);
        assert_eq!(store.keys().collect::<Vec<_>>(), vec![5, 200]);

        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert!(store.is_empty());
    }
}
