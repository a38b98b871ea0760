use parking_lot::RwLock;
use std::collections::HashMap;

/// Thread-safe, write-once memo table keyed by import path.
pub struct ResolutionMemo<V> {
    inner: RwLock<HashMap<String, V>>,
}

impl<V: Clone> Default for ResolutionMemo<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ResolutionMemo<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Store `value` unless the key is already present; returns the value
    /// that ends up cached so concurrent callers agree.
    pub fn insert(&self, key: &str, value: V) -> V {
        let mut map = self.inner.write();
        map.entry(key.to_string()).or_insert(value).clone()
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let map = self.inner.read();
        map.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        let mut map = self.inner.write();
        map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins() {
        let memo = ResolutionMemo::new();
        assert_eq!(memo.insert("a.com/x", "//x".to_string()), "//x");
        assert_eq!(memo.insert("a.com/x", "//y".to_string()), "//x");
        assert_eq!(memo.get("a.com/x").as_deref(), Some("//x"));
        assert_eq!(memo.len(), 1);
        memo.clear();
        assert!(memo.is_empty());
    }
}
