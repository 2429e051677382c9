//! Name-keyed indexes kept sorted by candidate preference.

use std::cmp::Ordering;
use std::collections::HashMap;

/// Entries filed under a name, each bucket kept in comparator order so the
/// first entry is always the preferred candidate.
#[derive(Debug, Clone)]
pub struct VersionedIndex<T> {
    buckets: HashMap<String, Vec<T>>,
}

impl<T> Default for VersionedIndex<T> {
    fn default() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }
}

impl<T: PartialEq> VersionedIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` under `name`. Entries comparing equal keep insertion order.
    pub fn put<F>(&mut self, name: &str, entry: T, cmp: F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let bucket = self.buckets.entry(name.to_string()).or_default();
        let at = bucket.partition_point(|e| cmp(e, &entry) != Ordering::Greater);
        bucket.insert(at, entry);
    }

    /// Entries under `name`, preferred first.
    pub fn get(&self, name: &str) -> &[T] {
        self.buckets.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn remove(&mut self, name: &str, entry: &T) -> bool {
        let Some(bucket) = self.buckets.get_mut(name) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|e| e == entry) else {
            return false;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(name);
        }
        true
    }

    /// Re-sort every bucket, e.g. after resolution states changed.
    pub fn reorder<F>(&mut self, cmp: F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        for bucket in self.buckets.values_mut() {
            bucket.sort_by(&cmp);
        }
    }

    /// Indexed names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descending(a: &u32, b: &u32) -> Ordering {
        b.cmp(a)
    }

    #[test]
    fn put_keeps_buckets_sorted() {
        let mut index = VersionedIndex::new();
        index.put("p", 1, descending);
        index.put("p", 3, descending);
        index.put("p", 2, descending);
        index.put("q", 7, descending);
        assert_eq!(index.get("p"), &[3, 2, 1]);
        assert_eq!(index.get("q"), &[7]);
        assert!(index.get("r").is_empty());
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn equal_entries_keep_insertion_order() {
        let mut index = VersionedIndex::new();
        index.put("p", (1, 'a'), |x: &(u32, char), y: &(u32, char)| x.0.cmp(&y.0));
        index.put("p", (1, 'b'), |x: &(u32, char), y: &(u32, char)| x.0.cmp(&y.0));
        index.put("p", (0, 'c'), |x: &(u32, char), y: &(u32, char)| x.0.cmp(&y.0));
        assert_eq!(index.get("p"), &[(0, 'c'), (1, 'a'), (1, 'b')]);
    }

    #[test]
    fn remove_and_reorder() {
        let mut index = VersionedIndex::new();
        for n in [1, 2, 3] {
            index.put("p", n, descending);
        }
        assert!(index.remove("p", &2));
        assert!(!index.remove("p", &2));
        index.reorder(|a: &u32, b: &u32| a.cmp(b));
        assert_eq!(index.get("p"), &[1, 3]);

        assert!(index.remove("p", &1));
        assert!(index.remove("p", &3));
        assert!(index.is_empty());
        assert!(index.names().is_empty());
    }
}
