//! Disjoint sets with union by size and path compression.

use ahash::AHashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct DisjointSets<T> {
    parent: AHashMap<T, T>,
    size: AHashMap<T, usize>,
}

impl<T> Default for DisjointSets<T> {
    fn default() -> Self {
        Self {
            parent: AHashMap::new(),
            size: AHashMap::new(),
        }
    }
}

impl<T: Copy + Eq + Hash + Ord> DisjointSets<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `x` as a singleton; no-op if present.
    pub fn insert(&mut self, x: T) {
        if !self.parent.contains_key(&x) {
            self.parent.insert(x, x);
            self.size.insert(x, 1);
        }
    }

    pub fn contains(&self, x: T) -> bool {
        self.parent.contains_key(&x)
    }

    /// Representative of `x`, compressing the path on the way.
    pub fn find(&mut self, x: T) -> Option<T> {
        let mut root = *self.parent.get(&x)?;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        let mut cur = x;
        while cur != root {
            let next = self.parent[&cur];
            self.parent.insert(cur, root);
            cur = next;
        }
        Some(root)
    }

    /// Merges the sets of `a` and `b` (inserting either if needed). Returns
    /// `false` when they already shared a set.
    pub fn union(&mut self, a: T, b: T) -> bool {
        self.insert(a);
        self.insert(b);
        let (Some(ra), Some(rb)) = (self.find(a), self.find(b)) else {
            return false;
        };
        if ra == rb {
            return false;
        }
        let (big, small) = if self.size[&ra] >= self.size[&rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent.insert(small, big);
        let merged = self.size[&big] + self.size[&small];
        self.size.insert(big, merged);
        true
    }

    /// Every set keyed by its representative, members sorted.
    pub fn groups(&mut self) -> AHashMap<T, Vec<T>> {
        let keys: Vec<T> = self.parent.keys().copied().collect();
        let mut groups: AHashMap<T, Vec<T>> = AHashMap::new();
        for x in keys {
            if let Some(root) = self.find(x) {
                groups.entry(root).or_default().push(x);
            }
        }
        for members in groups.values_mut() {
            members.sort_unstable();
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_joins_and_reports_novelty() {
        let mut sets = DisjointSets::new();
        assert!(sets.union(1u64, 2));
        assert!(sets.union(3, 4));
        assert!(!sets.union(2, 1));
        assert!(sets.union(2, 4));
        assert_eq!(sets.find(1), sets.find(3));
        assert_eq!(sets.find(9), None);
    }

    #[test]
    fn larger_set_keeps_its_root() {
        let mut sets = DisjointSets::new();
        sets.union(10u64, 11);
        sets.union(10, 12);
        let root = sets.find(10).unwrap();
        sets.union(20, root);
        assert_eq!(sets.find(20), Some(root));
    }

    #[test]
    fn groups_partition_all_members() {
        let mut sets = DisjointSets::new();
        sets.union(1u64, 2);
        sets.insert(5);
        let groups = sets.groups();
        assert_eq!(groups.len(), 2);
        let mut sizes: Vec<_> = groups.values().map(Vec::len).collect();
        sizes.sort();
        assert_eq!(sizes, vec![1, 2]);
        assert_eq!(sets.len(), 3);
    }
}
