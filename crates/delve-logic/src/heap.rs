//! Indexed binary heap with logarithmic priority updates.
//!
//! `IndexedHeap` stores `(value, priority)` entries in a complete binary tree
//! laid out in a `Vec`, plus a value → slot index that is kept in lock-step
//! with every swap. The index gives duplicate-free membership and lets
//! [`IndexedHeap::change_priority`] find an entry in O(1) before repairing the
//! heap in O(log n).
//!
//! Tie-breaks are part of the contract:
//! - bubbling up never passes a parent of equal priority, so equal priorities
//!   keep their insertion order relative to their ancestors;
//! - bubbling down picks the **right** child when both children tie.
//!
//! ```
//! use delve_logic::heap::{HeapKind, IndexedHeap};
//!
//! let mut heap = IndexedHeap::new(HeapKind::Min);
//! heap.insert('a', 5.0).unwrap();
//! heap.insert('b', 3.0).unwrap();
//! heap.insert('c', 3.0).unwrap();
//! assert_eq!(heap.poll().unwrap(), 'b');
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Capacity of a freshly constructed heap.
const INITIAL_CAPACITY: usize = 10;

/// Which priority extreme sits at the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapKind {
    /// Smallest priority at the root.
    Min,
    /// Largest priority at the root.
    Max,
}

/// Heap precondition violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HeapError {
    #[error("value is already in the heap")]
    DuplicateValue,
    #[error("heap is empty")]
    Empty,
    #[error("value is not in the heap")]
    NotPresent,
    #[error("priority must not be NaN")]
    InvalidPriority,
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    priority: f64,
}

/// A min- or max-heap of distinct values with `f64` priorities.
#[derive(Debug, Clone)]
pub struct IndexedHeap<V> {
    kind: HeapKind,
    entries: Vec<Entry<V>>,
    /// value → slot in `entries`. Exactly the inverse of the layout.
    index: HashMap<V, usize>,
}

impl<V: Eq + Hash + Clone> IndexedHeap<V> {
    /// An empty heap of the given kind.
    pub fn new(kind: HeapKind) -> Self {
        Self {
            kind,
            entries: Vec::with_capacity(INITIAL_CAPACITY),
            index: HashMap::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn kind(&self) -> HeapKind {
        self.kind
    }

    /// Number of entries. Constant time.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, value: &V) -> bool {
        self.index.contains_key(value)
    }

    /// Current priority of `value`, if present.
    pub fn priority_of(&self, value: &V) -> Option<f64> {
        self.index.get(value).map(|&k| self.entries[k].priority)
    }

    /// Add `value` with `priority`.
    pub fn insert(&mut self, value: V, priority: f64) -> Result<(), HeapError> {
        if priority.is_nan() {
            return Err(HeapError::InvalidPriority);
        }
        if self.index.contains_key(&value) {
            return Err(HeapError::DuplicateValue);
        }
        self.ensure_space();
        let k = self.entries.len();
        self.index.insert(value.clone(), k);
        self.entries.push(Entry { value, priority });
        self.bubble_up(k);
        Ok(())
    }

    /// The value at the root without removing it.
    pub fn peek(&self) -> Result<&V, HeapError> {
        self.entries
            .first()
            .map(|e| &e.value)
            .ok_or(HeapError::Empty)
    }

    /// Remove and return the value at the root.
    pub fn poll(&mut self) -> Result<V, HeapError> {
        if self.entries.is_empty() {
            return Err(HeapError::Empty);
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let Some(root) = self.entries.pop() else {
            return Err(HeapError::Empty);
        };
        self.index.remove(&root.value);
        self.bubble_down(0);
        Ok(root.value)
    }

    /// Set the priority of `value` and restore heap order.
    ///
    /// The new priority may move the entry either way; both repair passes run
    /// and at most one of them moves anything.
    pub fn change_priority(&mut self, value: &V, priority: f64) -> Result<(), HeapError> {
        if priority.is_nan() {
            return Err(HeapError::InvalidPriority);
        }
        let k = *self.index.get(value).ok_or(HeapError::NotPresent)?;
        self.entries[k].priority = priority;
        let k = self.bubble_up(k);
        self.bubble_down(k);
        Ok(())
    }

    /// Double the backing storage when it is full.
    fn ensure_space(&mut self) {
        let cap = self.entries.capacity();
        if self.entries.len() == cap {
            self.entries.reserve_exact(cap.max(1));
        }
    }

    /// `Greater` when priority `p1` belongs above `p2` for this kind of heap.
    fn rank(&self, p1: f64, p2: f64) -> Ordering {
        let ord = p1.partial_cmp(&p2).unwrap_or(Ordering::Equal);
        match self.kind {
            HeapKind::Min => ord.reverse(),
            HeapKind::Max => ord,
        }
    }

    fn rank_slots(&self, h: usize, k: usize) -> Ordering {
        self.rank(self.entries[h].priority, self.entries[k].priority)
    }

    /// Swap two slots and their index entries together.
    fn swap(&mut self, i: usize, j: usize) {
        self.entries.swap(i, j);
        self.index.insert(self.entries[i].value.clone(), i);
        self.index.insert(self.entries[j].value.clone(), j);
    }

    /// Move slot `k` up while it strictly outranks its parent. Returns the
    /// final slot.
    fn bubble_up(&mut self, mut k: usize) -> usize {
        while k > 0 {
            let parent = (k - 1) / 2;
            if self.rank_slots(k, parent) != Ordering::Greater {
                break;
            }
            self.swap(k, parent);
            k = parent;
        }
        k
    }

    /// Move slot `k` down below any child that outranks it. On a tie between
    /// the children, the right child wins.
    fn bubble_down(&mut self, mut k: usize) {
        let len = self.entries.len();
        while 2 * k + 1 < len {
            let mut child = 2 * k + 1;
            if child + 1 < len && self.rank_slots(child + 1, child) != Ordering::Less {
                child += 1;
            }
            if self.rank_slots(k, child) != Ordering::Less {
                return;
            }
            self.swap(k, child);
            k = child;
        }
    }
}

#[cfg(test)]
impl<V: Eq + Hash + Clone + std::fmt::Debug> IndexedHeap<V> {
    /// Layout as `(value, priority)` pairs, root first.
    fn layout(&self) -> Vec<(V, f64)> {
        self.entries
            .iter()
            .map(|e| (e.value.clone(), e.priority))
            .collect()
    }

    /// Check heap order and index consistency, panicking on violation.
    pub(crate) fn assert_invariants(&self) {
        assert_eq!(self.entries.len(), self.index.len());
        for (k, e) in self.entries.iter().enumerate() {
            assert_eq!(self.index.get(&e.value), Some(&k), "index out of sync");
            if k > 0 {
                let parent = (k - 1) / 2;
                assert_ne!(
                    self.rank_slots(k, parent),
                    Ordering::Greater,
                    "slot {} outranks its parent",
                    k
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_heap(items: &[(&'static str, f64)]) -> IndexedHeap<&'static str> {
        let mut heap = IndexedHeap::new(HeapKind::Min);
        for &(v, p) in items {
            heap.insert(v, p).unwrap();
        }
        heap
    }

    #[test]
    fn test_equal_priority_keeps_insertion_order() {
        let mut heap = min_heap(&[("A", 5.0), ("B", 3.0), ("C", 3.0)]);
        assert_eq!(heap.poll().unwrap(), "B");
        assert_eq!(heap.poll().unwrap(), "C");
        assert_eq!(heap.poll().unwrap(), "A");
    }

    #[test]
    fn test_insert_layout_min() {
        let heap = min_heap(&[("a", 5.0), ("b", 3.0), ("c", 4.0), ("d", 1.0)]);
        let values: Vec<_> = heap.layout().into_iter().map(|(v, _)| v).collect();
        // d climbs past a and then past b.
        assert_eq!(values, vec!["d", "b", "c", "a"]);
        heap.assert_invariants();
    }

    #[test]
    fn test_insert_layout_max() {
        let mut heap = IndexedHeap::new(HeapKind::Max);
        for (v, p) in [("a", 1.0), ("b", 3.0), ("c", 2.0), ("d", 5.0)] {
            heap.insert(v, p).unwrap();
        }
        assert_eq!(heap.peek().unwrap(), &"d");
        let values: Vec<_> = heap.layout().into_iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec!["d", "b", "c", "a"]);
        heap.assert_invariants();
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut heap = min_heap(&[("a", 1.0)]);
        assert_eq!(heap.insert("a", 7.0), Err(HeapError::DuplicateValue));
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.priority_of(&"a"), Some(1.0));
    }

    #[test]
    fn test_empty_peek_and_poll() {
        let mut heap: IndexedHeap<u32> = IndexedHeap::new(HeapKind::Min);
        assert_eq!(heap.peek(), Err(HeapError::Empty));
        assert_eq!(heap.poll(), Err(HeapError::Empty));
        assert!(heap.is_empty());
    }

    #[test]
    fn test_change_priority_missing() {
        let mut heap = min_heap(&[("a", 1.0)]);
        assert_eq!(heap.change_priority(&"z", 0.0), Err(HeapError::NotPresent));
    }

    #[test]
    fn test_nan_rejected() {
        let mut heap = min_heap(&[("a", 1.0)]);
        assert_eq!(heap.insert("b", f64::NAN), Err(HeapError::InvalidPriority));
        assert_eq!(
            heap.change_priority(&"a", f64::NAN),
            Err(HeapError::InvalidPriority)
        );
    }

    #[test]
    fn test_bubble_down_prefers_right_child_on_tie() {
        // root r(1) with children l(5) and x(5)
        let mut heap = min_heap(&[("r", 1.0), ("l", 5.0), ("x", 5.0)]);
        heap.change_priority(&"r", 9.0).unwrap();
        let values: Vec<_> = heap.layout().into_iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec!["x", "l", "r"]);
        heap.assert_invariants();
    }

    #[test]
    fn test_poll_prefers_right_child_on_tie() {
        let mut heap = min_heap(&[("r", 1.0), ("l", 5.0), ("x", 5.0), ("y", 8.0)]);
        assert_eq!(heap.poll().unwrap(), "r");
        // y moved to the root and sank toward the right child of the tie.
        let values: Vec<_> = heap.layout().into_iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec!["x", "l", "y"]);
        heap.assert_invariants();
    }

    #[test]
    fn test_change_priority_both_directions() {
        let mut heap = min_heap(&[("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0)]);
        heap.change_priority(&"d", 0.5).unwrap();
        assert_eq!(heap.peek().unwrap(), &"d");
        heap.assert_invariants();
        heap.change_priority(&"d", 10.0).unwrap();
        assert_eq!(heap.peek().unwrap(), &"a");
        heap.assert_invariants();
        let drained: Vec<_> = std::iter::from_fn(|| heap.poll().ok()).collect();
        assert_eq!(drained, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_change_priority_equal_is_noop() {
        let mut heap = min_heap(&[("a", 1.0), ("b", 2.0), ("c", 2.0)]);
        let before = heap.layout();
        heap.change_priority(&"c", 2.0).unwrap();
        assert_eq!(heap.layout(), before);
    }

    #[test]
    fn test_growth_past_initial_capacity() {
        let mut heap = IndexedHeap::new(HeapKind::Max);
        for i in 0..100u32 {
            heap.insert(i, f64::from(i)).unwrap();
            heap.assert_invariants();
        }
        assert_eq!(heap.len(), 100);
        assert!(heap.entries.capacity() >= 100);
        for expected in (0..100u32).rev() {
            assert_eq!(heap.poll().unwrap(), expected);
        }
    }

    #[test]
    fn test_contains_tracks_membership() {
        let mut heap = min_heap(&[("a", 1.0), ("b", 2.0)]);
        assert!(heap.contains(&"a"));
        heap.poll().unwrap();
        assert!(!heap.contains(&"a"));
        assert!(heap.contains(&"b"));
        assert_eq!(heap.priority_of(&"a"), None);
    }

    #[test]
    fn test_string_values() {
        let mut heap = IndexedHeap::new(HeapKind::Min);
        for (i, word) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            heap.insert(word.to_string(), (4 - i) as f64).unwrap();
        }
        heap.change_priority(&"delta".to_string(), 0.0).unwrap();
        assert_eq!(heap.poll().unwrap(), "delta");
        assert_eq!(heap.poll().unwrap(), "bravo");
        heap.assert_invariants();
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Insert(u8, i16),
            Poll,
            Change(u8, i16),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..32, -50i16..50).prop_map(|(v, p)| Op::Insert(v, p)),
                Just(Op::Poll),
                (0u8..32, -50i16..50).prop_map(|(v, p)| Op::Change(v, p)),
            ]
        }

        proptest! {
            #[test]
            fn invariants_hold_after_every_op(
                max in any::<bool>(),
                ops in prop::collection::vec(op(), 0..200),
            ) {
                let kind = if max { HeapKind::Max } else { HeapKind::Min };
                let mut heap = IndexedHeap::new(kind);
                let mut live = std::collections::HashMap::new();
                for op in ops {
                    match op {
                        Op::Insert(v, p) => {
                            let res = heap.insert(v, f64::from(p));
                            if live.contains_key(&v) {
                                prop_assert_eq!(res, Err(HeapError::DuplicateValue));
                            } else {
                                prop_assert!(res.is_ok());
                                live.insert(v, p);
                            }
                        }
                        Op::Poll => match heap.poll() {
                            Ok(v) => {
                                let p = live.remove(&v).unwrap();
                                let extreme = live.values().all(|&q| match kind {
                                    HeapKind::Min => p <= q,
                                    HeapKind::Max => p >= q,
                                });
                                prop_assert!(extreme);
                            }
                            Err(e) => {
                                prop_assert_eq!(e, HeapError::Empty);
                                prop_assert!(live.is_empty());
                            }
                        },
                        Op::Change(v, p) => {
                            let res = heap.change_priority(&v, f64::from(p));
                            if live.contains_key(&v) {
                                prop_assert!(res.is_ok());
                                live.insert(v, p);
                            } else {
                                prop_assert_eq!(res, Err(HeapError::NotPresent));
                            }
                        }
                    }
                    heap.assert_invariants();
                    prop_assert_eq!(heap.len(), live.len());
                }
            }

            #[test]
            fn polling_drains_in_sorted_order(priorities in prop::collection::vec(-100i32..100, 0..64)) {
                let mut heap = IndexedHeap::new(HeapKind::Min);
                for (i, &p) in priorities.iter().enumerate() {
                    heap.insert(i, f64::from(p)).unwrap();
                }
                let mut drained = Vec::new();
                while let Ok(i) = heap.poll() {
                    drained.push(priorities[i]);
                }
                let mut sorted = priorities.clone();
                sorted.sort_unstable();
                prop_assert_eq!(drained, sorted);
            }
        }
    }
}
