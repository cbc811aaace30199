//! Order-statistic aggregate index.
//!
//! Projection counters (open PRs per repo, failing checks per repo, …) must
//! be answered without scanning the backing table. [`Aggregate`] keeps a
//! multiset of keys in a treap augmented with subtree sizes, so both
//! mutation and range counting cost O(log n).
//!
//! Keys are whatever composite the index needs — the memory store uses
//! tuples such as `(repository_id, state_rank)` so that
//! `count((repo, OPEN)..=(repo, OPEN))` answers "open PRs in repo" directly.

use std::cmp::Ordering;
use std::ops::{Bound, RangeBounds};

struct Node<K> {
    key: K,
    priority: u64,
    /// Number of occurrences of `key` in the multiset.
    multiplicity: u64,
    /// Total occurrences in this subtree (including `multiplicity`).
    subtree: u64,
    left: Option<Box<Node<K>>>,
    right: Option<Box<Node<K>>>,
}

impl<K> Node<K> {
    fn new(key: K, priority: u64) -> Self {
        Self {
            key,
            priority,
            multiplicity: 1,
            subtree: 1,
            left: None,
            right: None,
        }
    }

    fn update(&mut self) {
        self.subtree = self.multiplicity + subtree_size(&self.left) + subtree_size(&self.right);
    }
}

fn subtree_size<K>(node: &Option<Box<Node<K>>>) -> u64 {
    node.as_ref().map_or(0, |n| n.subtree)
}

/// An order-statistic multiset with O(log n) insert, delete, and range count.
pub struct Aggregate<K> {
    root: Option<Box<Node<K>>>,
}

impl<K: Ord> Default for Aggregate<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> Aggregate<K> {
    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Total number of entries (counting multiplicity).
    pub fn total(&self) -> u64 {
        subtree_size(&self.root)
    }

    /// Whether the aggregate holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert one occurrence of `key`.
    pub fn insert(&mut self, key: K) {
        let priority = rand::random::<u64>();
        Self::insert_node(&mut self.root, key, priority);
    }

    /// Remove one occurrence of `key`. Returns `false` when the key was not
    /// present, which callers treat as an idempotent no-op.
    pub fn remove(&mut self, key: &K) -> bool {
        Self::remove_node(&mut self.root, key)
    }

    /// Count entries whose key falls within `range`.
    pub fn count<R: RangeBounds<K>>(&self, range: R) -> u64 {
        let upper = match range.end_bound() {
            Bound::Unbounded => self.total(),
            Bound::Included(k) => self.count_below(k, true),
            Bound::Excluded(k) => self.count_below(k, false),
        };
        let lower = match range.start_bound() {
            Bound::Unbounded => 0,
            Bound::Included(k) => self.count_below(k, false),
            Bound::Excluded(k) => self.count_below(k, true),
        };
        upper.saturating_sub(lower)
    }

    /// Count entries with key `< bound`, or `<= bound` when `inclusive`.
    fn count_below(&self, bound: &K, inclusive: bool) -> u64 {
        let mut acc = 0;
        let mut cursor = &self.root;
        while let Some(node) = cursor {
            let goes_left = match bound.cmp(&node.key) {
                Ordering::Less => true,
                Ordering::Equal => !inclusive,
                Ordering::Greater => false,
            };
            if goes_left {
                cursor = &node.left;
            } else {
                acc += subtree_size(&node.left) + node.multiplicity;
                cursor = &node.right;
            }
        }
        acc
    }

    fn insert_node(slot: &mut Option<Box<Node<K>>>, key: K, priority: u64) {
        match slot {
            None => *slot = Some(Box::new(Node::new(key, priority))),
            Some(node) => {
                match key.cmp(&node.key) {
                    Ordering::Equal => {
                        node.multiplicity += 1;
                    }
                    Ordering::Less => {
                        Self::insert_node(&mut node.left, key, priority);
                        if node.left.as_ref().is_some_and(|l| l.priority > node.priority) {
                            Self::rotate_right(slot);
                            return;
                        }
                    }
                    Ordering::Greater => {
                        Self::insert_node(&mut node.right, key, priority);
                        if node
                            .right
                            .as_ref()
                            .is_some_and(|r| r.priority > node.priority)
                        {
                            Self::rotate_left(slot);
                            return;
                        }
                    }
                }
                node.update();
            }
        }
    }

    fn remove_node(slot: &mut Option<Box<Node<K>>>, key: &K) -> bool {
        let delete_here = matches!(
            slot,
            Some(node) if *key == node.key && node.multiplicity == 1
        );
        if delete_here {
            Self::delete_root(slot);
            return true;
        }
        match slot {
            None => false,
            Some(node) => {
                let removed = match key.cmp(&node.key) {
                    Ordering::Less => Self::remove_node(&mut node.left, key),
                    Ordering::Greater => Self::remove_node(&mut node.right, key),
                    Ordering::Equal => {
                        node.multiplicity -= 1;
                        true
                    }
                };
                if removed {
                    node.update();
                }
                removed
            }
        }
    }

    /// Remove the node at `slot`, rotating the higher-priority child up
    /// until the doomed node becomes a leaf.
    fn delete_root(slot: &mut Option<Box<Node<K>>>) {
        let Some(mut node) = slot.take() else {
            return;
        };
        match (node.left.take(), node.right.take()) {
            (None, None) => {}
            (Some(left), None) => *slot = Some(left),
            (None, Some(right)) => *slot = Some(right),
            (Some(left), Some(right)) => {
                let left_wins = left.priority > right.priority;
                node.left = Some(left);
                node.right = Some(right);
                *slot = Some(node);
                if left_wins {
                    Self::rotate_right(slot);
                    if let Some(new_root) = slot {
                        Self::delete_root(&mut new_root.right);
                        new_root.update();
                    }
                } else {
                    Self::rotate_left(slot);
                    if let Some(new_root) = slot {
                        Self::delete_root(&mut new_root.left);
                        new_root.update();
                    }
                }
            }
        }
    }

    fn rotate_right(slot: &mut Option<Box<Node<K>>>) {
        if let Some(mut node) = slot.take() {
            match node.left.take() {
                Some(mut pivot) => {
                    node.left = pivot.right.take();
                    node.update();
                    pivot.right = Some(node);
                    pivot.update();
                    *slot = Some(pivot);
                }
                None => *slot = Some(node),
            }
        }
    }

    fn rotate_left(slot: &mut Option<Box<Node<K>>>) {
        if let Some(mut node) = slot.take() {
            match node.right.take() {
                Some(mut pivot) => {
                    node.right = pivot.left.take();
                    node.update();
                    pivot.left = Some(node);
                    pivot.update();
                    *slot = Some(pivot);
                }
                None => *slot = Some(node),
            }
        }
    }
}

impl<K: Ord> std::fmt::Debug for Aggregate<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregate")
            .field("total", &self.total())
            .finish()
    }
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
