//! Per-rule memo of match outcomes: the success cache (start token to end
//! set plus the nodes that produced it) and the failure set.
//!
//! Both are keyed by (rule, start token) and reset between top-level
//! constructs. The API is stateless: callers locate an entry and operate on
//! the returned reference, there is no hidden current-key cursor.

use std::collections::{HashMap, HashSet};

use cranelift_entity::SecondaryMap;
use trellis::grammar::RuleHandle;

use crate::appeal::NodeHandle;

#[derive(Clone, Default)]
pub struct SuccEntry {
    /// Appeal nodes that succeeded at this start token.
    pub nodes: Vec<NodeHandle>,
    /// Exclusive end positions matched from this start token.
    pub ends: Vec<u32>,
    /// Frozen: the fixed point for this start token is complete and no
    /// further matches are admissible.
    pub done: bool,
}

impl SuccEntry {
    fn add_end(&mut self, end: u32) {
        if !self.ends.contains(&end) {
            self.ends.push(end);
        }
    }
}

#[derive(Default)]
pub struct MatchCache {
    succ: SecondaryMap<RuleHandle, HashMap<u32, SuccEntry>>,
    failed: SecondaryMap<RuleHandle, HashSet<u32>>,
}

impl MatchCache {
    pub fn new() -> MatchCache {
        MatchCache::default()
    }

    pub fn clear(&mut self) {
        self.succ = SecondaryMap::new();
        self.failed = SecondaryMap::new();
    }

    pub fn succ(&self, rule: RuleHandle, start: u32) -> Option<&SuccEntry> {
        self.succ[rule].get(&start)
    }

    /// Records a successful attempt: the node and every end it reached.
    /// A success and a failure may never coexist at the same start token.
    pub fn record_succ(&mut self, rule: RuleHandle, start: u32, node: NodeHandle, ends: &[u32]) {
        debug_assert!(
            !self.failed[rule].contains(&start),
            "rule recorded as both matched and failed at one token"
        );
        let entry = self.succ[rule].entry(start).or_default();
        if !entry.nodes.contains(&node) {
            entry.nodes.push(node);
        }
        for &end in ends {
            debug_assert!(end >= start, "match end before its start token");
            entry.add_end(end);
        }
    }

    pub fn remove_succ_node(&mut self, rule: RuleHandle, start: u32, node: NodeHandle) {
        if let Some(entry) = self.succ[rule].get_mut(&start) {
            entry.nodes.retain(|&n| n != node);
        }
    }

    /// Freezes the entry, if one exists. Returns whether it did.
    pub fn mark_done(&mut self, rule: RuleHandle, start: u32) -> bool {
        match self.succ[rule].get_mut(&start) {
            Some(entry) => {
                entry.done = true;
                true
            }
            None => false,
        }
    }

    pub fn is_done(&self, rule: RuleHandle, start: u32) -> bool {
        self.succ(rule, start).map_or(false, |e| e.done)
    }

    pub fn was_failed(&self, rule: RuleHandle, start: u32) -> bool {
        self.failed[rule].contains(&start)
    }

    pub fn add_failed(&mut self, rule: RuleHandle, start: u32) {
        self.failed[rule].insert(start);
    }

    /// Removes a fail record. Used by the appeal pass when a failure turns
    /// out to have been an artifact of an unfinished recursion instance.
    pub fn reset_failed(&mut self, rule: RuleHandle, start: u32) {
        self.failed[rule].remove(&start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    fn rule(i: usize) -> RuleHandle {
        RuleHandle::new(i)
    }

    fn node(i: usize) -> NodeHandle {
        NodeHandle::new(i)
    }

    #[test]
    fn succ_and_fail_are_disjoint() {
        let mut cache = MatchCache::new();
        cache.add_failed(rule(0), 3);
        assert!(cache.was_failed(rule(0), 3));
        cache.reset_failed(rule(0), 3);
        assert!(!cache.was_failed(rule(0), 3));
        cache.record_succ(rule(0), 3, node(0), &[4, 6]);
        assert_eq!(cache.succ(rule(0), 3).unwrap().ends, vec![4, 6]);
        assert!(cache.succ(rule(0), 5).is_none());
        assert!(cache.succ(rule(1), 3).is_none());
    }

    #[test]
    fn ends_dedup_and_done_freezes() {
        let mut cache = MatchCache::new();
        cache.record_succ(rule(2), 0, node(1), &[1]);
        cache.record_succ(rule(2), 0, node(1), &[1, 2]);
        let entry = cache.succ(rule(2), 0).unwrap();
        assert_eq!(entry.ends, vec![1, 2]);
        assert_eq!(entry.nodes.len(), 1);

        assert!(!cache.is_done(rule(2), 0));
        assert!(cache.mark_done(rule(2), 0));
        assert!(cache.is_done(rule(2), 0));
        assert!(!cache.mark_done(rule(2), 9));
    }

    #[test]
    fn remove_node_keeps_ends() {
        let mut cache = MatchCache::new();
        cache.record_succ(rule(0), 0, node(0), &[2]);
        cache.record_succ(rule(0), 0, node(1), &[3]);
        cache.remove_succ_node(rule(0), 0, node(1));
        let entry = cache.succ(rule(0), 0).unwrap();
        assert_eq!(entry.nodes, vec![node(0)]);
        assert_eq!(entry.ends, vec![2, 3]);
    }
}
