//! Post-sort passes: grafting real subtrees beneath nodes satisfied from
//! the cache, then shrinking chainless edges so actions see a compact tree.

use std::collections::VecDeque;

use trellis::error::ParseError;

use crate::appeal::{AppealStatus, NodeHandle};
use crate::matcher::ParseCtx;

impl ParseCtx<'_> {
    /// A node satisfied from the cache has no children of its own; AST
    /// construction needs a real subtree beneath it. For each such node in
    /// the sorted tree, find the recorded attempt with the smallest subtree
    /// achieving the same end, re-sort it against that end, and graft its
    /// sorted children. Grafting can expose further cached nodes, so the
    /// pass repeats until none remain.
    pub fn patch_was_succ(&mut self, top: NodeHandle) -> Result<(), ParseError> {
        let mut rounds = 0u32;
        loop {
            rounds += 1;
            let pending = self.find_cached_nodes(top);
            if pending.is_empty() {
                break;
            }
            log::debug!("patch round {rounds}: {} cached nodes", pending.len());
            for node in pending {
                let patch = self.find_patching_node(node)?;
                if self.arena[patch].final_match == self.arena[node].final_match
                    && !self.arena[patch].sorted.is_empty()
                {
                    // The recorded subtree is already sorted to the same
                    // end elsewhere in the tree; reuse it as is.
                } else {
                    self.supplemental_sort_out(patch, node)?;
                }
                let grafted = self.arena[patch].sorted.clone();
                for &child in &grafted {
                    self.arena[child].parent = Some(node);
                }
                self.arena[node].sorted = grafted;
                self.arena[node].status = AppealStatus::Succ;
            }
        }
        Ok(())
    }

    /// Collects the cache-satisfied nodes reachable through sorted edges.
    /// Their subtrees are not descended; they have none yet.
    fn find_cached_nodes(&self, top: NodeHandle) -> Vec<NodeHandle> {
        let mut found = Vec::new();
        let mut work = VecDeque::new();
        work.push_back(top);
        while let Some(node) = work.pop_front() {
            if matches!(
                self.arena[node].status,
                AppealStatus::SuccWasSucc | AppealStatus::SuccStillWasSucc
            ) {
                found.push(node);
            } else {
                for &child in &self.arena[node].sorted {
                    work.push_back(child);
                }
            }
        }
        found
    }

    /// Of all recorded attempts for (rule, start) that achieved the node's
    /// end, picks the youngest: the one every other candidate contains,
    /// which is the smallest subtree carrying the real match.
    fn find_patching_node(&self, node: NodeHandle) -> Result<NodeHandle, ParseError> {
        let rule = self.arena[node]
            .rule()
            .ok_or(ParseError::Invariant("cached node is not a rule"))?;
        let start = self.arena[node].start;
        let end = self.arena[node]
            .final_match
            .ok_or(ParseError::Invariant("cached node is unsorted"))?;
        let entry = self
            .cache
            .succ(rule, start)
            .ok_or(ParseError::Invariant("cached node has no recorded entry"))?;

        let mut youngest: Option<NodeHandle> = None;
        for &candidate in &entry.nodes {
            if candidate == node || !self.arena[candidate].find_match(end) {
                continue;
            }
            // A candidate already pinned elsewhere with a different end
            // cannot be re-sorted without corrupting that tree.
            if let Some(pinned) = self.arena[candidate].final_match {
                if pinned != end {
                    continue;
                }
            }
            match youngest {
                None => youngest = Some(candidate),
                Some(current) => {
                    if self.arena.descendant_of(candidate, current) {
                        youngest = Some(candidate);
                    }
                }
            }
        }
        youngest.ok_or(ParseError::Invariant(
            "no recorded subtree reproduces a cached match",
        ))
    }

    /// Shrinks edges where a parent has exactly one sorted child and no
    /// action cares about that slot, replacing the parent by the child in
    /// the grandparent. The first shrink records the child's original slot
    /// so actions still see the right grammar position. Within a recursion
    /// group, a parent and child that are both leads spanning the same
    /// tokens are instance links and always shrink.
    pub fn simplify(&mut self) {
        let top = self.arena[self.root].sorted[0];
        let mut shrunk = 0u32;
        let mut work = VecDeque::new();
        work.push_back(top);
        while let Some(node) = work.pop_front() {
            if self.arena[node].token_index().is_some() {
                continue;
            }
            let survivor = self.shrink_edges(node);
            if survivor != node {
                shrunk += 1;
            }
            for &child in &self.arena[survivor].sorted {
                work.push_back(child);
            }
        }
        log::debug!("simplify: shrank {shrunk} edge chains");
    }

    fn shrink_edges(&mut self, start_node: NodeHandle) -> NodeHandle {
        let mut node = start_node;
        let mut slot: u32 = 0;
        loop {
            if self.arena[node].sorted.len() != 1 {
                break;
            }
            let child = self.arena[node].sorted[0];

            // An instance link between two leads of one group spans the
            // same tokens as its child and carries no derivation of its
            // own; it shrinks regardless of actions.
            let parent_group = self
                .arena[node]
                .rule()
                .and_then(|r| self.recursion.group_for_lead(r));
            let child_group = self
                .arena[child]
                .rule()
                .and_then(|r| self.recursion.group_for_lead(r));
            let instance_link = parent_group.is_some()
                && parent_group == child_group
                && self.arena[node].start == self.arena[child].start
                && self.arena[node].final_match == self.arena[child].final_match;

            if !instance_link {
                match self.sorted_child_index(node, child) {
                    Some(index) => {
                        let rule = self.arena[node].rule().expect("interior node is a rule");
                        if self.grammar.action_has_elem(rule, index) {
                            break;
                        }
                    }
                    None => {
                        debug_assert!(false, "slotless sorted edge outside a recursion chain");
                        break;
                    }
                }
            }

            let parent = self.arena[node].parent.expect("sorted node without parent");
            if parent != self.root && slot == 0 {
                slot = self.sorted_child_index(parent, node).unwrap_or(0);
            }
            self.arena.replace_sorted_child(parent, node, child);
            self.arena[child].simplified_slot = slot;
            node = child;
        }
        node
    }
}
