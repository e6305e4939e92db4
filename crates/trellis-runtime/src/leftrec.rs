//! Fixed-point traversal of left-recursive rule groups.
//!
//! A lead rule is matched in instances: the first instance can only take
//! the paths that do not re-enter the recursion, and every later instance
//! resolves the recursive edge by connecting to the result the previous
//! instance accumulated. The match set grows monotonically; when an
//! instance adds no new end, the fixed point is reached and the whole
//! group's cache entries at that start token are frozen.

use trellis::grammar::{Element, RuleHandle, RuleKind};
use trellis::recursion::{FronNode, GroupId};

use crate::appeal::{AppealStatus, NodeHandle, NodePayload};
use crate::matcher::ParseCtx;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instance {
    First,
    Rest,
}

/// State of one in-flight lead-node attempt, keyed by (group, start).
pub struct RecursionTraversal {
    pub group: GroupId,
    pub lead: RuleHandle,
    pub start: u32,
    pub instance: Instance,
    pub instance_count: u32,
    /// Leads already given their one descent in the current instance; a
    /// further visit of one of these is the recursive edge the connect
    /// logic keys on. The driving lead counts as visited from the start of
    /// every instance.
    pub leads_visited: Vec<RuleHandle>,
    /// Group rules already traversed in the current instance.
    pub nodes_visited: Vec<RuleHandle>,
    /// Nodes failed with "second of first instance" whose ancestors may
    /// need their fail records cleared once the group succeeds.
    pub appeal_points: Vec<NodeHandle>,
    /// Lead appeal node of the previous instance.
    pub prev_lead: Option<NodeHandle>,
    /// Accumulated end set across instances.
    pub matches: Vec<u32>,
}

impl ParseCtx<'_> {
    /// The innermost active traversal for this group at this start token.
    pub(crate) fn find_rec_stack(&self, group: GroupId, start: u32) -> Option<usize> {
        self.rec_stack
            .iter()
            .rposition(|rec| rec.group == group && rec.start == start)
    }

    /// Matches a lead rule by iterating instances to the fixed point.
    /// `node` is the lead's appeal node; each instance hangs beneath it.
    pub(crate) fn traverse_lead(&mut self, node: NodeHandle, rule: RuleHandle) -> bool {
        let group = self
            .recursion
            .group_for_lead(rule)
            .expect("lead rule without a group");
        let start = self.buffer.cur;
        log::debug!(
            "recursion {} @{}: begin instances",
            self.grammar.name(rule),
            start
        );

        self.rec_stack.push(RecursionTraversal {
            group,
            lead: rule,
            start,
            instance: Instance::First,
            instance_count: 0,
            leads_visited: Vec::new(),
            nodes_visited: Vec::new(),
            appeal_points: Vec::new(),
            prev_lead: None,
            matches: Vec::new(),
        });
        let idx = self.rec_stack.len() - 1;
        // The bootstrap through the lead-fron entries is only expressed
        // against the master; a non-master concatenate lead driving its own
        // traversal descends normally.
        let concat_lead = self.grammar.kind(rule) == RuleKind::Concatenate
            && rule == self.recursion.master(group);

        let mut succeeded = false;
        loop {
            self.rec_stack[idx].nodes_visited.clear();
            self.rec_stack[idx].leads_visited.clear();
            self.rec_stack[idx].leads_visited.push(rule);
            self.rec_stack[idx].instance_count += 1;
            self.buffer.cur = start;
            let inst = self.arena.alloc(NodePayload::Rule(rule), start, Some(node));

            let first = self.rec_stack[idx].instance == Instance::First;
            let found = if first && concat_lead {
                // A concatenate lead cannot bootstrap through its own
                // recursive prefix; the first instance takes each
                // lead-fron entry as a zero-length prefix and matches the
                // remaining children.
                self.traverse_lead_fron(group, rule, inst)
            } else {
                self.traverse_regular(rule, inst)
            };

            if !found {
                if succeeded {
                    // A later instance that fails outright adds nothing;
                    // its fail record would contradict the recorded
                    // successes.
                    self.cache.reset_failed(rule, start);
                }
                break;
            }
            succeeded = true;

            let new_ends: Vec<u32> = self.arena[inst]
                .matches
                .iter()
                .copied()
                .filter(|end| !self.rec_stack[idx].matches.contains(end))
                .collect();
            if new_ends.is_empty() {
                // Fixed point. The final instance re-derived what the
                // previous one knew; detach it so sort-out never sees it.
                self.arena.detach_child(node, inst);
                self.cache.remove_succ_node(rule, start, inst);
                break;
            }
            log::trace!(
                "instance {} of {} grew {:?}",
                self.rec_stack[idx].instance_count,
                self.grammar.name(rule),
                new_ends
            );
            self.rec_stack[idx].matches.extend(new_ends);
            self.rec_stack[idx].prev_lead = Some(inst);
            self.rec_stack[idx].instance = Instance::Rest;
        }

        let rec = self.rec_stack.pop().expect("recursion stack underflow");
        debug_assert_eq!(rec.lead, rule);

        if succeeded {
            for &end in &rec.matches {
                self.arena[node].add_match(end);
            }
            let all = self.arena[node].matches.clone();
            self.cache.record_succ(rule, start, node, &all);
            self.arena[node].status = AppealStatus::Succ;
            self.mark_group_done(group, start);
            for &point in &rec.appeal_points {
                self.appeal(point, node);
            }
            let longest = rec.matches.iter().copied().max().unwrap_or(start);
            self.buffer.cur = longest;
            self.last = rec.matches;
            log::debug!(
                "recursion {} @{}: fixed point after {} instances",
                self.grammar.name(rule),
                start,
                rec.instance_count
            );
            true
        } else {
            self.buffer.cur = start;
            self.last.clear();
            false
        }
    }

    /// First instance of a concatenate lead: for every lead-fron entry,
    /// treat the recursive child as a zero-length prefix and match the
    /// rest of the children from the start token.
    fn traverse_lead_fron(&mut self, group: GroupId, rule: RuleHandle, inst: NodeHandle) -> bool {
        let start = self.buffer.cur;
        let mut collected: Vec<u32> = Vec::new();
        let mut found = false;

        let lead_fron = &self.recursion.recursion(group).lead_fron;
        for fron in lead_fron {
            self.buffer.cur = start;
            let ok = match *fron {
                FronNode::Concat { rule: in_rule, start: from, .. } => {
                    self.traverse_concat_from(in_rule, from as usize, inst)
                }
                FronNode::Rule { rule: sub, .. } => {
                    self.traverse_element(Element::Rule(sub), inst)
                }
                FronNode::Token { token, .. } => {
                    self.traverse_element(Element::Token(token), inst)
                }
            };
            if ok {
                found = true;
                for &end in &self.last {
                    if !collected.contains(&end) {
                        collected.push(end);
                    }
                }
            }
        }

        if found {
            self.cache.reset_failed(rule, start);
            for &end in &collected {
                self.arena[inst].add_match(end);
            }
            let all = self.arena[inst].matches.clone();
            self.cache.record_succ(rule, start, inst, &all);
            self.arena[inst].status = AppealStatus::Succ;
            self.last = collected;
            true
        } else {
            self.arena[inst].status = AppealStatus::FailChildrenFailed;
            self.buffer.cur = start;
            self.last.clear();
            self.cache.add_failed(rule, start);
            false
        }
    }

    /// Resolves a nested lead visit against the previous instance: the
    /// previous instance's node becomes a child so sort-out can descend,
    /// and its accumulated ends become this node's result. A non-master
    /// lead connects the same way, picking up the master's result.
    pub(crate) fn connect_previous(&mut self, idx: usize, node: NodeHandle) -> bool {
        let (prev, ends) = {
            let rec = &self.rec_stack[idx];
            (rec.prev_lead, rec.matches.clone())
        };
        let Some(prev) = prev else {
            return false;
        };
        log::trace!(
            "connect to previous instance of group {:?} @{}",
            self.rec_stack[idx].group,
            self.rec_stack[idx].start
        );
        self.arena[node].children.push(prev);
        for &end in &ends {
            self.arena[node].add_match(end);
            if end > self.buffer.cur {
                self.buffer.cur = end;
            }
        }
        self.last = ends;
        true
    }

    /// Freezes every group member's cache entry at this start token.
    fn mark_group_done(&mut self, group: GroupId, start: u32) {
        let members: Vec<RuleHandle> = self.recursion.members(group).to_vec();
        for member in members {
            self.cache.mark_done(member, start);
        }
    }

    /// Clears the fail records of every FailChildrenFailed ancestor between
    /// an appeal point and the recursion root. Those failures were verdicts
    /// passed before the fixed point existed; the appeal tree itself stays
    /// marked failed. Tolerates subtrees already detached from the root.
    pub(crate) fn appeal(&mut self, from: NodeHandle, root: NodeHandle) {
        debug_assert!(self.arena[root].status.is_succ());
        let mut walk = self.arena[from].parent;
        while let Some(node) = walk {
            if node == root {
                break;
            }
            if self.arena[node].status == AppealStatus::FailChildrenFailed {
                if let Some(rule) = self.arena[node].rule() {
                    log::trace!(
                        "appeal: clearing fail record of {} @{}",
                        self.grammar.name(rule),
                        self.arena[node].start
                    );
                    self.cache.reset_failed(rule, self.arena[node].start);
                }
            }
            walk = self.arena[node].parent;
        }
    }
}
