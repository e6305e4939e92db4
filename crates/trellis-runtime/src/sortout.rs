//! Sort-out: reduction of the many-valued appeal tree to a single parse
//! tree by propagating the chosen end position downward.
//!
//! The matcher records every alternative it tried, successes included.
//! Starting from the top construct's unique end, each node pins the child
//! (or children) that actually produced that end; everything else stays in
//! the arena but detached from the sorted tree. Worklist-driven, no
//! recursion.

use std::collections::VecDeque;

use trellis::error::ParseError;
use trellis::grammar::{Element, RuleKind};

use crate::appeal::{AppealStatus, NodeHandle};
use crate::matcher::ParseCtx;

impl ParseCtx<'_> {
    /// Entry point after a successful match. Returns the sorted top node.
    pub fn sort_out(&mut self) -> Result<NodeHandle, ParseError> {
        let root = self.root;
        let successes: Vec<NodeHandle> = self.arena[root]
            .children
            .iter()
            .copied()
            .filter(|&c| !self.arena[c].status.is_fail())
            .collect();
        if successes.len() != 1 {
            return Err(ParseError::Invariant(
                "top construct did not reduce to a single successful tree",
            ));
        }
        let top = successes[0];
        self.arena[root].sorted = vec![top];

        let rule = self.arena[top]
            .rule()
            .ok_or(ParseError::Invariant("top appeal node is not a rule"))?;
        let start = self.arena[top].start;
        let entry = self
            .cache
            .succ(rule, start)
            .ok_or(ParseError::Invariant("top rule has no recorded match"))?;
        if entry.ends.len() != 1 {
            return Err(ParseError::Ambiguity {
                rule: self.grammar.name(rule).to_string(),
                ends: entry.ends.clone(),
            });
        }
        let end = entry.ends[0];
        self.arena[top].final_match = Some(end);

        let mut work = VecDeque::new();
        work.push_back(top);
        while let Some(node) = work.pop_front() {
            self.sort_out_node(node, &mut work)?;
        }
        log::debug!("sort-out pinned construct [{start}, {end})");
        Ok(top)
    }

    /// Re-sorts a cached subtree against the final match of a node being
    /// patched. Same walk as [`ParseCtx::sort_out`], different root.
    pub(crate) fn supplemental_sort_out(
        &mut self,
        patch: NodeHandle,
        reference: NodeHandle,
    ) -> Result<(), ParseError> {
        debug_assert!(self.arena[patch].rule().is_some());
        let end = self.arena[reference]
            .final_match
            .ok_or(ParseError::Invariant("patch reference is unsorted"))?;
        self.arena[patch].final_match = Some(end);
        let mut work = VecDeque::new();
        work.push_back(patch);
        while let Some(node) = work.pop_front() {
            self.sort_out_node(node, &mut work)?;
        }
        Ok(())
    }

    fn sort_out_node(
        &mut self,
        node: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        debug_assert!(self.arena[node].is_sorted());
        debug_assert!(self.arena[node].status.is_succ());

        if self.arena[node].token_index().is_some() {
            let start = self.arena[node].start;
            self.arena[node].final_match = Some(start + 1);
            return Ok(());
        }

        // Satisfied from cache: no children were built here. The patching
        // pass grafts the recorded subtree in afterwards.
        if matches!(
            self.arena[node].status,
            AppealStatus::SuccWasSucc | AppealStatus::SuccStillWasSucc
        ) {
            return Ok(());
        }

        let rule = self.arena[node]
            .rule()
            .ok_or(ParseError::Invariant("sorted interior node is not a rule"))?;

        // A lead whose children are all instance links — the same rule, or
        // another lead of its group for a non-master connect — is a pure
        // chain; descend into the instance carrying the final match.
        if let Some(group) = self.recursion.group_for_lead(rule) {
            let children = &self.arena[node].children;
            let connect_only = !children.is_empty()
                && children.iter().all(|&c| match self.arena[c].rule() {
                    Some(r) => r == rule || self.recursion.is_lead_of(r, group),
                    None => false,
                });
            if connect_only {
                return self.sort_out_recursion_head(node, work);
            }
        }

        match self.grammar.kind(rule) {
            RuleKind::OneOf => self.sort_out_oneof(node, work),
            RuleKind::ZeroOrMore => self.sort_out_zeroormore(node, work),
            RuleKind::ZeroOrOne => self.sort_out_zeroorone(node, work),
            RuleKind::Concatenate => self.sort_out_concatenate(node, work),
            RuleKind::Data => self.sort_out_data(node, work),
        }
    }

    /// Pins `child` beneath `parent` with the given final match.
    fn pin(&mut self, parent: NodeHandle, child: NodeHandle, end: u32) {
        self.arena[child].final_match = Some(end);
        self.arena[child].parent = Some(parent);
        self.arena[parent].sorted.push(child);
    }

    fn sort_out_recursion_head(
        &mut self,
        parent: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        let end = self.arena[parent].final_match.unwrap();
        let children = self.arena[parent].children.clone();
        for child in children {
            if self.arena[child].status.is_fail() {
                continue;
            }
            if self.arena[child].find_match(end) {
                self.pin(parent, child, end);
                work.push_back(child);
                return Ok(());
            }
        }
        Err(ParseError::Invariant(
            "no recursion instance carries the chosen end",
        ))
    }

    /// Keep the first successful alternative whose match set contains the
    /// parent's end; grammar order breaks ties.
    fn sort_out_oneof(
        &mut self,
        parent: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        if self.arena[parent].matches.is_empty() {
            return Ok(());
        }
        let end = self.arena[parent].final_match.unwrap();
        let children = self.arena[parent].children.clone();
        for child in children {
            if self.arena[child].status.is_fail() {
                continue;
            }
            if self.arena[child].token_index().is_some() {
                if self.arena[child].start + 1 == end {
                    self.pin(parent, child, end);
                    return Ok(());
                }
            } else if self.arena[child].find_match(end) {
                self.pin(parent, child, end);
                work.push_back(child);
                return Ok(());
            }
        }
        // No direct alternative carries the end the parent was pinned to.
        Err(ParseError::Invariant(
            "no alternative carries the chosen end",
        ))
    }

    /// Walk backwards from the parent's end, pinning the unique child per
    /// running end until the cover reaches the parent's start.
    fn sort_out_zeroormore(
        &mut self,
        parent: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        if self.arena[parent].matches.is_empty() {
            return Ok(());
        }
        let parent_start = self.arena[parent].start;
        let mut running = self.arena[parent].final_match.unwrap();
        let children = self.arena[parent].children.clone();
        let mut picked: Vec<NodeHandle> = Vec::new();

        loop {
            let good = children.iter().copied().find(|&child| {
                !picked.contains(&child)
                    && self.arena[child].status.is_succ()
                    && self.arena[child].find_match(running)
            });
            let Some(child) = good else {
                return Err(ParseError::Invariant(
                    "gap while covering a repetition backwards",
                ));
            };
            self.arena[child].final_match = Some(running);
            self.arena[child].parent = Some(parent);
            picked.push(child);
            running = self.arena[child].start;
            if running == parent_start {
                break;
            }
        }

        for &child in picked.iter().rev() {
            self.arena[parent].sorted.push(child);
            if self.arena[child].rule().is_some() {
                work.push_back(child);
            }
        }
        Ok(())
    }

    fn sort_out_zeroorone(
        &mut self,
        parent: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        if self.arena[parent].matches.is_empty() {
            return Ok(());
        }
        let end = self.arena[parent].final_match.unwrap();
        let children = self.arena[parent].children.clone();
        debug_assert_eq!(children.len(), 1, "optional rule with several attempts");
        let child = children[0];
        if self.arena[child].status.is_fail() {
            return Ok(());
        }
        debug_assert_eq!(self.arena[child].start, self.arena[parent].start);

        if self.arena[child].token_index().is_some() {
            debug_assert_eq!(self.arena[child].start + 1, end);
            self.pin(parent, child, self.arena[child].start + 1);
        } else {
            if !self.arena[child].find_match(end) {
                return Err(ParseError::Invariant(
                    "optional child does not carry the chosen end",
                ));
            }
            self.pin(parent, child, end);
            work.push_back(child);
        }
        Ok(())
    }

    /// Walk the grammar slots right-to-left, matching appeal children by
    /// (element, running end). Zero-or slots may have no child.
    fn sort_out_concatenate(
        &mut self,
        parent: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        if self.arena[parent].matches.is_empty() {
            return Ok(());
        }
        let rule = self.arena[parent].rule().unwrap();
        let parent_start = self.arena[parent].start;
        let mut running = self.arena[parent].final_match.unwrap();
        let mut picked: Vec<NodeHandle> = Vec::new();

        let elements = self.grammar.elements(rule);
        for &element in elements.iter().rev() {
            match self.find_element_child(parent, element, running) {
                Some(child) => {
                    self.arena[child].final_match = Some(running);
                    self.arena[child].parent = Some(parent);
                    picked.push(child);
                    running = self.arena[child].start;
                }
                None => {
                    let tolerated = match element {
                        Element::Rule(r) => {
                            matches!(
                                self.grammar.kind(r),
                                RuleKind::ZeroOrMore | RuleKind::ZeroOrOne
                            ) || self.zero_length_recursive_prefix(rule, r, running, parent_start)
                        }
                        Element::Token(_) => false,
                    };
                    if !tolerated {
                        return Err(ParseError::Invariant(
                            "gap while covering a concatenation backwards",
                        ));
                    }
                }
            }
        }
        if running != parent_start {
            return Err(ParseError::Invariant(
                "concatenation cover does not reach its start",
            ));
        }

        for &child in picked.iter().rev() {
            self.arena[parent].sorted.push(child);
            if self.arena[child].rule().is_some() {
                work.push_back(child);
            }
        }
        Ok(())
    }

    /// A concatenate lead's first instance bootstraps with its recursive
    /// child as a zero-length prefix, so that slot has no appeal child.
    /// The slot is tolerable once the cover has already walked back to the
    /// instance's start and both rules sit in the same recursion group.
    fn zero_length_recursive_prefix(
        &self,
        parent_rule: trellis::grammar::RuleHandle,
        child_rule: trellis::grammar::RuleHandle,
        running: u32,
        parent_start: u32,
    ) -> bool {
        if running != parent_start {
            return false;
        }
        match (
            self.recursion.first_group_of(parent_rule),
            self.recursion.first_group_of(child_rule),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn sort_out_data(
        &mut self,
        parent: NodeHandle,
        work: &mut VecDeque<NodeHandle>,
    ) -> Result<(), ParseError> {
        let rule = self.arena[parent].rule().unwrap();
        let children = self.arena[parent].children.clone();
        let Some(&child) = children.first() else {
            return Ok(());
        };
        match self.grammar.elements(rule)[0] {
            Element::Rule(_) => {
                let end = self.arena[parent].final_match.unwrap();
                self.pin(parent, child, end);
                if self.arena[child].rule().is_some() {
                    work.push_back(child);
                }
            }
            Element::Token(_) => {
                let end = self.arena[child].start + 1;
                self.pin(parent, child, end);
            }
        }
        Ok(())
    }
}
