//! The appeal tree: a record of every rule application attempted while
//! matching one top-level construct.
//!
//! Nodes live in an arena keyed by [`NodeHandle`] and are dropped together
//! when the next construct begins. Parent links are handles and never own.

use cranelift_entity::{entity_impl, PrimaryMap};
use trellis::grammar::RuleHandle;

use crate::ast::TreeHandle;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeHandle(u32);

entity_impl! { NodeHandle }

/// What a node attempted to match: a rule table, or one token of the
/// buffer (leaf tables that matched record the token they consumed).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodePayload {
    /// The per-construct root; it matches nothing itself.
    Pseudo,
    Rule(RuleHandle),
    Token(u32),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppealStatus {
    NotAttempted,
    Succ,
    /// Satisfied from the cache without descending; needs patching before
    /// AST construction.
    SuccWasSucc,
    /// Re-traversed but the cache already covered every end reached.
    SuccStillWasSucc,
    FailWasFailed,
    FailChildrenFailed,
    FailLookAhead,
    FailNotIdentifier,
    FailNotLiteral,
    /// Second appearance of a recursion lead inside the first instance.
    /// Not a real failure; never recorded in the fail cache.
    Fail2ndOf1stInstance,
}

impl AppealStatus {
    pub fn is_succ(self) -> bool {
        matches!(
            self,
            AppealStatus::Succ | AppealStatus::SuccWasSucc | AppealStatus::SuccStillWasSucc
        )
    }

    pub fn is_fail(self) -> bool {
        matches!(
            self,
            AppealStatus::FailWasFailed
                | AppealStatus::FailChildrenFailed
                | AppealStatus::FailLookAhead
                | AppealStatus::FailNotIdentifier
                | AppealStatus::FailNotLiteral
                | AppealStatus::Fail2ndOf1stInstance
        )
    }
}

pub struct AppealNode {
    pub payload: NodePayload,
    pub start: u32,
    pub status: AppealStatus,
    /// End positions this attempt matched, stored exclusively: an end equal
    /// to `start` means the attempt matched nothing.
    pub matches: Vec<u32>,
    pub parent: Option<NodeHandle>,
    /// Every attempt made below this node, failures included.
    pub children: Vec<NodeHandle>,
    /// The winning path selected by sort-out.
    pub sorted: Vec<NodeHandle>,
    /// End chosen by sort-out. Present iff the node has been sorted.
    pub final_match: Option<u32>,
    /// Grammar slot this node stands for after edge shrinking, 1-based.
    /// 0 while unset.
    pub simplified_slot: u32,
    pub tree: Option<TreeHandle>,
}

impl AppealNode {
    fn new(payload: NodePayload, start: u32, parent: Option<NodeHandle>) -> AppealNode {
        AppealNode {
            payload,
            start,
            status: AppealStatus::NotAttempted,
            matches: Vec::new(),
            parent,
            children: Vec::new(),
            sorted: Vec::new(),
            final_match: None,
            simplified_slot: 0,
            tree: None,
        }
    }

    pub fn rule(&self) -> Option<RuleHandle> {
        match self.payload {
            NodePayload::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn token_index(&self) -> Option<u32> {
        match self.payload {
            NodePayload::Token(i) => Some(i),
            _ => None,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.final_match.is_some()
    }

    pub fn find_match(&self, end: u32) -> bool {
        self.matches.contains(&end)
    }

    pub fn add_match(&mut self, end: u32) {
        if !self.matches.contains(&end) {
            self.matches.push(end);
        }
    }

    pub fn longest_match(&self) -> u32 {
        self.matches.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Default)]
pub struct AppealArena {
    nodes: PrimaryMap<NodeHandle, AppealNode>,
}

impl AppealArena {
    pub fn new() -> AppealArena {
        AppealArena::default()
    }

    pub fn clear(&mut self) {
        self.nodes = PrimaryMap::new();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Allocates a node and links it as a child of `parent`.
    pub fn alloc(
        &mut self,
        payload: NodePayload,
        start: u32,
        parent: Option<NodeHandle>,
    ) -> NodeHandle {
        let handle = self.nodes.push(AppealNode::new(payload, start, parent));
        if let Some(p) = parent {
            self.nodes[p].children.push(handle);
        }
        handle
    }

    /// True when `ancestor` lies on the parent chain of `node`.
    pub fn descendant_of(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        let mut walk = self.nodes[node].parent;
        while let Some(handle) = walk {
            if handle == ancestor {
                return true;
            }
            walk = self.nodes[handle].parent;
        }
        false
    }

    /// Swaps `existing` for `replacement` in the sorted children of
    /// `parent` and reparents the replacement.
    pub fn replace_sorted_child(
        &mut self,
        parent: NodeHandle,
        existing: NodeHandle,
        replacement: NodeHandle,
    ) {
        let slot = self.nodes[parent]
            .sorted
            .iter()
            .position(|&c| c == existing)
            .expect("replaced node is not a sorted child");
        self.nodes[parent].sorted[slot] = replacement;
        self.nodes[replacement].parent = Some(parent);
    }

    /// Unlinks `child` from the raw children of `parent`.
    pub fn detach_child(&mut self, parent: NodeHandle, child: NodeHandle) {
        self.nodes[parent].children.retain(|&c| c != child);
    }
}

impl std::ops::Index<NodeHandle> for AppealArena {
    type Output = AppealNode;
    fn index(&self, handle: NodeHandle) -> &AppealNode {
        &self.nodes[handle]
    }
}

impl std::ops::IndexMut<NodeHandle> for AppealArena {
    fn index_mut(&mut self, handle: NodeHandle) -> &mut AppealNode {
        &mut self.nodes[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_links_children() {
        let mut arena = AppealArena::new();
        let root = arena.alloc(NodePayload::Pseudo, 0, None);
        let a = arena.alloc(NodePayload::Token(0), 0, Some(root));
        let b = arena.alloc(NodePayload::Token(1), 1, Some(a));
        assert_eq!(arena[root].children, vec![a]);
        assert!(arena.descendant_of(b, root));
        assert!(!arena.descendant_of(root, b));
    }

    #[test]
    fn replace_sorted_child_reparents() {
        let mut arena = AppealArena::new();
        let root = arena.alloc(NodePayload::Pseudo, 0, None);
        let a = arena.alloc(NodePayload::Token(0), 0, Some(root));
        let b = arena.alloc(NodePayload::Token(0), 0, Some(a));
        arena[root].sorted.push(a);
        arena.replace_sorted_child(root, a, b);
        assert_eq!(arena[root].sorted, vec![b]);
        assert_eq!(arena[b].parent, Some(root));
    }

    #[test]
    fn match_sets_dedup() {
        let mut arena = AppealArena::new();
        let n = arena.alloc(NodePayload::Token(3), 3, None);
        arena[n].add_match(4);
        arena[n].add_match(4);
        arena[n].add_match(6);
        assert_eq!(arena[n].matches, vec![4, 6]);
        assert!(arena[n].find_match(6));
        assert_eq!(arena[n].longest_match(), 6);
    }
}
