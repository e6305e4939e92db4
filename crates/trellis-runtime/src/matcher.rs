//! The matcher: memoised traversal of the rule tables.
//!
//! For every (rule, start token) pair it decides the set of end positions
//! the rule can reach, recording each attempt in the appeal tree. End
//! positions are exclusive throughout: an end equal to the start means the
//! rule matched nothing, and the cursor for "continue after end e" is
//! simply e.

use trellis::error::ParseError;
use trellis::grammar::{Element, Grammar, LookAhead, RuleHandle, RuleKind};
use trellis::recursion::RecursionIndex;
use trellis::token::SysTokId;

use crate::appeal::{AppealArena, AppealStatus, NodeHandle, NodePayload};
use crate::buffer::TokenBuffer;
use crate::cache::MatchCache;
use crate::leftrec::{Instance, RecursionTraversal};
use crate::lexer::Lexer;

/// All per-parse state, reset at the start of every top-level construct.
/// Replaces what a global-state design would keep in module statics.
pub struct ParseCtx<'g> {
    pub grammar: &'g Grammar,
    pub recursion: &'g RecursionIndex,
    pub buffer: TokenBuffer,
    pub cache: MatchCache,
    pub arena: AppealArena,
    /// Per-construct pseudo root of the appeal tree.
    pub root: NodeHandle,
    /// End set left behind by the innermost completed match.
    pub last: Vec<u32>,
    pub rec_stack: Vec<RecursionTraversal>,
    /// Traversal step counter; one tick per rule or token attempt.
    pub steps: u64,
    /// Farthest token index any leaf attempt looked at.
    pub farthest: u32,
}

impl<'g> ParseCtx<'g> {
    pub fn new(
        grammar: &'g Grammar,
        recursion: &'g RecursionIndex,
        lexer: Box<dyn Lexer>,
    ) -> ParseCtx<'g> {
        let mut arena = AppealArena::new();
        let root = arena.alloc(NodePayload::Pseudo, 0, None);
        ParseCtx {
            grammar,
            recursion,
            buffer: TokenBuffer::new(lexer),
            cache: MatchCache::new(),
            arena,
            root,
            last: Vec::new(),
            rec_stack: Vec::new(),
            steps: 0,
            farthest: 0,
        }
    }

    /// Clears everything the previous construct left behind. Tokens it
    /// consumed are released; probed-but-unmatched tokens stay pending.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.arena.clear();
        self.buffer.discard_matched();
        self.root = self.arena.alloc(NodePayload::Pseudo, 0, None);
        self.last.clear();
        self.rec_stack.clear();
        self.farthest = 0;
    }

    /// Tries each top rule in order against the current position. The
    /// first that matches wins; its end must be unique or the grammar is
    /// ambiguous.
    pub fn match_top(&mut self) -> Result<bool, ParseError> {
        let start = self.buffer.cur;
        let top_rules = self.grammar.top_rules();
        for &top in top_rules {
            let root = self.root;
            self.arena[root].children.clear();
            self.arena[root].sorted.clear();
            self.buffer.cur = start;
            log::debug!("trying top rule {} @{}", self.grammar.name(top), start);
            if self.match_rule(top, root) {
                debug_assert_eq!(self.arena[root].children.len(), 1);
                let top_node = self.arena[root].children[0];
                debug_assert!(self.arena[top_node].status.is_succ());
                let ends = self.arena[top_node].matches.clone();
                if ends.len() != 1 {
                    return Err(ParseError::Ambiguity {
                        rule: self.grammar.name(top).to_string(),
                        ends,
                    });
                }
                self.buffer.cur = ends[0];
                self.arena[root].status = AppealStatus::Succ;
                log::debug!(
                    "top rule {} matched [{start}, {})",
                    self.grammar.name(top),
                    ends[0]
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One attempt to match `rule` at the cursor. On success the matched
    /// end set is left in `self.last` and the cursor sits at the longest
    /// end; on failure the cursor is untouched here (callers restore).
    pub fn match_rule(&mut self, rule: RuleHandle, parent: NodeHandle) -> bool {
        self.steps += 1;
        let start = self.buffer.cur;
        let node = self.arena.alloc(NodePayload::Rule(rule), start, Some(parent));

        let is_done = self.pre_pass(node, rule);
        let group = self
            .recursion
            .group_for_lead(rule)
            .or_else(|| self.recursion.first_group_of(rule));
        let in_group = group.is_some();

        // A recorded failure is only final outside recursion groups or once
        // the group's fixed point is complete; a later instance may still
        // succeed.
        if self.arena[node].status.is_fail() && (!in_group || is_done) {
            return false;
        }

        let kind = self.grammar.kind(rule);
        let zero_kind = matches!(kind, RuleKind::ZeroOrMore | RuleKind::ZeroOrOne);
        if !zero_kind && self.lookahead_fail(rule, start) {
            self.arena[node].status = AppealStatus::FailLookAhead;
            self.cache.add_failed(rule, start);
            return false;
        }

        if self.arena[node].status.is_succ() && (!in_group || is_done) {
            self.last = self.arena[node].matches.clone();
            return true;
        }

        let active = group.and_then(|g| self.find_rec_stack(g, start));

        // A nested lead in the middle of the group's own traversal. Each
        // instance gives every lead one regular descent; any re-appearance
        // after that is the recursive edge itself.
        let mut lead_in_instance = false;
        if let Some(i) = active {
            // Already visited within this instance: hand back the partial
            // result instead of recursing.
            if self.rec_stack[i].nodes_visited.contains(&rule) {
                self.last = self.arena[node].matches.clone();
                return true;
            }
            let active_group = self.rec_stack[i].group;
            if self.recursion.is_lead_of(rule, active_group) {
                if self.rec_stack[i].leads_visited.contains(&rule) {
                    // Second appearance inside the first instance: there is
                    // no previous result yet. Fail, but never record it;
                    // the first instance has not finished and the verdict
                    // would poison the cache.
                    if self.rec_stack[i].instance == Instance::First {
                        self.rec_stack[i].appeal_points.push(node);
                        self.arena[node].status = AppealStatus::Fail2ndOf1stInstance;
                        return false;
                    }
                    // Resolve the recursive edge against the previous
                    // instance. Non-master leads land here too, connecting
                    // to the master's accumulated result.
                    self.arena[node].status = AppealStatus::Succ;
                    return self.connect_previous(i, node);
                }
                self.rec_stack[i].leads_visited.push(rule);
                lead_in_instance = true;
            }
        }

        // The pre-pass moves the cursor when it imports a cached success;
        // a real traversal starts from the original position.
        self.buffer.cur = start;

        if !lead_in_instance && self.recursion.is_lead(rule) {
            let found = self.traverse_lead(node, rule);
            if !found {
                self.arena[node].status = AppealStatus::FailChildrenFailed;
                self.last.clear();
            }
            return found;
        }

        let matched = self.traverse_regular(rule, node);
        if let Some(i) = active {
            if !lead_in_instance {
                self.rec_stack[i].nodes_visited.push(rule);
            }
        }
        if !in_group && matched && !self.grammar.is_leaf(rule) {
            self.cache.mark_done(rule, start);
        }
        matched
    }

    /// Consults the caches before any descent. Imports a cached success
    /// into the node (moving the cursor past the longest end) or marks a
    /// cached failure. Returns whether the success entry is frozen.
    fn pre_pass(&mut self, node: NodeHandle, rule: RuleHandle) -> bool {
        let start = self.arena[node].start;
        let mut is_done = false;
        if let Some(entry) = self.cache.succ(rule, start) {
            debug_assert!(
                !self.cache.was_failed(rule, start),
                "rule cached as matched and failed at one token"
            );
            is_done = entry.done;
            let ends = entry.ends.clone();
            self.last.clear();
            for &end in &ends {
                self.arena[node].add_match(end);
                if end > self.buffer.cur {
                    self.buffer.cur = end;
                }
                self.last.push(end);
            }
            self.arena[node].status = AppealStatus::SuccWasSucc;
        }
        if self.cache.was_failed(rule, start) {
            self.arena[node].status = AppealStatus::FailWasFailed;
        }
        is_done
    }

    /// True when the rule's lookahead set is non-empty and the token at
    /// `start` matches none of it.
    fn lookahead_fail(&mut self, rule: RuleHandle, start: u32) -> bool {
        let lookahead = self.grammar.lookahead(rule);
        if lookahead.is_empty() {
            return false;
        }
        if start >= self.buffer.len() && !self.buffer.ensure_current(self.grammar) {
            return true;
        }
        let token = *self.buffer.active(start);
        !lookahead.iter().any(|entry| match entry {
            LookAhead::Token(sys) => token.sys_id() == Some(*sys),
            LookAhead::AnyIdent => token.is_ident(),
            LookAhead::AnyLiteral => token.is_literal(),
        })
    }

    /// Plain descent by rule kind, plus the post-result bookkeeping shared
    /// by every kind.
    pub(crate) fn traverse_regular(&mut self, rule: RuleHandle, node: NodeHandle) -> bool {
        let old_pos = self.buffer.cur;
        self.last.clear();

        if rule == self.grammar.ident {
            return self.traverse_identifier(node);
        }
        if rule == self.grammar.literal {
            return self.traverse_literal(node);
        }

        let was_succ = matches!(
            self.arena[node].status,
            AppealStatus::SuccWasSucc | AppealStatus::SuccStillWasSucc
        );
        let longest_before = if was_succ {
            self.arena[node].longest_match()
        } else {
            0
        };

        let matched = match self.grammar.kind(rule) {
            RuleKind::OneOf => self.traverse_oneof(rule, node),
            RuleKind::ZeroOrMore => self.traverse_zeroormore(rule, node),
            RuleKind::ZeroOrOne => self.traverse_zeroorone(rule, node),
            RuleKind::Concatenate => self.traverse_concat_from(rule, 0, node),
            RuleKind::Data => {
                let element = self.grammar.elements(rule)[0];
                self.traverse_element(element, node)
            }
        };

        if matched {
            let longest = self.last.iter().copied().max().unwrap_or(0);
            self.cache.reset_failed(rule, old_pos);
            if !was_succ || longest > longest_before {
                let ends = self.last.clone();
                for &end in &ends {
                    self.arena[node].add_match(end);
                }
                let all = self.arena[node].matches.clone();
                self.cache.record_succ(rule, old_pos, node, &all);
                self.arena[node].status = AppealStatus::Succ;
            } else {
                self.arena[node].status = AppealStatus::SuccStillWasSucc;
            }
            true
        } else {
            self.arena[node].status = AppealStatus::FailChildrenFailed;
            self.buffer.cur = old_pos;
            self.last.clear();
            self.cache.add_failed(rule, old_pos);
            false
        }
    }

    /// One child slot: a system token or a sub-rule. Restores the cursor
    /// when the slot fails.
    pub(crate) fn traverse_element(&mut self, element: Element, parent: NodeHandle) -> bool {
        let old_pos = self.buffer.cur;
        self.last.clear();
        match element {
            Element::Token(sys) => self.traverse_token(sys, parent),
            Element::Rule(rule) => {
                let found = self.match_rule(rule, parent);
                if !found {
                    self.buffer.cur = old_pos;
                }
                found
            }
        }
    }

    /// A token leaf matches iff the current token is the declared system
    /// token. Only successful attempts leave a node behind.
    fn traverse_token(&mut self, sys: SysTokId, parent: NodeHandle) -> bool {
        self.steps += 1;
        self.last.clear();
        if !self.buffer.ensure_current(self.grammar) {
            return false;
        }
        let i = self.buffer.cur;
        self.farthest = self.farthest.max(i);
        if self.buffer.active(i).sys_id() != Some(sys) {
            return false;
        }
        let node = self.arena.alloc(NodePayload::Token(i), i, Some(parent));
        self.arena[node].status = AppealStatus::Succ;
        self.arena[node].add_match(i + 1);
        self.last.push(i + 1);
        self.buffer.advance(self.grammar);
        true
    }

    /// The `Identifier` leaf table: matches on token kind, never descends.
    /// `node` is the rule's own appeal node; on success it becomes a token
    /// node for the identifier it consumed.
    fn traverse_identifier(&mut self, node: NodeHandle) -> bool {
        let rule = self.grammar.ident;
        if !self.buffer.ensure_current(self.grammar) {
            self.arena[node].status = AppealStatus::FailNotIdentifier;
            self.cache.add_failed(rule, self.buffer.cur);
            return false;
        }
        let i = self.buffer.cur;
        self.farthest = self.farthest.max(i);
        if self.buffer.active(i).is_ident() {
            self.leaf_succ(node, i);
            true
        } else {
            self.arena[node].status = AppealStatus::FailNotIdentifier;
            self.cache.add_failed(rule, i);
            false
        }
    }

    /// The `Literal` leaf table, same contract as the identifier leaf.
    fn traverse_literal(&mut self, node: NodeHandle) -> bool {
        let rule = self.grammar.literal;
        if !self.buffer.ensure_current(self.grammar) {
            self.arena[node].status = AppealStatus::FailNotLiteral;
            self.cache.add_failed(rule, self.buffer.cur);
            return false;
        }
        let i = self.buffer.cur;
        self.farthest = self.farthest.max(i);
        if self.buffer.active(i).is_literal() {
            self.leaf_succ(node, i);
            true
        } else {
            self.arena[node].status = AppealStatus::FailNotLiteral;
            self.cache.add_failed(rule, i);
            false
        }
    }

    fn leaf_succ(&mut self, node: NodeHandle, i: u32) {
        let n = &mut self.arena[node];
        n.payload = NodePayload::Token(i);
        n.status = AppealStatus::Succ;
        n.add_match(i + 1);
        self.last.push(i + 1);
        self.buffer.advance(self.grammar);
    }

    /// Try each alternative in order, collecting every distinct end any of
    /// them reaches. `Single` stops at the first success.
    fn traverse_oneof(&mut self, rule: RuleHandle, parent: NodeHandle) -> bool {
        let mut found = false;
        let mut ends: Vec<u32> = Vec::new();
        let old_pos = self.buffer.cur;
        let mut new_pos = old_pos;
        let single = self.grammar.props(rule).single;
        let elements = self.grammar.elements(rule);
        for &element in elements {
            let ok = self.traverse_element(element, parent);
            found |= ok;
            if ok {
                for &end in &self.last {
                    if !ends.contains(&end) {
                        ends.push(end);
                    }
                }
                new_pos = new_pos.max(self.buffer.cur);
                self.buffer.cur = old_pos;
                if single {
                    break;
                }
            }
        }
        self.last = ends;
        self.buffer.cur = new_pos;
        found
    }

    /// Concatenation, starting at element `from` (0 for a plain match; a
    /// later index when a recursion instance resumes behind a zero-length
    /// recursive prefix). Every end a child reaches becomes a start for the
    /// next child; zero-or children additionally pass their start through.
    pub(crate) fn traverse_concat_from(
        &mut self,
        rule: RuleHandle,
        from: usize,
        parent: NodeHandle,
    ) -> bool {
        let start = self.buffer.cur;
        let mut found = true;
        let mut prev: Vec<u32> = vec![start];
        let mut fin: Vec<u32> = Vec::new();
        self.last.clear();

        let elements = self.grammar.elements(rule);
        for &element in &elements[from..] {
            let is_zero = match element {
                Element::Rule(r) => matches!(
                    self.grammar.kind(r),
                    RuleKind::ZeroOrMore | RuleKind::ZeroOrOne
                ),
                Element::Token(_) => false,
            };

            let mut found_sub = false;
            let mut sub: Vec<u32> = Vec::new();
            for &p in &prev {
                self.buffer.cur = p;
                let ok = self.traverse_element(element, parent);
                found_sub |= ok;
                if ok {
                    let mut dup_with_prev = false;
                    for &end in &self.last {
                        if end == p {
                            dup_with_prev = true;
                        }
                        if !sub.contains(&end) {
                            sub.push(end);
                        }
                    }
                    // Matching nothing is a valid outcome for a zero-or
                    // child, so its start survives as an end.
                    if is_zero && !dup_with_prev && !sub.contains(&p) {
                        sub.push(p);
                    }
                }
            }

            if found_sub {
                // A zero-or child that moved nothing keeps the previous
                // relay set alive.
                if !sub.is_empty() {
                    fin = sub.clone();
                    prev = sub;
                }
            } else {
                found = false;
                break;
            }
        }

        // All children were zero-or and none consumed anything: that is no
        // progress, not a match.
        if fin.len() == 1 && fin[0] == start {
            found = false;
        }

        if found {
            self.last = fin;
            for &end in &self.last {
                if end > self.buffer.cur {
                    self.buffer.cur = end;
                }
            }
        } else {
            self.last.clear();
            self.buffer.cur = start;
        }
        found
    }

    /// Iterate the sole child until no new end appears. A visited set of
    /// start positions keeps degenerate sub-rules (a zero-or inside a
    /// zero-or) from re-entering at the same position forever. Always
    /// succeeds; an empty result means it matched nothing.
    fn traverse_zeroormore(&mut self, rule: RuleHandle, parent: NodeHandle) -> bool {
        let start = self.buffer.cur;
        self.last.clear();
        let element = self.grammar.elements(rule)[0];
        let mut prev: Vec<u32> = vec![start];
        let mut visited: Vec<u32> = Vec::new();
        let mut fin: Vec<u32> = Vec::new();

        loop {
            let mut found_sub = false;
            let mut sub: Vec<u32> = Vec::new();
            for &p in &prev {
                self.buffer.cur = p;
                visited.push(p);
                let ok = self.traverse_element(element, parent);
                found_sub |= ok;
                if ok {
                    sub.extend(self.last.iter().copied());
                }
            }
            if !found_sub || sub.is_empty() {
                break;
            }
            for &end in &sub {
                if !fin.contains(&end) {
                    fin.push(end);
                }
            }
            prev.clear();
            for end in sub {
                if !visited.contains(&end) && !prev.contains(&end) {
                    prev.push(end);
                }
            }
            if prev.is_empty() {
                break;
            }
        }

        let mut new_pos = start;
        for &end in &fin {
            if end > new_pos {
                new_pos = end;
            }
        }
        self.buffer.cur = new_pos;
        self.last = fin;
        true
    }

    /// Attempt the sole child once. Always succeeds; the result is the
    /// child's end set, or empty when the child failed.
    fn traverse_zeroorone(&mut self, rule: RuleHandle, parent: NodeHandle) -> bool {
        let element = self.grammar.elements(rule)[0];
        let _ = self.traverse_element(element, parent);
        true
    }

    /// Whether the element describes this appeal node: the same sub-rule,
    /// the same system token, or a leaf table against the token's kind.
    pub(crate) fn element_matches(&self, element: Element, node: NodeHandle) -> bool {
        match (element, self.arena[node].payload) {
            (Element::Rule(r), NodePayload::Rule(nr)) => r == nr,
            (Element::Rule(r), NodePayload::Token(i)) => {
                let token = self.buffer.active(i);
                (r == self.grammar.ident && token.is_ident())
                    || (r == self.grammar.literal && token.is_literal())
            }
            (Element::Token(sys), NodePayload::Token(i)) => {
                self.buffer.active(i).sys_id() == Some(sys)
            }
            _ => false,
        }
    }

    /// Finds an unsorted child standing for `element` whose match set
    /// contains `end`. The first hit in attempt order wins.
    pub(crate) fn find_element_child(
        &self,
        parent: NodeHandle,
        element: Element,
        end: u32,
    ) -> Option<NodeHandle> {
        self.arena[parent]
            .children
            .iter()
            .copied()
            .find(|&child| {
                self.arena[child].status.is_succ()
                    && self.arena[child].find_match(end)
                    && self.element_matches(element, child)
            })
    }

    /// The 1-based grammar slot `child` stands for under `parent`, honoring
    /// a slot pinned by edge shrinking.
    pub(crate) fn sorted_child_index(&self, parent: NodeHandle, child: NodeHandle) -> Option<u32> {
        if self.arena[child].simplified_slot != 0 {
            return Some(self.arena[child].simplified_slot);
        }
        let rule = self.arena[parent].rule()?;
        self.grammar
            .elements(rule)
            .iter()
            .position(|&element| self.element_matches(element, child))
            .map(|i| i as u32 + 1)
    }

    /// The sorted child occupying the 1-based grammar slot, if any.
    pub(crate) fn sorted_child_by_slot(&self, parent: NodeHandle, slot: u32) -> Option<NodeHandle> {
        self.arena[parent]
            .sorted
            .iter()
            .copied()
            .find(|&child| self.sorted_child_index(parent, child) == Some(slot))
    }
}
