use std::collections::HashMap;

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::token::SysTokId;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RuleHandle(u32);

entity_impl! { RuleHandle }

/// Dense id of a rule action. The runtime dispatches through a static table
/// indexed by this id; it never interprets the id itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ActionId(u32);

entity_impl! { ActionId }

/// How the children of a rule table compose.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RuleKind {
    /// Ordered alternatives; the match set is the union of child end sets.
    OneOf,
    /// All children in sequence.
    Concatenate,
    /// The sole child, any number of times. Always succeeds.
    ZeroOrMore,
    /// The sole child, at most once. Always succeeds.
    ZeroOrOne,
    /// A single wrapper around one child.
    Data,
}

/// One child slot of a rule table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Element {
    Rule(RuleHandle),
    Token(SysTokId),
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct RuleProps {
    /// OneOf that stops at the first matching alternative.
    pub single: bool,
    /// The rule is a start symbol for top-level constructs.
    pub top: bool,
}

/// An action attached to a rule: the dense action id plus the 1-based
/// element indices selecting the children whose values become parameters.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RuleAction {
    pub id: ActionId,
    pub elems: Vec<u32>,
}

/// One entry of a rule's lookahead set. An empty set means no filtering.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LookAhead {
    Token(SysTokId),
    AnyIdent,
    AnyLiteral,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SysTokKind {
    Keyword,
    Operator,
    Separator,
}

/// An interned keyword, operator, or separator spelling. The unary/binary
/// flags describe operator semantics and feed the AST fix-ups for operators
/// that read both ways (`-` and friends).
#[derive(Clone, Debug)]
pub struct SystemToken {
    pub spelling: String,
    pub kind: SysTokKind,
    pub unary: bool,
    pub binary: bool,
}

/// A grammar rule table. Immutable once the grammar is built.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
    pub elements: Vec<Element>,
    pub props: RuleProps,
    pub actions: Vec<RuleAction>,
    pub lookahead: Vec<LookAhead>,
}

/// The complete rule-table set for one language, plus the system-token
/// inventory. `ident` and `literal` are the two distinguished leaf tables
/// matched against token kind rather than descended into.
pub struct Grammar {
    rules: PrimaryMap<RuleHandle, Rule>,
    system: PrimaryMap<SysTokId, SystemToken>,
    spellings: HashMap<String, SysTokId>,
    top: Vec<RuleHandle>,
    pub ident: RuleHandle,
    pub literal: RuleHandle,
}

impl Grammar {
    pub fn rule(&self, handle: RuleHandle) -> &Rule {
        &self.rules[handle]
    }

    pub fn kind(&self, handle: RuleHandle) -> RuleKind {
        self.rules[handle].kind
    }

    pub fn elements(&self, handle: RuleHandle) -> &[Element] {
        &self.rules[handle].elements
    }

    pub fn props(&self, handle: RuleHandle) -> RuleProps {
        self.rules[handle].props
    }

    pub fn actions(&self, handle: RuleHandle) -> &[RuleAction] {
        &self.rules[handle].actions
    }

    pub fn lookahead(&self, handle: RuleHandle) -> &[LookAhead] {
        &self.rules[handle].lookahead
    }

    pub fn name(&self, handle: RuleHandle) -> &str {
        &self.rules[handle].name
    }

    pub fn num_rules(&self) -> usize {
        self.rules.len()
    }

    pub fn rule_handles(&self) -> impl Iterator<Item = RuleHandle> + '_ {
        self.rules.keys()
    }

    /// True for the `Identifier`/`Literal` leaf tables.
    pub fn is_leaf(&self, handle: RuleHandle) -> bool {
        handle == self.ident || handle == self.literal
    }

    pub fn top_rules(&self) -> &[RuleHandle] {
        &self.top
    }

    pub fn system_token(&self, id: SysTokId) -> &SystemToken {
        &self.system[id]
    }

    pub fn lookup_spelling(&self, spelling: &str) -> Option<SysTokId> {
        self.spellings.get(spelling).copied()
    }

    /// Finds the longest system token whose spelling prefixes `input`.
    /// Used by lexers to split operator/separator runs.
    pub fn match_system_prefix(&self, input: &str) -> Option<(SysTokId, usize)> {
        let mut best: Option<(SysTokId, usize)> = None;
        for (id, tok) in self.system.iter() {
            if tok.kind == SysTokKind::Keyword {
                continue;
            }
            let len = tok.spelling.len();
            if input.starts_with(tok.spelling.as_str())
                && best.map_or(true, |(_, blen)| len > blen)
            {
                best = Some((id, len));
            }
        }
        best
    }

    /// True when any action of `rule` references the 1-based element slot.
    pub fn action_has_elem(&self, rule: RuleHandle, slot: u32) -> bool {
        self.rules[rule]
            .actions
            .iter()
            .any(|a| a.elems.contains(&slot))
    }
}

/// Assembles a [`Grammar`] in place of the offline table generator. Rules
/// are declared first so cyclic references can be expressed, then defined.
pub struct GrammarBuilder {
    rules: PrimaryMap<RuleHandle, Rule>,
    system: PrimaryMap<SysTokId, SystemToken>,
    spellings: HashMap<String, SysTokId>,
    defined: Vec<bool>,
    ident: RuleHandle,
    literal: RuleHandle,
}

impl GrammarBuilder {
    pub fn new() -> GrammarBuilder {
        let mut rules = PrimaryMap::new();
        let ident = rules.push(Rule {
            name: "Identifier".to_string(),
            kind: RuleKind::Data,
            elements: Vec::new(),
            props: RuleProps::default(),
            actions: Vec::new(),
            lookahead: vec![LookAhead::AnyIdent],
        });
        let literal = rules.push(Rule {
            name: "Literal".to_string(),
            kind: RuleKind::Data,
            elements: Vec::new(),
            props: RuleProps::default(),
            actions: Vec::new(),
            lookahead: vec![LookAhead::AnyLiteral],
        });
        GrammarBuilder {
            rules,
            system: PrimaryMap::new(),
            spellings: HashMap::new(),
            defined: vec![true, true],
            ident,
            literal,
        }
    }

    pub fn ident(&self) -> RuleHandle {
        self.ident
    }

    pub fn literal(&self) -> RuleHandle {
        self.literal
    }

    fn system_token(&mut self, spelling: &str, kind: SysTokKind) -> SysTokId {
        if let Some(&id) = self.spellings.get(spelling) {
            return id;
        }
        let id = self.system.push(SystemToken {
            spelling: spelling.to_string(),
            kind,
            unary: false,
            binary: false,
        });
        self.spellings.insert(spelling.to_string(), id);
        id
    }

    pub fn keyword(&mut self, spelling: &str) -> SysTokId {
        self.system_token(spelling, SysTokKind::Keyword)
    }

    pub fn operator(&mut self, spelling: &str) -> SysTokId {
        self.system_token(spelling, SysTokKind::Operator)
    }

    pub fn separator(&mut self, spelling: &str) -> SysTokId {
        self.system_token(spelling, SysTokKind::Separator)
    }

    /// Marks an operator as usable in unary and/or binary position.
    pub fn operator_flags(&mut self, id: SysTokId, unary: bool, binary: bool) {
        self.system[id].unary = unary;
        self.system[id].binary = binary;
    }

    /// Declares a rule so it can be referenced before it is defined.
    pub fn declare(&mut self, name: &str) -> RuleHandle {
        let handle = self.rules.push(Rule {
            name: name.to_string(),
            kind: RuleKind::Data,
            elements: Vec::new(),
            props: RuleProps::default(),
            actions: Vec::new(),
            lookahead: Vec::new(),
        });
        self.defined.push(false);
        handle
    }

    pub fn define(&mut self, handle: RuleHandle, kind: RuleKind, elements: Vec<Element>) {
        match kind {
            RuleKind::ZeroOrMore | RuleKind::ZeroOrOne | RuleKind::Data => {
                assert_eq!(elements.len(), 1, "{} must have one element", self.rules[handle].name)
            }
            RuleKind::OneOf | RuleKind::Concatenate => {
                assert!(!elements.is_empty(), "{} has no elements", self.rules[handle].name)
            }
        }
        let rule = &mut self.rules[handle];
        rule.kind = kind;
        rule.elements = elements;
        self.defined[handle.as_u32() as usize] = true;
    }

    /// Declares and defines in one step.
    pub fn rule(&mut self, name: &str, kind: RuleKind, elements: Vec<Element>) -> RuleHandle {
        let handle = self.declare(name);
        self.define(handle, kind, elements);
        handle
    }

    pub fn set_single(&mut self, handle: RuleHandle) {
        self.rules[handle].props.single = true;
    }

    pub fn set_top(&mut self, handle: RuleHandle) {
        self.rules[handle].props.top = true;
    }

    pub fn action(&mut self, handle: RuleHandle, id: u32, elems: &[u32]) {
        use cranelift_entity::EntityRef;
        self.rules[handle].actions.push(RuleAction {
            id: ActionId::new(id as usize),
            elems: elems.to_vec(),
        });
    }

    pub fn lookahead(&mut self, handle: RuleHandle, entry: LookAhead) {
        self.rules[handle].lookahead.push(entry);
    }

    pub fn finish(self) -> Grammar {
        for (handle, rule) in self.rules.iter() {
            assert!(
                self.defined[handle.as_u32() as usize],
                "rule {} declared but never defined",
                rule.name
            );
        }
        let top = self
            .rules
            .iter()
            .filter(|(_, r)| r.props.top)
            .map(|(h, _)| h)
            .collect();
        Grammar {
            rules: self.rules,
            system: self.system,
            spellings: self.spellings,
            top,
            ident: self.ident,
            literal: self.literal,
        }
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        GrammarBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_interns_system_tokens() {
        let mut b = GrammarBuilder::new();
        let plus = b.operator("+");
        assert_eq!(b.operator("+"), plus);
        let semi = b.separator(";");
        assert_ne!(plus, semi);
        b.operator_flags(plus, true, true);

        let expr = b.declare("Expr");
        b.define(expr, RuleKind::OneOf, vec![Element::Rule(b.ident()), Element::Token(plus)]);
        b.set_top(expr);
        let g = b.finish();

        assert_eq!(g.top_rules(), &[expr]);
        assert_eq!(g.kind(expr), RuleKind::OneOf);
        assert!(g.system_token(plus).binary);
        assert_eq!(g.lookup_spelling(";"), Some(semi));
    }

    #[test]
    fn longest_prefix_wins() {
        let mut b = GrammarBuilder::new();
        let lt = b.operator("<");
        let shl = b.operator("<<");
        let expr = b.rule("E", RuleKind::Data, vec![Element::Rule(b.ident())]);
        b.set_top(expr);
        let g = b.finish();

        assert_eq!(g.match_system_prefix("<<x"), Some((shl, 2)));
        assert_eq!(g.match_system_prefix("<x"), Some((lt, 1)));
        assert_eq!(g.match_system_prefix("x"), None);
    }

    #[test]
    fn action_elem_lookup() {
        let mut b = GrammarBuilder::new();
        let plus = b.operator("+");
        let e = b.rule(
            "Add",
            RuleKind::Concatenate,
            vec![Element::Rule(b.ident()), Element::Token(plus), Element::Rule(b.ident())],
        );
        b.action(e, 0, &[1, 3]);
        b.set_top(e);
        let g = b.finish();

        assert!(g.action_has_elem(e, 1));
        assert!(!g.action_has_elem(e, 2));
        assert!(g.action_has_elem(e, 3));
    }
}
