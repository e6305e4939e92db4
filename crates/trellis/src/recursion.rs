//! Left-recursion descriptors and the analysis derived from them.
//!
//! The offline detector reports each left-recursive group as a lead rule
//! plus the cycles through it, every cycle being the child indices walked
//! from the lead back to itself. This module derives what the runtime's
//! fixed-point traversal needs: the rules on the cycles, the FronNodes
//! (nodes reachable in one step from a cycle node but not on any cycle),
//! and the LeadFronNodes reachable from the lead itself.

use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};

use crate::grammar::{Element, Grammar, RuleHandle, RuleKind};
use crate::token::SysTokId;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct GroupId(u32);

entity_impl! { GroupId }

/// Raw cycle data emitted by the offline detector for one group.
#[derive(Clone, Debug)]
pub struct LeftRecursion {
    /// The master lead node: the designated entry rule the cycle data is
    /// expressed against.
    pub lead: RuleHandle,
    /// Each cycle is the sequence of child indices walked from the lead
    /// back to the lead.
    pub circles: Vec<Vec<u32>>,
    /// Further lead nodes of the same group, when the detector identifies
    /// more than one entry point. A visit of one of these while the group
    /// is being traversed resolves against the master's instances.
    pub leads: Vec<RuleHandle>,
}

/// A node reachable in one step from a cycle. `pos` is its position on the
/// cycle, 1 being the first node after the lead (0 for LeadFronNodes, where
/// the position is meaningless).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FronNode {
    Rule { pos: u32, rule: RuleHandle },
    Token { pos: u32, token: SysTokId },
    /// A Concatenate cycle node whose trailing children continue the match
    /// once the recursive child is resolved; matching resumes at element
    /// index `start` of `rule`.
    Concat { pos: u32, rule: RuleHandle, start: u32 },
}

/// Fully derived information for one left-recursive group.
#[derive(Clone, Debug)]
pub struct Recursion {
    /// The master lead.
    pub lead: RuleHandle,
    pub circles: Vec<Vec<u32>>,
    /// Every lead of the group, the master first.
    pub leads: Vec<RuleHandle>,
    /// All rules on the cycles, the lead first.
    pub nodes: Vec<RuleHandle>,
    pub lead_fron: Vec<FronNode>,
    /// FronNodes per cycle, indexed like `circles`.
    pub fron: Vec<Vec<FronNode>>,
}

/// Resolves the child at `index` of a rule to the element it references.
fn child_at(grammar: &Grammar, parent: RuleHandle, index: u32) -> Element {
    let elements = grammar.elements(parent);
    match grammar.kind(parent) {
        RuleKind::Concatenate | RuleKind::OneOf => elements[index as usize],
        RuleKind::ZeroOrMore | RuleKind::ZeroOrOne | RuleKind::Data => {
            assert_eq!(index, 0, "single-child rule indexed past its child");
            elements[0]
        }
    }
}

impl Recursion {
    pub fn compute(grammar: &Grammar, raw: &LeftRecursion) -> Recursion {
        let mut leads = vec![raw.lead];
        for &other in &raw.leads {
            if !leads.contains(&other) {
                leads.push(other);
            }
        }
        let mut rec = Recursion {
            lead: raw.lead,
            circles: raw.circles.clone(),
            leads,
            nodes: Vec::new(),
            lead_fron: Vec::new(),
            fron: Vec::new(),
        };
        rec.find_recursion_nodes(grammar);
        // Non-master leads belong to the group even when the master's
        // cycle paths do not pass through them.
        for i in 1..rec.leads.len() {
            let lead = rec.leads[i];
            if !rec.nodes.contains(&lead) {
                rec.nodes.push(lead);
            }
        }
        rec.find_lead_fron_nodes(grammar);
        for i in 0..rec.circles.len() {
            let fron = rec.find_fron_nodes(grammar, i);
            rec.fron.push(fron);
        }
        rec
    }

    pub fn is_recursion_node(&self, rule: RuleHandle) -> bool {
        self.nodes.contains(&rule)
    }

    /// Collects every rule on every cycle. Each step must resolve to a rule
    /// reference, since tokens cannot continue a cycle.
    fn find_recursion_nodes(&mut self, grammar: &Grammar) {
        self.nodes.push(self.lead);
        for circle in &self.circles {
            let mut prev = self.lead;
            for (j, &child_index) in circle.iter().enumerate() {
                let rule = match child_at(grammar, prev, child_index) {
                    Element::Rule(rule) => rule,
                    Element::Token(_) => panic!("token on a recursion cycle"),
                };
                if j + 1 == circle.len() {
                    assert_eq!(rule, self.lead, "cycle does not close on its lead");
                } else if !self.nodes.contains(&rule) {
                    self.nodes.push(rule);
                }
                prev = rule;
            }
        }
    }

    fn find_lead_fron_nodes(&mut self, grammar: &Grammar) {
        match grammar.kind(self.lead) {
            RuleKind::OneOf => {
                let circle_firsts: Vec<u32> =
                    self.circles.iter().map(|c| c[0]).collect();
                for (i, element) in grammar.elements(self.lead).iter().enumerate() {
                    match element {
                        Element::Token(token) => {
                            self.lead_fron.push(FronNode::Token { pos: 0, token: *token });
                        }
                        Element::Rule(rule) => {
                            if !circle_firsts.contains(&(i as u32)) {
                                self.lead_fron.push(FronNode::Rule { pos: 0, rule: *rule });
                            }
                        }
                    }
                }
            }
            RuleKind::ZeroOrMore | RuleKind::ZeroOrOne | RuleKind::Data => {
                // The only child is on the cycle; nothing leads out.
            }
            RuleKind::Concatenate => {
                let num = grammar.elements(self.lead).len() as u32;
                for circle in &self.circles {
                    let circle_index = circle[0];
                    if circle_index < num - 1 {
                        self.lead_fron.push(FronNode::Concat {
                            pos: 0,
                            rule: self.lead,
                            start: circle_index + 1,
                        });
                    }
                }
            }
        }
    }

    /// FronNodes along one cycle: nodes directly reachable from a cycle
    /// node but not on any cycle of this group.
    fn find_fron_nodes(&self, grammar: &Grammar, circle_index: usize) -> Vec<FronNode> {
        let circle = &self.circles[circle_index];
        let mut fron = Vec::new();
        let mut prev = self.lead;
        for (step, &child_index) in circle.iter().enumerate() {
            let pos = (step + 1) as u32;
            let next = match child_at(grammar, prev, child_index) {
                Element::Rule(rule) => rule,
                Element::Token(_) => panic!("token on a recursion cycle"),
            };
            if step + 1 == circle.len() {
                assert_eq!(next, self.lead);
            }
            // The lead's own out-edges are LeadFronNodes, handled above.
            if step == 0 {
                prev = next;
                continue;
            }
            match grammar.kind(prev) {
                RuleKind::OneOf => {
                    for element in grammar.elements(prev) {
                        match element {
                            Element::Token(token) => {
                                fron.push(FronNode::Token { pos, token: *token });
                            }
                            Element::Rule(rule) => {
                                if !self.is_recursion_node(*rule) && *rule != next {
                                    fron.push(FronNode::Rule { pos, rule: *rule });
                                }
                            }
                        }
                    }
                }
                RuleKind::ZeroOrMore | RuleKind::ZeroOrOne | RuleKind::Data => {
                    assert_eq!(child_index, 0);
                }
                RuleKind::Concatenate => {
                    let num = grammar.elements(prev).len() as u32;
                    if child_index < num - 1 {
                        fron.push(FronNode::Concat {
                            pos,
                            rule: prev,
                            start: child_index + 1,
                        });
                    }
                }
            }
            prev = next;
        }
        fron
    }
}

/// Lookup structure over all groups: lead detection, group membership, and
/// the derived [`Recursion`] per group.
pub struct RecursionIndex {
    recursions: PrimaryMap<GroupId, Recursion>,
    lead_of: SecondaryMap<RuleHandle, Option<GroupId>>,
    member_of: SecondaryMap<RuleHandle, Vec<GroupId>>,
}

impl RecursionIndex {
    pub fn build(grammar: &Grammar, raw: &[LeftRecursion]) -> RecursionIndex {
        let mut recursions = PrimaryMap::new();
        let mut lead_of: SecondaryMap<RuleHandle, Option<GroupId>> = SecondaryMap::new();
        let mut member_of: SecondaryMap<RuleHandle, Vec<GroupId>> = SecondaryMap::new();
        for lr in raw {
            let rec = Recursion::compute(grammar, lr);
            log::debug!(
                "recursion group: lead {} with {} cycle(s), {} lead(s), {} member(s)",
                grammar.name(lr.lead),
                rec.circles.len(),
                rec.leads.len(),
                rec.nodes.len()
            );
            let leads = rec.leads.clone();
            let members = rec.nodes.clone();
            let group = recursions.push(rec);
            for lead in leads {
                if lead_of[lead].is_none() {
                    lead_of[lead] = Some(group);
                }
            }
            for rule in members {
                member_of[rule].push(group);
            }
        }
        RecursionIndex {
            recursions,
            lead_of,
            member_of,
        }
    }

    /// An index with no recursive groups at all.
    pub fn empty() -> RecursionIndex {
        RecursionIndex {
            recursions: PrimaryMap::new(),
            lead_of: SecondaryMap::new(),
            member_of: SecondaryMap::new(),
        }
    }

    /// True for any lead, master or not.
    pub fn is_lead(&self, rule: RuleHandle) -> bool {
        self.lead_of[rule].is_some()
    }

    pub fn group_for_lead(&self, rule: RuleHandle) -> Option<GroupId> {
        self.lead_of[rule]
    }

    /// Whether `rule` is one of the leads of this particular group.
    pub fn is_lead_of(&self, rule: RuleHandle, group: GroupId) -> bool {
        self.recursions[group].leads.contains(&rule)
    }

    /// The group's master lead, the rule its cycle data is expressed
    /// against.
    pub fn master(&self, group: GroupId) -> RuleHandle {
        self.recursions[group].lead
    }

    /// The first group `rule` belongs to, if any.
    pub fn first_group_of(&self, rule: RuleHandle) -> Option<GroupId> {
        self.member_of[rule].first().copied()
    }

    pub fn recursion(&self, group: GroupId) -> &Recursion {
        &self.recursions[group]
    }

    /// All rules on the cycles of `group`.
    pub fn members(&self, group: GroupId) -> &[RuleHandle] {
        &self.recursions[group].nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;

    /// `Add : Id | Add '+' Id` — one cycle of length two through the
    /// concatenate sub-rule.
    fn direct_recursion() -> (Grammar, LeftRecursion) {
        let mut b = GrammarBuilder::new();
        let plus = b.operator("+");
        let add = b.declare("Add");
        let add_sub = b.rule(
            "Add_sub1",
            RuleKind::Concatenate,
            vec![Element::Rule(add), Element::Token(plus), Element::Rule(b.ident())],
        );
        b.define(
            add,
            RuleKind::OneOf,
            vec![Element::Rule(b.ident()), Element::Rule(add_sub)],
        );
        b.set_top(add);
        let lr = LeftRecursion {
            lead: add,
            circles: vec![vec![1, 0]],
            leads: Vec::new(),
        };
        (b.finish(), lr)
    }

    #[test]
    fn direct_cycle_nodes_and_fron() {
        let (g, lr) = direct_recursion();
        let rec = Recursion::compute(&g, &lr);
        assert_eq!(rec.nodes.len(), 2);
        assert_eq!(rec.nodes[0], lr.lead);

        // The Id alternative leads out of the recursion.
        assert!(matches!(rec.lead_fron[0], FronNode::Rule { pos: 0, rule } if rule == g.ident));

        // The concatenate cycle node resumes matching at '+': element 1,
        // found at the second step of the cycle.
        assert_eq!(rec.fron.len(), 1);
        assert!(
            matches!(rec.fron[0][0], FronNode::Concat { pos: 2, start: 1, .. }),
            "expected concat fron node, got {:?}",
            rec.fron[0]
        );
    }

    #[test]
    fn concatenate_lead_fron_discovery() {
        // A : B C; B : x | A — the lead itself is a concatenate, so the
        // trailing `C` forms the lead fron node with start index 1.
        let mut b = GrammarBuilder::new();
        let x = b.keyword("x");
        let c_tok = b.keyword("c");
        let a = b.declare("A");
        let bb = b.rule("B", RuleKind::OneOf, vec![Element::Token(x), Element::Rule(a)]);
        let cc = b.rule("C", RuleKind::Data, vec![Element::Token(c_tok)]);
        b.define(a, RuleKind::Concatenate, vec![Element::Rule(bb), Element::Rule(cc)]);
        b.set_top(a);
        let g = b.finish();

        let lr = LeftRecursion {
            lead: a,
            circles: vec![vec![0, 1]],
            leads: Vec::new(),
        };
        let rec = Recursion::compute(&g, &lr);
        assert_eq!(rec.nodes, vec![a, bb]);
        assert_eq!(
            rec.lead_fron,
            vec![FronNode::Concat { pos: 0, rule: a, start: 1 }]
        );
    }

    #[test]
    fn index_membership() {
        let (g, lr) = direct_recursion();
        let lead = lr.lead;
        let idx = RecursionIndex::build(&g, &[lr]);
        assert!(idx.is_lead(lead));
        let group = idx.group_for_lead(lead).unwrap();
        assert_eq!(idx.first_group_of(lead), Some(group));
        assert_eq!(idx.master(group), lead);
        assert_eq!(idx.members(group).len(), 2);
        assert!(!idx.is_lead(g.ident));
        assert_eq!(idx.first_group_of(g.ident), None);
    }

    #[test]
    fn multi_lead_group_shares_one_traversal_identity() {
        // `Primary : Literal | FieldAccess`, `FieldAccess : Primary '.' Id`
        // with both rules reported as leads of the one group.
        let mut b = GrammarBuilder::new();
        let dot = b.operator(".");
        let primary = b.declare("Primary");
        let field = b.rule(
            "FieldAccess",
            RuleKind::Concatenate,
            vec![Element::Rule(primary), Element::Token(dot), Element::Rule(b.ident())],
        );
        b.define(
            primary,
            RuleKind::OneOf,
            vec![Element::Rule(b.literal()), Element::Rule(field)],
        );
        b.set_top(primary);
        let g = b.finish();

        let lr = LeftRecursion {
            lead: primary,
            circles: vec![vec![1, 0]],
            leads: vec![field],
        };
        let idx = RecursionIndex::build(&g, &[lr]);

        let group = idx.group_for_lead(primary).unwrap();
        assert_eq!(idx.group_for_lead(field), Some(group));
        assert!(idx.is_lead(field));
        assert!(idx.is_lead_of(field, group));
        assert!(idx.is_lead_of(primary, group));
        assert_eq!(idx.master(group), primary);
        assert!(idx.members(group).contains(&field));
        assert_eq!(idx.first_group_of(field), Some(group));
    }
}
