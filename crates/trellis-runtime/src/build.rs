//! AST construction: an iterative post-order walk over the sorted tree,
//! one builder invocation per rule action.

use cranelift_entity::EntitySet;

use trellis::error::ParseError;

use crate::appeal::{NodeHandle, NodePayload};
use crate::ast::{ActionTable, AstCtx, AstNode, AstTree, Param, TreeHandle};
use crate::matcher::ParseCtx;

impl ParseCtx<'_> {
    /// Builds the AST for the sorted construct. Children build before their
    /// parents; the last node that produces a tree is the root.
    pub fn build_ast(
        &mut self,
        actions: &ActionTable,
        tree: &mut AstTree,
    ) -> Result<TreeHandle, ParseError> {
        let top = self.arena[self.root].sorted[0];
        let mut stack = vec![top];
        let mut done: EntitySet<NodeHandle> = EntitySet::new();
        let mut last_built = None;

        while let Some(&node) = stack.last() {
            let pending = self.arena[node]
                .sorted
                .iter()
                .copied()
                .find(|&child| !done.contains(child));
            if let Some(child) = pending {
                stack.push(child);
                continue;
            }
            stack.pop();
            done.insert(node);
            if let Some(built) = self.build_node(node, actions, tree)? {
                self.arena[node].tree = Some(built);
                last_built = Some(built);
            }
        }

        log::debug!("ast build: {} nodes in the tree", tree.len());
        last_built.ok_or(ParseError::Invariant(
            "matched construct produced no tree node",
        ))
    }

    /// One node: a token leaf, a rule with actions, or a rule without any
    /// whose children are conveyed upward.
    fn build_node(
        &mut self,
        node: NodeHandle,
        actions: &ActionTable,
        tree: &mut AstTree,
    ) -> Result<Option<TreeHandle>, ParseError> {
        match self.arena[node].payload {
            NodePayload::Pseudo => Ok(None),
            NodePayload::Token(i) => Ok(self.token_tree_node(i, tree)),
            NodePayload::Rule(rule) => {
                let rule_actions = self.grammar.actions(rule);
                let mut built = None;
                for action in rule_actions {
                    let mut params = Vec::with_capacity(action.elems.len());
                    for &slot in &action.elems {
                        params.push(self.param_for_slot(node, slot));
                    }
                    let mut cx = AstCtx {
                        tree: &mut *tree,
                        pool: &mut self.buffer.pool,
                        grammar: self.grammar,
                    };
                    if let Some(result) = actions.invoke(action.id, &mut cx, &params)? {
                        built = Some(result);
                    }
                }
                if built.is_some() {
                    return Ok(built);
                }
                self.manipulate(node, tree)
            }
        }
    }

    fn token_tree_node(&self, i: u32, tree: &mut AstTree) -> Option<TreeHandle> {
        match *self.buffer.active(i) {
            trellis::token::Token::Ident(name) => {
                Some(tree.alloc(AstNode::Identifier { name }))
            }
            trellis::token::Token::Literal(value) => {
                Some(tree.alloc(AstNode::Literal { value }))
            }
            _ => None,
        }
    }

    /// The parameter for a 1-based grammar slot: the child's tree if it
    /// built one, the bare token for token leaves, empty otherwise (a
    /// zero-or slot that matched nothing, or a child with no tree).
    fn param_for_slot(&self, node: NodeHandle, slot: u32) -> Param {
        match self.sorted_child_by_slot(node, slot) {
            None => Param::Empty,
            Some(child) => {
                if let Some(tree) = self.arena[child].tree {
                    Param::Tree(tree)
                } else if let Some(i) = self.arena[child].token_index() {
                    Param::Token(*self.buffer.active(i))
                } else {
                    Param::Empty
                }
            }
        }
    }

    /// A rule without actions still conveys its children. One child passes
    /// through. Two children admit the fix-ups for shapes the grammar
    /// cannot express directly: a parenthesised type before an expression
    /// reads as a cast, and an expression before a unary operator with
    /// binary semantics reads as a binary operation. Anything else rides up
    /// in a Pass container.
    fn manipulate(
        &mut self,
        node: NodeHandle,
        tree: &mut AstTree,
    ) -> Result<Option<TreeHandle>, ParseError> {
        let mut kids: Vec<TreeHandle> = Vec::new();
        for &child in &self.arena[node].sorted {
            if let Some(built) = self.arena[child].tree {
                kids.push(built);
            }
        }

        if kids.len() == 1 {
            return Ok(Some(kids[0]));
        }

        if kids.len() == 2 {
            let (first, second) = (kids[0], kids[1]);
            if let AstNode::Parenthesis { expr } = *tree.get(first) {
                return Ok(Some(tree.alloc(AstNode::Cast {
                    target: expr,
                    operand: second,
                })));
            }
            if let AstNode::UnaryOp { op, operand } = *tree.get(second) {
                if self.grammar.system_token(op).binary {
                    return Ok(Some(tree.alloc(AstNode::BinaryOp {
                        op,
                        lhs: first,
                        rhs: operand,
                    })));
                }
            }
        }

        if kids.is_empty() {
            return Ok(None);
        }
        Ok(Some(tree.alloc(AstNode::Pass { children: kids })))
    }
}
