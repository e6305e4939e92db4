//! Shared fixtures: small grammars with hand-written recursion descriptors
//! (standing in for the offline detector) and a generic action set.
#![allow(dead_code)]

use trellis::error::ParseError;
use trellis::grammar::{Element, Grammar, GrammarBuilder, RuleKind};
use trellis::recursion::{LeftRecursion, RecursionIndex};
use trellis_runtime::ast::{ActionFn, ActionTable, AstCtx, AstNode, Param, TreeHandle};
use trellis_runtime::lexer::SourceLexer;
use trellis_runtime::Parser;

pub const BIN: u32 = 0;
pub const UNARY: u32 = 1;
pub const PAREN: u32 = 2;
pub const BLOCK: u32 = 3;
pub const RET: u32 = 4;
pub const BRK: u32 = 5;

fn need_tree(params: &[Param], i: usize, action: u32) -> Result<TreeHandle, ParseError> {
    params
        .get(i)
        .and_then(|p| p.tree())
        .ok_or(ParseError::Action {
            action,
            reason: format!("parameter {} is not a tree", i + 1),
        })
}

fn bin(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let lhs = need_tree(params, 0, BIN)?;
    let op = params
        .get(1)
        .and_then(|p| p.token())
        .and_then(|t| t.sys_id())
        .ok_or(ParseError::Action {
            action: BIN,
            reason: "parameter 2 is not an operator".to_string(),
        })?;
    let rhs = need_tree(params, 2, BIN)?;
    Ok(Some(cx.tree.alloc(AstNode::BinaryOp { op, lhs, rhs })))
}

fn unary(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let op = params
        .get(0)
        .and_then(|p| p.token())
        .and_then(|t| t.sys_id())
        .ok_or(ParseError::Action {
            action: UNARY,
            reason: "parameter 1 is not an operator".to_string(),
        })?;
    let operand = need_tree(params, 1, UNARY)?;
    Ok(Some(cx.tree.alloc(AstNode::UnaryOp { op, operand })))
}

fn paren(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let expr = need_tree(params, 0, PAREN)?;
    Ok(Some(cx.tree.alloc(AstNode::Parenthesis { expr })))
}

fn block(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let mut stmts = Vec::new();
    if let Some(handle) = params.get(0).and_then(|p| p.tree()) {
        cx.tree.push_flat(&mut stmts, handle);
    }
    Ok(Some(cx.tree.alloc(AstNode::Block { stmts })))
}

fn ret(cx: &mut AstCtx, _params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    Ok(Some(cx.tree.alloc(AstNode::Return { value: None })))
}

fn brk(cx: &mut AstCtx, _params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    Ok(Some(cx.tree.alloc(AstNode::Break)))
}

pub const ACTIONS: &[ActionFn] = &[bin, unary, paren, block, ret, brk];

pub struct Fixture {
    pub grammar: Grammar,
    pub recursions: Vec<LeftRecursion>,
}

impl Fixture {
    pub fn index(&self) -> RecursionIndex {
        RecursionIndex::build(&self.grammar, &self.recursions)
    }
}

/// Parses `src` and returns the dump of every tree.
pub fn parse(fix: &Fixture, src: &str) -> Result<Vec<String>, ParseError> {
    let index = fix.index();
    let mut parser = Parser::new(
        &fix.grammar,
        &index,
        ActionTable::new(ACTIONS),
        Box::new(SourceLexer::from_str(src)),
        "<test>",
    );
    parser.parse()?;
    let pool = &parser.ctx.buffer.pool;
    Ok(parser
        .module()
        .trees()
        .iter()
        .map(|tree| tree.dump(tree.root.unwrap(), &fix.grammar, pool))
        .collect())
}

/// `Stmt : Add ';'` over `Add : Id | Add '+' Id` — direct left recursion.
pub fn add_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let plus = b.operator("+");
    let semi = b.separator(";");
    let add = b.declare("Add");
    let add_sub = b.rule(
        "Add_sub",
        RuleKind::Concatenate,
        vec![Element::Rule(add), Element::Token(plus), Element::Rule(b.ident())],
    );
    b.action(add_sub, BIN, &[1, 2, 3]);
    b.define(
        add,
        RuleKind::OneOf,
        vec![Element::Rule(b.ident()), Element::Rule(add_sub)],
    );
    let stmt = b.rule(
        "Stmt",
        RuleKind::Concatenate,
        vec![Element::Rule(add), Element::Token(semi)],
    );
    b.set_top(stmt);
    Fixture {
        grammar: b.finish(),
        recursions: vec![LeftRecursion {
            lead: add,
            circles: vec![vec![1, 0]],
            leads: Vec::new(),
        }],
    }
}

/// `Primary : Literal | FieldAccess`, `FieldAccess : Primary '.' Id` —
/// indirect left recursion through a second rule.
pub fn field_access_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let dot = b.operator(".");
    let semi = b.separator(";");
    let primary = b.declare("Primary");
    let field = b.rule(
        "FieldAccess",
        RuleKind::Concatenate,
        vec![Element::Rule(primary), Element::Token(dot), Element::Rule(b.ident())],
    );
    b.action(field, BIN, &[1, 2, 3]);
    b.define(
        primary,
        RuleKind::OneOf,
        vec![Element::Rule(b.literal()), Element::Rule(field)],
    );
    let stmt = b.rule(
        "Stmt",
        RuleKind::Concatenate,
        vec![Element::Rule(primary), Element::Token(semi)],
    );
    b.set_top(stmt);
    Fixture {
        grammar: b.finish(),
        recursions: vec![LeftRecursion {
            lead: primary,
            circles: vec![vec![1, 0]],
            leads: Vec::new(),
        }],
    }
}

/// The same grammar as [`field_access_fixture`], but with the detector
/// reporting both `Primary` (master) and `FieldAccess` as leads of the one
/// group. Visits of the non-master lead resolve against the master's
/// instances instead of spawning a second traversal.
pub fn multi_lead_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let dot = b.operator(".");
    let semi = b.separator(";");
    let primary = b.declare("Primary");
    let field = b.rule(
        "FieldAccess",
        RuleKind::Concatenate,
        vec![Element::Rule(primary), Element::Token(dot), Element::Rule(b.ident())],
    );
    b.action(field, BIN, &[1, 2, 3]);
    b.define(
        primary,
        RuleKind::OneOf,
        vec![Element::Rule(b.literal()), Element::Rule(field)],
    );
    let stmt = b.rule(
        "Stmt",
        RuleKind::Concatenate,
        vec![Element::Rule(primary), Element::Token(semi)],
    );
    b.set_top(stmt);
    Fixture {
        grammar: b.finish(),
        recursions: vec![LeftRecursion {
            lead: primary,
            circles: vec![vec![1, 0]],
            leads: vec![field],
        }],
    }
}

/// A Single OneOf whose alternatives both match the same input; the first
/// must win.
pub fn single_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let semi = b.separator(";");
    let first = b.rule(
        "First",
        RuleKind::Concatenate,
        vec![Element::Rule(b.ident()), Element::Token(semi)],
    );
    b.action(first, RET, &[]);
    let second = b.rule(
        "Second",
        RuleKind::Concatenate,
        vec![Element::Rule(b.ident()), Element::Token(semi)],
    );
    b.action(second, BRK, &[]);
    let stmt = b.rule(
        "Stmt",
        RuleKind::OneOf,
        vec![Element::Rule(first), Element::Rule(second)],
    );
    b.set_single(stmt);
    b.set_top(stmt);
    Fixture {
        grammar: b.finish(),
        recursions: Vec::new(),
    }
}

/// `SwitchBlock : '{' ZEROORMORE(Group) '}'` with
/// `Group : ZEROORMORE(Stmt) ZEROORMORE(Label)`.
pub fn switch_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let lcurly = b.separator("{");
    let rcurly = b.separator("}");
    let semi = b.separator(";");
    let colon = b.separator(":");

    let stmt = b.rule(
        "Stmt",
        RuleKind::Concatenate,
        vec![Element::Rule(b.ident()), Element::Token(semi)],
    );
    let label = b.rule(
        "Label",
        RuleKind::Concatenate,
        vec![Element::Rule(b.ident()), Element::Token(colon)],
    );
    let stmts = b.rule("Stmts", RuleKind::ZeroOrMore, vec![Element::Rule(stmt)]);
    let labels = b.rule("Labels", RuleKind::ZeroOrMore, vec![Element::Rule(label)]);
    let group = b.rule(
        "Group",
        RuleKind::Concatenate,
        vec![Element::Rule(stmts), Element::Rule(labels)],
    );
    let groups = b.rule("Groups", RuleKind::ZeroOrMore, vec![Element::Rule(group)]);
    let switch_block = b.rule(
        "SwitchBlock",
        RuleKind::Concatenate,
        vec![Element::Token(lcurly), Element::Rule(groups), Element::Token(rcurly)],
    );
    b.action(switch_block, BLOCK, &[2]);
    b.set_top(switch_block);
    Fixture {
        grammar: b.finish(),
        recursions: Vec::new(),
    }
}

/// A top rule that matches the same input with two different ends.
pub fn ambiguous_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let opt = b.rule("Opt", RuleKind::ZeroOrOne, vec![Element::Rule(b.ident())]);
    let top = b.rule(
        "Top",
        RuleKind::Concatenate,
        vec![Element::Rule(b.ident()), Element::Rule(opt)],
    );
    b.set_top(top);
    Fixture {
        grammar: b.finish(),
        recursions: Vec::new(),
    }
}

/// `Expr : Primary Tail` with no action on `Expr`: the two-child fix-ups
/// decide between a cast and a binary operation.
pub fn fixup_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let plus = b.operator("+");
    b.operator_flags(plus, true, true);
    let lparen = b.separator("(");
    let rparen = b.separator(")");
    let semi = b.separator(";");

    let paren_expr = b.rule(
        "ParenExpr",
        RuleKind::Concatenate,
        vec![Element::Token(lparen), Element::Rule(b.ident()), Element::Token(rparen)],
    );
    b.action(paren_expr, PAREN, &[2]);
    let primary = b.rule(
        "Primary",
        RuleKind::OneOf,
        vec![Element::Rule(paren_expr), Element::Rule(b.ident())],
    );
    let plus_expr = b.rule(
        "PlusExpr",
        RuleKind::Concatenate,
        vec![Element::Token(plus), Element::Rule(b.ident())],
    );
    b.action(plus_expr, UNARY, &[1, 2]);
    let tail = b.rule(
        "Tail",
        RuleKind::OneOf,
        vec![Element::Rule(plus_expr), Element::Rule(b.ident())],
    );
    let expr = b.rule(
        "Expr",
        RuleKind::Concatenate,
        vec![Element::Rule(primary), Element::Rule(tail)],
    );
    let stmt = b.rule(
        "Stmt",
        RuleKind::Concatenate,
        vec![Element::Rule(expr), Element::Token(semi)],
    );
    b.set_top(stmt);
    Fixture {
        grammar: b.finish(),
        recursions: Vec::new(),
    }
}

/// Forces a cache hit to land in the sorted tree: the first alternative
/// matches `X` then dies, the second revisits `X` from the cache.
pub fn cached_subtree_fixture() -> Fixture {
    let mut b = GrammarBuilder::new();
    let bang = b.operator("!");
    let semi = b.separator(";");
    let x = b.rule(
        "Pair",
        RuleKind::Concatenate,
        vec![Element::Rule(b.ident()), Element::Rule(b.ident())],
    );
    let a = b.rule(
        "WithBang",
        RuleKind::Concatenate,
        vec![Element::Rule(x), Element::Token(bang)],
    );
    let c = b.rule(
        "WithSemi",
        RuleKind::Concatenate,
        vec![Element::Rule(x), Element::Token(semi)],
    );
    let top = b.rule("Top", RuleKind::OneOf, vec![Element::Rule(a), Element::Rule(c)]);
    b.set_top(top);
    Fixture {
        grammar: b.finish(),
        recursions: Vec::new(),
    }
}
