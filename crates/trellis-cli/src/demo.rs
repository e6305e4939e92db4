//! The built-in demo language: statements over expressions with
//! left-recursive additive and multiplicative chains. Stands in for tables
//! an offline generator would normally emit.

use trellis::error::ParseError;
use trellis::grammar::{Element, Grammar, GrammarBuilder, LookAhead, RuleKind};
use trellis::recursion::{LeftRecursion, RecursionIndex};
use trellis_runtime::ast::{ActionFn, AstCtx, AstNode, Param, TreeHandle};

pub const BUILD_BINARY: u32 = 0;
pub const BUILD_UNARY: u32 = 1;
pub const BUILD_ASSIGN: u32 = 2;
pub const BUILD_PAREN: u32 = 3;
pub const BUILD_CALL: u32 = 4;
pub const BUILD_NEW: u32 = 5;
pub const BUILD_BLOCK: u32 = 6;
pub const BUILD_COND: u32 = 7;
pub const BUILD_WHILE: u32 = 8;
pub const BUILD_RETURN: u32 = 9;
pub const BUILD_BREAK: u32 = 10;
pub const BUILD_LIST: u32 = 11;

pub fn grammar() -> (Grammar, Vec<LeftRecursion>) {
    let mut b = GrammarBuilder::new();
    let ident = b.ident();
    let literal = b.literal();

    let kw_if = b.keyword("if");
    let kw_else = b.keyword("else");
    let kw_while = b.keyword("while");
    let kw_return = b.keyword("return");
    let kw_break = b.keyword("break");
    let kw_new = b.keyword("new");

    let plus = b.operator("+");
    let minus = b.operator("-");
    let star = b.operator("*");
    let slash = b.operator("/");
    let assign = b.operator("=");
    b.operator("==");
    b.operator_flags(plus, false, true);
    b.operator_flags(minus, true, true);
    b.operator_flags(star, false, true);
    b.operator_flags(slash, false, true);

    let lparen = b.separator("(");
    let rparen = b.separator(")");
    let lcurly = b.separator("{");
    let rcurly = b.separator("}");
    let comma = b.separator(",");
    let semi = b.separator(";");

    let expr = b.declare("Expr");
    let add = b.declare("AddExpr");
    let mul = b.declare("MulExpr");
    let unary = b.declare("UnaryExpr");
    let primary = b.declare("Primary");
    let stmt = b.declare("Stmt");

    // Expressions. The additive and multiplicative chains are written
    // left-recursively and resolved by the recursion engine.
    let add_plus = b.rule(
        "AddExpr_plus",
        RuleKind::Concatenate,
        vec![Element::Rule(add), Element::Token(plus), Element::Rule(mul)],
    );
    b.action(add_plus, BUILD_BINARY, &[1, 2, 3]);
    let add_minus = b.rule(
        "AddExpr_minus",
        RuleKind::Concatenate,
        vec![Element::Rule(add), Element::Token(minus), Element::Rule(mul)],
    );
    b.action(add_minus, BUILD_BINARY, &[1, 2, 3]);
    b.define(
        add,
        RuleKind::OneOf,
        vec![Element::Rule(mul), Element::Rule(add_plus), Element::Rule(add_minus)],
    );

    let mul_times = b.rule(
        "MulExpr_times",
        RuleKind::Concatenate,
        vec![Element::Rule(mul), Element::Token(star), Element::Rule(unary)],
    );
    b.action(mul_times, BUILD_BINARY, &[1, 2, 3]);
    let mul_div = b.rule(
        "MulExpr_div",
        RuleKind::Concatenate,
        vec![Element::Rule(mul), Element::Token(slash), Element::Rule(unary)],
    );
    b.action(mul_div, BUILD_BINARY, &[1, 2, 3]);
    b.define(
        mul,
        RuleKind::OneOf,
        vec![Element::Rule(unary), Element::Rule(mul_times), Element::Rule(mul_div)],
    );

    let neg = b.rule(
        "NegExpr",
        RuleKind::Concatenate,
        vec![Element::Token(minus), Element::Rule(unary)],
    );
    b.action(neg, BUILD_UNARY, &[1, 2]);
    b.define(
        unary,
        RuleKind::OneOf,
        vec![Element::Rule(primary), Element::Rule(neg)],
    );

    let arg_tail = b.rule(
        "ArgTail",
        RuleKind::Concatenate,
        vec![Element::Token(comma), Element::Rule(expr)],
    );
    let arg_more = b.rule("ArgMore", RuleKind::ZeroOrMore, vec![Element::Rule(arg_tail)]);
    let arg_list = b.rule(
        "ArgList",
        RuleKind::Concatenate,
        vec![Element::Rule(expr), Element::Rule(arg_more)],
    );
    b.action(arg_list, BUILD_LIST, &[1, 2]);
    let args_opt = b.rule("ArgsOpt", RuleKind::ZeroOrOne, vec![Element::Rule(arg_list)]);

    let call = b.rule(
        "CallExpr",
        RuleKind::Concatenate,
        vec![
            Element::Rule(ident),
            Element::Token(lparen),
            Element::Rule(args_opt),
            Element::Token(rparen),
        ],
    );
    b.action(call, BUILD_CALL, &[1, 3]);
    b.lookahead(call, LookAhead::AnyIdent);

    let paren = b.rule(
        "ParenExpr",
        RuleKind::Concatenate,
        vec![Element::Token(lparen), Element::Rule(expr), Element::Token(rparen)],
    );
    b.action(paren, BUILD_PAREN, &[2]);
    b.lookahead(paren, LookAhead::Token(lparen));

    let new_expr = b.rule(
        "NewExpr",
        RuleKind::Concatenate,
        vec![
            Element::Token(kw_new),
            Element::Rule(ident),
            Element::Token(lparen),
            Element::Rule(args_opt),
            Element::Token(rparen),
        ],
    );
    b.action(new_expr, BUILD_NEW, &[2, 4]);
    b.lookahead(new_expr, LookAhead::Token(kw_new));

    b.define(
        primary,
        RuleKind::OneOf,
        vec![
            Element::Rule(call),
            Element::Rule(ident),
            Element::Rule(literal),
            Element::Rule(paren),
            Element::Rule(new_expr),
        ],
    );
    b.define(expr, RuleKind::Data, vec![Element::Rule(add)]);

    // Statements.
    let assign_stmt = b.rule(
        "AssignStmt",
        RuleKind::Concatenate,
        vec![
            Element::Rule(ident),
            Element::Token(assign),
            Element::Rule(expr),
            Element::Token(semi),
        ],
    );
    b.action(assign_stmt, BUILD_ASSIGN, &[1, 2, 3]);

    let expr_stmt = b.rule(
        "ExprStmt",
        RuleKind::Concatenate,
        vec![Element::Rule(expr), Element::Token(semi)],
    );

    // An optional else-tail would leave the statement with two valid end
    // positions; a Single OneOf trying the else form first keeps the end
    // unique and binds each else to the nearest if.
    let if_else = b.rule(
        "IfElseStmt",
        RuleKind::Concatenate,
        vec![
            Element::Token(kw_if),
            Element::Token(lparen),
            Element::Rule(expr),
            Element::Token(rparen),
            Element::Rule(stmt),
            Element::Token(kw_else),
            Element::Rule(stmt),
        ],
    );
    b.action(if_else, BUILD_COND, &[3, 5, 7]);
    let if_only = b.rule(
        "IfOnlyStmt",
        RuleKind::Concatenate,
        vec![
            Element::Token(kw_if),
            Element::Token(lparen),
            Element::Rule(expr),
            Element::Token(rparen),
            Element::Rule(stmt),
        ],
    );
    b.action(if_only, BUILD_COND, &[3, 5]);
    let if_stmt = b.rule(
        "IfStmt",
        RuleKind::OneOf,
        vec![Element::Rule(if_else), Element::Rule(if_only)],
    );
    b.set_single(if_stmt);
    b.lookahead(if_stmt, LookAhead::Token(kw_if));

    let while_stmt = b.rule(
        "WhileStmt",
        RuleKind::Concatenate,
        vec![
            Element::Token(kw_while),
            Element::Token(lparen),
            Element::Rule(expr),
            Element::Token(rparen),
            Element::Rule(stmt),
        ],
    );
    b.action(while_stmt, BUILD_WHILE, &[3, 5]);
    b.lookahead(while_stmt, LookAhead::Token(kw_while));

    let expr_opt = b.rule("ExprOpt", RuleKind::ZeroOrOne, vec![Element::Rule(expr)]);
    let return_stmt = b.rule(
        "ReturnStmt",
        RuleKind::Concatenate,
        vec![Element::Token(kw_return), Element::Rule(expr_opt), Element::Token(semi)],
    );
    b.action(return_stmt, BUILD_RETURN, &[2]);
    b.lookahead(return_stmt, LookAhead::Token(kw_return));

    let break_stmt = b.rule(
        "BreakStmt",
        RuleKind::Concatenate,
        vec![Element::Token(kw_break), Element::Token(semi)],
    );
    b.action(break_stmt, BUILD_BREAK, &[]);
    b.lookahead(break_stmt, LookAhead::Token(kw_break));

    let stmt_more = b.rule("StmtMore", RuleKind::ZeroOrMore, vec![Element::Rule(stmt)]);
    let block = b.rule(
        "Block",
        RuleKind::Concatenate,
        vec![Element::Token(lcurly), Element::Rule(stmt_more), Element::Token(rcurly)],
    );
    b.action(block, BUILD_BLOCK, &[2]);
    b.lookahead(block, LookAhead::Token(lcurly));

    b.define(
        stmt,
        RuleKind::OneOf,
        vec![
            Element::Rule(assign_stmt),
            Element::Rule(if_stmt),
            Element::Rule(while_stmt),
            Element::Rule(return_stmt),
            Element::Rule(break_stmt),
            Element::Rule(block),
            Element::Rule(expr_stmt),
        ],
    );
    b.set_single(stmt);
    b.set_top(stmt);

    let recursions = vec![
        LeftRecursion {
            lead: add,
            circles: vec![vec![1, 0], vec![2, 0]],
            leads: Vec::new(),
        },
        LeftRecursion {
            lead: mul,
            circles: vec![vec![1, 0], vec![2, 0]],
            leads: Vec::new(),
        },
    ];

    (b.finish(), recursions)
}

pub fn recursion_index(grammar: &Grammar, raw: &[LeftRecursion]) -> RecursionIndex {
    RecursionIndex::build(grammar, raw)
}

fn need_tree(params: &[Param], i: usize, action: u32) -> Result<TreeHandle, ParseError> {
    params
        .get(i)
        .and_then(|p| p.tree())
        .ok_or(ParseError::Action {
            action,
            reason: format!("parameter {} is not a tree", i + 1),
        })
}

fn build_binary(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let lhs = need_tree(params, 0, BUILD_BINARY)?;
    let op = params
        .get(1)
        .and_then(|p| p.token())
        .and_then(|t| t.sys_id())
        .ok_or(ParseError::Action {
            action: BUILD_BINARY,
            reason: "parameter 2 is not an operator token".to_string(),
        })?;
    let rhs = need_tree(params, 2, BUILD_BINARY)?;
    Ok(Some(cx.tree.alloc(AstNode::BinaryOp { op, lhs, rhs })))
}

fn build_unary(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let op = params
        .get(0)
        .and_then(|p| p.token())
        .and_then(|t| t.sys_id())
        .ok_or(ParseError::Action {
            action: BUILD_UNARY,
            reason: "parameter 1 is not an operator token".to_string(),
        })?;
    let operand = need_tree(params, 1, BUILD_UNARY)?;
    Ok(Some(cx.tree.alloc(AstNode::UnaryOp { op, operand })))
}

fn build_assign(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    build_binary(cx, params).map_err(|_| ParseError::Action {
        action: BUILD_ASSIGN,
        reason: "expected name, '=', value".to_string(),
    })
}

fn build_paren(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let expr = need_tree(params, 0, BUILD_PAREN)?;
    Ok(Some(cx.tree.alloc(AstNode::Parenthesis { expr })))
}

fn gather_args(cx: &mut AstCtx, param: Option<&Param>) -> Vec<TreeHandle> {
    let mut args = Vec::new();
    if let Some(handle) = param.and_then(|p| p.tree()) {
        cx.tree.push_flat(&mut args, handle);
    }
    args
}

fn build_call(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let callee = need_tree(params, 0, BUILD_CALL)?;
    let args = gather_args(cx, params.get(1));
    Ok(Some(cx.tree.alloc(AstNode::Call { callee, args })))
}

fn build_new(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let target = need_tree(params, 0, BUILD_NEW)?;
    let args = gather_args(cx, params.get(1));
    Ok(Some(cx.tree.alloc(AstNode::New { target, args })))
}

fn build_block(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let stmts = gather_args(cx, params.get(0));
    Ok(Some(cx.tree.alloc(AstNode::Block { stmts })))
}

fn build_cond(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let cond = need_tree(params, 0, BUILD_COND)?;
    let then_branch = need_tree(params, 1, BUILD_COND)?;
    let else_branch = params.get(2).and_then(|p| p.tree());
    Ok(Some(cx.tree.alloc(AstNode::CondBranch {
        cond,
        then_branch,
        else_branch,
    })))
}

fn build_while(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let cond = need_tree(params, 0, BUILD_WHILE)?;
    let body = need_tree(params, 1, BUILD_WHILE)?;
    Ok(Some(cx.tree.alloc(AstNode::While { cond, body })))
}

fn build_return(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let value = params.get(0).and_then(|p| p.tree());
    Ok(Some(cx.tree.alloc(AstNode::Return { value })))
}

fn build_break(cx: &mut AstCtx, _params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    Ok(Some(cx.tree.alloc(AstNode::Break)))
}

/// Collects every parameter tree into one flat Pass container, so callers
/// like `build_call` see an argument list regardless of its length.
fn build_list(cx: &mut AstCtx, params: &[Param]) -> Result<Option<TreeHandle>, ParseError> {
    let mut children = Vec::new();
    for param in params {
        if let Some(handle) = param.tree() {
            cx.tree.push_flat(&mut children, handle);
        }
    }
    Ok(Some(cx.tree.alloc(AstNode::Pass { children })))
}

/// The dense dispatch table; index = action id.
pub const ACTIONS: &[ActionFn] = &[
    build_binary,
    build_unary,
    build_assign,
    build_paren,
    build_call,
    build_new,
    build_block,
    build_cond,
    build_while,
    build_return,
    build_break,
    build_list,
];

pub fn actions() -> &'static [ActionFn] {
    ACTIONS
}
