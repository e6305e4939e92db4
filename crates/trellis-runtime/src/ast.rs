//! The AST produced by rule actions: a closed set of node kinds allocated
//! in an arena owned by one tree, plus the dense action-dispatch table the
//! embedding front-end supplies.

use cranelift_entity::{entity_impl, EntityRef, PrimaryMap};

use trellis::error::ParseError;
use trellis::grammar::{ActionId, Grammar};
use trellis::strings::{StrId, StringPool};
use trellis::token::{Lit, SysTokId, Token};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TreeHandle(u32);

entity_impl! { TreeHandle }

#[derive(Clone, PartialEq, Debug)]
pub enum AstNode {
    Identifier { name: StrId },
    Literal { value: Lit },
    UnaryOp { op: SysTokId, operand: TreeHandle },
    BinaryOp { op: SysTokId, lhs: TreeHandle, rhs: TreeHandle },
    Cast { target: TreeHandle, operand: TreeHandle },
    Parenthesis { expr: TreeHandle },
    Block { stmts: Vec<TreeHandle> },
    Class { name: TreeHandle, body: Vec<TreeHandle> },
    Function { name: TreeHandle, params: Vec<TreeHandle>, body: Option<TreeHandle> },
    Decl { name: TreeHandle, init: Option<TreeHandle> },
    VarList { vars: Vec<TreeHandle> },
    For { init: Vec<TreeHandle>, cond: Option<TreeHandle>, update: Vec<TreeHandle>, body: TreeHandle },
    While { cond: TreeHandle, body: TreeHandle },
    Switch { expr: TreeHandle, cases: Vec<TreeHandle> },
    SwitchCase { labels: Vec<TreeHandle>, stmts: Vec<TreeHandle> },
    Call { callee: TreeHandle, args: Vec<TreeHandle> },
    New { target: TreeHandle, args: Vec<TreeHandle> },
    Return { value: Option<TreeHandle> },
    Break,
    CondBranch { cond: TreeHandle, then_branch: TreeHandle, else_branch: Option<TreeHandle> },
    /// Generic container conveying several children upward when a rule has
    /// no action; flattened when absorbed by a parent constructor.
    Pass { children: Vec<TreeHandle> },
}

/// One AST, arena-owned. Trees outlive the per-construct parse state and
/// are collected into the module.
#[derive(Default)]
pub struct AstTree {
    nodes: PrimaryMap<TreeHandle, AstNode>,
    pub root: Option<TreeHandle>,
}

impl AstTree {
    pub fn new() -> AstTree {
        AstTree::default()
    }

    pub fn alloc(&mut self, node: AstNode) -> TreeHandle {
        self.nodes.push(node)
    }

    pub fn get(&self, handle: TreeHandle) -> &AstNode {
        &self.nodes[handle]
    }

    pub fn get_mut(&mut self, handle: TreeHandle) -> &mut AstNode {
        &mut self.nodes[handle]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Appends `child` to `list`, splicing Pass containers flat.
    pub fn push_flat(&mut self, list: &mut Vec<TreeHandle>, child: TreeHandle) {
        if let AstNode::Pass { children } = &self.nodes[child] {
            for c in children.clone() {
                self.push_flat(list, c);
            }
        } else {
            list.push(child);
        }
    }

    /// Compact s-expression rendering, used by the CLI dump and by tests
    /// comparing parses structurally.
    pub fn dump(&self, handle: TreeHandle, grammar: &Grammar, pool: &StringPool) -> String {
        let dump_list = |items: &[TreeHandle]| -> String {
            items
                .iter()
                .map(|&c| self.dump(c, grammar, pool))
                .collect::<Vec<_>>()
                .join(" ")
        };
        match self.get(handle) {
            AstNode::Identifier { name } => pool.get(*name).to_string(),
            AstNode::Literal { value } => match value {
                Lit::Int(v) => v.to_string(),
                Lit::Float(v) => v.to_string(),
                Lit::Bool(v) => v.to_string(),
                Lit::Char(c) => format!("'{c}'"),
                Lit::Str(s) => format!("\"{}\"", pool.get(*s)),
                Lit::Null => "null".to_string(),
                Lit::This => "this".to_string(),
            },
            AstNode::UnaryOp { op, operand } => format!(
                "({}{})",
                grammar.system_token(*op).spelling,
                self.dump(*operand, grammar, pool)
            ),
            AstNode::BinaryOp { op, lhs, rhs } => format!(
                "({} {} {})",
                self.dump(*lhs, grammar, pool),
                grammar.system_token(*op).spelling,
                self.dump(*rhs, grammar, pool)
            ),
            AstNode::Cast { target, operand } => format!(
                "(cast {} {})",
                self.dump(*target, grammar, pool),
                self.dump(*operand, grammar, pool)
            ),
            AstNode::Parenthesis { expr } => {
                format!("(paren {})", self.dump(*expr, grammar, pool))
            }
            AstNode::Block { stmts } => format!("(block {})", dump_list(stmts)),
            AstNode::Class { name, body } => format!(
                "(class {} {})",
                self.dump(*name, grammar, pool),
                dump_list(body)
            ),
            AstNode::Function { name, params, body } => format!(
                "(fn {} ({}) {})",
                self.dump(*name, grammar, pool),
                dump_list(params),
                (*body)
                    .map(|b| self.dump(b, grammar, pool))
                    .unwrap_or_default()
            ),
            AstNode::Decl { name, init } => match init {
                Some(init) => format!(
                    "(decl {} {})",
                    self.dump(*name, grammar, pool),
                    self.dump(*init, grammar, pool)
                ),
                None => format!("(decl {})", self.dump(*name, grammar, pool)),
            },
            AstNode::VarList { vars } => format!("(vars {})", dump_list(vars)),
            AstNode::For { init, cond, update, body } => format!(
                "(for ({}) ({}) ({}) {})",
                dump_list(init),
                (*cond)
                    .map(|c| self.dump(c, grammar, pool))
                    .unwrap_or_default(),
                dump_list(update),
                self.dump(*body, grammar, pool)
            ),
            AstNode::While { cond, body } => format!(
                "(while {} {})",
                self.dump(*cond, grammar, pool),
                self.dump(*body, grammar, pool)
            ),
            AstNode::Switch { expr, cases } => format!(
                "(switch {} {})",
                self.dump(*expr, grammar, pool),
                dump_list(cases)
            ),
            AstNode::SwitchCase { labels, stmts } => {
                format!("(case ({}) {})", dump_list(labels), dump_list(stmts))
            }
            AstNode::Call { callee, args } => format!(
                "(call {} {})",
                self.dump(*callee, grammar, pool),
                dump_list(args)
            ),
            AstNode::New { target, args } => format!(
                "(new {} {})",
                self.dump(*target, grammar, pool),
                dump_list(args)
            ),
            AstNode::Return { value } => match value {
                Some(v) => format!("(return {})", self.dump(*v, grammar, pool)),
                None => "(return)".to_string(),
            },
            AstNode::Break => "(break)".to_string(),
            AstNode::CondBranch { cond, then_branch, else_branch } => format!(
                "(if {} {}{})",
                self.dump(*cond, grammar, pool),
                self.dump(*then_branch, grammar, pool),
                (*else_branch)
                    .map(|e| format!(" {}", self.dump(e, grammar, pool)))
                    .unwrap_or_default()
            ),
            AstNode::Pass { children } => format!("(pass {})", dump_list(children)),
        }
    }
}

/// One action parameter, gathered from the sorted child in the grammar
/// slot the action names.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Param {
    /// The slot has no corresponding sorted child.
    Empty,
    /// The child is a bare token.
    Token(Token),
    /// The child built an AST node.
    Tree(TreeHandle),
}

impl Param {
    pub fn tree(&self) -> Option<TreeHandle> {
        match self {
            Param::Tree(handle) => Some(*handle),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<Token> {
        match self {
            Param::Token(token) => Some(*token),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Param::Empty)
    }
}

/// Everything an action may touch while building its node.
pub struct AstCtx<'a> {
    pub tree: &'a mut AstTree,
    pub pool: &'a mut StringPool,
    pub grammar: &'a Grammar,
}

/// A builder invoked by dense id. Returns the node it produced, or `None`
/// when it only mutated an existing one.
pub type ActionFn = fn(&mut AstCtx, &[Param]) -> Result<Option<TreeHandle>, ParseError>;

/// The dispatch table the front-end provides; index = action id.
pub struct ActionTable<'a> {
    funcs: &'a [ActionFn],
}

impl<'a> ActionTable<'a> {
    pub fn new(funcs: &'a [ActionFn]) -> ActionTable<'a> {
        ActionTable { funcs }
    }

    /// An empty table for grammars without actions.
    pub fn empty() -> ActionTable<'static> {
        ActionTable { funcs: &[] }
    }

    pub fn invoke(
        &self,
        id: ActionId,
        cx: &mut AstCtx,
        params: &[Param],
    ) -> Result<Option<TreeHandle>, ParseError> {
        match self.funcs.get(id.index()) {
            Some(func) => func(cx, params),
            None => Err(ParseError::Action {
                action: id.index() as u32,
                reason: "no builder registered for this action id".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_nodes_flatten() {
        let mut tree = AstTree::new();
        let a = tree.alloc(AstNode::Break);
        let b = tree.alloc(AstNode::Break);
        let inner = tree.alloc(AstNode::Pass { children: vec![b] });
        let outer = tree.alloc(AstNode::Pass { children: vec![a, inner] });
        let mut list = Vec::new();
        tree.push_flat(&mut list, outer);
        assert_eq!(list, vec![a, b]);
    }
}
