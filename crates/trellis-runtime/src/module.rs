//! The per-file result: one AST per top-level construct, plus a root scope
//! outside collaborators fill in.

use std::collections::HashMap;

use trellis::strings::StrId;

use crate::ast::{AstTree, TreeHandle};

/// Points at a node inside one of the module's trees.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TreeLoc {
    pub tree: usize,
    pub node: TreeHandle,
}

/// The module-level scope. The parser itself never writes here; semantic
/// passes running after the parse register declarations and types for each
/// other to resolve.
#[derive(Default)]
pub struct Scope {
    decls: HashMap<StrId, TreeLoc>,
    types: HashMap<StrId, TreeLoc>,
}

impl Scope {
    pub fn declare(&mut self, name: StrId, loc: TreeLoc) {
        self.decls.insert(name, loc);
    }

    pub fn lookup_decl(&self, name: StrId) -> Option<TreeLoc> {
        self.decls.get(&name).copied()
    }

    pub fn define_type(&mut self, name: StrId, loc: TreeLoc) {
        self.types.insert(name, loc);
    }

    pub fn lookup_type(&self, name: StrId) -> Option<TreeLoc> {
        self.types.get(&name).copied()
    }
}

pub struct Module {
    path: String,
    trees: Vec<AstTree>,
    scope: Scope,
}

impl Module {
    pub fn new(path: &str) -> Module {
        Module {
            path: path.to_string(),
            trees: Vec::new(),
            scope: Scope::default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn add_tree(&mut self, tree: AstTree) {
        self.trees.push(tree);
    }

    pub fn trees(&self) -> &[AstTree] {
        &self.trees
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}
