//! The parser entry point: drives the full pipeline per top-level
//! construct and collects the resulting trees into a module.

use std::path::Path;

use trellis::error::ParseError;
use trellis::grammar::Grammar;
use trellis::recursion::RecursionIndex;

use crate::ast::{ActionTable, AstTree};
use crate::lexer::{Lexer, SourceLexer};
use crate::matcher::ParseCtx;
use crate::module::Module;

pub struct Parser<'g> {
    pub ctx: ParseCtx<'g>,
    actions: ActionTable<'g>,
    module: Module,
}

impl<'g> Parser<'g> {
    pub fn new(
        grammar: &'g Grammar,
        recursion: &'g RecursionIndex,
        actions: ActionTable<'g>,
        lexer: Box<dyn Lexer>,
        path: &str,
    ) -> Parser<'g> {
        Parser {
            ctx: ParseCtx::new(grammar, recursion, lexer),
            actions,
            module: Module::new(path),
        }
    }

    pub fn from_path(
        grammar: &'g Grammar,
        recursion: &'g RecursionIndex,
        actions: ActionTable<'g>,
        path: &Path,
    ) -> Result<Parser<'g>, ParseError> {
        let lexer = SourceLexer::from_path(path)?;
        Ok(Parser::new(
            grammar,
            recursion,
            actions,
            Box::new(lexer),
            &path.display().to_string(),
        ))
    }

    /// Parses every top-level construct until end of file. Empty input is
    /// a successful parse with zero trees.
    pub fn parse(&mut self) -> Result<(), ParseError> {
        loop {
            self.ctx.reset();
            if self.ctx.buffer.lex_line(self.ctx.grammar) == 0 {
                log::debug!(
                    "{}: end of file, {} trees",
                    self.module.path(),
                    self.module.trees().len()
                );
                return Ok(());
            }
            if !self.ctx.match_top()? {
                return Err(self.syntax_error());
            }
            let top = self.ctx.sort_out()?;
            self.ctx.patch_was_succ(top)?;
            self.ctx.simplify();
            let mut tree = AstTree::new();
            let root = self.ctx.build_ast(&self.actions, &mut tree)?;
            tree.root = Some(root);
            self.module.add_tree(tree);
        }
    }

    /// The farthest point any leaf attempt reached, as a diagnostic. No
    /// recovery is attempted.
    fn syntax_error(&self) -> ParseError {
        let buffer = &self.ctx.buffer;
        if buffer.is_empty() {
            return ParseError::Syntax {
                pos: Default::default(),
                token: "<empty>".to_string(),
            };
        }
        let i = self.ctx.farthest.min(buffer.len() - 1);
        let token = match buffer.active(i).sys_id() {
            Some(sys) => self.ctx.grammar.system_token(sys).spelling.clone(),
            None => buffer.active(i).to_str(&buffer.pool),
        };
        ParseError::Syntax {
            pos: buffer.pos(i),
            token,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    /// Traversal steps spent so far, across constructs.
    pub fn steps(&self) -> u64 {
        self.ctx.steps
    }
}
