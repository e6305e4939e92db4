//! The trellis parser runtime.
//!
//! Drives the grammar tables from the `trellis` crate over a lazily lexed
//! token stream. Matching records every attempt in an appeal tree; the
//! sort-out pass reduces that tree to the single successful parse, the
//! simplifier shrinks it, and the AST builder runs the grammar's actions
//! over the result.

pub mod appeal;
pub mod ast;
pub mod buffer;
pub mod build;
pub mod cache;
pub mod leftrec;
pub mod lexer;
pub mod matcher;
pub mod module;
pub mod parser;
pub mod simplify;
pub mod sortout;

pub use appeal::{AppealArena, AppealNode, AppealStatus, NodeHandle, NodePayload};
pub use ast::{ActionFn, ActionTable, AstCtx, AstNode, AstTree, Param, TreeHandle};
pub use buffer::TokenBuffer;
pub use cache::{MatchCache, SuccEntry};
pub use lexer::{Lexer, SourceLexer};
pub use matcher::ParseCtx;
pub use module::{Module, Scope, TreeLoc};
pub use parser::Parser;
