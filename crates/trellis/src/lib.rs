//! Grammar-side model for the trellis parsing engine.
//!
//! This crate holds everything the runtime consumes but never mutates: the
//! interned string pool, the token model, the rule tables with their
//! lookahead sets and actions, and the left-recursion descriptors derived
//! from the offline detector's cycle data. The runtime lives in
//! `trellis-runtime`.

pub mod error;
pub mod grammar;
pub mod recursion;
pub mod strings;
pub mod token;

pub use error::ParseError;
pub use grammar::{
    ActionId, Element, Grammar, GrammarBuilder, LookAhead, Rule, RuleAction, RuleHandle, RuleKind,
    RuleProps, SysTokKind, SystemToken,
};
pub use recursion::{FronNode, GroupId, LeftRecursion, Recursion, RecursionIndex};
pub use strings::{StrId, StringPool};
pub use token::{Lit, Pos, SysTokId, Token};
