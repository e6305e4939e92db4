use std::fmt::{Display, Formatter};

use crate::token::Pos;

/// Everything that can stop a parse.
///
/// Only `Syntax` describes a fault in the input; the other kinds indicate a
/// defect in the grammar tables, the action set, or the engine itself and
/// are not recoverable by the caller.
#[derive(Debug)]
pub enum ParseError {
    /// No top rule matched. Reports the farthest token reached.
    Syntax { pos: Pos, token: String },
    /// A top rule produced more than one end position.
    Ambiguity { rule: String, ends: Vec<u32> },
    /// An action received parameters inconsistent with its id.
    Action { action: u32, reason: String },
    /// An engine invariant did not hold.
    Invariant(&'static str),
    Io(std::io::Error),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Syntax { pos, token } => {
                write!(f, "syntax error at {pos}, near '{token}'")
            }
            ParseError::Ambiguity { rule, ends } => {
                write!(f, "ambiguous parse: rule {rule} admits {} end positions", ends.len())
            }
            ParseError::Action { action, reason } => {
                write!(f, "action {action} failed: {reason}")
            }
            ParseError::Invariant(what) => write!(f, "internal invariant violated: {what}"),
            ParseError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> ParseError {
        ParseError::Io(err)
    }
}
