use std::fmt::{Display, Formatter};

use cranelift_entity::entity_impl;

use crate::strings::{StrId, StringPool};

/// Dense id of a system token: a keyword, operator, or separator spelling
/// interned by the grammar. Two occurrences of the same spelling always
/// carry the same id, so system tokens compare by id alone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SysTokId(u32);

entity_impl! { SysTokId }

/// Line/column of a token in its source file, 1-based.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, col {}", self.line, self.col)
    }
}

/// Payload of a literal token. `Null` and `This` are lexed as literals so
/// grammars can match them through the generic literal leaf table.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(StrId),
    Null,
    This,
}

/// A unit produced by the lexer. Identifiers and literals carry payload;
/// keywords, operators, and separators are system tokens compared by id.
/// Whitespace never reaches the token stream, comments are filtered out by
/// the token buffer.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Token {
    Ident(StrId),
    Literal(Lit),
    Keyword(SysTokId),
    Operator(SysTokId),
    Separator(SysTokId),
    Comment,
}

impl Token {
    pub fn is_ident(&self) -> bool {
        matches!(self, Token::Ident(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Token::Literal(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Token::Comment)
    }

    /// The system-token id, for keyword/operator/separator tokens.
    pub fn sys_id(&self) -> Option<SysTokId> {
        match self {
            Token::Keyword(id) | Token::Operator(id) | Token::Separator(id) => Some(*id),
            _ => None,
        }
    }

    pub fn to_str(&self, pool: &StringPool) -> String {
        match self {
            Token::Ident(id) => pool.get(*id).to_string(),
            Token::Literal(Lit::Int(v)) => v.to_string(),
            Token::Literal(Lit::Float(v)) => v.to_string(),
            Token::Literal(Lit::Bool(v)) => v.to_string(),
            Token::Literal(Lit::Char(c)) => format!("'{c}'"),
            Token::Literal(Lit::Str(id)) => format!("\"{}\"", pool.get(*id)),
            Token::Literal(Lit::Null) => "null".to_string(),
            Token::Literal(Lit::This) => "this".to_string(),
            Token::Keyword(id) | Token::Operator(id) | Token::Separator(id) => {
                format!("{id:?}")
            }
            Token::Comment => "<comment>".to_string(),
        }
    }
}
