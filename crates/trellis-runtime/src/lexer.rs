//! The lexer interface the token buffer pulls from, plus a line-oriented
//! implementation good enough for the demo front-end and the tests.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use trellis::grammar::{Grammar, SysTokKind};
use trellis::strings::StringPool;
use trellis::token::{Lit, Pos, Token};

/// One logical line of tokens at a time. `read_line` pulls the next source
/// line, `lex_token` produces tokens until `end_of_line` reports true.
pub trait Lexer {
    fn read_line(&mut self) -> bool;
    fn lex_token(&mut self, grammar: &Grammar, pool: &mut StringPool) -> Option<(Token, Pos)>;
    fn end_of_line(&self) -> bool;
    fn end_of_file(&self) -> bool;
}

/// Lexes source text line by line: identifiers, integer/floating/string/
/// char literals, `//` and `/* */` comments, and system tokens by longest
/// match against the grammar's spellings. `true`, `false`, `null`, and
/// `this` lex as literals.
pub struct SourceLexer {
    input: Box<dyn BufRead>,
    line: Vec<char>,
    pos: usize,
    line_no: u32,
    eof: bool,
    in_block_comment: bool,
}

impl SourceLexer {
    pub fn from_path(path: &Path) -> std::io::Result<SourceLexer> {
        let file = File::open(path)?;
        Ok(SourceLexer::from_reader(Box::new(BufReader::new(file))))
    }

    pub fn from_str(text: &str) -> SourceLexer {
        SourceLexer::from_reader(Box::new(Cursor::new(text.to_string())))
    }

    fn from_reader(input: Box<dyn BufRead>) -> SourceLexer {
        SourceLexer {
            input,
            line: Vec::new(),
            pos: 0,
            line_no: 0,
            eof: false,
            in_block_comment: false,
        }
    }

    fn here(&self) -> Pos {
        Pos {
            line: self.line_no,
            col: self.pos as u32 + 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.line.get(self.pos).copied()
    }

    fn rest(&self) -> String {
        self.line[self.pos..].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, |c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn lex_word(&mut self, grammar: &Grammar, pool: &mut StringPool) -> Token {
        let begin = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.line[begin..self.pos].iter().collect();
        match word.as_str() {
            "true" => Token::Literal(Lit::Bool(true)),
            "false" => Token::Literal(Lit::Bool(false)),
            "null" => Token::Literal(Lit::Null),
            "this" => Token::Literal(Lit::This),
            _ => match grammar.lookup_spelling(&word) {
                Some(id) if grammar.system_token(id).kind == SysTokKind::Keyword => {
                    Token::Keyword(id)
                }
                _ => Token::Ident(pool.intern(&word)),
            },
        }
    }

    fn lex_number(&mut self) -> Token {
        let begin = self.pos;
        let mut is_float = false;
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.')
            && self
                .line
                .get(self.pos + 1)
                .map_or(false, |c| c.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.line[begin..self.pos].iter().collect();
        if is_float {
            Token::Literal(Lit::Float(text.parse().unwrap_or(0.0)))
        } else {
            Token::Literal(Lit::Int(text.parse().unwrap_or(0)))
        }
    }

    fn lex_quoted(&mut self, quote: char, pool: &mut StringPool) -> Token {
        self.pos += 1;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                break;
            }
            if c == '\\' {
                let escaped = self.peek().unwrap_or('\\');
                self.pos += 1;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            } else {
                text.push(c);
            }
        }
        if quote == '\'' {
            Token::Literal(Lit::Char(text.chars().next().unwrap_or('\0')))
        } else {
            Token::Literal(Lit::Str(pool.intern(&text)))
        }
    }

    /// Consumes comment text. Returns true if a comment was present.
    fn lex_comment(&mut self) -> bool {
        if self.in_block_comment {
            while self.pos < self.line.len() {
                if self.rest().starts_with("*/") {
                    self.pos += 2;
                    self.in_block_comment = false;
                    return true;
                }
                self.pos += 1;
            }
            return true;
        }
        let rest = self.rest();
        if rest.starts_with("//") {
            self.pos = self.line.len();
            return true;
        }
        if rest.starts_with("/*") {
            self.pos += 2;
            self.in_block_comment = true;
            self.lex_comment();
            return true;
        }
        false
    }
}

impl Lexer for SourceLexer {
    fn read_line(&mut self) -> bool {
        let mut text = String::new();
        match self.input.read_line(&mut text) {
            Ok(0) | Err(_) => {
                self.eof = true;
                false
            }
            Ok(_) => {
                self.line = text.trim_end_matches(['\n', '\r']).chars().collect();
                self.pos = 0;
                self.line_no += 1;
                true
            }
        }
    }

    fn lex_token(&mut self, grammar: &Grammar, pool: &mut StringPool) -> Option<(Token, Pos)> {
        self.skip_whitespace();
        let pos = self.here();
        if self.lex_comment() {
            return Some((Token::Comment, pos));
        }
        let c = self.peek()?;
        let token = if c.is_alphabetic() || c == '_' {
            self.lex_word(grammar, pool)
        } else if c.is_ascii_digit() {
            self.lex_number()
        } else if c == '"' || c == '\'' {
            self.lex_quoted(c, pool)
        } else if let Some((id, len)) = grammar.match_system_prefix(&self.rest()) {
            self.pos += len;
            match grammar.system_token(id).kind {
                SysTokKind::Operator => Token::Operator(id),
                _ => Token::Separator(id),
            }
        } else {
            log::warn!("unrecognized character '{c}' at {pos}, skipping");
            self.pos += 1;
            return self.lex_token(grammar, pool);
        };
        Some((token, pos))
    }

    fn end_of_line(&self) -> bool {
        self.pos >= self.line.len()
            || self.line[self.pos..].iter().all(|c| c.is_whitespace())
    }

    fn end_of_file(&self) -> bool {
        self.eof
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis::grammar::GrammarBuilder;

    fn tiny_grammar() -> Grammar {
        let mut b = GrammarBuilder::new();
        b.keyword("if");
        let plus = b.operator("+");
        b.operator("+=");
        b.separator(";");
        let e = b.rule(
            "E",
            trellis::grammar::RuleKind::Concatenate,
            vec![
                trellis::grammar::Element::Rule(b.ident()),
                trellis::grammar::Element::Token(plus),
            ],
        );
        b.set_top(e);
        b.finish()
    }

    fn lex_all(text: &str) -> Vec<Token> {
        let grammar = tiny_grammar();
        let mut pool = StringPool::new();
        let mut lexer = SourceLexer::from_str(text);
        let mut out = Vec::new();
        while lexer.read_line() {
            while !lexer.end_of_line() {
                match lexer.lex_token(&grammar, &mut pool) {
                    Some((tok, _)) => out.push(tok),
                    None => break,
                }
            }
        }
        out
    }

    #[test]
    fn words_and_numbers() {
        let toks = lex_all("if x 42 3.5");
        assert!(matches!(toks[0], Token::Keyword(_)));
        assert!(toks[1].is_ident());
        assert_eq!(toks[2], Token::Literal(Lit::Int(42)));
        assert_eq!(toks[3], Token::Literal(Lit::Float(3.5)));
    }

    #[test]
    fn longest_operator_wins() {
        let toks = lex_all("a += b + c;");
        let ops: Vec<_> = toks.iter().filter(|t| t.sys_id().is_some()).collect();
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn comments_lex_as_comment_tokens() {
        let toks = lex_all("a // trailing\nb /* span\nning */ c");
        let comments = toks.iter().filter(|t| t.is_comment()).count();
        assert!(comments >= 2);
        let idents = toks.iter().filter(|t| t.is_ident()).count();
        assert_eq!(idents, 3);
    }

    #[test]
    fn literal_words() {
        let toks = lex_all("this null true");
        assert_eq!(toks[0], Token::Literal(Lit::This));
        assert_eq!(toks[1], Token::Literal(Lit::Null));
        assert_eq!(toks[2], Token::Literal(Lit::Bool(true)));
    }
}
