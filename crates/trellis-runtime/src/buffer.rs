//! Lazy, append-only window over the lexer's token stream.

use trellis::grammar::Grammar;
use trellis::strings::StringPool;
use trellis::token::{Pos, Token};

use crate::lexer::Lexer;

/// Tokens read so far plus the matcher's cursor. Tokens are pulled one
/// logical line at a time and never released while a top-level construct is
/// being matched; the matcher reads arbitrarily far back through
/// [`TokenBuffer::active`].
pub struct TokenBuffer {
    lexer: Box<dyn Lexer>,
    pub pool: StringPool,
    tokens: Vec<(Token, Pos)>,
    /// Index of the first token still to be matched.
    pub cur: u32,
}

impl TokenBuffer {
    pub fn new(lexer: Box<dyn Lexer>) -> TokenBuffer {
        TokenBuffer {
            lexer,
            pool: StringPool::new(),
            tokens: Vec::new(),
            cur: 0,
        }
    }

    pub fn active(&self, i: u32) -> &Token {
        &self.tokens[i as usize].0
    }

    pub fn pos(&self, i: u32) -> Pos {
        self.tokens[i as usize].1
    }

    pub fn len(&self) -> u32 {
        self.tokens.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn at_eof(&self) -> bool {
        self.cur >= self.len() && self.lexer.end_of_file()
    }

    /// Makes sure at least one token is pending at the cursor, pulling
    /// lines until one yields tokens. Returns the number pending, 0 at end
    /// of file. Whitespace never reaches the lexer output and comments are
    /// dropped here.
    pub fn lex_line(&mut self, grammar: &Grammar) -> u32 {
        if self.cur < self.len() {
            return self.len() - self.cur;
        }
        loop {
            let mut count = 0;
            while !self.lexer.end_of_line() && !self.lexer.end_of_file() {
                match self.lexer.lex_token(grammar, &mut self.pool) {
                    Some((token, pos)) => {
                        if !token.is_comment() {
                            self.tokens.push((token, pos));
                            count += 1;
                        }
                    }
                    None => break,
                }
            }
            if count > 0 {
                return count;
            }
            if !self.lexer.read_line() {
                return 0;
            }
        }
    }

    /// Moves the cursor one step, pulling a new line when it runs off the
    /// end. Returns false only at end of file.
    pub fn advance(&mut self, grammar: &Grammar) -> bool {
        self.cur += 1;
        if self.cur >= self.len() {
            return self.lex_line(grammar) > 0;
        }
        true
    }

    /// True when a token exists at the cursor, pulling more input if
    /// needed.
    pub fn ensure_current(&mut self, grammar: &Grammar) -> bool {
        self.cur < self.len() || self.lex_line(grammar) > 0
    }

    /// Releases the tokens consumed by the previous top-level construct.
    /// Pending tokens shift down; the cursor restarts at zero.
    pub fn discard_matched(&mut self) {
        self.tokens.drain(..self.cur as usize);
        self.cur = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::SourceLexer;
    use trellis::grammar::{Element, GrammarBuilder, RuleKind};

    fn grammar() -> Grammar {
        let mut b = GrammarBuilder::new();
        b.separator(";");
        b.operator("=");
        let e = b.rule("E", RuleKind::Data, vec![Element::Rule(b.ident())]);
        b.set_top(e);
        b.finish()
    }

    fn buffer(text: &str) -> TokenBuffer {
        TokenBuffer::new(Box::new(SourceLexer::from_str(text)))
    }

    #[test]
    fn pulls_lines_on_demand() {
        let g = grammar();
        let mut buf = buffer("a = b;\nc = d;\n");
        assert_eq!(buf.lex_line(&g), 4);
        assert_eq!(buf.len(), 4);
        buf.cur = 4;
        assert_eq!(buf.lex_line(&g), 4);
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn comment_only_lines_are_skipped() {
        let g = grammar();
        let mut buf = buffer("// nothing here\n\nx;\n");
        assert_eq!(buf.lex_line(&g), 2);
        assert!(buf.active(0).is_ident());
    }

    #[test]
    fn empty_input_reports_eof() {
        let g = grammar();
        let mut buf = buffer("");
        assert_eq!(buf.lex_line(&g), 0);
        assert!(buf.at_eof());
    }

    #[test]
    fn discard_shifts_pending_tokens() {
        let g = grammar();
        let mut buf = buffer("a; b;\n");
        assert_eq!(buf.lex_line(&g), 4);
        buf.cur = 2;
        buf.discard_matched();
        assert_eq!(buf.cur, 0);
        assert_eq!(buf.len(), 2);
        assert!(buf.active(0).is_ident());
    }
}
