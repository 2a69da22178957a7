//! Pratt parsers for the `$filter`/`$orderby` and `$search` grammars, plus the
//! `$select`/`$expand` option parsers.

mod expand;
mod filter;
mod search;

pub use expand::{parse_expand, parse_select, ExpandItem, Select};
pub use filter::{FilterParser, PropertyUsage};
pub use search::{parse_search, SearchParser};

use crate::error::ParserError;
use crate::lexer::{Token, TokenKind};

/// Forward-only cursor over a token vector.
#[derive(Debug)]
pub(crate) struct TokenStream {
    tokens: Vec<Token>,
    index: usize,
    /// Byte length of the source text, reported for errors at end of input.
    end: usize,
}

impl TokenStream {
    pub(crate) fn new(tokens: Vec<Token>, end: usize) -> Self {
        Self {
            tokens,
            index: 0,
            end,
        }
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    pub(crate) fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    pub(crate) fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    /// Position of the next token, or the end of the input.
    pub(crate) fn position(&self) -> usize {
        self.peek().map_or(self.end, |t| t.position)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParserError> {
        if self.peek_is(kind) {
            if let Some(token) = self.next() {
                return Ok(token);
            }
        }
        Err(self.unexpected(what))
    }

    /// Error describing the next token (or end of input) as not being `what`.
    pub(crate) fn unexpected(&self, what: &str) -> ParserError {
        match self.peek() {
            Some(token) => ParserError::new(
                token.position,
                format!("expected {what}, found '{}'", token.text),
            ),
            None => ParserError::new(self.end, format!("expected {what}, found end of input")),
        }
    }

    /// Fails unless every token was consumed.
    pub(crate) fn finish(&self) -> Result<(), ParserError> {
        match self.peek() {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::CloseParen => Err(ParserError::new(
                token.position,
                "unbalanced ')' without matching '('",
            )),
            Some(token) => Err(ParserError::new(
                token.position,
                format!("unexpected token '{}'", token.text),
            )),
        }
    }
}
