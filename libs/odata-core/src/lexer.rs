//! Tokenizer for `$filter`/`$orderby` text and `$search` text.
//!
//! The lexer is forward-only. Keywords (`and`, `eq`, `any`, ...) come out as plain
//! identifiers; the parsers decide what they mean. String and phrase tokens carry the
//! unescaped value, every other token carries its source slice.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::LexerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    /// Single-quoted string literal.
    String,
    Number,
    Date,
    DateTimeOffset,
    TimeOfDay,
    Guid,
    OpenParen,
    CloseParen,
    Comma,
    Slash,
    Colon,
    Minus,
    /// Bare search term (also carries `AND`/`OR`/`NOT`).
    Word,
    /// Double-quoted search phrase.
    Phrase,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset of the first character of the token.
    pub position: usize,
}

impl Token {
    #[must_use]
    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == text
    }

    #[must_use]
    pub fn is_word(&self, text: &str) -> bool {
        self.kind == TokenKind::Word && self.text == text
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grammar {
    Filter,
    Search,
}

#[allow(clippy::expect_used)] // good regexes, they don't panic
static LITERALS: LazyLock<Vec<(TokenKind, Regex)>> = LazyLock::new(|| {
    [
        (
            TokenKind::Guid,
            r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}",
        ),
        (
            TokenKind::DateTimeOffset,
            r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2}(\.\d{1,12})?)?(Z|[+-]\d{2}:\d{2})",
        ),
        (TokenKind::Date, r"^\d{4}-\d{2}-\d{2}"),
        (TokenKind::TimeOfDay, r"^\d{2}:\d{2}(:\d{2}(\.\d{1,12})?)?"),
        (TokenKind::Number, r"^-?\d+(\.\d+)?([eE][+-]?\d+)?"),
        (TokenKind::Identifier, r"^[A-Za-z_][A-Za-z0-9_]*"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("static regex should not panic")))
    .collect()
});

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    grammar: Grammar,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str, grammar: Grammar) -> Self {
        Self {
            input,
            position: 0,
            grammar,
        }
    }

    #[must_use]
    pub fn filter(input: &'a str) -> Self {
        Self::new(input, Grammar::Filter)
    }

    #[must_use]
    pub fn search(input: &'a str) -> Self {
        Self::new(input, Grammar::Search)
    }

    /// Byte offset of the next unread character.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Drain the remaining input into a token vector.
    ///
    /// # Errors
    /// Returns the first `LexerError` encountered.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Read the next token, or `None` at end of input.
    ///
    /// # Errors
    /// Returns `LexerError` for unterminated quotes and characters no token can start with.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        self.skip_whitespace();
        let Some(c) = self.rest().chars().next() else {
            return Ok(None);
        };
        let token = match self.grammar {
            Grammar::Filter => self.filter_token(c)?,
            Grammar::Search => self.search_token(c)?,
        };
        Ok(Some(token))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start_matches([' ', '\t', '\r', '\n']);
        self.position = self.input.len() - trimmed.len();
    }

    fn take(&mut self, kind: TokenKind, len: usize) -> Token {
        let start = self.position;
        self.position += len;
        Token {
            kind,
            text: self.input[start..self.position].to_owned(),
            position: start,
        }
    }

    fn filter_token(&mut self, c: char) -> Result<Token, LexerError> {
        match c {
            '(' => Ok(self.take(TokenKind::OpenParen, 1)),
            ')' => Ok(self.take(TokenKind::CloseParen, 1)),
            ',' => Ok(self.take(TokenKind::Comma, 1)),
            '/' => Ok(self.take(TokenKind::Slash, 1)),
            ':' => Ok(self.take(TokenKind::Colon, 1)),
            '\'' => self.quoted('\'', TokenKind::String),
            _ => {
                let rest = self.rest();
                let matched = LITERALS
                    .iter()
                    .find_map(|(kind, re)| re.find(rest).map(|m| (*kind, m.end())));
                match matched {
                    Some((kind, len)) => Ok(self.take(kind, len)),
                    None if c == '-' => Ok(self.take(TokenKind::Minus, 1)),
                    None => Err(LexerError::new(self.position, "an identifier, literal or operator")),
                }
            }
        }
    }

    fn search_token(&mut self, c: char) -> Result<Token, LexerError> {
        match c {
            '(' => Ok(self.take(TokenKind::OpenParen, 1)),
            ')' => Ok(self.take(TokenKind::CloseParen, 1)),
            '"' => self.quoted('"', TokenKind::Phrase),
            _ => {
                let rest = self.rest();
                let len = rest
                    .find(|ch: char| ch.is_whitespace() || matches!(ch, '(' | ')' | '"'))
                    .unwrap_or(rest.len());
                Ok(self.take(TokenKind::Word, len))
            }
        }
    }

    /// Reads a delimited literal. Only a doubled delimiter is an escape; any other
    /// character, including the other quote style, is taken as-is.
    fn quoted(&mut self, delimiter: char, kind: TokenKind) -> Result<Token, LexerError> {
        let start = self.position;
        let body_start = start + delimiter.len_utf8();
        let mut value = String::new();
        let mut chars = self.input[body_start..].char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            if ch != delimiter {
                value.push(ch);
                continue;
            }
            if chars.peek().is_some_and(|&(_, next)| next == delimiter) {
                chars.next();
                value.push(delimiter);
                continue;
            }
            self.position = body_start + offset + ch.len_utf8();
            return Ok(Token {
                kind,
                text: value,
                position: start,
            });
        }
        Err(LexerError::new(start, format!("closing {delimiter}")))
    }
}

/// Tokenize `$filter`/`$orderby` text.
///
/// # Errors
/// Returns `LexerError` on malformed input.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::filter(input).tokenize()
}

/// Tokenize `$search` text.
///
/// # Errors
/// Returns `LexerError` on an unterminated phrase.
pub fn tokenize_search(input: &str) -> Result<Vec<Token>, LexerError> {
    Lexer::search(input).tokenize()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn comparison_tokens_and_positions() {
        let tokens = tokenize("title eq 'abc'").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].text, "title");
        assert_eq!(tokens[1].position, 6);
        assert!(tokens[1].is_identifier("eq"));
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "abc");
        assert_eq!(tokens[2].position, 9);
    }

    #[test]
    fn doubled_single_quote_collapses() {
        let tokens = tokenize("name eq 'it''s'").unwrap();
        assert_eq!(tokens[2].text, "it's");
    }

    #[test]
    fn double_quote_inside_string_is_literal() {
        let tokens = tokenize(r#"name eq 'say "hi"'"#).unwrap();
        assert_eq!(tokens[2].text, r#"say "hi""#);
    }

    #[test]
    fn temporal_and_guid_literals() {
        assert_eq!(
            kinds("2024-01-02 2024-01-02T10:00:00Z 2024-01-02T10:00+02:00 10:30 10:30:15.5"),
            vec![
                TokenKind::Date,
                TokenKind::DateTimeOffset,
                TokenKind::DateTimeOffset,
                TokenKind::TimeOfDay,
                TokenKind::TimeOfDay,
            ]
        );
        assert_eq!(
            kinds("id eq 01234567-89ab-cdef-0123-456789abcdef"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Guid]
        );
    }

    #[test]
    fn minus_before_digit_is_signed_number() {
        let tokens = tokenize("-5 -x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "-5");
        assert_eq!(tokens[1].kind, TokenKind::Minus);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn numbers_with_fraction_and_exponent() {
        let tokens = tokenize("1.5 2e10 3.25E-2").unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["1.5", "2e10", "3.25E-2"]);
    }

    #[test]
    fn punctuation() {
        assert_eq!(
            kinds("flights/any(f: f/id)"),
            vec![
                TokenKind::Identifier,
                TokenKind::Slash,
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Slash,
                TokenKind::Identifier,
                TokenKind::CloseParen,
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_start() {
        let err = tokenize("name eq 'abc").unwrap_err();
        assert_eq!(err.position, 8);
        assert_eq!(err.expected, "closing '");
    }

    #[test]
    fn unrecognized_character() {
        let err = tokenize("name eq #").unwrap_err();
        assert_eq!(err.position, 8);
    }

    #[test]
    fn lexer_position_advances() {
        let mut lexer = Lexer::filter("  a  b");
        assert_eq!(lexer.position(), 0);
        let first = lexer.next_token().unwrap().unwrap();
        assert_eq!(first.position, 2);
        assert_eq!(lexer.position(), 3);
        lexer.next_token().unwrap();
        assert_eq!(lexer.next_token().unwrap(), None);
    }

    #[test]
    fn search_words_and_phrases() {
        let tokens = tokenize_search(r#"(t1 OR "a ''t1") t2"#).unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::OpenParen,
                TokenKind::Word,
                TokenKind::Word,
                TokenKind::Phrase,
                TokenKind::CloseParen,
                TokenKind::Word,
            ]
        );
        assert!(tokens[2].is_word("OR"));
        assert_eq!(tokens[3].text, "a ''t1");
    }

    #[test]
    fn search_doubled_double_quote() {
        let tokens = tokenize_search(r#""t1""""#).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "t1\"");
    }

    #[test]
    fn search_empty_phrase() {
        let tokens = tokenize_search(r#""""#).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Phrase);
        assert_eq!(tokens[0].text, "");
    }

    #[test]
    fn search_unterminated_phrase() {
        let err = tokenize_search(r#"t1 "abc"#).unwrap_err();
        assert_eq!(err.position, 3);
    }
}
