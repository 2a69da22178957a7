use super::TokenStream;
use crate::ast::Node;
use crate::error::ParserError;
use crate::lexer::{tokenize_search, Token, TokenKind};
use crate::registry::{BinaryOperator, UnaryOperator, SEARCH_UNARY_OPERATORS};
use crate::Error;

/// Parser for `$search`: terms, phrases, `AND`/`OR`/`NOT` and grouping.
///
/// Adjacent terms are joined by an implicit `AND`. `NOT` binds tighter than `AND`,
/// which binds tighter than `OR`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchParser;

impl SearchParser {
    /// # Errors
    /// Returns `Error::Lexer` for an unterminated phrase or `Error::Parser` for grammar errors.
    pub fn parse(self, text: &str) -> Result<Node, Error> {
        let tokens = tokenize_search(text)?;
        self.parse_tokens(tokens, text.len())
    }

    /// # Errors
    /// Returns `Error::Parser` for grammar errors.
    pub fn parse_tokens(self, tokens: Vec<Token>, end: usize) -> Result<Node, Error> {
        let mut stream = TokenStream::new(tokens, end);
        if stream.peek().is_none() {
            return Err(ParserError::new(0, "empty search expression").into());
        }
        let node = expression(&mut stream, 0)?;
        stream.finish()?;
        tracing::trace!(search = %node, "parsed $search");
        Ok(node)
    }
}

/// Parse `$search` text.
///
/// # Errors
/// See [`SearchParser::parse`].
pub fn parse_search(text: &str) -> Result<Node, Error> {
    SearchParser.parse(text)
}

fn not_precedence() -> u8 {
    SEARCH_UNARY_OPERATORS
        .iter()
        .find(|(op, _)| *op == UnaryOperator::Not)
        .map_or(u8::MAX, |(_, info)| info.precedence)
}

/// The operator joining the next term, and whether it is spelled out.
fn peek_operator(stream: &TokenStream) -> Option<(BinaryOperator, bool)> {
    let token = stream.peek()?;
    match token.kind {
        TokenKind::Word => Some(match BinaryOperator::from_search_symbol(&token.text) {
            Some(op) => (op, true),
            None => (BinaryOperator::And, false),
        }),
        TokenKind::Phrase | TokenKind::OpenParen => Some((BinaryOperator::And, false)),
        _ => None,
    }
}

fn expression(stream: &mut TokenStream, min_precedence: u8) -> Result<Node, Error> {
    let mut left = prefix(stream)?;
    while let Some((operator, explicit)) = peek_operator(stream) {
        let precedence = operator.search_info().map_or(0, |info| info.precedence);
        if precedence < min_precedence {
            break;
        }
        if explicit {
            stream.next();
        }
        let right = expression(stream, precedence + 1)?;
        left = Node::binary(operator, left, right);
    }
    Ok(left)
}

fn prefix(stream: &mut TokenStream) -> Result<Node, Error> {
    let Some(token) = stream.next() else {
        return Err(stream.unexpected("a search term").into());
    };
    match token.kind {
        TokenKind::Word if token.text == "NOT" => {
            let operand = expression(stream, not_precedence())?;
            Ok(Node::unary(UnaryOperator::Not, operand))
        }
        TokenKind::Word if BinaryOperator::from_search_symbol(&token.text).is_some() => Err(
            ParserError::new(token.position, format!("'{}' requires a term on its left", token.text)).into(),
        ),
        TokenKind::Word | TokenKind::Phrase => Ok(Node::string(token.text)),
        TokenKind::OpenParen => {
            let inner = expression(stream, 0)?;
            if !stream.peek_is(TokenKind::CloseParen) {
                return Err(match stream.peek() {
                    None => ParserError::new(token.position, "unbalanced '(' without matching ')'"),
                    Some(_) => stream.unexpected("')'"),
                }
                .into());
            }
            stream.next();
            Ok(Node::group(inner))
        }
        TokenKind::CloseParen => {
            Err(ParserError::new(token.position, "unbalanced ')' without matching '('").into())
        }
        _ => Err(ParserError::new(token.position, format!("unexpected token '{}'", token.text)).into()),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn term(text: &str) -> Node {
        Node::string(text)
    }

    #[test]
    fn implicit_and() {
        assert_eq!(
            parse_search("t1 t2").unwrap(),
            Node::binary(BinaryOperator::And, term("t1"), term("t2"))
        );
    }

    #[test]
    fn not_binds_tighter_than_and() {
        assert_eq!(
            parse_search("NOT t1 AND t2").unwrap(),
            Node::binary(
                BinaryOperator::And,
                Node::unary(UnaryOperator::Not, term("t1")),
                term("t2")
            )
        );
    }

    #[test]
    fn leading_operator_is_rejected() {
        let err = parse_search("OR t1").unwrap_err();
        assert!(matches!(err, Error::Parser(ParserError { position: 0, .. })));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(parse_search("   "), Err(Error::Parser(_))));
    }

    #[test]
    fn unbalanced_groups() {
        assert!(matches!(parse_search("(t1 OR t2"), Err(Error::Parser(_))));
        assert!(matches!(parse_search("t1)"), Err(Error::Parser(_))));
    }
}
