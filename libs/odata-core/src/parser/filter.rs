use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use super::TokenStream;
use crate::ast::{FunctionCall, Lambda, LambdaKind, Node, PropertyPath, Value};
use crate::error::ParserError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::metadata::{EntityType, Model, NavigationProperty, Property};
use crate::query::{ODataOrderBy, OrderKey, SortDir};
use crate::registry::{Associativity, BinaryOperator, Function, UnaryOperator};
use crate::Error;

/// Which capability flag a property reference must carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyUsage {
    Filter,
    OrderBy,
}

/// Parser for the `$filter` and `$orderby` grammar, resolving identifiers against an entity type.
#[derive(Clone, Copy, Debug)]
pub struct FilterParser<'m> {
    model: &'m Model,
    entity_type: &'m EntityType,
}

impl<'m> FilterParser<'m> {
    #[must_use]
    pub fn new(model: &'m Model, entity_type: &'m EntityType) -> Self {
        Self { model, entity_type }
    }

    /// Parse `$filter` text.
    ///
    /// # Errors
    /// Returns `Error::Lexer` or `Error::Parser` describing the first problem found.
    pub fn parse(&self, text: &str) -> Result<Node, Error> {
        let tokens = tokenize(text)?;
        let node = self.parse_tokens(tokens, text.len(), PropertyUsage::Filter)?;
        tracing::trace!(filter = %node, nodes = node.node_count(), "parsed $filter");
        Ok(node)
    }

    /// Parse a single expression from an already tokenized stream.
    ///
    /// # Errors
    /// Returns `Error::Parser` on grammar or resolution failures.
    pub fn parse_tokens(
        &self,
        tokens: Vec<Token>,
        end: usize,
        usage: PropertyUsage,
    ) -> Result<Node, Error> {
        let mut session = Session::new(*self, TokenStream::new(tokens, end), usage);
        let node = session.expression(0)?;
        session.stream.finish()?;
        Ok(node)
    }

    /// Parse `$orderby` text: comma-separated expressions with optional `asc`/`desc`.
    ///
    /// # Errors
    /// Returns `Error::Lexer` or `Error::Parser` describing the first problem found.
    pub fn parse_orderby(&self, text: &str) -> Result<ODataOrderBy, Error> {
        let tokens = tokenize(text)?;
        let mut session = Session::new(*self, TokenStream::new(tokens, text.len()), PropertyUsage::OrderBy);
        let mut keys = Vec::new();
        loop {
            let expression = session.expression(0)?;
            let dir = match session.stream.peek() {
                Some(t) if t.is_identifier("asc") => Some(SortDir::Asc),
                Some(t) if t.is_identifier("desc") => Some(SortDir::Desc),
                _ => None,
            };
            if dir.is_some() {
                session.stream.next();
            }
            keys.push(OrderKey {
                expression,
                dir: dir.unwrap_or(SortDir::Asc),
            });
            if session.stream.peek_is(TokenKind::Comma) {
                session.stream.next();
                continue;
            }
            session.stream.finish()?;
            break;
        }
        Ok(ODataOrderBy(keys))
    }
}

/// Lambda variable in scope while its body is parsed.
struct Scope<'m> {
    variable: String,
    entity_type: &'m EntityType,
}

struct Session<'m> {
    parser: FilterParser<'m>,
    stream: TokenStream,
    usage: PropertyUsage,
    scopes: Vec<Scope<'m>>,
}

impl<'m> Session<'m> {
    fn new(parser: FilterParser<'m>, stream: TokenStream, usage: PropertyUsage) -> Self {
        Self {
            parser,
            stream,
            usage,
            scopes: Vec::new(),
        }
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Node, Error> {
        let mut left = self.prefix()?;
        while let Some(operator) = self.peek_operator() {
            let info = operator.info();
            if info.precedence < min_precedence {
                break;
            }
            self.stream.next();
            let next_min = match info.associativity {
                Associativity::Left => info.precedence + 1,
                Associativity::Right => info.precedence,
            };
            let right = if operator == BinaryOperator::In {
                self.list()?
            } else {
                self.expression(next_min)?
            };
            left = Node::binary(operator, left, right);
        }
        Ok(left)
    }

    fn peek_operator(&self) -> Option<BinaryOperator> {
        self.stream
            .peek()
            .filter(|t| t.kind == TokenKind::Identifier)
            .and_then(|t| BinaryOperator::from_symbol(&t.text))
    }

    fn prefix(&mut self) -> Result<Node, Error> {
        let Some(token) = self.stream.next() else {
            return Err(self.stream.unexpected("an expression").into());
        };
        match token.kind {
            TokenKind::OpenParen => {
                let inner = self.expression(0)?;
                self.close_group(&token)?;
                Ok(Node::group(inner))
            }
            TokenKind::Minus => self.unary(UnaryOperator::Negate),
            TokenKind::Identifier => match token.text.as_str() {
                "not" => self.unary(UnaryOperator::Not),
                "true" => Ok(Node::Literal(Value::Bool(true))),
                "false" => Ok(Node::Literal(Value::Bool(false))),
                "null" => Ok(Node::Literal(Value::Null)),
                _ if self.stream.peek_is(TokenKind::OpenParen) => self.function_call(&token),
                _ => self.path(token),
            },
            TokenKind::String
            | TokenKind::Number
            | TokenKind::Date
            | TokenKind::DateTimeOffset
            | TokenKind::TimeOfDay
            | TokenKind::Guid => Ok(Node::Literal(literal_value(&token)?)),
            TokenKind::CloseParen => {
                Err(ParserError::new(token.position, "unbalanced ')' without matching '('").into())
            }
            _ => Err(ParserError::new(
                token.position,
                format!("unexpected token '{}'", token.text),
            )
            .into()),
        }
    }

    fn unary(&mut self, operator: UnaryOperator) -> Result<Node, Error> {
        let operand = self.expression(operator.info().precedence)?;
        Ok(Node::unary(operator, operand))
    }

    fn close_group(&mut self, open: &Token) -> Result<(), ParserError> {
        if self.stream.peek_is(TokenKind::CloseParen) {
            self.stream.next();
            return Ok(());
        }
        match self.stream.peek() {
            None => Err(ParserError::new(open.position, "unbalanced '(' without matching ')'")),
            Some(_) => Err(self.stream.unexpected("')'")),
        }
    }

    /// Comma-separated expressions inside parentheses.
    fn arguments(&mut self, open: &Token) -> Result<Vec<Node>, Error> {
        let mut items = Vec::new();
        if !self.stream.peek_is(TokenKind::CloseParen) {
            loop {
                items.push(self.expression(0)?);
                if !self.stream.peek_is(TokenKind::Comma) {
                    break;
                }
                self.stream.next();
            }
        }
        self.close_group(open)?;
        Ok(items)
    }

    fn list(&mut self) -> Result<Node, Error> {
        let open = self.stream.expect(TokenKind::OpenParen, "'(' after 'in'")?;
        let items = self.arguments(&open)?;
        if items.is_empty() {
            return Err(ParserError::new(open.position, "'in' requires at least one value").into());
        }
        Ok(Node::List(items))
    }

    fn function_call(&mut self, name: &Token) -> Result<Node, Error> {
        let Some(function) = Function::from_name(&name.text) else {
            return Err(ParserError::new(name.position, format!("unknown function '{}'", name.text)).into());
        };
        let open = self.stream.expect(TokenKind::OpenParen, "'('")?;
        let arguments = self.arguments(&open)?;
        if !function.accepts(arguments.len()) {
            let info = function.info();
            let expected = if info.min_args == info.max_args {
                info.min_args.to_string()
            } else {
                format!("{} to {}", info.min_args, info.max_args)
            };
            return Err(ParserError::new(
                name.position,
                format!(
                    "function '{}' expects {expected} argument(s), got {}",
                    info.name,
                    arguments.len()
                ),
            )
            .into());
        }
        Ok(Node::Function(FunctionCall { function, arguments }))
    }

    fn scope(&self, variable: &str) -> Option<&'m EntityType> {
        self.scopes
            .iter()
            .rev()
            .find(|s| s.variable == variable)
            .map(|s| s.entity_type)
    }

    fn identifier_after_slash(&mut self) -> Result<Token, ParserError> {
        self.stream.expect(TokenKind::Slash, "'/'")?;
        self.stream.expect(TokenKind::Identifier, "a property name after '/'")
    }

    fn path(&mut self, first: Token) -> Result<Node, Error> {
        let (mut entity_type, variable, mut segment) = match self.scope(&first.text) {
            Some(scoped) => {
                if !self.stream.peek_is(TokenKind::Slash) {
                    return Ok(Node::LambdaVariable(first.text));
                }
                let segment = self.identifier_after_slash()?;
                (scoped, Some(first.text), segment)
            }
            None => (self.parser.entity_type, None, first),
        };
        let mut navigation = Vec::new();

        loop {
            if let Some(property) = entity_type.property(&segment.text) {
                if self.stream.peek_is(TokenKind::Slash) {
                    return Err(ParserError::new(
                        segment.position,
                        format!("'{}' is not a navigation property", segment.text),
                    )
                    .into());
                }
                self.check_usage(property, &segment)?;
                return Ok(Node::Property(PropertyPath {
                    variable,
                    navigation,
                    property: property.clone(),
                }));
            }

            let Some(nav) = entity_type.navigation_property(&segment.text) else {
                return Err(ParserError::new(
                    segment.position,
                    format!(
                        "unknown property '{}' on entity type '{}'",
                        segment.text,
                        entity_type.identifier()
                    ),
                )
                .into());
            };
            let target = nav.target_type(self.parser.model).ok_or_else(|| {
                ParserError::new(
                    segment.position,
                    format!("navigation property '{}' has no target type", nav.name()),
                )
            })?;
            if !self.stream.peek_is(TokenKind::Slash) {
                return Err(ParserError::new(
                    segment.position,
                    format!("navigation property '{}' cannot be used as a value", nav.name()),
                )
                .into());
            }
            let next = self.identifier_after_slash()?;
            let lambda_kind = match next.text.as_str() {
                "any" => Some(LambdaKind::Any),
                "all" => Some(LambdaKind::All),
                _ => None,
            };
            if let Some(kind) = lambda_kind.filter(|_| self.stream.peek_is(TokenKind::OpenParen)) {
                if !nav.is_collection() {
                    return Err(ParserError::new(
                        next.position,
                        format!("'{}' requires a collection, '{}' is single-valued", kind.keyword(), nav.name()),
                    )
                    .into());
                }
                return self.lambda(kind, variable, navigation, nav, target);
            }
            if nav.is_collection() {
                return Err(ParserError::new(
                    segment.position,
                    format!(
                        "collection-valued navigation '{}' must be followed by any() or all()",
                        nav.name()
                    ),
                )
                .into());
            }
            navigation.push(segment.text);
            entity_type = target;
            segment = next;
        }
    }

    fn lambda(
        &mut self,
        kind: LambdaKind,
        owner: Option<String>,
        path: Vec<String>,
        navigation: &'m NavigationProperty,
        target: &'m EntityType,
    ) -> Result<Node, Error> {
        let open = self.stream.expect(TokenKind::OpenParen, "'('")?;
        let mut lambda = Lambda {
            kind,
            owner,
            path,
            navigation: navigation.name().to_owned(),
            target: target.identifier().to_owned(),
            variable: None,
            body: None,
        };
        if self.stream.peek_is(TokenKind::CloseParen) {
            if kind == LambdaKind::All {
                return Err(ParserError::new(open.position, "all() requires a lambda expression").into());
            }
            self.stream.next();
            return Ok(Node::Lambda(lambda));
        }

        let variable = self.stream.expect(TokenKind::Identifier, "a lambda variable")?;
        if self.scope(&variable.text).is_some() {
            return Err(ParserError::new(
                variable.position,
                format!("lambda variable '{}' is already in scope", variable.text),
            )
            .into());
        }
        self.stream.expect(TokenKind::Colon, "':' after the lambda variable")?;
        self.scopes.push(Scope {
            variable: variable.text.clone(),
            entity_type: target,
        });
        let body = self.expression(0);
        self.scopes.pop();
        let body = body?;
        self.close_group(&open)?;

        lambda.variable = Some(variable.text);
        lambda.body = Some(Box::new(body));
        Ok(Node::Lambda(lambda))
    }

    fn check_usage(&self, property: &Property, token: &Token) -> Result<(), ParserError> {
        if self.usage == PropertyUsage::Filter && !property.is_filterable() {
            return Err(ParserError::new(
                token.position,
                format!("property '{}' is not filterable", property.name()),
            ));
        }
        Ok(())
    }
}

fn literal_value(token: &Token) -> Result<Value, ParserError> {
    let invalid = || ParserError::new(token.position, format!("invalid literal '{}'", token.text));
    let text = token.text.as_str();
    match token.kind {
        TokenKind::String => Ok(Value::String(token.text.clone())),
        TokenKind::Number => BigDecimal::from_str(text)
            .map(|n| Value::Number(number_literal(text, n)))
            .map_err(|_| invalid()),
        TokenKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| invalid()),
        TokenKind::DateTimeOffset => parse_datetime_offset(text)
            .map(Value::DateTime)
            .ok_or_else(invalid),
        TokenKind::TimeOfDay => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map(Value::Time)
            .map_err(|_| invalid()),
        TokenKind::Guid => Uuid::parse_str(text).map(Value::Uuid).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Exponent forms keep at least one fractional digit, so only plain integers have scale 0.
fn number_literal(text: &str, n: BigDecimal) -> BigDecimal {
    if text.contains(['e', 'E']) && n.as_bigint_and_exponent().1 < 1 {
        n.with_scale(1)
    } else {
        n
    }
}

/// Accepts `Z` or a numeric offset, with or without seconds.
fn parse_datetime_offset(text: &str) -> Option<DateTime<Utc>> {
    let normalized = match text.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => text.to_owned(),
    };
    ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"]
        .iter()
        .find_map(|format| DateTime::parse_from_str(&normalized, format).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
