//! Expression tree produced by the `$filter`, `$orderby` and `$search` parsers.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::metadata::Property;
use crate::registry::{BinaryOperator, Function, UnaryOperator};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    String(String),
}

impl Value {
    /// Short type label used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::String(_) => "string",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Number written without fraction or exponent.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Number(n) if n.as_bigint_and_exponent().1 == 0)
    }
}

/// Renders the value in OData literal syntax.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// A resolved reference to a declared property, possibly reached through
/// single-valued navigation properties or a lambda variable.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyPath {
    /// Lambda variable the path starts from, `None` for the queried entity.
    pub variable: Option<String>,
    /// Single-valued navigation properties traversed before the property.
    pub navigation: Vec<String>,
    pub property: Property,
}

impl PropertyPath {
    #[must_use]
    pub fn name(&self) -> &str {
        self.property.name()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(variable) = &self.variable {
            write!(f, "{variable}/")?;
        }
        for segment in &self.navigation {
            write!(f, "{segment}/")?;
        }
        f.write_str(self.property.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LambdaKind {
    Any,
    All,
}

impl LambdaKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            LambdaKind::Any => "any",
            LambdaKind::All => "all",
        }
    }
}

/// `nav/any(v: body)` or `nav/all(v: body)` over a collection-valued navigation property.
#[derive(Clone, Debug, PartialEq)]
pub struct Lambda {
    pub kind: LambdaKind,
    /// Enclosing lambda variable the navigation starts from.
    pub owner: Option<String>,
    /// Single-valued navigation properties traversed before the collection.
    pub path: Vec<String>,
    /// The collection-valued navigation property.
    pub navigation: String,
    /// Entity type identifier of the collection members.
    pub target: String,
    /// `None` only for the parameterless `any()`.
    pub variable: Option<String>,
    pub body: Option<Box<Node>>,
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{owner}/")?;
        }
        for segment in &self.path {
            write!(f, "{segment}/")?;
        }
        write!(f, "{}/{}(", self.navigation, self.kind.keyword())?;
        if let (Some(variable), Some(body)) = (&self.variable, &self.body) {
            write!(f, "{variable}: {body}")?;
        }
        f.write_str(")")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub function: Function,
    pub arguments: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Binary {
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Node>,
    },
    Function(FunctionCall),
    Literal(Value),
    Property(PropertyPath),
    LambdaVariable(String),
    Lambda(Lambda),
    /// Right-hand side of `in`.
    List(Vec<Node>),
    /// Explicit parentheses in the source text.
    Group(Box<Node>),
}

impl Node {
    #[must_use]
    pub fn binary(operator: BinaryOperator, left: Node, right: Node) -> Self {
        Node::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn unary(operator: UnaryOperator, operand: Node) -> Self {
        Node::Unary {
            operator,
            operand: Box::new(operand),
        }
    }

    #[must_use]
    pub fn group(inner: Node) -> Self {
        Node::Group(Box::new(inner))
    }

    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Node::Literal(Value::String(value.into()))
    }

    /// Nodes whose emitted events already open and close a group.
    #[must_use]
    pub fn is_self_delimiting(&self) -> bool {
        matches!(self, Node::Binary { .. } | Node::List(_) | Node::Group(_))
    }

    /// Strip redundant parentheses.
    #[must_use]
    pub fn ungrouped(&self) -> &Node {
        match self {
            Node::Group(inner) => inner.ungrouped(),
            other => other,
        }
    }

    /// Whether the expression has an integer type, which makes `div` truncate.
    ///
    /// Integral properties and integer literals are integers, as is integer arithmetic
    /// over them. Functions counting characters or extracting date parts return integers;
    /// `floor` and `ceiling` keep the type of their argument.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        match self {
            Node::Literal(value) => value.is_integer(),
            Node::Property(path) => path.property.primitive_type().is_integral(),
            Node::Group(inner)
            | Node::Unary {
                operator: UnaryOperator::Negate,
                operand: inner,
            } => inner.is_integral(),
            Node::Binary {
                operator,
                left,
                right,
            } => {
                operator.is_arithmetic()
                    && *operator != BinaryOperator::DivBy
                    && left.is_integral()
                    && right.is_integral()
            }
            Node::Function(call) => match call.function {
                Function::Length
                | Function::IndexOf
                | Function::Year
                | Function::Month
                | Function::Day
                | Function::Hour
                | Function::Minute
                | Function::Second => true,
                Function::Floor | Function::Ceiling => call.arguments.first().is_some_and(Node::is_integral),
                _ => false,
            },
            Node::Unary { .. } | Node::LambdaVariable(_) | Node::Lambda(_) | Node::List(_) => false,
        }
    }

    /// Total number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + match self {
            Node::Binary { left, right, .. } => left.node_count() + right.node_count(),
            Node::Unary { operand, .. } | Node::Group(operand) => operand.node_count(),
            Node::Function(call) => call.arguments.iter().map(Node::node_count).sum(),
            Node::List(items) => items.iter().map(Node::node_count).sum(),
            Node::Lambda(lambda) => lambda.body.as_deref().map_or(0, Node::node_count),
            Node::Literal(_) | Node::Property(_) | Node::LambdaVariable(_) => 0,
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, items: &[Node]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Canonical `$filter` syntax.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Binary {
                operator,
                left,
                right,
            } => write!(f, "{left} {operator} {right}"),
            Node::Unary {
                operator: UnaryOperator::Not,
                operand,
            } => write!(f, "not {operand}"),
            Node::Unary {
                operator: UnaryOperator::Negate,
                operand,
            } => write!(f, "-{operand}"),
            Node::Function(call) => {
                write!(f, "{}(", call.function)?;
                write_separated(f, &call.arguments)?;
                f.write_str(")")
            }
            Node::Literal(value) => write!(f, "{value}"),
            Node::Property(path) => write!(f, "{path}"),
            Node::LambdaVariable(name) => f.write_str(name),
            Node::Lambda(lambda) => write!(f, "{lambda}"),
            Node::List(items) => {
                f.write_str("(")?;
                write_separated(f, items)?;
                f.write_str(")")
            }
            Node::Group(inner) => write!(f, "({inner})"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::metadata::{PrimitiveType, Property};

    fn prop(name: &str) -> Node {
        Node::Property(PropertyPath {
            variable: None,
            navigation: Vec::new(),
            property: Property::new(name, PrimitiveType::String),
        })
    }

    #[test]
    fn display_escapes_string_literals() {
        let node = Node::binary(BinaryOperator::Eq, prop("name"), Node::string("it's"));
        assert_eq!(node.to_string(), "name eq 'it''s'");
    }

    #[test]
    fn display_functions_lists_and_groups() {
        let node = Node::binary(
            BinaryOperator::And,
            Node::group(Node::Function(FunctionCall {
                function: Function::Contains,
                arguments: vec![prop("name"), Node::string("a")],
            })),
            Node::binary(
                BinaryOperator::In,
                prop("code"),
                Node::List(vec![Node::string("x"), Node::string("y")]),
            ),
        );
        assert_eq!(node.to_string(), "(contains(name, 'a')) and code in ('x', 'y')");
        assert_eq!(node.node_count(), 10);
    }

    #[test]
    fn display_lambda() {
        let lambda = Node::Lambda(Lambda {
            kind: LambdaKind::Any,
            owner: None,
            path: Vec::new(),
            navigation: "flights".to_owned(),
            target: "Flight".to_owned(),
            variable: Some("f".to_owned()),
            body: Some(Box::new(Node::binary(
                BinaryOperator::Eq,
                Node::Property(PropertyPath {
                    variable: Some("f".to_owned()),
                    navigation: Vec::new(),
                    property: Property::new("origin", PrimitiveType::String),
                }),
                Node::string("lhr"),
            ))),
        });
        assert_eq!(lambda.to_string(), "flights/any(f: f/origin eq 'lhr')");
    }

    #[test]
    fn temporal_literals() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(date.to_string(), "2024-01-02");
        let time = Value::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap());
        assert_eq!(time.to_string(), "10:30:00");
        assert_eq!(Value::Null.kind_name(), "null");
    }

    #[test]
    fn ungrouped_strips_nested_groups() {
        let node = Node::group(Node::group(Node::string("x")));
        assert_eq!(node.ungrouped(), &Node::string("x"));
        assert!(node.is_self_delimiting());
        assert!(!Node::string("x").is_self_delimiting());
    }

    fn typed(name: &str, primitive: PrimitiveType) -> Node {
        Node::Property(PropertyPath {
            variable: None,
            navigation: Vec::new(),
            property: Property::new(name, primitive),
        })
    }

    fn number(text: &str) -> Node {
        Node::Literal(Value::Number(std::str::FromStr::from_str(text).unwrap()))
    }

    #[test]
    fn integral_follows_declared_types() {
        let review = typed("review", PrimitiveType::Int32);
        let rating = typed("rating", PrimitiveType::Double);
        assert!(number("3").is_integral());
        assert!(!number("3.0").is_integral());
        assert!(Node::binary(BinaryOperator::Add, review.clone(), number("1")).is_integral());
        assert!(Node::unary(UnaryOperator::Negate, Node::group(review.clone())).is_integral());
        assert!(!Node::binary(BinaryOperator::DivBy, review.clone(), number("2")).is_integral());
        assert!(!Node::binary(BinaryOperator::Mul, review.clone(), rating.clone()).is_integral());
        assert!(!rating.is_integral());
        let floor = |arg: Node| {
            Node::Function(FunctionCall {
                function: Function::Floor,
                arguments: vec![arg],
            })
        };
        assert!(floor(review).is_integral());
        assert!(!floor(rating).is_integral());
    }
}
