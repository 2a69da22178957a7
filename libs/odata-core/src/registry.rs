//! Static operator and function tables consulted by the parsers.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Grammar data for one operator symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperatorInfo {
    pub symbol: &'static str,
    /// Higher binds tighter.
    pub precedence: u8,
    pub associativity: Associativity,
    pub arity: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    Ne,
    In,
    Gt,
    Ge,
    Lt,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    DivBy,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
}

const fn binary(symbol: &'static str, precedence: u8) -> OperatorInfo {
    OperatorInfo {
        symbol,
        precedence,
        associativity: Associativity::Left,
        arity: 2,
    }
}

const fn prefix(symbol: &'static str, precedence: u8) -> OperatorInfo {
    OperatorInfo {
        symbol,
        precedence,
        associativity: Associativity::Right,
        arity: 1,
    }
}

/// `$filter` / `$orderby` binary operators.
pub const FILTER_BINARY_OPERATORS: &[(BinaryOperator, OperatorInfo)] = &[
    (BinaryOperator::Or, binary("or", 1)),
    (BinaryOperator::And, binary("and", 2)),
    (BinaryOperator::Eq, binary("eq", 3)),
    (BinaryOperator::Ne, binary("ne", 3)),
    (BinaryOperator::In, binary("in", 3)),
    (BinaryOperator::Gt, binary("gt", 4)),
    (BinaryOperator::Ge, binary("ge", 4)),
    (BinaryOperator::Lt, binary("lt", 4)),
    (BinaryOperator::Le, binary("le", 4)),
    (BinaryOperator::Add, binary("add", 5)),
    (BinaryOperator::Sub, binary("sub", 5)),
    (BinaryOperator::Mul, binary("mul", 6)),
    (BinaryOperator::Div, binary("div", 6)),
    (BinaryOperator::DivBy, binary("divby", 6)),
    (BinaryOperator::Mod, binary("mod", 6)),
];

/// `$filter` / `$orderby` prefix operators. `-` is the negation symbol.
pub const FILTER_UNARY_OPERATORS: &[(UnaryOperator, OperatorInfo)] = &[
    (UnaryOperator::Not, prefix("not", 7)),
    (UnaryOperator::Negate, prefix("-", 7)),
];

/// `$search` operators. Adjacent terms without an operator are joined with `AND` precedence.
pub const SEARCH_BINARY_OPERATORS: &[(BinaryOperator, OperatorInfo)] = &[
    (BinaryOperator::Or, binary("OR", 1)),
    (BinaryOperator::And, binary("AND", 2)),
];

pub const SEARCH_UNARY_OPERATORS: &[(UnaryOperator, OperatorInfo)] = &[(UnaryOperator::Not, prefix("NOT", 3))];

fn lookup<T: Copy + PartialEq>(table: &[(T, OperatorInfo)], key: T) -> Option<OperatorInfo> {
    table.iter().find(|(op, _)| *op == key).map(|(_, info)| *info)
}

impl BinaryOperator {
    /// Resolve a `$filter` keyword such as `eq` or `divby`.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        FILTER_BINARY_OPERATORS
            .iter()
            .find(|(_, info)| info.symbol == symbol)
            .map(|(op, _)| *op)
    }

    /// Resolve a `$search` keyword (`AND`, `OR`).
    #[must_use]
    pub fn from_search_symbol(symbol: &str) -> Option<Self> {
        SEARCH_BINARY_OPERATORS
            .iter()
            .find(|(_, info)| info.symbol == symbol)
            .map(|(op, _)| *op)
    }

    #[must_use]
    pub fn info(self) -> OperatorInfo {
        // every variant has a filter entry
        lookup(FILTER_BINARY_OPERATORS, self).unwrap_or(binary("?", 0))
    }

    #[must_use]
    pub fn search_info(self) -> Option<OperatorInfo> {
        lookup(SEARCH_BINARY_OPERATORS, self)
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.info().symbol
    }

    /// Operators producing a boolean from two booleans.
    #[must_use]
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::DivBy | Self::Mod)
    }
}

impl UnaryOperator {
    #[must_use]
    pub fn info(self) -> OperatorInfo {
        lookup(FILTER_UNARY_OPERATORS, self).unwrap_or(prefix("?", 0))
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.info().symbol
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Semantic grouping of canonical functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionCategory {
    String,
    /// String-and-collection functions (`contains`, `length`, `concat`, ...).
    Collection,
    DateTime,
    Arithmetic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Contains,
    StartsWith,
    EndsWith,
    Length,
    IndexOf,
    Substring,
    Concat,
    ToLower,
    ToUpper,
    Trim,
    MatchesPattern,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    FractionalSeconds,
    Date,
    Time,
    Now,
    MaxDateTime,
    MinDateTime,
    Round,
    Floor,
    Ceiling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub category: FunctionCategory,
}

const fn function(
    name: &'static str,
    min_args: usize,
    max_args: usize,
    category: FunctionCategory,
) -> FunctionInfo {
    FunctionInfo {
        name,
        min_args,
        max_args,
        category,
    }
}

pub const FUNCTIONS: &[(Function, FunctionInfo)] = &[
    (Function::Contains, function("contains", 2, 2, FunctionCategory::Collection)),
    (Function::StartsWith, function("startswith", 2, 2, FunctionCategory::Collection)),
    (Function::EndsWith, function("endswith", 2, 2, FunctionCategory::Collection)),
    (Function::Length, function("length", 1, 1, FunctionCategory::Collection)),
    (Function::IndexOf, function("indexof", 2, 2, FunctionCategory::Collection)),
    (Function::Substring, function("substring", 2, 3, FunctionCategory::Collection)),
    (Function::Concat, function("concat", 2, 2, FunctionCategory::Collection)),
    (Function::ToLower, function("tolower", 1, 1, FunctionCategory::String)),
    (Function::ToUpper, function("toupper", 1, 1, FunctionCategory::String)),
    (Function::Trim, function("trim", 1, 1, FunctionCategory::String)),
    (Function::MatchesPattern, function("matchesPattern", 2, 2, FunctionCategory::String)),
    (Function::Year, function("year", 1, 1, FunctionCategory::DateTime)),
    (Function::Month, function("month", 1, 1, FunctionCategory::DateTime)),
    (Function::Day, function("day", 1, 1, FunctionCategory::DateTime)),
    (Function::Hour, function("hour", 1, 1, FunctionCategory::DateTime)),
    (Function::Minute, function("minute", 1, 1, FunctionCategory::DateTime)),
    (Function::Second, function("second", 1, 1, FunctionCategory::DateTime)),
    (Function::FractionalSeconds, function("fractionalseconds", 1, 1, FunctionCategory::DateTime)),
    (Function::Date, function("date", 1, 1, FunctionCategory::DateTime)),
    (Function::Time, function("time", 1, 1, FunctionCategory::DateTime)),
    (Function::Now, function("now", 0, 0, FunctionCategory::DateTime)),
    (Function::MaxDateTime, function("maxdatetime", 0, 0, FunctionCategory::DateTime)),
    (Function::MinDateTime, function("mindatetime", 0, 0, FunctionCategory::DateTime)),
    (Function::Round, function("round", 1, 1, FunctionCategory::Arithmetic)),
    (Function::Floor, function("floor", 1, 1, FunctionCategory::Arithmetic)),
    (Function::Ceiling, function("ceiling", 1, 1, FunctionCategory::Arithmetic)),
];

impl Function {
    /// Function names are case-sensitive, as in the OData ABNF.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        FUNCTIONS
            .iter()
            .find(|(_, info)| info.name == name)
            .map(|(f, _)| *f)
    }

    #[must_use]
    pub fn info(self) -> FunctionInfo {
        lookup_function(self)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[must_use]
    pub fn category(self) -> FunctionCategory {
        self.info().category
    }

    #[must_use]
    pub fn accepts(self, argc: usize) -> bool {
        let info = self.info();
        (info.min_args..=info.max_args).contains(&argc)
    }
}

fn lookup_function(f: Function) -> FunctionInfo {
    FUNCTIONS
        .iter()
        .find(|(candidate, _)| *candidate == f)
        .map_or(function("?", 0, 0, FunctionCategory::String), |(_, info)| *info)
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
