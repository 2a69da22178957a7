//! Parsed system query options of one request.

use std::collections::HashSet;
use std::fmt;

use crate::ast::Node;
use crate::limits::ODataLimits;
use crate::metadata::{EntityType, Model};
use crate::parser::{parse_expand, parse_search, parse_select, ExpandItem, FilterParser, Select};
use crate::Error;

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderKey {
    pub expression: Node,
    pub dir: SortDir,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct ODataOrderBy(pub Vec<OrderKey>);

impl ODataOrderBy {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &OrderKey> {
        self.0.iter()
    }
}

// Display trait for human-readable orderby representation
impl fmt::Display for ODataOrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(none)");
        }

        let formatted: Vec<String> = self
            .0
            .iter()
            .map(|key| {
                let dir_str = match key.dir {
                    SortDir::Asc => "asc",
                    SortDir::Desc => "desc",
                };
                format!("{} {}", key.expression, dir_str)
            })
            .collect();

        write!(f, "{}", formatted.join(", "))
    }
}

// The unified ODataQuery struct as single source of truth
#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct ODataQuery {
    pub filter: Option<Box<Node>>,
    pub search: Option<Box<Node>>,
    pub order: ODataOrderBy,
    pub top: Option<u64>,
    pub skip: Option<u64>,
    /// `None` selects every declared property.
    pub select: Option<Vec<String>>,
    pub expand: Vec<ExpandItem>,
    pub count: bool,
}

impl ODataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, expr: Node) -> Self {
        self.filter = Some(Box::new(expr));
        self
    }

    pub fn with_search(mut self, expr: Node) -> Self {
        self.search = Some(Box::new(expr));
        self
    }

    pub fn with_order(mut self, order: ODataOrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn with_top(mut self, top: u64) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_select(mut self, fields: Vec<String>) -> Self {
        self.select = Some(fields);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    #[must_use]
    pub fn filter(&self) -> Option<&Node> {
        self.filter.as_deref()
    }

    #[must_use]
    pub fn search(&self) -> Option<&Node> {
        self.search.as_deref()
    }

    #[must_use]
    pub fn selected_fields(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Parse the system query options of a request against `entity_type`.
    ///
    /// Options not starting with `$` are custom options and are ignored.
    ///
    /// # Errors
    /// Returns the first lexer, parser or limit violation, or
    /// `Error::InvalidQueryOption` for unknown or repeated system options.
    pub fn parse<'a, I>(
        model: &Model,
        entity_type: &EntityType,
        options: I,
        limits: &ODataLimits,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::parse_at_depth(model, entity_type, options, limits, 0)
    }

    pub(crate) fn parse_at_depth<'a, I>(
        model: &Model,
        entity_type: &EntityType,
        options: I,
        limits: &ODataLimits,
        depth: usize,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = Self::new();
        let mut seen = HashSet::new();
        let parser = FilterParser::new(model, entity_type);

        for (key, value) in options {
            if !key.starts_with('$') {
                continue;
            }
            if !seen.insert(key) {
                return Err(invalid_option(key, "specified more than once"));
            }
            match key {
                "$filter" => {
                    limits.validate_filter(value)?;
                    query.filter = Some(Box::new(parser.parse(value)?));
                }
                "$search" => {
                    limits.validate_filter(value)?;
                    query.search = Some(Box::new(parse_search(value)?));
                }
                "$orderby" => {
                    let order = parser.parse_orderby(value)?;
                    limits.validate_orderby_count(order.0.len())?;
                    query.order = order;
                }
                "$top" => {
                    let top = parse_count(key, value)?;
                    limits.validate_top(top)?;
                    query.top = Some(top);
                }
                "$skip" => query.skip = Some(parse_count(key, value)?),
                "$count" => {
                    query.count = match value {
                        "true" => true,
                        "false" => false,
                        _ => return Err(invalid_option(key, "expected true or false")),
                    };
                }
                "$select" => {
                    query.select = match parse_select(value, entity_type)? {
                        Select::All => None,
                        Select::Properties(names) => Some(names),
                    };
                }
                "$expand" => {
                    limits.validate_expand_depth(depth + 1)?;
                    query.expand = parse_expand(value, model, entity_type, limits, depth + 1)?;
                }
                _ => return Err(invalid_option(key, "unsupported system query option")),
            }
        }
        tracing::debug!(
            filter = query.filter.is_some(),
            search = query.search.is_some(),
            order = %query.order,
            top = ?query.top,
            skip = ?query.skip,
            expand = query.expand.len(),
            "parsed query options"
        );
        Ok(query)
    }
}

fn invalid_option(option: &str, message: &str) -> Error {
    Error::InvalidQueryOption {
        option: option.to_owned(),
        message: message.to_owned(),
    }
}

fn parse_count(option: &str, value: &str) -> Result<u64, Error> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid_option(option, "expected a non-negative integer"))
}
