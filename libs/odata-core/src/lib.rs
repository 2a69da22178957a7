#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod ast;
pub mod error;
pub mod event;
pub mod lexer;
pub mod limits;
pub mod loopback;
pub mod metadata;
pub mod pagination;
pub mod parser;
pub mod query;
pub mod registry;

pub use ast::{FunctionCall, Lambda, LambdaKind, Node, PropertyPath, Value};
pub use error::{Error, LexerError, MetadataError, NotImplementedError, ParserError, Result};
pub use event::{Emit, Event, ExpressionListener};
pub use limits::ODataLimits;
pub use loopback::{InMemoryEntitySet, LoopbackExpression, LoopbackTarget};
pub use metadata::{EntitySet, EntityType, Model, NavigationProperty, PrimitiveType, Property};
pub use pagination::{EntitySetPager, EntitySource, PagerState};
pub use parser::{parse_search, FilterParser, SearchParser};
pub use query::{ODataOrderBy, ODataQuery, OrderKey, SortDir};
pub use registry::{BinaryOperator, Function, UnaryOperator};
