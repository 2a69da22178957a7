//! Error types shared by the lexer, the parsers, the metadata model and the query targets.

use thiserror::Error;

/// Tokenization failure: the input at `position` did not match any token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lexer error at position {position}: expected {expected}")]
pub struct LexerError {
    /// Byte offset into the query text.
    pub position: usize,
    pub expected: String,
}

impl LexerError {
    pub(crate) fn new(position: usize, expected: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
        }
    }
}

/// Grammar violation detected while building the expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parser error at position {position}: {message}")]
pub struct ParserError {
    /// Byte offset of the offending token.
    pub position: usize,
    pub message: String,
}

impl ParserError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// A query target has no translation for a construct it was handed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not implemented: {0}")]
pub struct NotImplementedError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("entity type '{0}' is already registered")]
    DuplicateEntityType(String),

    #[error("entity set '{0}' is already registered")]
    DuplicateEntitySet(String),

    #[error("property '{property}' is already declared on '{entity_type}'")]
    DuplicateProperty {
        entity_type: String,
        property: String,
    },

    #[error("entity type '{0}' must have a key before navigation properties are added")]
    MissingKey(String),

    #[error("unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("unknown entity set '{0}'")]
    UnknownEntitySet(String),

    #[error("navigation '{navigation}': unknown property '{property}' on '{entity_type}'")]
    UnknownConstraintProperty {
        navigation: String,
        entity_type: String,
        property: String,
    },

    #[error("navigation '{navigation}': partner '{partner}' does not point back to '{entity_type}'")]
    InvalidPartner {
        navigation: String,
        partner: String,
        entity_type: String,
    },
}

/// Unified error type for query parsing, validation and translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    NotImplemented(#[from] NotImplementedError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("invalid $top: {0} exceeds the configured maximum")]
    InvalidLimit(u64),

    #[error("invalid $filter: {0}")]
    InvalidFilter(String),

    #[error("unsupported $orderby: {0}")]
    InvalidOrderBy(String),

    #[error("invalid query option {option}: {message}")]
    InvalidQueryOption { option: String, message: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
