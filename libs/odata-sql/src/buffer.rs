use sea_orm::{DbBackend, Statement};

use crate::dialect::Dialect;

/// SQL text with its bound parameters, in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub parameters: Vec<sea_orm::Value>,
}

impl SqlStatement {
    /// Convert into a sea-orm statement for `backend`.
    #[must_use]
    pub fn to_statement(&self, backend: DbBackend) -> Statement {
        Statement::from_sql_and_values(backend, self.sql.clone(), self.parameters.clone())
    }
}

/// Append-only SQL writer that numbers placeholders for its dialect.
#[derive(Clone, Debug)]
pub struct SqlBuffer {
    dialect: Dialect,
    sql: String,
    parameters: Vec<sea_orm::Value>,
}

impl SqlBuffer {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn parameters(&self) -> &[sea_orm::Value] {
        &self.parameters
    }

    pub fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub fn push_identifier(&mut self, name: &str) {
        let quoted = self.dialect.quote_identifier(name);
        self.sql.push_str(&quoted);
    }

    /// `qualifier.column`, both quoted.
    pub fn push_column(&mut self, qualifier: &str, column: &str) {
        self.push_identifier(qualifier);
        self.sql.push('.');
        self.push_identifier(column);
    }

    /// Write a placeholder and record `value` for it.
    pub fn bind(&mut self, value: sea_orm::Value) {
        self.parameters.push(value);
        let placeholder = self.dialect.placeholder(self.parameters.len());
        self.sql.push_str(&placeholder);
    }

    #[must_use]
    pub fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            parameters: self.parameters,
        }
    }
}
