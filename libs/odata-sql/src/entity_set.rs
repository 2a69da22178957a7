//! `SELECT` and `COUNT` statements for one entity set.

use odata_core::error::MetadataError;
use odata_core::metadata::{EntitySet, EntityType, Model};
use odata_core::{EntitySource, Error, ODataQuery, SortDir};

use crate::buffer::{SqlBuffer, SqlStatement};
use crate::dialect::Dialect;
use crate::target::SqlTarget;

/// Statement builder for an entity set backed by a table.
#[derive(Clone, Copy, Debug)]
pub struct SqlEntitySet<'m> {
    model: &'m Model,
    entity_set: &'m EntitySet,
    entity_type: &'m EntityType,
    dialect: Dialect,
}

impl<'m> SqlEntitySet<'m> {
    /// # Errors
    /// Returns `MetadataError` when `name` or its entity type is not declared in `model`.
    pub fn new(model: &'m Model, name: &str, dialect: Dialect) -> Result<Self, Error> {
        let entity_set = model
            .entity_set(name)
            .ok_or_else(|| MetadataError::UnknownEntitySet(name.to_owned()))?;
        let entity_type = model
            .entity_type(entity_set.entity_type())
            .ok_or_else(|| MetadataError::UnknownEntityType(entity_set.entity_type().to_owned()))?;
        Ok(Self {
            model,
            entity_set,
            entity_type,
            dialect,
        })
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Rows selected by `query`, windowed by `skip`/`top`.
    ///
    /// # Errors
    /// Returns `NotImplementedError` for expressions the dialect cannot express.
    pub fn select_statement(&self, query: &ODataQuery, skip: Option<u64>, top: Option<u64>) -> Result<SqlStatement, Error> {
        let statement = self.base_select(query)?.paginate(skip, top);
        tracing::debug!(sql = %statement.sql, parameters = statement.parameters.len(), "built select statement");
        Ok(statement)
    }

    /// Number of rows matched by the `$filter` and `$search` of `query`.
    ///
    /// # Errors
    /// Returns `NotImplementedError` for expressions the dialect cannot express.
    pub fn count_statement(&self, query: &ODataQuery) -> Result<SqlStatement, Error> {
        let mut buffer = SqlBuffer::new(self.dialect);
        buffer.push("SELECT COUNT(*) AS ");
        buffer.push_identifier("count");
        buffer.push(" FROM ");
        buffer.push_identifier(self.entity_set.source_name());
        self.push_where(&mut buffer, query)?;
        Ok(buffer.finish())
    }

    /// Paged source over this set, running statements through `executor`.
    ///
    /// # Errors
    /// Returns `NotImplementedError` for expressions the dialect cannot express.
    pub fn source<X: SqlExecutor>(&self, query: &ODataQuery, executor: X) -> Result<SqlEntitySource<X>, Error> {
        Ok(SqlEntitySource {
            base: self.base_select(query)?,
            executor,
        })
    }

    fn base_select(&self, query: &ODataQuery) -> Result<BaseSelect, Error> {
        let mut buffer = SqlBuffer::new(self.dialect);
        buffer.push("SELECT ");
        self.push_projection(&mut buffer, query.selected_fields())?;
        buffer.push(" FROM ");
        buffer.push_identifier(self.entity_set.source_name());
        self.push_where(&mut buffer, query)?;

        let ordered = !query.order.is_empty();
        if ordered {
            buffer.push(" ORDER BY ");
            for (i, key) in query.order.keys().enumerate() {
                if i > 0 {
                    buffer.push(", ");
                }
                SqlTarget::filter(self.model, self.entity_set, &mut buffer)?.write(&key.expression)?;
                buffer.push(self.direction(key.dir));
            }
        }
        Ok(BaseSelect { buffer, ordered })
    }

    /// Nulls sort first ascending on every dialect.
    fn direction(&self, dir: SortDir) -> &'static str {
        match (self.dialect, dir) {
            (Dialect::Postgres, SortDir::Asc) => " ASC NULLS FIRST",
            (Dialect::Postgres, SortDir::Desc) => " DESC NULLS LAST",
            (_, SortDir::Asc) => " ASC",
            (_, SortDir::Desc) => " DESC",
        }
    }

    fn push_projection(&self, buffer: &mut SqlBuffer, select: Option<&[String]>) -> Result<(), Error> {
        let properties = match select {
            None => self.entity_type.declared_properties().collect::<Vec<_>>(),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.entity_type
                        .property(name)
                        .ok_or_else(|| Error::InvalidQueryOption {
                            option: "$select".to_owned(),
                            message: format!("unknown property '{name}'"),
                        })
                })
                .collect::<Result<Vec<_>, Error>>()?,
        };
        for (i, property) in properties.iter().enumerate() {
            if i > 0 {
                buffer.push(", ");
            }
            buffer.push_column(self.entity_set.source_name(), property.source_name());
            if property.source_name() != property.name() {
                buffer.push(" AS ");
                buffer.push_identifier(property.name());
            }
        }
        Ok(())
    }

    fn push_where(&self, buffer: &mut SqlBuffer, query: &ODataQuery) -> Result<(), Error> {
        let mut keyword = " WHERE ";
        if let Some(filter) = query.filter() {
            buffer.push(keyword);
            SqlTarget::filter(self.model, self.entity_set, buffer)?.write(filter)?;
            keyword = " AND ";
        }
        if let Some(search) = query.search() {
            buffer.push(keyword);
            SqlTarget::search(self.model, self.entity_set, buffer)?.write(search)?;
        }
        Ok(())
    }
}

/// `SELECT ... WHERE ... ORDER BY ...` awaiting its window.
#[derive(Clone, Debug)]
struct BaseSelect {
    buffer: SqlBuffer,
    ordered: bool,
}

impl BaseSelect {
    fn paginate(&self, skip: Option<u64>, top: Option<u64>) -> SqlStatement {
        let mut buffer = self.buffer.clone();
        let dialect = buffer.dialect();
        if dialect == Dialect::SqlServer {
            if skip.is_some() || top.is_some() {
                if !self.ordered {
                    buffer.push(" ORDER BY (SELECT NULL)");
                }
                buffer.push(" OFFSET ");
                buffer.bind(row_count(skip.unwrap_or(0)));
                buffer.push(" ROWS");
                if let Some(top) = top {
                    buffer.push(" FETCH NEXT ");
                    buffer.bind(row_count(top));
                    buffer.push(" ROWS ONLY");
                }
            }
            return buffer.finish();
        }
        match (top, skip) {
            (Some(top), _) => {
                buffer.push(" LIMIT ");
                buffer.bind(row_count(top));
            }
            (None, Some(_)) => match dialect {
                Dialect::Sqlite => buffer.push(" LIMIT -1"),
                Dialect::MySql => buffer.push(" LIMIT 18446744073709551615"),
                Dialect::Postgres | Dialect::SqlServer => {}
            },
            (None, None) => {}
        }
        if let Some(skip) = skip {
            buffer.push(" OFFSET ");
            buffer.bind(row_count(skip));
        }
        buffer.finish()
    }
}

fn row_count(n: u64) -> sea_orm::Value {
    sea_orm::Value::BigInt(Some(i64::try_from(n).unwrap_or(i64::MAX)))
}

/// Runs statements against a database.
pub trait SqlExecutor {
    type Row;
    type Error;

    /// # Errors
    /// Backend failures, passed through the pager unchanged.
    fn query(&mut self, statement: &SqlStatement) -> Result<Vec<Self::Row>, Self::Error>;
}

/// [`EntitySource`] that fetches windows of a prepared `SELECT`.
#[derive(Debug)]
pub struct SqlEntitySource<X> {
    base: BaseSelect,
    executor: X,
}

impl<X: SqlExecutor> EntitySource for SqlEntitySource<X> {
    type Record = X::Row;
    type Error = X::Error;

    fn fetch(&mut self, skip: u64, top: u64) -> Result<Vec<X::Row>, X::Error> {
        let statement = self.base.paginate(Some(skip), Some(top));
        tracing::debug!(sql = %statement.sql, skip, top, "querying entity set page");
        self.executor.query(&statement)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use odata_core::metadata::{PrimitiveType, Property};
    use odata_core::{EntitySetPager, ODataLimits};

    fn model() -> Model {
        let item = EntityType::new("Item")
            .with_key(Property::new("id", PrimitiveType::Int64))
            .unwrap();
        Model::builder()
            .entity_type(item)
            .unwrap()
            .entity_set(EntitySet::new("items", "Item"))
            .unwrap()
            .build()
            .unwrap()
    }

    /// Answers with ids `0..rows` inside the bound window and keeps every statement.
    struct Recorder {
        rows: i64,
        statements: Vec<SqlStatement>,
    }

    impl SqlExecutor for &mut Recorder {
        type Row = i64;
        type Error = String;

        fn query(&mut self, statement: &SqlStatement) -> Result<Vec<i64>, String> {
            self.statements.push(statement.clone());
            let [.., sea_orm::Value::BigInt(Some(top)), sea_orm::Value::BigInt(Some(skip))] =
                statement.parameters.as_slice()
            else {
                return Err("statement without a window".to_owned());
            };
            Ok((*skip..self.rows).take(usize::try_from(*top).unwrap()).collect())
        }
    }

    #[test]
    #[tracing_test::traced_test]
    fn source_binds_each_window() {
        let model = model();
        let query = ODataQuery::parse(
            &model,
            model.entity_type("Item").unwrap(),
            [("$top", "3")],
            &ODataLimits::default(),
        )
        .unwrap();
        let mut recorder = Recorder {
            rows: 10,
            statements: Vec::new(),
        };
        let source = SqlEntitySet::new(&model, "items", Dialect::Sqlite)
            .unwrap()
            .source(&query, &mut recorder)
            .unwrap();
        let ids = EntitySetPager::new(source, query.skip, query.top, 2)
            .collect_records()
            .unwrap();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(recorder.statements.len(), 2);
        assert_eq!(
            recorder.statements[1].sql,
            r#"SELECT "items"."id" FROM "items" LIMIT ? OFFSET ?"#
        );
        assert_eq!(
            recorder.statements[1].parameters,
            vec![sea_orm::Value::BigInt(Some(1)), sea_orm::Value::BigInt(Some(2))]
        );
        assert!(logs_contain("querying entity set page"));
    }

    #[test]
    fn postgres_orders_nulls_like_the_other_dialects() {
        let model = model();
        let set = SqlEntitySet::new(&model, "items", Dialect::Postgres).unwrap();
        assert_eq!(set.direction(SortDir::Asc), " ASC NULLS FIRST");
        let set = SqlEntitySet::new(&model, "items", Dialect::MySql).unwrap();
        assert_eq!(set.direction(SortDir::Desc), " DESC");
    }
}
