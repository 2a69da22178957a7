use std::cmp::Ordering;

use super::eval::sort_order;
use super::LoopbackExpression;
use crate::ast::Value;
use crate::metadata::EntityType;
use crate::pagination::EntitySource;
use crate::query::{ODataQuery, SortDir};
use crate::Error;

/// Entity set over JSON records held in memory.
///
/// Applies `$filter`, `$search`, `$orderby` and `$select` of one query; paging is
/// driven through [`EntitySource::fetch`].
#[derive(Debug)]
pub struct InMemoryEntitySet {
    records: Vec<serde_json::Value>,
    filter: Option<LoopbackExpression>,
    search: Option<LoopbackExpression>,
    order: Vec<(LoopbackExpression, SortDir)>,
    select: Option<Vec<String>>,
}

impl InMemoryEntitySet {
    /// # Errors
    /// Returns `NotImplementedError` when an expression of `query` cannot be evaluated
    /// in memory.
    pub fn new(entity_type: &EntityType, records: Vec<serde_json::Value>, query: &ODataQuery) -> Result<Self, Error> {
        let filter = query.filter().map(LoopbackExpression::filter).transpose()?;
        let search = query
            .search()
            .map(|node| LoopbackExpression::search(node, entity_type))
            .transpose()?;
        let order = query
            .order
            .keys()
            .map(|key| Ok((LoopbackExpression::filter(&key.expression)?, key.dir)))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self {
            records,
            filter,
            search,
            order,
            select: query.select.clone(),
        })
    }

    /// Number of records accepted by the filter and search, ignoring paging.
    ///
    /// # Errors
    /// Returns evaluation errors such as `Error::TypeMismatch`.
    pub fn count(&self) -> Result<u64, Error> {
        Ok(u64::try_from(self.matching()?.len()).unwrap_or(u64::MAX))
    }

    fn accepts(&self, record: &serde_json::Value) -> Result<bool, Error> {
        for expression in [&self.filter, &self.search].into_iter().flatten() {
            if !expression.accepts(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matching(&self) -> Result<Vec<&serde_json::Value>, Error> {
        let mut rows = Vec::new();
        for record in &self.records {
            if self.accepts(record)? {
                rows.push(record);
            }
        }
        if self.order.is_empty() {
            return Ok(rows);
        }

        let mut keyed = rows
            .into_iter()
            .map(|record| {
                let keys = self
                    .order
                    .iter()
                    .map(|(expression, _)| expression.evaluate(record))
                    .collect::<Result<Vec<Value>, Error>>()?;
                Ok((keys, record))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        keyed.sort_by(|(a, _), (b, _)| self.compare_keys(a, b));
        Ok(keyed.into_iter().map(|(_, record)| record).collect())
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for ((left, right), (_, dir)) in a.iter().zip(b).zip(&self.order) {
            let ordering = match dir {
                SortDir::Asc => sort_order(left, right),
                SortDir::Desc => sort_order(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn project(&self, record: &serde_json::Value) -> serde_json::Value {
        match (&self.select, record) {
            (Some(fields), serde_json::Value::Object(map)) => serde_json::Value::Object(
                map.iter()
                    .filter(|(name, _)| fields.iter().any(|f| f == *name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            ),
            _ => record.clone(),
        }
    }
}

impl EntitySource for InMemoryEntitySet {
    type Record = serde_json::Value;
    type Error = Error;

    fn fetch(&mut self, skip: u64, top: u64) -> Result<Vec<Self::Record>, Self::Error> {
        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let top = usize::try_from(top).unwrap_or(usize::MAX);
        Ok(self
            .matching()?
            .into_iter()
            .skip(skip)
            .take(top)
            .map(|record| self.project(record))
            .collect())
    }
}
