#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! SQLite results checked against the in-memory evaluator on the same data.

mod common;

use common::{SCHEMA, loopback_ids, model, query};
use odata_core::{EntitySetPager, Error};
use odata_sql::{Dialect, SqlEntitySet, SqlExecutor, SqlStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr};
use tempfile::TempDir;
use tokio::runtime::Runtime;

struct Database {
    connection: DatabaseConnection,
    runtime: Runtime,
    _dir: TempDir,
}

impl Database {
    fn open() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("odata.db").display());
        let runtime = Runtime::new().unwrap();
        let connection = runtime.block_on(sea_orm::Database::connect(url)).unwrap();
        for statement in SCHEMA {
            runtime.block_on(connection.execute_unprepared(statement)).unwrap();
        }
        Self {
            connection,
            runtime,
            _dir: dir,
        }
    }

    fn ids(&self, statement: &SqlStatement) -> Vec<i64> {
        Executor { database: self }.query(statement).unwrap()
    }

    fn select_ids(&self, set: &str, options: &[(&str, &str)]) -> Vec<i64> {
        let model = model();
        let query = query(&model, set, options);
        let statement = SqlEntitySet::new(&model, set, Dialect::Sqlite)
            .unwrap()
            .select_statement(&query, query.skip, query.top)
            .unwrap();
        self.ids(&statement)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let connection = self.connection.clone();
        let _ = self.runtime.block_on(connection.close());
    }
}

/// Runs statements on the test database, returning the `id` column.
struct Executor<'a> {
    database: &'a Database,
}

impl SqlExecutor for Executor<'_> {
    type Row = i64;
    type Error = DbErr;

    fn query(&mut self, statement: &SqlStatement) -> Result<Vec<i64>, DbErr> {
        let rows = self.database.runtime.block_on(
            self.database
                .connection
                .query_all(statement.to_statement(DbBackend::Sqlite)),
        )?;
        rows.iter().map(|row| row.try_get::<i64>("", "id")).collect()
    }
}

fn assert_agree(db: &Database, set: &str, options: &[(&str, &str)]) {
    let expected = loopback_ids(set, options);
    assert_eq!(db.select_ids(set, options), expected, "options: {options:?}");
}

#[test]
fn filters_agree_with_loopback() {
    let db = Database::open();
    let filters = [
        "rating gt 4",
        "not (rating gt 4)",
        "rating le 4 or review eq 5",
        "rating eq null",
        "review ne null",
        "null eq review",
        "code in ('LHR', 'JFK')",
        "review in (0, 3)",
        "startswith(name, 'O''Hare')",
        "endswith(code, 'R')",
        "startswith(name, 'h')",
        "endswith(code, 'r')",
        "contains(name, 'HARE')",
        "contains(name, 'Hare')",
        "startswith(name, '')",
        "endswith(name, '')",
        "endswith(code, 'XLHR')",
        "contains(name, code)",
        "contains(tolower(name), 'ck')",
        "length(name) eq 6",
        "indexof(code, 'G') eq 1",
        "substring(code, 1, 1) eq 'H'",
        "substring(name, 3) eq 'wick'",
        "concat(code, '-x') eq 'SIN-x'",
        "toupper(name) eq 'CHANGI'",
        "review add 1 eq 2",
        "review sub 1 eq 0",
        "review mul 2 eq 6",
        "review div 2 eq 1",
        "review mod 2 eq 1",
        "rating div 3 eq 1",
        "rating div 2 eq 2.25",
        "review div 2.0 eq 1.5",
        "review divby 2 eq 1.5",
        "-review lt -2",
        "year(opened) lt 1950",
        "month(opened) eq 7",
        "day(opened) eq 9",
        "opened gt 1950-01-01",
        "round(rating) eq 5",
        "floor(rating) eq 4",
        "ceiling(rating) eq 5",
    ];
    for filter in filters {
        assert_agree(&db, "airports", &[("$filter", filter), ("$orderby", "id")]);
    }
}

#[test]
fn string_matching_respects_case() {
    let db = Database::open();
    let filters = [
        ("startswith(name, 'h')", vec![]),
        ("startswith(name, 'H')", vec![1]),
        ("endswith(code, 'r')", vec![]),
        ("contains(name, 'hare')", vec![]),
        ("contains(name, 'Hare')", vec![4]),
    ];
    for (filter, ids) in filters {
        let options = [("$filter", filter), ("$orderby", "id")];
        assert_eq!(db.select_ids("airports", &options), ids, "filter: {filter}");
        assert_eq!(loopback_ids("airports", &options), ids, "filter: {filter}");
    }
}

#[test]
fn lambdas_agree_with_loopback() {
    let db = Database::open();
    let filters = [
        ("flights/any(f: f/destination eq 'CDG')", vec![1, 2]),
        ("flights/all(f: f/duration gt 100)", vec![3, 4, 5]),
        ("flights/any()", vec![1, 2, 3]),
        ("not flights/any()", vec![4, 5]),
        ("flights/any(f: f/destination eq 'CDG' and f/duration lt 78)", vec![1]),
    ];
    for (filter, ids) in filters {
        let options = [("$filter", filter), ("$orderby", "id")];
        assert_eq!(db.select_ids("airports", &options), ids, "filter: {filter}");
        assert_agree(&db, "airports", &options);
    }
}

#[test]
fn navigation_agrees_with_loopback() {
    let db = Database::open();
    let filters = [
        "origin_airport/rating gt 4",
        "origin_airport/review eq null",
        "duration div 60 ge 6",
        "destination eq 'CDG' and origin_airport/code ne 'LHR'",
    ];
    for filter in filters {
        assert_agree(&db, "flights", &[("$filter", filter), ("$orderby", "id")]);
    }
}

#[test]
fn search_agrees_with_loopback() {
    let db = Database::open();
    for search in ["lhr", "heath OR changi", "NOT gatwick", "\"o'hare\"", "a i"] {
        assert_agree(&db, "airports", &[("$search", search), ("$orderby", "id")]);
    }
    assert_agree(
        &db,
        "airports",
        &[("$search", "a"), ("$filter", "rating ge 4"), ("$orderby", "id")],
    );
}

#[test]
fn ordering_agrees_with_loopback() {
    let db = Database::open();
    assert_eq!(db.select_ids("airports", &[("$orderby", "rating")]), vec![3, 2, 4, 1, 5]);
    for order in ["rating", "rating desc", "name", "opened desc, id"] {
        assert_agree(&db, "airports", &[("$orderby", order)]);
    }
    assert_agree(
        &db,
        "airports",
        &[("$orderby", "review mod 2, id desc"), ("$filter", "review ne null")],
    );
    assert_agree(&db, "airports", &[("$orderby", "name"), ("$skip", "1"), ("$top", "2")]);
}

#[test]
fn count_matches_loopback() {
    let db = Database::open();
    let model = model();
    let options = [("$filter", "rating ne null"), ("$top", "1")];
    let query = query(&model, "airports", &options);
    let statement = SqlEntitySet::new(&model, "airports", Dialect::Sqlite)
        .unwrap()
        .count_statement(&query)
        .unwrap();
    let row = db
        .runtime
        .block_on(
            db.connection
                .query_one(statement.to_statement(DbBackend::Sqlite)),
        )
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("", "count").unwrap(), 4);
    assert_eq!(loopback_ids("airports", &[("$filter", "rating ne null")]).len(), 4);
}

#[test]
fn renamed_columns_are_read_by_property_name() {
    let db = Database::open();
    let model = model();
    let query = query(&model, "flights", &[("$select", "id,duration"), ("$orderby", "duration")]);
    let statement = SqlEntitySet::new(&model, "flights", Dialect::Sqlite)
        .unwrap()
        .select_statement(&query, None, None)
        .unwrap();
    let rows = db
        .runtime
        .block_on(db.connection.query_all(statement.to_statement(DbBackend::Sqlite)))
        .unwrap();
    let durations: Vec<i64> = rows
        .iter()
        .map(|row| row.try_get::<i64>("", "duration").unwrap())
        .collect();
    assert_eq!(durations, vec![75, 80, 400, 420]);
}

#[test]
fn pager_reads_sql_in_windows() {
    let db = Database::open();
    let model = model();
    let query = query(&model, "airports", &[("$orderby", "name"), ("$skip", "1"), ("$top", "3")]);
    let source = SqlEntitySet::new(&model, "airports", Dialect::Sqlite)
        .unwrap()
        .source(&query, Executor { database: &db })
        .unwrap();
    let ids = EntitySetPager::new(source, query.skip, query.top, 2)
        .collect_records()
        .unwrap();
    assert_eq!(ids, vec![2, 1, 3]);
}

#[test]
fn unsupported_functions_fail_before_reaching_the_database() {
    let model = model();
    let query = query(&model, "airports", &[("$filter", "fractionalseconds(opened) eq 0")]);
    let err = SqlEntitySet::new(&model, "airports", Dialect::Sqlite)
        .unwrap()
        .select_statement(&query, None, None)
        .unwrap_err();
    assert!(matches!(err, Error::NotImplemented(e) if e.0.contains("fractionalseconds")));
}
