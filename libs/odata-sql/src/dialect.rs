//! SQL dialects: identifier quoting, placeholders and function templates.
//!
//! Function calls are rendered from templates in which `{n}` stands for the n-th
//! argument. Dialect overrides are consulted before the ANSI defaults.

use odata_core::registry::Function;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "pgsql", alias = "postgresql")]
    Postgres,
    SqlServer,
}

impl Dialect {
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", name.replace('`', "``")),
            Self::SqlServer => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Placeholder for the `index`-th (1-based) bound parameter.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            _ => "?".to_owned(),
        }
    }

    /// Operator used for `LIKE` in `$search`.
    #[must_use]
    pub fn search_like(self) -> &'static str {
        match self {
            Self::Postgres => " ILIKE ",
            _ => " LIKE ",
        }
    }

    /// Case-sensitive `LIKE` for `contains`, `startswith` and `endswith`.
    #[must_use]
    pub fn like_operator(self) -> &'static str {
        match self {
            Self::MySql => " LIKE BINARY ",
            Self::SqlServer => " COLLATE Latin1_General_CS_AS LIKE ",
            Self::Sqlite | Self::Postgres => " LIKE ",
        }
    }

    /// Escape clause paired with patterns built by `like_escape`.
    #[must_use]
    pub fn like_escape_clause(self) -> &'static str {
        match self {
            Self::MySql => " ESCAPE '\\\\'",
            _ => " ESCAPE '\\'",
        }
    }

    /// Spelling of integer `div`; decimal division is always `/`.
    #[must_use]
    pub fn integer_division(self) -> &'static str {
        match self {
            Self::MySql => " DIV ",
            _ => " / ",
        }
    }

    /// Template for `function` called with `argc` arguments, `None` when unsupported.
    #[must_use]
    pub fn function_template(self, function: Function, argc: usize) -> Option<&'static str> {
        let template = self.override_template(function, argc);
        if template.is_some() {
            return template;
        }
        ansi_template(function, argc)
    }

    fn override_template(self, function: Function, argc: usize) -> Option<&'static str> {
        match self {
            Self::Sqlite => sqlite_template(function, argc),
            Self::MySql => mysql_template(function, argc),
            Self::Postgres => postgres_template(function, argc),
            Self::SqlServer => sqlserver_template(function, argc),
        }
    }
}

fn ansi_template(function: Function, argc: usize) -> Option<&'static str> {
    Some(match (function, argc) {
        (Function::Length, 1) => "LENGTH({0})",
        (Function::IndexOf, 2) => "(POSITION({1} IN {0}) - 1)",
        (Function::Substring, 2) => "SUBSTRING({0}, ({1}) + 1)",
        (Function::Substring, 3) => "SUBSTRING({0}, ({1}) + 1, {2})",
        (Function::Concat, 2) => "({0} || {1})",
        (Function::ToLower, 1) => "LOWER({0})",
        (Function::ToUpper, 1) => "UPPER({0})",
        (Function::Trim, 1) => "TRIM({0})",
        (Function::Year, 1) => "EXTRACT(YEAR FROM {0})",
        (Function::Month, 1) => "EXTRACT(MONTH FROM {0})",
        (Function::Day, 1) => "EXTRACT(DAY FROM {0})",
        (Function::Hour, 1) => "EXTRACT(HOUR FROM {0})",
        (Function::Minute, 1) => "EXTRACT(MINUTE FROM {0})",
        (Function::Second, 1) => "EXTRACT(SECOND FROM {0})",
        (Function::Date, 1) => "CAST({0} AS DATE)",
        (Function::Time, 1) => "CAST({0} AS TIME)",
        (Function::Now, 0) => "CURRENT_TIMESTAMP",
        (Function::Round, 1) => "ROUND({0})",
        (Function::Floor, 1) => "FLOOR({0})",
        (Function::Ceiling, 1) => "CEILING({0})",
        _ => return None,
    })
}

/// SQLite's `LIKE` ignores ASCII case, so substring tests compare with `=` and `INSTR`.
fn sqlite_template(function: Function, argc: usize) -> Option<&'static str> {
    Some(match (function, argc) {
        (Function::Contains, 2) => "(INSTR({0}, {1}) > 0)",
        (Function::StartsWith, 2) => "(SUBSTR({0}, 1, LENGTH({1})) = {1})",
        (Function::EndsWith, 2) => {
            "(SUBSTR({0}, LENGTH({0}) - LENGTH({1}) + 1) = {1} AND LENGTH({0}) >= LENGTH({1}))"
        }
        (Function::IndexOf, 2) => "(INSTR({0}, {1}) - 1)",
        (Function::Substring, 2) => "SUBSTR({0}, ({1}) + 1)",
        (Function::Substring, 3) => "SUBSTR({0}, ({1}) + 1, {2})",
        (Function::MatchesPattern, 2) => "({0} REGEXP {1})",
        (Function::Year, 1) => "CAST(STRFTIME('%Y', {0}) AS INTEGER)",
        (Function::Month, 1) => "CAST(STRFTIME('%m', {0}) AS INTEGER)",
        (Function::Day, 1) => "CAST(STRFTIME('%d', {0}) AS INTEGER)",
        (Function::Hour, 1) => "CAST(STRFTIME('%H', {0}) AS INTEGER)",
        (Function::Minute, 1) => "CAST(STRFTIME('%M', {0}) AS INTEGER)",
        (Function::Second, 1) => "CAST(STRFTIME('%S', {0}) AS INTEGER)",
        (Function::Date, 1) => "DATE({0})",
        (Function::Time, 1) => "TIME({0})",
        (Function::Floor, 1) => {
            "(CASE WHEN {0} < CAST({0} AS INTEGER) THEN CAST({0} AS INTEGER) - 1 ELSE CAST({0} AS INTEGER) END)"
        }
        (Function::Ceiling, 1) => {
            "(CASE WHEN {0} > CAST({0} AS INTEGER) THEN CAST({0} AS INTEGER) + 1 ELSE CAST({0} AS INTEGER) END)"
        }
        _ => return None,
    })
}

fn mysql_template(function: Function, argc: usize) -> Option<&'static str> {
    Some(match (function, argc) {
        (Function::IndexOf, 2) => "(INSTR({0}, {1}) - 1)",
        (Function::Concat, 2) => "CONCAT({0}, {1})",
        (Function::MatchesPattern, 2) => "({0} REGEXP {1})",
        (Function::Now, 0) => "NOW()",
        _ => return None,
    })
}

fn postgres_template(function: Function, argc: usize) -> Option<&'static str> {
    Some(match (function, argc) {
        (Function::IndexOf, 2) => "(STRPOS({0}, {1}) - 1)",
        (Function::MatchesPattern, 2) => "({0} ~ {1})",
        (Function::Ceiling, 1) => "CEIL({0})",
        _ => return None,
    })
}

fn sqlserver_template(function: Function, argc: usize) -> Option<&'static str> {
    Some(match (function, argc) {
        (Function::Length, 1) => "LEN({0})",
        (Function::IndexOf, 2) => "(CHARINDEX({1}, {0}) - 1)",
        (Function::Concat, 2) => "CONCAT({0}, {1})",
        (Function::Substring, 2) => "SUBSTRING({0}, ({1}) + 1, LEN({0}))",
        (Function::Year, 1) => "DATEPART(year, {0})",
        (Function::Month, 1) => "DATEPART(month, {0})",
        (Function::Day, 1) => "DATEPART(day, {0})",
        (Function::Hour, 1) => "DATEPART(hour, {0})",
        (Function::Minute, 1) => "DATEPART(minute, {0})",
        (Function::Second, 1) => "DATEPART(second, {0})",
        (Function::Now, 0) => "SYSDATETIMEOFFSET()",
        _ => return None,
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
#[must_use]
pub fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}

/// `LIKE` pattern for `contains`/`startswith`/`endswith`, `None` for other functions.
#[must_use]
pub fn like_pattern(function: Function, needle: &str) -> Option<String> {
    let escaped = like_escape(needle);
    match function {
        Function::Contains => Some(format!("%{escaped}%")),
        Function::StartsWith => Some(format!("{escaped}%")),
        Function::EndsWith => Some(format!("%{escaped}")),
        _ => None,
    }
}
