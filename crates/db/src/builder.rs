//! Minimal `SELECT` builder for cursor-paginated scans.
//!
//! A [`Where`] is an ordered list of predicates keyed by `"column"` (equality)
//! or `"column <op>"`, plus optional ordering and limit/offset entries.
//! [`build_select`] validates every identifier and renders a Postgres query
//! with `$n` placeholders in predicate order.

use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryAs;

use lodging_core::del_state::DelState;

/// Operators accepted after a column name in a predicate key.
const OPERATORS: &[&str] = &["=", "!=", "<>", "<", "<=", ">", ">="];

/// A value bound to a positional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<DelState> for SqlValue {
    fn from(value: DelState) -> Self {
        SqlValue::Int(value.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryBuildError {
    #[error("Table name must not be empty")]
    EmptyTable,

    #[error("At least one column must be selected")]
    NoColumns,

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unsupported operator {op:?} in predicate {key:?}")]
    UnsupportedOperator { key: String, op: String },

    #[error("Malformed order-by clause: {0:?}")]
    InvalidOrderBy(String),

    #[error("Limit and offset must be non-negative (offset {offset}, count {count})")]
    NegativeLimit { offset: i64, count: i64 },
}

/// Predicates, ordering and paging for a single-table `SELECT`.
#[derive(Debug, Clone, Default)]
pub struct Where {
    predicates: Vec<(String, SqlValue)>,
    order_by: Option<String>,
    limit: Option<(i64, i64)>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate. `key` is `"column"` for equality or `"column <op>"`.
    pub fn and(mut self, key: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.predicates.push((key.into(), value.into()));
        self
    }

    /// Set the ordering, e.g. `"id DESC"` or `"row_state ASC, id DESC"`.
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    /// Return at most `count` rows after skipping `offset`.
    pub fn limit(mut self, offset: i64, count: i64) -> Self {
        self.limit = Some((offset, count));
        self
    }
}

/// Render `conditions` into a parameterized query over `table`.
pub fn build_select(
    table: &str,
    conditions: &Where,
    columns: &[&str],
) -> Result<(String, Vec<SqlValue>), QueryBuildError> {
    if table.is_empty() {
        return Err(QueryBuildError::EmptyTable);
    }
    check_identifier(table)?;
    if columns.is_empty() {
        return Err(QueryBuildError::NoColumns);
    }
    for column in columns {
        check_identifier(column)?;
    }

    let mut query = format!("SELECT {} FROM {}", columns.join(","), table);
    let mut values = Vec::with_capacity(conditions.predicates.len() + 2);

    for (i, (key, value)) in conditions.predicates.iter().enumerate() {
        let (column, op) = parse_predicate_key(key)?;
        query.push_str(if i == 0 { " WHERE " } else { " AND " });
        values.push(value.clone());
        query.push_str(&format!("{column} {op} ${}", values.len()));
    }

    if let Some(clause) = &conditions.order_by {
        query.push_str(" ORDER BY ");
        query.push_str(&parse_order_by(clause)?);
    }

    if let Some((offset, count)) = conditions.limit {
        if offset < 0 || count < 0 {
            return Err(QueryBuildError::NegativeLimit { offset, count });
        }
        values.push(SqlValue::Int(count));
        let limit_idx = values.len();
        values.push(SqlValue::Int(offset));
        query.push_str(&format!(" LIMIT ${limit_idx} OFFSET ${}", values.len()));
    }

    Ok((query, values))
}

/// Bind `values` to `query` in order.
pub fn bind_values<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    values: Vec<SqlValue>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
        };
    }
    query
}

fn parse_predicate_key(key: &str) -> Result<(&str, &str), QueryBuildError> {
    let mut parts = key.split_whitespace();
    let column = parts
        .next()
        .ok_or_else(|| QueryBuildError::InvalidIdentifier(key.to_string()))?;
    check_identifier(column)?;
    let op = parts.next().unwrap_or("=");
    if parts.next().is_some() || !OPERATORS.contains(&op) {
        return Err(QueryBuildError::UnsupportedOperator {
            key: key.to_string(),
            op: op.to_string(),
        });
    }
    Ok((column, op))
}

fn parse_order_by(clause: &str) -> Result<String, QueryBuildError> {
    let mut items = Vec::new();
    for item in clause.split(',') {
        let mut parts = item.split_whitespace();
        let column = parts
            .next()
            .ok_or_else(|| QueryBuildError::InvalidOrderBy(clause.to_string()))?;
        if check_identifier(column).is_err() {
            return Err(QueryBuildError::InvalidOrderBy(clause.to_string()));
        }
        let direction = match parts.next().map(str::to_ascii_uppercase).as_deref() {
            None | Some("ASC") => "ASC",
            Some("DESC") => "DESC",
            Some(_) => return Err(QueryBuildError::InvalidOrderBy(clause.to_string())),
        };
        if parts.next().is_some() {
            return Err(QueryBuildError::InvalidOrderBy(clause.to_string()));
        }
        items.push(format!("{column} {direction}"));
    }
    Ok(items.join(", "))
}

fn check_identifier(ident: &str) -> Result<(), QueryBuildError> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(QueryBuildError::InvalidIdentifier(ident.to_string()))
    }
}
