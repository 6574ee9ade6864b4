//! Minimal async storage layer for Cobalto records (sqlite + sqlx)
//!
//! Usage:
//! let db = Db::connect("sqlite::memory:").await?;
//! db.execute("CREATE TABLE ...").await?;
//! let rows = db.select("humans", &[("role".into(), "student".into())], None).await?;
pub use futures::future::BoxFuture;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, SqlitePool, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::settings::{DatabaseSettings, Settings};

/// A single column value as stored by SQLite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Column name -> value, ordered so generated SQL is stable.
pub type Attributes = BTreeMap<String, Value>;

/// Equality conditions joined with `AND`.
pub type Filters = Vec<(String, Value)>;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Rejects anything that is not a plain table/column name.
pub fn check_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

fn bind<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Integer(i) => query.bind(*i),
        Value::Real(r) => query.bind(*r),
        Value::Text(s) => query.bind(s.clone()),
    }
}

fn where_clause(filters: &[(String, Value)]) -> Result<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filters.len());
    for (column, value) in filters {
        let column = check_identifier(column)?;
        if value.is_null() {
            parts.push(format!("{} IS NULL", column));
        } else {
            parts.push(format!("{} = ?", column));
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn bind_filters<'q>(mut query: SqliteQuery<'q>, filters: &[(String, Value)]) -> SqliteQuery<'q> {
    for (_, value) in filters.iter().filter(|(_, v)| !v.is_null()) {
        query = bind(query, value);
    }
    query
}

// Declared column type wins so BOOLEAN columns come back as booleans.
fn decode_row(row: &SqliteRow) -> std::result::Result<Attributes, sqlx::Error> {
    let mut attributes = Attributes::new();
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            attributes.insert(column.name().to_string(), Value::Null);
            continue;
        }
        let mut type_name = column.type_info().name().to_ascii_uppercase();
        if type_name == "NULL" {
            type_name = raw.type_info().name().to_ascii_uppercase();
        }
        let value = match type_name.as_str() {
            "BOOLEAN" | "BOOL" => Value::Bool(row.try_get_unchecked::<bool, _>(index)?),
            "INTEGER" | "INT" | "BIGINT" | "INT8" | "UNSIGNED INTEGER" => {
                Value::Integer(row.try_get_unchecked::<i64, _>(index)?)
            }
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" | "DECIMAL" => {
                Value::Real(row.try_get_unchecked::<f64, _>(index)?)
            }
            _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
        };
        attributes.insert(column.name().to_string(), value);
    }
    Ok(attributes)
}

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

impl Db {
    /// Connect (or create) a SQLite database at the given URI
    pub async fn connect(uri: &str) -> Result<Self> {
        info!("Connecting to SQLite database at URI: {}", uri);
        let pool = SqlitePool::connect(uri).await?;
        info!("Connected to SQLite database: {}", uri);
        Ok(Db { pool })
    }

    /// Connect using the database section of the settings.
    ///
    /// Connections are never reaped, so an in-memory database lives as long
    /// as the pool does.
    pub async fn connect_with(settings: &DatabaseSettings) -> Result<Self> {
        info!(
            "Connecting to SQLite database at URI: {} (max {} connections)",
            settings.url, settings.max_connections
        );
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect(&settings.url)
            .await?;
        info!("Connected to SQLite database: {}", settings.url);
        Ok(Db { pool })
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        Db::connect_with(&settings.database).await
    }

    /// Execute an arbitrary SQL statement, e.g. DDL, INSERT, UPDATE.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        debug!("Executing SQL: {}", sql);
        let result = self.pool.execute(sql).await;
        match &result {
            Ok(_) => info!("SQL executed successfully"),
            Err(e) => log::error!("SQL execution failed: {}", e),
        }
        result.map(|_| ()).map_err(Error::from)
    }

    /// Fetch every row of `table` matching all `filters`.
    pub async fn select(
        &self,
        table: &str,
        filters: &[(String, Value)],
        limit: Option<u64>,
    ) -> Result<Vec<Attributes>> {
        let mut sql = format!(
            "SELECT * FROM {}{}",
            check_identifier(table)?,
            where_clause(filters)?
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        debug!("Fetching rows with SQL: {}", sql);
        let result = bind_filters(sqlx::query(&sql), filters)
            .fetch_all(&self.pool)
            .await;
        match &result {
            Ok(rows) => info!("Fetched {} rows successfully", rows.len()),
            Err(e) => log::error!("Row fetch failed: {}", e),
        }
        let records = result?
            .iter()
            .map(decode_row)
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;
        Ok(records)
    }

    pub async fn exists(&self, table: &str, filters: &[(String, Value)]) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {}{} LIMIT 1",
            check_identifier(table)?,
            where_clause(filters)?
        );
        debug!("Checking existence with SQL: {}", sql);
        let row = bind_filters(sqlx::query(&sql), filters)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert one row and return SQLite's last insert rowid.
    pub async fn insert(&self, table: &str, attributes: &Attributes) -> Result<i64> {
        let table = check_identifier(table)?;
        let sql = if attributes.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns = attributes
                .keys()
                .map(|c| check_identifier(c))
                .collect::<Result<Vec<_>>>()?;
            let placeholders = vec!["?"; columns.len()];
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        debug!("Executing SQL: {}", sql);
        let mut query = sqlx::query(&sql);
        for value in attributes.values() {
            query = bind(query, value);
        }
        match query.execute(&self.pool).await {
            Ok(done) => {
                info!("Inserted row into `{}`", table);
                Ok(done.last_insert_rowid())
            }
            Err(e) => {
                log::error!("Insert into `{}` failed: {}", table, e);
                Err(e.into())
            }
        }
    }

    /// Update the row identified by `key = key_value` with `attributes`.
    pub async fn update(
        &self,
        table: &str,
        key: &str,
        key_value: &Value,
        attributes: &Attributes,
    ) -> Result<u64> {
        let table = check_identifier(table)?;
        let assignments = attributes
            .keys()
            .map(|c| check_identifier(c).map(|c| format!("{} = ?", c)))
            .collect::<Result<Vec<_>>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            assignments.join(", "),
            check_identifier(key)?
        );
        debug!("Executing SQL: {}", sql);
        let mut query = sqlx::query(&sql);
        for value in attributes.values() {
            query = bind(query, value);
        }
        query = bind(query, key_value);
        match query.execute(&self.pool).await {
            Ok(done) => {
                info!("Updated {} row(s) in `{}`", done.rows_affected(), table);
                Ok(done.rows_affected())
            }
            Err(e) => {
                log::error!("Update of `{}` failed: {}", table, e);
                Err(e.into())
            }
        }
    }

    /// Delete every row of `table` matching all `filters`.
    pub async fn delete_where(&self, table: &str, filters: &[(String, Value)]) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {}{}",
            check_identifier(table)?,
            where_clause(filters)?
        );
        debug!("Executing SQL: {}", sql);
        match bind_filters(sqlx::query(&sql), filters)
            .execute(&self.pool)
            .await
        {
            Ok(done) => {
                info!("Deleted {} row(s) from `{}`", done.rows_affected(), table);
                Ok(done.rows_affected())
            }
            Err(e) => {
                log::error!("Delete from `{}` failed: {}", table, e);
                Err(e.into())
            }
        }
    }
}
