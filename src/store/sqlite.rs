//! `SQLite` implementation of the storage collaborator.
//!
//! SQL is generated from a [`Query`], but only column names from the
//! collection's whitelist ever reach the statement text; all values are bound
//! as parameters.

// SQLite operations need to hold the lock for the duration of the operation.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;

use super::error::{StoreError, StoreResult};
use super::query::{Condition, Query, Record};
use super::schema::{Collection, SQLITE_SCHEMA};
use super::{generate_key, Store};

/// `SQLite`-based store.
///
/// Thread-safe wrapper around a single `SQLite` connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// Creates the tables and indexes if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Creates a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SQLITE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(format!("Failed to acquire database lock: {e}")))
    }
}

impl Store for SqliteStore {
    fn select(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let collection = query.collection();
        for column in query.referenced_columns() {
            collection.ensure_column(column)?;
        }

        let mut params = Vec::new();
        let where_clause = where_clause(query, &mut params)?;
        let order = query.ordering().map_or_else(
            || collection.key_column().to_string(),
            |column| format!("{column}, {}", collection.key_column()),
        );
        let sql = format!(
            "SELECT {} FROM {} WHERE {where_clause} ORDER BY {order}",
            collection.columns().join(", "),
            collection.name(),
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| read_row(collection, row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert(&self, collection: Collection, mut record: Record) -> StoreResult<Record> {
        let key_column = collection.key_column();
        if collection.generates_key() && record.get(key_column).is_none_or(Value::is_null) {
            record.insert(key_column.to_string(), Value::String(generate_key()));
        }
        let key = key_of(collection, &record)?;
        let (columns, values) = split_record(collection, &record)?;

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            collection.name(),
            columns.join(", "),
        );

        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(values))
            .map_err(map_write_error)?;
        fetch_by_key(&conn, collection, &key)?
            .ok_or_else(|| StoreError::InvalidData(format!("inserted record {key} vanished")))
    }

    fn update(
        &self,
        collection: Collection,
        key: &str,
        expected: &[Condition],
        changes: Record,
    ) -> StoreResult<Option<Record>> {
        if changes.contains_key(collection.key_column()) {
            return Err(StoreError::InvalidData(format!(
                "cannot change key column of {}",
                collection.name()
            )));
        }
        for condition in expected {
            collection.ensure_column(condition.column())?;
        }
        let (columns, mut values) = split_record(collection, &changes)?;

        let conn = self.lock()?;
        if columns.is_empty() {
            let current = fetch_by_key(&conn, collection, key)?;
            return Ok(current.filter(|record| expected.iter().all(|c| c.matches(record))));
        }

        let mut guards = vec![format!("{} = ?", collection.key_column())];
        let mut guard_values = vec![SqlValue::Text(key.to_string())];
        for condition in expected {
            guards.push(condition_sql(condition, &mut guard_values)?);
        }
        let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = ?")).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            collection.name(),
            assignments.join(", "),
            guards.join(" AND "),
        );
        values.extend(guard_values);

        let rows = conn
            .execute(&sql, params_from_iter(values))
            .map_err(map_write_error)?;
        if rows == 0 {
            return Ok(None);
        }
        fetch_by_key(&conn, collection, key)
    }

    fn upsert(&self, collection: Collection, record: Record) -> StoreResult<Record> {
        let key = key_of(collection, &record)?;
        let (columns, values) = split_record(collection, &record)?;

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != collection.key_column())
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let on_conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT({}) {on_conflict}",
            collection.name(),
            columns.join(", "),
            collection.key_column(),
        );

        let conn = self.lock()?;
        conn.execute(&sql, params_from_iter(values))
            .map_err(map_write_error)?;
        fetch_by_key(&conn, collection, &key)?
            .ok_or_else(|| StoreError::InvalidData(format!("upserted record {key} vanished")))
    }

    fn delete(&self, collection: Collection, key: &str) -> StoreResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            collection.name(),
            collection.key_column()
        );
        let conn = self.lock()?;
        let rows = conn.execute(&sql, [key])?;
        Ok(rows > 0)
    }
}

/// Builds the `WHERE` clause for a query, pushing bound values into `params`.
fn where_clause(query: &Query, params: &mut Vec<SqlValue>) -> StoreResult<String> {
    let mut clauses = Vec::new();
    for condition in query.required() {
        clauses.push(condition_sql(condition, params)?);
    }

    if !query.any_of().is_empty() {
        let mut groups = Vec::with_capacity(query.any_of().len());
        for group in query.any_of() {
            if group.is_empty() {
                groups.push("1".to_string());
                continue;
            }
            let parts = group
                .iter()
                .map(|c| condition_sql(c, params))
                .collect::<StoreResult<Vec<_>>>()?;
            groups.push(format!("({})", parts.join(" AND ")));
        }
        clauses.push(format!("({})", groups.join(" OR ")));
    }

    if clauses.is_empty() {
        Ok("1".to_string())
    } else {
        Ok(clauses.join(" AND "))
    }
}

fn condition_sql(condition: &Condition, params: &mut Vec<SqlValue>) -> StoreResult<String> {
    let column = condition.column();
    match condition {
        Condition::Eq(_, value) => {
            params.push(to_sql(value)?);
            Ok(format!("{column} = ?"))
        }
        Condition::ILike(_, pattern) => {
            params.push(SqlValue::Text(pattern.clone()));
            Ok(format!("{column} LIKE ?"))
        }
        Condition::In(_, values) => {
            if values.is_empty() {
                return Ok("0".to_string());
            }
            for value in values {
                params.push(to_sql(value)?);
            }
            Ok(format!("{column} IN ({})", vec!["?"; values.len()].join(", ")))
        }
    }
}

/// Splits a record into whitelisted column names and bound values.
fn split_record(
    collection: Collection,
    record: &Record,
) -> StoreResult<(Vec<&'static str>, Vec<SqlValue>)> {
    let mut columns = Vec::with_capacity(record.len());
    let mut values = Vec::with_capacity(record.len());
    for (name, value) in record {
        let column = collection
            .columns()
            .iter()
            .find(|c| **c == name.as_str())
            .ok_or_else(|| {
                StoreError::InvalidData(format!("unknown column {name} in {}", collection.name()))
            })?;
        columns.push(*column);
        values.push(to_sql(value)?);
    }
    Ok((columns, values))
}

fn key_of(collection: Collection, record: &Record) -> StoreResult<String> {
    record
        .get(collection.key_column())
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            StoreError::InvalidData(format!(
                "{} record is missing {}",
                collection.name(),
                collection.key_column()
            ))
        })
}

fn fetch_by_key(conn: &Connection, collection: Collection, key: &str) -> StoreResult<Option<Record>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        collection.columns().join(", "),
        collection.name(),
        collection.key_column()
    );
    let record = conn
        .query_row(&sql, [key], |row| read_row(collection, row))
        .optional()?;
    Ok(record)
}

fn read_row(collection: Collection, row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, column) in collection.columns().iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => Value::from(f),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
        };
        record.insert((*column).to_string(), value);
    }
    Ok(record)
}

fn to_sql(value: &Value) -> StoreResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(|| StoreError::InvalidData(format!("unsupported number: {n}"))),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidData(
            "nested values are not supported".to_string(),
        )),
    }
}

/// Reports constraint violations as [`StoreError::Conflict`].
fn map_write_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(
                message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string()),
            )
        }
        other => StoreError::Database(other),
    }
}
