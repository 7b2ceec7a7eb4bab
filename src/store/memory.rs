//! In-memory implementation of the storage collaborator.
//!
//! Enforces the same key and uniqueness constraints as the `SQLite` schema so
//! tests against it exercise the same failure modes. It is NOT durable and is
//! only available with the `test-utils` feature.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use super::error::{StoreError, StoreResult};
use super::query::{Condition, Query, Record};
use super::schema::Collection;
use super::{generate_key, Store};

type Tables = HashMap<Collection, BTreeMap<String, Record>>;

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    injected_failures: AtomicUsize,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` operations fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Number of records currently held in `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self, collection: Collection) -> StoreResult<usize> {
        let tables = self.read()?;
        Ok(tables.get(&collection).map_or(0, BTreeMap::len))
    }

    fn take_failure(&self) -> StoreResult<()> {
        let took = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(StoreError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

impl Store for MemoryStore {
    fn select(&self, query: &Query) -> StoreResult<Vec<Record>> {
        self.take_failure()?;
        let collection = query.collection();
        for column in query.referenced_columns() {
            collection.ensure_column(column)?;
        }

        let tables = self.read()?;
        let mut rows: Vec<Record> = tables
            .get(&collection)
            .map(|table| {
                table
                    .values()
                    .filter(|record| query.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| query.compare(a, b));
        Ok(rows)
    }

    fn insert(&self, collection: Collection, record: Record) -> StoreResult<Record> {
        self.take_failure()?;
        let mut record = complete(collection, record)?;
        let key_column = collection.key_column();
        if collection.generates_key() && record.get(key_column).is_none_or(Value::is_null) {
            record.insert(key_column.to_string(), Value::String(generate_key()));
        }
        let key = key_of(collection, &record)?;

        let mut tables = self.write()?;
        let table = tables.entry(collection).or_default();
        if table.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "{}.{key_column} already exists: {key}",
                collection.name()
            )));
        }
        validate(collection, table, &key, &record)?;
        table.insert(key, record.clone());
        Ok(record)
    }

    fn update(
        &self,
        collection: Collection,
        key: &str,
        expected: &[Condition],
        changes: Record,
    ) -> StoreResult<Option<Record>> {
        self.take_failure()?;
        if changes.contains_key(collection.key_column()) {
            return Err(StoreError::InvalidData(format!(
                "cannot change key column of {}",
                collection.name()
            )));
        }
        for column in changes.keys() {
            collection.ensure_column(column)?;
        }
        for condition in expected {
            collection.ensure_column(condition.column())?;
        }

        let mut tables = self.write()?;
        let table = tables.entry(collection).or_default();
        let Some(existing) = table.get(key) else {
            return Ok(None);
        };
        if !expected.iter().all(|condition| condition.matches(existing)) {
            return Ok(None);
        }
        let mut updated = existing.clone();
        updated.extend(changes);
        validate(collection, table, key, &updated)?;
        table.insert(key.to_string(), updated.clone());
        Ok(Some(updated))
    }

    fn upsert(&self, collection: Collection, record: Record) -> StoreResult<Record> {
        self.take_failure()?;
        let key = key_of(collection, &record)?;
        for column in record.keys() {
            collection.ensure_column(column)?;
        }

        let mut tables = self.write()?;
        let table = tables.entry(collection).or_default();
        let merged = match table.get(&key) {
            Some(existing) => {
                let mut merged = existing.clone();
                merged.extend(record);
                merged
            }
            None => complete(collection, record)?,
        };
        validate(collection, table, &key, &merged)?;
        table.insert(key, merged.clone());
        Ok(merged)
    }

    fn delete(&self, collection: Collection, key: &str) -> StoreResult<bool> {
        self.take_failure()?;
        let mut tables = self.write()?;
        Ok(tables
            .get_mut(&collection)
            .is_some_and(|table| table.remove(key).is_some()))
    }
}

/// Fills absent columns with `null`, like a row read back from `SQLite`.
fn complete(collection: Collection, record: Record) -> StoreResult<Record> {
    for column in record.keys() {
        collection.ensure_column(column)?;
    }
    let mut full = Record::new();
    for column in collection.columns() {
        full.insert((*column).to_string(), Value::Null);
    }
    full.extend(record);
    Ok(full)
}

/// Checks row constraints and secondary uniqueness against every other row.
fn validate(
    collection: Collection,
    table: &BTreeMap<String, Record>,
    key: &str,
    record: &Record,
) -> StoreResult<()> {
    collection.check(record)?;
    let wanted = collection.unique_keys(record);
    if wanted.is_empty() {
        return Ok(());
    }
    for (other_key, other) in table {
        if other_key == key {
            continue;
        }
        if let Some((constraint, _)) = collection
            .unique_keys(other)
            .into_iter()
            .find(|entry| wanted.contains(entry))
        {
            return Err(StoreError::Conflict(format!(
                "UNIQUE constraint failed: {constraint}"
            )));
        }
    }
    Ok(())
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
