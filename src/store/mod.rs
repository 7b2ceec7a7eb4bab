//! Storage collaborator.
//!
//! Every component in this crate reaches persistent state through the
//! [`Store`] trait, handed to it as an `Arc<dyn Store>`. Two implementations
//! ship with the crate:
//!
//! - [`SqliteStore`]: `SQLite` via `rusqlite`, the production store
//! - `MemoryStore`: an in-memory fake, behind the `test-utils` feature
//!
//! # Architecture
//!
//! ```text
//! Store (trait)
//!     ├── Query / Condition (OR of AND-groups, equality, pattern, membership)
//!     ├── Collection (column whitelist, key column, constraints)
//!     ├── SqliteStore
//!     └── MemoryStore (test-utils)
//! ```

mod error;
#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod query;
mod schema;
mod sqlite;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use error::{StoreError, StoreResult};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use query::{Condition, Query, Record};
pub use schema::Collection;
pub use sqlite::SqliteStore;

/// Trait for the persistent record store.
///
/// Single-record writes are atomic; nothing else is promised. A caller that
/// receives an error from a write must not assume whether the write landed.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across threads.
pub trait Store: Send + Sync {
    /// Returns all records matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query references an unknown column or the
    /// store fails.
    fn select(&self, query: &Query) -> StoreResult<Vec<Record>>;

    /// Inserts one record and returns it as stored.
    ///
    /// Collections with generated keys get a fresh key when the record has
    /// none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a key or uniqueness constraint is
    /// violated, or another error if the store fails.
    fn insert(&self, collection: Collection, record: Record) -> StoreResult<Record>;

    /// Patches `changes` onto the record with `key`, provided the record
    /// still satisfies every condition in `expected`.
    ///
    /// The check and the write are one atomic step, so `expected` acts as a
    /// compare-and-set guard. Pass an empty slice for an unconditional patch.
    ///
    /// # Returns
    ///
    /// The updated record, or `None` if no record has that key or the record
    /// no longer matches `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the patched record violates a
    /// constraint, or another error if the store fails.
    fn update(
        &self,
        collection: Collection,
        key: &str,
        expected: &[Condition],
        changes: Record,
    ) -> StoreResult<Option<Record>>;

    /// Inserts the record, or replaces the non-key columns of the record
    /// that already has its key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a secondary uniqueness constraint
    /// is violated, or another error if the store fails.
    fn upsert(&self, collection: Collection, record: Record) -> StoreResult<Record>;

    /// Deletes the record with `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn delete(&self, collection: Collection, key: &str) -> StoreResult<bool>;
}

/// Generates a record key: 16 random bytes, hex encoded.
pub(crate) fn generate_key() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Converts a serializable value into a record.
pub(crate) fn to_record<T: Serialize>(value: &T) -> StoreResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidData(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Converts a stored record into a typed value.
pub(crate) fn from_record<T: DeserializeOwned>(record: Record) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        created_at: i64,
    }

    #[test]
    fn generated_keys_are_unique_hex() {
        let a = generate_key();
        let b = generate_key();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn record_conversion() {
        let row = Row {
            id: "abc".to_string(),
            created_at: 42,
        };
        let record = to_record(&row).unwrap();
        assert_eq!(record["id"], "abc");
        assert_eq!(from_record::<Row>(record).unwrap(), row);
    }

    #[test]
    fn to_record_rejects_non_objects() {
        let err = to_record(&"plain string").unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn stores_are_object_safe() {
        let store: std::sync::Arc<dyn Store> = std::sync::Arc::new(MemoryStore::new());
        assert!(store.select(&Query::new(Collection::Users)).unwrap().is_empty());
    }
}
