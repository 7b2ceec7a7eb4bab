//! Collections known to the store and the constraints they carry.
//!
//! Both store implementations read their column whitelist from here, and the
//! in-memory store evaluates the same constraints the `SQLite` schema declares.

use serde_json::Value;

use super::error::{StoreError, StoreResult};
use super::query::Record;
use crate::friends::FriendStatus;

/// A named collection in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// User directory (id and email), written by the identity provider.
    Users,
    /// Directed friend relationship records.
    Friendships,
    /// One secret message per user.
    Secrets,
}

impl Collection {
    /// All collections, in schema creation order.
    pub const ALL: [Self; 3] = [Self::Users, Self::Friendships, Self::Secrets];

    /// Table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Friendships => "friendships",
            Self::Secrets => "secrets",
        }
    }

    /// Column holding the record key.
    #[must_use]
    pub const fn key_column(self) -> &'static str {
        match self {
            Self::Users | Self::Friendships => "id",
            Self::Secrets => "user_id",
        }
    }

    /// All columns, key first.
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Users => &["id", "email", "created_at"],
            Self::Friendships => &[
                "id",
                "requester_id",
                "receiver_id",
                "status",
                "created_at",
                "responded_at",
            ],
            Self::Secrets => &["user_id", "message", "updated_at"],
        }
    }

    /// Whether the store assigns the key on insert.
    #[must_use]
    pub const fn generates_key(self) -> bool {
        matches!(self, Self::Friendships)
    }

    /// Returns whether `column` belongs to this collection.
    #[must_use]
    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Rejects a column name that is not part of this collection.
    pub(crate) fn ensure_column(self, column: &str) -> StoreResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(StoreError::InvalidData(format!(
                "unknown column {column} in {}",
                self.name()
            )))
        }
    }

    /// Row-level checks, mirrored by `CHECK` clauses in the `SQLite` schema.
    pub(crate) fn check(self, record: &Record) -> StoreResult<()> {
        if self == Self::Friendships {
            let requester = record.get("requester_id");
            if requester.is_some_and(|r| !r.is_null()) && requester == record.get("receiver_id") {
                return Err(StoreError::Conflict(
                    "friendships: requester_id and receiver_id must differ".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Secondary unique keys derived from a record.
    ///
    /// Two records of the same collection that produce an equal entry
    /// violate a uniqueness constraint.
    pub(crate) fn unique_keys(self, record: &Record) -> Vec<(&'static str, String)> {
        match self {
            Self::Users => record
                .get("email")
                .and_then(Value::as_str)
                .map(|email| vec![("users_email_unique", email.to_lowercase())])
                .unwrap_or_default(),
            Self::Friendships => {
                let status = record.get("status").and_then(Value::as_str);
                let requester = record.get("requester_id").and_then(Value::as_str);
                let receiver = record.get("receiver_id").and_then(Value::as_str);
                match (status, requester, receiver) {
                    (Some(status), Some(a), Some(b))
                        if FriendStatus::parse(status)
                            .as_ref()
                            .is_some_and(FriendStatus::is_active) =>
                    {
                        let (low, high) = if a <= b { (a, b) } else { (b, a) };
                        vec![("friendships_active_pair", format!("{low}\u{1f}{high}"))]
                    }
                    _ => Vec::new(),
                }
            }
            Self::Secrets => Vec::new(),
        }
    }
}

/// DDL for the `SQLite` store.
pub(crate) const SQLITE_SCHEMA: &str = r"
    -- User directory, mirrored from the identity provider
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        email TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS users_email_unique ON users (lower(email));

    -- Directed friend relationship records
    CREATE TABLE IF NOT EXISTS friendships (
        id TEXT PRIMARY KEY NOT NULL,
        requester_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL,
        responded_at INTEGER,
        CHECK (requester_id <> receiver_id)
    );

    -- At most one pending/accepted record per unordered pair
    CREATE UNIQUE INDEX IF NOT EXISTS friendships_active_pair
        ON friendships (min(requester_id, receiver_id), max(requester_id, receiver_id))
        WHERE status IN ('pending', 'accepted');
    CREATE INDEX IF NOT EXISTS friendships_receiver ON friendships (receiver_id, status);
    CREATE INDEX IF NOT EXISTS friendships_requester ON friendships (requester_id, status);

    -- One secret message per user
    CREATE TABLE IF NOT EXISTS secrets (
        user_id TEXT PRIMARY KEY NOT NULL,
        message TEXT NOT NULL DEFAULT '',
        updated_at INTEGER NOT NULL
    );
";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test records are objects"),
        }
    }

    #[test]
    fn names_and_keys() {
        assert_eq!(Collection::Users.name(), "users");
        assert_eq!(Collection::Friendships.name(), "friendships");
        assert_eq!(Collection::Secrets.name(), "secrets");
        assert_eq!(Collection::Secrets.key_column(), "user_id");
        assert_eq!(Collection::Friendships.key_column(), "id");
    }

    #[test]
    fn key_column_is_first() {
        for collection in Collection::ALL {
            assert_eq!(collection.columns()[0], collection.key_column());
        }
    }

    #[test]
    fn only_friendships_generate_keys() {
        assert!(Collection::Friendships.generates_key());
        assert!(!Collection::Users.generates_key());
        assert!(!Collection::Secrets.generates_key());
    }

    #[test]
    fn ensure_column_rejects_unknown() {
        assert!(Collection::Users.ensure_column("email").is_ok());
        let err = Collection::Users.ensure_column("password").unwrap_err();
        assert!(err.to_string().contains("unknown column password"));
    }

    #[test]
    fn check_rejects_self_friendship() {
        let row = record(json!({"requester_id": "u1", "receiver_id": "u1"}));
        assert!(Collection::Friendships.check(&row).unwrap_err().is_conflict());

        let row = record(json!({"requester_id": "u1", "receiver_id": "u2"}));
        assert!(Collection::Friendships.check(&row).is_ok());
    }

    #[test]
    fn active_pair_key_is_order_independent() {
        let forward = record(json!({"requester_id": "a", "receiver_id": "b", "status": "pending"}));
        let reverse =
            record(json!({"requester_id": "b", "receiver_id": "a", "status": "accepted"}));
        assert_eq!(
            Collection::Friendships.unique_keys(&forward),
            Collection::Friendships.unique_keys(&reverse)
        );
    }

    #[test]
    fn inactive_friendships_have_no_pair_key() {
        let declined =
            record(json!({"requester_id": "a", "receiver_id": "b", "status": "declined"}));
        assert!(Collection::Friendships.unique_keys(&declined).is_empty());
    }

    #[test]
    fn email_key_is_case_insensitive() {
        let lower = record(json!({"email": "alice@x.com"}));
        let upper = record(json!({"email": "ALICE@X.com"}));
        assert_eq!(
            Collection::Users.unique_keys(&lower),
            Collection::Users.unique_keys(&upper)
        );
    }
}
