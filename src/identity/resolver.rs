//! Email to user id resolution, and the directory write side.

use std::sync::Arc;

use super::types::{normalize_email, User, UserId};
use crate::friends::types::{status_change, FriendStatus};
use crate::store::{
    from_record, to_record, Collection, Condition, Query, Store, StoreError, StoreResult,
};

/// Maps human-entered emails to stable user identifiers.
///
/// Lookups are exact matches on the normalized email. Resolution never
/// guesses: if the directory holds more than one row for an email, the
/// lookup fails closed.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn Store>,
}

impl IdentityResolver {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolves an email to a user id.
    ///
    /// # Returns
    ///
    /// `Ok(Some(id))` for exactly one match, `Ok(None)` for no match, an
    /// empty email, or an ambiguous directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn resolve(&self, email: &str) -> StoreResult<Option<UserId>> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(None);
        }

        let query = Query::new(Collection::Users).filter(Condition::eq("email", email));
        let mut rows = self.store.select(&query)?;
        match rows.len() {
            0 => Ok(None),
            1 => {
                let user: User = from_record(rows.remove(0))?;
                Ok(Some(user.id))
            }
            matches => {
                tracing::warn!(
                    matches,
                    "user directory holds duplicate emails; refusing to resolve"
                );
                Ok(None)
            }
        }
    }

    /// Looks up a directory entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn lookup(&self, user_id: &UserId) -> StoreResult<Option<User>> {
        let query =
            Query::new(Collection::Users).filter(Condition::eq("id", user_id.as_str()));
        self.store
            .select(&query)?
            .into_iter()
            .next()
            .map(from_record)
            .transpose()
    }

    /// Returns the email registered for `user_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn email_of(&self, user_id: &UserId) -> StoreResult<Option<String>> {
        Ok(self.lookup(user_id)?.map(|user| user.email))
    }
}

/// Write side of the user directory, driven by the identity provider.
///
/// Signup copies the provider's user into the directory; account deletion
/// removes it together with everything the user left behind. This crate
/// otherwise treats the directory as read-only.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn Store>,
    resolver: IdentityResolver,
}

impl UserDirectory {
    /// Creates a directory over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let resolver = IdentityResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    /// Registers or updates a user.
    ///
    /// The email is normalized before it is stored. Re-registering an
    /// existing id keeps its original `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidData`] for an empty email,
    /// [`StoreError::Conflict`] if another user already has the email, or
    /// another error if the store fails.
    pub fn register(&self, user_id: &UserId, email: &str) -> StoreResult<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(StoreError::InvalidData("email must not be empty".to_string()));
        }

        let now = chrono::Utc::now().timestamp();
        let created_at = self
            .resolver
            .lookup(user_id)?
            .map_or(now, |existing| existing.created_at);

        let user = User {
            id: user_id.clone(),
            email,
            created_at,
        };
        let stored = self.store.upsert(Collection::Users, to_record(&user)?)?;
        tracing::debug!(user_id = %user_id, "registered user in directory");
        from_record(stored)
    }

    /// Deletes an account, returning whether it was in the directory.
    ///
    /// The user's pending and accepted relationships are cancelled and
    /// their secret is deleted before the directory row goes, so a failed
    /// removal can simply be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn remove(&self, user_id: &UserId) -> StoreResult<bool> {
        let ended = self.end_relationships(user_id)?;
        let secret_removed = self.store.delete(Collection::Secrets, user_id.as_str())?;
        let removed = self.store.delete(Collection::Users, user_id.as_str())?;
        tracing::info!(
            user_id = %user_id,
            removed,
            ended,
            secret_removed,
            "removed user from directory"
        );
        Ok(removed)
    }

    /// Cancels every active relationship involving `user_id`.
    fn end_relationships(&self, user_id: &UserId) -> StoreResult<usize> {
        let query = Query::new(Collection::Friendships)
            .filter(Condition::is_in("status", FriendStatus::active_strs()))
            .or_where([Condition::eq("requester_id", user_id.as_str())])
            .or_where([Condition::eq("receiver_id", user_id.as_str())]);
        let still_active = [Condition::is_in("status", FriendStatus::active_strs())];
        let now = chrono::Utc::now().timestamp();

        let mut ended = 0;
        for record in self.store.select(&query)? {
            let Some(id) = record.get("id").and_then(serde_json::Value::as_str) else {
                continue;
            };
            let changes = status_change(FriendStatus::Cancelled, now);
            if self
                .store
                .update(Collection::Friendships, id, &still_active, changes)?
                .is_some()
            {
                ended += 1;
            }
        }
        Ok(ended)
    }

    /// Resolver reading from the same store.
    #[must_use]
    pub const fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Record};
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, UserDirectory) {
        let store = Arc::new(MemoryStore::new());
        let directory = UserDirectory::new(store.clone());
        (store, directory)
    }

    #[test]
    fn resolve_is_case_insensitive_and_trimmed() {
        let (_store, directory) = setup();
        directory.register(&UserId::new("U1"), "alice@x.com").unwrap();

        let resolver = directory.resolver();
        assert_eq!(
            resolver.resolve("  ALICE@x.COM ").unwrap(),
            Some(UserId::new("U1"))
        );
    }

    #[test]
    fn resolve_unknown_email_is_none() {
        let (_store, directory) = setup();
        assert_eq!(directory.resolver().resolve("nobody@x.com").unwrap(), None);
    }

    #[test]
    fn resolve_empty_email_skips_storage() {
        let (store, directory) = setup();
        store.fail_next(1);
        assert_eq!(directory.resolver().resolve("   ").unwrap(), None);
    }

    #[test]
    fn resolve_treats_wildcards_literally() {
        let (_store, directory) = setup();
        directory.register(&UserId::new("U1"), "a_b@x.com").unwrap();
        assert_eq!(directory.resolver().resolve("a%@x.com").unwrap(), None);
        assert_eq!(directory.resolver().resolve("axb@x.com").unwrap(), None);
    }

    /// A store that returns every user for any query, simulating a remote
    /// directory without a uniqueness guarantee.
    struct DuplicatingStore(MemoryStore);

    impl Store for DuplicatingStore {
        fn select(&self, query: &Query) -> StoreResult<Vec<Record>> {
            self.0.select(&Query::new(query.collection()))
        }
        fn insert(&self, collection: Collection, record: Record) -> StoreResult<Record> {
            self.0.insert(collection, record)
        }
        fn update(
            &self,
            collection: Collection,
            key: &str,
            expected: &[Condition],
            changes: Record,
        ) -> StoreResult<Option<Record>> {
            self.0.update(collection, key, expected, changes)
        }
        fn upsert(&self, collection: Collection, record: Record) -> StoreResult<Record> {
            self.0.upsert(collection, record)
        }
        fn delete(&self, collection: Collection, key: &str) -> StoreResult<bool> {
            self.0.delete(collection, key)
        }
    }

    #[test]
    fn resolve_fails_closed_on_multiple_matches() {
        let inner = MemoryStore::new();
        for (id, email) in [("U1", "a@x.com"), ("U2", "b@x.com")] {
            let serde_json::Value::Object(row) = json!({"id": id, "email": email, "created_at": 1})
            else {
                unreachable!("json! object literal")
            };
            inner.upsert(Collection::Users, row).unwrap();
        }
        let resolver = IdentityResolver::new(Arc::new(DuplicatingStore(inner)));
        assert_eq!(resolver.resolve("a@x.com").unwrap(), None);
    }

    #[test]
    fn resolve_propagates_store_failure() {
        let (store, directory) = setup();
        store.fail_next(1);
        assert!(matches!(
            directory.resolver().resolve("alice@x.com"),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn register_normalizes_and_keeps_created_at() {
        let (_store, directory) = setup();
        let first = directory
            .register(&UserId::new("U1"), " Alice@X.com ")
            .unwrap();
        assert_eq!(first.email, "alice@x.com");

        let second = directory
            .register(&UserId::new("U1"), "alice.new@x.com")
            .unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.email, "alice.new@x.com");
    }

    #[test]
    fn register_rejects_empty_email() {
        let (_store, directory) = setup();
        assert!(matches!(
            directory.register(&UserId::new("U1"), "  "),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn register_rejects_taken_email() {
        let (_store, directory) = setup();
        directory.register(&UserId::new("U1"), "alice@x.com").unwrap();
        let err = directory
            .register(&UserId::new("U2"), "ALICE@x.com")
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn email_of_and_remove() {
        let (_store, directory) = setup();
        let id = UserId::new("U1");
        directory.register(&id, "alice@x.com").unwrap();
        assert_eq!(
            directory.resolver().email_of(&id).unwrap().as_deref(),
            Some("alice@x.com")
        );

        assert!(directory.remove(&id).unwrap());
        assert_eq!(directory.resolver().email_of(&id).unwrap(), None);
        assert!(!directory.remove(&id).unwrap());
    }

    #[test]
    fn remove_cancels_relationships_and_deletes_secret() {
        use crate::friends::FriendshipManager;
        use crate::secrets::{SecretAccessor, SecretError};

        let (store, directory) = setup();
        let alice = UserId::new("U1");
        let bob = UserId::new("U2");
        let carol = UserId::new("U3");
        directory.register(&alice, "alice@x.com").unwrap();
        directory.register(&bob, "bob@x.com").unwrap();
        directory.register(&carol, "carol@x.com").unwrap();

        let friends = FriendshipManager::new(store.clone());
        let secrets = SecretAccessor::new(store.clone(), friends.clone());
        let accepted = friends.request_friend(&alice, "bob@x.com").unwrap();
        friends.accept_request(&bob, &accepted.id).unwrap();
        let pending = friends.request_friend(&bob, "carol@x.com").unwrap();
        secrets.write(&bob, "42").unwrap();

        assert!(directory.remove(&bob).unwrap());

        assert!(friends.list_accepted(&alice).unwrap().is_empty());
        assert!(friends.list_pending_incoming(&carol).unwrap().is_empty());
        for id in [&accepted.id, &pending.id] {
            let record = friends.get_request(id).unwrap().unwrap();
            assert_eq!(record.status, FriendStatus::Cancelled);
            assert!(record.responded_at.is_some());
        }
        assert!(matches!(
            secrets.read(&alice, &bob),
            Err(SecretError::NotAuthorized)
        ));
        assert_eq!(store.len(Collection::Secrets).unwrap(), 0);
    }

    #[test]
    fn remove_leaves_other_users_alone() {
        use crate::friends::FriendshipManager;

        let (store, directory) = setup();
        let alice = UserId::new("U1");
        let bob = UserId::new("U2");
        let carol = UserId::new("U3");
        directory.register(&alice, "alice@x.com").unwrap();
        directory.register(&bob, "bob@x.com").unwrap();
        directory.register(&carol, "carol@x.com").unwrap();

        let friends = FriendshipManager::new(store);
        let kept = friends.request_friend(&alice, "carol@x.com").unwrap();
        friends.accept_request(&carol, &kept.id).unwrap();

        directory.remove(&bob).unwrap();
        assert!(friends.is_accepted(&alice, &carol).unwrap());
    }

    #[test]
    fn failed_remove_keeps_user_for_retry() {
        let (store, directory) = setup();
        let id = UserId::new("U1");
        directory.register(&id, "alice@x.com").unwrap();

        store.fail_next(1);
        assert!(directory.remove(&id).is_err());
        assert!(directory.resolver().lookup(&id).unwrap().is_some());
        assert!(directory.remove(&id).unwrap());
    }
}
