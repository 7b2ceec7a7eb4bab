//! Friend-gated access to per-user secrets.
//!
//! Owners always see their own secret. Anyone else sees it only while an
//! accepted friend relationship exists with the owner; the check runs on
//! every read and there is no way around it.

use std::sync::Arc;

use serde::Deserialize;

use super::error::{Result, SecretError};
use super::types::{SecretMessage, SecretResource};
use crate::friends::FriendshipManager;
use crate::identity::UserId;
use crate::store::{from_record, to_record, Collection, Condition, Query, Store};

/// Stored row; a missing message reads as "no message yet".
#[derive(Deserialize)]
struct StoredSecret {
    user_id: UserId,
    message: Option<SecretMessage>,
    updated_at: Option<i64>,
}

impl From<StoredSecret> for SecretResource {
    fn from(row: StoredSecret) -> Self {
        Self {
            user_id: row.user_id,
            message: row.message.unwrap_or_default(),
            updated_at: row.updated_at.unwrap_or_default(),
        }
    }
}

/// Reads and writes secrets, consulting the friendship predicate for
/// non-owner reads.
#[derive(Clone)]
pub struct SecretAccessor {
    store: Arc<dyn Store>,
    friends: FriendshipManager,
    max_message_len: Option<usize>,
}

impl SecretAccessor {
    /// Creates an accessor with no message length limit.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, friends: FriendshipManager) -> Self {
        Self {
            store,
            friends,
            max_message_len: None,
        }
    }

    /// Sets the maximum message length in characters.
    #[must_use]
    pub const fn with_max_message_len(mut self, max: Option<usize>) -> Self {
        self.max_message_len = max;
        self
    }

    /// Reads `owner`'s secret on behalf of `viewer`.
    ///
    /// Returns an empty message when the owner has not written one.
    ///
    /// # Errors
    ///
    /// - [`SecretError::NotAuthorized`] if `viewer` is not `owner` and has no
    ///   accepted relationship with them
    /// - [`SecretError::Storage`] if the store fails
    pub fn read(&self, viewer: &UserId, owner: &UserId) -> Result<SecretMessage> {
        if viewer != owner && !self.friends.is_accepted(viewer, owner)? {
            tracing::warn!(viewer = %viewer, owner = %owner, "secret read denied");
            return Err(SecretError::NotAuthorized);
        }

        tracing::debug!(viewer = %viewer, owner = %owner, "secret read");
        Ok(self
            .load(owner)?
            .map(|resource| resource.message)
            .unwrap_or_default())
    }

    /// Replaces `owner`'s secret, creating it on first write.
    ///
    /// The caller is trusted to pass its own authenticated identity as
    /// `owner`.
    ///
    /// # Errors
    ///
    /// - [`SecretError::TooLong`] if a limit is configured and exceeded
    /// - [`SecretError::Storage`] if the store fails
    pub fn write(&self, owner: &UserId, message: &str) -> Result<SecretResource> {
        let message = SecretMessage::new(message);
        if let Some(max) = self.max_message_len {
            if message.char_count() > max {
                return Err(SecretError::TooLong { max });
            }
        }

        let resource = SecretResource {
            user_id: owner.clone(),
            message,
            updated_at: chrono::Utc::now().timestamp(),
        };
        let stored = self
            .store
            .upsert(Collection::Secrets, to_record(&resource)?)?;
        let stored: StoredSecret = from_record(stored)?;

        tracing::info!(owner = %owner, "secret saved");
        Ok(stored.into())
    }

    /// Resets `owner`'s secret to "no message yet".
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Storage`] if the store fails.
    pub fn clear(&self, owner: &UserId) -> Result<SecretResource> {
        self.write(owner, "")
    }

    fn load(&self, owner: &UserId) -> Result<Option<SecretResource>> {
        let query =
            Query::new(Collection::Secrets).filter(Condition::eq("user_id", owner.as_str()));
        let Some(record) = self.store.select(&query)?.into_iter().next() else {
            return Ok(None);
        };
        let row: StoredSecret = from_record(record)?;
        Ok(Some(row.into()))
    }
}
