//! A borrowed view of [`ConfidantCore`] acting as one user.

use crate::api::ConfidantCore;
use crate::friends::{self, Friend, FriendRelationship};
use crate::identity::UserId;
use crate::secrets::{self, SecretMessage, SecretResource};

/// Threads the caller's id into every friendship and secret call.
///
/// Obtained from [`ConfidantCore::as_user`] or
/// [`ConfidantCore::for_session`].
#[derive(Clone)]
pub struct CallerContext<'a> {
    core: &'a ConfidantCore,
    user: UserId,
}

impl std::fmt::Debug for CallerContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerContext")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl<'a> CallerContext<'a> {
    pub(crate) const fn new(core: &'a ConfidantCore, user: UserId) -> Self {
        Self { core, user }
    }

    /// The acting user.
    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }

    // ==================== Friends ====================

    /// Sends a friend request to the user owning `email`.
    ///
    /// # Errors
    ///
    /// See [`FriendshipManager::request_friend`](crate::friends::FriendshipManager::request_friend).
    pub fn request_friend(&self, email: &str) -> friends::Result<FriendRelationship> {
        self.core.friends().request_friend(&self.user, email)
    }

    /// Accepts an incoming request.
    ///
    /// # Errors
    ///
    /// See [`FriendshipManager::accept_request`](crate::friends::FriendshipManager::accept_request).
    pub fn accept(&self, request_id: &str) -> friends::Result<FriendRelationship> {
        self.core.friends().accept_request(&self.user, request_id)
    }

    /// Declines an incoming request.
    ///
    /// # Errors
    ///
    /// See [`FriendshipManager::decline_request`](crate::friends::FriendshipManager::decline_request).
    pub fn decline(&self, request_id: &str) -> friends::Result<FriendRelationship> {
        self.core.friends().decline_request(&self.user, request_id)
    }

    /// Withdraws an outgoing request.
    ///
    /// # Errors
    ///
    /// See [`FriendshipManager::cancel_request`](crate::friends::FriendshipManager::cancel_request).
    pub fn cancel(&self, request_id: &str) -> friends::Result<FriendRelationship> {
        self.core.friends().cancel_request(&self.user, request_id)
    }

    /// Pending requests addressed to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn pending_incoming(&self) -> friends::Result<Vec<FriendRelationship>> {
        self.core.friends().list_pending_incoming(&self.user)
    }

    /// Pending requests the caller sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn pending_outgoing(&self) -> friends::Result<Vec<FriendRelationship>> {
        self.core.friends().list_pending_outgoing(&self.user)
    }

    /// The caller's accepted friends.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn friends(&self) -> friends::Result<Vec<Friend>> {
        self.core.friends().list_accepted(&self.user)
    }

    /// Whether the caller and `other` are accepted friends.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn is_friends_with(&self, other: &UserId) -> friends::Result<bool> {
        self.core.friends().is_accepted(&self.user, other)
    }

    // ==================== Secrets ====================

    /// Reads `owner`'s secret.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotAuthorized`](crate::secrets::SecretError::NotAuthorized)
    /// unless the caller is `owner` or an accepted friend.
    pub fn read_secret_of(&self, owner: &UserId) -> secrets::Result<SecretMessage> {
        self.core.secrets().read(&self.user, owner)
    }

    /// Reads the caller's own secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn my_secret(&self) -> secrets::Result<SecretMessage> {
        self.core.secrets().read(&self.user, &self.user)
    }

    /// Replaces the caller's secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too long or the store fails.
    pub fn save_secret(&self, message: &str) -> secrets::Result<SecretResource> {
        self.core.secrets().write(&self.user, message)
    }
}
