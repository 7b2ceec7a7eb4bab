//! Error types for friend relationship operations.
//!
//! Domain failures are terminal for the operation that raised them. Only
//! [`FriendError::Storage`] may be retried, and for `request_friend` the
//! caller should re-run the whole flow rather than replay an insert.

use thiserror::Error;

use crate::store::StoreError;

/// Error type for friend relationship operations.
#[derive(Error, Debug)]
pub enum FriendError {
    /// No user is registered with the target email.
    #[error("User not found")]
    UserNotFound,

    /// The target email belongs to the requester.
    #[error("Cannot send a friend request to yourself")]
    SelfRequest,

    /// A pending or accepted relationship already exists for the pair.
    #[error("Friend request already exists")]
    DuplicateRequest,

    /// The acting user may not perform this transition.
    #[error("Not authorized")]
    NotAuthorized,

    /// No relationship has the given id.
    #[error("Friend request not found: {0}")]
    NotFound(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl FriendError {
    /// Short text suitable for showing to the end user.
    ///
    /// Never includes storage detail.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::UserNotFound => "User not found. Ensure they have signed up.",
            Self::SelfRequest => "You can't add yourself as a friend.",
            Self::DuplicateRequest => "Friend request already exists.",
            Self::NotAuthorized => "You are not allowed to do that.",
            Self::NotFound(_) => "That friend request no longer exists.",
            Self::Storage(_) => "Something went wrong. Please try again.",
        }
    }

    /// Returns whether a caller may retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for friend relationship operations.
pub type Result<T> = std::result::Result<T, FriendError>;
