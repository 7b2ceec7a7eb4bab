//! Error types for secret access.

use thiserror::Error;

use crate::friends::FriendError;
use crate::store::StoreError;

/// Error type for secret operations.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The viewer is neither the owner nor an accepted friend.
    #[error("Not authorized to read this secret")]
    NotAuthorized,

    /// The message exceeds the configured limit.
    #[error("Message too long: limit is {max} characters")]
    TooLong {
        /// Maximum number of characters allowed.
        max: usize,
    },

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl SecretError {
    /// Short text suitable for showing to the end user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "You do not have access to this message.",
            Self::TooLong { .. } => "That message is too long.",
            Self::Storage(_) => "Something went wrong. Please try again.",
        }
    }

    /// Returns whether a caller may retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<FriendError> for SecretError {
    fn from(err: FriendError) -> Self {
        match err {
            FriendError::Storage(inner) => Self::Storage(inner),
            _ => Self::NotAuthorized,
        }
    }
}

/// Result type alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_long_error_display() {
        let err = SecretError::TooLong { max: 280 };
        assert_eq!(err.to_string(), "Message too long: limit is 280 characters");
    }

    #[test]
    fn friend_storage_error_stays_storage() {
        let err = SecretError::from(FriendError::Storage(StoreError::Unavailable(
            "down".to_string(),
        )));
        assert!(matches!(err, SecretError::Storage(StoreError::Unavailable(_))));
        assert!(err.is_retryable());
    }

    #[test]
    fn friend_domain_errors_deny_access() {
        let err = SecretError::from(FriendError::NotAuthorized);
        assert!(matches!(err, SecretError::NotAuthorized));
        assert!(!err.is_retryable());
    }

    #[test]
    fn user_message_hides_storage_detail() {
        let err = SecretError::Storage(StoreError::InvalidData("column x".to_string()));
        assert!(!err.user_message().contains("column"));
    }
}
