//! Secret message types.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identity::UserId;

/// A user's secret message.
///
/// The text is wiped from memory on drop and never printed by `Debug`.
/// An empty message means "no message yet".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretMessage(String);

impl SecretMessage {
    /// Wraps message text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The message text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether there is no message yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl std::fmt::Debug for SecretMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretMessage").field(&"<redacted>").finish()
    }
}

/// A stored secret, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretResource {
    /// Owner, and the record key.
    pub user_id: UserId,
    /// Current message.
    pub message: SecretMessage,
    /// When the message was last written (Unix timestamp).
    pub updated_at: i64,
}
