//! Core types for friend relationships.
//!
//! A relationship is one directed record (requester to receiver). Once
//! accepted it is a symmetric fact: lookups always match the pair in both
//! directions.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::identity::UserId;
use crate::store::Record;

/// Status of a friend relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendStatus {
    /// Sent, waiting for the receiver.
    Pending,
    /// The receiver accepted.
    Accepted,
    /// The receiver declined.
    Declined,
    /// The requester withdrew the request before a response.
    Cancelled,
}

impl FriendStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::Accepted,
        Self::Declined,
        Self::Cancelled,
    ];

    /// Converts to string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns whether the record blocks a new request for the same pair.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    /// Storage strings of the active statuses.
    pub(crate) fn active_strs() -> impl Iterator<Item = &'static str> {
        Self::ALL
            .into_iter()
            .filter(Self::is_active)
            .map(|status| status.as_str())
    }
}

/// A friend relationship record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRelationship {
    /// Unique id, assigned by the store.
    pub id: String,
    /// Who sent the request.
    pub requester_id: UserId,
    /// Who received it; the only party that may accept or decline.
    pub receiver_id: UserId,
    /// Current status.
    pub status: FriendStatus,
    /// When the request was sent (Unix timestamp).
    pub created_at: i64,
    /// When the request left `pending` (Unix timestamp).
    pub responded_at: Option<i64>,
}

impl FriendRelationship {
    /// The party that is not `user`, or `None` if `user` is not involved.
    #[must_use]
    pub fn other_party(&self, user: &UserId) -> Option<&UserId> {
        if &self.requester_id == user {
            Some(&self.receiver_id)
        } else if &self.receiver_id == user {
            Some(&self.requester_id)
        } else {
            None
        }
    }
}

/// Column changes moving a record to `status`, responded to at `responded_at`.
pub(crate) fn status_change(status: FriendStatus, responded_at: i64) -> Record {
    let mut changes = Record::new();
    changes.insert("status".to_string(), json!(status.as_str()));
    changes.insert("responded_at".to_string(), json!(responded_at));
    changes
}

/// Insert payload for a new request; the store assigns the id.
#[derive(Debug, Serialize)]
pub(crate) struct NewFriendRequest<'a> {
    pub requester_id: &'a UserId,
    pub receiver_id: &'a UserId,
    pub status: FriendStatus,
    pub created_at: i64,
}

/// An accepted friend, from one user's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friend {
    /// The other party.
    pub user_id: UserId,
    /// Their directory email, if they are still in the directory.
    pub email: Option<String>,
    /// The relationship record backing this friendship.
    pub relationship_id: String,
    /// When the friendship was accepted (Unix timestamp).
    pub since: i64,
}
