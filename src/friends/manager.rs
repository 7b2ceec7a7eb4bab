//! High-level friend relationship API.
//!
//! [`FriendshipManager`] owns the request lifecycle:
//!
//! ```text
//!             accept (receiver)
//! pending ───────────────────────▶ accepted
//!    │  decline (receiver)
//!    ├───────────────────────────▶ declined
//!    │  cancel (requester)
//!    └───────────────────────────▶ cancelled
//! ```
//!
//! Every operation takes the acting user explicitly. Duplicate detection is
//! checked before insert and enforced again by the store's active-pair
//! constraint, so two racing requests for the same pair cannot both land.
//! Responses are written only while the record is still pending, so two
//! racing responses cannot overwrite each other either.

use std::sync::Arc;

use super::error::{FriendError, Result};
use super::types::{status_change, Friend, FriendRelationship, FriendStatus, NewFriendRequest};
use crate::identity::{IdentityResolver, UserId};
use crate::store::{from_record, to_record, Collection, Condition, Query, Store};

/// A receiver- or requester-side response to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    Accept,
    Decline,
    Cancel,
}

impl Response {
    const fn target(self) -> FriendStatus {
        match self {
            Self::Accept => FriendStatus::Accepted,
            Self::Decline => FriendStatus::Declined,
            Self::Cancel => FriendStatus::Cancelled,
        }
    }

    /// Whether `acting` is the party allowed to give this response.
    fn permitted(self, acting: &UserId, record: &FriendRelationship) -> bool {
        match self {
            Self::Accept | Self::Decline => acting == &record.receiver_id,
            Self::Cancel => acting == &record.requester_id,
        }
    }
}

/// Manages friend requests and answers "are these two users friends".
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use confidant::friends::FriendshipManager;
/// use confidant::identity::UserId;
/// use confidant::store::SqliteStore;
///
/// let manager = FriendshipManager::new(Arc::new(SqliteStore::in_memory()?));
/// let request = manager.request_friend(&UserId::new("U1"), "bob@x.com")?;
/// ```
#[derive(Clone)]
pub struct FriendshipManager {
    store: Arc<dyn Store>,
    resolver: IdentityResolver,
}

impl FriendshipManager {
    /// Creates a manager over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let resolver = IdentityResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    // ==================== Request Lifecycle ====================

    /// Sends a friend request from `requester` to the user owning
    /// `target_email`.
    ///
    /// # Errors
    ///
    /// - [`FriendError::UserNotFound`] if the email does not resolve
    /// - [`FriendError::SelfRequest`] if it resolves to `requester`
    /// - [`FriendError::DuplicateRequest`] if a pending or accepted record
    ///   exists for the pair in either direction
    /// - [`FriendError::Storage`] if the store fails
    pub fn request_friend(
        &self,
        requester: &UserId,
        target_email: &str,
    ) -> Result<FriendRelationship> {
        tracing::debug!(requester = %requester, "friend request submitted");

        let receiver = self
            .resolver
            .resolve(target_email)?
            .ok_or(FriendError::UserNotFound)?;

        if &receiver == requester {
            return Err(FriendError::SelfRequest);
        }

        if self.relationship_between(requester, &receiver)?.is_some() {
            return Err(FriendError::DuplicateRequest);
        }

        let request = NewFriendRequest {
            requester_id: requester,
            receiver_id: &receiver,
            status: FriendStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
        };

        let stored = match self
            .store
            .insert(Collection::Friendships, to_record(&request)?)
        {
            Ok(stored) => stored,
            Err(err) if err.is_conflict() => {
                // Lost a race with a concurrent request for the same pair.
                tracing::warn!(
                    requester = %requester,
                    receiver = %receiver,
                    "store rejected duplicate friend request"
                );
                return Err(FriendError::DuplicateRequest);
            }
            Err(err) => return Err(err.into()),
        };

        let relationship: FriendRelationship = from_record(stored)?;
        tracing::info!(
            relationship_id = %relationship.id,
            requester = %requester,
            receiver = %receiver,
            "friend request created"
        );
        Ok(relationship)
    }

    /// Accepts a pending request. Only the receiver may accept.
    ///
    /// Accepting an already-accepted request succeeds without change.
    ///
    /// # Errors
    ///
    /// - [`FriendError::NotFound`] if no record has `request_id`
    /// - [`FriendError::NotAuthorized`] if `acting` is not the receiver, or
    ///   the request was declined or cancelled
    /// - [`FriendError::Storage`] if the store fails
    pub fn accept_request(&self, acting: &UserId, request_id: &str) -> Result<FriendRelationship> {
        self.respond(acting, request_id, Response::Accept)
    }

    /// Declines a pending request. Only the receiver may decline.
    ///
    /// Declining an already-declined request succeeds without change. A
    /// declined request no longer blocks a new request for the pair.
    ///
    /// # Errors
    ///
    /// - [`FriendError::NotFound`] if no record has `request_id`
    /// - [`FriendError::NotAuthorized`] if `acting` is not the receiver, or
    ///   the request is no longer pending
    /// - [`FriendError::Storage`] if the store fails
    pub fn decline_request(
        &self,
        acting: &UserId,
        request_id: &str,
    ) -> Result<FriendRelationship> {
        self.respond(acting, request_id, Response::Decline)
    }

    /// Withdraws a pending request. Only the requester may cancel.
    ///
    /// Cancelling an already-cancelled request succeeds without change.
    ///
    /// # Errors
    ///
    /// - [`FriendError::NotFound`] if no record has `request_id`
    /// - [`FriendError::NotAuthorized`] if `acting` is not the requester, or
    ///   the request is no longer pending
    /// - [`FriendError::Storage`] if the store fails
    pub fn cancel_request(&self, acting: &UserId, request_id: &str) -> Result<FriendRelationship> {
        self.respond(acting, request_id, Response::Cancel)
    }

    fn respond(
        &self,
        acting: &UserId,
        request_id: &str,
        response: Response,
    ) -> Result<FriendRelationship> {
        tracing::debug!(acting = %acting, request_id, ?response, "friend request response");
        let record = self
            .get_request(request_id)?
            .ok_or_else(|| FriendError::NotFound(request_id.to_string()))?;

        if !response.permitted(acting, &record) {
            tracing::warn!(
                relationship_id = %record.id,
                acting = %acting,
                ?response,
                "friend request response denied"
            );
            return Err(FriendError::NotAuthorized);
        }

        let target = response.target();
        if record.status == target {
            return Ok(record);
        }
        if record.status != FriendStatus::Pending {
            tracing::warn!(
                relationship_id = %record.id,
                status = record.status.as_str(),
                ?response,
                "friend request already resolved"
            );
            return Err(FriendError::NotAuthorized);
        }

        let changes = status_change(target, chrono::Utc::now().timestamp());
        let still_pending = [Condition::eq("status", FriendStatus::Pending.as_str())];
        let updated =
            self.store
                .update(Collection::Friendships, &record.id, &still_pending, changes)?;
        let Some(updated) = updated else {
            return self.lost_race(request_id, target, response);
        };
        let updated: FriendRelationship = from_record(updated)?;

        tracing::info!(
            relationship_id = %updated.id,
            acting = %acting,
            status = updated.status.as_str(),
            "friend request resolved"
        );
        Ok(updated)
    }

    /// Settles a response whose guarded write found the record no longer
    /// pending: someone else resolved it first.
    fn lost_race(
        &self,
        request_id: &str,
        target: FriendStatus,
        response: Response,
    ) -> Result<FriendRelationship> {
        let current = self
            .get_request(request_id)?
            .ok_or_else(|| FriendError::NotFound(request_id.to_string()))?;
        if current.status == target {
            return Ok(current);
        }
        tracing::warn!(
            relationship_id = %current.id,
            status = current.status.as_str(),
            ?response,
            "friend request resolved concurrently"
        );
        Err(FriendError::NotAuthorized)
    }

    // ==================== Queries ====================

    /// Looks up a relationship by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_request(&self, request_id: &str) -> Result<Option<FriendRelationship>> {
        let query = Query::new(Collection::Friendships).filter(Condition::eq("id", request_id));
        self.first(&query)
    }

    /// Pending requests addressed to `user`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list_pending_incoming(&self, user: &UserId) -> Result<Vec<FriendRelationship>> {
        tracing::debug!(user = %user, "listing incoming requests");
        let query = Query::new(Collection::Friendships)
            .filter(Condition::eq("receiver_id", user.as_str()))
            .filter(Condition::eq("status", FriendStatus::Pending.as_str()))
            .order_by("created_at");
        self.all(&query)
    }

    /// Pending requests sent by `user`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list_pending_outgoing(&self, user: &UserId) -> Result<Vec<FriendRelationship>> {
        tracing::debug!(user = %user, "listing outgoing requests");
        let query = Query::new(Collection::Friendships)
            .filter(Condition::eq("requester_id", user.as_str()))
            .filter(Condition::eq("status", FriendStatus::Pending.as_str()))
            .order_by("created_at");
        self.all(&query)
    }

    /// Accepted friends of `user`, resolved to the other party.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list_accepted(&self, user: &UserId) -> Result<Vec<Friend>> {
        tracing::debug!(user = %user, "listing friends");
        let query = Query::new(Collection::Friendships)
            .filter(Condition::eq("status", FriendStatus::Accepted.as_str()))
            .or_where([Condition::eq("requester_id", user.as_str())])
            .or_where([Condition::eq("receiver_id", user.as_str())])
            .order_by("created_at");

        let mut friends = Vec::new();
        for relationship in self.all(&query)? {
            let Some(other) = relationship.other_party(user) else {
                continue;
            };
            friends.push(Friend {
                user_id: other.clone(),
                email: self.resolver.email_of(other)?,
                relationship_id: relationship.id.clone(),
                since: relationship.responded_at.unwrap_or(relationship.created_at),
            });
        }
        Ok(friends)
    }

    /// Whether an accepted relationship exists between `a` and `b`, in
    /// either direction.
    ///
    /// This is the authorization predicate for friend-gated resources. It is
    /// symmetric, and a user is never their own friend.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn is_accepted(&self, a: &UserId, b: &UserId) -> Result<bool> {
        if a == b {
            return Ok(false);
        }
        let query = pair_query(a, b)
            .filter(Condition::eq("status", FriendStatus::Accepted.as_str()));
        let accepted = !self.store.select(&query)?.is_empty();
        tracing::debug!(a = %a, b = %b, accepted, "friendship check");
        Ok(accepted)
    }

    /// The pending or accepted relationship between `a` and `b`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn relationship_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<FriendRelationship>> {
        let query = pair_query(a, b)
            .filter(Condition::is_in("status", FriendStatus::active_strs()))
            .order_by("created_at");
        self.first(&query)
    }

    fn all(&self, query: &Query) -> Result<Vec<FriendRelationship>> {
        self.store
            .select(query)?
            .into_iter()
            .map(|record| from_record(record).map_err(FriendError::from))
            .collect()
    }

    fn first(&self, query: &Query) -> Result<Option<FriendRelationship>> {
        Ok(self.all(query)?.into_iter().next())
    }
}

/// `(requester = a AND receiver = b) OR (requester = b AND receiver = a)`.
fn pair_query(a: &UserId, b: &UserId) -> Query {
    Query::new(Collection::Friendships)
        .or_where([
            Condition::eq("requester_id", a.as_str()),
            Condition::eq("receiver_id", b.as_str()),
        ])
        .or_where([
            Condition::eq("requester_id", b.as_str()),
            Condition::eq("receiver_id", a.as_str()),
        ])
}
