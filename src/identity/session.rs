//! Session collaborator: who is the current caller.
//!
//! The identity provider authenticates the caller; this crate only consumes
//! the resulting identifier and trusts it for every "acting as" check.

use super::types::UserId;

/// Supplies the authenticated caller's identifier.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across threads.
pub trait SessionProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is signed in.
    fn current_user(&self) -> Option<UserId>;
}

/// A session fixed at construction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSession {
    user: Option<UserId>,
}

impl StaticSession {
    /// A session for `user`.
    #[must_use]
    pub fn signed_in(user: impl Into<UserId>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }

    /// A session with nobody signed in.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self { user: None }
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }
}
