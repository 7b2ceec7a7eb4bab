//! Friend relationship management.
//!
//! Users send friend requests by email; the receiver accepts or declines,
//! the requester may cancel while the request is pending. An accepted
//! relationship is symmetric and is what gates access to secrets.
//!
//! # Architecture
//!
//! ```text
//! FriendshipManager (high-level API)
//!     ├── IdentityResolver (email → user id)
//!     └── Store (friendships collection)
//! ```
//!
//! # Types
//!
//! - [`FriendRelationship`]: one directed request record
//! - [`FriendStatus`]: pending / accepted / declined / cancelled
//! - [`Friend`]: an accepted friend seen from one side

mod error;
mod manager;
pub mod types;

pub use error::{FriendError, Result};
pub use manager::FriendshipManager;
pub use types::{Friend, FriendRelationship, FriendStatus};
