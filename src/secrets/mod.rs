//! Per-user secret messages, visible to the owner and accepted friends.
//!
//! # Architecture
//!
//! ```text
//! SecretAccessor
//!     ├── FriendshipManager::is_accepted (authorization predicate)
//!     └── Store (secrets collection, upsert keyed on user_id)
//! ```

mod accessor;
mod error;
pub mod types;

pub use accessor::SecretAccessor;
pub use error::{Result, SecretError};
pub use types::{SecretMessage, SecretResource};
