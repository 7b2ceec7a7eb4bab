//! User identity: directory lookups and the current caller.
//!
//! # Types
//!
//! - [`UserId`]: opaque identifier issued by the identity provider
//! - [`User`]: directory entry (id + normalized email)
//! - [`IdentityResolver`]: email to id, fail-closed on ambiguity
//! - [`UserDirectory`]: write side used by the identity provider
//! - [`SessionProvider`]: who is calling

mod resolver;
mod session;
mod types;

pub use resolver::{IdentityResolver, UserDirectory};
pub use session::{SessionProvider, StaticSession};
pub use types::{normalize_email, User, UserId};
