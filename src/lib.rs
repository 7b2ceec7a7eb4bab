//! Confidant Core Library
//!
//! Email-addressed friend requests and a per-user secret message that only
//! the owner and accepted friends can read.
//!
//! - [`identity`] resolves emails to opaque user ids
//! - [`friends`] runs the request lifecycle and the friendship predicate
//! - [`secrets`] gates secret reads on that predicate
//! - [`store`] is the row store underneath, backed by `SQLite`
//!
//! [`ConfidantCore`] wires them together over one store.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

mod api;
mod caller;
pub mod config;
pub mod friends;
pub mod identity;
pub mod secrets;
pub mod store;

pub use api::ConfidantCore;
pub use caller::CallerContext;
pub use config::CoreConfig;
