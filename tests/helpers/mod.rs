//! Shared fixtures for integration and property tests.
//!
//! Each fixture builds a [`ConfidantCore`] with a fresh store and a few
//! registered users. The same scenarios run against both the in-memory and
//! the `SQLite` store.

#![allow(dead_code)]

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use confidant::identity::UserId;
use confidant::store::{MemoryStore, SqliteStore, Store};
use confidant::{ConfidantCore, CoreConfig};

/// Atomic counter for unique test directory names.
static HELPER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a unique temporary directory path for test isolation.
pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let id = HELPER_COUNTER.fetch_add(1, Ordering::SeqCst);
    env::temp_dir().join(format!(
        "confidant_test_{}_{}_{}",
        prefix,
        std::process::id(),
        id
    ))
}

/// Removes a temporary test directory. Ignores errors silently.
pub fn cleanup_dir(dir: &PathBuf) {
    let _ = std::fs::remove_dir_all(dir);
}

/// Which store backs a fixture.
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

pub const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

/// Builds an empty store of the given kind.
pub fn store(backend: Backend) -> Arc<dyn Store> {
    match backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Sqlite => Arc::new(SqliteStore::in_memory().expect("should open sqlite")),
    }
}

/// Email used for the `n`th seeded user.
pub fn email(n: usize) -> String {
    format!("user{n}@example.com")
}

/// Id used for the `n`th seeded user.
pub fn user(n: usize) -> UserId {
    UserId::new(format!("U{n}"))
}

/// Builds a core over `backend` with `count` users registered as
/// `U0..U{count}` / `user{n}@example.com`.
pub fn seeded_core(backend: Backend, count: usize) -> ConfidantCore {
    let core = ConfidantCore::with_store(store(backend), CoreConfig::default());
    for n in 0..count {
        core.directory()
            .register(&user(n), &email(n))
            .expect("should register user");
    }
    core
}

/// The alice/bob fixture: `U1` is alice, `U2` is bob.
pub fn alice_and_bob(backend: Backend) -> ConfidantCore {
    let core = ConfidantCore::with_store(store(backend), CoreConfig::default());
    core.directory()
        .register(&UserId::new("U1"), "alice@x.com")
        .expect("should register alice");
    core.directory()
        .register(&UserId::new("U2"), "bob@x.com")
        .expect("should register bob");
    core
}
