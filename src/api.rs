//! Main entry point wiring the store to the identity, friendship and
//! secret services.

use std::sync::Arc;

use crate::caller::CallerContext;
use crate::config::CoreConfig;
use crate::friends::FriendshipManager;
use crate::identity::{IdentityResolver, SessionProvider, UserDirectory, UserId};
use crate::secrets::SecretAccessor;
use crate::store::{SqliteStore, Store, StoreResult};

/// Core interface for Confidant functionality.
///
/// Owns one shared store and hands out the services built on it. All
/// services are cheap clones over the same `Arc<dyn Store>`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use confidant::{ConfidantCore, CoreConfig};
/// use confidant::identity::UserId;
/// use confidant::store::SqliteStore;
///
/// let store = Arc::new(SqliteStore::in_memory().unwrap());
/// let core = ConfidantCore::with_store(store, CoreConfig::default());
///
/// let alice = UserId::new("U1");
/// core.directory().register(&alice, "alice@example.com").unwrap();
/// assert!(core.as_user(alice).my_secret().unwrap().is_empty());
/// ```
#[derive(Clone)]
pub struct ConfidantCore {
    config: CoreConfig,
    directory: UserDirectory,
    friends: FriendshipManager,
    secrets: SecretAccessor,
}

impl ConfidantCore {
    /// Opens the `SQLite` database described by `config`, creating the data
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the database
    /// cannot be opened.
    pub fn open(config: CoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(config.data_dir())?;
        let store = SqliteStore::open(&config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "database opened");
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Builds the services over an existing store.
    #[must_use]
    pub fn with_store(store: Arc<dyn Store>, config: CoreConfig) -> Self {
        let directory = UserDirectory::new(Arc::clone(&store));
        let friends = FriendshipManager::new(Arc::clone(&store));
        let secrets = SecretAccessor::new(store, friends.clone())
            .with_max_message_len(config.max_message_len);
        Self {
            config,
            directory,
            friends,
            secrets,
        }
    }

    /// The configuration this core was built with.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// User registration.
    #[must_use]
    pub const fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    /// Email to user id resolution.
    #[must_use]
    pub const fn resolver(&self) -> &IdentityResolver {
        self.directory.resolver()
    }

    /// Friend request lifecycle and the friendship predicate.
    #[must_use]
    pub const fn friends(&self) -> &FriendshipManager {
        &self.friends
    }

    /// Friend-gated secret access.
    #[must_use]
    pub const fn secrets(&self) -> &SecretAccessor {
        &self.secrets
    }

    /// Acts as `user` for subsequent calls.
    #[must_use]
    pub const fn as_user(&self, user: UserId) -> CallerContext<'_> {
        CallerContext::new(self, user)
    }

    /// Acts as the signed-in user, or returns `None` when nobody is signed in.
    #[must_use]
    pub fn for_session(&self, session: &dyn SessionProvider) -> Option<CallerContext<'_>> {
        session.current_user().map(|user| self.as_user(user))
    }
}
