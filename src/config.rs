//! Core configuration.

use std::path::{Path, PathBuf};

/// Default directory for the database when none is configured.
pub const DEFAULT_DATA_DIR: &str = "confidant-data";

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "confidant.db";

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "CONFIDANT_DATA_DIR";

/// Environment variable setting the secret message length limit.
pub const ENV_MAX_MESSAGE_LEN: &str = "CONFIDANT_MAX_MESSAGE_LEN";

/// Configuration for [`ConfidantCore`](crate::ConfidantCore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub database_file: String,
    /// Maximum secret message length in characters; `None` means unlimited.
    pub max_message_len: Option<usize>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            max_message_len: None,
        }
    }
}

impl CoreConfig {
    /// Creates a configuration rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Reads overrides from the environment on top of the defaults.
    ///
    /// An unparsable length limit is ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_MAX_MESSAGE_LEN) {
            match raw.trim().parse::<usize>() {
                Ok(max) => config.max_message_len = Some(max),
                Err(e) => tracing::warn!(
                    variable = ENV_MAX_MESSAGE_LEN,
                    error = %e,
                    "ignoring invalid message length limit"
                ),
            }
        }
        config
    }

    /// Sets the database file name.
    #[must_use]
    pub fn with_database_file(mut self, file: impl Into<String>) -> Self {
        self.database_file = file.into();
        self
    }

    /// Sets the secret message length limit.
    #[must_use]
    pub const fn with_max_message_len(mut self, max: usize) -> Self {
        self.max_message_len = Some(max);
        self
    }

    /// Full path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("confidant-data"));
        assert_eq!(config.database_file, "confidant.db");
        assert!(config.max_message_len.is_none());
    }

    #[test]
    fn builder() {
        let config = CoreConfig::new("/tmp/confidant")
            .with_database_file("test.db")
            .with_max_message_len(140);

        assert_eq!(config.data_dir(), Path::new("/tmp/confidant"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/confidant/test.db"));
        assert_eq!(config.max_message_len, Some(140));
    }

    #[test]
    fn env_overrides() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            (ENV_DATA_DIR, "/var/lib/confidant"),
            (ENV_MAX_MESSAGE_LEN, " 500 "),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/confidant"));
        assert_eq!(config.max_message_len, Some(500));
    }

    #[test]
    fn env_invalid_limit_is_ignored() {
        let config = CoreConfig::from_lookup(lookup_from(&[(ENV_MAX_MESSAGE_LEN, "lots")]));
        assert!(config.max_message_len.is_none());
    }

    #[test]
    fn env_blank_dir_keeps_default() {
        let config = CoreConfig::from_lookup(lookup_from(&[(ENV_DATA_DIR, "  ")]));
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn env_absent_gives_defaults() {
        let config = CoreConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, CoreConfig::default());
    }
}
