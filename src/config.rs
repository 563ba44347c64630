use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// max-age applied when the manager options do not name one: one day
pub const DEFAULT_MAX_AGE: u64 = 86_400;

/// largest accepted max-age: one hundred years, so that save time plus
/// max-age stays a representable date
pub const MAX_AGE_LIMIT: u64 = 100 * 365 * 86_400;

/// Store-independent session settings, as handed down by the session
/// manager to [`SessionStore::init`](crate::SessionStore::init).
///
/// The manager's json options carry cookie settings too (`Secret`,
/// `Path`, `HttpOnly`, ...); only `MaxAge` is read here and everything
/// else is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionConfig {
    #[serde(default = "default_max_age")]
    max_age: u64,
}

fn default_max_age() -> u64 {
    DEFAULT_MAX_AGE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl SessionConfig {
    /// Builds a config with the given max-age in seconds.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use pluggable_session::SessionConfig;
    /// assert!(SessionConfig::with_max_age(0).is_err());
    /// let config = SessionConfig::with_max_age(60).unwrap();
    /// assert_eq!(60, config.max_age().as_secs());
    /// ```
    pub fn with_max_age(seconds: u64) -> Result<Self> {
        Self { max_age: seconds }.validate()
    }

    /// Parses the session manager's json options.
    pub fn from_json(options: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(options)
            .map_err(|e| Error::Configuration(format!("unreadable session options: {e}")))?;
        config.validate()
    }

    /// How long a saved session stays retrievable.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    fn validate(self) -> Result<Self> {
        if self.max_age == 0 {
            return Err(Error::Configuration("MaxAge must be positive".into()));
        }
        if self.max_age > MAX_AGE_LIMIT {
            return Err(Error::Configuration(format!(
                "MaxAge {} exceeds the limit of {MAX_AGE_LIMIT} seconds",
                self.max_age
            )));
        }
        Ok(self)
    }
}
