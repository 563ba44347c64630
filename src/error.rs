/// Boxed source of a backend failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors that can occur while loading, storing or destroying
/// sessions, regardless of the backend.
///
/// There is deliberately no "not found" variant: a missing session is
/// folded into the creation of a fresh one by [`SessionStore::get`].
///
/// [`SessionStore::get`]: crate::SessionStore::get
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The store configuration was malformed or missing a required field.
    #[error("invalid session store configuration: {0}")]
    Configuration(String),

    /// The backend could not be reached, timed out, or rejected the
    /// operation. Retrying the request may succeed.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[source] BoxError),

    /// The supplied session id is not well formed for this backend.
    #[error("malformed session id `{0}`")]
    InvalidIdentifier(String),

    /// A json error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The session data cannot be represented in, or read back from,
    /// the backend's storage format. Retrying will not help.
    #[error("session data cannot be stored: {0}")]
    Serialization(#[source] BoxError),

    /// The session was not produced by a [`Store`](crate::Store) and has
    /// nowhere to be saved to.
    #[error("session `{0}` is not attached to a store")]
    Detached(String),
}

impl Error {
    /// Wraps any backend failure as [`Error::StoreUnavailable`].
    pub fn unavailable(source: impl Into<BoxError>) -> Self {
        Self::StoreUnavailable(source.into())
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Result alias used throughout the session crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;
