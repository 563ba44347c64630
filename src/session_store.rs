use crate::{async_trait, Result, Session, SessionConfig};
use std::fmt::Debug;

/// An async session backend.
///
/// Implementations are shared by every in-flight request, so all
/// operations take `&self`; only [`SessionStore::init`] runs before
/// the store is shared.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync + 'static {
    /// Apply the session manager's settings, at minimum the max-age
    /// used to compute expiry on save. Must not open network
    /// connections.
    fn init(&mut self, config: &SessionConfig) -> Result<()>;

    /// Get a session from the storage backend.
    ///
    /// An empty id, or an id with no live record, yields a fresh
    /// session with a newly generated id and no data. Absence is never
    /// reported as an error. A malformed id yields
    /// [`Error::InvalidIdentifier`](crate::Error::InvalidIdentifier).
    async fn get(&self, id: &str) -> Result<Session>;

    /// Store a session on the storage backend, replacing any previous
    /// record for the same id and pushing its expiry to now plus the
    /// configured max-age.
    ///
    /// The return value is the persisted session id.
    async fn save(&self, session: &mut Session) -> Result<String>;

    /// Remove a session from the session store. Removing a session that
    /// does not exist is not an error.
    async fn destroy(&self, id: &str) -> Result<()>;

    /// Empties the entire store, destroying all sessions
    async fn clear_store(&self) -> Result<()>;

    /// A stable name for this backend, for diagnostics and registration.
    fn name(&self) -> &'static str;
}
