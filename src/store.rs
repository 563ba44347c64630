use crate::{Result, Session, SessionConfig, SessionStore};
use std::sync::Arc;

/// A cloneable handle to an initialized [`SessionStore`].
///
/// This is what a session manager holds. Sessions loaded through it are
/// attached to the handle so they can later save or destroy themselves.
///
/// # Example
///
/// ```rust
/// # use pluggable_session::{SessionConfig, Store};
/// # use pluggable_session_memory_store::MemoryStore;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> { async_std::task::block_on(async {
/// let store = Store::new(MemoryStore::new(), &SessionConfig::with_max_age(86400)?)?;
/// assert_eq!("memory", store.name());
///
/// let mut session = store.get("").await?;
/// assert!(session.is_empty());
/// session.insert("k", "v")?;
/// let id = store.save(&mut session).await?;
/// assert_eq!(id, session.id());
///
/// store.destroy(&id).await?;
/// store.destroy(&id).await?;
/// # Ok(()) }) }
/// ```
#[derive(Clone, Debug)]
pub struct Store(Arc<dyn SessionStore>);

impl Store {
    /// Initializes `store` with `config` and wraps it in a shareable
    /// handle.
    pub fn new(mut store: impl SessionStore, config: &SessionConfig) -> Result<Self> {
        store.init(config)?;
        log::debug!("initialized `{}` session store", store.name());
        Ok(Self(Arc::new(store)))
    }

    /// Fetches the session for `id`, or a fresh one, attached to this
    /// handle.
    pub async fn get(&self, id: &str) -> Result<Session> {
        let mut session = self.0.get(id).await?;
        session.attach(self.clone());
        Ok(session)
    }

    /// Persists `session` and returns its id.
    pub async fn save(&self, session: &mut Session) -> Result<String> {
        self.0.save(session).await
    }

    /// Removes the stored record for `id`.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.0.destroy(id).await
    }

    /// Removes every stored session.
    pub async fn clear_store(&self) -> Result<()> {
        self.0.clear_store().await
    }

    /// The backend name.
    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}
