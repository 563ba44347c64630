use dashmap::{mapref::entry::Entry::Occupied, DashMap};
use pluggable_session::{
    async_trait, is_well_formed_id, Error, Result, Session, SessionConfig, SessionStore,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use time::OffsetDateTime;

/// # In-memory session store
///
/// Because there is no external persistance, this session store is
/// ephemeral and will be cleared on server restart.
///
/// ## ***READ THIS BEFORE USING IN A PRODUCTION DEPLOYMENT***
///
/// Storing sessions only in memory brings the following problems:
///
/// 1. All sessions must fit in available memory.
/// 2. Expired sessions are dropped when they are next looked up, or by
///    [MemoryStore::cleanup]. If neither happens they accumulate and
///    might result in OOM.
/// 3. All sessions will be lost on shutdown.
/// 4. If the service is clustered particular session will be stored only on a single instance.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Record>>,
    max_age: Duration,
}

#[derive(Debug, Clone)]
struct Record {
    data: HashMap<String, Value>,
    expire_at: OffsetDateTime,
}

impl Record {
    fn is_expired(&self) -> bool {
        self.expire_at <= OffsetDateTime::now_utc()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            records: Arc::default(),
            max_age: SessionConfig::default().max_age(),
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    fn init(&mut self, config: &SessionConfig) -> Result<()> {
        self.max_age = config.max_age();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Session> {
        if id.is_empty() {
            return Ok(Session::new());
        }
        if !is_well_formed_id(id) {
            return Err(Error::InvalidIdentifier(id.to_string()));
        }

        log::trace!("loading session by id `{}`", id);
        let Occupied(entry) = self.records.entry(id.to_string()) else {
            return Ok(Session::new());
        };

        if entry.get().is_expired() {
            entry.remove();
            Ok(Session::new())
        } else {
            Ok(Session::from_parts(id, entry.get().data.clone()))
        }
    }

    async fn save(&self, session: &mut Session) -> Result<String> {
        if !is_well_formed_id(session.id()) {
            return Err(Error::InvalidIdentifier(session.id().to_string()));
        }
        log::trace!("storing session by id `{}`", session.id());
        let record = Record {
            data: session.data().clone(),
            expire_at: self.deadline()?,
        };
        self.records.insert(session.id().to_string(), record);
        session.reset_data_changed();
        Ok(session.id().to_string())
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        if !is_well_formed_id(id) {
            return Err(Error::InvalidIdentifier(id.to_string()));
        }
        log::trace!("destroying session by id `{}`", id);
        self.records.remove(id);
        Ok(())
    }

    async fn clear_store(&self) -> Result<()> {
        log::trace!("clearing memory store");
        self.records.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryStore {
    /// Create a new instance of MemoryStore
    pub fn new() -> Self {
        Self::default()
    }

    fn deadline(&self) -> Result<OffsetDateTime> {
        time::Duration::try_from(self.max_age)
            .ok()
            .and_then(|max_age| OffsetDateTime::now_utc().checked_add(max_age))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "max-age of {}s puts the session deadline out of range",
                    self.max_age.as_secs()
                ))
            })
    }

    /// Performs session cleanup. This should be run on an
    /// intermittent basis if this store is run for long enough that
    /// memory accumulation is a concern
    pub fn cleanup(&self) {
        log::trace!("cleaning up memory store...");
        self.records.retain(|_, record| !record.is_expired());
    }

    /// returns the number of elements in the memory store
    /// # Example
    /// ```rust
    /// # use pluggable_session::{SessionConfig, Store};
    /// # use pluggable_session_memory_store::MemoryStore;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> { async_std::task::block_on(async {
    /// let memory = MemoryStore::new();
    /// let store = Store::new(memory.clone(), &SessionConfig::default())?;
    /// assert_eq!(memory.count(), 0);
    /// store.get("").await?.save().await?;
    /// assert_eq!(memory.count(), 1);
    /// # Ok(()) }) }
    /// ```
    pub fn count(&self) -> usize {
        self.records.len()
    }
}
