use crate::{
    document::{StoredSession, EXPIRE_AT, SID},
    MongoStoreConfig,
};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    error::ErrorKind,
    options::{ClientOptions, IndexOptions, ReplaceOptions},
    Client, Collection, IndexModel,
};
use pluggable_session::{
    async_trait, Error, Result, Session, SessionConfig, SessionStore,
};
use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};

/// # MongoDB session store
///
/// Sessions live in one collection as `{sid, expireat, data}` records.
/// Expiry is left to the server: a TTL index on `expireat` makes the
/// database purge records once their deadline passes, on its own
/// schedule. Lookups also ignore records whose deadline has passed but
/// that the TTL monitor has not reached yet.
///
/// Session ids are [`ObjectId`] hex strings.
///
/// ## Connection
///
/// [`MongoStore::connect`] refuses to build a store it cannot reach.
/// Afterwards the store holds one client handle, which the driver pools
/// internally. A network failure drops that handle; the next
/// [`get`](SessionStore::get) or [`destroy`](SessionStore::destroy)
/// dials once more before giving up with
/// [`Error::StoreUnavailable`]. [`save`](SessionStore::save) never dials.
///
/// ```no_run
/// # use pluggable_session::{SessionConfig, Store};
/// # use pluggable_session_mongodb_store::MongoStore;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> { async_std::task::block_on(async {
/// let mongo = MongoStore::from_json(r#"{
///     "Hosts"     :"localhost",
///     "Database"  :"test",
///     "Collection":"sessions"
/// }"#).await?;
/// let store = Store::new(mongo, &SessionConfig::from_json(r#"{"MaxAge": 86400}"#)?)?;
///
/// let mut session = store.get("").await?;
/// session.insert("k", "v")?;
/// let id = session.save().await?;
/// assert_eq!("v", store.get(&id).await?.get::<String>("k").unwrap());
/// # Ok(()) }) }
/// ```
#[derive(Debug)]
pub struct MongoStore {
    config: MongoStoreConfig,
    options: ClientOptions,
    client: RwLock<Option<Client>>,
    max_age: Duration,
}

impl MongoStore {
    /// Dials the deployment described by `config`, checks it answers,
    /// and makes sure the session collection carries its TTL and
    /// unique-id indexes.
    pub async fn connect(config: MongoStoreConfig) -> Result<Self> {
        let options = config.client_options()?;
        let client = dial(&options, config.database()).await?;

        let store = Self {
            config,
            options,
            client: RwLock::new(Some(client.clone())),
            max_age: SessionConfig::default().max_age(),
        };
        store.ensure_indexes(&client).await?;
        Ok(store)
    }

    /// Parses the json options record and connects.
    pub async fn from_json(options: &str) -> Result<Self> {
        Self::connect(MongoStoreConfig::from_json(options)?).await
    }

    async fn ensure_indexes(&self, client: &Client) -> Result<()> {
        let expiry = IndexModel::builder()
            .keys(doc! { EXPIRE_AT: 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::ZERO)
                    .build(),
            )
            .build();
        let sid = IndexModel::builder()
            .keys(doc! { SID: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        log::debug!(
            "ensuring session indexes on `{}.{}`",
            self.config.database(),
            self.config.collection()
        );
        self.collection(client)
            .create_indexes([expiry, sid], None)
            .await
            .map_err(|e| self.failed(e))?;
        Ok(())
    }

    fn collection(&self, client: &Client) -> Collection<StoredSession> {
        client
            .database(self.config.database())
            .collection(self.config.collection())
    }

    fn live_client(&self) -> Option<Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The held client, redialing once if a failure dropped it.
    /// Concurrent callers may each redial; the last one wins the slot.
    async fn client(&self) -> Result<Client> {
        if let Some(client) = self.live_client() {
            return Ok(client);
        }

        log::debug!("session store lost its connection, redialing");
        match dial(&self.options, self.config.database()).await {
            Ok(client) => {
                *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
                Ok(client)
            }
            Err(e) => {
                log::warn!("session store could not reconnect: {}", e);
                Err(e)
            }
        }
    }

    fn connected(&self) -> Result<Client> {
        self.live_client()
            .ok_or_else(|| Error::unavailable("session store has no live connection"))
    }

    /// Maps a driver error, dropping the held client when the failure
    /// means the connection is gone.
    fn failed(&self, error: mongodb::error::Error) -> Error {
        if is_connection_failure(&error) {
            log::warn!("dropping session store connection after: {}", error);
            self.disconnect();
        }
        Error::unavailable(error)
    }

    fn disconnect(&self) {
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn fresh_session() -> Session {
        Session::from_parts(ObjectId::new().to_hex(), Default::default())
    }
}

#[async_trait]
impl SessionStore for MongoStore {
    fn init(&mut self, config: &SessionConfig) -> Result<()> {
        self.max_age = config.max_age();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Session> {
        if !id.is_empty() {
            validate_id(id)?;
        }
        let client = self.client().await?;
        if id.is_empty() {
            return Ok(Self::fresh_session());
        }

        log::trace!("loading session by id `{}`", id);
        let filter = doc! { SID: id, EXPIRE_AT: { "$gt": DateTime::now() } };
        match self.collection(&client).find_one(filter, None).await {
            Ok(Some(stored)) => stored.into_session(),
            Ok(None) => Ok(Self::fresh_session()),
            Err(e) => Err(self.failed(e)),
        }
    }

    async fn save(&self, session: &mut Session) -> Result<String> {
        validate_id(session.id())?;
        let stored = StoredSession::new(session, DateTime::now(), self.max_age)?;
        let client = self.connected()?;

        log::trace!("storing session by id `{}`", session.id());
        let upsert = ReplaceOptions::builder().upsert(true).build();
        self.collection(&client)
            .replace_one(doc! { SID: session.id() }, &stored, upsert)
            .await
            .map_err(|e| self.failed(e))?;

        session.reset_data_changed();
        Ok(stored.sid)
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        validate_id(id)?;
        let client = self.client().await?;

        log::trace!("destroying session by id `{}`", id);
        self.collection(&client)
            .delete_one(doc! { SID: id }, None)
            .await
            .map_err(|e| self.failed(e))?;
        Ok(())
    }

    async fn clear_store(&self) -> Result<()> {
        let client = self.client().await?;

        log::trace!("clearing mongodb store");
        self.collection(&client)
            .delete_many(doc! {}, None)
            .await
            .map_err(|e| self.failed(e))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mongo"
    }
}

async fn dial(options: &ClientOptions, database: &str) -> Result<Client> {
    let client = Client::with_options(options.clone()).map_err(Error::unavailable)?;
    client
        .database(database)
        .run_command(doc! { "ping": 1 }, None)
        .await
        .map_err(Error::unavailable)?;
    log::debug!("connected to mongodb database `{}`", database);
    Ok(client)
}

fn validate_id(id: &str) -> Result<()> {
    ObjectId::parse_str(id)
        .map(drop)
        .map_err(|_| Error::InvalidIdentifier(id.to_string()))
}

fn is_connection_failure(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use pluggable_session::Store;
    use std::{collections::HashMap, sync::Arc};

    /// comma-separated hosts of a disposable server; the tests that need
    /// one do nothing when it is unset
    const TEST_HOSTS: &str = "MONGODB_SESSION_TEST_HOSTS";

    async fn live_store(max_age: u64) -> Result<Option<(Arc<MongoStore>, Store)>> {
        let Ok(hosts) = std::env::var(TEST_HOSTS) else {
            eprintln!("{TEST_HOSTS} is unset, skipping");
            return Ok(None);
        };
        let config = MongoStoreConfig::new(hosts, "pluggable_session_test")?
            .with_collection(format!("sessions_{}", ObjectId::new().to_hex()));
        let mut mongo = MongoStore::connect(config).await?;
        mongo.init(&SessionConfig::with_max_age(max_age)?)?;
        let mongo = Arc::new(mongo);
        let store = Store::new(SharedStore(mongo.clone()), &SessionConfig::with_max_age(max_age)?)?;
        Ok(Some((mongo, store)))
    }

    /// lets a test keep a handle on the concrete store behind a `Store`
    #[derive(Debug)]
    struct SharedStore(Arc<MongoStore>);

    #[async_trait]
    impl SessionStore for SharedStore {
        fn init(&mut self, _config: &SessionConfig) -> Result<()> {
            Ok(())
        }
        async fn get(&self, id: &str) -> Result<Session> {
            self.0.get(id).await
        }
        async fn save(&self, session: &mut Session) -> Result<String> {
            self.0.save(session).await
        }
        async fn destroy(&self, id: &str) -> Result<()> {
            self.0.destroy(id).await
        }
        async fn clear_store(&self) -> Result<()> {
            self.0.clear_store().await
        }
        fn name(&self) -> &'static str {
            self.0.name()
        }
    }

    #[test]
    fn ids_are_object_ids() {
        assert!(validate_id(&ObjectId::new().to_hex()).is_ok());
        for id in ["", "x", "507f1f77bcf86cd79943901", "507f1f77bcf86cd79943901z"] {
            assert!(matches!(validate_id(id), Err(Error::InvalidIdentifier(_))));
        }
    }

    #[test]
    fn fresh_sessions_are_empty_with_new_ids() {
        let a = MongoStore::fresh_session();
        let b = MongoStore::fresh_session();
        assert!(a.is_empty());
        assert!(validate_id(a.id()).is_ok());
        assert_ne!(a.id(), b.id());
    }

    /// a store whose connection slot is empty, built without dialing
    fn offline_store() -> Result<MongoStore> {
        let config = MongoStoreConfig::new("127.0.0.1:1", "test")?;
        Ok(MongoStore {
            options: config.client_options()?,
            config,
            client: RwLock::new(None),
            max_age: SessionConfig::default().max_age(),
        })
    }

    #[test]
    fn registers_as_mongo() -> Result<()> {
        assert_eq!("mongo", offline_store()?.name());
        Ok(())
    }

    #[async_std::test]
    async fn unstorable_values_fail_before_reaching_the_database() -> Result<()> {
        let store = offline_store()?;

        let mut session = MongoStore::fresh_session();
        session.insert("big", u64::MAX)?;
        let error = store.save(&mut session).await.unwrap_err();
        assert!(matches!(error, Error::Serialization(_)), "{error:?}");
        assert!(!error.is_retryable());
        assert!(session.data_changed());

        session.insert("big", 1)?;
        let error = store.save(&mut session).await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)), "{error:?}");
        Ok(())
    }

    #[async_std::test]
    async fn unreachable_server_fails_construction() -> Result<()> {
        let config = MongoStoreConfig::new("127.0.0.1:1", "test")?
            .with_timeout(Duration::from_secs(1))?;
        let error = MongoStore::connect(config).await.unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable(_)), "{error:?}");
        assert!(error.is_retryable());
        Ok(())
    }

    #[async_std::test]
    async fn example_round_trip() -> Result<()> {
        let Some((_, store)) = live_store(86400).await? else {
            return Ok(());
        };
        assert_eq!("mongo", store.name());

        let mut session = store.get("").await?;
        let id = session.id().to_string();
        assert!(!id.is_empty());
        assert!(session.is_empty());

        session.insert("k", "v")?;
        assert_eq!(id, session.save().await?);

        let loaded = store.get(&id).await?;
        assert_eq!(id, loaded.id());
        assert_eq!(HashMap::from([("k".to_string(), serde_json::json!("v"))]), *loaded.data());

        store.clear_store().await
    }

    #[async_std::test]
    async fn unknown_ids_yield_fresh_sessions() -> Result<()> {
        let Some((_, store)) = live_store(86400).await? else {
            return Ok(());
        };
        let unknown = ObjectId::new().to_hex();
        let session = store.get(&unknown).await?;
        assert_ne!(unknown, session.id());
        assert!(session.is_empty());

        assert!(matches!(store.get("nope").await, Err(Error::InvalidIdentifier(_))));
        assert!(matches!(store.destroy("nope").await, Err(Error::InvalidIdentifier(_))));
        Ok(())
    }

    #[async_std::test]
    async fn destroying_twice_is_fine() -> Result<()> {
        let Some((_, store)) = live_store(86400).await? else {
            return Ok(());
        };
        let mut session = store.get("").await?;
        session.insert("k", 1)?;
        let id = session.save().await?;

        store.destroy(&id).await?;
        store.destroy(&id).await?;
        assert_ne!(id, store.get(&id).await?.id());
        Ok(())
    }

    #[async_std::test]
    async fn expired_sessions_are_not_returned() -> Result<()> {
        let Some((_, store)) = live_store(1).await? else {
            return Ok(());
        };
        let mut session = store.get("").await?;
        session.insert("k", "v")?;
        let id = session.save().await?;

        task::sleep(Duration::from_secs(3)).await;
        let session = store.get(&id).await?;
        assert_ne!(id, session.id());
        assert!(session.is_empty());

        store.clear_store().await
    }

    #[async_std::test]
    async fn concurrent_saves_last_write_wins() -> Result<()> {
        let Some((_, store)) = live_store(86400).await? else {
            return Ok(());
        };
        let id = store.get("").await?.save().await?;

        let handles: Vec<_> = (0..8u32)
            .map(|n| {
                let store = store.clone();
                let id = id.clone();
                task::spawn(async move {
                    let mut session = Session::from_parts(id, HashMap::new());
                    session.insert("writer", n)?;
                    store.save(&mut session).await
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(id, handle.await?);
        }

        let session = store.get(&id).await?;
        assert_eq!(1, session.len());
        assert!(session.get::<u32>("writer").unwrap() < 8);

        store.clear_store().await
    }

    #[async_std::test]
    async fn dropped_connection_is_redialed_by_get_but_not_save() -> Result<()> {
        let Some((mongo, store)) = live_store(86400).await? else {
            return Ok(());
        };
        let mut session = store.get("").await?;
        session.insert("k", "v")?;
        let id = session.save().await?;

        mongo.disconnect();
        assert!(matches!(session.save().await, Err(Error::StoreUnavailable(_))));

        let loaded = store.get(&id).await?;
        assert_eq!("v", loaded.get::<String>("k").unwrap());
        assert!(mongo.live_client().is_some());

        mongo.disconnect();
        store.destroy(&id).await?;
        assert!(mongo.live_client().is_some());

        store.clear_store().await
    }
}
