use crate::{generate_id, Error, Result, Store};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// # The main session type.
///
/// A session is an id plus a bag of json values. It is a snapshot:
/// once handed out, nothing that happens in the backing store (expiry,
/// destruction by another request) is reflected in it.
///
/// ## Ownership
///
/// Sessions returned by [`Store::get`] carry the store handle that
/// produced them, so [`Session::save`] and [`Session::destroy`] know
/// where to go. A session assembled by hand with [`Session::new`] or
/// [`Session::from_parts`] has no owner and must be handed to a store
/// explicitly.
///
/// ## Change tracking
///
/// The session tracks whether any of its inner data was changed since
/// it was last loaded or saved, so that a manager can skip the save
/// for untouched sessions.
///
/// ### Change tracking example
/// ```rust
/// # use pluggable_session::Session;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::new();
/// assert!(!session.data_changed());
///
/// session.insert("key", 1)?;
/// assert!(session.data_changed());
///
/// session.reset_data_changed();
/// assert_eq!(session.get::<usize>("key").unwrap(), 1);
/// assert!(!session.data_changed());
///
/// session.insert("key", 1)?;
/// assert!(!session.data_changed(), "writing the same value is not a change");
///
/// session.remove("nonexistent key");
/// assert!(!session.data_changed());
/// session.remove("key");
/// assert!(session.data_changed());
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    data: HashMap<String, Value>,
    data_changed: bool,
    owner: Option<Store>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a new, empty session with a freshly generated id and no
    /// owning store.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use pluggable_session::Session;
    /// let session = Session::new();
    /// assert!(!session.id().is_empty());
    /// assert!(session.is_empty());
    /// assert!(session.store().is_none());
    /// ```
    pub fn new() -> Self {
        Self::from_parts(generate_id(), HashMap::new())
    }

    /// Create a session from id and data. This is intended to be used
    /// by session store implementers to rehydrate sessions from
    /// persistence, and to hand out fresh sessions with their own id
    /// scheme.
    pub fn from_parts(id: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
            data_changed: false,
            owner: None,
        }
    }

    /// Gets the session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Borrow the data hashmap. This is intended to be used by
    /// session store implementers.
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    /// The store this session was loaded from, if any.
    pub fn store(&self) -> Option<&Store> {
        self.owner.as_ref()
    }

    pub(crate) fn attach(&mut self, store: Store) {
        self.owner = Some(store);
    }

    /// inserts a serializable value into the session hashmap. returns
    /// an error if the serialization was unsuccessful.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use serde::{Serialize, Deserialize};
    /// # use pluggable_session::Session;
    /// #[derive(Serialize, Deserialize)]
    /// struct User {
    ///     name: String,
    ///     legs: u8
    /// }
    /// let mut session = Session::new();
    /// session.insert("user", User { name: "chashu".into(), legs: 4 }).expect("serializable");
    /// assert_eq!(r#"{"legs":4,"name":"chashu"}"#, session.get_value("user").unwrap().to_string());
    /// ```
    pub fn insert(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        self.insert_value(key, serde_json::to_value(&value)?);
        Ok(())
    }

    /// inserts a raw json value into the session hashmap
    ///
    /// # Example
    ///
    /// ```rust
    /// # use pluggable_session::Session;
    /// let mut session = Session::new();
    /// session.insert_value("ten", serde_json::json!(10));
    /// let ten: usize = session.get("ten").unwrap();
    /// assert_eq!(ten, 10);
    /// ```
    pub fn insert_value(&mut self, key: &str, value: Value) {
        if self.data.get(key) != Some(&value) {
            self.data.insert(key.to_string(), value);
            self.data_changed = true;
        }
    }

    /// deserializes a type T out of the session hashmap. returns None
    /// if the key is absent or holds a value of another shape.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use pluggable_session::Session;
    /// let mut session = Session::new();
    /// session.insert("key", vec![1, 2, 3]).unwrap();
    /// let numbers: Vec<usize> = session.get("key").unwrap();
    /// assert_eq!(vec![1, 2, 3], numbers);
    /// assert_eq!(None, session.get::<String>("key"));
    /// ```
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .ok()
            .flatten()
    }

    /// returns the [`serde_json::Value`] contained in the session hashmap
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    /// removes an entry from the session hashmap
    pub fn remove(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.data_changed = true;
        }
    }

    /// Takes an entry from the session hashmap
    ///
    /// # Example
    ///
    /// ```rust
    /// # use pluggable_session::Session;
    /// let mut session = Session::new();
    /// session.insert("key", "value").unwrap();
    /// let took = session.take_value("key").unwrap();
    /// assert_eq!(took.to_string(), "\"value\"");
    /// assert!(session.get_value("key").is_none());
    /// assert_eq!(session.len(), 0);
    /// ```
    pub fn take_value(&mut self, key: &str) -> Option<Value> {
        let took = self.data.remove(key);
        if took.is_some() {
            self.data_changed = true;
        }
        took
    }

    /// returns the number of elements in the session hashmap
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// returns a boolean indicating whether there are zero elements in the session hashmap
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checks if the data has been modified since the session was
    /// loaded or last saved.
    pub fn data_changed(&self) -> bool {
        self.data_changed
    }

    /// Resets `data_changed` dirty tracking. Stores call this once the
    /// data has been persisted.
    pub fn reset_data_changed(&mut self) {
        self.data_changed = false;
    }

    /// Persists this session through its owning store and returns the
    /// persisted id.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use pluggable_session::{SessionConfig, Store};
    /// # use pluggable_session_memory_store::MemoryStore;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> { async_std::task::block_on(async {
    /// let store = Store::new(MemoryStore::new(), &SessionConfig::default())?;
    /// let mut session = store.get("").await?;
    /// session.insert("k", "v")?;
    /// let id = session.save().await?;
    ///
    /// let session = store.get(&id).await?;
    /// assert_eq!("v", session.get::<String>("k").unwrap());
    /// # Ok(()) }) }
    /// ```
    pub async fn save(&mut self) -> Result<String> {
        match self.owner.clone() {
            Some(store) => store.save(self).await,
            None => Err(Error::Detached(self.id.clone())),
        }
    }

    /// Destroys the stored record of this session through its owning
    /// store.
    pub async fn destroy(self) -> Result<()> {
        match &self.owner {
            Some(store) => store.destroy(&self.id).await,
            None => Err(Error::Detached(self.id)),
        }
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        other.id == self.id
    }
}
