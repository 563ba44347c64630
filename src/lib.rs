//! Pluggable session persistence.
//!
//! This crate provides a generic interface between a request-handling
//! server and durable storage backends to create a concept of sessions:
//! an id plus a bag of json values. Backends implement
//! [`SessionStore`]; everything above them talks to a [`Store`] handle.
//!
//! Cookie transport and the request pipeline are left to the caller.
//!
//! # Example
//!
//! ```
//! use pluggable_session::{SessionConfig, Store};
//! use pluggable_session_memory_store::MemoryStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # async_std::task::block_on(async {
//! #
//! // Init a new session store we can persist sessions to.
//! let config = SessionConfig::from_json(r#"{"MaxAge": 86400}"#)?;
//! let store = Store::new(MemoryStore::new(), &config)?;
//!
//! // A request without a session id gets a fresh session.
//! let mut session = store.get("").await?;
//! session.insert("user_id", 1)?;
//! assert!(session.data_changed());
//!
//! // Persist it; the id is what the caller hands back to the client.
//! let id = session.save().await?;
//!
//! // Retrieve the session using the id.
//! let session = store.get(&id).await?;
//! assert_eq!(session.get::<usize>("user_id").unwrap(), 1);
//! assert!(!session.data_changed());
//! #
//! # Ok(()) }) }
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    unused_qualifications
)]

mod config;
mod error;
mod id;
mod session;
mod session_store;
mod store;

pub use config::{SessionConfig, DEFAULT_MAX_AGE, MAX_AGE_LIMIT};
pub use error::{BoxError, Error, Result};
pub use id::{generate_id, is_well_formed_id};
pub use session::Session;
pub use session_store::SessionStore;
pub use store::Store;

pub use async_trait::async_trait;
