//! MongoDB backend for [`pluggable_session`].
//!
//! Each session is one document in a configurable collection. The store
//! sets an absolute deadline on every save and leaves purging to the
//! server's TTL monitor.
//!
//! # Testing
//!
//! Configuration, document mapping and connection failure are tested
//! offline. The tests that load, save and destroy sessions need a
//! disposable server and only run when `MONGODB_SESSION_TEST_HOSTS`
//! names one (a `Hosts`-style list); otherwise they return early:
//!
//! ```text
//! MONGODB_SESSION_TEST_HOSTS=localhost:27017 cargo test -p pluggable-session-mongodb-store
//! ```
//!
//! Each run writes to a fresh `pluggable_session_test.sessions_<oid>`
//! collection.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations, nonstandard_style, missing_docs)]

mod config;
mod document;
mod store;

pub use config::{MongoStoreConfig, DEFAULT_COLLECTION, DEFAULT_TIMEOUT_SECS};
pub use store::MongoStore;
