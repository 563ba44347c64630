use mongodb::bson::{self, DateTime, Document};
use pluggable_session::{Error, Result, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, time::Duration};

pub(crate) const SID: &str = "sid";
pub(crate) const EXPIRE_AT: &str = "expireat";

/// One session as stored in the collection:
/// `{sid: string, expireat: date, data: document}`.
///
/// `expireat` is a bson date because the server's TTL monitor ignores
/// any other type. Records written with an int64 `expireat` (epoch
/// seconds) never match the `$gt` date filter used by lookups and are
/// never purged by the TTL index; they have to be migrated or removed by
/// hand.
///
/// `data` is converted to bson before any request is made, so values
/// bson cannot hold (an integer above `i64::MAX`, say) are rejected up
/// front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    pub(crate) sid: String,
    #[serde(rename = "expireat")]
    pub(crate) expire_at: DateTime,
    pub(crate) data: Document,
}

impl StoredSession {
    pub(crate) fn new(session: &Session, saved_at: DateTime, max_age: Duration) -> Result<Self> {
        let data = bson::to_document(session.data())
            .map_err(|e| Error::Serialization(Box::new(e)))?;
        Ok(Self {
            sid: session.id().to_string(),
            expire_at: expiry(saved_at, max_age),
            data,
        })
    }

    pub(crate) fn into_session(self) -> Result<Session> {
        let data: HashMap<String, Value> =
            bson::from_document(self.data).map_err(|e| Error::Serialization(Box::new(e)))?;
        Ok(Session::from_parts(self.sid, data))
    }
}

/// save time plus max-age, at whole-second resolution
pub(crate) fn expiry(saved_at: DateTime, max_age: Duration) -> DateTime {
    let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    let seconds = (saved_at.timestamp_millis() / 1000).saturating_add(max_age);
    DateTime::from_millis(seconds.saturating_mul(1000))
}
