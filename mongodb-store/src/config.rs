use mongodb::options::{ClientOptions, Credential, ServerAddress};
use pluggable_session::{Error, Result};
use serde::Deserialize;
use std::{fmt, time::Duration};

/// collection used when the options leave it unset or empty
pub const DEFAULT_COLLECTION: &str = "sessions";

/// dial and server selection timeout when the options name none
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for [`MongoStore`](crate::MongoStore), read once at
/// construction.
///
/// The json form mirrors the options record used by the session manager:
///
/// ```json
/// {
///     "Hosts": "db1:27017,db2:27017",
///     "Database": "app",
///     "Collection": "sessions",
///     "Username": "",
///     "Password": "",
///     "Timeout": 60
/// }
/// ```
///
/// `Collection`, `Username`, `Password` and `Timeout` may be omitted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MongoStoreConfig {
    hosts: String,
    database: String,
    #[serde(default)]
    collection: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl fmt::Debug for MongoStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoStoreConfig")
            .field("hosts", &self.hosts)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MongoStoreConfig {
    /// Settings for an unauthenticated deployment at `hosts`
    /// (comma-separated `host[:port]` list).
    pub fn new(hosts: impl Into<String>, database: impl Into<String>) -> Result<Self> {
        Self {
            hosts: hosts.into(),
            database: database.into(),
            collection: String::new(),
            username: String::new(),
            password: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
        .validate()
    }

    /// Parses the json options record.
    pub fn from_json(options: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(options)
            .map_err(|e| Error::Configuration(format!("unreadable mongodb store options: {e}")))?;
        config.validate()
    }

    /// Stores sessions in `collection` instead of the default.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self.fill_defaults();
        self
    }

    /// Authenticates against the configured database.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Overrides the dial timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.timeout = timeout.as_secs();
        self.validate()
    }

    /// Host list, split on commas with whitespace trimmed.
    pub fn hosts(&self) -> Vec<&str> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .collect()
    }

    /// Database holding the session collection.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Name of the session collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Dial and server selection timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Driver options for these settings.
    pub(crate) fn client_options(&self) -> Result<ClientOptions> {
        let hosts = self
            .hosts()
            .into_iter()
            .map(|host| {
                ServerAddress::parse(host)
                    .map_err(|e| Error::Configuration(format!("bad host `{host}`: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut options = ClientOptions::builder().hosts(hosts).build();
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.default_database = Some(self.database.clone());
        options.connect_timeout = Some(self.timeout());
        options.server_selection_timeout = Some(self.timeout());

        if !self.username.is_empty() {
            let mut credential = Credential::default();
            credential.username = Some(self.username.clone());
            credential.password = Some(self.password.clone());
            credential.source = Some(self.database.clone());
            options.credential = Some(credential);
        }

        Ok(options)
    }

    fn fill_defaults(&mut self) {
        if self.collection.is_empty() {
            self.collection = DEFAULT_COLLECTION.to_string();
        }
    }

    fn validate(mut self) -> Result<Self> {
        if self.hosts().is_empty() {
            return Err(Error::Configuration("Hosts must name at least one host".into()));
        }
        if self.database.trim().is_empty() {
            return Err(Error::Configuration("Database is required".into()));
        }
        if self.timeout == 0 {
            return Err(Error::Configuration("Timeout must be positive".into()));
        }
        self.fill_defaults();
        self.client_options()?;
        Ok(self)
    }
}
