//! Database connection management with liveness checks and reconnection.

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::any::{Any, connect};
use surrealdb::error::Api;
use surrealdb::opt::auth::Root;
use thiserror::Error;
use tokio::sync::RwLock;

/// Raw SurrealDB client handle.
pub type Client = Surreal<Any>;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection endpoint: "mem://", "file://path", "rocksdb://path" or "ws://host:port"
    pub endpoint: String,
    /// Namespace to use
    pub namespace: String,
    /// Database name to use
    pub database: String,
    /// Optional root credentials for authentication
    pub credentials: Option<(String, String)>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            namespace: "batch".to_string(),
            database: "main".to_string(),
            credentials: None,
        }
    }
}

impl DbConfig {
    /// Create a config for in-memory testing.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for file-based persistence.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("file://{}", path.into()),
            ..Default::default()
        }
    }

    /// Create a config for RocksDB persistence (requires rocksdb feature).
    pub fn rocksdb(path: impl Into<String>) -> Self {
        Self {
            endpoint: format!("rocksdb://{}", path.into()),
            ..Default::default()
        }
    }

    /// Create a config for a shared SurrealDB server (requires remote feature).
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            endpoint: url.into(),
            ..Default::default()
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database name.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set root credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `BATCH_QUEUE_DB_ENDPOINT` (default: `mem://`)
    /// - `BATCH_QUEUE_DB_NAMESPACE` (default: `batch`)
    /// - `BATCH_QUEUE_DB_DATABASE` (default: `main`)
    /// - `BATCH_QUEUE_DB_USER` and `BATCH_QUEUE_DB_PASSWORD` (optional, both required to sign in)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok().and_then(non_empty);

        let credentials = match (var("BATCH_QUEUE_DB_USER"), var("BATCH_QUEUE_DB_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        Self {
            endpoint: var("BATCH_QUEUE_DB_ENDPOINT").unwrap_or(defaults.endpoint),
            namespace: var("BATCH_QUEUE_DB_NAMESPACE").unwrap_or(defaults.namespace),
            database: var("BATCH_QUEUE_DB_DATABASE").unwrap_or(defaults.database),
            credentials,
        }
    }

    /// Whether the endpoint is an in-process memory store.
    ///
    /// Reopening such a store yields a new, empty database.
    pub fn is_memory(&self) -> bool {
        self.endpoint.starts_with("mem:") || self.endpoint == "memory"
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(surrealdb::Error),
    #[error("Database error: {0}")]
    Database(surrealdb::Error),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<surrealdb::Error> for DbError {
    fn from(err: surrealdb::Error) -> Self {
        if is_transport_error(&err) {
            DbError::Connection(err)
        } else {
            DbError::Database(err)
        }
    }
}

/// Whether the client lost or never had its connection.
///
/// Other API errors, such as a response that fails to deserialize, happen
/// after the statement ran and must not be retried.
fn is_transport_error(err: &surrealdb::Error) -> bool {
    matches!(
        err,
        surrealdb::Error::Api(Api::Http(_) | Api::Ws(_) | Api::ConnectionUninitialised)
    )
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl DbError {
    /// Whether the error came from the client transport rather than a statement.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::Connection(_) | DbError::StorageUnavailable(_))
    }

    /// Whether the engine rejected a transaction because of a concurrent write.
    pub fn is_retryable_conflict(&self) -> bool {
        match self {
            DbError::Database(err) => {
                let message = err.to_string();
                message.contains("can be retried") || message.contains("conflict")
            }
            _ => false,
        }
    }
}

/// Shared database handle.
///
/// Cloning is cheap; all clones observe reconnections.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    config: DbConfig,
    client: RwLock<Client>,
}

impl Database {
    /// Open a connection with the given configuration.
    pub async fn connect(config: DbConfig) -> Result<Self, DbError> {
        let client = open(&config).await?;
        Ok(Self {
            inner: Arc::new(DatabaseInner {
                config,
                client: RwLock::new(client),
            }),
        })
    }

    /// The configuration this handle was opened with.
    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// Current client, without checking that the connection is alive.
    pub async fn client(&self) -> Client {
        self.inner.client.read().await.clone()
    }

    /// Current client, reopened first if the connection does not answer a
    /// health check.
    pub async fn checked_client(&self) -> Result<Client, DbError> {
        let client = self.client().await;

        match client.health().await {
            Ok(()) => Ok(client),
            Err(err) => {
                tracing::warn!("Database health check failed: {}", err);
                self.reconnect().await
            }
        }
    }

    /// Close the current connection and open a new one.
    pub async fn reconnect(&self) -> Result<Client, DbError> {
        let config = &self.inner.config;

        if config.is_memory() {
            return Err(DbError::StorageUnavailable(
                "in-memory database cannot be reopened".into(),
            ));
        }

        let mut guard = self.inner.client.write().await;

        // Another caller may have reconnected while we waited for the lock.
        if guard.health().await.is_ok() {
            return Ok(guard.clone());
        }

        tracing::info!("Reconnecting to database: {}", config.endpoint);
        let client = open(config)
            .await
            .map_err(|e| DbError::StorageUnavailable(e.to_string()))?;
        *guard = client.clone();

        Ok(client)
    }
}

async fn open(config: &DbConfig) -> Result<Client, DbError> {
    tracing::info!("Connecting to database: {}", config.endpoint);

    let db = connect(&config.endpoint).await?;

    // Authenticate if credentials provided
    if let Some((username, password)) = &config.credentials {
        db.signin(Root {
            username,
            password,
        })
        .await?;
    }

    // Select namespace and database
    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await?;

    tracing::info!(
        "Connected to database: {}/{}",
        config.namespace,
        config.database
    );

    Ok(db)
}
