//! SurrealDB integration for the job execution queue.
//!
//! This crate provides database connectivity, the message store and queue,
//! and the status tracker used by the consumer daemon.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage
//! - `remote`: Connect to a shared SurrealDB server over WebSocket

mod connection;
mod manager;
mod queue;
mod schema;
pub mod repositories;

pub use connection::{Client, Database, DbConfig, DbError};
pub use manager::JobExecutionManager;
pub use queue::DatabaseJobExecutionQueue;
pub use schema::init_schema;

/// Connect to the database and make sure the schema exists.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<Database, DbError> {
    let db = Database::connect(config).await?;
    init_schema(&db).await?;
    Ok(db)
}
