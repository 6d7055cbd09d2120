//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes. Every statement is
/// idempotent, so several daemons may run it against the same database.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    let client = db.checked_client().await?;

    tracing::info!("Initializing database schema...");

    client.query(SEQUENCE_SCHEMA).await?.check()?;
    client.query(JOB_INSTANCE_SCHEMA).await?.check()?;
    client.query(JOB_EXECUTION_SCHEMA).await?.check()?;
    client.query(QUEUE_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Counters backing the integer record ids of queue messages and job executions.
const SEQUENCE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS sequence SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS value ON sequence TYPE int DEFAULT 0;
"#;

/// Job instance table: the configured job a job execution runs.
const JOB_INSTANCE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job_instance SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS code ON job_instance TYPE string;
DEFINE FIELD IF NOT EXISTS job_name ON job_instance TYPE string;
DEFINE FIELD IF NOT EXISTS job_type ON job_instance TYPE string;

DEFINE INDEX IF NOT EXISTS job_instance_code ON job_instance FIELDS code UNIQUE;
"#;

/// Job execution table, written by the job process and the consumer daemon.
const JOB_EXECUTION_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job_execution SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_instance ON job_execution TYPE record<job_instance>;
DEFINE FIELD IF NOT EXISTS status ON job_execution TYPE string DEFAULT "STARTING";
DEFINE FIELD IF NOT EXISTS exit_code ON job_execution TYPE string DEFAULT "UNKNOWN";
DEFINE FIELD IF NOT EXISTS create_time ON job_execution TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS health_check_time ON job_execution TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS updated_time ON job_execution TYPE option<datetime>;

DEFINE INDEX IF NOT EXISTS job_execution_instance ON job_execution FIELDS job_instance;
"#;

/// Job execution queue table.
const QUEUE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job_execution_queue SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS job_execution_id ON job_execution_queue TYPE int;
DEFINE FIELD IF NOT EXISTS consumer ON job_execution_queue TYPE option<string>;
DEFINE FIELD IF NOT EXISTS create_time ON job_execution_queue TYPE datetime DEFAULT time::now();
DEFINE FIELD IF NOT EXISTS updated_time ON job_execution_queue TYPE option<datetime>;
DEFINE FIELD IF NOT EXISTS options ON job_execution_queue TYPE string DEFAULT "{}";

-- Claim polling: unclaimed messages in id order
DEFINE INDEX IF NOT EXISTS queue_consumer ON job_execution_queue FIELDS consumer;
DEFINE INDEX IF NOT EXISTS queue_job_execution ON job_execution_queue FIELDS job_execution_id;
"#;
