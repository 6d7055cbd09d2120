//! Message store for job execution queue entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use queue_core::{JobExecutionId, JobExecutionMessage, JobOptions, MessageId};
use serde::Deserialize;
use surrealdb::sql::{Id, Thing};
use tokio::sync::Mutex;

use crate::{Database, DbError};

/// Attempts made when the engine reports a write conflict between claims.
const CONFLICT_RETRIES: u32 = 16;

/// Repository for queue message persistence.
///
/// Claims issued through clones of the same repository are serialized
/// in-process; the claim statement itself is conditional on the row still
/// being unclaimed, which keeps claims from separate processes exclusive.
#[derive(Clone)]
pub struct JobExecutionMessageRepository {
    db: Database,
    claim_lock: Arc<Mutex<()>>,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct MessageRecord {
    id: Thing,
    job_execution_id: i64,
    consumer: Option<String>,
    create_time: DateTime<Utc>,
    updated_time: Option<DateTime<Utc>>,
    options: String,
}

impl MessageRecord {
    fn into_message(self) -> Result<JobExecutionMessage, DbError> {
        let options: JobOptions = serde_json::from_str(&self.options)?;

        Ok(JobExecutionMessage {
            id: Some(MessageId(numeric_id(&self.id)?)),
            job_execution_id: JobExecutionId(self.job_execution_id),
            consumer: self.consumer,
            create_time: self.create_time,
            updated_time: self.updated_time,
            options,
        })
    }
}

/// Extract the integer key of a record id.
pub(crate) fn numeric_id(thing: &Thing) -> Result<i64, DbError> {
    match &thing.id {
        Id::Number(n) => Ok(*n),
        other => Err(DbError::Serialization(format!(
            "expected integer id for {}, got {}",
            thing.tb, other
        ))),
    }
}

/// Insert a message under the next value of the queue sequence.
const INSERT_MESSAGE: &str = r#"
CREATE type::thing('job_execution_queue',
    (UPSERT sequence:job_execution_queue SET value = (value OR 0) + 1 RETURN VALUE value)[0]
)
SET job_execution_id = $job_execution_id,
    options = $options,
    create_time = <datetime> $create_time
RETURN AFTER;
"#;

/// Assign the oldest unclaimed message to a consumer, in one statement.
const CLAIM_OLDEST_UNASSIGNED: &str = r#"
UPDATE (SELECT id FROM job_execution_queue WHERE consumer = NONE ORDER BY id ASC LIMIT 1).id
SET consumer = $consumer, updated_time = time::now()
WHERE consumer = NONE
RETURN AFTER;
"#;

impl JobExecutionMessageRepository {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            claim_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Persist a new message and return it with its assigned id.
    ///
    /// The consumer and updated time of the given message are ignored: a new
    /// message is always unclaimed.
    pub async fn insert(&self, message: &JobExecutionMessage) -> Result<JobExecutionMessage, DbError> {
        let options = serde_json::to_string(&message.options)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let db = self.db.client().await;

            let result = db
                .query(INSERT_MESSAGE)
                .bind(("job_execution_id", message.job_execution_id.0))
                .bind(("options", options.clone()))
                .bind(("create_time", message.create_time))
                .await
                .and_then(|response| response.check());

            let mut response = match result.map_err(DbError::from) {
                Ok(response) => response,
                Err(err) if err.is_retryable_conflict() && attempt < CONFLICT_RETRIES => {
                    tracing::debug!("Message insert conflicted, retrying (attempt {})", attempt);
                    backoff(attempt).await;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let records: Vec<MessageRecord> = response.take(0)?;

            return records
                .into_iter()
                .next()
                .ok_or_else(|| DbError::Query("Failed to create queue message".into()))?
                .into_message();
        }
    }

    /// Atomically claim the oldest unclaimed message for a consumer.
    ///
    /// Returns `None` when no message is waiting.
    pub async fn claim_oldest_unassigned(
        &self,
        consumer: &str,
    ) -> Result<Option<JobExecutionMessage>, DbError> {
        let _guard = self.claim_lock.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let db = self.db.client().await;

            let result = db
                .query(CLAIM_OLDEST_UNASSIGNED)
                .bind(("consumer", consumer.to_string()))
                .await
                .and_then(|response| response.check());

            let mut response = match result.map_err(DbError::from) {
                Ok(response) => response,
                Err(err) if err.is_retryable_conflict() && attempt < CONFLICT_RETRIES => {
                    tracing::debug!(consumer, "Claim conflicted, retrying (attempt {})", attempt);
                    backoff(attempt).await;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let records: Vec<MessageRecord> = response.take(0)?;

            return match records.into_iter().next() {
                Some(record) if record.consumer.as_deref() == Some(consumer) => {
                    record.into_message().map(Some)
                }
                Some(record) => Err(DbError::Query(format!(
                    "Message {} was claimed by {:?} instead of {}",
                    record.id, record.consumer, consumer
                ))),
                None => Ok(None),
            };
        }
    }

    /// Get a message by id.
    pub async fn get(&self, id: MessageId) -> Result<JobExecutionMessage, DbError> {
        let db = self.db.client().await;

        let record: Option<MessageRecord> = db.select(("job_execution_queue", id.0)).await?;

        record
            .ok_or_else(|| DbError::NotFound(format!("Queue message not found: {}", id)))?
            .into_message()
    }

    /// List the messages published for a job execution, oldest first.
    pub async fn find_by_job_execution(
        &self,
        job_execution_id: JobExecutionId,
    ) -> Result<Vec<JobExecutionMessage>, DbError> {
        let db = self.db.client().await;

        let mut result = db
            .query(
                "SELECT * FROM job_execution_queue WHERE job_execution_id = $job_execution_id ORDER BY id ASC",
            )
            .bind(("job_execution_id", job_execution_id.0))
            .await?;

        let records: Vec<MessageRecord> = result.take(0)?;

        records.into_iter().map(MessageRecord::into_message).collect()
    }

    /// Count messages nobody has claimed yet.
    pub async fn count_unclaimed(&self) -> Result<u64, DbError> {
        let db = self.db.client().await;

        let mut result = db
            .query("SELECT count() FROM job_execution_queue WHERE consumer = NONE GROUP ALL")
            .await?;

        #[derive(Deserialize)]
        struct CountResult {
            count: i64,
        }

        let counts: Vec<CountResult> = result.take(0)?;

        Ok(counts.first().map_or(0, |c| c.count.max(0) as u64))
    }
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
}
