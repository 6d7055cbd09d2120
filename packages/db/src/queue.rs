//! Database-backed job execution queue.

use std::future::Future;

use queue_core::{JobExecutionId, JobExecutionMessage, JobOptions, MessageId};

use crate::repositories::JobExecutionMessageRepository;
use crate::{Database, DbError};

/// Queue of job execution messages stored in a single table.
///
/// Messages are consumed in publication order; each message is handed to at
/// most one consumer.
#[derive(Clone)]
pub struct DatabaseJobExecutionQueue {
    db: Database,
    messages: JobExecutionMessageRepository,
}

impl DatabaseJobExecutionQueue {
    pub fn new(db: Database) -> Self {
        let messages = JobExecutionMessageRepository::new(db.clone());
        Self { db, messages }
    }

    /// Publish a message. No deduplication is done.
    pub async fn publish(&self, message: &JobExecutionMessage) -> Result<JobExecutionMessage, DbError> {
        self.with_reconnect(|| self.messages.insert(message)).await
    }

    /// Publish a message for a job execution and return the message id.
    pub async fn publish_job_execution(
        &self,
        job_execution_id: JobExecutionId,
        options: JobOptions,
    ) -> Result<MessageId, DbError> {
        let message = JobExecutionMessage::new(job_execution_id).with_options(options);
        let published = self.publish(&message).await?;

        published
            .id
            .ok_or_else(|| DbError::Query("Published message has no id".into()))
    }

    /// Claim the oldest unclaimed message for a consumer.
    ///
    /// Returns `None` immediately when the queue is empty; waiting is up to
    /// the caller.
    pub async fn consume(&self, consumer: &str) -> Result<Option<JobExecutionMessage>, DbError> {
        self.with_reconnect(|| self.messages.claim_oldest_unassigned(consumer))
            .await
    }

    /// The message store backing this queue.
    pub fn messages(&self) -> &JobExecutionMessageRepository {
        &self.messages
    }

    /// Run an operation, retrying it once after checking the connection when
    /// it fails at the transport level.
    async fn with_reconnect<T, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        match op().await {
            Err(err) if err.is_connection_error() => {
                tracing::warn!("Queue operation failed, checking connection: {}", err);
                self.db.checked_client().await?;
                op().await
            }
            result => result,
        }
    }
}
