//! Status tracker for the job executions run by the consumer daemon.

use queue_core::{BatchStatus, ExitStatus, JobExecutionId};

use crate::{Database, DbError};

/// Reads and repairs the status row of job executions.
///
/// Used by a long-running daemon, so nothing is cached: every call round-trips
/// to storage, and the connection is checked (and reopened if needed) before
/// each operation.
#[derive(Clone)]
pub struct JobExecutionManager {
    db: Database,
}

impl JobExecutionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the exit status of a job execution.
    ///
    /// Returns `None` if the job execution does not exist.
    pub async fn get_exit_status(&self, id: JobExecutionId) -> Result<Option<ExitStatus>, DbError> {
        let db = self.db.checked_client().await?;

        let mut result = db
            .query("SELECT VALUE exit_code FROM type::thing('job_execution', $id)")
            .bind(("id", id.0))
            .await?;

        let codes: Vec<Option<String>> = result.take(0)?;

        codes
            .into_iter()
            .next()
            .flatten()
            .map(|code| {
                code.parse::<ExitStatus>()
                    .map_err(|e| DbError::Serialization(e.to_string()))
            })
            .transpose()
    }

    /// Mark a job execution as failed, whatever its current status.
    pub async fn mark_as_failed(&self, id: JobExecutionId) -> Result<(), DbError> {
        let db = self.db.checked_client().await?;

        db.query(
            r#"
            UPDATE type::thing('job_execution', $id)
            SET status = $status,
                exit_code = $exit_code,
                updated_time = time::now()
            "#,
        )
        .bind(("id", id.0))
        .bind(("status", BatchStatus::Failed))
        .bind(("exit_code", ExitStatus::Failed))
        .await?
        .check()?;

        Ok(())
    }

    /// Record a liveness ping for a job execution.
    ///
    /// Successive pings for the same job execution are strictly increasing.
    pub async fn update_health_check(&self, id: JobExecutionId) -> Result<(), DbError> {
        let db = self.db.checked_client().await?;

        db.query(
            r#"
            UPDATE type::thing('job_execution', $id)
            SET health_check_time = time::max([time::now(), (health_check_time OR time::now()) + 1ns]),
                updated_time = time::now()
            "#,
        )
        .bind(("id", id.0))
        .await?
        .check()?;

        Ok(())
    }
}
