//! Job instance and job execution records.
//!
//! These records belong to the batch subsystem. The queue only needs to read
//! them, but creating them here keeps a fresh database usable end to end.

use chrono::{DateTime, Utc};
use queue_core::{BatchStatus, ExitStatus, JobExecutionId, JobExecutionStatus};
use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;

use super::message_repo::numeric_id;
use crate::{Database, DbError};

/// Repository for job instances and job executions.
#[derive(Clone)]
pub struct JobExecutionRepository {
    db: Database,
}

/// A configured job that job executions run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInstance {
    pub code: String,
    pub job_name: String,
    pub job_type: String,
}

/// Internal record type for SurrealDB reads.
#[derive(Debug, Deserialize)]
struct JobExecutionRecord {
    id: Thing,
    job_instance_code: Option<String>,
    status: BatchStatus,
    exit_code: ExitStatus,
    health_check_time: Option<DateTime<Utc>>,
    updated_time: Option<DateTime<Utc>>,
}

impl JobExecutionRecord {
    fn into_status(self) -> Result<JobExecutionStatus, DbError> {
        Ok(JobExecutionStatus {
            id: JobExecutionId(numeric_id(&self.id)?),
            job_instance_code: self.job_instance_code.unwrap_or_default(),
            status: self.status,
            exit_code: self.exit_code,
            health_check_time: self.health_check_time,
            updated_time: self.updated_time,
        })
    }
}

const CREATE_JOB_EXECUTION: &str = r#"
CREATE type::thing('job_execution',
    (UPSERT sequence:job_execution SET value = (value OR 0) + 1 RETURN VALUE value)[0]
)
SET job_instance = type::thing('job_instance', $code),
    status = $status,
    exit_code = $exit_code
RETURN VALUE id;
"#;

const SELECT_JOB_EXECUTION: &str = r#"
SELECT id, job_instance.code AS job_instance_code, status, exit_code, health_check_time, updated_time
FROM type::thing('job_execution', $id);
"#;

impl JobExecutionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a job instance, keyed by its code.
    pub async fn create_instance(&self, instance: &JobInstance) -> Result<JobInstance, DbError> {
        let db = self.db.client().await;

        let record: Option<JobInstance> = db
            .create(("job_instance", instance.code.clone()))
            .content(instance.clone())
            .await?;

        record.ok_or_else(|| DbError::Query("Failed to create job instance".into()))
    }

    /// Create a job execution of a job instance, in the STARTING state.
    pub async fn create(&self, job_instance_code: &str) -> Result<JobExecutionStatus, DbError> {
        let db = self.db.client().await;

        let mut result = db
            .query(CREATE_JOB_EXECUTION)
            .bind(("code", job_instance_code.to_string()))
            .bind(("status", BatchStatus::Starting))
            .bind(("exit_code", ExitStatus::Unknown))
            .await?
            .check()?;

        let ids: Vec<Thing> = result.take(0)?;
        let id = ids
            .first()
            .ok_or_else(|| DbError::Query("Failed to create job execution".into()))?;

        self.get(JobExecutionId(numeric_id(id)?)).await
    }

    /// Get a job execution's status row.
    pub async fn get(&self, id: JobExecutionId) -> Result<JobExecutionStatus, DbError> {
        let db = self.db.client().await;

        let mut result = db
            .query(SELECT_JOB_EXECUTION)
            .bind(("id", id.0))
            .await?;

        let records: Vec<JobExecutionRecord> = result.take(0)?;

        records
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("Job execution not found: {}", id)))?
            .into_status()
    }

    /// Get the code of the job instance a job execution belongs to.
    ///
    /// Returns `None` when the job execution does not exist.
    pub async fn job_instance_code(&self, id: JobExecutionId) -> Result<Option<String>, DbError> {
        let db = self.db.checked_client().await?;

        let mut result = db
            .query("SELECT VALUE job_instance.code FROM type::thing('job_execution', $id)")
            .bind(("id", id.0))
            .await?;

        let codes: Vec<Option<String>> = result.take(0)?;

        Ok(codes.into_iter().next().flatten())
    }

    /// Record a status as the job process itself does.
    pub async fn update_status(
        &self,
        id: JobExecutionId,
        status: BatchStatus,
        exit_code: ExitStatus,
    ) -> Result<JobExecutionStatus, DbError> {
        let db = self.db.client().await;

        db.query(
            "UPDATE type::thing('job_execution', $id) SET status = $status, exit_code = $exit_code, updated_time = time::now()",
        )
        .bind(("id", id.0))
        .bind(("status", status))
        .bind(("exit_code", exit_code))
        .await?
        .check()?;

        self.get(id).await
    }
}
