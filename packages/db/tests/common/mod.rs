#![allow(dead_code)]

use db::repositories::{JobExecutionRepository, JobInstance};
use db::{Database, DbConfig, DbError};

/// Open an isolated in-memory database with the schema applied.
pub async fn setup_db() -> Result<Database, DbError> {
    db::init(DbConfig::memory()).await
}

/// Create a job instance and return the repository used to run it.
pub async fn job_instance(db: &Database, code: &str) -> Result<JobExecutionRepository, DbError> {
    let jobs = JobExecutionRepository::new(db.clone());
    jobs.create_instance(&JobInstance {
        code: code.to_string(),
        job_name: code.to_string(),
        job_type: "export".to_string(),
    })
    .await?;
    Ok(jobs)
}
