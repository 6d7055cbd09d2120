#![allow(dead_code)]

use std::time::Duration;

use consumer::{ConsumerConfig, JobCommand};
use db::repositories::{JobExecutionRepository, JobInstance};
use db::{Database, DbConfig, DbError};
use queue_core::{BatchStatus, ExitStatus, JobExecutionId};

/// Open an isolated in-memory database with the schema applied.
pub async fn setup_db() -> Result<Database, DbError> {
    db::init(DbConfig::memory()).await
}

/// Create a job execution, and its job instance if needed, in the given state.
pub async fn job_execution(
    db: &Database,
    code: &str,
    status: BatchStatus,
    exit_code: ExitStatus,
) -> Result<JobExecutionId, DbError> {
    let jobs = JobExecutionRepository::new(db.clone());
    // Instances are keyed by code; an existing one is reused.
    let _ = jobs
        .create_instance(&JobInstance {
            code: code.to_string(),
            job_name: code.to_string(),
            job_type: "export".to_string(),
        })
        .await;

    let execution = jobs.create(code).await?;
    jobs.update_status(execution.id, status, exit_code).await?;
    Ok(execution.id)
}

/// A job command running a shell script.
///
/// The script sees the job instance code as `$0`, the job execution id as `$1`
/// and the options after it.
pub fn shell_job(script: &str) -> JobCommand {
    JobCommand::new("/bin/sh").with_arg("-c").with_arg(script)
}

/// Consumer configuration with short intervals.
pub fn fast_config(job_command: JobCommand) -> ConsumerConfig {
    ConsumerConfig::new(job_command)
        .with_health_check_interval(Duration::from_millis(50))
        .with_poll_interval(Duration::from_millis(20))
}
