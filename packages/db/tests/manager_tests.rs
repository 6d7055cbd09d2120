#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;

use db::JobExecutionManager;
use queue_core::{BatchStatus, ExitStatus, JobExecutionId};

#[tokio::test]
async fn exit_status_of_missing_job_execution_is_none() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let manager = JobExecutionManager::new(db);

    assert_eq!(manager.get_exit_status(JobExecutionId(404)).await?, None);

    Ok(())
}

#[tokio::test]
async fn new_job_execution_reports_unknown_exit_status() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = common::job_instance(&db, "csv_product_export").await?;
    let execution = jobs.create("csv_product_export").await?;
    let manager = JobExecutionManager::new(db);

    assert_eq!(execution.status, BatchStatus::Starting);
    assert_eq!(execution.job_instance_code, "csv_product_export");
    assert_eq!(
        manager.get_exit_status(execution.id).await?,
        Some(ExitStatus::Unknown)
    );
    assert_eq!(
        jobs.job_instance_code(execution.id).await?.as_deref(),
        Some("csv_product_export")
    );
    assert_eq!(jobs.job_instance_code(JobExecutionId(404)).await?, None);

    Ok(())
}

#[tokio::test]
async fn mark_as_failed_overrides_executing_status() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = common::job_instance(&db, "xlsx_import").await?;
    let execution = jobs.create("xlsx_import").await?;
    jobs.update_status(execution.id, BatchStatus::Executing, ExitStatus::Executing)
        .await?;
    let manager = JobExecutionManager::new(db);

    manager.mark_as_failed(execution.id).await?;

    let after = jobs.get(execution.id).await?;
    assert_eq!(after.status, BatchStatus::Failed);
    assert_eq!(after.exit_code, ExitStatus::Failed);
    assert!(after.updated_time.is_some());
    assert_eq!(
        manager.get_exit_status(execution.id).await?,
        Some(ExitStatus::Failed)
    );

    Ok(())
}

#[tokio::test]
async fn health_checks_strictly_increase() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = common::job_instance(&db, "compute_completeness").await?;
    let execution = jobs.create("compute_completeness").await?;
    let manager = JobExecutionManager::new(db);

    assert!(execution.health_check_time.is_none());

    let mut previous = None;
    for _ in 0..5 {
        manager.update_health_check(execution.id).await?;
        let current = jobs
            .get(execution.id)
            .await?
            .health_check_time
            .ok_or("health check time must be set")?;
        if let Some(previous) = previous {
            assert!(current > previous);
        }
        previous = Some(current);
    }

    // Status is left to the job process.
    let after = jobs.get(execution.id).await?;
    assert_eq!(after.status, BatchStatus::Starting);
    assert!(after.updated_time.is_some());

    Ok(())
}

#[tokio::test]
async fn tracker_writes_to_missing_job_execution_are_noops() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let manager = JobExecutionManager::new(db);

    manager.update_health_check(JobExecutionId(404)).await?;
    manager.mark_as_failed(JobExecutionId(404)).await?;
    assert_eq!(manager.get_exit_status(JobExecutionId(404)).await?, None);

    Ok(())
}
