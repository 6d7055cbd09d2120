//! One iteration of the consumer daemon: claim, launch, supervise, reap.

use std::backtrace::Backtrace;

use chrono::Utc;
use db::repositories::JobExecutionRepository;
use db::{Database, DatabaseJobExecutionQueue, JobExecutionManager};
use job_logs::JobLogStore;
use queue_core::{ConsumerEvent, JobExecutionId, JobExecutionMessage};
use tokio::sync::broadcast;

use crate::config::ConsumerConfig;
use crate::error::ConsumerError;
use crate::process::{CapturedOutput, JobProcess};

/// Consumes job execution messages and runs them as child processes.
pub struct JobQueueConsumer {
    name: String,
    queue: DatabaseJobExecutionQueue,
    manager: JobExecutionManager,
    job_executions: JobExecutionRepository,
    config: ConsumerConfig,
    log_store: Option<JobLogStore>,
    event_tx: broadcast::Sender<ConsumerEvent>,
}

impl JobQueueConsumer {
    /// Create a consumer registered in the queue under `name`.
    pub fn new(name: impl Into<String>, db: Database, config: ConsumerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            name: name.into(),
            queue: DatabaseJobExecutionQueue::new(db.clone()),
            manager: JobExecutionManager::new(db.clone()),
            job_executions: JobExecutionRepository::new(db),
            config,
            log_store: None,
            event_tx,
        }
    }

    /// Archive the output of every job execution in this store.
    pub fn with_log_store(mut self, log_store: JobLogStore) -> Self {
        self.log_store = Some(log_store);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsumerEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ConsumerEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    /// Claim the oldest unclaimed message, if any.
    pub async fn consume_next(&self) -> Result<Option<JobExecutionMessage>, ConsumerError> {
        let Some(message) = self.queue.consume(&self.name).await? else {
            return Ok(None);
        };

        if let Some(message_id) = message.id {
            tracing::debug!(
                "Consumer {} claimed message {} for job execution {}",
                self.name,
                message_id,
                message.job_execution_id
            );
            self.emit(ConsumerEvent::MessageClaimed {
                message_id,
                job_execution_id: message.job_execution_id,
                consumer: self.name.clone(),
                timestamp: Utc::now(),
            });
        }

        Ok(Some(message))
    }

    /// Run the job of a claimed message to completion.
    ///
    /// A heartbeat is written every health check interval while the process
    /// runs. Once it exits, a job execution left without a terminal exit
    /// status is marked as failed.
    pub async fn process(&self, message: &JobExecutionMessage) -> Result<(), ConsumerError> {
        let id = message.job_execution_id;
        let code = self
            .job_executions
            .job_instance_code(id)
            .await?
            .ok_or(ConsumerError::UnknownJobExecution(id))?;

        let command = &self.config.job_command;
        let args = command.arguments(&code, message);
        let command_line = command.command_line(&code, message);

        tracing::info!("Launching job execution \"{}\".", id);
        tracing::info!("Command line: \"{}\"", command_line);

        let mut process = JobProcess::spawn(command, &args)?;
        self.emit(ConsumerEvent::JobLaunched {
            job_execution_id: id,
            command_line,
            timestamp: Utc::now(),
        });

        let exit = loop {
            if let Err(e) = self.manager.update_health_check(id).await {
                tracing::warn!("Failed to update health check of job execution {}: {}", id, e);
            }

            tokio::select! {
                status = process.wait() => break status.map_err(ConsumerError::Process)?,
                _ = tokio::time::sleep(self.config.health_check_interval) => {}
            }
        };

        let observed = self.manager.get_exit_status(id).await?;
        if !observed.is_some_and(|status| status.is_terminal()) {
            tracing::warn!(
                "Job execution {} exited with status {}, marking it as failed",
                id,
                observed.map_or("missing", |status| status.as_str())
            );
            self.manager.mark_as_failed(id).await?;
            self.emit(ConsumerEvent::JobMarkedAsFailed {
                job_execution_id: id,
                observed,
                timestamp: Utc::now(),
            });
        }

        let output = process.finish(self.config.health_check_interval).await;
        self.archive_output(id, output).await;

        tracing::info!("Job execution \"{}\" is finished.", id);
        self.emit(ConsumerEvent::JobFinished {
            job_execution_id: id,
            process_exit_code: exit.code(),
            timestamp: Utc::now(),
        });

        Ok(())
    }

    async fn archive_output(&self, id: JobExecutionId, output: CapturedOutput) {
        let Some(store) = &self.log_store else {
            return;
        };

        if let Err(e) = store.archive(id, output.stdout, output.stderr).await {
            tracing::error!("Failed to archive output of job execution {}: {}", id, e);
        }
    }

    /// Log a failed iteration with its causes and a backtrace.
    pub fn report_failure(&self, error: &ConsumerError) {
        let backtrace = Backtrace::capture();
        tracing::error!(
            consumer = %self.name,
            "An error occurred: {}\n{}",
            error.report(),
            backtrace
        );
        self.emit(ConsumerEvent::IterationFailed {
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}
