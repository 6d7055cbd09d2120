//! Event types emitted by the consumer daemon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExitStatus, JobExecutionId, MessageId};

/// Lifecycle events of a consumer daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConsumerEvent {
    /// A message was claimed by this consumer.
    MessageClaimed {
        message_id: MessageId,
        job_execution_id: JobExecutionId,
        consumer: String,
        timestamp: DateTime<Utc>,
    },
    /// The job process was started.
    JobLaunched {
        job_execution_id: JobExecutionId,
        command_line: String,
        timestamp: DateTime<Utc>,
    },
    /// The job process exited without recording a terminal status and the
    /// job execution was marked as failed.
    JobMarkedAsFailed {
        job_execution_id: JobExecutionId,
        observed: Option<ExitStatus>,
        timestamp: DateTime<Utc>,
    },
    /// The job process exited and was reaped.
    JobFinished {
        job_execution_id: JobExecutionId,
        /// OS exit code, `None` when the process was killed by a signal.
        process_exit_code: Option<i32>,
        timestamp: DateTime<Utc>,
    },
    /// An iteration of the supervisor loop failed.
    IterationFailed {
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ConsumerEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ConsumerEvent::MessageClaimed { timestamp, .. } => *timestamp,
            ConsumerEvent::JobLaunched { timestamp, .. } => *timestamp,
            ConsumerEvent::JobMarkedAsFailed { timestamp, .. } => *timestamp,
            ConsumerEvent::JobFinished { timestamp, .. } => *timestamp,
            ConsumerEvent::IterationFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job execution this event refers to, if any.
    pub fn job_execution_id(&self) -> Option<JobExecutionId> {
        match self {
            ConsumerEvent::MessageClaimed {
                job_execution_id, ..
            } => Some(*job_execution_id),
            ConsumerEvent::JobLaunched {
                job_execution_id, ..
            } => Some(*job_execution_id),
            ConsumerEvent::JobMarkedAsFailed {
                job_execution_id, ..
            } => Some(*job_execution_id),
            ConsumerEvent::JobFinished {
                job_execution_id, ..
            } => Some(*job_execution_id),
            ConsumerEvent::IterationFailed { .. } => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            ConsumerEvent::MessageClaimed {
                message_id,
                consumer,
                ..
            } => format!("Message {} claimed by {}", message_id, consumer),
            ConsumerEvent::JobLaunched {
                job_execution_id, ..
            } => format!("Launching job execution \"{}\".", job_execution_id),
            ConsumerEvent::JobMarkedAsFailed {
                job_execution_id,
                observed,
                ..
            } => {
                let observed = observed.map_or("missing", |s| s.as_str());
                format!(
                    "Job execution \"{}\" exited with status {}, marked as failed",
                    job_execution_id, observed
                )
            }
            ConsumerEvent::JobFinished {
                job_execution_id, ..
            } => format!("Job execution \"{}\" is finished.", job_execution_id),
            ConsumerEvent::IterationFailed { error, .. } => {
                format!("An error occurred: {}", error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_description_names_the_job_execution() {
        let event = ConsumerEvent::JobFinished {
            job_execution_id: JobExecutionId(7),
            process_exit_code: Some(0),
            timestamp: Utc::now(),
        };

        assert_eq!(event.description(), "Job execution \"7\" is finished.");
        assert_eq!(event.job_execution_id(), Some(JobExecutionId(7)));
    }

    #[test]
    fn failures_carry_no_job_execution() {
        let event = ConsumerEvent::IterationFailed {
            error: "boom".into(),
            timestamp: Utc::now(),
        };

        assert_eq!(event.job_execution_id(), None);
        assert_eq!(event.description(), "An error occurred: boom");
    }
}
