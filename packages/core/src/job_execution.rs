//! Status of the job execution records supervised by the consumer daemon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::JobExecutionId;

/// Error returned when a stored status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Lifecycle status of a job execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Starting,
    Executing,
    Completed,
    Stopping,
    Stopped,
    Failed,
    Abandoned,
    #[default]
    Unknown,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Executing => "EXECUTING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Stopping => "STOPPING",
            BatchStatus::Stopped => "STOPPED",
            BatchStatus::Failed => "FAILED",
            BatchStatus::Abandoned => "ABANDONED",
            BatchStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTING" => Ok(BatchStatus::Starting),
            "EXECUTING" => Ok(BatchStatus::Executing),
            "COMPLETED" => Ok(BatchStatus::Completed),
            "STOPPING" => Ok(BatchStatus::Stopping),
            "STOPPED" => Ok(BatchStatus::Stopped),
            "FAILED" => Ok(BatchStatus::Failed),
            "ABANDONED" => Ok(BatchStatus::Abandoned),
            "UNKNOWN" => Ok(BatchStatus::Unknown),
            other => Err(ParseStatusError {
                kind: "batch status",
                value: other.to_string(),
            }),
        }
    }
}

/// Exit code recorded by a job execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitStatus {
    #[default]
    Unknown,
    Executing,
    Completed,
    Noop,
    Failed,
    Stopped,
}

impl ExitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitStatus::Unknown => "UNKNOWN",
            ExitStatus::Executing => "EXECUTING",
            ExitStatus::Completed => "COMPLETED",
            ExitStatus::Noop => "NOOP",
            ExitStatus::Failed => "FAILED",
            ExitStatus::Stopped => "STOPPED",
        }
    }

    /// Whether the job recorded a final outcome.
    ///
    /// `Unknown` and `Executing` after the job process has exited mean the job
    /// never wrote its own terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExitStatus::Unknown | ExitStatus::Executing)
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExitStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(ExitStatus::Unknown),
            "EXECUTING" => Ok(ExitStatus::Executing),
            "COMPLETED" => Ok(ExitStatus::Completed),
            "NOOP" => Ok(ExitStatus::Noop),
            "FAILED" => Ok(ExitStatus::Failed),
            "STOPPED" => Ok(ExitStatus::Stopped),
            other => Err(ParseStatusError {
                kind: "exit status",
                value: other.to_string(),
            }),
        }
    }
}

/// Snapshot of a job execution's status row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionStatus {
    pub id: JobExecutionId,
    /// Code of the job instance this execution belongs to.
    pub job_instance_code: String,
    pub status: BatchStatus,
    pub exit_code: ExitStatus,
    /// Last liveness ping written by the supervising daemon.
    pub health_check_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unknown_and_executing_exit_statuses_are_non_terminal() {
        assert!(!ExitStatus::Unknown.is_terminal());
        assert!(!ExitStatus::Executing.is_terminal());
        assert!(ExitStatus::Completed.is_terminal());
        assert!(ExitStatus::Noop.is_terminal());
        assert!(ExitStatus::Failed.is_terminal());
        assert!(ExitStatus::Stopped.is_terminal());
    }

    #[test]
    fn statuses_parse_from_their_stored_form() {
        assert_eq!("FAILED".parse::<ExitStatus>(), Ok(ExitStatus::Failed));
        assert_eq!("EXECUTING".parse::<BatchStatus>(), Ok(BatchStatus::Executing));
        assert!("failed".parse::<ExitStatus>().is_err());
    }

    #[test]
    fn serde_form_matches_display() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ExitStatus::Completed)?;
        assert_eq!(value, serde_json::Value::String("COMPLETED".into()));

        let status: BatchStatus = serde_json::from_value("STOPPED".into())?;
        assert_eq!(status.to_string(), "STOPPED");
        Ok(())
    }
}
