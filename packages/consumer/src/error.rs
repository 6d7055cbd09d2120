use db::DbError;
use queue_core::JobExecutionId;

/// Failure of one consumer iteration.
///
/// None of these stop the daemon: the supervisor loop logs them and moves on
/// to the next message.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("queue storage error: {0}")]
    Storage(#[from] DbError),

    #[error("failed to launch job process `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to supervise job process: {0}")]
    Process(#[source] std::io::Error),

    #[error("job execution {0} does not exist")]
    UnknownJobExecution(JobExecutionId),
}

impl ConsumerError {
    /// Render the error followed by its `source()` chain, one cause per line.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}
