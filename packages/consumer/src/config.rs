//! Consumer daemon configuration.

use std::time::Duration;

use crate::command::JobCommand;

const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Program launched for each claimed message.
    pub job_command: JobCommand,
    /// Delay between two heartbeats of a running job.
    pub health_check_interval: Duration,
    /// Delay before polling again when the queue is empty.
    pub poll_interval: Duration,
    /// Stop after the first iteration instead of looping.
    pub run_once: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            job_command: JobCommand::default(),
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_once: false,
        }
    }
}

impl ConsumerConfig {
    pub fn new(job_command: JobCommand) -> Self {
        Self {
            job_command,
            ..Self::default()
        }
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn run_once(mut self, run_once: bool) -> Self {
        self.run_once = run_once;
        self
    }

    /// Read the configuration from environment variables.
    ///
    /// Unset or unparsable values keep their defaults:
    /// - `BATCH_JOB_COMMAND`: program and prefix arguments (default: `bin/console batch:job`)
    /// - `BATCH_QUEUE_HEALTH_CHECK_INTERVAL_SECS` (default: 5)
    /// - `BATCH_QUEUE_POLL_INTERVAL_MS` (default: 1000)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(command) = std::env::var("BATCH_JOB_COMMAND")
            .ok()
            .as_deref()
            .and_then(JobCommand::parse)
        {
            config.job_command = command;
        }

        if let Some(secs) = env_u64("BATCH_QUEUE_HEALTH_CHECK_INTERVAL_SECS") {
            config.health_check_interval = Duration::from_secs(secs);
        }

        if let Some(ms) = env_u64("BATCH_QUEUE_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={}", name, value);
            None
        }
    }
}

/// Identifier of the node the daemon runs on.
///
/// `BATCH_QUEUE_NODE_ID`, then `HOSTNAME`, then `localhost`.
pub fn node_id() -> String {
    ["BATCH_QUEUE_NODE_ID", "HOSTNAME"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Consumer name registered in the queue: `<node>_<name>`.
pub fn qualified_consumer_name(node: &str, consumer_name: &str) -> String {
    format!("{}_{}", node, consumer_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConsumerConfig::default();

        assert_eq!(config.job_command, JobCommand::default());
        assert_eq!(config.health_check_interval, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(!config.run_once);
    }

    #[test]
    fn consumer_names_are_qualified_by_node() {
        assert_eq!(qualified_consumer_name("nodeA", "1"), "nodeA_1");
    }
}
