//! Queue message types for job executions pushed into the queue.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a queue message, assigned by storage on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a job execution record owned by the batch subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobExecutionId(pub i64);

impl std::fmt::Display for JobExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobExecutionId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Run options of a job execution, forwarded verbatim to the job process.
///
/// Values are opaque to the queue. When rendered as command-line arguments:
/// - `true` becomes a bare `--name` flag
/// - `false` and `null` are omitted
/// - strings become `--name=value`
/// - any other value becomes `--name=<json>`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobOptions(BTreeMap<String, Value>);

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder form of [`JobOptions::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Render the options as `--flag` / `--name=value` arguments.
    pub fn to_arguments(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|(name, value)| match value {
                Value::Bool(true) => Some(format!("--{name}")),
                Value::Bool(false) | Value::Null => None,
                Value::String(s) => Some(format!("--{name}={s}")),
                other => Some(format!("--{name}={other}")),
            })
            .collect()
    }
}

impl FromIterator<(String, Value)> for JobOptions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A message pushed into the queue to process a job execution asynchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionMessage {
    /// Storage-assigned id, `None` until published.
    pub id: Option<MessageId>,
    /// The job execution to run.
    pub job_execution_id: JobExecutionId,
    /// Consumer that claimed this message, `None` while unclaimed.
    pub consumer: Option<String>,
    /// When the message was built.
    pub create_time: DateTime<Utc>,
    /// When the message was last mutated (claimed).
    pub updated_time: Option<DateTime<Utc>>,
    /// Options passed to the job process.
    #[serde(default)]
    pub options: JobOptions,
}

impl JobExecutionMessage {
    /// Create an unpublished, unclaimed message for a job execution.
    pub fn new(job_execution_id: JobExecutionId) -> Self {
        Self {
            id: None,
            job_execution_id,
            consumer: None,
            create_time: Utc::now(),
            updated_time: None,
            options: JobOptions::new(),
        }
    }

    /// Set the options for this message.
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Check whether a consumer has claimed this message.
    pub fn is_claimed(&self) -> bool {
        self.consumer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn true_options_render_as_bare_flags_named_after_the_option() {
        let options = JobOptions::new().with("force", true).with("env", "prod");

        let args = options.to_arguments();

        assert_eq!(args.len(), 2);
        assert!(args.contains(&"--force".to_string()));
        assert!(args.contains(&"--env=prod".to_string()));
        // Rendering the value instead of the name would yield "--true".
        assert!(!args.contains(&"--true".to_string()));
    }

    #[test]
    fn false_and_null_options_are_omitted() {
        let options = JobOptions::new()
            .with("dry-run", false)
            .with("user", Value::Null)
            .with("email", "ziggy@example.com");

        assert_eq!(options.to_arguments(), vec!["--email=ziggy@example.com"]);
    }

    #[test]
    fn non_string_values_render_as_json() {
        let options = JobOptions::new()
            .with("limit", 10)
            .with("ids", json!([1, 2]));

        assert_eq!(options.to_arguments(), vec!["--ids=[1,2]", "--limit=10"]);
    }

    #[test]
    fn new_message_is_unclaimed_and_unpublished() {
        let message = JobExecutionMessage::new(JobExecutionId(42));

        assert_eq!(message.id, None);
        assert_eq!(message.job_execution_id, JobExecutionId(42));
        assert!(!message.is_claimed());
        assert!(message.updated_time.is_none());
        assert!(message.options.is_empty());
    }
}
