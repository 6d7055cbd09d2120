//! Archive of the output produced by job executions.
//!
//! The consumer daemon forwards a job's standard and error output to its own
//! streams while the job runs. When an archive is configured, the captured
//! output is also stored per job execution:
//!
//! ```text
//! <prefix>/job_executions/<id>/stdout.log
//! <prefix>/job_executions/<id>/stderr.log
//! ```
//!
//! Backends come from `object_store`: local filesystem, in-memory (tests) and
//! S3-compatible buckets.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use queue_core::JobExecutionId;

#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("invalid job log config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

/// Which output stream of the job process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    pub fn file_name(self) -> &'static str {
        match self {
            LogStream::Stdout => "stdout.log",
            LogStream::Stderr => "stderr.log",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBackendConfig {
    Filesystem {
        root: PathBuf,
    },
    Memory,
    /// S3-compatible bucket; credentials and region come from the `AWS_*`
    /// environment.
    S3 {
        bucket: String,
        endpoint: Option<String>,
        allow_http: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLogConfig {
    pub backend: LogBackendConfig,
    /// Optional key prefix applied to all log keys.
    pub prefix: Option<String>,
}

impl JobLogConfig {
    pub fn memory() -> Self {
        Self {
            backend: LogBackendConfig::Memory,
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: LogBackendConfig::Filesystem { root: root.into() },
            prefix: None,
        }
    }

    pub fn s3(bucket: impl Into<String>) -> Self {
        Self {
            backend: LogBackendConfig::S3 {
                bucket: bucket.into(),
                endpoint: None,
                allow_http: false,
            },
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = non_empty(prefix.into());
        self
    }

    /// Build a config from environment variables, `None` when archiving is off.
    ///
    /// - `JOB_LOG_BACKEND`: `none` (default), `filesystem`, `memory` or `s3`
    /// - `JOB_LOG_FS_ROOT`: filesystem root (default: `./var/job_logs`)
    /// - `JOB_LOG_S3_BUCKET` (required for `s3`), `JOB_LOG_S3_ENDPOINT`,
    ///   `JOB_LOG_S3_ALLOW_HTTP` (default: true for `http://` endpoints)
    /// - `JOB_LOG_PREFIX`: optional key prefix
    pub fn from_env() -> Result<Option<Self>, LogStoreError> {
        let var = |name: &str| std::env::var(name).ok().and_then(non_empty);

        let config = match var("JOB_LOG_BACKEND").as_deref() {
            None | Some("none") => return Ok(None),
            Some("filesystem") | Some("fs") => Self::filesystem(
                var("JOB_LOG_FS_ROOT").unwrap_or_else(|| "./var/job_logs".to_string()),
            ),
            Some("memory") | Some("mem") => Self::memory(),
            Some("s3") => {
                let bucket = var("JOB_LOG_S3_BUCKET").ok_or_else(|| {
                    LogStoreError::InvalidConfig("JOB_LOG_S3_BUCKET is required for s3".into())
                })?;
                let endpoint = var("JOB_LOG_S3_ENDPOINT");
                let allow_http = match var("JOB_LOG_S3_ALLOW_HTTP") {
                    Some(v) => parse_bool("JOB_LOG_S3_ALLOW_HTTP", &v)?,
                    None => endpoint.as_deref().is_some_and(|e| e.starts_with("http://")),
                };
                Self {
                    backend: LogBackendConfig::S3 {
                        bucket,
                        endpoint,
                        allow_http,
                    },
                    prefix: None,
                }
            }
            Some(other) => {
                return Err(LogStoreError::InvalidConfig(format!(
                    "unsupported JOB_LOG_BACKEND={other} (expected none|filesystem|memory|s3)"
                )));
            }
        };

        Ok(Some(Self {
            prefix: var("JOB_LOG_PREFIX"),
            ..config
        }))
    }
}

/// Object store holding the output of job executions.
#[derive(Clone)]
pub struct JobLogStore {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl JobLogStore {
    pub fn new(config: JobLogConfig) -> Result<Self, LogStoreError> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            LogBackendConfig::Filesystem { root } => {
                std::fs::create_dir_all(&root)?;
                Arc::new(object_store::local::LocalFileSystem::new_with_prefix(&root)?)
            }
            LogBackendConfig::Memory => Arc::new(object_store::memory::InMemory::new()),
            LogBackendConfig::S3 {
                bucket,
                endpoint,
                allow_http,
            } => {
                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(allow_http);
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                Arc::new(builder.build()?)
            }
        };

        Ok(Self {
            store,
            prefix: config.prefix.and_then(non_empty),
        })
    }

    /// Key of a job execution's log.
    pub fn key(&self, job_execution_id: JobExecutionId, stream: LogStream) -> Path {
        let relative = format!("job_executions/{}/{}", job_execution_id, stream.file_name());
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => Path::from(format!("{prefix}/{relative}")),
            _ => Path::from(relative),
        }
    }

    /// Store one stream of a job execution's output, replacing any previous copy.
    pub async fn put(
        &self,
        job_execution_id: JobExecutionId,
        stream: LogStream,
        output: Bytes,
    ) -> Result<(), LogStoreError> {
        let key = self.key(job_execution_id, stream);
        self.store
            .put(&key, object_store::PutPayload::from(output))
            .await?;
        tracing::debug!("Archived {} of job execution {} to {}", stream.file_name(), job_execution_id, key);
        Ok(())
    }

    /// Read back one stream of a job execution's output.
    pub async fn get(
        &self,
        job_execution_id: JobExecutionId,
        stream: LogStream,
    ) -> Result<Bytes, LogStoreError> {
        let key = self.key(job_execution_id, stream);
        let result = self.store.get(&key).await?;
        Ok(result.bytes().await?)
    }

    /// Store both output streams of a finished job execution.
    pub async fn archive(
        &self,
        job_execution_id: JobExecutionId,
        stdout: Bytes,
        stderr: Bytes,
    ) -> Result<(), LogStoreError> {
        self.put(job_execution_id, LogStream::Stdout, stdout).await?;
        self.put(job_execution_id, LogStream::Stderr, stderr).await
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_bool(var_name: &str, value: &str) -> Result<bool, LogStoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(LogStoreError::InvalidConfig(format!(
            "invalid boolean for {var_name}={value} (expected true/false)"
        ))),
    }
}
