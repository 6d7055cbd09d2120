//! Child process of a job execution.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::command::JobCommand;
use crate::error::ConsumerError;

/// Output captured from a finished job process.
#[derive(Debug, Default, Clone)]
pub struct CapturedOutput {
    pub stdout: Bytes,
    pub stderr: Bytes,
}

/// A running job process.
///
/// Its standard and error output are forwarded to the daemon's own streams as
/// they are produced, and kept for the log archive.
pub struct JobProcess {
    child: Child,
    stdout: OutputForwarder,
    stderr: OutputForwarder,
}

impl JobProcess {
    /// Start the job program with the given arguments.
    pub fn spawn(command: &JobCommand, args: &[String]) -> Result<Self, ConsumerError> {
        let mut child = Command::new(command.program())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConsumerError::Spawn {
                program: command.program().to_string(),
                source,
            })?;

        let stdout = OutputForwarder::start(child.stdout.take(), tokio::io::stdout());
        let stderr = OutputForwarder::start(child.stderr.take(), tokio::io::stderr());

        Ok(Self {
            child,
            stdout,
            stderr,
        })
    }

    /// OS process id, `None` once reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit. Cancel safe.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Collect the output once the process has exited.
    ///
    /// Background processes left by the job inherit its output pipes and may
    /// keep them open forever, so forwarding stops after `grace` and only what
    /// was read by then is kept.
    pub async fn finish(self, grace: Duration) -> CapturedOutput {
        let (stdout, stderr) = tokio::join!(self.stdout.collect(grace), self.stderr.collect(grace));
        CapturedOutput { stdout, stderr }
    }
}

/// Copies one output stream of the job to the daemon while keeping a copy.
struct OutputForwarder {
    captured: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl OutputForwarder {
    fn start<R, W>(pipe: Option<R>, to: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let task = match pipe {
            Some(from) => tokio::spawn(forward(from, to, captured.clone())),
            None => tokio::spawn(async {}),
        };
        Self { captured, task }
    }

    async fn collect(mut self, grace: Duration) -> Bytes {
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Job output task failed: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Job output still open {:?} after exit, a background process may hold it",
                    grace
                );
                self.task.abort();
            }
        }

        let mut captured = self.captured.lock().await;
        Bytes::from(std::mem::take(&mut *captured))
    }
}

async fn forward<R, W>(mut from: R, mut to: W, captured: Arc<Mutex<Vec<u8>>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; 8192];

    loop {
        let n = match from.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Failed to read job output: {}", e);
                break;
            }
        };

        captured.lock().await.extend_from_slice(&buf[..n]);
        if let Err(e) = to.write_all(&buf[..n]).await {
            tracing::warn!("Failed to forward job output: {}", e);
        }
        let _ = to.flush().await;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn output_is_captured_per_stream() -> Result<(), Box<dyn std::error::Error>> {
        let command = JobCommand::new("/bin/sh").with_arg("-c");
        let args = vec!["echo out; echo err >&2; exit 3".to_string()];

        let mut process = JobProcess::spawn(&command, &args)?;
        let status = process.wait().await?;
        let output = process.finish(Duration::from_secs(5)).await;

        assert_eq!(status.code(), Some(3));
        assert_eq!(output.stdout, Bytes::from("out\n"));
        assert_eq!(output.stderr, Bytes::from("err\n"));
        Ok(())
    }

    #[tokio::test]
    async fn background_processes_do_not_hold_up_finish() -> Result<(), Box<dyn std::error::Error>> {
        let command = JobCommand::new("/bin/sh").with_arg("-c");
        let args = vec!["echo started; sleep 5 & exit 0".to_string()];

        let mut process = JobProcess::spawn(&command, &args)?;
        let status = process.wait().await?;
        let output = tokio::time::timeout(
            Duration::from_secs(2),
            process.finish(Duration::from_millis(200)),
        )
        .await?;

        assert!(status.success());
        assert_eq!(output.stdout, Bytes::from("started\n"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let command = JobCommand::new("/nonexistent/batch-job");

        let result = JobProcess::spawn(&command, &[]);

        assert!(matches!(result, Err(ConsumerError::Spawn { .. })));
    }
}
