//! Command line of the job process.

use std::fmt;

use queue_core::JobExecutionMessage;

/// External program that runs one job execution.
///
/// The process is started as
/// `<program> <prefix args...> <job instance code> <job execution id> <options...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCommand {
    program: String,
    prefix_args: Vec<String>,
}

impl JobCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.prefix_args.push(arg.into());
        self
    }

    /// Parse a whitespace-separated command, e.g. `bin/console batch:job`.
    ///
    /// Returns `None` for a blank string.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(parts.fold(Self::new(program), |cmd, arg| cmd.with_arg(arg)))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn prefix_args(&self) -> &[String] {
        &self.prefix_args
    }

    /// Arguments passed to the program for a claimed message.
    pub fn arguments(&self, job_instance_code: &str, message: &JobExecutionMessage) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.push(job_instance_code.to_string());
        args.push(message.job_execution_id.to_string());
        args.extend(message.options.to_arguments());
        args
    }

    /// Full command line, for logging.
    pub fn command_line(&self, job_instance_code: &str, message: &JobExecutionMessage) -> String {
        CommandLine {
            program: &self.program,
            args: &self.arguments(job_instance_code, message),
        }
        .to_string()
    }
}

impl Default for JobCommand {
    fn default() -> Self {
        Self::new("bin/console").with_arg("batch:job")
    }
}

struct CommandLine<'a> {
    program: &'a str,
    args: &'a [String],
}

impl fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queue_core::{JobExecutionId, JobOptions};

    fn message() -> JobExecutionMessage {
        JobExecutionMessage::new(JobExecutionId(42)).with_options(
            JobOptions::new()
                .with("env", "prod")
                .with("force", true),
        )
    }

    #[test]
    fn arguments_are_code_id_then_options() {
        let args = JobCommand::new("console").arguments("csv_product_export", &message());

        assert_eq!(&args[..2], ["csv_product_export", "42"]);
        let mut options = args[2..].to_vec();
        options.sort();
        assert_eq!(options, ["--env=prod", "--force"]);
    }

    #[test]
    fn prefix_arguments_come_first() {
        let command = JobCommand::default();
        let args = command.arguments("xlsx_import", &JobExecutionMessage::new(JobExecutionId(3)));

        assert_eq!(args, ["batch:job", "xlsx_import", "3"]);
        assert_eq!(
            command.command_line("xlsx_import", &JobExecutionMessage::new(JobExecutionId(3))),
            "bin/console batch:job xlsx_import 3"
        );
    }

    #[test]
    fn false_flags_are_not_passed() {
        let message = JobExecutionMessage::new(JobExecutionId(5))
            .with_options(JobOptions::new().with("dry-run", false));

        assert_eq!(JobCommand::new("run").arguments("code", &message), ["code", "5"]);
    }

    #[test]
    fn parse_splits_on_whitespace() {
        let command = JobCommand::parse("  php  bin/console batch:job ");

        assert_eq!(
            command,
            Some(JobCommand::new("php").with_arg("bin/console").with_arg("batch:job"))
        );
        assert_eq!(JobCommand::parse("   "), None);
    }
}
