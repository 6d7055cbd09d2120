//! Core domain types for the batch job execution queue.
//!
//! This crate contains shared types used across all packages:
//! - JobExecutionMessage and JobOptions for queue entries
//! - BatchStatus, ExitStatus and JobExecutionStatus for supervised jobs
//! - ConsumerEvent for daemon lifecycle notifications

mod events;
mod job_execution;
mod message;

pub use events::ConsumerEvent;
pub use job_execution::{BatchStatus, ExitStatus, JobExecutionStatus, ParseStatusError};
pub use message::{JobExecutionId, JobExecutionMessage, JobOptions, MessageId};
