//! Repository implementations for database operations.

mod job_execution_repo;
mod message_repo;

pub use job_execution_repo::{JobExecutionRepository, JobInstance};
pub use message_repo::JobExecutionMessageRepository;
