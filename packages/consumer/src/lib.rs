//! Consumer daemon of the job execution queue.
//!
//! # Architecture
//!
//! - `JobQueueConsumer` - Claims a message, runs its job as a child process
//!   and repairs the job execution status once the process exits
//! - `ConsumerActor` - Ractor actor driving the consumer in a loop, or for a
//!   single iteration in run-once mode
//! - `JobCommand` - The external program launched for each job execution
//!
//! # Usage
//!
//! ```ignore
//! use consumer::{ConsumerConfig, JobQueueConsumer, start_consumer};
//!
//! let consumer = JobQueueConsumer::new("node1_1", db, ConsumerConfig::from_env());
//! let (actor, handle) = start_consumer(consumer).await?;
//! handle.await?;
//! ```

mod actor;
mod command;
mod config;
mod consumer;
mod error;
mod process;

pub use actor::{ConsumerActor, ConsumerActorState, ConsumerMessage, start_consumer};
pub use command::JobCommand;
pub use config::{ConsumerConfig, node_id, qualified_consumer_name};
pub use consumer::JobQueueConsumer;
pub use error::ConsumerError;
pub use process::{CapturedOutput, JobProcess};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef};
