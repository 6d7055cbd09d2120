//! Supervisor loop of the consumer daemon.

use std::sync::Arc;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::task::JoinHandle;

use crate::consumer::JobQueueConsumer;

/// Messages for the ConsumerActor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerMessage {
    /// Try to claim a message and run its job.
    Poll,
    /// Stop once the current iteration is over. A running job is not killed.
    Shutdown,
}

/// Actor owning the consumer loop: one job at a time, one iteration per `Poll`.
pub struct ConsumerActor;

/// State for the consumer actor.
pub struct ConsumerActorState {
    /// Consumer running the iterations.
    consumer: Arc<JobQueueConsumer>,
    /// Finished iterations, successful or not. Empty polls are not counted.
    iterations: u64,
}

impl ConsumerActorState {
    /// Iterations run so far, claimed messages and failed claims alike.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    fn after_iteration(&mut self, myself: &ActorRef<ConsumerMessage>, failed: bool) {
        self.iterations += 1;

        if self.consumer.config().run_once {
            tracing::info!("Consumer {} ran its single iteration, stopping", self.consumer.name());
            myself.stop(Some("single iteration done".to_string()));
        } else if failed {
            myself.send_after(self.consumer.config().poll_interval, || ConsumerMessage::Poll);
        } else if myself.send_message(ConsumerMessage::Poll).is_err() {
            tracing::debug!("Consumer {} is stopping", self.consumer.name());
        }
    }
}

impl Actor for ConsumerActor {
    type Msg = ConsumerMessage;
    type State = ConsumerActorState;
    type Arguments = Arc<JobQueueConsumer>;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        consumer: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting consumer {} (run once: {})",
            consumer.name(),
            consumer.config().run_once
        );

        myself.send_message(ConsumerMessage::Poll)?;

        Ok(ConsumerActorState {
            consumer,
            iterations: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ConsumerMessage::Poll => {
                let consumer = state.consumer.clone();

                match consumer.consume_next().await {
                    Ok(None) => {
                        tracing::debug!("No message for consumer {}", consumer.name());
                        myself.send_after(consumer.config().poll_interval, || ConsumerMessage::Poll);
                    }
                    Ok(Some(message)) => {
                        let result = consumer.process(&message).await;
                        if let Err(e) = &result {
                            consumer.report_failure(e);
                        }
                        state.after_iteration(&myself, result.is_err());
                    }
                    Err(e) => {
                        consumer.report_failure(&e);
                        state.after_iteration(&myself, true);
                    }
                }
            }
            ConsumerMessage::Shutdown => {
                tracing::info!(
                    "Stopping consumer {} after {} iterations",
                    state.consumer.name(),
                    state.iterations
                );
                myself.stop(Some("shutdown requested".to_string()));
            }
        }
        Ok(())
    }
}

/// Start the consumer loop.
///
/// The returned handle completes when the actor stops: after one iteration in
/// run-once mode, or after a `Shutdown`.
pub async fn start_consumer(
    consumer: JobQueueConsumer,
) -> Result<(ActorRef<ConsumerMessage>, JoinHandle<()>), ractor::SpawnErr> {
    let name = format!("consumer-{}", consumer.name());
    Actor::spawn(Some(name), ConsumerActor, Arc::new(consumer)).await
}
