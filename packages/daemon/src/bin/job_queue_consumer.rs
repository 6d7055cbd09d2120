use clap::Parser;
use consumer::{
    ConsumerConfig, ConsumerMessage, JobQueueConsumer, node_id, qualified_consumer_name,
    start_consumer,
};
use db::DbConfig;
use job_logs::{JobLogConfig, JobLogStore};

#[derive(Parser, Debug)]
#[command(name = "job-queue-consumer")]
#[command(version)]
#[command(about = "Consume job execution messages and run their jobs, one at a time")]
struct Args {
    /// Consumer name, unique on this node
    consumer_name: String,

    /// Run a single job execution, then stop
    #[arg(long)]
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    daemon::init("job_queue_consumer=info,consumer=info,db=info,job_logs=info");
    let args = Args::parse();

    let db = db::init(DbConfig::from_env()).await?;

    let name = qualified_consumer_name(&node_id(), &args.consumer_name);
    let config = ConsumerConfig::from_env().run_once(args.run_once);
    let mut consumer = JobQueueConsumer::new(name, db, config);
    if let Some(log_config) = JobLogConfig::from_env()? {
        consumer = consumer.with_log_store(JobLogStore::new(log_config)?);
    }

    let (actor, handle) = start_consumer(consumer).await?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupted, stopping once the current job is finished");
        let _ = actor.send_message(ConsumerMessage::Shutdown);

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted again, exiting now");
            std::process::exit(130);
        }
    });

    handle.await?;

    Ok(())
}
