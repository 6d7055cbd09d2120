use clap::Parser;
use db::{DatabaseJobExecutionQueue, DbConfig};
use queue_core::JobExecutionId;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "job-queue-publish")]
#[command(version)]
#[command(about = "Push a job execution into the job execution queue")]
struct Args {
    /// Job execution to run
    job_execution_id: i64,

    /// Job option, `key=value` or a bare `flag`
    #[arg(short = 'o', long = "option", value_parser = daemon::parse_option)]
    options: Vec<(String, Value)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    daemon::init("job_queue_publish=info,db=warn");
    let args = Args::parse();

    let db = db::init(DbConfig::from_env()).await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    let job_execution_id = JobExecutionId(args.job_execution_id);
    let message_id = queue
        .publish_job_execution(job_execution_id, daemon::job_options(args.options))
        .await?;

    tracing::info!("Published job execution {} as message {}", job_execution_id, message_id);
    println!("{}", message_id);

    Ok(())
}
