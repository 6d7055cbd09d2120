#![allow(clippy::disallowed_methods)]

mod common;

use std::collections::HashSet;
use std::error::Error;

use db::DatabaseJobExecutionQueue;
use queue_core::{JobExecutionId, JobExecutionMessage, JobOptions};
use tokio::task::JoinSet;

#[tokio::test]
async fn publish_assigns_increasing_ids_to_unclaimed_messages() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    let options = JobOptions::new().with("env", "prod").with("force", true);
    let first = queue
        .publish(&JobExecutionMessage::new(JobExecutionId(42)).with_options(options.clone()))
        .await?;
    let second = queue.publish(&JobExecutionMessage::new(JobExecutionId(43))).await?;

    let (Some(first_id), Some(second_id)) = (first.id, second.id) else {
        panic!("published messages must have ids");
    };
    assert!(first_id < second_id);
    assert_eq!(first.job_execution_id, JobExecutionId(42));
    assert_eq!(first.consumer, None);
    assert_eq!(first.updated_time, None);
    assert_eq!(first.options, options);

    let stored = queue.messages().get(first_id).await?;
    assert_eq!(stored.options, options);
    assert_eq!(queue.messages().count_unclaimed().await?, 2);

    Ok(())
}

#[tokio::test]
async fn consume_returns_none_on_empty_queue() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    assert!(queue.consume("node_1").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn consume_follows_publication_order() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    for job_execution_id in [1, 2, 3] {
        queue.publish(&JobExecutionMessage::new(JobExecutionId(job_execution_id))).await?;
    }

    let mut consumed = Vec::new();
    while let Some(message) = queue.consume("node_1").await? {
        assert_eq!(message.consumer.as_deref(), Some("node_1"));
        consumed.push(message.job_execution_id.0);
    }

    assert_eq!(consumed, vec![1, 2, 3]);

    Ok(())
}

#[tokio::test]
async fn claimed_message_is_never_handed_to_another_consumer() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    let published = queue.publish(&JobExecutionMessage::new(JobExecutionId(10))).await?;

    let claimed = queue.consume("A").await?.ok_or("message should be claimed")?;
    assert_eq!(claimed.id, published.id);
    assert_eq!(claimed.consumer.as_deref(), Some("A"));

    let updated = claimed.updated_time.ok_or("claim must set updated time")?;
    assert!(claimed.create_time <= updated);

    assert!(queue.consume("B").await?.is_none());

    let id = published.id.ok_or("published message has an id")?;
    let stored = queue.messages().get(id).await?;
    assert_eq!(stored.consumer.as_deref(), Some("A"));

    Ok(())
}

#[tokio::test]
async fn concurrent_consumers_never_share_a_message() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    const MESSAGES: i64 = 3;
    const CONSUMERS: usize = 8;

    for job_execution_id in 0..MESSAGES {
        queue.publish(&JobExecutionMessage::new(JobExecutionId(job_execution_id))).await?;
    }

    let mut tasks = JoinSet::new();
    for n in 0..CONSUMERS {
        let queue = queue.clone();
        tasks.spawn(async move { queue.consume(&format!("node{}_1", n)).await });
    }

    let mut claimed = Vec::new();
    let mut empty = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined?? {
            Some(message) => claimed.push(message),
            None => empty += 1,
        }
    }

    assert_eq!(claimed.len(), MESSAGES as usize);
    assert_eq!(empty, CONSUMERS - MESSAGES as usize);

    let ids: HashSet<_> = claimed.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), claimed.len());

    Ok(())
}

#[tokio::test]
async fn two_daemons_race_for_a_single_message() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let node_a = DatabaseJobExecutionQueue::new(db.clone());
    let node_b = DatabaseJobExecutionQueue::new(db);

    node_a.publish(&JobExecutionMessage::new(JobExecutionId(99))).await?;

    let (a, b) = tokio::join!(node_a.consume("nodeA_1"), node_b.consume("nodeB_1"));
    let (a, b) = (a?, b?);

    assert!(a.is_some() ^ b.is_some());
    let winner = a.or(b).ok_or("one daemon wins")?;
    assert_eq!(winner.job_execution_id, JobExecutionId(99));

    Ok(())
}

#[tokio::test]
async fn publish_job_execution_returns_the_message_id() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let queue = DatabaseJobExecutionQueue::new(db);

    let id = queue
        .publish_job_execution(JobExecutionId(5), JobOptions::new().with("email", "ziggy@example.com"))
        .await?;

    let messages = queue.messages().find_by_job_execution(JobExecutionId(5)).await?;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, Some(id));

    Ok(())
}
