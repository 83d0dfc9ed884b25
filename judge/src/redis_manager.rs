//! Redis Manager - Job queue and result publishing
//!
//! This module handles the worker's Redis traffic:
//! - Job queue operations (bounded BLPOP)
//! - Result storage and publishing
//!
//! Submissions, users and problems live in `store`, not here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{info, warn};

use crate::jobs::{JobResult, WorkerJob};
use crate::worker::JobQueue;

/// Redis key constants
pub mod keys {
    /// Job queue key
    pub const JUDGE_QUEUE: &str = "judge:queue";

    /// Result key prefix (for polling)
    pub const JUDGE_RESULT_PREFIX: &str = "judge:result:";

    /// Result channel (for pub/sub)
    pub const JUDGE_RESULT_CHANNEL: &str = "judge:results";
}

const RESULT_EXPIRY_SECS: u64 = 3600; // 1 hour

/// Polling key for a job's result
pub fn result_key(job_id: &str) -> String {
    format!("{}{}", keys::JUDGE_RESULT_PREFIX, job_id)
}

/// Owns the blocking queue connection
pub struct RedisManager {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisManager {
    /// Connect to Redis, retrying until it is reachable
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self { client, conn })
    }

    /// Publisher on a separate connection, so results are never queued
    /// behind a pending BLPOP
    pub async fn result_sink(&self) -> Result<ResultSink> {
        let conn = get_connection_with_retry(&self.client).await?;
        Ok(ResultSink {
            client: self.client.clone(),
            conn,
        })
    }
}

#[async_trait]
impl JobQueue for RedisManager {
    /// BLPOP for at most `wait`.
    ///
    /// Reconnects on connection failure. Unparseable jobs are logged and
    /// skipped; both cases come back as `None` so the caller re-checks its
    /// stop signal.
    async fn next_job(&mut self, wait: Duration) -> Result<Option<WorkerJob>> {
        let result: Option<(String, String)> =
            match self.conn.blpop(keys::JUDGE_QUEUE, wait.as_secs_f64()).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    self.conn = get_connection_with_retry(&self.client).await?;
                    return Ok(None);
                }
            };

        let Some((_, job_data)) = result else {
            return Ok(None);
        };
        match serde_json::from_str::<WorkerJob>(&job_data) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                warn!("Failed to parse job data: {}. Data: {}", e, job_data);
                Ok(None)
            }
        }
    }
}

/// Cloneable handle that stores and publishes job results
#[derive(Clone)]
pub struct ResultSink {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl ResultSink {
    /// Store a result with a 1-hour expiration and publish it to the
    /// results channel for real-time subscribers.
    pub async fn store_result(&mut self, result: &JobResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let key = result_key(result.job_id());

        // Try to store, reconnect on failure
        if let Err(e) = self
            .conn
            .set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
            .await
        {
            warn!("Failed to store result: {}. Reconnecting...", e);
            self.conn = get_connection_with_retry(&self.client).await?;
            self.conn
                .set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
                .await?;
        }

        // Publish to channel (ignore errors as there may be no subscribers)
        let _ = self
            .conn
            .publish::<_, _, ()>(keys::JUDGE_RESULT_CHANNEL, &json)
            .await;

        Ok(())
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in 3 seconds...",
                    e
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
