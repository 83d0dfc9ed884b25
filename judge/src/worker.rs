//! Worker loop - pulls jobs until asked to stop
//!
//! A pop is never interrupted: the queue is polled with a short timeout and
//! the stop token is only checked between polls, so a job the queue has
//! already handed out always reaches the handler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::jobs::WorkerJob;

/// Longest a single pop may block, which bounds shutdown latency
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Source of worker jobs
#[async_trait]
pub trait JobQueue: Send {
    /// Next job, or `None` if nothing arrived within `wait`
    async fn next_job(&mut self, wait: Duration) -> Result<Option<WorkerJob>>;
}

/// Hand jobs to `handle` until `stopping` fires; returns how many were taken.
///
/// Each job comes with a semaphore permit that the handler must hold for the
/// job's lifetime.
pub async fn consume<Q, F>(
    queue: &mut Q,
    permits: Arc<Semaphore>,
    stopping: &CancellationToken,
    mut handle: F,
) -> Result<usize>
where
    Q: JobQueue + ?Sized,
    F: FnMut(WorkerJob, OwnedSemaphorePermit),
{
    let mut accepted = 0;

    while !stopping.is_cancelled() {
        let permit = tokio::select! {
            permit = permits.clone().acquire_owned() => permit.context("Worker semaphore closed")?,
            _ = stopping.cancelled() => break,
        };

        if let Some(job) = queue.next_job(QUEUE_POLL_INTERVAL).await? {
            accepted += 1;
            handle(job, permit);
        }
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::run::RunJob;
    use std::collections::VecDeque;

    /// Replays polls; fires `stop_on_pop` while handing out that poll's result
    struct ScriptedQueue {
        polls: VecDeque<Option<&'static str>>,
        pops: usize,
        stop_on_pop: Option<(usize, CancellationToken)>,
    }

    #[async_trait]
    impl JobQueue for ScriptedQueue {
        async fn next_job(&mut self, _wait: Duration) -> Result<Option<WorkerJob>> {
            self.pops += 1;
            if let Some((at, token)) = &self.stop_on_pop {
                if *at == self.pops {
                    token.cancel();
                }
            }
            Ok(self.polls.pop_front().flatten().map(|id| {
                WorkerJob::Run(RunJob {
                    job_id: id.to_string(),
                    language: "python".into(),
                    code: "print(1)".into(),
                    stdin: String::new(),
                })
            }))
        }
    }

    #[tokio::test]
    async fn test_job_popped_during_shutdown_is_handled() {
        let stopping = CancellationToken::new();
        let mut queue = ScriptedQueue {
            polls: vec![Some("a"), None, Some("b"), Some("c")].into(),
            pops: 0,
            stop_on_pop: Some((3, stopping.clone())),
        };

        let mut handled = Vec::new();
        let accepted = consume(&mut queue, Arc::new(Semaphore::new(2)), &stopping, |job, _permit| {
            handled.push(job.job_id().to_string());
        })
        .await
        .unwrap();

        // "b" was popped as the stop arrived and still reached the handler
        assert_eq!(handled, vec!["a", "b"]);
        assert_eq!(accepted, 2);
        assert_eq!(queue.pops, 3);
        assert_eq!(queue.polls.len(), 1);
    }

    #[tokio::test]
    async fn test_stopped_before_start_pops_nothing() {
        let stopping = CancellationToken::new();
        stopping.cancel();
        let mut queue = ScriptedQueue {
            polls: vec![Some("a")].into(),
            pops: 0,
            stop_on_pop: None,
        };

        let accepted = consume(&mut queue, Arc::new(Semaphore::new(1)), &stopping, |_, _| {})
            .await
            .unwrap();
        assert_eq!(accepted, 0);
        assert_eq!(queue.pops, 0);
    }

    #[tokio::test]
    async fn test_waits_for_permit_before_popping() {
        let stopping = CancellationToken::new();
        let permits = Arc::new(Semaphore::new(1));
        let held = permits.clone().acquire_owned().await.unwrap();
        let mut queue = ScriptedQueue {
            polls: vec![Some("a")].into(),
            pops: 0,
            stop_on_pop: None,
        };

        let trigger = stopping.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let accepted = consume(&mut queue, permits, &stopping, |_, _| {}).await.unwrap();
        assert_eq!(accepted, 0);
        assert_eq!(queue.pops, 0);
        drop(held);
    }
}
