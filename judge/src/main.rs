use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dsa_judge::jobs::{self, JobStatus};
use dsa_judge::redis_manager::RedisManager;
use dsa_judge::sandbox::PistonClient;
use dsa_judge::store::{load_catalog, RedisStore};
use dsa_judge::{worker, Dispatcher, Judge, JudgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dsa_judge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = JudgeConfig::from_env()?;

    let languages = config.load_languages()?;
    info!(
        "Loaded languages: {}",
        languages.supported_languages().join(", ")
    );

    info!("Starting Judge Worker...");

    let sandbox = PistonClient::new(config.sandbox_url.as_str())
        .context("Failed to create sandbox client")?;
    info!(
        "Sandbox at {} (timeout: {:?})",
        sandbox.base_url(),
        config.sandbox_timeout
    );
    let dispatcher = Dispatcher::new(Arc::new(sandbox)).with_timeout(config.sandbox_timeout);

    let store = RedisStore::connect(&config.redis_url)
        .await
        .context("Failed to connect submission store")?;

    if let Some(path) = &config.problems_path {
        let problems = load_catalog(path)?;
        let seeded = store
            .seed_problems(&problems)
            .await
            .context("Failed to seed problems")?;
        info!("Seeded {} problems from {}", seeded, path.display());
    }

    let shutdown = CancellationToken::new();
    let judge = Judge::new(languages, dispatcher, Arc::new(store)).with_cancellation(shutdown.clone());

    let mut redis = RedisManager::with_url(&config.redis_url).await?;
    let sink = redis.result_sink().await?;

    let permits = Arc::new(Semaphore::new(config.worker_concurrency));
    info!(
        "Waiting for jobs (concurrency {})...",
        config.worker_concurrency
    );

    let stopping = CancellationToken::new();
    let stop_signal = stopping.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, no longer accepting jobs");
            stop_signal.cancel();
        }
    });

    let accepted = worker::consume(&mut redis, permits.clone(), &stopping, |job, permit| {
        let judge = judge.clone();
        let mut sink = sink.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let job_id = job.job_id().to_string();
            let result = jobs::process_job(&judge, job).await;
            if result.status() != JobStatus::Completed {
                warn!("Job {} finished with status {:?}", job_id, result.status());
            }
            if let Err(e) = sink.store_result(&result).await {
                error!("Failed to store result for job {}: {}", job_id, e);
            }
        });
    })
    .await?;
    info!("Accepted {} jobs", accepted);

    // Let in-flight jobs finish; a second Ctrl-C aborts their dispatches
    let all = config.worker_concurrency as u32;
    tokio::select! {
        _ = permits.acquire_many(all) => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Cancelling in-flight jobs");
            shutdown.cancel();
            let _ = permits.acquire_many(all).await;
        }
    }

    info!("Judge Worker stopped");
    Ok(())
}
