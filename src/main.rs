use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use mini_judge::jobs::{JudgeJob, WorkerJob};
use mini_judge::languages::LanguageRegistry;
use mini_judge::redis_manager::RedisStore;
use mini_judge::runner::SandboxedRunner;
use mini_judge::store::TaskStore;
use mini_judge::{Coordinator, Judge, JudgeConfig, JudgeError};

/// How long one BLPOP waits before the loop re-checks for shutdown
const POP_TIMEOUT: Duration = Duration::from_secs(1);
/// Pause while every worker is busy and the local queue is full
const BACKPRESSURE_PAUSE: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mini_judge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = JudgeConfig::from_env()?;
    info!(
        "Starting Judge Worker: concurrency={}, scratch={}",
        config.concurrency,
        config.scratch_root.display()
    );

    let languages = Arc::new(LanguageRegistry::load(config.languages_path.as_deref())?);
    info!("Loaded languages: {}", languages.supported().join(", "));

    let store = Arc::new(RedisStore::connect(&config.redis_url, config.result_ttl_secs).await?);
    let runner = Arc::new(SandboxedRunner::new(languages, &config));
    let recovery = spawn_recovery(store.clone(), config.recover_interval);
    let coordinator = Coordinator::start(config, Judge::new(runner), store.clone());

    info!("Waiting for jobs...");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        if !coordinator.has_room() {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(BACKPRESSURE_PAUSE) => continue,
            }
        }

        let job = tokio::select! {
            _ = &mut shutdown => break,
            job = store.pop_job(POP_TIMEOUT) => job,
        };

        match job {
            Ok(Some(WorkerJob::Judge(job))) => admit(&coordinator, store.as_ref(), job).await,
            Ok(None) => {}
            Err(e) => {
                error!("Failed to read from the job queue: {:#}", e);
                sleep(Duration::from_secs(1)).await;
            }
        }
    }

    info!("Shutdown requested, draining queued submissions...");
    recovery.abort();
    coordinator.shutdown().await;
    let health = coordinator.health();
    info!(
        "Judge Worker stopped: submitted={}, completed={}, failed={}, unrecorded={}",
        health.submitted, health.completed, health.failed, health.unrecorded
    );
    match store.processed_count().await {
        Ok(total) => info!("Tasks processed across all workers: {}", total),
        Err(e) => warn!("Failed to read the processed counter: {}", e),
    }
    Ok(())
}

async fn admit(coordinator: &Coordinator, store: &RedisStore, job: JudgeJob) {
    let job_task_id = job.task_id;
    let result = match job.task_id {
        Some(task_id) => {
            // a redelivered job is not judged twice
            if let Ok(Some(record)) = store.get(task_id).await {
                info!("Task {} is already {}, ignoring", task_id, record.status);
                return;
            }
            coordinator.submit_as(task_id, job.request).await
        }
        None => coordinator.submit(job.request).await,
    };

    match result {
        Ok(task_id) => info!("Received judge job: task_id={}", task_id),
        Err(JudgeError::InvalidSubmission(reason)) => {
            warn!("Rejected judge job: {}", reason);
            // pollers of a producer-assigned id still get an answer
            if let Some(task_id) = job_task_id {
                if let Err(e) = coordinator.reject(task_id, &reason).await {
                    error!("Failed to record rejection of task {}: {}", task_id, e);
                }
            }
        }
        Err(e) => error!("Failed to admit judge job: {}", e),
    }
}

/// Periodically settle tasks whose worker went away. The first pass runs at
/// startup, which picks up whatever a crashed predecessor left behind.
fn spawn_recovery(store: Arc<RedisStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = store.recover_lost_tasks().await {
                error!("Task recovery failed: {}", e);
            }
        }
    })
}
