//! Concurrency coordinator
//!
//! Admits submissions into one FIFO queue and runs them on a fixed pool of
//! worker tasks, so at most `concurrency` submissions execute at once. Each
//! task moves `queued -> running -> completed | failed` through the
//! [`TaskStore`]; a worker only judges a task it claimed.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::JudgeConfig;
use crate::core::{JudgeStatus, Submission, SubmissionRequest, TaskRecord, Verdict};
use crate::error::JudgeError;
use crate::jobs::judger::Judge;
use crate::store::TaskStore;

/// Store calls a worker makes before giving up on a task
const STORE_ATTEMPTS: u32 = 5;
/// First retry delay, doubled on every further attempt
const STORE_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Counters {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    unrecorded: AtomicU64,
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub queue_depth: usize,
    pub in_flight: usize,
    pub capacity: usize,
    /// `in_flight / capacity`
    pub saturation: f64,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Judged tasks whose verdict the store never accepted
    pub unrecorded: u64,
}

pub struct Coordinator {
    config: JudgeConfig,
    store: Arc<dyn TaskStore>,
    sender: Mutex<Option<mpsc::UnboundedSender<Submission>>>,
    counters: Arc<Counters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Spawn `config.concurrency` workers on the current runtime
    pub fn start(config: JudgeConfig, judge: Judge, store: Arc<dyn TaskStore>) -> Self {
        let capacity = config.concurrency.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());
        let judge = Arc::new(judge);

        let workers = (0..capacity)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    receiver.clone(),
                    judge.clone(),
                    store.clone(),
                    counters.clone(),
                ))
            })
            .collect();
        info!("Coordinator started with {} workers", capacity);

        Self {
            config,
            store,
            sender: Mutex::new(Some(sender)),
            counters,
            workers: Mutex::new(workers),
        }
    }

    /// Validate a request, assign it a task id and queue it
    pub async fn submit(&self, request: SubmissionRequest) -> Result<Uuid, JudgeError> {
        self.submit_as(Uuid::new_v4(), request).await
    }

    /// Like [`submit`](Self::submit) with a task id handed out by the producer
    pub async fn submit_as(
        &self,
        task_id: Uuid,
        request: SubmissionRequest,
    ) -> Result<Uuid, JudgeError> {
        let submission = request.into_submission(task_id, &self.config)?;
        self.enqueue(submission).await?;
        Ok(task_id)
    }

    /// Queue a submission whose task id was chosen elsewhere
    pub async fn enqueue(&self, submission: Submission) -> Result<(), JudgeError> {
        let sender = self.sender.lock().await;
        let Some(sender) = sender.as_ref() else {
            return Err(JudgeError::ShuttingDown);
        };

        let task_id = submission.task_id;
        self.store.insert_queued(&submission).await?;
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(submission).is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(JudgeError::ShuttingDown);
        }
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        debug!("Task {} queued", task_id);
        Ok(())
    }

    /// Settle a producer-assigned task that failed admission, so pollers of
    /// `task_id` see a terminal record instead of nothing
    pub async fn reject(&self, task_id: Uuid, reason: &str) -> Result<(), JudgeError> {
        let verdict = Verdict::without_runs(
            task_id,
            JudgeStatus::CompileError,
            format!("Invalid submission: {}", reason),
        );
        self.store.finish(&verdict).await
    }

    /// Current record for `task_id`; the verdict is present once terminal
    pub async fn poll(&self, task_id: Uuid) -> Result<Option<TaskRecord>, JudgeError> {
        self.store.get(task_id).await
    }

    pub fn health(&self) -> HealthSnapshot {
        let capacity = self.capacity();
        let in_flight = self.counters.in_flight.load(Ordering::SeqCst);
        HealthSnapshot {
            queue_depth: self.counters.queued.load(Ordering::SeqCst),
            in_flight,
            capacity,
            saturation: in_flight as f64 / capacity as f64,
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            unrecorded: self.counters.unrecorded.load(Ordering::SeqCst),
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// Whether another submission can be admitted without waiting behind a full pool
    pub fn has_room(&self) -> bool {
        self.counters.queued.load(Ordering::SeqCst) < self.capacity()
    }

    /// Stop admitting, let workers drain the queue, then wait for them
    pub async fn shutdown(&self) {
        if self.sender.lock().await.take().is_none() {
            return;
        }
        info!(
            "Coordinator shutting down, {} tasks still queued",
            self.counters.queued.load(Ordering::SeqCst)
        );
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task ended abnormally: {}", e);
            }
        }
        info!("Coordinator stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Submission>>>,
    judge: Arc<Judge>,
    store: Arc<dyn TaskStore>,
    counters: Arc<Counters>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(submission) = next else {
            debug!("Worker {} exiting", worker_id);
            return;
        };
        counters.queued.fetch_sub(1, Ordering::SeqCst);
        let task_id = submission.task_id;

        let claimed = {
            let store = &*store;
            with_retry("claim", task_id, move || store.claim(task_id)).await
        };
        match claimed {
            Ok(true) => {}
            Ok(false) => {
                warn!("Task {} already claimed, skipping", task_id);
                continue;
            }
            Err(e) => {
                error!("Worker {} failed to claim task {}: {}", worker_id, task_id, e);
                let verdict = Verdict::without_runs(
                    task_id,
                    JudgeStatus::SystemError,
                    "Judge error: task store unavailable",
                );
                settle(&*store, &counters, &verdict).await;
                continue;
            }
        }

        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        let verdict = run_judge(&judge, submission).await;
        counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        settle(&*store, &counters, &verdict).await;
    }
}

/// Store the verdict; the task counts as completed or failed only once stored
async fn settle(store: &dyn TaskStore, counters: &Counters, verdict: &Verdict) {
    let task_id = verdict.task_id;
    match with_retry("store verdict for", task_id, move || store.finish(verdict)).await {
        Ok(()) if verdict.status == JudgeStatus::SystemError => {
            counters.failed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(()) => {
            counters.completed.fetch_add(1, Ordering::SeqCst);
        }
        Err(e) => {
            error!("Giving up on storing the verdict for task {}: {}", task_id, e);
            counters.unrecorded.fetch_add(1, Ordering::SeqCst);
            store.abandon(task_id).await;
        }
    }
}

/// Run a store operation, retrying with exponential backoff
async fn with_retry<T, F, Fut>(what: &str, task_id: Uuid, mut op: F) -> Result<T, JudgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JudgeError>>,
{
    let mut delay = STORE_BACKOFF;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < STORE_ATTEMPTS => {
                warn!(
                    "Failed to {} task {} (attempt {}/{}): {}. Retrying in {:?}",
                    what, task_id, attempt, STORE_ATTEMPTS, e, delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Judge on a separate task so a panic still yields a terminal verdict
async fn run_judge(judge: &Arc<Judge>, submission: Submission) -> Verdict {
    let task_id = submission.task_id;
    let judge = judge.clone();
    match tokio::spawn(async move { judge.judge(&submission).await }).await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("Judging task {} panicked: {}", task_id, e);
            Verdict::without_runs(task_id, JudgeStatus::SystemError, "Judge error: internal failure")
        }
    }
}
