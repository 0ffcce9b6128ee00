//! Redis Manager - Redis-backed task store and submission queue
//!
//! This module handles all Redis-related operations including:
//! - Task records keyed by task id, with a TTL
//! - Claim-once through `SET NX EX`
//! - Task leases kept alive by a heartbeat while this process owns the task
//! - Recovery of tasks whose owner went away
//! - Submission queue operations (RPUSH / BLPOP)
//! - Publishing finished verdicts and counting processed tasks

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{JudgeStatus, Submission, TaskRecord, TaskStatus, Verdict};
use crate::error::JudgeError;
use crate::jobs::{JudgeJob, WorkerJob};
use crate::store::{terminal_status, TaskStore};

/// Task lease TTL, refreshed every half TTL while the task is owned
const TASK_LEASE_TTL_SECS: u64 = 30;

/// Redis key constants
pub mod keys {
    /// Task record key prefix (for polling)
    pub const TASK_PREFIX: &str = "judge:task:";

    /// Claim marker key prefix
    pub const CLAIM_PREFIX: &str = "judge:claim:";

    /// Task lease key prefix; present while some worker owns the task
    pub const LEASE_PREFIX: &str = "judge:lease:";

    /// Admitted submission key prefix, kept until the task is terminal
    pub const PAYLOAD_PREFIX: &str = "judge:payload:";

    /// Submission queue key
    pub const JUDGE_QUEUE: &str = "judge:queue";

    /// Finished verdict channel (for pub/sub)
    pub const JUDGE_RESULT_CHANNEL: &str = "judge:results";

    /// Number of tasks that reached a terminal state
    pub const PROCESSED_COUNTER: &str = "judge:processed";

    pub fn task(task_id: uuid::Uuid) -> String {
        format!("{}{}", TASK_PREFIX, task_id)
    }

    pub fn claim(task_id: uuid::Uuid) -> String {
        format!("{}{}", CLAIM_PREFIX, task_id)
    }

    pub fn lease(task_id: uuid::Uuid) -> String {
        format!("{}{}", LEASE_PREFIX, task_id)
    }

    pub fn payload(task_id: uuid::Uuid) -> String {
        format!("{}{}", PAYLOAD_PREFIX, task_id)
    }
}

/// What recovery does with one stored task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Terminal, or still owned by a live worker
    Keep,
    /// Owner gone, submission still stored: queue it again
    Requeue,
    /// Owner gone and nothing left to judge
    MarkLost,
}

pub fn recovery_action(record: &TaskRecord, lease_held: bool, has_payload: bool) -> RecoveryAction {
    if record.status.is_terminal() || lease_held {
        RecoveryAction::Keep
    } else if has_payload {
        RecoveryAction::Requeue
    } else {
        RecoveryAction::MarkLost
    }
}

/// Tasks settled by one recovery pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub lost: usize,
}

/// Task ids whose leases this process keeps alive
type HeldTasks = Arc<Mutex<HashSet<Uuid>>>;

fn held_snapshot(held: &HeldTasks) -> Vec<Uuid> {
    held.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .copied()
        .collect()
}

fn set_held(held: &HeldTasks, task_id: Uuid, owned: bool) {
    let mut held = held.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if owned {
        held.insert(task_id);
    } else {
        held.remove(&task_id);
    }
}

/// Task store and queue backed by Redis
pub struct RedisStore {
    client: redis::Client,
    conn: RwLock<MultiplexedConnection>,
    ttl_secs: u64,
    held: HeldTasks,
    lease_handle: JoinHandle<()>,
}

impl RedisStore {
    /// Connect to `redis_url`, retrying until Redis is reachable
    ///
    /// Also starts the heartbeat that keeps this process's task leases alive.
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        let held = HeldTasks::default();
        let lease_handle = spawn_lease_heartbeat(client.clone(), held.clone());

        Ok(Self {
            client,
            conn: RwLock::new(conn),
            ttl_secs,
            held,
            lease_handle,
        })
    }

    async fn connection(&self) -> MultiplexedConnection {
        self.conn.read().await.clone()
    }

    /// Reconnect to Redis
    async fn reconnect(&self) -> Result<MultiplexedConnection> {
        let conn = get_connection_with_retry(&self.client).await?;
        *self.conn.write().await = conn.clone();
        Ok(conn)
    }

    /// Block up to `timeout` for the next job on the queue.
    ///
    /// Unparseable jobs are logged and dropped. Automatically reconnects on
    /// connection failure.
    pub async fn pop_job(&self, timeout: Duration) -> Result<Option<WorkerJob>> {
        let mut conn = self.connection().await;
        let result: Option<(String, String)> =
            match conn.blpop(keys::JUDGE_QUEUE, timeout.as_secs_f64()).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    self.reconnect().await?;
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

    /// Append a job to the queue
    pub async fn push_job(&self, job: &WorkerJob) -> Result<()> {
        let json = serde_json::to_string(job)?;
        let mut conn = self.connection().await;
        if let Err(e) = conn.rpush::<_, _, ()>(keys::JUDGE_QUEUE, &json).await {
            warn!("Failed to push job: {}. Reconnecting...", e);
            let mut conn = self.reconnect().await?;
            conn.rpush::<_, _, ()>(keys::JUDGE_QUEUE, &json).await?;
        }
        Ok(())
    }

    /// Tasks that reached a terminal state, across all workers
    pub async fn processed_count(&self) -> Result<u64, JudgeError> {
        let mut conn = self.connection().await;
        let count: Option<u64> = conn.get(keys::PROCESSED_COUNTER).await?;
        Ok(count.unwrap_or(0))
    }

    /// Settle every stored task whose owner went away.
    ///
    /// A non-terminal task with no live lease is queued again when its
    /// submission is still stored, and finished as `system_error` otherwise.
    /// Taking the lease with `SET NX` first keeps concurrent recoverers from
    /// handling the same task twice.
    pub async fn recover_lost_tasks(&self) -> Result<RecoveryReport, JudgeError> {
        let mut conn = self.connection().await;
        let task_keys: Vec<String> = conn.keys(format!("{}*", keys::TASK_PREFIX)).await?;
        let mut report = RecoveryReport::default();

        for key in task_keys {
            let Some(task_id) = key
                .strip_prefix(keys::TASK_PREFIX)
                .and_then(|id| Uuid::parse_str(id).ok())
            else {
                continue;
            };
            let Some(record) = self.read_record(task_id).await? else {
                continue;
            };
            if record.status.is_terminal() {
                continue;
            }

            let acquired: Option<String> = redis::cmd("SET")
                .arg(keys::lease(task_id))
                .arg("recovering")
                .arg("NX")
                .arg("EX")
                .arg(TASK_LEASE_TTL_SECS)
                .query_async(&mut conn)
                .await?;
            let submission = self.read_payload(task_id).await?;

            match recovery_action(&record, acquired.is_none(), submission.is_some()) {
                RecoveryAction::Keep => {}
                RecoveryAction::Requeue => {
                    let Some(submission) = submission else {
                        continue;
                    };
                    self.requeue(submission).await?;
                    report.requeued += 1;
                }
                RecoveryAction::MarkLost => {
                    warn!("Task {} was {} with no owner, marking lost", task_id, record.status);
                    let verdict = Verdict::without_runs(
                        task_id,
                        JudgeStatus::SystemError,
                        "Task lost and cannot be recovered",
                    );
                    self.finish(&verdict).await?;
                    report.lost += 1;
                }
            }
        }

        if report != RecoveryReport::default() {
            info!(
                "Recovered tasks: requeued={}, lost={}",
                report.requeued, report.lost
            );
        }
        Ok(report)
    }

    /// Forget a task's state and put its submission back on the queue
    async fn requeue(&self, submission: Submission) -> Result<(), JudgeError> {
        let task_id = submission.task_id;
        let mut conn = self.connection().await;
        conn.del::<_, ()>(vec![
            keys::task(task_id),
            keys::claim(task_id),
            keys::payload(task_id),
        ])
        .await?;

        let job = WorkerJob::Judge(JudgeJob {
            task_id: Some(task_id),
            request: submission.into(),
        });
        self.push_job(&job)
            .await
            .map_err(|e| JudgeError::Store(e.to_string()))?;
        info!("Task {} requeued after its worker went away", task_id);
        Ok(())
    }

    async fn read_record(&self, task_id: Uuid) -> Result<Option<TaskRecord>, JudgeError> {
        let mut conn = self.connection().await;
        let raw: Option<String> = conn.get(keys::task(task_id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(JudgeError::from)
    }

    /// Stored submission, if it is still there and readable
    async fn read_payload(&self, task_id: Uuid) -> Result<Option<Submission>, JudgeError> {
        let mut conn = self.connection().await;
        let raw: Option<String> = conn.get(keys::payload(task_id)).await?;
        Ok(raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(submission) => Some(submission),
            Err(e) => {
                warn!("Dropping unreadable payload of task {}: {}", task_id, e);
                None
            }
        }))
    }

    /// Store a record with expiration, reconnecting once on failure
    async fn write_record(&self, record: &TaskRecord) -> Result<String, JudgeError> {
        let json = serde_json::to_string(record)?;
        let key = keys::task(record.task_id);

        let mut conn = self.connection().await;
        if let Err(e) = conn.set_ex::<_, _, ()>(&key, &json, self.ttl_secs).await {
            warn!("Failed to store task record: {}. Reconnecting...", e);
            let mut conn = self
                .reconnect()
                .await
                .map_err(|e| JudgeError::Store(e.to_string()))?;
            conn.set_ex::<_, _, ()>(&key, &json, self.ttl_secs).await?;
        }
        Ok(json)
    }
}

impl Drop for RedisStore {
    fn drop(&mut self) {
        self.lease_handle.abort();
    }
}

#[async_trait]
impl TaskStore for RedisStore {
    async fn insert_queued(&self, submission: &Submission) -> Result<(), JudgeError> {
        let task_id = submission.task_id;
        let json = serde_json::to_string(&TaskRecord::queued(task_id))?;
        let mut conn = self.connection().await;

        // lease first, so the record is never visible without an owner
        conn.set_ex::<_, _, ()>(keys::lease(task_id), "held", TASK_LEASE_TTL_SECS)
            .await?;
        let created: Option<String> = redis::cmd("SET")
            .arg(keys::task(task_id))
            .arg(&json)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;

        if created.is_none() {
            return Err(JudgeError::InvalidSubmission(format!(
                "task {} already exists",
                task_id
            )));
        }
        set_held(&self.held, task_id, true);

        conn.set_ex::<_, _, ()>(
            keys::payload(task_id),
            serde_json::to_string(submission)?,
            self.ttl_secs,
        )
        .await?;
        Ok(())
    }

    async fn claim(&self, task_id: Uuid) -> Result<bool, JudgeError> {
        let mut conn = self.connection().await;
        let claimed: Option<String> = redis::cmd("SET")
            .arg(keys::claim(task_id))
            .arg("claimed")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        if claimed.is_none() {
            return Ok(false);
        }

        let mut record = match self.read_record(task_id).await? {
            Some(record) => record,
            None => return Err(JudgeError::Store(format!("unknown task {}", task_id))),
        };
        if record.status != TaskStatus::Queued {
            return Ok(false);
        }
        record.status = TaskStatus::Running;
        self.write_record(&record).await?;
        Ok(true)
    }

    async fn finish(&self, verdict: &Verdict) -> Result<(), JudgeError> {
        let task_id = verdict.task_id;
        let mut record = self
            .read_record(task_id)
            .await?
            .unwrap_or_else(|| TaskRecord::queued(task_id));
        if record.status.is_terminal() {
            return Ok(());
        }
        record.status = terminal_status(verdict);
        record.verdict = Some(verdict.clone());
        let json = self.write_record(&record).await?;
        set_held(&self.held, task_id, false);

        // No subscribers is not an error
        let mut conn = self.connection().await;
        let _ = conn
            .del::<_, ()>(vec![keys::lease(task_id), keys::payload(task_id)])
            .await;
        let _ = conn
            .publish::<_, _, ()>(keys::JUDGE_RESULT_CHANNEL, &json)
            .await;
        let _ = conn.incr::<_, _, ()>(keys::PROCESSED_COUNTER, 1).await;
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> Result<Option<TaskRecord>, JudgeError> {
        self.read_record(task_id).await
    }

    async fn abandon(&self, task_id: Uuid) {
        // the lease runs out and the next recovery pass requeues the task
        set_held(&self.held, task_id, false);
        debug!("Released lease of task {}", task_id);
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

/// Spawn a background task to keep the leases of held tasks alive
fn spawn_lease_heartbeat(client: redis::Client, held: HeldTasks) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(TASK_LEASE_TTL_SECS / 2);

        loop {
            tokio::time::sleep(interval).await;

            let task_ids = held_snapshot(&held);
            if task_ids.is_empty() {
                continue;
            }

            match get_connection_with_retry(&client).await {
                Ok(mut conn) => {
                    for task_id in task_ids {
                        if let Err(e) = conn
                            .set_ex::<_, _, ()>(keys::lease(task_id), "held", TASK_LEASE_TTL_SECS)
                            .await
                        {
                            warn!("Failed to refresh lease of task {}: {}", task_id, e);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to refresh task leases (connection): {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JudgeConfig;
    use crate::core::{JudgeMode, Language, SubmissionRequest, TestCase};

    #[test]
    fn test_keys() {
        let id = Uuid::nil();
        assert_eq!(
            keys::task(id),
            "judge:task:00000000-0000-0000-0000-000000000000"
        );
        assert!(keys::claim(id).starts_with(keys::CLAIM_PREFIX));
        assert!(keys::lease(id).starts_with(keys::LEASE_PREFIX));
        assert!(keys::payload(id).ends_with(&id.to_string()));
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(redis::Client::open("not a url").is_err());
    }

    #[test]
    fn test_recovery_action() {
        let id = Uuid::new_v4();
        let queued = TaskRecord::queued(id);
        let mut running = TaskRecord::queued(id);
        running.status = TaskStatus::Running;
        let mut done = TaskRecord::queued(id);
        done.status = TaskStatus::Completed;

        assert_eq!(recovery_action(&done, false, true), RecoveryAction::Keep);
        assert_eq!(recovery_action(&running, true, true), RecoveryAction::Keep);
        assert_eq!(recovery_action(&running, false, true), RecoveryAction::Requeue);
        assert_eq!(recovery_action(&queued, false, true), RecoveryAction::Requeue);
        assert_eq!(recovery_action(&running, false, false), RecoveryAction::MarkLost);
    }

    #[test]
    fn test_requeued_job_readmits_same_submission() {
        let config = JudgeConfig::default();
        let id = Uuid::new_v4();
        let submission = SubmissionRequest {
            code: "print(input())".into(),
            language: Language::Python,
            mode: JudgeMode::Acm,
            test_cases: vec![TestCase::new("1", "1")],
            time_limit: Some(3.0),
            memory_limit: Some(128),
            entry_point: None,
            float_tolerance: Some(1e-6),
            policy: None,
        }
        .into_submission(id, &config)
        .unwrap();

        let job = WorkerJob::Judge(JudgeJob {
            task_id: Some(id),
            request: submission.clone().into(),
        });
        let json = serde_json::to_string(&job).unwrap();
        let WorkerJob::Judge(popped) = serde_json::from_str::<WorkerJob>(&json).unwrap();
        assert_eq!(popped.task_id, Some(id));

        let again = popped.request.into_submission(id, &config).unwrap();
        assert_eq!(again.time_limit, 3.0);
        assert_eq!(again.memory_limit, 128);
        assert_eq!(again.float_tolerance, Some(1e-6));
        assert_eq!(again.test_cases, submission.test_cases);
    }

    #[test]
    fn test_held_tasks() {
        let held = HeldTasks::default();
        let id = Uuid::new_v4();
        set_held(&held, id, true);
        assert_eq!(held_snapshot(&held), vec![id]);
        set_held(&held, id, false);
        assert!(held_snapshot(&held).is_empty());
    }
}
