//! Daily timers keyed by an arbitrary string.
//!
//! `DailyScheduler` is the port the bot talks to; `TokioScheduler` is the
//! in-process implementation. Jobs live in memory only and are lost on restart.
//! The registry allows several jobs under one key; callers that want
//! one-job-per-key cancel before registering.

use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;

pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type JobCallback = Arc<dyn Fn() -> JobFuture + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub key: String,
    /// Time of day (UTC) the job fires.
    pub at: NaiveTime,
    pub next_run: DateTime<Utc>,
}

#[async_trait]
pub trait DailyScheduler: Send + Sync {
    /// Run `callback` every day at `at` (UTC) until cancelled.
    async fn register_daily(&self, key: &str, at: NaiveTime, callback: JobCallback)
        -> Result<JobId>;

    /// Returns false if the job was not registered.
    async fn cancel(&self, job: JobId) -> bool;

    /// Cancel every job registered under `key`; returns how many were cancelled.
    async fn cancel_all_for_key(&self, key: &str) -> usize;

    async fn list_for_key(&self, key: &str) -> Vec<JobInfo>;
}

/// First occurrence of `at` strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

#[derive(Clone, Default)]
pub struct TokioScheduler {
    inner: Arc<SchedulerInner>,
}

#[derive(Default)]
struct SchedulerInner {
    next_id: AtomicU64,
    jobs: tokio::sync::Mutex<BTreeMap<JobId, JobEntry>>,
}

struct JobEntry {
    key: String,
    at: NaiveTime,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl JobEntry {
    fn stop(self) {
        self.cancel.cancel();
        self.handle.abort(); // best-effort
    }

    fn info(&self, id: JobId) -> JobInfo {
        JobInfo {
            id,
            key: self.key.clone(),
            at: self.at,
            next_run: next_daily_run(Utc::now(), self.at),
        }
    }
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job_count(&self) -> usize {
        self.inner.jobs.lock().await.len()
    }

    /// Cancel every registered job.
    pub async fn shutdown(&self) {
        let mut jobs = self.inner.jobs.lock().await;
        let n = jobs.len();
        for (_, job) in std::mem::take(&mut *jobs) {
            job.stop();
        }
        info!(jobs = n, "scheduler stopped");
    }
}

/// Run after the one scheduled for `fired`.
///
/// Never the same day again, even when the wall clock still reads just before
/// `fired`; after a long stall it skips missed days instead of catching up.
pub fn following_run(fired: DateTime<Utc>, now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    next_daily_run(fired.max(now), at)
}

async fn job_loop(id: JobId, at: NaiveTime, callback: JobCallback, cancel: CancellationToken) {
    let mut next = next_daily_run(Utc::now(), at);
    loop {
        let dur = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        debug!(job = id.0, next_run = %next, "daily job sleeping");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(dur) => {
                debug!(job = id.0, "daily job firing");
                callback().await;
                next = following_run(next, Utc::now(), at);
            }
        }
    }
}

#[async_trait]
impl DailyScheduler for TokioScheduler {
    async fn register_daily(
        &self,
        key: &str,
        at: NaiveTime,
        callback: JobCallback,
    ) -> Result<JobId> {
        let id = JobId(self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(job_loop(id, at, callback, cancel.clone()));

        self.inner.jobs.lock().await.insert(
            id,
            JobEntry {
                key: key.to_string(),
                at,
                cancel,
                handle,
            },
        );
        info!(job = id.0, key, at = %at, "registered daily job");
        Ok(id)
    }

    async fn cancel(&self, job: JobId) -> bool {
        let entry = self.inner.jobs.lock().await.remove(&job);
        match entry {
            Some(entry) => {
                info!(job = job.0, key = %entry.key, "cancelled daily job");
                entry.stop();
                true
            }
            None => false,
        }
    }

    async fn cancel_all_for_key(&self, key: &str) -> usize {
        let removed = {
            let mut jobs = self.inner.jobs.lock().await;
            let ids: Vec<JobId> = jobs
                .iter()
                .filter(|(_, job)| job.key == key)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| jobs.remove(&id))
                .collect::<Vec<_>>()
        };

        let n = removed.len();
        for job in removed {
            job.stop();
        }
        if n > 0 {
            info!(key, jobs = n, "cancelled daily jobs");
        }
        n
    }

    async fn list_for_key(&self, key: &str) -> Vec<JobInfo> {
        let jobs = self.inner.jobs.lock().await;
        jobs.iter()
            .filter(|(_, job)| job.key == key)
            .map(|(id, job)| job.info(*id))
            .collect()
    }
}
