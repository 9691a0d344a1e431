//! Background batch jobs: start, poll progress, stop.
//!
//! State is in memory only and does not survive a restart. Stopped jobs are
//! evicted once they outlive `JobRetention::max_age`, or when more than
//! `JobRetention::max_stopped` of them are held.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::extractor::Document;
use crate::analysis::keywords::KeywordScanner;
use crate::analysis::orchestrator::{Analyzer, BatchReport, CancelFlag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
}

struct Job {
    status: JobStatus,
    total: usize,
    processed: usize,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    report: Option<BatchReport>,
    cancel: CancelFlag,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total: usize,
    pub processed: usize,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Present once the job has stopped.
    pub report: Option<BatchReport>,
}

impl Job {
    fn snapshot(&self, job_id: Uuid) -> JobSnapshot {
        JobSnapshot {
            job_id,
            status: self.status,
            total: self.total,
            processed: self.processed,
            cancel_requested: self.cancel.is_cancelled(),
            created_at: self.created_at,
            finished_at: self.finished_at,
            report: self.report.clone(),
        }
    }
}

/// How long stopped jobs, and their reports, stay queryable.
#[derive(Debug, Clone, Copy)]
pub struct JobRetention {
    pub max_age: Duration,
    pub max_stopped: usize,
}

impl Default for JobRetention {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(1),
            max_stopped: 100,
        }
    }
}

#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    retention: JobRetention,
}

impl JobRegistry {
    pub fn new(retention: JobRetention) -> Self {
        Self {
            jobs: Arc::default(),
            retention,
        }
    }

    /// Registers a job and runs it on a background task. Returns immediately.
    pub async fn start(
        &self,
        analyzer: Arc<Analyzer>,
        documents: Vec<Document>,
        keywords: Arc<KeywordScanner>,
    ) -> Uuid {
        let job_id = Uuid::new_v4();
        let cancel = CancelFlag::default();
        let mut jobs = self.jobs.write().await;
        evict_stopped(&mut jobs, self.retention, Utc::now());
        jobs.insert(
            job_id,
            Job {
                status: JobStatus::Running,
                total: documents.len(),
                processed: 0,
                created_at: Utc::now(),
                finished_at: None,
                report: None,
                cancel: cancel.clone(),
            },
        );
        drop(jobs);
        info!("Job {job_id} started with {} documents", documents.len());

        let registry = self.clone();
        tokio::spawn(async move {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let progress_registry = registry.clone();
            let progress = tokio::spawn(async move {
                while let Some(done) = rx.recv().await {
                    if let Some(job) = progress_registry.jobs.write().await.get_mut(&job_id) {
                        job.processed = job.processed.max(done);
                    }
                }
            });

            let report = analyzer
                .analyze_batch(documents, keywords, cancel, Some(tx))
                .await;
            let _ = progress.await;
            registry.finish(job_id, report).await;
        });

        job_id
    }

    async fn finish(&self, job_id: Uuid, report: BatchReport) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&job_id) {
            job.status = if report.cancelled {
                JobStatus::Cancelled
            } else {
                JobStatus::Completed
            };
            job.processed = report.items.len();
            job.finished_at = Some(Utc::now());
            info!(
                "Job {job_id} {:?}: {} succeeded, {} failed",
                job.status, report.succeeded, report.failed
            );
            job.report = Some(report);
        }
        evict_stopped(&mut jobs, self.retention, Utc::now());
    }

    pub async fn snapshot(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.read().await.get(&job_id).map(|j| j.snapshot(job_id))
    }

    /// Asks a running job to stop before its next document.
    pub async fn cancel(&self, job_id: Uuid) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&job_id)?;
        if job.status == JobStatus::Running {
            job.cancel.cancel();
            info!("Job {job_id} cancellation requested");
        }
        Some(job.snapshot(job_id))
    }
}

/// Drops stopped jobs past `max_age`, then the oldest stopped jobs beyond
/// `max_stopped`. Running jobs are never evicted.
fn evict_stopped(jobs: &mut HashMap<Uuid, Job>, retention: JobRetention, now: DateTime<Utc>) {
    let before = jobs.len();
    jobs.retain(|_, job| match job.finished_at {
        Some(finished) => now - finished < retention.max_age,
        None => true,
    });

    let mut stopped: Vec<(DateTime<Utc>, Uuid)> = jobs
        .iter()
        .filter_map(|(id, job)| job.finished_at.map(|at| (at, *id)))
        .collect();
    if stopped.len() > retention.max_stopped {
        stopped.sort();
        let excess = stopped.len() - retention.max_stopped;
        for (_, id) in stopped.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    if jobs.len() < before {
        debug!("Evicted {} stopped jobs", before - jobs.len());
    }
}
