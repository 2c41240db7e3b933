//! Registry of import jobs, shared across the Actix application.
//!
//! The main components are:
//! - `JobsState`: a clonable, thread-safe handle on every known `ImportJob`.
//!   It is injected into the Actix application state in `main.rs`.
//! - `JobUpdate`: a progress message sent by a running import back to the
//!   registry, so the blocking worker never needs the write lock itself.
//! - `start_job_updater`: a long-running task that applies `JobUpdate`s.
//! - `start_job_evictor`: a periodic task that drops finished jobs once they
//!   have been idle for longer than the configured TTL.

use common::jobs::{ImportProgress, ImportResult, ImportStage};
use common::requests::ImportOptions;
use chrono::Utc;
use log::{debug, info};
use std::time::{Duration, Instant};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// State of one import job.
#[derive(Clone, Debug)]
pub struct ImportJob {
    pub options: ImportOptions,
    pub progress: ImportProgress,
    pub result: ImportResult,
    /// Hex MD5 of the uploaded bytes.
    pub file_md5: String,
    /// Last time the job was written; drives eviction.
    pub touched: Instant,
}

impl ImportJob {
    /// A freshly uploaded job in the `queued` stage.
    pub fn queued(options: ImportOptions, file_name: &str, file_md5: String) -> Self {
        Self {
            options,
            progress: ImportProgress::queued(Utc::now()),
            result: ImportResult::new(file_name),
            file_md5,
            touched: Instant::now(),
        }
    }
}

/// A thread-safe, shareable container for the state of all import jobs.
#[derive(Clone)]
pub struct JobsState {
    /// Job id to job. Read by the progress/result endpoints, written by the
    /// upload handler and the updater task.
    pub jobs: Arc<RwLock<HashMap<String, ImportJob>>>,
    /// Running imports push intermediate progress through this sender.
    pub tx: mpsc::Sender<JobUpdate>,
    /// How long a finished job stays queryable after its last update.
    pub ttl: Duration,
}

/// Progress update for a specific job.
#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) progress: ImportProgress,
}

impl JobsState {
    /// Creates an empty registry and the receiver to hand to [`start_job_updater`].
    pub fn new(ttl: Duration) -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let state = Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
            ttl,
        };
        (state, rx)
    }

    pub async fn register(&self, job_id: &str, job: ImportJob) {
        self.jobs.write().await.insert(job_id.to_string(), job);
    }

    /// Stores the final progress and result of a job that ran to completion.
    pub async fn complete(&self, job_id: &str, progress: ImportProgress, result: ImportResult) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.progress = progress;
            job.result = result;
            job.touched = Instant::now();
        }
    }

    /// Moves a job to `failed`, keeping the last reported percentage.
    ///
    /// `total_rows` is recorded when the file was parsed before the failure.
    pub async fn fail(&self, job_id: &str, message: &str, total_rows: Option<usize>) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.progress = job.progress.finish(ImportStage::Failed, message, Utc::now());
            job.result.success = false;
            if let Some(total) = total_rows {
                job.result.total_rows = total;
            }
            job.touched = Instant::now();
        }
    }

    pub async fn progress(&self, job_id: &str) -> Option<ImportProgress> {
        self.jobs.read().await.get(job_id).map(|job| job.progress.clone())
    }

    pub async fn result(&self, job_id: &str) -> Option<ImportResult> {
        self.jobs.read().await.get(job_id).map(|job| job.result.clone())
    }

    /// Id of a completed, persisted import whose upload had the same MD5.
    pub async fn previous_import_with_md5(&self, md5: &str) -> Option<String> {
        self.jobs
            .read()
            .await
            .iter()
            .find(|(_, job)| {
                job.file_md5 == md5
                    && job.progress.stage == ImportStage::Completed
                    && !job.options.dry_run
            })
            .map(|(id, _)| id.clone())
    }

    /// Drops terminal jobs untouched since `now - ttl`. Returns how many went.
    pub async fn evict_expired(&self, now: Instant) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            !job.progress.stage.is_terminal() || now.saturating_duration_since(job.touched) <= self.ttl
        });
        before - jobs.len()
    }
}

/// Applies `JobUpdate` messages to the registry until every sender is gone.
///
/// Updates for unknown jobs, or jobs already in a terminal stage, are dropped so
/// a late progress message cannot overwrite a final state.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        match jobs.get_mut(&update.job_id) {
            Some(job) if !job.progress.stage.is_terminal() => {
                job.progress = update.progress;
                job.touched = Instant::now();
            }
            _ => debug!("Dropping progress update for job {}", update.job_id),
        }
    }
}

/// Periodically evicts expired jobs. Runs for the lifetime of the server.
pub async fn start_job_evictor(state: JobsState, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let evicted = state.evict_expired(Instant::now()).await;
        if evicted > 0 {
            info!("Evicted {} expired import jobs", evicted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(md5: &str) -> ImportJob {
        ImportJob::queued(ImportOptions::default(), "clienti.csv", md5.to_string())
    }

    fn completed(job: &ImportJob) -> ImportProgress {
        job.progress.finish(ImportStage::Completed, "Import completed (1/1)", Utc::now())
    }

    async fn wait_for_stage(state: &JobsState, job_id: &str, stage: ImportStage) {
        for _ in 0..100 {
            if state.progress(job_id).await.map(|p| p.stage) == Some(stage) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {:?}", job_id, stage);
    }

    #[actix_web::test]
    async fn updater_applies_progress_until_job_is_terminal() {
        let (state, rx) = JobsState::new(Duration::from_secs(60));
        state.register("a", job("m")).await;
        state.register("b", job("m")).await;
        tokio::spawn(start_job_updater(state.clone(), rx));

        let processing = state
            .progress("a")
            .await
            .unwrap()
            .advance(ImportStage::Processing, 10, "Processing records");
        state
            .tx
            .send(JobUpdate {
                job_id: "a".into(),
                progress: processing.clone(),
            })
            .await
            .unwrap();
        wait_for_stage(&state, "a", ImportStage::Processing).await;
        assert_eq!(state.progress("a").await, Some(processing.clone()));

        let final_progress = processing.finish(ImportStage::Completed, "Import completed (1/1)", Utc::now());
        state
            .complete("a", final_progress.clone(), ImportResult::new("clienti.csv"))
            .await;

        // The late update for "a" is consumed before the one for "b".
        for (job_id, pct) in [("a", 50), ("b", 20)] {
            state
                .tx
                .send(JobUpdate {
                    job_id: job_id.into(),
                    progress: processing.advance(ImportStage::Processing, pct, "late"),
                })
                .await
                .unwrap();
        }
        wait_for_stage(&state, "b", ImportStage::Processing).await;
        assert_eq!(state.progress("a").await, Some(final_progress));
    }

    #[actix_web::test]
    async fn failing_keeps_percentage_and_marks_result() {
        let (state, _rx) = JobsState::new(Duration::from_secs(60));
        let mut queued = job("m");
        queued.progress = queued.progress.advance(ImportStage::Processing, 40, "Processing records");
        queued.result.success = true;
        state.register("a", queued).await;

        state.fail("a", "database unavailable at row 3", Some(7)).await;

        let progress = state.progress("a").await.unwrap();
        assert_eq!(progress.stage, ImportStage::Failed);
        assert_eq!(progress.progress, 40);
        assert_eq!(progress.message, "database unavailable at row 3");
        assert!(progress.completed_at.is_some());
        let result = state.result("a").await.unwrap();
        assert!(!result.success);
        assert_eq!(result.total_rows, 7);
        assert_eq!(state.progress("missing").await, None);

        state.register("b", job("m")).await;
        state.fail("b", "cannot open database", None).await;
        assert_eq!(state.result("b").await.unwrap().total_rows, 0);
    }

    #[actix_web::test]
    async fn only_finished_idle_jobs_are_evicted() {
        let (state, _rx) = JobsState::new(Duration::from_secs(60));
        let mut done = job("m1");
        done.progress = completed(&done);
        state.register("done", done).await;
        state.register("running", job("m2")).await;

        let now = Instant::now();
        assert_eq!(state.evict_expired(now).await, 0);

        let later = now + Duration::from_secs(120);
        assert_eq!(state.evict_expired(later).await, 1);
        assert!(state.result("done").await.is_none());
        assert!(state.result("running").await.is_some());
    }

    #[actix_web::test]
    async fn duplicate_detection_ignores_dry_runs_and_unfinished_jobs() {
        let (state, _rx) = JobsState::new(Duration::from_secs(60));

        state.register("running", job("same")).await;
        let mut dry = ImportJob::queued(
            ImportOptions {
                dry_run: true,
                ..ImportOptions::default()
            },
            "clienti.csv",
            "same".to_string(),
        );
        dry.progress = completed(&dry);
        state.register("dry", dry).await;
        assert_eq!(state.previous_import_with_md5("same").await, None);

        let mut live = job("same");
        live.progress = completed(&live);
        state.register("live", live).await;
        assert_eq!(state.previous_import_with_md5("same").await.as_deref(), Some("live"));
        assert_eq!(state.previous_import_with_md5("other").await, None);
    }
}
