//! Job scheduler implementation.
//!
//! Admits transcode jobs (one active job per video), dispatches the oldest
//! queued job whenever a worker is free, and recovers jobs orphaned by a
//! crashed or restarted worker. Stage semantics live in the pipeline; the
//! scheduler owns admission, the worker pool, and the attempt cap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::PipelineSettings;
use crate::metrics;
use crate::pipeline::JobRunner;
use crate::store::{FailureClass, Job, JobFilter, JobState, MediaStore, StoreError, VideoStatus};

use super::types::{ActiveJob, SchedulerError, SchedulerStatus};

/// The job scheduler - admits, dispatches, and recovers transcode jobs.
pub struct JobScheduler {
    settings: PipelineSettings,
    store: Arc<dyn MediaStore>,
    runner: Arc<JobRunner>,

    // Runtime state
    running: Arc<AtomicBool>,
    workers: Arc<Semaphore>,
    active_jobs: Arc<RwLock<HashMap<String, ActiveJob>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobScheduler {
    /// Create a new scheduler with a worker pool sized from the settings.
    pub fn new(
        settings: PipelineSettings,
        store: Arc<dyn MediaStore>,
        runner: Arc<JobRunner>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let workers = Arc::new(Semaphore::new(settings.workers));

        Self {
            settings,
            store,
            runner,
            running: Arc::new(AtomicBool::new(false)),
            workers,
            active_jobs: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
        }
    }

    /// Queue a transcode job for a video.
    ///
    /// Fails with `Conflict` if the video already has a non-terminal job;
    /// the rejected submission is not queued.
    pub fn submit(&self, video_id: &str) -> Result<Job, SchedulerError> {
        let video = self
            .store
            .get_video(video_id)?
            .ok_or_else(|| SchedulerError::VideoNotFound(video_id.to_string()))?;

        let job = self.store.create_job(&video.id)?;
        metrics::JOB_SUBMISSIONS.inc();
        info!(
            "Job {} queued for video {} (attempt {})",
            job.id, video.id, job.attempt
        );
        Ok(job)
    }

    /// Cancel a job.
    ///
    /// A queued job is closed directly. A job held by a worker is signalled
    /// through its cancel flag and reaches `failed` once the worker observes
    /// it between sub-steps; the returned job still shows the in-flight state
    /// in that case.
    pub async fn cancel(&self, job_id: &str) -> Result<Job, SchedulerError> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        if job.state.is_terminal() {
            return Err(SchedulerError::InvalidState {
                job_id: job.id,
                current_state: job.state.state_type().to_string(),
                operation: "cancel".to_string(),
            });
        }

        // A live worker folds the cancellation into its own terminal
        // transition.
        {
            let active = self.active_jobs.read().await;
            if let Some(claim) = active.get(job_id) {
                claim.cancel.store(true, Ordering::Relaxed);
                info!("Cancellation signalled for running job {}", job_id);
                return Ok(job);
            }
        }

        // No live claim: close the job here. The compare-and-set can lose to
        // a worker claiming the job in the meantime; fall back to the flag.
        let expected = job.state.state_type();
        let cancelled = JobState::cancelled(job.attempt, Utc::now());
        match self.store.transition_job(&job.id, expected, cancelled) {
            Ok(closed) => {
                self.settle_video_status(&job.video_id);
                info!("Job {} cancelled while {}", job.id, expected);
                Ok(closed)
            }
            Err(StoreError::InvalidState { .. }) => {
                let active = self.active_jobs.read().await;
                if let Some(claim) = active.get(job_id) {
                    claim.cancel.store(true, Ordering::Relaxed);
                    info!("Cancellation signalled for running job {}", job_id);
                    return self
                        .store
                        .get_job(job_id)?
                        .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()));
                }
                // Reached a terminal state on its own in the meantime.
                let current = self
                    .store
                    .get_job(job_id)?
                    .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
                Err(SchedulerError::InvalidState {
                    job_id: current.id,
                    current_state: current.state.state_type().to_string(),
                    operation: "cancel".to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Start the scheduler (recovers orphans, spawns the dispatch loop).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        info!("Starting job scheduler");

        // Jobs left in a processing state by a previous process have no live
        // worker; resume or retire them before dispatching new work.
        self.recover_orphaned_jobs().await;

        self.spawn_dispatch_loop();

        info!("Job scheduler started ({} workers)", self.settings.workers);
    }

    /// Stop the scheduler gracefully.
    ///
    /// Running jobs are not cancelled: they keep their processing state and
    /// are recovered as orphans on the next start.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Scheduler not running");
            return;
        }

        info!("Stopping job scheduler");

        // Signal shutdown to the dispatch loop
        let _ = self.shutdown_tx.send(());

        // Give in-flight store writes a moment to land
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Job scheduler stopped");
    }

    /// Get current scheduler status.
    pub async fn status(&self) -> SchedulerStatus {
        let active_jobs = self.active_jobs.read().await.len();

        let queued_count = self
            .store
            .list_jobs(&JobFilter::new().with_state("queued"))
            .map(|jobs| jobs.len())
            .unwrap_or(0);

        let processing_count = self
            .store
            .processing_jobs()
            .map(|jobs| jobs.len())
            .unwrap_or(0);

        SchedulerStatus {
            running: self.running.load(Ordering::Relaxed),
            workers: self.settings.workers,
            active_jobs,
            queued_count,
            processing_count,
        }
    }

    /// Resume or retire jobs that were processing when the process died.
    async fn recover_orphaned_jobs(&self) {
        let jobs = match self.store.processing_jobs() {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to list processing jobs for recovery: {}", e);
                return;
            }
        };

        let mut recovered = 0;
        for job in jobs {
            // A live claim means a worker from this process still owns it.
            if self.active_jobs.read().await.contains_key(&job.id) {
                continue;
            }

            let attempts = self
                .store
                .attempts_for_video(&job.video_id)
                .unwrap_or(job.attempt);
            let exhausted = attempts >= self.settings.max_attempts;

            let failed = JobState::Failed {
                error: "worker lost before completion".to_string(),
                class: FailureClass::Internal,
                retryable: !exhausted,
                attempt: job.attempt,
                failed_at: Utc::now(),
            };
            if let Err(e) = self
                .store
                .transition_job(&job.id, job.state.state_type(), failed)
            {
                warn!("Failed to close orphaned job {}: {}", job.id, e);
                continue;
            }

            if exhausted {
                warn!(
                    "Orphaned job {} retired, attempts exhausted ({}/{})",
                    job.id, attempts, self.settings.max_attempts
                );
                self.settle_video_status(&job.video_id);
            } else {
                match self.store.create_job(&job.video_id) {
                    Ok(new_job) => {
                        info!(
                            "Orphaned job {} requeued as {} (attempt {})",
                            job.id, new_job.id, new_job.attempt
                        );
                        recovered += 1;
                    }
                    Err(e) => {
                        warn!("Failed to requeue orphaned job {}: {}", job.id, e);
                        self.settle_video_status(&job.video_id);
                    }
                }
            }
        }

        if recovered > 0 {
            info!("Recovered {} orphaned jobs", recovered);
        }
    }

    /// Spawn the dispatch loop task.
    fn spawn_dispatch_loop(&self) {
        let running = Arc::clone(&self.running);
        let store = Arc::clone(&self.store);
        let runner = Arc::clone(&self.runner);
        let workers = Arc::clone(&self.workers);
        let active_jobs = Arc::clone(&self.active_jobs);
        let poll_interval = Duration::from_secs(self.settings.poll_interval_secs.max(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Dispatch loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Dispatch loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::dispatch_one(
                            &store,
                            &runner,
                            &workers,
                            &active_jobs,
                        ).await {
                            warn!("Dispatch error: {}", e);
                        }
                    }
                }
            }
            info!("Dispatch loop stopped");
        });
    }

    /// Dispatch the oldest queued job to a worker, if one is free.
    async fn dispatch_one(
        store: &Arc<dyn MediaStore>,
        runner: &Arc<JobRunner>,
        workers: &Arc<Semaphore>,
        active_jobs: &Arc<RwLock<HashMap<String, ActiveJob>>>,
    ) -> Result<(), SchedulerError> {
        // Reserve a worker before touching the queue so a job is never
        // pulled without a worker to run it.
        let permit = match Arc::clone(workers).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return Ok(()),
        };

        let Some(job) = store.next_queued_job()? else {
            return Ok(());
        };

        // The queued row outlives the dispatch briefly; skip until the
        // worker's claim lands rather than double-dispatching.
        {
            let active = active_jobs.read().await;
            if active.contains_key(&job.id) {
                return Ok(());
            }
        }

        debug!("Dispatching job {} for video {}", job.id, job.video_id);

        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut active = active_jobs.write().await;
            active.insert(
                job.id.clone(),
                ActiveJob {
                    job_id: job.id.clone(),
                    video_id: job.video_id.clone(),
                    attempt: job.attempt,
                    started_at: Utc::now(),
                    cancel: Arc::clone(&cancel),
                },
            );
        }

        let store = Arc::clone(store);
        let runner = Arc::clone(runner);
        let active_jobs = Arc::clone(active_jobs);
        let job_id = job.id.clone();

        tokio::spawn(async move {
            let started = std::time::Instant::now();
            if let Err(e) = runner.run(&job_id, cancel).await {
                error!("Job {} aborted without a terminal state: {}", job_id, e);
            }

            Self::account_finished_job(&store, &job_id, started.elapsed());

            active_jobs.write().await.remove(&job_id);
            drop(permit);
        });

        Ok(())
    }

    /// Record metrics for a job's terminal state.
    fn account_finished_job(
        store: &Arc<dyn MediaStore>,
        job_id: &str,
        elapsed: Duration,
    ) {
        let Ok(Some(job)) = store.get_job(job_id) else {
            return;
        };
        match &job.state {
            JobState::Completed { .. } => {
                metrics::JOB_COMPLETIONS.inc();
                metrics::JOB_DURATION
                    .with_label_values(&["completed"])
                    .observe(elapsed.as_secs_f64());
            }
            JobState::Failed { class, .. } => {
                metrics::JOB_FAILURES
                    .with_label_values(&[&class.to_string()])
                    .inc();
                metrics::JOB_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed.as_secs_f64());
            }
            // Lost the claim to another worker; nothing to account.
            _ => {}
        }
    }

    /// Settle a video's status after its last job was retired without a
    /// worker involved: ready if any variant exists, failed otherwise.
    fn settle_video_status(&self, video_id: &str) {
        let has_variants = self
            .store
            .variants_for_video(video_id)
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        let status = if has_variants {
            VideoStatus::Ready
        } else {
            VideoStatus::Failed
        };
        if let Err(e) = self.store.update_video_status(video_id, status) {
            warn!("Failed to settle status for video {}: {}", video_id, e);
        }
    }
}
