//! Pipeline execution for a single job.
//!
//! A runner drives one job through probe, transcode, package, and
//! thumbnail, persisting state transitions and progress as it goes. Stage
//! order is strict, but each stage skips work whose artifacts a previous
//! attempt already produced, so a retried job resumes rather than starting
//! over.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{EncoderSettings, PipelineSettings};
use crate::encoder::{
    ladder_from_names, applicable_targets, EncodeOutput, EncodeProgress, EncodeRequest,
    EncodeTarget, Encoder, EncoderError, FrameRequest, MediaInfo, SegmentRequest,
};
use crate::metrics;
use crate::storage::{paths, BlobStore, StorageError};
use crate::store::{
    CreateVariantRequest, FailureClass, Job, JobState, MediaStore, StoreError, VideoStatus,
};

use super::artifacts::ArtifactSurvey;
use super::manifest;
use super::progress::{ProgressTracker, Stage};

/// Thumbnail extraction points as percent of media duration.
const THUMBNAIL_OFFSETS: [u32; 4] = [0, 25, 50, 75];

/// Storage operations are attempted this many times with doubling backoff.
const STORAGE_ATTEMPTS: u32 = 3;
const STORAGE_BACKOFF: Duration = Duration::from_millis(100);

/// Errors the runner cannot fold into a failed job record.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A stage-level failure, tagged with the state the job was in when it
/// happened so the terminal transition can compare-and-set from it.
enum StageFailure {
    Cancelled {
        stage: &'static str,
    },
    Failed {
        stage: &'static str,
        error: String,
        class: FailureClass,
        retryable: bool,
    },
}

impl StageFailure {
    fn failed(
        stage: &'static str,
        error: impl Into<String>,
        class: FailureClass,
        retryable: bool,
    ) -> Self {
        Self::Failed {
            stage,
            error: error.into(),
            class,
            retryable,
        }
    }

    fn internal(stage: &'static str, error: impl Into<String>) -> Self {
        Self::failed(stage, error, FailureClass::Internal, true)
    }

    fn storage(stage: &'static str, error: StorageError) -> Self {
        match &error {
            // A missing blob will still be missing on retry
            StorageError::NotFound { .. } => {
                Self::failed(stage, error.to_string(), FailureClass::Input, false)
            }
            _ => Self::failed(stage, error.to_string(), FailureClass::Storage, true),
        }
    }

    fn store(stage: &'static str, error: StoreError) -> Self {
        Self::internal(stage, format!("State update failed: {}", error))
    }

    fn from_encoder(stage: &'static str, error: EncoderError) -> Self {
        if matches!(error, EncoderError::Cancelled) {
            return Self::Cancelled { stage };
        }
        let (class, retryable) = classify_encoder_error(&error);
        Self::failed(stage, error.to_string(), class, retryable)
    }
}

/// Maps an encoder error to a failure class and whether a fresh job attempt
/// could succeed.
fn classify_encoder_error(error: &EncoderError) -> (FailureClass, bool) {
    match error {
        EncoderError::FfmpegNotFound { .. } | EncoderError::FfprobeNotFound { .. } => {
            (FailureClass::Internal, false)
        }
        EncoderError::InputNotFound { .. }
        | EncoderError::UnusableInput { .. }
        | EncoderError::ProbeFailed { .. }
        | EncoderError::ParseError { .. } => (FailureClass::Input, false),
        EncoderError::OutputDirectoryFailed { .. } => (FailureClass::Internal, true),
        EncoderError::EncodeFailed { .. } | EncoderError::Timeout { .. } | EncoderError::Io(_) => {
            (FailureClass::Encoder, true)
        }
        EncoderError::Cancelled => (FailureClass::Cancelled, false),
    }
}

/// Per-job context threaded through the stages.
struct StageContext<'a> {
    job: &'a Job,
    video_id: &'a str,
    workdir: &'a Path,
    cancel: &'a Arc<AtomicBool>,
    tracker: &'a Arc<ProgressTracker>,
}

impl StageContext<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Executes jobs against the store, blob storage, and encoder.
pub struct JobRunner {
    store: Arc<dyn MediaStore>,
    blobs: Arc<dyn BlobStore>,
    encoder: Arc<dyn Encoder>,
    encoder_settings: EncoderSettings,
    pipeline_settings: PipelineSettings,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn MediaStore>,
        blobs: Arc<dyn BlobStore>,
        encoder: Arc<dyn Encoder>,
        encoder_settings: EncoderSettings,
        pipeline_settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            blobs,
            encoder,
            encoder_settings,
            pipeline_settings,
        }
    }

    /// Runs a queued job to a terminal state.
    ///
    /// Stage failures are folded into a `failed` transition; `Err` is
    /// returned only when even that could not be persisted. The cancel flag
    /// is checked between artifact-producing steps.
    pub async fn run(&self, job_id: &str, cancel: Arc<AtomicBool>) -> Result<(), PipelineError> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;
        let video = self
            .store
            .get_video(&job.video_id)?
            .ok_or_else(|| PipelineError::VideoNotFound(job.video_id.clone()))?;

        // Claim the job. Losing this compare-and-set means it was cancelled
        // or picked up elsewhere; either way it is not ours.
        let probing = JobState::Probing {
            started_at: Utc::now(),
        };
        match self.store.transition_job(&job.id, "queued", probing) {
            Ok(_) => {}
            Err(StoreError::InvalidState { current_state, .. }) => {
                info!(
                    "Job {} is {} rather than queued, skipping dispatch",
                    job.id, current_state
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        self.store
            .update_video_status(&video.id, VideoStatus::Processing)?;
        info!(
            "Job {} started for video {} (attempt {})",
            job.id, video.id, job.attempt
        );

        let tracker = Arc::new(ProgressTracker::new(Arc::clone(&self.store), &job.id));
        let workdir = self.pipeline_settings.work_dir.join(&job.id);
        let ctx = StageContext {
            job: &job,
            video_id: &video.id,
            workdir: &workdir,
            cancel: &cancel,
            tracker: &tracker,
        };

        let outcome = self.execute(&ctx).await;

        // Scratch space is per-job and never survives the run
        let _ = tokio::fs::remove_dir_all(&workdir).await;

        match outcome {
            Ok(variants_created) => {
                self.store.transition_job(
                    &job.id,
                    "thumbnailing",
                    JobState::Completed {
                        completed_at: Utc::now(),
                        variants_created,
                    },
                )?;
                tracker.complete();
                self.store
                    .update_video_status(&video.id, VideoStatus::Ready)?;
                info!(
                    "Job {} completed for video {} ({} variants created)",
                    job.id, video.id, variants_created
                );
                Ok(())
            }
            Err(StageFailure::Cancelled { stage }) => {
                info!("Job {} cancelled during {}", job.id, stage);
                self.finish_failed(&job, stage, JobState::cancelled(job.attempt, Utc::now()))
            }
            Err(StageFailure::Failed {
                stage,
                error,
                class,
                retryable,
            }) => {
                warn!(
                    "Job {} failed during {} (class={}, retryable={}): {}",
                    job.id, stage, class, retryable, error
                );
                let state = JobState::Failed {
                    error,
                    class,
                    retryable,
                    attempt: job.attempt,
                    failed_at: Utc::now(),
                };
                self.finish_failed(&job, stage, state)
            }
        }
    }

    /// Records a terminal failure and settles the video's status.
    fn finish_failed(
        &self,
        job: &Job,
        stage: &'static str,
        state: JobState,
    ) -> Result<(), PipelineError> {
        match self.store.transition_job(&job.id, stage, state) {
            Ok(_) => {}
            Err(StoreError::InvalidState { current_state, .. }) => {
                warn!(
                    "Job {} was already {} while recording failure",
                    job.id, current_state
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        // Variants from earlier attempts stay servable; only a video with
        // nothing to play is marked failed
        let has_variants = !self.store.variants_for_video(&job.video_id)?.is_empty();
        let status = if has_variants {
            VideoStatus::Ready
        } else {
            VideoStatus::Failed
        };
        self.store.update_video_status(&job.video_id, status)?;
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<u32, StageFailure> {
        tokio::fs::create_dir_all(ctx.workdir).await.map_err(|e| {
            StageFailure::internal("probing", format!("Failed to create workspace: {}", e))
        })?;

        let survey = ArtifactSurvey::load(self.blobs.as_ref(), ctx.video_id)
            .await
            .map_err(|e| StageFailure::storage("probing", e))?;

        let stage_timer = std::time::Instant::now();
        let info = self.probe_stage(ctx, &survey).await?;

        let presets = ladder_from_names(&self.pipeline_settings.presets).map_err(|name| {
            StageFailure::failed(
                "probing",
                format!("Unknown preset in configuration: {}", name),
                FailureClass::Internal,
                false,
            )
        })?;
        let source_height = info.height.ok_or_else(|| {
            StageFailure::failed(
                "probing",
                "source has no video dimensions",
                FailureClass::Input,
                false,
            )
        })?;
        let targets = applicable_targets(source_height, &presets);
        if targets.is_empty() {
            return Err(StageFailure::failed(
                "probing",
                "no quality presets configured",
                FailureClass::Internal,
                false,
            ));
        }
        ctx.tracker.complete_stage(Stage::Probe);
        metrics::STAGE_DURATION
            .with_label_values(&["probe"])
            .observe(stage_timer.elapsed().as_secs_f64());

        let stage_timer = std::time::Instant::now();
        let (encoded, failures) = self.transcode_stage(ctx, &info, &targets, &survey).await?;
        if encoded.is_empty() {
            let retryable = failures.iter().any(|(_, retryable)| *retryable);
            return Err(StageFailure::failed(
                "transcoding",
                "no renditions were produced",
                FailureClass::Encoder,
                retryable,
            ));
        }
        ctx.tracker.complete_stage(Stage::Transcode);
        metrics::STAGE_DURATION
            .with_label_values(&["transcode"])
            .observe(stage_timer.elapsed().as_secs_f64());

        let stage_timer = std::time::Instant::now();
        let variants_created = self.package_stage(ctx, &info, &encoded, &survey).await?;
        ctx.tracker.complete_stage(Stage::Package);
        metrics::STAGE_DURATION
            .with_label_values(&["package"])
            .observe(stage_timer.elapsed().as_secs_f64());

        let stage_timer = std::time::Instant::now();
        self.thumbnail_stage(ctx, &info, &survey).await?;
        ctx.tracker.complete_stage(Stage::Thumbnail);
        metrics::STAGE_DURATION
            .with_label_values(&["thumbnail"])
            .observe(stage_timer.elapsed().as_secs_f64());

        Ok(variants_created)
    }

    /// Stages the original locally and extracts its media properties.
    async fn probe_stage(
        &self,
        ctx: &StageContext<'_>,
        survey: &ArtifactSurvey,
    ) -> Result<MediaInfo, StageFailure> {
        const STAGE: &str = "probing";
        if ctx.cancelled() {
            return Err(StageFailure::Cancelled { stage: STAGE });
        }

        let original = survey.original.as_deref().ok_or_else(|| {
            StageFailure::failed(
                STAGE,
                "original upload is missing from storage",
                FailureClass::Input,
                false,
            )
        })?;

        let filename = original.rsplit('/').next().unwrap_or("input");
        let input_path = ctx.workdir.join(filename);
        let bytes = self
            .get_with_retry(original)
            .await
            .map_err(|e| StageFailure::storage(STAGE, e))?;
        tokio::fs::write(&input_path, &bytes).await.map_err(|e| {
            StageFailure::internal(STAGE, format!("Failed to stage input locally: {}", e))
        })?;

        let info = self
            .encoder
            .probe(&input_path)
            .await
            .map_err(|e| StageFailure::from_encoder(STAGE, e))?;
        debug!(
            "Probed video {}: {:.1}s {}x{} ({})",
            ctx.video_id,
            info.duration_secs,
            info.width.unwrap_or(0),
            info.height.unwrap_or(0),
            info.format
        );

        self.store
            .set_video_duration(ctx.video_id, info.duration_secs)
            .map_err(|e| StageFailure::store(STAGE, e))?;

        Ok(info)
    }

    /// Encodes every applicable preset, up to `job_concurrency` at a time.
    ///
    /// Preset failures are independent: each is retried, then abandoned
    /// without touching the others. Returns the targets that have a
    /// rendition (freshly encoded or recovered from a previous attempt) and
    /// the abandoned qualities with their retryability.
    async fn transcode_stage(
        &self,
        ctx: &StageContext<'_>,
        info: &MediaInfo,
        targets: &[EncodeTarget],
        survey: &ArtifactSurvey,
    ) -> Result<(Vec<EncodeTarget>, Vec<(String, bool)>), StageFailure> {
        const STAGE: &str = "transcoding";
        let started_at = Utc::now();

        let mut ready: Vec<EncodeTarget> = Vec::new();
        let mut to_encode: Vec<EncodeTarget> = Vec::new();
        for target in targets {
            if survey.needs_encode(&target.quality) {
                to_encode.push(target.clone());
            } else {
                debug!(
                    "Skipping encode of {} for video {}: rendition already stored",
                    target.quality, ctx.video_id
                );
                metrics::PRESETS_ENCODED
                    .with_label_values(&[&target.quality, "skipped"])
                    .inc();
                ready.push(target.clone());
            }
        }

        let presets_total = targets.len() as u32;
        let done_counter = Arc::new(AtomicU32::new(ready.len() as u32));
        let mut pending: Vec<String> = to_encode.iter().map(|t| t.quality.clone()).collect();

        self.store
            .transition_job(
                &ctx.job.id,
                "probing",
                JobState::Transcoding {
                    presets_total,
                    presets_done: done_counter.load(Ordering::Relaxed),
                    current_preset: pending.first().cloned().unwrap_or_default(),
                    started_at,
                },
            )
            .map_err(|e| StageFailure::store(STAGE, e))?;

        if to_encode.is_empty() {
            return Ok((ready, Vec::new()));
        }

        // Progress events from concurrent encodes are folded into one
        // job-level fraction: finished presets count whole, active ones by
        // their reported percent
        let (progress_tx, mut progress_rx) = mpsc::channel::<EncodeProgress>(64);
        {
            let percents: Arc<Mutex<HashMap<String, f32>>> = Arc::new(Mutex::new(HashMap::new()));
            let done = Arc::clone(&done_counter);
            let tracker = Arc::clone(ctx.tracker);
            let total = presets_total.max(1);
            tokio::spawn(async move {
                while let Some(update) = progress_rx.recv().await {
                    let active: f32 = {
                        let mut map = match percents.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        map.insert(update.quality.clone(), update.percent.clamp(0.0, 100.0));
                        map.values().sum()
                    };
                    let fraction = (done.load(Ordering::Relaxed) as f64
                        + (active / 100.0) as f64)
                        / total as f64;
                    tracker.record(Stage::Transcode, fraction);
                }
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.encoder_settings.job_concurrency.max(1)));
        let mut encodes: JoinSet<(EncodeTarget, Result<EncodeOutput, EncoderError>)> =
            JoinSet::new();

        for target in to_encode {
            let encoder = Arc::clone(&self.encoder);
            let semaphore = Arc::clone(&semaphore);
            let cancel = Arc::clone(ctx.cancel);
            let tx = progress_tx.clone();
            let job_id = ctx.job.id.clone();
            let input_path = info.path.clone();
            let output_path = ctx.workdir.join(&target.quality).join("rendition.mp4");
            let retries = self.pipeline_settings.preset_retries;

            encodes.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (target, Err(EncoderError::Cancelled)),
                };
                let result = encode_with_retries(
                    encoder, job_id, input_path, output_path, &target, retries, &cancel, tx,
                )
                .await;
                (target, result)
            });
        }
        drop(progress_tx);

        let mut failures: Vec<(String, bool)> = Vec::new();

        while let Some(joined) = encodes.join_next().await {
            let (target, result) = joined.map_err(|e| {
                StageFailure::internal(STAGE, format!("Encode task failed: {}", e))
            })?;
            let quality = target.quality.clone();
            pending.retain(|q| q != &quality);

            match result {
                Ok(output) => {
                    let bytes = tokio::fs::read(&output.output_path).await.map_err(|e| {
                        StageFailure::internal(
                            STAGE,
                            format!("Failed to read rendition {}: {}", quality, e),
                        )
                    })?;
                    self.put_with_retry(&paths::rendition(ctx.video_id, &quality), &bytes)
                        .await
                        .map_err(|e| StageFailure::storage(STAGE, e))?;
                    info!(
                        "Encoded {} for video {} in {}ms ({} bytes)",
                        quality, ctx.video_id, output.duration_ms, output.size_bytes
                    );
                    metrics::PRESETS_ENCODED
                        .with_label_values(&[&quality, "success"])
                        .inc();
                    ready.push(target);
                }
                Err(EncoderError::Cancelled) => {
                    // The flag is checked once the set is drained
                }
                Err(e) => {
                    let (_, retryable) = classify_encoder_error(&e);
                    warn!(
                        "Abandoning preset {} for video {}: {}",
                        quality, ctx.video_id, e
                    );
                    metrics::PRESETS_ENCODED
                        .with_label_values(&[&quality, "failed"])
                        .inc();
                    failures.push((quality.clone(), retryable));
                }
            }

            let done = done_counter.fetch_add(1, Ordering::Relaxed) + 1;
            let refreshed = JobState::Transcoding {
                presets_total,
                presets_done: done,
                current_preset: pending.first().cloned().unwrap_or_else(|| quality.clone()),
                started_at,
            };
            if let Err(e) = self.store.transition_job(&ctx.job.id, STAGE, refreshed) {
                warn!(
                    "Failed to refresh transcode state for job {}: {}",
                    ctx.job.id, e
                );
            }
        }

        if ctx.cancelled() {
            return Err(StageFailure::Cancelled { stage: STAGE });
        }

        Ok((ready, failures))
    }

    /// Segments every rendition, uploads the chunks and playlists, records
    /// variants, and writes the master playlist.
    async fn package_stage(
        &self,
        ctx: &StageContext<'_>,
        info: &MediaInfo,
        encoded: &[EncodeTarget],
        survey: &ArtifactSurvey,
    ) -> Result<u32, StageFailure> {
        const STAGE: &str = "packaging";
        let started_at = Utc::now();
        let renditions_total = encoded.len() as u32;

        self.store
            .transition_job(
                &ctx.job.id,
                "transcoding",
                JobState::Packaging {
                    renditions_total,
                    renditions_packaged: 0,
                    started_at,
                },
            )
            .map_err(|e| StageFailure::store(STAGE, e))?;

        let existing = self
            .store
            .variants_for_video(ctx.video_id)
            .map_err(|e| StageFailure::store(STAGE, e))?;
        let mut created = 0u32;
        let mut packaged = 0u32;

        for target in encoded {
            if ctx.cancelled() {
                return Err(StageFailure::Cancelled { stage: STAGE });
            }

            let quality_dir = ctx.workdir.join(&target.quality);
            let local_rendition = quality_dir.join("rendition.mp4");

            if survey.needs_packaging(&target.quality) {
                if !local_rendition.exists() {
                    // The rendition was produced by a previous attempt
                    let bytes = self
                        .get_with_retry(&paths::rendition(ctx.video_id, &target.quality))
                        .await
                        .map_err(|e| StageFailure::storage(STAGE, e))?;
                    tokio::fs::create_dir_all(&quality_dir).await.map_err(|e| {
                        StageFailure::internal(STAGE, format!("Failed to create workspace: {}", e))
                    })?;
                    tokio::fs::write(&local_rendition, &bytes).await.map_err(|e| {
                        StageFailure::internal(
                            STAGE,
                            format!("Failed to stage rendition locally: {}", e),
                        )
                    })?;
                }

                let segmented = self
                    .encoder
                    .segment(SegmentRequest {
                        job_id: ctx.job.id.clone(),
                        input_path: local_rendition.clone(),
                        output_dir: quality_dir.clone(),
                        segment_secs: self.encoder_settings.segment_secs,
                    })
                    .await
                    .map_err(|e| {
                        let (class, retryable) = classify_encoder_error(&e);
                        StageFailure::failed(
                            STAGE,
                            format!("Segmenting {} failed: {}", target.quality, e),
                            class,
                            retryable,
                        )
                    })?;

                let prefix = paths::quality_prefix(ctx.video_id, &target.quality);
                for segment_path in &segmented.segment_paths {
                    if ctx.cancelled() {
                        return Err(StageFailure::Cancelled { stage: STAGE });
                    }
                    let name = segment_path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .ok_or_else(|| {
                            StageFailure::internal(STAGE, "segment file has an unreadable name")
                        })?;
                    let bytes = tokio::fs::read(segment_path).await.map_err(|e| {
                        StageFailure::internal(
                            STAGE,
                            format!("Failed to read segment {}: {}", name, e),
                        )
                    })?;
                    self.put_with_retry(&format!("{}{}", prefix, name), &bytes)
                        .await
                        .map_err(|e| StageFailure::storage(STAGE, e))?;
                }

                let playlist_bytes =
                    tokio::fs::read(&segmented.playlist_path).await.map_err(|e| {
                        StageFailure::internal(STAGE, format!("Failed to read playlist: {}", e))
                    })?;
                self.put_with_retry(
                    &paths::playlist(ctx.video_id, &target.quality),
                    &playlist_bytes,
                )
                .await
                .map_err(|e| StageFailure::storage(STAGE, e))?;

                info!(
                    "Packaged {} for video {} ({} segments)",
                    target.quality,
                    ctx.video_id,
                    segmented.segment_paths.len()
                );
            }

            if !existing.iter().any(|v| v.quality == target.quality) {
                let width = info
                    .scaled_width(target.height)
                    .unwrap_or_else(|| fallback_width(target.height));
                let size_bytes = tokio::fs::metadata(&local_rendition)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                self.store
                    .create_variant(CreateVariantRequest {
                        video_id: ctx.video_id.to_string(),
                        quality: target.quality.clone(),
                        width,
                        height: target.height,
                        bitrate_kbps: target.video_bitrate_kbps,
                        path: paths::playlist(ctx.video_id, &target.quality),
                        size_bytes,
                    })
                    .map_err(|e| StageFailure::store(STAGE, e))?;
                created += 1;
            }

            // The single-file rendition is redundant once segments are durable
            let _ = self
                .blobs
                .delete(&paths::rendition(ctx.video_id, &target.quality))
                .await;

            packaged += 1;
            let refreshed = JobState::Packaging {
                renditions_total,
                renditions_packaged: packaged,
                started_at,
            };
            if let Err(e) = self.store.transition_job(&ctx.job.id, STAGE, refreshed) {
                warn!(
                    "Failed to refresh packaging state for job {}: {}",
                    ctx.job.id, e
                );
            }
            ctx.tracker.record(
                Stage::Package,
                packaged as f64 / renditions_total.max(1) as f64,
            );
        }

        let variants = self
            .store
            .variants_for_video(ctx.video_id)
            .map_err(|e| StageFailure::store(STAGE, e))?;
        let master = manifest::master_playlist(&variants);
        self.put_with_retry(&paths::master_playlist(ctx.video_id), master.as_bytes())
            .await
            .map_err(|e| StageFailure::storage(STAGE, e))?;

        Ok(created)
    }

    /// Extracts still frames at fixed offsets. Failures degrade the player
    /// poster and nothing else, so they are logged and swallowed.
    async fn thumbnail_stage(
        &self,
        ctx: &StageContext<'_>,
        info: &MediaInfo,
        survey: &ArtifactSurvey,
    ) -> Result<(), StageFailure> {
        const STAGE: &str = "thumbnailing";
        let started_at = Utc::now();
        let frames_total = THUMBNAIL_OFFSETS.len() as u32;

        self.store
            .transition_job(
                &ctx.job.id,
                "packaging",
                JobState::Thumbnailing {
                    frames_total,
                    frames_done: 0,
                    started_at,
                },
            )
            .map_err(|e| StageFailure::store(STAGE, e))?;

        let thumbs_dir = ctx.workdir.join("thumbnails");
        if let Err(e) = tokio::fs::create_dir_all(&thumbs_dir).await {
            warn!("Failed to create thumbnail workspace: {}", e);
        }

        let mut done = 0u32;
        for percent in THUMBNAIL_OFFSETS {
            if ctx.cancelled() {
                return Err(StageFailure::Cancelled { stage: STAGE });
            }

            if survey.needs_thumbnail(percent) {
                let offset_secs = info.duration_secs * percent as f64 / 100.0;
                let output_path = thumbs_dir.join(format!("thumb_{}.jpg", percent));
                let request = FrameRequest {
                    job_id: ctx.job.id.clone(),
                    input_path: info.path.clone(),
                    output_path: output_path.clone(),
                    offset_secs,
                };

                match self.encoder.extract_frame(request).await {
                    Ok(()) => match tokio::fs::read(&output_path).await {
                        Ok(bytes) => {
                            if let Err(e) = self
                                .put_with_retry(&paths::thumbnail(ctx.video_id, percent), &bytes)
                                .await
                            {
                                warn!(
                                    "Failed to store thumbnail at {}% for video {}: {}",
                                    percent, ctx.video_id, e
                                );
                            }
                        }
                        Err(e) => {
                            warn!("Failed to read extracted thumbnail at {}%: {}", percent, e)
                        }
                    },
                    Err(e) => warn!(
                        "Thumbnail at {}% failed for video {}: {}",
                        percent, ctx.video_id, e
                    ),
                }
            }

            done += 1;
            let refreshed = JobState::Thumbnailing {
                frames_total,
                frames_done: done,
                started_at,
            };
            if let Err(e) = self.store.transition_job(&ctx.job.id, STAGE, refreshed) {
                warn!(
                    "Failed to refresh thumbnail state for job {}: {}",
                    ctx.job.id, e
                );
            }
            ctx.tracker
                .record(Stage::Thumbnail, done as f64 / frames_total as f64);
        }

        Ok(())
    }

    async fn put_with_retry(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut delay = STORAGE_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.blobs.put(path, bytes).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < STORAGE_ATTEMPTS => {
                    warn!(
                        "Storage write of {} failed (attempt {}), retrying: {}",
                        path, attempt, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_with_retry(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let mut delay = STORAGE_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.blobs.get(path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && attempt < STORAGE_ATTEMPTS => {
                    warn!(
                        "Storage read of {} failed (attempt {}), retrying: {}",
                        path, attempt, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Drives one preset encode, retrying transient failures.
#[allow(clippy::too_many_arguments)]
async fn encode_with_retries(
    encoder: Arc<dyn Encoder>,
    job_id: String,
    input_path: PathBuf,
    output_path: PathBuf,
    target: &EncodeTarget,
    retries: u32,
    cancel: &AtomicBool,
    progress_tx: mpsc::Sender<EncodeProgress>,
) -> Result<EncodeOutput, EncoderError> {
    let mut attempt = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(EncoderError::Cancelled);
        }
        let request = EncodeRequest {
            job_id: job_id.clone(),
            input_path: input_path.clone(),
            output_path: output_path.clone(),
            target: target.clone(),
        };
        match encoder.encode_with_progress(request, progress_tx.clone()).await {
            Ok(output) => return Ok(output),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!(
                    "Encode attempt {} of {} failed for {}, retrying: {}",
                    attempt, job_id, target.quality, e
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// 16:9 width for sources whose probe carried no dimensions, rounded even.
fn fallback_width(height: u32) -> u32 {
    (height * 16 / 9 + 1) & !1
}
