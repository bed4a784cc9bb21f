//! Job progress accounting.
//!
//! Overall progress is a weighted sum over the pipeline stages:
//! probe 5%, transcode 60%, package 30%, thumbnail 5%. Within a stage the
//! reported fraction interpolates linearly between the stage's base and its
//! weight, so progress never moves backwards as stages advance.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::store::MediaStore;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probe,
    Transcode,
    Package,
    Thumbnail,
}

impl Stage {
    /// Share of overall progress this stage contributes.
    pub fn weight(&self) -> u8 {
        match self {
            Stage::Probe => 5,
            Stage::Transcode => 60,
            Stage::Package => 30,
            Stage::Thumbnail => 5,
        }
    }

    /// Overall percent at which this stage begins.
    pub fn base_percent(&self) -> u8 {
        match self {
            Stage::Probe => 0,
            Stage::Transcode => 5,
            Stage::Package => 65,
            Stage::Thumbnail => 95,
        }
    }
}

/// Maps a position within a stage to overall percent.
pub fn overall_percent(stage: Stage, fraction: f64) -> u8 {
    let fraction = fraction.clamp(0.0, 1.0);
    let percent = stage.base_percent() as f64 + fraction * stage.weight() as f64;
    (percent.floor() as u8).min(100)
}

/// Persists a job's progress, throttling advisory mid-stage updates.
///
/// Writes are best-effort: a failed update is logged and dropped, because
/// progress is advisory and must never fail the job producing it. The store
/// clamps values so late writers cannot move progress backwards.
pub struct ProgressTracker {
    store: Arc<dyn MediaStore>,
    job_id: String,
    last_written: AtomicU8,
    last_write_at: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn MediaStore>, job_id: impl Into<String>) -> Self {
        Self::with_interval(store, job_id, Duration::from_secs(1))
    }

    pub fn with_interval(
        store: Arc<dyn MediaStore>,
        job_id: impl Into<String>,
        min_interval: Duration,
    ) -> Self {
        Self {
            store,
            job_id: job_id.into(),
            last_written: AtomicU8::new(0),
            last_write_at: Mutex::new(None),
            min_interval,
        }
    }

    /// Records mid-stage progress, rate-limited to one write per interval.
    pub fn record(&self, stage: Stage, fraction: f64) {
        let percent = overall_percent(stage, fraction);
        if percent <= self.last_written.load(Ordering::Relaxed) {
            return;
        }

        {
            let mut last = match self.last_write_at.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(written_at) = *last {
                if written_at.elapsed() < self.min_interval {
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        self.write(percent);
    }

    /// Records that a stage finished. Never throttled; stage boundaries are
    /// the progress values describing where a restart would resume.
    pub fn complete_stage(&self, stage: Stage) {
        self.write(overall_percent(stage, 1.0));
    }

    /// Forces progress to 100.
    pub fn complete(&self) {
        self.write(100);
    }

    fn write(&self, percent: u8) {
        self.last_written.fetch_max(percent, Ordering::Relaxed);
        if let Err(e) = self.store.update_job_progress(&self.job_id, percent) {
            warn!(
                "Failed to update progress for job {}: {}",
                self.job_id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteMediaStore;
    use crate::store::{CreateVideoRequest, Visibility};

    fn store_with_job() -> (Arc<dyn MediaStore>, String) {
        let store = SqliteMediaStore::in_memory().unwrap();
        let video = store
            .create_video(CreateVideoRequest {
                title: "t".to_string(),
                original_filename: "t.mp4".to_string(),
                uploaded_by: "tester".to_string(),
                visibility: Visibility::Public,
                page_id: None,
            })
            .unwrap();
        let job = store.create_job(&video.id).unwrap();
        (Arc::new(store), job.id)
    }

    #[test]
    fn test_stage_weights_sum_to_100() {
        let total: u32 = [Stage::Probe, Stage::Transcode, Stage::Package, Stage::Thumbnail]
            .iter()
            .map(|s| s.weight() as u32)
            .sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_stage_bases_follow_weights() {
        assert_eq!(Stage::Transcode.base_percent(), Stage::Probe.weight());
        assert_eq!(
            Stage::Package.base_percent(),
            Stage::Probe.weight() + Stage::Transcode.weight()
        );
        assert_eq!(Stage::Thumbnail.base_percent(), 95);
    }

    #[test]
    fn test_overall_percent_interpolates() {
        assert_eq!(overall_percent(Stage::Probe, 0.0), 0);
        assert_eq!(overall_percent(Stage::Probe, 1.0), 5);
        assert_eq!(overall_percent(Stage::Transcode, 0.5), 35);
        assert_eq!(overall_percent(Stage::Transcode, 1.0), 65);
        assert_eq!(overall_percent(Stage::Package, 1.0), 95);
        assert_eq!(overall_percent(Stage::Thumbnail, 1.0), 100);
    }

    #[test]
    fn test_overall_percent_clamps_fraction() {
        assert_eq!(overall_percent(Stage::Transcode, -2.0), 5);
        assert_eq!(overall_percent(Stage::Transcode, 7.5), 65);
    }

    #[test]
    fn test_tracker_writes_stage_completion() {
        let (store, job_id) = store_with_job();
        let tracker = ProgressTracker::new(Arc::clone(&store), &job_id);

        tracker.complete_stage(Stage::Probe);
        assert_eq!(store.get_job(&job_id).unwrap().unwrap().progress, 5);

        tracker.complete_stage(Stage::Transcode);
        assert_eq!(store.get_job(&job_id).unwrap().unwrap().progress, 65);

        tracker.complete();
        assert_eq!(store.get_job(&job_id).unwrap().unwrap().progress, 100);
    }

    #[test]
    fn test_tracker_throttles_advisory_updates() {
        let (store, job_id) = store_with_job();
        let tracker = ProgressTracker::with_interval(
            Arc::clone(&store),
            &job_id,
            Duration::from_secs(3600),
        );

        // First advisory write goes through, the second is rate-limited
        tracker.record(Stage::Transcode, 0.1);
        tracker.record(Stage::Transcode, 0.9);
        assert_eq!(store.get_job(&job_id).unwrap().unwrap().progress, 11);

        // Stage completion is never throttled
        tracker.complete_stage(Stage::Transcode);
        assert_eq!(store.get_job(&job_id).unwrap().unwrap().progress, 65);
    }

    #[test]
    fn test_tracker_skips_non_increasing_values() {
        let (store, job_id) = store_with_job();
        let tracker = ProgressTracker::with_interval(
            Arc::clone(&store),
            &job_id,
            Duration::from_millis(0),
        );

        tracker.record(Stage::Transcode, 0.5);
        tracker.record(Stage::Transcode, 0.2);
        assert_eq!(store.get_job(&job_id).unwrap().unwrap().progress, 35);
    }
}
