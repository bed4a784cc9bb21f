//! SQLite-backed media store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CreateVariantRequest, CreateVideoRequest, Job, JobFilter, JobState, MediaStore, StoreError,
    Variant, Video, VideoFilter, VideoStatus, Visibility,
};

const VIDEO_COLUMNS: &str = "id, title, original_filename, duration_secs, status, page_id, uploaded_by, visibility, created_at, updated_at";
const JOB_COLUMNS: &str = "id, video_id, attempt, progress, state, created_at, updated_at";
const VARIANT_COLUMNS: &str =
    "id, video_id, quality, width, height, bitrate_kbps, path, size_bytes, created_at";

/// SQLite-backed media store.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
}

impl SqliteMediaStore {
    /// Create a new SQLite media store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite media store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                duration_secs REAL,
                status TEXT NOT NULL,
                page_id INTEGER,
                uploaded_by TEXT NOT NULL,
                visibility TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL,
                attempt INTEGER NOT NULL DEFAULT 1,
                progress INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS variants (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL,
                quality TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                bitrate_kbps INTEGER NOT NULL,
                path TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_videos_status ON videos(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_video_id ON jobs(video_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_state_type ON jobs(json_extract(state, '$.type'));
            CREATE INDEX IF NOT EXISTS idx_variants_video_id ON variants(video_id);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_video(row: &rusqlite::Row) -> rusqlite::Result<Video> {
        let id: String = row.get(0)?;
        let title: String = row.get(1)?;
        let original_filename: String = row.get(2)?;
        let duration_secs: Option<f64> = row.get(3)?;
        let status_str: String = row.get(4)?;
        let page_id: Option<i64> = row.get(5)?;
        let uploaded_by: String = row.get(6)?;
        let visibility_str: String = row.get(7)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        // Parse timestamps - use default if parsing fails (shouldn't happen with valid data)
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let status = VideoStatus::parse(&status_str).unwrap_or(VideoStatus::Pending);
        // Unknown visibility falls back to the most restrictive policy
        let visibility = Visibility::parse(&visibility_str).unwrap_or(Visibility::Private);

        Ok(Video {
            id,
            title,
            original_filename,
            duration_secs,
            status,
            page_id,
            uploaded_by,
            visibility,
            created_at,
            updated_at,
        })
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let id: String = row.get(0)?;
        let video_id: String = row.get(1)?;
        let attempt: u32 = row.get(2)?;
        let progress: u8 = row.get(3)?;
        let state_json: String = row.get(4)?;
        let created_at_str: String = row.get(5)?;
        let updated_at_str: String = row.get(6)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        let state: JobState = serde_json::from_str(&state_json).unwrap_or(JobState::Queued);

        Ok(Job {
            id,
            video_id,
            attempt,
            progress,
            state,
            created_at,
            updated_at,
        })
    }

    fn row_to_variant(row: &rusqlite::Row) -> rusqlite::Result<Variant> {
        let created_at_str: String = row.get(8)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Variant {
            id: row.get(0)?,
            video_id: row.get(1)?,
            quality: row.get(2)?,
            width: row.get(3)?,
            height: row.get(4)?,
            bitrate_kbps: row.get(5)?,
            path: row.get(6)?,
            size_bytes: row.get(7)?,
            created_at,
        })
    }

    fn fetch_video(conn: &Connection, id: &str) -> Result<Video, StoreError> {
        let sql = format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS);
        match conn.query_row(&sql, params![id], Self::row_to_video) {
            Ok(video) => Ok(video),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::VideoNotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn fetch_job(conn: &Connection, id: &str) -> Result<Job, StoreError> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        match conn.query_row(&sql, params![id], Self::row_to_job) {
            Ok(job) => Ok(job),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::JobNotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn open_job_for_video(conn: &Connection, video_id: &str) -> Result<Option<Job>, StoreError> {
        let sql = format!(
            "SELECT {} FROM jobs WHERE video_id = ? AND json_extract(state, '$.type') NOT IN ('completed', 'failed') ORDER BY created_at DESC LIMIT 1",
            JOB_COLUMNS
        );
        match conn.query_row(&sql, params![video_id], Self::row_to_job) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }
}

impl MediaStore for SqliteMediaStore {
    fn create_video(&self, request: CreateVideoRequest) -> Result<Video, StoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = VideoStatus::Pending;

        conn.execute(
            "INSERT INTO videos (id, title, original_filename, duration_secs, status, page_id, uploaded_by, visibility, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.title,
                request.original_filename,
                status.as_str(),
                request.page_id,
                request.uploaded_by,
                request.visibility.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Video {
            id,
            title: request.title,
            original_filename: request.original_filename,
            duration_secs: None,
            status,
            page_id: request.page_id,
            uploaded_by: request.uploaded_by,
            visibility: request.visibility,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_video(&self, id: &str) -> Result<Option<Video>, StoreError> {
        let conn = self.conn.lock().unwrap();
        match Self::fetch_video(&conn, id) {
            Ok(video) => Ok(Some(video)),
            Err(StoreError::VideoNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list_videos(&self, filter: &VideoFilter) -> Result<Vec<Video>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = Vec::new();
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            sql_params.push(Box::new(status.as_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM videos {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            VIDEO_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sql_params.push(Box::new(filter.limit));
        sql_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_video)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut videos = Vec::new();
        for row_result in rows {
            videos.push(row_result.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(videos)
    }

    fn update_video_status(&self, id: &str, status: VideoStatus) -> Result<Video, StoreError> {
        let conn = self.conn.lock().unwrap();

        let video = Self::fetch_video(&conn, id)?;
        let now = Utc::now();

        conn.execute(
            "UPDATE videos SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), now.to_rfc3339(), id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Video {
            status,
            updated_at: now,
            ..video
        })
    }

    fn set_video_duration(&self, id: &str, duration_secs: f64) -> Result<Video, StoreError> {
        let conn = self.conn.lock().unwrap();

        let video = Self::fetch_video(&conn, id)?;
        let now = Utc::now();

        conn.execute(
            "UPDATE videos SET duration_secs = ?, updated_at = ? WHERE id = ?",
            params![duration_secs, now.to_rfc3339(), id],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Video {
            duration_secs: Some(duration_secs),
            updated_at: now,
            ..video
        })
    }

    fn delete_video(&self, id: &str) -> Result<Video, StoreError> {
        let conn = self.conn.lock().unwrap();

        let video = Self::fetch_video(&conn, id)?;

        // Cascade: variants and jobs go with the video
        conn.execute("DELETE FROM variants WHERE video_id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute("DELETE FROM jobs WHERE video_id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute("DELETE FROM videos WHERE id = ?", params![id])
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(video)
    }

    fn create_job(&self, video_id: &str) -> Result<Job, StoreError> {
        let conn = self.conn.lock().unwrap();

        // The video must exist and must not already have an open job
        Self::fetch_video(&conn, video_id)?;
        if let Some(active) = Self::open_job_for_video(&conn, video_id)? {
            return Err(StoreError::Conflict {
                video_id: video_id.to_string(),
                active_job_id: active.id,
            });
        }

        let prior: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM jobs WHERE video_id = ?",
                params![video_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let state = JobState::Queued;
        let state_json =
            serde_json::to_string(&state).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO jobs (id, video_id, attempt, progress, state, created_at, updated_at) VALUES (?, ?, ?, 0, ?, ?, ?)",
            params![
                id,
                video_id,
                prior + 1,
                state_json,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Job {
            id,
            video_id: video_id.to_string(),
            attempt: prior + 1,
            progress: 0,
            state,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
        let conn = self.conn.lock().unwrap();
        match Self::fetch_job(&conn, id) {
            Ok(job) => Ok(Some(job)),
            Err(StoreError::JobNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = Vec::new();
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref state) = filter.state {
            conditions.push("json_extract(state, '$.type') = ?");
            sql_params.push(Box::new(state.clone()));
        }

        if let Some(ref video_id) = filter.video_id {
            conditions.push("video_id = ?");
            sql_params.push(Box::new(video_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sql_params.push(Box::new(filter.limit));
        sql_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_job)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(jobs)
    }

    fn active_job_for_video(&self, video_id: &str) -> Result<Option<Job>, StoreError> {
        let conn = self.conn.lock().unwrap();
        Self::open_job_for_video(&conn, video_id)
    }

    fn next_queued_job(&self) -> Result<Option<Job>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM jobs WHERE json_extract(state, '$.type') = 'queued' ORDER BY created_at ASC, rowid ASC LIMIT 1",
            JOB_COLUMNS
        );
        match conn.query_row(&sql, [], Self::row_to_job) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn processing_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM jobs WHERE json_extract(state, '$.type') IN ('probing', 'transcoding', 'packaging', 'thumbnailing') ORDER BY created_at ASC",
            JOB_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], Self::row_to_job)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(jobs)
    }

    fn attempts_for_video(&self, video_id: &str) -> Result<u32, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE video_id = ?",
            params![video_id],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn transition_job(
        &self,
        id: &str,
        expected: &str,
        new_state: JobState,
    ) -> Result<Job, StoreError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();
        let state_json =
            serde_json::to_string(&new_state).map_err(|e| StoreError::Database(e.to_string()))?;

        // Compare-and-set on the current state type
        let changed = conn
            .execute(
                "UPDATE jobs SET state = ?, updated_at = ? WHERE id = ? AND json_extract(state, '$.type') = ?",
                params![state_json, now.to_rfc3339(), id, expected],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            // Distinguish a missing job from a lost race
            let current = Self::fetch_job(&conn, id)?;
            return Err(StoreError::InvalidState {
                job_id: id.to_string(),
                current_state: current.state.state_type().to_string(),
                operation: format!("transition from {}", expected),
            });
        }

        Self::fetch_job(&conn, id)
    }

    fn update_job_progress(&self, id: &str, progress: u8) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let progress = progress.min(100);
        let now = Utc::now();

        // MAX() keeps progress monotonic even with out-of-order writers
        let changed = conn
            .execute(
                "UPDATE jobs SET progress = MAX(progress, ?), updated_at = ? WHERE id = ?",
                params![progress, now.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::JobNotFound(id.to_string()));
        }

        Ok(())
    }

    fn create_variant(&self, request: CreateVariantRequest) -> Result<Variant, StoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO variants (id, video_id, quality, width, height, bitrate_kbps, path, size_bytes, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.video_id,
                request.quality,
                request.width,
                request.height,
                request.bitrate_kbps,
                request.path,
                request.size_bytes,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Variant {
            id,
            video_id: request.video_id,
            quality: request.quality,
            width: request.width,
            height: request.height,
            bitrate_kbps: request.bitrate_kbps,
            path: request.path,
            size_bytes: request.size_bytes,
            created_at: now,
        })
    }

    fn variants_for_video(&self, video_id: &str) -> Result<Vec<Variant>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let sql = format!(
            "SELECT {} FROM variants WHERE video_id = ? ORDER BY height DESC",
            VARIANT_COLUMNS
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![video_id], Self::row_to_variant)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut variants = Vec::new();
        for row_result in rows {
            variants.push(row_result.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(variants)
    }
}
