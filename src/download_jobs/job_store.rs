//! Persistence of download jobs.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::models::{ArtifactType, DownloadJob, JobStatus};
use super::schema::DOWNLOAD_JOBS_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::open_versioned;

/// Durable storage of jobs, keyed by identifier.
///
/// Every method is atomic with respect to the others.
pub trait JobRepository: Send + Sync {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<DownloadJob>>;

    /// All jobs of any type built from `source_id`.
    fn find_by_source(&self, source_id: &str) -> Result<Vec<DownloadJob>>;

    /// Insert a new job. Returns false if a job with the same identifier already exists.
    fn insert(&self, job: &DownloadJob) -> Result<bool>;

    /// Replace the stored job. Returns false if it does not exist.
    fn update(&self, job: &DownloadJob) -> Result<bool>;

    /// Returns false if it did not exist.
    fn delete(&self, identifier: &str) -> Result<bool>;

    /// Delete the job only if it is still expired at `now_ms`, judged on the stored row.
    /// Returns false if it does not exist or was requested again meanwhile.
    fn delete_if_expired(&self, identifier: &str, now_ms: i64) -> Result<bool>;

    /// All jobs, oldest first.
    fn list_all(&self) -> Result<Vec<DownloadJob>>;
}

/// SQLite-backed [`JobRepository`].
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJobStore {
    /// Open or create the jobs database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, DOWNLOAD_JOBS_VERSIONED_SCHEMAS, "Download jobs")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        DOWNLOAD_JOBS_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Download jobs connection lock poisoned"))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<DownloadJob> {
        let artifact_type: String = row.get("artifact_type")?;
        let artifact_type = ArtifactType::parse(&artifact_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown artifact type {:?}", artifact_type).into(),
            )
        })?;
        let observers: String = row.get("observers")?;
        let observers: Vec<String> = serde_json::from_str(&observers).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(DownloadJob {
            identifier: row.get("identifier")?,
            artifact_type,
            source_id: row.get("source_id")?,
            sub_id: row.get("sub_id")?,
            last_requested: row.get("last_requested")?,
            ttl_ms: row.get("ttl_ms")?,
            status: JobStatus::from_db_str(&row.get::<_, String>("status")?),
            message: row.get("message")?,
            observers,
            created_at: row.get("created_at")?,
        })
    }

    fn query_jobs(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<DownloadJob>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let jobs = stmt
            .query_map(args, Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }
}

impl JobRepository for SqliteJobStore {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<DownloadJob>> {
        let conn = self.lock()?;
        let job = conn
            .query_row(
                "SELECT * FROM download_jobs WHERE identifier = ?1",
                [identifier],
                Self::row_to_job,
            )
            .optional()
            .with_context(|| format!("Failed to load download job {}", identifier))?;
        Ok(job)
    }

    fn find_by_source(&self, source_id: &str) -> Result<Vec<DownloadJob>> {
        self.query_jobs(
            "SELECT * FROM download_jobs WHERE source_id = ?1 ORDER BY created_at ASC",
            &[&source_id],
        )
    }

    fn insert(&self, job: &DownloadJob) -> Result<bool> {
        let observers = serde_json::to_string(&job.observers)?;
        let conn = self.lock()?;
        let result = conn.execute(
            r#"INSERT INTO download_jobs (
                identifier, artifact_type, source_id, sub_id, last_requested,
                ttl_ms, status, message, observers, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                job.identifier,
                job.artifact_type.as_str(),
                job.source_id,
                job.sub_id,
                job.last_requested,
                job.ttl_ms,
                job.status.as_db_str(),
                job.message,
                observers,
                job.created_at,
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to insert download job"),
        }
    }

    fn update(&self, job: &DownloadJob) -> Result<bool> {
        let observers = serde_json::to_string(&job.observers)?;
        let conn = self.lock()?;
        let rows = conn
            .execute(
                r#"UPDATE download_jobs SET
                    artifact_type = ?2, source_id = ?3, sub_id = ?4, last_requested = ?5,
                    ttl_ms = ?6, status = ?7, message = ?8, observers = ?9
                WHERE identifier = ?1"#,
                params![
                    job.identifier,
                    job.artifact_type.as_str(),
                    job.source_id,
                    job.sub_id,
                    job.last_requested,
                    job.ttl_ms,
                    job.status.as_db_str(),
                    job.message,
                    observers,
                ],
            )
            .context("Failed to update download job")?;
        Ok(rows > 0)
    }

    fn delete(&self, identifier: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "DELETE FROM download_jobs WHERE identifier = ?1",
                [identifier],
            )
            .context("Failed to delete download job")?;
        Ok(rows > 0)
    }

    fn delete_if_expired(&self, identifier: &str, now_ms: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "DELETE FROM download_jobs WHERE identifier = ?1 AND last_requested + ttl_ms < ?2",
                params![identifier, now_ms],
            )
            .context("Failed to delete expired download job")?;
        Ok(rows > 0)
    }

    fn list_all(&self) -> Result<Vec<DownloadJob>> {
        self.query_jobs(
            "SELECT * FROM download_jobs ORDER BY created_at ASC",
            &[],
        )
    }
}
