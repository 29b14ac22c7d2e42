//! Data models for derivative download jobs.
//!
//! Defines artifact types, job statuses, the persisted job record and inbound requests.

use serde::{Deserialize, Serialize};

use super::fingerprint;

/// Static per-type behaviour, looked up by [`ArtifactType::spec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub mime_type: &'static str,
    /// File extension including the leading dot.
    pub extension: &'static str,
    pub display_name: &'static str,
    /// Path segment of the task manager endpoints for this type.
    pub endpoint: &'static str,
    /// Job type name the task manager expects in submissions.
    pub task_type: &'static str,
}

const PDF_SPEC: ArtifactSpec = ArtifactSpec {
    mime_type: "application/pdf",
    extension: ".pdf",
    display_name: "PDF",
    endpoint: "viewerpdf",
    task_type: "VIEWERPDF",
};

const EPUB_SPEC: ArtifactSpec = ArtifactSpec {
    mime_type: "application/epub+zip",
    extension: ".epub",
    display_name: "EPUB",
    endpoint: "viewerepub",
    task_type: "VIEWEREPUB",
};

/// Kind of derivative being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Pdf,
    Epub,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 2] = [ArtifactType::Pdf, ArtifactType::Epub];

    /// Name used in requests, fingerprints and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Pdf => "pdf",
            ArtifactType::Epub => "epub",
        }
    }

    /// Case-insensitive parse of the request name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(ArtifactType::Pdf),
            "epub" => Some(ArtifactType::Epub),
            _ => None,
        }
    }

    pub fn spec(&self) -> &'static ArtifactSpec {
        match self {
            ArtifactType::Pdf => &PDF_SPEC,
            ArtifactType::Epub => &EPUB_SPEC,
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Initialized,
    Waiting,
    Ready,
    Error,
    Undefined,
    /// Tombstone left by administrative deletion.
    Deleted,
}

impl JobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Initialized => "INITIALIZED",
            JobStatus::Waiting => "WAITING",
            JobStatus::Ready => "READY",
            JobStatus::Error => "ERROR",
            JobStatus::Undefined => "UNDEFINED",
            JobStatus::Deleted => "DELETED",
        }
    }

    /// Unknown names map to `Undefined`; the task manager reports statuses in any case.
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "INITIALIZED" => JobStatus::Initialized,
            "WAITING" => JobStatus::Waiting,
            "READY" => JobStatus::Ready,
            "ERROR" => JobStatus::Error,
            "DELETED" => JobStatus::Deleted,
            _ => JobStatus::Undefined,
        }
    }

    /// Statuses observers get notified about.
    pub fn is_notifiable(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Error)
    }
}

/// A derivative download job.
///
/// One job exists per `identifier`, which is the fingerprint of
/// `(artifact_type, source_id, sub_id)` and the basename of the produced file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub identifier: String,
    pub artifact_type: ArtifactType,
    pub source_id: String,
    /// Empty means the whole source.
    pub sub_id: String,
    /// Last time any request touched this job (Unix timestamp in milliseconds).
    pub last_requested: i64,
    /// Time to live after `last_requested`, in milliseconds.
    pub ttl_ms: i64,
    pub status: JobStatus,
    /// Diagnostic populated on ERROR.
    pub message: Option<String>,
    /// Notification addresses, in the order they were first added.
    pub observers: Vec<String>,
    /// Creation time (Unix timestamp in milliseconds).
    pub created_at: i64,
}

impl DownloadJob {
    /// Create a new job in INITIALIZED state, requested at `now_ms`.
    pub fn new(
        artifact_type: ArtifactType,
        source_id: impl Into<String>,
        sub_id: impl Into<String>,
        ttl_ms: i64,
        now_ms: i64,
    ) -> Self {
        let mut job = Self {
            identifier: String::new(),
            artifact_type,
            source_id: source_id.into(),
            sub_id: sub_id.into(),
            last_requested: now_ms,
            ttl_ms,
            status: JobStatus::Initialized,
            message: None,
            observers: Vec::new(),
            created_at: now_ms,
        };
        job.identifier = job.generate_identifier();
        job
    }

    /// Recompute the fingerprint from this job's defining criteria.
    pub fn generate_identifier(&self) -> String {
        fingerprint::download_identifier(self.artifact_type, &self.source_id, &self.sub_id)
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Instant after which the job is eligible for sweeping (Unix ms).
    pub fn expires_at(&self) -> i64 {
        self.last_requested.saturating_add(self.ttl_ms)
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_requested = now_ms;
    }

    /// Append a normalized observer address. Returns false for blank or duplicate addresses.
    pub fn add_observer(&mut self, address: &str) -> bool {
        let normalized = address.trim().to_lowercase();
        if normalized.is_empty() || self.observers.contains(&normalized) {
            return false;
        }
        self.observers.push(normalized);
        true
    }

    /// Merge another job's observers into this one, keeping order.
    pub fn merge_observers(&mut self, other: &[String]) {
        for address in other {
            self.add_observer(address);
        }
    }
}

/// An inbound create-or-attach request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadRequest {
    /// Artifact type name (`pdf`, `epub`).
    pub artifact_type: String,
    pub observer_email: Option<String>,
    pub source_id: String,
    #[serde(default)]
    pub sub_id: String,
    /// Identifier the caller computed; must match the recomputed fingerprint.
    pub expected_identifier: String,
    /// Requested TTL in milliseconds; the configured default applies when absent.
    pub ttl_ms: Option<i64>,
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
